mod portscan;
mod snmp_probe;
