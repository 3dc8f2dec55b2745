//! The curated TCP port list the port-scan service probes, plus a naming
//! and priority lookup used for device classification and primary-port
//! selection.

/// Ports probed by the port-scan service, in declaration order.
pub const CURATED_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 67, 80, 110, 123, 135, 139, 143, 161, 162, 443, 445, 515, 554, 631, 993,
    995, 1433, 1521, 1900, 1935, 2049, 3306, 3389, 3702, 5353, 5432, 5900, 5901, 5902, 8000, 8008,
    8080, 8443, 8554, 8888, 9100, 27017, 34567, 37777, 65001,
];

/// Priority order for selecting a device's "primary" port among several
/// open ones - lower index wins. Ports not listed sort last, in numeric
/// order.
const PRIORITY_ORDER: &[u16] = &[
    80, 443, 8080, 22, 23, 554, 8000, 631, 9100, 37777, 34567,
];

pub fn service_name_for_port(port: u16) -> &'static str {
    match port {
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        67 => "DHCP",
        80 | 8000 | 8008 | 8080 | 8888 => "HTTP",
        110 => "POP3",
        123 => "NTP",
        135 => "RPC",
        139 | 445 => "SMB",
        143 => "IMAP",
        161 | 162 => "SNMP",
        443 | 8443 => "HTTPS",
        515 => "LPD",
        554 | 8554 => "RTSP",
        631 => "IPP",
        993 => "IMAPS",
        995 => "POP3S",
        1433 => "MSSQL",
        1521 => "Oracle",
        1900 => "SSDP",
        1935 => "RTMP",
        2049 => "NFS",
        3306 => "MySQL",
        3389 => "RDP",
        3702 => "WS-Discovery",
        5353 => "mDNS",
        5432 => "PostgreSQL",
        5900 | 5901 | 5902 => "VNC",
        9100 => "JetDirect",
        27017 => "MongoDB",
        34567 | 37777 => "Dahua DVR",
        65001 => "Hikvision",
        _ => "Unknown",
    }
}

/// Choose the highest-priority open port, falling back to the lowest
/// numbered port when none of the open ports appear in [`PRIORITY_ORDER`].
pub fn primary_port(open_ports: &[u16]) -> Option<u16> {
    if open_ports.is_empty() {
        return None;
    }
    PRIORITY_ORDER
        .iter()
        .find(|p| open_ports.contains(p))
        .copied()
        .or_else(|| open_ports.iter().min().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_port_prefers_priority_order() {
        assert_eq!(primary_port(&[443, 80, 8080]), Some(80));
        assert_eq!(primary_port(&[554, 80]), Some(80));
        assert_eq!(primary_port(&[9999, 12345]), Some(9999));
        assert_eq!(primary_port(&[]), None);
    }

    #[test]
    fn curated_list_has_no_duplicates() {
        let mut sorted = CURATED_PORTS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), CURATED_PORTS.len());
    }
}
