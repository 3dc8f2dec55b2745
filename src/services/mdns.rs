//! Multicast DNS / DNS-SD service.
//!
//! Queries and responses use a minimal hand-rolled DNS wire codec (the same
//! bare-enough-for-the-job approach as the SNMP service's BER codec) rather
//! than a general-purpose DNS library, so the multi-interface socket
//! strategy stays identical across SSDP/WS-Discovery/mDNS.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::util::net::is_ip_in_segment;

use super::multicast::{open_per_interface_sockets, send_from_all};
use super::DiscoveryService;

const GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const PORT: u16 = 5353;
const LISTEN_WINDOW: Duration = Duration::from_secs(10);
const RECV_POLL: Duration = Duration::from_millis(500);
const QUERY_SPACING: Duration = Duration::from_millis(100);

const SERVICE_TYPES: &[&str] = &[
    "_services._dns-sd._udp.local",
    "_http._tcp.local",
    "_rtsp._tcp.local",
    "_axis-video._tcp.local",
    "_printer._tcp.local",
    "_ipp._tcp.local",
    "_workstation._tcp.local",
    "_smb._tcp.local",
];

pub struct MdnsService {
    pub listen_window: Duration,
}

impl Default for MdnsService {
    fn default() -> Self {
        Self { listen_window: LISTEN_WINDOW }
    }
}

#[async_trait]
impl DiscoveryService for MdnsService {
    fn service_name(&self) -> &'static str {
        "mdns"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Mdns
    }

    fn default_timeout(&self) -> Duration {
        self.listen_window
    }

    async fn discover_all(&self, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        self.run(None, events, cancel).await
    }

    async fn discover_segment(&self, cidr: &str, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        self.run(Some(cidr.to_string()), events, cancel).await
    }
}

impl MdnsService {
    async fn run(&self, segment: Option<String>, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let sockets = open_per_interface_sockets(GROUP);
        if sockets.is_empty() {
            let reason = crate::error::DiscoveryError::ServiceBootFailure {
                service: "mdns",
                reason: "no interface would bind the multicast group".to_string(),
            };
            emit(&events, DiscoveryEvent::error(DiscoveryMethod::Mdns, reason.to_string()));
            return Vec::new();
        }

        let total = SERVICE_TYPES.len();
        for (i, service_type) in SERVICE_TYPES.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let query = build_query(service_type);
            send_from_all(&sockets, GROUP, PORT, &query).await;
            emit(&events, DiscoveryEvent::progress(DiscoveryMethod::Mdns, i + 1, total, (*service_type).to_string(), "querying"));
            tokio::time::sleep(QUERY_SPACING).await;
        }

        let mut records: Vec<(Ipv4Addr, Record)> = Vec::new();
        let deadline = tokio::time::Instant::now() + self.listen_window;
        let mut buf = vec![0u8; 8192];
        while tokio::time::Instant::now() < deadline && !cancel.is_cancelled() {
            for socket in &sockets {
                if let Ok(Ok((len, from))) = tokio::time::timeout(RECV_POLL, socket.recv_from(&mut buf)).await {
                    if let std::net::IpAddr::V4(sender) = from.ip() {
                        records.extend(parse_message(&buf[..len]).into_iter().map(|r| (sender, r)));
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        let devices = fold_records(records);
        let mut out = Vec::new();
        for mut device in devices {
            device.discovery_methods.insert(DiscoveryMethod::Mdns);
            if let Some(segment) = &segment {
                if !is_ip_in_segment(device.ip_address, segment) {
                    continue;
                }
            }
            emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::Mdns));
            out.push(device);
        }
        out
    }
}

/// Build a standard DNS query packet for a single `PTR` question.
fn build_query(name: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(32);
    packet.extend_from_slice(&0u16.to_be_bytes()); // transaction id
    packet.extend_from_slice(&0u16.to_be_bytes()); // flags: standard query
    packet.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    packet.extend_from_slice(&0u16.to_be_bytes()); // ancount
    packet.extend_from_slice(&0u16.to_be_bytes()); // nscount
    packet.extend_from_slice(&0u16.to_be_bytes()); // arcount
    encode_name(name, &mut packet);
    packet.extend_from_slice(&12u16.to_be_bytes()); // qtype PTR
    packet.extend_from_slice(&1u16.to_be_bytes()); // qclass IN
    packet
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

#[derive(Debug, Clone)]
enum RData {
    A(Ipv4Addr),
    Ptr(String),
    Srv { port: u16, target: String },
    Txt(Vec<String>),
    Other,
}

#[derive(Debug, Clone)]
struct Record {
    name: String,
    rdata: RData,
}

/// Parse every answer/authority/additional record out of a DNS message.
/// Malformed packets yield an empty list rather than an error: mDNS
/// traffic on a shared multicast group includes plenty of noise.
fn parse_message(data: &[u8]) -> Vec<Record> {
    if data.len() < 12 {
        return Vec::new();
    }
    let ancount = u16::from_be_bytes([data[6], data[7]]) as usize;
    let nscount = u16::from_be_bytes([data[8], data[9]]) as usize;
    let arcount = u16::from_be_bytes([data[10], data[11]]) as usize;
    let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;

    let mut pos = 12;
    for _ in 0..qdcount {
        let Some(next) = skip_name(data, pos) else { return Vec::new() };
        pos = next + 4; // qtype + qclass
        if pos > data.len() {
            return Vec::new();
        }
    }

    let mut records = Vec::new();
    for _ in 0..(ancount + nscount + arcount) {
        match parse_record(data, pos) {
            Some((record, next)) => {
                records.push(record);
                pos = next;
            }
            None => break,
        }
    }
    records
}

fn parse_record(data: &[u8], pos: usize) -> Option<(Record, usize)> {
    let (name, after_name) = read_name(data, pos)?;
    if after_name + 10 > data.len() {
        return None;
    }
    let rtype = u16::from_be_bytes([data[after_name], data[after_name + 1]]);
    let rdlength = u16::from_be_bytes([data[after_name + 8], data[after_name + 9]]) as usize;
    let rdata_start = after_name + 10;
    let rdata_end = rdata_start.checked_add(rdlength)?;
    if rdata_end > data.len() {
        return None;
    }
    let rdata_bytes = &data[rdata_start..rdata_end];

    let rdata = match rtype {
        1 if rdata_bytes.len() == 4 => RData::A(Ipv4Addr::new(rdata_bytes[0], rdata_bytes[1], rdata_bytes[2], rdata_bytes[3])),
        12 => read_name(data, rdata_start).map(|(n, _)| RData::Ptr(n)).unwrap_or(RData::Other),
        33 if rdata_bytes.len() >= 6 => {
            let port = u16::from_be_bytes([rdata_bytes[4], rdata_bytes[5]]);
            let target = read_name(data, rdata_start + 6).map(|(n, _)| n).unwrap_or_default();
            RData::Srv { port, target }
        }
        16 => RData::Txt(parse_txt(rdata_bytes)),
        _ => RData::Other,
    };

    Some((Record { name, rdata }, rdata_end))
}

fn parse_txt(data: &[u8]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        i += 1;
        if i + len > data.len() {
            break;
        }
        if len > 0 {
            entries.push(String::from_utf8_lossy(&data[i..i + len]).to_string());
        }
        i += len;
    }
    entries
}

/// Read a (possibly compressed) DNS name starting at `pos`, returning the
/// decoded name and the offset immediately after it in the *original*
/// packet (before following any compression pointer).
fn read_name(data: &[u8], pos: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut cursor = pos;
    let mut end_of_record = None;
    let mut hops = 0;

    loop {
        if cursor >= data.len() {
            return None;
        }
        let len = data[cursor];
        if len == 0 {
            if end_of_record.is_none() {
                end_of_record = Some(cursor + 1);
            }
            break;
        } else if len & 0xC0 == 0xC0 {
            if cursor + 1 >= data.len() {
                return None;
            }
            if end_of_record.is_none() {
                end_of_record = Some(cursor + 2);
            }
            let offset = (((len & 0x3F) as usize) << 8) | data[cursor + 1] as usize;
            cursor = offset;
            hops += 1;
            if hops > 32 {
                return None;
            }
        } else {
            let label_start = cursor + 1;
            let label_end = label_start + len as usize;
            if label_end > data.len() {
                return None;
            }
            labels.push(String::from_utf8_lossy(&data[label_start..label_end]).to_string());
            cursor = label_end;
        }
    }

    Some((labels.join("."), end_of_record.unwrap_or(cursor)))
}

fn skip_name(data: &[u8], pos: usize) -> Option<usize> {
    read_name(data, pos).map(|(_, end)| end)
}

#[derive(Debug, Clone, Default)]
struct InstanceInfo {
    port: Option<u16>,
    target: Option<String>,
    txt: Vec<String>,
    sender_ip: Option<Ipv4Addr>,
}

/// Fold PTR/SRV/A/TXT records into devices keyed by service instance name.
///
/// When an instance's SRV target never gets a matching A record in the same
/// listen window, fall back to the IP address the records were observed
/// from rather than dropping the instance.
fn fold_records(records: Vec<(Ipv4Addr, Record)>) -> Vec<DiscoveredDevice> {
    let mut instances: HashMap<String, InstanceInfo> = HashMap::new();
    let mut host_addrs: HashMap<String, Ipv4Addr> = HashMap::new();

    for (sender_ip, record) in &records {
        match &record.rdata {
            RData::Ptr(instance) => {
                let entry = instances.entry(instance.clone()).or_default();
                entry.sender_ip.get_or_insert(*sender_ip);
            }
            RData::Srv { port, target } => {
                let entry = instances.entry(record.name.clone()).or_default();
                entry.port = Some(*port);
                entry.target = Some(target.clone());
                entry.sender_ip.get_or_insert(*sender_ip);
            }
            RData::Txt(entries) => {
                let entry = instances.entry(record.name.clone()).or_default();
                entry.txt = entries.clone();
                entry.sender_ip.get_or_insert(*sender_ip);
            }
            RData::A(addr) => {
                host_addrs.insert(record.name.clone(), *addr);
            }
            RData::Other => {}
        }
    }

    let mut devices = Vec::new();
    for (instance, info) in instances {
        let ip = info
            .target
            .as_ref()
            .and_then(|target| host_addrs.get(target).copied())
            .or(info.sender_ip);
        let Some(ip) = ip else { continue };

        let mut device = DiscoveredDevice::new(instance.clone(), ip, DiscoveryMethod::Mdns);
        device.name = Some(instance_label(&instance));
        device.port = info.port.unwrap_or(0);
        device.device_type = classify(&instance);
        if !info.txt.is_empty() {
            device.set_raw("mdns_txt", info.txt.join(";"));
        }
        device.set_raw("mdns_service", service_part(&instance));
        devices.push(device);
    }
    devices
}

fn instance_label(instance: &str) -> String {
    instance.split('.').next().unwrap_or(instance).to_string()
}

fn service_part(instance: &str) -> String {
    let parts: Vec<&str> = instance.split('.').collect();
    if parts.len() >= 3 {
        parts[1..parts.len() - 1].join(".")
    } else {
        instance.to_string()
    }
}

fn classify(instance: &str) -> DeviceType {
    let lower = instance.to_lowercase();
    if lower.contains("_rtsp") || lower.contains("_axis-video") {
        DeviceType::Camera
    } else if lower.contains("_printer") || lower.contains("_ipp") {
        DeviceType::Printer
    } else if lower.contains("_workstation") || lower.contains("_smb") {
        DeviceType::Workstation
    } else {
        DeviceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_encodes_name_with_length_prefixed_labels() {
        let query = build_query("_http._tcp.local");
        assert_eq!(&query[0..4], &[0, 0, 0, 0]);
        assert_eq!(query[4..6], 1u16.to_be_bytes());
        assert_eq!(query[12], 5); // "_http"
        assert_eq!(&query[13..18], b"_http");
    }

    #[test]
    fn round_trips_a_simple_name_through_read_name() {
        let mut packet = Vec::new();
        encode_name("foo.local", &mut packet);
        let (name, end) = read_name(&packet, 0).unwrap();
        assert_eq!(name, "foo.local");
        assert_eq!(end, packet.len());
    }

    #[test]
    fn follows_a_compression_pointer() {
        let mut packet = vec![0u8; 12];
        encode_name("local", &mut packet); // at offset 12
        let local_offset = 12u16;
        let pointer_pos = packet.len();
        packet.push(0xC0 | ((local_offset >> 8) as u8));
        packet.push((local_offset & 0xFF) as u8);
        let (name, _) = read_name(&packet, pointer_pos).unwrap();
        assert_eq!(name, "local");
    }

    #[test]
    fn parses_txt_entries() {
        let mut data = Vec::new();
        data.push(3);
        data.extend_from_slice(b"foo");
        data.push(5);
        data.extend_from_slice(b"bar=1");
        assert_eq!(parse_txt(&data), vec!["foo".to_string(), "bar=1".to_string()]);
    }

    #[test]
    fn classifies_rtsp_instance_as_camera() {
        assert_eq!(classify("Cam1._rtsp._tcp.local"), DeviceType::Camera);
    }
}
