//! SSDP / UPnP discovery service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::util::net::is_ip_in_segment;

use super::multicast::{open_per_interface_sockets, send_from_all};
use super::DiscoveryService;

const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const PORT: u16 = 1900;
const LISTEN_WINDOW: Duration = Duration::from_secs(8);
const RECV_POLL: Duration = Duration::from_millis(500);
const TARGET_SPACING: Duration = Duration::from_millis(100);

const SEARCH_TARGETS: &[&str] = &[
    "ssdp:all",
    "upnp:rootdevice",
    "urn:schemas-upnp-org:device:InternetGatewayDevice:1",
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:device:MediaRenderer:1",
    "urn:schemas-upnp-org:device:WANConnectionDevice:1",
    "urn:axis-com:device:Network_Video_Product:1",
    "urn:dial-multiscreen-org:service:dial:1",
    "urn:schemas-sonos-com:device:ZonePlayer:1",
    "urn:schemas-upnp-org:device:Printer:1",
    "urn:schemas-upnp-org:device:PrinterAdvanced:1",
];

pub struct SsdpService {
    pub listen_window: Duration,
    pub enrichment_timeout: Duration,
}

impl Default for SsdpService {
    fn default() -> Self {
        Self {
            listen_window: LISTEN_WINDOW,
            enrichment_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl DiscoveryService for SsdpService {
    fn service_name(&self) -> &'static str {
        "ssdp"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Ssdp
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

impl SsdpService {
    async fn run(&self, segment: Option<String>, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let sockets = open_per_interface_sockets(GROUP);
        if sockets.is_empty() {
            let reason = crate::error::DiscoveryError::ServiceBootFailure {
                service: "ssdp",
                reason: "no interface would bind the multicast group".to_string(),
            };
            emit(&events, DiscoveryEvent::error(DiscoveryMethod::Ssdp, reason.to_string()));
            return Vec::new();
        }

        let mut found: HashMap<String, RawResponse> = HashMap::new();
        let total = SEARCH_TARGETS.len();

        for (i, target) in SEARCH_TARGETS.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let request = create_msearch_request(target);
            send_from_all(&sockets, GROUP, PORT, request.as_bytes()).await;
            emit(&events, DiscoveryEvent::progress(DiscoveryMethod::Ssdp, i + 1, total, (*target).to_string(), "probing"));
            tokio::time::sleep(TARGET_SPACING).await;
        }

        let deadline = tokio::time::Instant::now() + self.listen_window;
        let mut buf = vec![0u8; 4096];
        while tokio::time::Instant::now() < deadline && !cancel.is_cancelled() {
            for socket in &sockets {
                match tokio::time::timeout(RECV_POLL, socket.recv_from(&mut buf)).await {
                    Ok(Ok((len, from))) => {
                        if let Some(mut response) = parse_response(&buf[..len]) {
                            if let std::net::IpAddr::V4(ip) = from.ip() {
                                response.remote_ip = Some(ip);
                            }
                            let key = response.usn.clone().unwrap_or_else(|| from.ip().to_string());
                            found.entry(key).or_insert(response);
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "SSDP recv error"),
                    Err(_) => {}
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        let mut devices = Vec::new();
        for (unique_id, response) in found {
            let mut device = build_device(unique_id, &response);
            if let Some(location) = &response.location {
                if let Err(e) = enrich_from_location(&mut device, location, self.enrichment_timeout).await {
                    debug!(location, error = %e, "SSDP LOCATION enrichment failed");
                }
            }
            if let Some(segment) = &segment {
                if !is_ip_in_segment(device.ip_address, segment) {
                    continue;
                }
            }
            emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::Ssdp));
            devices.push(device);
        }
        devices
    }
}

fn create_msearch_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 3\r\nST: {}\r\n\r\n",
        search_target
    )
}

#[derive(Debug, Clone, Default)]
struct RawResponse {
    host: Option<String>,
    location: Option<String>,
    server: Option<String>,
    st: Option<String>,
    usn: Option<String>,
    remote_ip: Option<Ipv4Addr>,
}

fn parse_response(data: &[u8]) -> Option<RawResponse> {
    let text = std::str::from_utf8(data).ok()?;
    let mut lines = text.lines();
    let status_line = lines.next()?;
    if !status_line.to_uppercase().contains("200") {
        return None;
    }

    let mut response = RawResponse::default();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_uppercase().as_str() {
            "HOST" => response.host = Some(value),
            "LOCATION" => response.location = Some(value),
            "SERVER" => response.server = Some(value),
            "ST" => response.st = Some(value),
            "USN" => response.usn = Some(value),
            _ => {}
        }
    }

    if response.st.is_none() || response.usn.is_none() {
        return None;
    }
    Some(response)
}

fn build_device(unique_id: String, response: &RawResponse) -> DiscoveredDevice {
    let ip = response
        .location
        .as_deref()
        .and_then(extract_host_from_url)
        .or(response.remote_ip.map(|ip| ip.to_string()))
        .and_then(|s| s.parse().ok())
        .unwrap_or(Ipv4Addr::UNSPECIFIED);

    let mut device = DiscoveredDevice::new(unique_id, ip, DiscoveryMethod::Ssdp);
    device.device_type = classify(response.st.as_deref().unwrap_or(""), response.server.as_deref().unwrap_or(""));
    device.set_raw("ssdp_usn", response.usn.clone().unwrap_or_default());
    device.set_raw("ssdp_st", response.st.clone().unwrap_or_default());
    if let Some(server) = &response.server {
        device.set_raw("ssdp_server", server.clone());
    }
    device
}

fn extract_host_from_url(url: &str) -> Option<String> {
    url::Url::parse(url).ok()?.host_str().map(str::to_string)
}

fn classify(st: &str, server: &str) -> DeviceType {
    let st = st.to_lowercase();
    let server = server.to_lowercase();
    if st.contains("internetgatewaydevice") || st.contains("wanconnectiondevice") {
        DeviceType::Router
    } else if st.contains("mediaserver") {
        DeviceType::MediaServer
    } else if st.contains("mediarenderer") {
        DeviceType::MediaServer
    } else if server.contains("roku") || server.contains("chromecast") || st.contains("dial") {
        DeviceType::StreamingDevice
    } else if server.contains("samsung") && server.contains("tv") {
        DeviceType::SmartTv
    } else if st.contains("printer") {
        DeviceType::Printer
    } else if st.contains("synology") || st.contains("qnap") || st.contains("nas") {
        DeviceType::Nas
    } else if st.contains("camera") || st.contains("ipcam") || st.contains("videosource") || st.contains("network_video_product") {
        DeviceType::Camera
    } else {
        DeviceType::Unknown
    }
}

async fn enrich_from_location(device: &mut DiscoveredDevice, location: &str, timeout: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let body = client.get(location).send().await?.text().await?;

    device.name = extract_tag(&body, "friendlyName").or(device.name.take());
    device.manufacturer = extract_tag(&body, "manufacturer").or(device.manufacturer.take());
    device.model = extract_tag(&body, "modelName").or(device.model.take());
    device.serial_number = extract_tag(&body, "serialNumber").or(device.serial_number.take());
    Ok(())
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let value = xml[start..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msearch_request_matches_wire_template() {
        let request = create_msearch_request("ssdp:all");
        assert!(request.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(request.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(request.contains("ST: ssdp:all\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn parses_valid_ssdp_response() {
        let raw = b"HTTP/1.1 200 OK\r\nCACHE-CONTROL: max-age=1800\r\nST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\nUSN: uuid:abc::urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\nLOCATION: http://192.168.1.1:49000/desc.xml\r\nSERVER: ACME/1.0\r\n\r\n";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.usn.as_deref(), Some("uuid:abc::urn:schemas-upnp-org:device:InternetGatewayDevice:1"));
        assert_eq!(response.location.as_deref(), Some("http://192.168.1.1:49000/desc.xml"));
    }

    #[test]
    fn rejects_non_200_response() {
        assert!(parse_response(b"HTTP/1.1 404 Not Found\r\n\r\n").is_none());
    }

    #[test]
    fn classifies_igd_as_router() {
        assert_eq!(
            classify("urn:schemas-upnp-org:device:InternetGatewayDevice:1", ""),
            DeviceType::Router
        );
    }

    #[test]
    fn extract_tag_reads_friendly_name() {
        let xml = "<device><friendlyName>Home Router</friendlyName></device>";
        assert_eq!(extract_tag(xml, "friendlyName").as_deref(), Some("Home Router"));
    }
}
