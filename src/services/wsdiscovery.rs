//! WS-Discovery service, including the ONVIF-narrowed probe variant.
//!
//! Both rows of the component table share this one wire client: the
//! ONVIF-probe service is the same client constructed with
//! [`WsDiscoveryService::onvif_only`] and a narrower `probe_types` list.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::util::net::is_ip_in_segment;

use super::multicast::{open_per_interface_sockets, send_from_all};
use super::DiscoveryService;

const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const PORT: u16 = 3702;
const LISTEN_WINDOW: Duration = Duration::from_secs(8);
const RECV_POLL: Duration = Duration::from_millis(500);
const PROBE_SPACING: Duration = Duration::from_millis(200);

const DEFAULT_PROBE_TYPES: &[&str] = &[
    "dn:NetworkVideoTransmitter",
    "tds:Device",
    "dn:NetworkVideoRecorder",
    "wsdp:Device",
    "axis:NetworkCamera",
    "axis:NetworkVideoProduct",
];

const ONVIF_PROBE_TYPES: &[&str] = &["dn:NetworkVideoTransmitter", "tds:Device", "dn:NetworkVideoRecorder"];

pub struct WsDiscoveryService {
    pub probe_types: Vec<String>,
    pub onvif_only: bool,
    pub method: DiscoveryMethod,
    pub listen_window: Duration,
    pub enrichment_timeout: Duration,
}

impl Default for WsDiscoveryService {
    fn default() -> Self {
        Self {
            probe_types: DEFAULT_PROBE_TYPES.iter().map(|s| s.to_string()).collect(),
            onvif_only: false,
            method: DiscoveryMethod::WsDiscovery,
            listen_window: LISTEN_WINDOW,
            enrichment_timeout: Duration::from_secs(5),
        }
    }
}

impl WsDiscoveryService {
    /// The narrower ONVIF-probe variant of the same wire client.
    pub fn onvif() -> Self {
        Self {
            probe_types: ONVIF_PROBE_TYPES.iter().map(|s| s.to_string()).collect(),
            onvif_only: true,
            method: DiscoveryMethod::Onvif,
            ..Self::default()
        }
    }
}

#[async_trait]
impl DiscoveryService for WsDiscoveryService {
    fn service_name(&self) -> &'static str {
        if self.onvif_only {
            "onvif"
        } else {
            "ws-discovery"
        }
    }

    fn method(&self) -> DiscoveryMethod {
        self.method
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

impl WsDiscoveryService {
    async fn run(&self, segment: Option<String>, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let sockets = open_per_interface_sockets(GROUP);
        if sockets.is_empty() {
            let reason = crate::error::DiscoveryError::ServiceBootFailure {
                service: self.service_name(),
                reason: "no interface would bind the multicast group".to_string(),
            };
            emit(&events, DiscoveryEvent::error(self.method, reason.to_string()));
            return Vec::new();
        }

        let probes: Vec<String> = if self.probe_types.is_empty() {
            vec![create_probe_request(None)]
        } else {
            self.probe_types.iter().map(|t| create_probe_request(Some(t))).collect()
        };
        let total = probes.len();

        for (i, probe) in probes.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            send_from_all(&sockets, GROUP, PORT, probe.as_bytes()).await;
            emit(&events, DiscoveryEvent::progress(self.method, i + 1, total, "probe".to_string(), "probing"));
            tokio::time::sleep(PROBE_SPACING).await;
        }

        let mut matches: Vec<ProbeMatch> = Vec::new();
        let deadline = tokio::time::Instant::now() + self.listen_window;
        let mut buf = vec![0u8; 8192];
        while tokio::time::Instant::now() < deadline && !cancel.is_cancelled() {
            for socket in &sockets {
                if let Ok(Ok((len, _from))) = tokio::time::timeout(RECV_POLL, socket.recv_from(&mut buf)).await {
                    if let Some(pm) = parse_probe_match(&buf[..len]) {
                        matches.push(pm);
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        let mut devices = Vec::new();
        for pm in matches {
            let mut device = build_device(&pm, self.method);
            for xaddr in pm.xaddrs.iter().take(2) {
                match enrich_via_onvif(&mut device, xaddr, self.enrichment_timeout).await {
                    Ok(()) => break,
                    Err(e) => debug!(xaddr, error = %e, "ONVIF GetDeviceInformation failed"),
                }
            }
            if let Some(segment) = &segment {
                if !is_ip_in_segment(device.ip_address, segment) {
                    continue;
                }
            }
            emit(&events, DiscoveryEvent::device_discovered(device.clone(), self.method));
            devices.push(device);
        }
        devices
    }
}

fn create_probe_request(probe_type: Option<&str>) -> String {
    let message_id = Uuid::new_v4();
    let types_element = probe_type
        .map(|t| format!("<d:Types>{}</d:Types>", t))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery"><s:Header><a:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action><a:MessageID>urn:uuid:{}</a:MessageID><a:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To></s:Header><s:Body><d:Probe>{}</d:Probe></s:Body></s:Envelope>"#,
        message_id, types_element
    )
}

#[derive(Debug, Clone, Default)]
struct ProbeMatch {
    endpoint: String,
    types: String,
    scopes: Vec<String>,
    xaddrs: Vec<String>,
}

fn parse_probe_match(data: &[u8]) -> Option<ProbeMatch> {
    let text = std::str::from_utf8(data).ok()?;
    if !text.contains("ProbeMatch") {
        return None;
    }

    let endpoint = extract_between(text, "Address>", "</")?;
    let types = extract_between(text, "Types>", "</").unwrap_or_default();
    let scopes = extract_between(text, "Scopes", "</")
        .map(|s| {
            // Strip a leading attribute fragment like ` MatchBy="...">` before the scope text.
            let trimmed = s.rsplit_once('>').map(|(_, v)| v).unwrap_or(&s);
            trimmed.split_whitespace().map(str::to_string).collect()
        })
        .unwrap_or_default();
    let xaddrs: Vec<String> = extract_between(text, "XAddrs>", "</")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    if xaddrs.is_empty() {
        return None;
    }

    Some(ProbeMatch { endpoint, types, scopes, xaddrs })
}

fn extract_between(text: &str, after: &str, before: &str) -> Option<String> {
    let start = text.find(after)? + after.len();
    let end = text[start..].find(before)? + start;
    Some(text[start..end].to_string())
}

fn build_device(pm: &ProbeMatch, method: DiscoveryMethod) -> DiscoveredDevice {
    let ip = pm
        .xaddrs
        .first()
        .and_then(|addr| url::Url::parse(addr).ok())
        .and_then(|url| url.host_str().map(str::to_string))
        .and_then(|s| s.parse().ok())
        .unwrap_or(Ipv4Addr::UNSPECIFIED);

    let unique_id = if pm.endpoint.is_empty() { ip.to_string() } else { pm.endpoint.clone() };
    let mut device = DiscoveredDevice::new(unique_id, ip, method);
    device.device_type = classify_types(&pm.types);
    device.set_raw("wsd_types", pm.types.clone());

    for scope in &pm.scopes {
        apply_scope(&mut device, scope);
    }

    device
}

fn apply_scope(device: &mut DiscoveredDevice, scope: &str) {
    let decoded = urlencoding_decode(scope);
    if let Some(name) = decoded
        .strip_prefix("onvif://www.onvif.org/name/")
        .map(str::to_string)
        .or_else(|| decoded.split("/name/").nth(1).map(str::to_string))
    {
        device.name = Some(name);
    } else if let Some(hw) = extract_scope_value(&decoded, "/hardware/") {
        device.model = Some(hw);
    } else if let Some(location) = extract_scope_value(&decoded, "/location/") {
        device.description = Some(location);
    }

    for (needle, vendor) in [("axis.com", "Axis"), ("hikvision", "Hikvision"), ("dahua", "Dahua"), ("bosch", "Bosch"), ("hanwha", "Hanwha")] {
        if decoded.to_lowercase().contains(needle) && device.manufacturer.is_none() {
            device.manufacturer = Some(vendor.to_string());
        }
    }
}

fn extract_scope_value(scope: &str, marker: &str) -> Option<String> {
    let idx = scope.find(marker)? + marker.len();
    Some(scope[idx..].to_string())
}

/// Minimal percent-decoding, sufficient for WS-Discovery scope values
/// (alphanumerics plus `%XX` escapes).
fn urlencoding_decode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                out.push(byte as char);
                continue;
            }
            out.push('%');
            out.push_str(&hex);
        } else {
            out.push(c);
        }
    }
    out
}

fn classify_types(types: &str) -> DeviceType {
    let lower = types.to_lowercase();
    if lower.contains("networkvideotransmitter") {
        DeviceType::Camera
    } else if lower.contains("networkvideorecorder") {
        DeviceType::Nvr
    } else if lower.contains("networkvideodisplay") {
        DeviceType::Monitor
    } else if lower.contains("device") {
        DeviceType::Camera
    } else {
        DeviceType::Unknown
    }
}

async fn enrich_via_onvif(device: &mut DiscoveredDevice, xaddr: &str, timeout: Duration) -> anyhow::Result<()> {
    let envelope = r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl"><s:Body><tds:GetDeviceInformation/></s:Body></s:Envelope>"#;

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let body = client
        .post(xaddr)
        .header("Content-Type", "application/soap+xml; charset=utf-8")
        .body(envelope)
        .send()
        .await?
        .text()
        .await?;

    if let Some(v) = extract_between(&body, "Manufacturer>", "</") {
        device.manufacturer.get_or_insert(v);
    }
    if let Some(v) = extract_between(&body, "Model>", "</") {
        device.model.get_or_insert(v);
    }
    if let Some(v) = extract_between(&body, "FirmwareVersion>", "</") {
        device.firmware.get_or_insert(v);
    }
    if let Some(v) = extract_between(&body, "SerialNumber>", "</") {
        device.serial_number.get_or_insert(v);
    }
    device.add_capability("ONVIF");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_request_matches_onvif_soap_template() {
        let request = create_probe_request(Some("dn:NetworkVideoTransmitter"));
        assert!(request.contains(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(request.contains("http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe"));
        assert!(request.contains("<d:Types>dn:NetworkVideoTransmitter</d:Types>"));
    }

    #[test]
    fn parses_probe_match_fields() {
        let xml = r#"<Envelope><Body><ProbeMatches><ProbeMatch><EndpointReference><Address>urn:uuid:abc</Address></EndpointReference><Types>dn:NetworkVideoTransmitter</Types><Scopes>onvif://www.onvif.org/name/Front%20Door onvif://www.onvif.org/hardware/AXIS-M3067</Scopes><XAddrs>http://192.168.1.50/onvif/device_service</XAddrs></ProbeMatch></ProbeMatches></Body></Envelope>"#;
        let pm = parse_probe_match(xml.as_bytes()).unwrap();
        assert_eq!(pm.endpoint, "urn:uuid:abc");
        assert_eq!(pm.xaddrs, vec!["http://192.168.1.50/onvif/device_service"]);
        assert_eq!(pm.scopes.len(), 2);
    }

    #[test]
    fn classifies_network_video_transmitter_as_camera() {
        assert_eq!(classify_types("dn:NetworkVideoTransmitter"), DeviceType::Camera);
    }

    #[test]
    fn scope_parsing_extracts_name_and_hardware() {
        let mut device = DiscoveredDevice::new("x", "192.168.1.50".parse().unwrap(), DiscoveryMethod::WsDiscovery);
        apply_scope(&mut device, "onvif://www.onvif.org/hardware/AXIS-M3067");
        assert_eq!(device.model.as_deref(), Some("AXIS-M3067"));
    }
}
