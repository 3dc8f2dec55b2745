//! Bounded-parallelism TCP connect-scan of the curated port list.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceService, DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::ports::{self, CURATED_PORTS};
use crate::util::net;

use super::DiscoveryService;

pub struct PortScanService {
    pub ports: Vec<u16>,
    pub connect_timeout: Duration,
    pub banner_timeout: Duration,
    pub host_concurrency: usize,
    pub port_concurrency: usize,
}

impl Default for PortScanService {
    fn default() -> Self {
        Self {
            ports: CURATED_PORTS.to_vec(),
            connect_timeout: Duration::from_secs(1),
            banner_timeout: Duration::from_secs(2),
            host_concurrency: 20,
            port_concurrency: 100,
        }
    }
}

#[async_trait]
impl DiscoveryService for PortScanService {
    fn service_name(&self) -> &'static str {
        "portscan"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::PortScan
    }

    fn default_timeout(&self) -> Duration {
        self.connect_timeout
    }

    async fn discover_all(&self, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let mut devices = Vec::new();
        for segment in net::get_local_network_segments() {
            if cancel.is_cancelled() {
                break;
            }
            devices.extend(self.discover_segment(&segment, events.clone(), cancel.clone()).await);
        }
        devices
    }

    async fn discover_segment(&self, cidr: &str, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let hosts = net::get_ip_addresses_in_segment(cidr);
        if hosts.is_empty() {
            return Vec::new();
        }

        let host_semaphore = Arc::new(Semaphore::new(self.host_concurrency));
        let total = hosts.len();
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut tasks = Vec::with_capacity(total);

        for host in hosts {
            if cancel.is_cancelled() {
                break;
            }
            let host_semaphore = host_semaphore.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            let completed = completed.clone();
            let ports = self.ports.clone();
            let connect_timeout = self.connect_timeout;
            let banner_timeout = self.banner_timeout;
            let port_concurrency = self.port_concurrency;

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = host_semaphore.acquire().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let device = scan_host(host, &ports, connect_timeout, banner_timeout, port_concurrency).await;

                let n = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if n % 10 == 0 || n == total {
                    emit(&events, DiscoveryEvent::progress(DiscoveryMethod::PortScan, n, total, host.to_string(), "scanning"));
                }
                device
            }));
        }

        let mut devices = Vec::new();
        for task in tasks {
            if let Ok(Some(device)) = task.await {
                emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::PortScan));
                devices.push(device);
            }
        }
        devices
    }
}

async fn scan_host(
    host: Ipv4Addr,
    ports: &[u16],
    connect_timeout: Duration,
    banner_timeout: Duration,
    port_concurrency: usize,
) -> Option<DiscoveredDevice> {
    let semaphore = Arc::new(Semaphore::new(port_concurrency));
    let mut tasks = Vec::with_capacity(ports.len());
    for &port in ports {
        let semaphore = semaphore.clone();
        tasks.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            if net::is_port_open(host, port, connect_timeout).await {
                let banner = read_banner(host, port, banner_timeout).await;
                Some((port, banner))
            } else {
                None
            }
        }));
    }

    let mut open: Vec<(u16, Option<String>)> = Vec::new();
    for task in tasks {
        if let Ok(Some(result)) = task.await {
            open.push(result);
        }
    }
    if open.is_empty() {
        return None;
    }
    open.sort_by_key(|(port, _)| *port);

    let mut device = DiscoveredDevice::new(host.to_string(), host, DiscoveryMethod::PortScan);
    device.ports = open.iter().map(|(p, _)| *p).collect();
    device.port = ports::primary_port(&device.ports).unwrap_or(0);

    for (port, banner) in &open {
        let name = ports::service_name_for_port(*port);
        let mut service = DeviceService::new(name, *port, "TCP").with_property("ScanResult", "Open");
        if let Some(banner) = banner {
            service = service.with_property("Banner", banner.clone());
        }
        device.services.insert(format!("{}/{}", name, port), service);
    }

    device.device_type = classify(&device.ports);
    Some(device)
}

async fn read_banner(host: Ipv4Addr, port: u16, timeout: Duration) -> Option<String> {
    let addr = std::net::SocketAddr::new(std::net::IpAddr::V4(host), port);
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr)).await.ok()?.ok()?;
    let mut buf = vec![0u8; 256];
    let n = tokio::time::timeout(timeout, stream.read(&mut buf)).await.ok()?.ok()?;
    if n == 0 {
        return None;
    }
    let text = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn classify(open_ports: &[u16]) -> DeviceType {
    let has = |p: u16| open_ports.contains(&p);
    let has_web = has(80) || has(8080) || has(8000);

    if (has(554) || has(8554)) && has_web {
        DeviceType::Camera
    } else if has(631) && has_web {
        DeviceType::Printer
    } else if has(23) && has(80) {
        DeviceType::Router
    } else if has(631) || has(9100) || has(515) {
        DeviceType::Printer
    } else if has(22) && open_ports.len() == 1 {
        DeviceType::Server
    } else if has(139) || has(445) {
        DeviceType::Workstation
    } else if has(3306) || has(5432) || has(1433) {
        DeviceType::Server
    } else {
        DeviceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rtsp_and_web_as_camera() {
        assert_eq!(classify(&[80, 554]), DeviceType::Camera);
    }

    #[test]
    fn classifies_telnet_and_web_as_router() {
        assert_eq!(classify(&[23, 80]), DeviceType::Router);
    }

    #[test]
    fn classifies_lone_ssh_as_server() {
        assert_eq!(classify(&[22]), DeviceType::Server);
    }
}
