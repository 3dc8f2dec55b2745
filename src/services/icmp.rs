//! ICMP ping-sweep service.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DiscoveredDevice, DiscoveryMethod};
use crate::util::net;

use super::DiscoveryService;

pub struct IcmpService {
    pub timeout: Duration,
    pub concurrency: usize,
    pub sweep_cap: usize,
}

impl Default for IcmpService {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            concurrency: 25,
            sweep_cap: 254,
        }
    }
}

#[async_trait]
impl DiscoveryService for IcmpService {
    fn service_name(&self) -> &'static str {
        "icmp"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Icmp
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
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
        let mut hosts = net::get_ip_addresses_in_segment(cidr);
        let total_available = hosts.len();
        if hosts.len() > self.sweep_cap {
            warn!(segment = cidr, total = total_available, cap = self.sweep_cap, "truncating ICMP sweep to cap");
            hosts.truncate(self.sweep_cap);
        }
        let total = hosts.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut tasks = Vec::with_capacity(total);

        for host in hosts {
            if cancel.is_cancelled() {
                break;
            }
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            let completed = completed.clone();
            let timeout = self.timeout;

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let device = ping_one(host, timeout).await;

                let n = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if n % 10 == 0 || n == total {
                    emit(&events, DiscoveryEvent::progress(
                        DiscoveryMethod::Icmp, n, total, host.to_string(), "sweeping",
                    ));
                }
                device
            }));
        }

        let mut devices = Vec::new();
        for task in tasks {
            if let Ok(Some(device)) = task.await {
                emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::Icmp));
                devices.push(device);
            }
        }
        devices
    }
}

async fn ping_one(host: Ipv4Addr, timeout: Duration) -> Option<DiscoveredDevice> {
    if !net::ping_host(host, timeout).await {
        return None;
    }
    debug!(ip = %host, "ICMP reply");
    let mut device = DiscoveredDevice::new(host.to_string(), host, DiscoveryMethod::Icmp);
    device.is_online = true;
    if let Some(hostname) = tokio::time::timeout(Duration::from_secs(2), net::get_hostname(host))
        .await
        .ok()
        .flatten()
    {
        device.name = Some(hostname);
    }
    Some(device)
}
