//! `DiscoveryManager` — composes every protocol service, fans work out
//! concurrently, and folds observations into one authoritative device set.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::settings::DiscoveryConfig;
use crate::events::{DiscoveryEvent, EventSink};
use crate::models::{DiscoveredDevice, DiscoveryResult};
use crate::services::{
    arp::ArpService, dhcp_hints::DhcpHintsService, icmp::IcmpService, mdns::MdnsService,
    portscan::PortScanService, snmp_probe::SnmpProbeService, ssdp::SsdpService,
    wsdiscovery::WsDiscoveryService, DiscoveryService,
};

/// Owns the authoritative `UniqueId -> DiscoveredDevice` map and the
/// cancellation token every in-flight discovery run is linked to.
pub struct DiscoveryManager {
    devices: Arc<DashMap<String, DiscoveredDevice>>,
    cancel: CancellationToken,
    config: DiscoveryConfig,
}

impl DiscoveryManager {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            devices: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Run every service against every local segment concurrently,
    /// re-emitting their events on `events` and folding results into the
    /// authoritative map.
    pub async fn discover_all(&self, events: EventSink) -> Vec<DiscoveredDevice> {
        let services = self.build_services();
        self.run_services(services, None, events).await
    }

    /// Run every service scoped to one CIDR segment.
    pub async fn discover_segment(&self, cidr: &str, events: EventSink) -> Vec<DiscoveredDevice> {
        let services = self.build_services();
        self.run_services(services, Some(cidr.to_string()), events).await
    }

    /// Run a single named service (`"ssdp"`, `"arp"`, ...), optionally
    /// scoped to one CIDR segment.
    pub async fn discover_with_method(
        &self,
        service_name: &str,
        cidr: Option<&str>,
        events: EventSink,
    ) -> anyhow::Result<DiscoveryResult> {
        let start_time = Utc::now();
        let service = self
            .build_services()
            .into_iter()
            .find(|s| s.service_name() == service_name)
            .ok_or_else(|| crate::error::DiscoveryError::UnknownService(service_name.to_string()))?;

        let method = service.method();
        let cancel = self.cancel.child_token();
        let devices = run_one(service, cidr.map(str::to_string), events, cancel).await;
        self.fold(devices.clone());

        Ok(DiscoveryResult {
            success: true,
            method,
            devices,
            start_time,
            end_time: Utc::now(),
            network_segment: cidr.map(str::to_string),
            error_message: None,
            metadata: HashMap::new(),
        })
    }

    pub fn get_discovered_devices(&self) -> Vec<DiscoveredDevice> {
        self.devices.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn clear_discovered_devices(&self) {
        self.devices.clear();
    }

    /// Cancel every in-flight discovery run launched from this manager.
    pub fn cancel_discovery(&self) {
        self.cancel.cancel();
    }

    fn build_services(&self) -> Vec<Box<dyn DiscoveryService>> {
        vec![
            Box::new(ArpService::default()),
            Box::new(IcmpService {
                timeout: Duration::from_millis(self.config.icmp_timeout_ms),
                concurrency: self.config.icmp_concurrency,
                sweep_cap: self.config.icmp_sweep_cap,
            }),
            Box::new(SsdpService {
                listen_window: Duration::from_millis(self.config.ssdp_timeout_ms),
                enrichment_timeout: Duration::from_millis(self.config.http_enrichment_timeout_ms),
            }),
            Box::new(WsDiscoveryService {
                listen_window: Duration::from_millis(self.config.wsdiscovery_timeout_ms),
                enrichment_timeout: Duration::from_millis(self.config.http_enrichment_timeout_ms),
                ..WsDiscoveryService::default()
            }),
            Box::new(WsDiscoveryService {
                listen_window: Duration::from_millis(self.config.wsdiscovery_timeout_ms),
                enrichment_timeout: Duration::from_millis(self.config.http_enrichment_timeout_ms),
                ..WsDiscoveryService::onvif()
            }),
            Box::new(MdnsService {
                listen_window: Duration::from_millis(self.config.mdns_timeout_ms),
            }),
            Box::new(SnmpProbeService {
                communities: self.config.community.clone(),
                concurrency: self.config.snmp_concurrency,
                ..SnmpProbeService::default()
            }),
            Box::new(PortScanService {
                ports: self.config.ports.clone(),
                connect_timeout: Duration::from_millis(self.config.port_scan_timeout_ms),
                host_concurrency: self.config.port_scan_host_concurrency,
                port_concurrency: self.config.port_scan_port_concurrency,
                ..PortScanService::default()
            }),
            Box::new(DhcpHintsService::default()),
        ]
    }

    async fn run_services(
        &self,
        services: Vec<Box<dyn DiscoveryService>>,
        segment: Option<String>,
        events: EventSink,
    ) -> Vec<DiscoveredDevice> {
        let cancel = self.cancel.child_token();
        let mut tasks = Vec::with_capacity(services.len());

        for service in services {
            let segment = segment.clone();
            let events = events.clone();
            let cancel = cancel.child_token();
            tasks.push(tokio::spawn(async move { run_one(service, segment, events, cancel).await }));
        }

        let mut all = Vec::new();
        for task in tasks {
            match task.await {
                Ok(devices) => all.extend(devices),
                Err(e) => error!(error = %e, "discovery service task panicked"),
            }
        }

        self.fold(all.clone());
        all
    }

    fn fold(&self, devices: Vec<DiscoveredDevice>) {
        for device in devices {
            match self.devices.get_mut(&device.unique_id) {
                Some(mut existing) => {
                    let merged = existing.clone().merge(device);
                    *existing = merged;
                }
                None => {
                    self.devices.insert(device.unique_id.clone(), device);
                }
            }
        }
    }
}

async fn run_one(
    service: Box<dyn DiscoveryService>,
    segment: Option<String>,
    events: EventSink,
    cancel: CancellationToken,
) -> Vec<DiscoveredDevice> {
    let name = service.service_name();
    info!(service = name, "starting discovery service");

    let timeout = service.default_timeout();
    let run = async {
        match &segment {
            Some(cidr) => service.discover_segment(cidr, events.clone(), cancel.clone()).await,
            None => service.discover_all(events.clone(), cancel.clone()).await,
        }
    };

    // A generous grace period on top of the service's own timeout covers
    // services that do their own internal bounding; this is a backstop,
    // not the primary timeout mechanism.
    match tokio::time::timeout(timeout + Duration::from_secs(5), run).await {
        Ok(devices) => devices,
        Err(_) => {
            let _ = events.send(DiscoveryEvent::error(service.method(), format!("{name} exceeded its timeout")));
            Vec::new()
        }
    }
}

/// A fresh manager sharing its event channel with the caller, for simple
/// call sites that don't need to hold onto the receiver.
pub fn new_event_channel() -> (EventSink, mpsc::UnboundedReceiver<DiscoveryEvent>) {
    mpsc::unbounded_channel()
}
