//! Port-scan service against a real loopback TCP fixture.

use landisco::manager::new_event_channel;
use landisco::services::portscan::PortScanService;
use landisco::services::DiscoveryService;
use tokio::net::TcpListener;

#[tokio::test]
async fn finds_open_loopback_ports() {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port_a = listener_a.local_addr().unwrap().port();
    let port_b = listener_b.local_addr().unwrap().port();

    // Accept and immediately drop connections so the scan's connect
    // probe succeeds without needing a real protocol handshake.
    tokio::spawn(async move {
        loop {
            if listener_a.accept().await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        loop {
            if listener_b.accept().await.is_err() {
                break;
            }
        }
    });

    let service = PortScanService {
        ports: vec![port_a, port_b],
        connect_timeout: std::time::Duration::from_millis(500),
        banner_timeout: std::time::Duration::from_millis(200),
        host_concurrency: 4,
        port_concurrency: 4,
    };

    let (sink, _receiver) = new_event_channel();
    // 127.0.0.0/30 -> hosts 127.0.0.1 and 127.0.0.2, excluding network/broadcast.
    let devices = service.discover_segment("127.0.0.0/30", sink, Default::default()).await;

    let loopback = devices.iter().find(|d| d.ip_address == "127.0.0.1".parse().unwrap());
    let device = loopback.expect("127.0.0.1 should be reported with its open ports");
    assert_eq!(device.ports, {
        let mut expected = vec![port_a, port_b];
        expected.sort();
        expected
    });
    assert_eq!(device.services.len(), 2);
}
