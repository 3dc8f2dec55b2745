//! Per-interface multicast UDP socket setup shared by SSDP, WS-Discovery,
//! and mDNS: binding `0.0.0.0` alone is not enough for outgoing multicast
//! on multi-homed hosts, so each service joins the group once per
//! interface address plus keeps one `0.0.0.0` fallback socket for broad
//! reception.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

use crate::util::net::get_local_network_interfaces;

/// Build one non-blocking multicast UDP socket per local IPv4 address,
/// each bound to an ephemeral port on that address and joined to
/// `group`, plus a final fallback socket bound to `0.0.0.0`.
pub fn open_per_interface_sockets(group: Ipv4Addr) -> Vec<UdpSocket> {
    let mut sockets = Vec::new();

    for iface in get_local_network_interfaces() {
        for addr in iface.ipv4_addresses {
            if let Some(socket) = build_socket(group, Some(addr.ip_address)) {
                sockets.push(socket);
            }
        }
    }

    if let Some(socket) = build_socket(group, None) {
        sockets.push(socket);
    }

    sockets
}

fn build_socket(group: Ipv4Addr, bind_addr: Option<Ipv4Addr>) -> Option<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).ok()?;
    socket.set_reuse_address(true).ok()?;
    #[cfg(unix)]
    socket.set_reuse_port(true).ok();

    let bind_ip = bind_addr.unwrap_or(Ipv4Addr::UNSPECIFIED);
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(bind_ip, 0)).into()).ok()?;

    let join_interface = bind_addr.unwrap_or(Ipv4Addr::UNSPECIFIED);
    socket.set_multicast_if_v4(&join_interface).ok();
    socket.join_multicast_v4(&group, &join_interface).ok();
    socket.set_nonblocking(true).ok()?;

    UdpSocket::from_std(socket.into()).ok()
}

/// Send `payload` to `group:port` from every socket in the list.
pub async fn send_from_all(sockets: &[UdpSocket], group: Ipv4Addr, port: u16, payload: &[u8]) {
    let dest = SocketAddr::V4(SocketAddrV4::new(group, port));
    for socket in sockets {
        let _ = socket.send_to(payload, dest).await;
    }
}
