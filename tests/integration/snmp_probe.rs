//! SNMP client against a real loopback UDP fixture agent.

use landisco::snmp::SnmpClient;
use std::net::UdpSocket;
use std::time::Duration;

#[test]
fn get_decodes_a_real_wire_response() {
    let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let agent_addr = agent.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let mut buf = [0u8; 1500];
        let (_len, from) = agent.recv_from(&mut buf).unwrap();
        let response = build_get_response("public", &[1, 3, 6, 1, 2, 1, 1, 1, 0], b"Linux camera-nvr 4.9.0");
        agent.send_to(&response, from).unwrap();
    });

    let client = SnmpClient::new(agent_addr.ip(), agent_addr.port(), "public", Duration::from_secs(2));
    let value = client.get(&[1, 3, 6, 1, 2, 1, 1, 1, 0]).expect("SNMP GET should succeed against the fixture agent");

    assert_eq!(value.as_text().as_deref(), Some("Linux camera-nvr 4.9.0"));
    handle.join().unwrap();
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 128 {
        out.push(content.len() as u8);
    } else {
        out.push(0x81);
        out.push(content.len() as u8);
    }
    out.extend_from_slice(content);
    out
}

fn encode_oid(oid: &[u32]) -> Vec<u8> {
    let mut out = vec![(oid[0] * 40 + oid[1]) as u8];
    for &c in &oid[2..] {
        out.push(c as u8); // every component here is < 128
    }
    out
}

fn build_get_response(community: &str, oid: &[u32], value: &[u8]) -> Vec<u8> {
    let oid_tlv = tlv(0x06, &encode_oid(oid));
    let value_tlv = tlv(0x04, value);
    let varbind = tlv(0x30, &[oid_tlv, value_tlv].concat());
    let varbind_list = tlv(0x30, &varbind);

    let mut pdu_content = Vec::new();
    pdu_content.extend_from_slice(&tlv(0x02, &[0x00, 0x01]));
    pdu_content.extend_from_slice(&tlv(0x02, &[0x00]));
    pdu_content.extend_from_slice(&tlv(0x02, &[0x00]));
    pdu_content.extend_from_slice(&varbind_list);
    let pdu = tlv(0xa2, &pdu_content);

    let mut message = Vec::new();
    message.extend_from_slice(&tlv(0x02, &[0x01]));
    message.extend_from_slice(&tlv(0x04, community.as_bytes()));
    message.extend_from_slice(&pdu);

    tlv(0x30, &message)
}
