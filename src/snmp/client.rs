//! Minimal hand-rolled SNMPv2c client.
//!
//! Builds and parses just enough BER to issue a `GetRequest` for a handful
//! of scalar OIDs and decode the returned `VarBindList` - not a general
//! ASN.1 decoder.

use anyhow::{anyhow, bail, Context, Result};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::debug;

/// A decoded SNMP varbind value.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(Vec<u32>),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    IpAddress([u8; 4]),
    Null,
    /// SNMPv2 exception (noSuchObject/noSuchInstance/endOfMibView) or any tag
    /// this client does not interpret.
    Other(u8),
}

impl SnmpValue {
    /// Render as UTF-8 text if the value is an octet string; lossily for
    /// other binary content.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(*v as i64)
            }
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&[u32]> {
        match self {
            SnmpValue::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }
}

/// A target plus the community string used to reach it.
#[derive(Debug, Clone)]
pub struct SnmpClient {
    target: SocketAddr,
    community: String,
    timeout: Duration,
}

impl SnmpClient {
    pub fn new(host: std::net::IpAddr, port: u16, community: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: SocketAddr::new(host, port),
            community: community.into(),
            timeout,
        }
    }

    /// Issue a single SNMPv2c `GetRequest` for `oid` and return its value.
    pub fn get(&self, oid: &[u32]) -> Result<SnmpValue> {
        debug!(target = %self.target, oid = %oid_to_string(oid), "SNMP GET");
        let pdu = build_get_pdu(&self.community, oid);
        let response = self.send_receive(&pdu)?;
        let varbinds = decode_response(&response)?;
        varbinds
            .into_iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| anyhow!("empty SNMP response"))
    }

    fn send_receive(&self, pdu: &[u8]) -> Result<Vec<u8>> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind UDP socket")?;
        socket
            .set_read_timeout(Some(self.timeout))
            .context("failed to set socket timeout")?;
        socket
            .connect(self.target)
            .context("failed to connect to SNMP target")?;
        socket.send(pdu).context("failed to send SNMP PDU")?;

        let mut buf = vec![0u8; 1500];
        let len = socket.recv(&mut buf).context("SNMP request timed out")?;
        buf.truncate(len);
        Ok(buf)
    }
}

fn oid_to_string(oid: &[u32]) -> String {
    oid.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(".")
}

// ==================== BER encoding ====================

fn encode_length(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
    } else if len < 256 {
        buf.push(0x81);
        buf.push(len as u8);
    } else {
        buf.push(0x82);
        buf.push((len >> 8) as u8);
        buf.push((len & 0xff) as u8);
    }
}

fn encode_oid(oid: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    if oid.len() < 2 {
        return out;
    }
    out.push((oid[0] * 40 + oid[1]) as u8);
    for &component in &oid[2..] {
        if component < 128 {
            out.push(component as u8);
        } else {
            let mut parts = Vec::new();
            let mut val = component;
            parts.push((val & 0x7f) as u8);
            val >>= 7;
            while val > 0 {
                parts.push((val & 0x7f) as u8 | 0x80);
                val >>= 7;
            }
            parts.reverse();
            out.extend_from_slice(&parts);
        }
    }
    out
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    encode_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

/// GetRequest-PDU with a single varbind (OID, NULL).
fn build_get_pdu(community: &str, oid: &[u32]) -> Vec<u8> {
    let oid_tlv = tlv(0x06, &encode_oid(oid));
    let null_tlv = tlv(0x05, &[]);
    let varbind = tlv(0x30, &[oid_tlv, null_tlv].concat());
    let varbind_list = tlv(0x30, &varbind);

    let request_id: u32 = rand::random::<u16>() as u32;
    let mut pdu_content = Vec::new();
    pdu_content.extend_from_slice(&tlv(0x02, &request_id.to_be_bytes()));
    pdu_content.extend_from_slice(&tlv(0x02, &[0x00])); // error-status
    pdu_content.extend_from_slice(&tlv(0x02, &[0x00])); // error-index
    pdu_content.extend_from_slice(&varbind_list);
    let pdu = tlv(0xa0, &pdu_content); // GetRequest-PDU

    let mut message = Vec::new();
    message.extend_from_slice(&tlv(0x02, &[0x01])); // version: SNMPv2c = 1
    message.extend_from_slice(&tlv(0x04, community.as_bytes()));
    message.extend_from_slice(&pdu);

    tlv(0x30, &message)
}

// ==================== BER decoding ====================

/// Read one TLV at `pos`, returning (tag, content slice, position just past content).
fn read_tlv(data: &[u8], pos: usize) -> Result<(u8, &[u8], usize)> {
    if pos >= data.len() {
        bail!("truncated BER data");
    }
    let tag = data[pos];
    let (len, content_start) = read_length(data, pos + 1)?;
    let content_end = content_start
        .checked_add(len)
        .ok_or_else(|| anyhow!("BER length overflow"))?;
    if content_end > data.len() {
        bail!("BER length exceeds buffer");
    }
    Ok((tag, &data[content_start..content_end], content_end))
}

fn read_length(data: &[u8], pos: usize) -> Result<(usize, usize)> {
    if pos >= data.len() {
        bail!("truncated BER length");
    }
    let first = data[pos];
    if first & 0x80 == 0 {
        Ok((first as usize, pos + 1))
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || pos + 1 + n > data.len() {
            bail!("unsupported or truncated BER long-form length");
        }
        let mut len = 0usize;
        for &b in &data[pos + 1..pos + 1 + n] {
            len = (len << 8) | b as usize;
        }
        Ok((len, pos + 1 + n))
    }
}

fn decode_oid(content: &[u8]) -> Vec<u32> {
    if content.is_empty() {
        return vec![];
    }
    let mut oid = vec![(content[0] / 40) as u32, (content[0] % 40) as u32];
    let mut value: u32 = 0;
    for &b in &content[1..] {
        value = (value << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            oid.push(value);
            value = 0;
        }
    }
    oid
}

fn decode_uint(content: &[u8]) -> u32 {
    content.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn decode_int(content: &[u8]) -> i64 {
    if content.is_empty() {
        return 0;
    }
    let negative = content[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in content {
        value = (value << 8) | b as i64;
    }
    value
}

fn decode_value(tag: u8, content: &[u8]) -> SnmpValue {
    match tag {
        0x02 => SnmpValue::Integer(decode_int(content)),
        0x04 => SnmpValue::OctetString(content.to_vec()),
        0x05 => SnmpValue::Null,
        0x06 => SnmpValue::ObjectId(decode_oid(content)),
        0x40 if content.len() == 4 => {
            SnmpValue::IpAddress([content[0], content[1], content[2], content[3]])
        }
        0x41 => SnmpValue::Counter32(decode_uint(content)),
        0x42 => SnmpValue::Gauge32(decode_uint(content)),
        0x43 => SnmpValue::TimeTicks(decode_uint(content)),
        other => SnmpValue::Other(other),
    }
}

/// Decode a full SNMP message (version + community + PDU) into its varbinds.
fn decode_response(data: &[u8]) -> Result<Vec<(Vec<u32>, SnmpValue)>> {
    let (tag, message, _) = read_tlv(data, 0)?;
    if tag != 0x30 {
        bail!("expected SEQUENCE at top level, got tag {:#x}", tag);
    }

    let (_version_tag, _version, pos) = read_tlv(message, 0)?;
    let (_community_tag, _community, pos) = read_tlv(message, pos)?;
    let (pdu_tag, pdu, _) = read_tlv(message, pos)?;
    if pdu_tag != 0xa2 {
        bail!("expected GetResponse-PDU (0xa2), got tag {:#x}", pdu_tag);
    }

    let (_req_id_tag, _req_id, pos) = read_tlv(pdu, 0)?;
    let (_err_status_tag, err_status, pos) = read_tlv(pdu, pos)?;
    let status = decode_int(err_status);
    let (_err_index_tag, _err_index, pos) = read_tlv(pdu, pos)?;
    if status != 0 {
        bail!("SNMP agent returned error-status {}", status);
    }

    let (varbind_list_tag, varbind_list, _) = read_tlv(pdu, pos)?;
    if varbind_list_tag != 0x30 {
        bail!("expected VarBindList SEQUENCE, got tag {:#x}", varbind_list_tag);
    }

    let mut results = Vec::new();
    let mut vb_pos = 0;
    while vb_pos < varbind_list.len() {
        let (vb_tag, vb_content, next) = read_tlv(varbind_list, vb_pos)?;
        if vb_tag != 0x30 {
            bail!("expected VarBind SEQUENCE, got tag {:#x}", vb_tag);
        }
        let (oid_tag, oid_bytes, inner_pos) = read_tlv(vb_content, 0)?;
        if oid_tag != 0x06 {
            bail!("expected OBJECT IDENTIFIER in VarBind, got tag {:#x}", oid_tag);
        }
        let (value_tag, value_bytes, _) = read_tlv(vb_content, inner_pos)?;
        results.push((decode_oid(oid_bytes), decode_value(value_tag, value_bytes)));
        vb_pos = next;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_round_trips_through_encode_decode() {
        let oid = vec![1, 3, 6, 1, 2, 1, 1, 1, 0];
        let encoded = encode_oid(&oid);
        assert_eq!(decode_oid(&encoded), oid);
    }

    #[test]
    fn decode_response_extracts_octet_string_value() {
        let pdu = build_get_pdu("public", &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        // Re-parse our own GetRequest as if it were a GetResponse (same VarBind shape).
        let (_, message, _) = read_tlv(&pdu, 0).unwrap();
        let (_, _community, pos) = read_tlv(message, 0).unwrap();
        let (_, _community2, pos) = read_tlv(message, pos).unwrap();
        let (_, request_pdu, _) = read_tlv(message, pos).unwrap();

        // Build a synthetic GetResponse with a known OCTET STRING value.
        let (_, _req_id, pos2) = read_tlv(request_pdu, 0).unwrap();
        let (_, _err, pos3) = read_tlv(request_pdu, pos2).unwrap();
        let (_, _erridx, _) = read_tlv(request_pdu, pos3).unwrap();

        let oid_tlv = tlv(0x06, &encode_oid(&[1, 3, 6, 1, 2, 1, 1, 1, 0]));
        let value_tlv = tlv(0x04, b"Linux test-device 5.10");
        let varbind = tlv(0x30, &[oid_tlv, value_tlv].concat());
        let varbind_list = tlv(0x30, &varbind);
        let mut synthetic_pdu_content = Vec::new();
        synthetic_pdu_content.extend_from_slice(&tlv(0x02, &[0x01]));
        synthetic_pdu_content.extend_from_slice(&tlv(0x02, &[0x00]));
        synthetic_pdu_content.extend_from_slice(&tlv(0x02, &[0x00]));
        synthetic_pdu_content.extend_from_slice(&varbind_list);
        let synthetic_pdu = tlv(0xa2, &synthetic_pdu_content);

        let mut synthetic_message = Vec::new();
        synthetic_message.extend_from_slice(&tlv(0x02, &[0x01]));
        synthetic_message.extend_from_slice(&tlv(0x04, b"public"));
        synthetic_message.extend_from_slice(&synthetic_pdu);
        let synthetic = tlv(0x30, &synthetic_message);

        let varbinds = decode_response(&synthetic).unwrap();
        assert_eq!(varbinds.len(), 1);
        assert_eq!(
            varbinds[0].1.as_text().unwrap(),
            "Linux test-device 5.10"
        );
    }
}
