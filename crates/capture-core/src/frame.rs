//! Link, network and transport layer decoding
//!
//! Turns a captured frame into the transport payload plus its endpoints.
//! Frames that do not carry UDP or TCP over IPv4/IPv6 decode to `None`,
//! as do non-first IP fragments.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u8},
    sequence::tuple,
    IResult,
};

pub const LINKTYPE_NULL: u32 = 0;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_RAW: u32 = 101;
pub const LINKTYPE_LOOP: u32 = 108;
pub const LINKTYPE_LINUX_SLL: u32 = 113;
pub const LINKTYPE_IPV4: u32 = 228;
pub const LINKTYPE_IPV6: u32 = 229;
pub const LINKTYPE_LINUX_SLL2: u32 = 276;
// BSD/OpenBSD DLT values some writers still put in the header for raw IP
const LINKTYPE_RAW_BSD: u32 = 12;
const LINKTYPE_RAW_OPENBSD: u32 = 14;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;

const IPPROTO_HOPOPTS: u8 = 0;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;
const IPPROTO_ROUTING: u8 = 43;
const IPPROTO_FRAGMENT: u8 = 44;
const IPPROTO_DSTOPTS: u8 = 60;

/// Transport protocol that carried a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "UDP"),
            Transport::Tcp => write!(f, "TCP"),
        }
    }
}

/// A transport payload with its endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub source: SocketAddr,
    pub destination: SocketAddr,
    pub transport: Transport,
    pub payload: &'a [u8],
}

struct IpPacket<'a> {
    source: IpAddr,
    destination: IpAddr,
    protocol: u8,
    payload: &'a [u8],
}

/// Decode a captured frame down to its UDP or TCP payload
pub fn decode_frame(link_type: u32, data: &[u8]) -> Option<Segment<'_>> {
    let ip = match link_type {
        LINKTYPE_ETHERNET => ethernet(data).ok().map(|(rest, ethertype)| (ethertype, rest)),
        LINKTYPE_LINUX_SLL => data.get(16..).map(|rest| (u16::from_be_bytes([data[14], data[15]]), rest)),
        LINKTYPE_LINUX_SLL2 => data.get(20..).map(|rest| (u16::from_be_bytes([data[0], data[1]]), rest)),
        LINKTYPE_NULL | LINKTYPE_LOOP => data.get(4..).and_then(|rest| Some((version_ethertype(rest)?, rest))),
        LINKTYPE_RAW | LINKTYPE_IPV4 | LINKTYPE_IPV6 | LINKTYPE_RAW_BSD | LINKTYPE_RAW_OPENBSD => {
            Some((version_ethertype(data)?, data))
        }
        _ => None,
    }?;

    let packet = match ip {
        (ETHERTYPE_IPV4, rest) => ipv4(rest)?,
        (ETHERTYPE_IPV6, rest) => ipv6(rest)?,
        _ => return None,
    };

    match packet.protocol {
        IPPROTO_UDP => udp(&packet),
        IPPROTO_TCP => tcp(&packet),
        _ => None,
    }
}

// Raw IP link types carry no ethertype; use the IP version nibble instead
fn version_ethertype(data: &[u8]) -> Option<u16> {
    match data.first()? >> 4 {
        4 => Some(ETHERTYPE_IPV4),
        6 => Some(ETHERTYPE_IPV6),
        _ => None,
    }
}

// dst MAC, src MAC, ethertype, then any number of 802.1Q / 802.1ad tags
fn ethernet(input: &[u8]) -> IResult<&[u8], u16> {
    let (mut input, (_dst, _src, mut ethertype)) = tuple((take(6usize), take(6usize), be_u16))(input)?;
    while ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
        let (rest, (_tci, inner)) = tuple((be_u16, be_u16))(input)?;
        ethertype = inner;
        input = rest;
    }
    Ok((input, ethertype))
}

fn ipv4(data: &[u8]) -> Option<IpPacket<'_>> {
    let header_len = usize::from(data.first()? & 0x0f) * 4;
    if header_len < 20 || data.len() < header_len {
        return None;
    }

    let total_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
    let fragment_offset = u16::from_be_bytes([data[6], data[7]]) & 0x1fff;
    if fragment_offset != 0 {
        return None;
    }

    // Some capture setups record a zero total length (TSO); trust the frame then
    let end = if total_len >= header_len { total_len.min(data.len()) } else { data.len() };

    Some(IpPacket {
        source: IpAddr::V4(Ipv4Addr::new(data[12], data[13], data[14], data[15])),
        destination: IpAddr::V4(Ipv4Addr::new(data[16], data[17], data[18], data[19])),
        protocol: data[9],
        payload: &data[header_len..end],
    })
}

fn ipv6(data: &[u8]) -> Option<IpPacket<'_>> {
    if data.len() < 40 {
        return None;
    }
    let payload_len = usize::from(u16::from_be_bytes([data[4], data[5]]));
    let source: [u8; 16] = data[8..24].try_into().ok()?;
    let destination: [u8; 16] = data[24..40].try_into().ok()?;

    let end = if payload_len == 0 { data.len() } else { (40 + payload_len).min(data.len()) };
    let mut payload = &data[40..end];
    let mut next = data[6];

    loop {
        match next {
            IPPROTO_HOPOPTS | IPPROTO_ROUTING | IPPROTO_DSTOPTS => {
                let (_, (following, len)) = tuple((be_u8::<_, nom::error::Error<&[u8]>>, be_u8))(payload).ok()?;
                let skip = (usize::from(len) + 1) * 8;
                next = following;
                payload = payload.get(skip..)?;
            }
            IPPROTO_FRAGMENT => {
                let header = payload.get(..8)?;
                if u16::from_be_bytes([header[2], header[3]]) >> 3 != 0 {
                    return None;
                }
                next = header[0];
                payload = &payload[8..];
            }
            _ => break,
        }
    }

    Some(IpPacket {
        source: IpAddr::V6(Ipv6Addr::from(source)),
        destination: IpAddr::V6(Ipv6Addr::from(destination)),
        protocol: next,
        payload,
    })
}

fn udp<'a>(packet: &IpPacket<'a>) -> Option<Segment<'a>> {
    let data = packet.payload;
    if data.len() < 8 {
        return None;
    }
    let source_port = u16::from_be_bytes([data[0], data[1]]);
    let destination_port = u16::from_be_bytes([data[2], data[3]]);
    let length = usize::from(u16::from_be_bytes([data[4], data[5]]));
    let end = if length >= 8 { length.min(data.len()) } else { data.len() };

    Some(Segment {
        source: SocketAddr::new(packet.source, source_port),
        destination: SocketAddr::new(packet.destination, destination_port),
        transport: Transport::Udp,
        payload: &data[8..end],
    })
}

fn tcp<'a>(packet: &IpPacket<'a>) -> Option<Segment<'a>> {
    let data = packet.payload;
    if data.len() < 20 {
        return None;
    }
    let source_port = u16::from_be_bytes([data[0], data[1]]);
    let destination_port = u16::from_be_bytes([data[2], data[3]]);
    let data_offset = usize::from(data[12] >> 4) * 4;
    if data_offset < 20 || data.len() < data_offset {
        return None;
    }

    Some(Segment {
        source: SocketAddr::new(packet.source, source_port),
        destination: SocketAddr::new(packet.destination, destination_port),
        transport: Transport::Tcp,
        payload: &data[data_offset..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_udp(payload: &[u8]) -> Vec<u8> {
        let mut pkt = Vec::new();
        let total_len = (20 + 8 + payload.len()) as u16;
        pkt.push(0x45);
        pkt.push(0);
        pkt.extend_from_slice(&total_len.to_be_bytes());
        pkt.extend_from_slice(&[0; 4]);
        pkt.push(64);
        pkt.push(IPPROTO_UDP);
        pkt.extend_from_slice(&[0; 2]);
        pkt.extend_from_slice(&[10, 0, 0, 1]);
        pkt.extend_from_slice(&[10, 0, 0, 2]);
        pkt.extend_from_slice(&5060u16.to_be_bytes());
        pkt.extend_from_slice(&5062u16.to_be_bytes());
        pkt.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        pkt.extend_from_slice(&[0; 2]);
        pkt.extend_from_slice(payload);
        pkt
    }

    #[test]
    fn test_raw_ipv4_udp() {
        let frame = ipv4_udp(b"hello");
        let segment = decode_frame(LINKTYPE_RAW, &frame).unwrap();
        assert_eq!(segment.source, "10.0.0.1:5060".parse().unwrap());
        assert_eq!(segment.destination, "10.0.0.2:5062".parse().unwrap());
        assert_eq!(segment.transport, Transport::Udp);
        assert_eq!(segment.payload, b"hello");
    }

    #[test]
    fn test_vlan_tagged_ethernet() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x64]);
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(&ipv4_udp(b"sip"));
        let segment = decode_frame(LINKTYPE_ETHERNET, &frame).unwrap();
        assert_eq!(segment.payload, b"sip");
    }

    #[test]
    fn test_ethernet_trailer_is_ignored() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(&ipv4_udp(b"ab"));
        frame.extend_from_slice(&[0u8; 16]);
        let segment = decode_frame(LINKTYPE_ETHERNET, &frame).unwrap();
        assert_eq!(segment.payload, b"ab");
    }

    #[test]
    fn test_non_first_fragment_skipped() {
        let mut frame = ipv4_udp(b"tail");
        frame[6] = 0x00;
        frame[7] = 0xb9;
        assert!(decode_frame(LINKTYPE_RAW, &frame).is_none());
    }

    #[test]
    fn test_unknown_link_type() {
        assert!(decode_frame(147, &ipv4_udp(b"x")).is_none());
        assert!(decode_frame(LINKTYPE_ETHERNET, &[0u8; 8]).is_none());
    }
}
