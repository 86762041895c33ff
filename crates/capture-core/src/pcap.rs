//! Capture file containers
//!
//! Supports the classic libpcap format (either byte order, microsecond or
//! nanosecond timestamps) and pcapng (section header, interface description,
//! enhanced and simple packet blocks). Every other pcapng block is skipped.
//! A record cut off at the end of the file ends reading with a warning,
//! which is what a capture interrupted mid-write looks like.

use std::time::Duration;

use nom::{
    bytes::complete::take,
    number::complete::{u16 as nom_u16, u32 as nom_u32},
    number::Endianness,
    sequence::tuple,
    IResult,
};
use tracing::{debug, warn};

use crate::error::{CaptureError, Result};

/// Classic pcap magic, microsecond timestamps
pub const PCAP_MAGIC_MICROS: u32 = 0xa1b2_c3d4;
/// Classic pcap magic, nanosecond timestamps
pub const PCAP_MAGIC_NANOS: u32 = 0xa1b2_3c4d;
/// pcapng Section Header Block type (also the file magic)
pub const PCAPNG_SHB: u32 = 0x0a0d_0d0a;
/// pcapng byte-order magic inside the Section Header Block
pub const PCAPNG_BYTE_ORDER_MAGIC: u32 = 0x1a2b_3c4d;

const PCAPNG_IDB: u32 = 0x0000_0001;
const PCAPNG_SPB: u32 = 0x0000_0003;
const PCAPNG_EPB: u32 = 0x0000_0006;
const PCAPNG_OPT_END: u16 = 0;
const PCAPNG_OPT_IF_TSRESOL: u16 = 9;

const CLASSIC_RECORD_HEADER_LEN: usize = 16;

type Parsed<'a, T> = IResult<&'a [u8], T>;

/// One link-layer frame read from the capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame<'a> {
    /// 1-based position of the frame in the capture
    pub number: u64,
    /// LINKTYPE_* value of the interface the frame was captured on
    pub link_type: u32,
    /// Capture time since the Unix epoch
    pub timestamp: Duration,
    /// Captured bytes, starting at the link-layer header
    pub data: &'a [u8],
}

/// Capture container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap { endian: Endianness, nanos: bool },
    PcapNg,
}

/// Identify the container format from the first four bytes
pub fn detect_format(data: &[u8]) -> Result<CaptureFormat> {
    let magic = match data.get(..4) {
        Some(bytes) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        None => return Err(CaptureError::Truncated { what: "file header", offset: 0 }),
    };

    match magic {
        PCAP_MAGIC_MICROS => Ok(CaptureFormat::Pcap { endian: Endianness::Little, nanos: false }),
        PCAP_MAGIC_NANOS => Ok(CaptureFormat::Pcap { endian: Endianness::Little, nanos: true }),
        m if m.swap_bytes() == PCAP_MAGIC_MICROS => {
            Ok(CaptureFormat::Pcap { endian: Endianness::Big, nanos: false })
        }
        m if m.swap_bytes() == PCAP_MAGIC_NANOS => {
            Ok(CaptureFormat::Pcap { endian: Endianness::Big, nanos: true })
        }
        PCAPNG_SHB => Ok(CaptureFormat::PcapNg),
        other => Err(CaptureError::UnknownFormat(other)),
    }
}

/// Read every frame of a pcap or pcapng capture
pub fn read_frames(data: &[u8]) -> Result<Vec<RawFrame<'_>>> {
    match detect_format(data)? {
        CaptureFormat::Pcap { endian, nanos } => read_classic(data, endian, nanos),
        CaptureFormat::PcapNg => read_pcapng(data),
    }
}

fn truncated(what: &'static str, offset: usize) -> impl Fn(nom::Err<nom::error::Error<&[u8]>>) -> CaptureError {
    move |_| CaptureError::Truncated { what, offset }
}

// magic, version_major, version_minor, thiszone, sigfigs, snaplen, network
fn classic_global_header(input: &[u8], endian: Endianness) -> Parsed<'_, u32> {
    let (input, (_magic, _major, _minor, _zone, _sigfigs, _snaplen, network)) = tuple((
        nom_u32(endian),
        nom_u16(endian),
        nom_u16(endian),
        nom_u32(endian),
        nom_u32(endian),
        nom_u32(endian),
        nom_u32(endian),
    ))(input)?;
    Ok((input, network))
}

// ts_sec, ts_frac, incl_len, orig_len
fn classic_record_header(input: &[u8], endian: Endianness) -> Parsed<'_, (u32, u32, u32, u32)> {
    tuple((nom_u32(endian), nom_u32(endian), nom_u32(endian), nom_u32(endian)))(input)
}

fn read_classic(data: &[u8], endian: Endianness, nanos: bool) -> Result<Vec<RawFrame<'_>>> {
    let (mut input, link_type) =
        classic_global_header(data, endian).map_err(truncated("pcap global header", 0))?;
    debug!(link_type, nanos, "reading classic pcap capture");

    let mut frames = Vec::new();
    let mut number = 0u64;

    while !input.is_empty() {
        let offset = data.len() - input.len();
        if input.len() < CLASSIC_RECORD_HEADER_LEN {
            warn!(offset, "capture ends inside a record header");
            break;
        }
        let (rest, (ts_sec, ts_frac, incl_len, _orig_len)) =
            classic_record_header(input, endian).map_err(truncated("record header", offset))?;

        let incl_len = incl_len as usize;
        if rest.len() < incl_len {
            warn!(offset, incl_len, available = rest.len(), "capture ends inside a record");
            break;
        }
        let (rest, frame) = take::<_, _, nom::error::Error<&[u8]>>(incl_len)(rest)
            .map_err(truncated("record data", offset))?;

        let frac = if nanos { u64::from(ts_frac) } else { u64::from(ts_frac) * 1_000 };
        number += 1;
        frames.push(RawFrame {
            number,
            link_type,
            timestamp: Duration::from_secs(u64::from(ts_sec)) + Duration::from_nanos(frac),
            data: frame,
        });
        input = rest;
    }

    Ok(frames)
}

#[derive(Debug, Clone, Copy)]
struct Interface {
    link_type: u32,
    units_per_second: u64,
}

fn read_u32(data: &[u8], offset: usize, endian: Endianness) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(match endian {
        Endianness::Big => u32::from_be_bytes(bytes),
        _ => u32::from_le_bytes(bytes),
    })
}

fn read_pcapng(data: &[u8]) -> Result<Vec<RawFrame<'_>>> {
    let mut frames = Vec::new();
    let mut interfaces: Vec<Interface> = Vec::new();
    let mut endian = Endianness::Little;
    let mut offset = 0usize;
    let mut number = 0u64;

    while offset < data.len() {
        if data.len() - offset < 12 {
            warn!(offset, "capture ends inside a block header");
            break;
        }

        let block_type = read_u32(data, offset, endian)
            .ok_or(CaptureError::Truncated { what: "block type", offset })?;

        if block_type == PCAPNG_SHB {
            let bom = read_u32(data, offset + 8, Endianness::Little)
                .ok_or(CaptureError::Truncated { what: "section header", offset })?;
            endian = if bom == PCAPNG_BYTE_ORDER_MAGIC {
                Endianness::Little
            } else if bom.swap_bytes() == PCAPNG_BYTE_ORDER_MAGIC {
                Endianness::Big
            } else {
                return Err(CaptureError::InvalidBlock {
                    offset,
                    reason: format!("bad byte-order magic 0x{:08x}", bom),
                });
            };
            interfaces.clear();
        }

        let total_len = read_u32(data, offset + 4, endian)
            .ok_or(CaptureError::Truncated { what: "block length", offset })? as usize;
        if total_len < 12 || total_len % 4 != 0 {
            return Err(CaptureError::InvalidBlock {
                offset,
                reason: format!("block length {} is not a multiple of 4 of at least 12", total_len),
            });
        }
        if data.len() - offset < total_len {
            warn!(offset, total_len, "capture ends inside a block");
            break;
        }

        let body = &data[offset + 8..offset + total_len - 4];
        match block_type {
            PCAPNG_IDB => {
                let (_, interface) = parse_interface(body, endian)
                    .map_err(truncated("interface description block", offset))?;
                debug!(
                    id = interfaces.len(),
                    link_type = interface.link_type,
                    units_per_second = interface.units_per_second,
                    "pcapng interface"
                );
                interfaces.push(interface);
            }
            PCAPNG_EPB => {
                let (_, (interface_id, ts_high, ts_low, captured_len, _orig_len)) = tuple((
                    nom_u32(endian),
                    nom_u32(endian),
                    nom_u32(endian),
                    nom_u32(endian),
                    nom_u32(endian),
                ))(body)
                .map_err(truncated("enhanced packet block", offset))?;

                let packet = body
                    .get(20..20 + captured_len as usize)
                    .ok_or(CaptureError::Truncated { what: "enhanced packet data", offset })?;
                number += 1;

                match interfaces.get(interface_id as usize) {
                    Some(interface) => {
                        let ticks = (u64::from(ts_high) << 32) | u64::from(ts_low);
                        frames.push(RawFrame {
                            number,
                            link_type: interface.link_type,
                            timestamp: ticks_to_duration(ticks, interface.units_per_second),
                            data: packet,
                        });
                    }
                    None => debug!(interface_id, offset, "packet for undeclared interface skipped"),
                }
            }
            PCAPNG_SPB => {
                let (packet, orig_len) = nom_u32::<_, nom::error::Error<&[u8]>>(endian)(body)
                    .map_err(truncated("simple packet block", offset))?;
                let len = (orig_len as usize).min(packet.len());
                number += 1;

                match interfaces.first() {
                    Some(interface) => frames.push(RawFrame {
                        number,
                        link_type: interface.link_type,
                        timestamp: Duration::ZERO,
                        data: &packet[..len],
                    }),
                    None => debug!(offset, "simple packet before any interface skipped"),
                }
            }
            PCAPNG_SHB => {}
            other => debug!(block_type = other, offset, "pcapng block skipped"),
        }

        offset += total_len;
    }

    Ok(frames)
}

// linktype, reserved, snaplen, options
fn parse_interface(body: &[u8], endian: Endianness) -> Parsed<'_, Interface> {
    let (mut input, (link_type, _reserved, _snaplen)) =
        tuple((nom_u16(endian), nom_u16(endian), nom_u32(endian)))(body)?;

    let mut units_per_second = 1_000_000u64;
    while input.len() >= 4 {
        let (rest, (code, len)) = tuple((nom_u16(endian), nom_u16(endian)))(input)?;
        if code == PCAPNG_OPT_END {
            break;
        }
        let padded = (len as usize + 3) & !3;
        if rest.len() < padded {
            break;
        }
        if code == PCAPNG_OPT_IF_TSRESOL && len >= 1 {
            units_per_second = tsresol_units(rest[0]);
        }
        input = &rest[padded..];
    }

    Ok((
        input,
        Interface {
            link_type: u32::from(link_type),
            units_per_second,
        },
    ))
}

// if_tsresol: high bit clear is a power of ten, set is a power of two
fn tsresol_units(value: u8) -> u64 {
    let exponent = u32::from(value & 0x7f);
    if value & 0x80 == 0 {
        10u64.checked_pow(exponent).unwrap_or(1_000_000)
    } else {
        2u64.checked_pow(exponent).unwrap_or(1_000_000)
    }
}

fn ticks_to_duration(ticks: u64, units_per_second: u64) -> Duration {
    let units = units_per_second.max(1);
    let secs = ticks / units;
    let nanos = (u128::from(ticks % units) * 1_000_000_000 / u128::from(units)) as u64;
    Duration::from_secs(secs) + Duration::from_nanos(nanos)
}
