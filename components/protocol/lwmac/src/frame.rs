//  _____       ______   ____
// |_   _|     |  ____|/ ____|  Institute of Embedded Systems
//   | |  _ __ | |__  | (___    Zurich University of Applied Sciences
//   | | | '_ \|  __|  \___ \   8401 Winterthur, Switzerland
//  _| |_| | | | |____ ____) |
// |_____|_| |_|______|_____/
//
// Copyright 2025 Institute of Embedded Systems at Zurich University of Applied Sciences.
// All rights reserved.
// SPDX-License-Identifier: MIT

//! MAC frame headers
//!
//! ```text
//! WR:        type (1) || dst_len (1) || dst_addr (L2ADDR_MAX_LEN)
//! WA:        type (1) || dst_len (1) || dst_addr (L2ADDR_MAX_LEN) || current_phase (4, BE)
//! DATA:      type (1)
//! BROADCAST: type (1) || seq_nr (1)
//! ```
//!
//! WR and WA are sent to the broadcast address but are meant for a single node, which is why
//! they carry their destination themselves.

use core::fmt::Display;
use serde::{Deserialize, Serialize};

use crate::*;

/// Size of an embedded address field: length byte plus fixed size storage
const ADDR_FIELD_LEN: usize = 1 + L2ADDR_MAX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameType {
    /// Wakeup request
    WakeupRequest = 1,
    /// Wakeup acknowledge
    WakeupAck = 2,
    Data = 3,
    Broadcast = 4,
}

impl FrameType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameType::WakeupRequest),
            2 => Some(FrameType::WakeupAck),
            3 => Some(FrameType::Data),
            4 => Some(FrameType::Broadcast),
            _ => None,
        }
    }

    /// Exact size of this kind's header on the wire
    pub const fn header_len(&self) -> usize {
        match self {
            FrameType::WakeupRequest => 1 + ADDR_FIELD_LEN,
            FrameType::WakeupAck => 1 + ADDR_FIELD_LEN + 4,
            FrameType::Data => 1,
            FrameType::Broadcast => 2,
        }
    }
}

/// Decoded MAC header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Header {
    WakeupRequest {
        dst_addr: L2Addr,
    },
    WakeupAck {
        dst_addr: L2Addr,
        /// Phase of the node sending the acknowledge
        current_phase: Phase,
    },
    Data,
    Broadcast {
        seq_nr: u8,
    },
}

/// Largest header, used to size encode buffers
pub const MAX_HEADER_LEN: usize = FrameType::WakeupAck.header_len();

impl Header {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Header::WakeupRequest { .. } => FrameType::WakeupRequest,
            Header::WakeupAck { .. } => FrameType::WakeupAck,
            Header::Data => FrameType::Data,
            Header::Broadcast { .. } => FrameType::Broadcast,
        }
    }

    /// Size of this header on the wire
    pub fn wire_len(&self) -> usize {
        self.frame_type().header_len()
    }

    /// Decode the header at the start of `frame`, trailing bytes are payload
    pub fn decode(frame: &[u8]) -> Result<Self, ParseError> {
        let tag = *frame.first().ok_or(ParseError::Truncated)?;
        let kind = FrameType::from_u8(tag).ok_or(ParseError::UnsupportedFrameType(tag))?;
        let frame = frame
            .get(..kind.header_len())
            .ok_or(ParseError::Truncated)?;

        Ok(match kind {
            FrameType::WakeupRequest => Header::WakeupRequest {
                dst_addr: decode_addr(&frame[1..])?,
            },
            FrameType::WakeupAck => {
                let phase = &frame[1 + ADDR_FIELD_LEN..];
                Header::WakeupAck {
                    dst_addr: decode_addr(&frame[1..])?,
                    current_phase: Phase::from_be_bytes([phase[0], phase[1], phase[2], phase[3]]),
                }
            }
            FrameType::Data => Header::Data,
            FrameType::Broadcast => Header::Broadcast { seq_nr: frame[1] },
        })
    }

    pub fn encode(&self) -> Vec<u8, MAX_HEADER_LEN> {
        let mut out = [0u8; MAX_HEADER_LEN];
        out[0] = self.frame_type() as u8;
        match self {
            Header::WakeupRequest { dst_addr } => encode_addr(dst_addr, &mut out[1..]),
            Header::WakeupAck {
                dst_addr,
                current_phase,
            } => {
                encode_addr(dst_addr, &mut out[1..]);
                out[1 + ADDR_FIELD_LEN..][..4].copy_from_slice(&current_phase.to_be_bytes());
            }
            Header::Data => {}
            Header::Broadcast { seq_nr } => out[1] = *seq_nr,
        }
        out[..self.wire_len()].iter().copied().collect()
    }
}

fn decode_addr(field: &[u8]) -> Result<L2Addr, ParseError> {
    let len = field[0] as usize;
    if len > L2ADDR_MAX_LEN {
        return Err(ParseError::DstAddrOverflow);
    }
    L2Addr::new(&field[1..1 + len]).ok_or(ParseError::DstAddrOverflow)
}

fn encode_addr(addr: &L2Addr, field: &mut [u8]) {
    field[0] = addr.len() as u8;
    field[1..1 + addr.len()].copy_from_slice(addr.as_slice());
}

/// Why a received frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Packet carries no interface header
    NoNetifHeader,
    UnsupportedFrameType(u8),
    /// Frame is shorter than the header of its type
    Truncated,
    /// Destination address does not fit into [`L2Addr`]
    DstAddrOverflow,
    /// Source address does not fit into [`L2Addr`]
    SrcAddrOverflow,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParseError::NoNetifHeader => write!(f, "no interface header"),
            ParseError::UnsupportedFrameType(tag) => write!(f, "unsupported frame type {}", tag),
            ParseError::Truncated => write!(f, "frame too short"),
            ParseError::DstAddrOverflow => write!(f, "destination address overflow"),
            ParseError::SrcAddrOverflow => write!(f, "source address overflow"),
        }
    }
}

/// Addressing of a received frame
///
/// Only valid as long as the packet it was parsed from is not modified.
#[derive(Debug)]
pub struct PacketInfo<'a> {
    pub src_addr: L2Addr,
    pub dst_addr: L2Addr,
    pub header: &'a Header,
}

/// Split the MAC header off a received packet and extract its addressing
///
/// The destination of WR and WA frames is taken from the MAC header, all other frames use the
/// interface header's destination. An address that does not fit is an error, it never gets
/// truncated.
pub fn parse_packet(pkt: &mut Packet) -> Result<PacketInfo<'_>, ParseError> {
    if pkt.netif().is_none() {
        return Err(ParseError::NoNetifHeader);
    }

    if pkt.mac_header().is_none() {
        let header = Header::decode(pkt.data())?;
        let len = header.wire_len();
        pkt.mark_mac_header(header, len);
    }

    let (Some(netif), Some(header)) = (pkt.netif(), pkt.mac_header()) else {
        return Err(ParseError::NoNetifHeader);
    };

    if netif.dst_l2addr().len() > L2ADDR_MAX_LEN {
        return Err(ParseError::DstAddrOverflow);
    }
    if netif.src_l2addr().len() > L2ADDR_MAX_LEN {
        return Err(ParseError::SrcAddrOverflow);
    }

    let dst_addr = match header {
        Header::WakeupRequest { dst_addr } | Header::WakeupAck { dst_addr, .. } => dst_addr.clone(),
        _ => L2Addr::new(netif.dst_l2addr()).ok_or(ParseError::DstAddrOverflow)?,
    };
    let src_addr = L2Addr::new(netif.src_l2addr()).ok_or(ParseError::SrcAddrOverflow)?;

    Ok(PacketInfo {
        src_addr,
        dst_addr,
        header,
    })
}

/// header as JSON to make it parseable
macro_rules! header_to_json_string {
    ($fmt:expr,$write:tt,$header:expr) => {
        match $header {
            Header::WakeupRequest { dst_addr } => {
                $write!($fmt, "{{\"kind\":\"wr\",\"dst_addr\":\"{}\"}}", dst_addr)
            }
            Header::WakeupAck {
                dst_addr,
                current_phase,
            } => $write!(
                $fmt,
                "{{\"kind\":\"wa\",\"dst_addr\":\"{}\",\"current_phase\":{}}}",
                dst_addr,
                current_phase
            ),
            Header::Data => $write!($fmt, "{{\"kind\":\"data\"}}"),
            Header::Broadcast { seq_nr } => {
                $write!($fmt, "{{\"kind\":\"broadcast\",\"seq_nr\":{}}}", seq_nr)
            }
        }
    };
}

impl Display for Header {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        header_to_json_string!(fmt, write, self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Header {
    fn format(&self, fmt: defmt::Formatter) {
        fn wrapper(header: &Header, fmt: defmt::Formatter) -> core::fmt::Result {
            header_to_json_string!(fmt, defmt_write_wrapper, header)
        }
        let _ = wrapper(self, fmt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(bytes: &[u8]) -> L2Addr {
        L2Addr::new(bytes).unwrap()
    }

    fn frame(header: &Header, payload: &[u8]) -> heapless::Vec<u8, MAX_FRAME_LEN> {
        let mut frame: heapless::Vec<u8, MAX_FRAME_LEN> =
            heapless::Vec::from_slice(&header.encode()).unwrap();
        frame.extend_from_slice(payload).unwrap();
        frame
    }

    fn received(header: &Header, payload: &[u8], src: &[u8], dst: &[u8]) -> Packet {
        Packet::received(
            NetType::Sixlowpan,
            &frame(header, payload),
            NetifHeader::new(src, dst).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn header_sizes() {
        assert_eq!(Header::Data.encode().len(), 1);
        assert_eq!(Header::Broadcast { seq_nr: 9 }.encode().as_slice(), &[4, 9]);
        let wr = Header::WakeupRequest {
            dst_addr: addr(&[0xbe, 0xef]),
        };
        assert_eq!(
            wr.encode().as_slice(),
            &[1, 2, 0xbe, 0xef, 0, 0, 0, 0, 0, 0]
        );
        let wa = Header::WakeupAck {
            dst_addr: addr(&[1]),
            current_phase: 0x0102_0304,
        };
        assert_eq!(wa.encode().len(), 14);
        assert_eq!(&wa.encode()[10..], &[1, 2, 3, 4]);
    }

    #[test]
    fn decode_rejects_short_frames() {
        assert_eq!(Header::decode(&[]), Err(ParseError::Truncated));
        assert_eq!(Header::decode(&[4]), Err(ParseError::Truncated));
        assert_eq!(Header::decode(&[1, 2, 0xbe]), Err(ParseError::Truncated));
        assert_eq!(
            Header::decode(&[9, 0, 0]),
            Err(ParseError::UnsupportedFrameType(9))
        );
    }

    #[test]
    fn decode_rejects_oversized_embedded_address() {
        let mut raw = [0u8; 10];
        raw[0] = 2;
        raw[1] = L2ADDR_MAX_LEN as u8 + 1;
        let mut wa = [0u8; 14];
        wa[..10].copy_from_slice(&raw);
        assert_eq!(Header::decode(&wa), Err(ParseError::DstAddrOverflow));
    }

    #[test]
    fn wakeup_frames_use_embedded_destination() {
        for header in [
            Header::WakeupRequest {
                dst_addr: addr(&[0x11, 0x22]),
            },
            Header::WakeupAck {
                dst_addr: addr(&[0x11, 0x22]),
                current_phase: 100,
            },
        ] {
            let mut pkt = received(&header, &[], &[0x33, 0x44], &[0xff, 0xff]);
            let info = parse_packet(&mut pkt).unwrap();
            assert_eq!(info.dst_addr, addr(&[0x11, 0x22]));
            assert_eq!(info.src_addr, addr(&[0x33, 0x44]));
            assert_eq!(info.header, &header);
        }
    }

    #[test]
    fn data_uses_interface_destination() {
        let mut pkt = received(&Header::Data, &[0xaa, 0xbb], &[0x33], &[0x11, 0x22]);
        let info = parse_packet(&mut pkt).unwrap();
        assert_eq!(info.dst_addr, addr(&[0x11, 0x22]));
        assert_eq!(info.header, &Header::Data);
        assert_eq!(pkt.data(), &[0xaa, 0xbb]);
    }

    #[test]
    fn broadcast_uses_interface_destination() {
        let header = Header::Broadcast { seq_nr: 9 };
        let mut pkt = received(&header, &[0x01], &[0x33], &[0xff, 0xff]);
        let info = parse_packet(&mut pkt).unwrap();
        assert_eq!(info.dst_addr, addr(&[0xff, 0xff]));
        assert_eq!(info.src_addr, addr(&[0x33]));
        assert_eq!(info.header, &header);
    }

    #[test]
    fn broadcast_without_interface_destination() {
        let header = Header::Broadcast { seq_nr: 7 };
        let mut pkt = received(&header, &[0x01], &[0x33], &[]);
        let info = parse_packet(&mut pkt).unwrap();
        assert!(info.dst_addr.is_empty());
        assert_eq!(info.header, &header);
    }

    #[test]
    fn parse_errors() {
        let mut pkt = Packet::new(NetType::Undef, &[3, 0]).unwrap();
        assert_eq!(parse_packet(&mut pkt).unwrap_err(), ParseError::NoNetifHeader);

        let mut pkt = Packet::received(NetType::Undef, &[0x42], NetifHeader::new(&[1], &[2]).unwrap())
            .unwrap();
        assert_eq!(
            parse_packet(&mut pkt).unwrap_err(),
            ParseError::UnsupportedFrameType(0x42)
        );

        let mut pkt = Packet::received(NetType::Undef, &[4], NetifHeader::new(&[1], &[2]).unwrap())
            .unwrap();
        assert_eq!(parse_packet(&mut pkt).unwrap_err(), ParseError::Truncated);

        let long = [0u8; L2ADDR_MAX_LEN + 1];
        let mut pkt = received(&Header::Data, &[], &[1], &long);
        assert_eq!(parse_packet(&mut pkt).unwrap_err(), ParseError::DstAddrOverflow);

        let mut pkt = received(&Header::Data, &[], &long, &[1]);
        assert_eq!(parse_packet(&mut pkt).unwrap_err(), ParseError::SrcAddrOverflow);
    }

    #[test]
    fn header_json() {
        assert_eq!(
            format!(
                "{}",
                Header::WakeupAck {
                    dst_addr: addr(&[0xab, 0x01]),
                    current_phase: 12
                }
            ),
            "{\"kind\":\"wa\",\"dst_addr\":\"ab:01\",\"current_phase\":12}"
        );
        assert_eq!(
            format!("{}", Header::Broadcast { seq_nr: 3 }),
            "{\"kind\":\"broadcast\",\"seq_nr\":3}"
        );
    }
}
