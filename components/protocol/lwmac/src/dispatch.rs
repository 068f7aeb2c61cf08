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

use core::fmt::Display;

use crate::*;

/// Why a received packet was not buffered. The packet has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// Packet lacks its MAC or interface header
    ProtocolViolation,
    /// Same broadcast is already buffered
    Duplicate,
    Full,
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchError::ProtocolViolation => write!(f, "unexpected packet layout"),
            DispatchError::Duplicate => write!(f, "duplicate broadcast"),
            DispatchError::Full => write!(f, "dispatch buffer full"),
        }
    }
}

/// Received packets waiting for the end of the listen period
///
/// Slots are filled bottom-up and the buffer is always emptied completely, so occupied slots
/// never have holes in between.
#[derive(Debug)]
pub struct DispatchBuffer {
    slots: [Option<Packet>; DISPATCH_BUFFER_SIZE],
}

impl Default for DispatchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchBuffer {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.slots.iter().map_while(Option::as_ref)
    }

    /// Hold back a parsed packet for delivery
    ///
    /// Broadcasts with the sequence number and source address of a buffered broadcast are
    /// dropped as duplicates.
    pub fn offer(&mut self, pkt: Packet) -> Result<(), DispatchError> {
        let (Some(header), Some(netif)) = (pkt.mac_header(), pkt.netif()) else {
            error!("packet without MAC or interface header, dropping");
            return Err(DispatchError::ProtocolViolation);
        };

        let bcast_seq_nr = match header {
            Header::Broadcast { seq_nr } => Some(*seq_nr),
            _ => None,
        };

        let mut free = None;
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(queued) = slot else {
                free = Some(i);
                break;
            };
            // filter same broadcasts, compare sequence number and source address
            if let (Some(seq_nr), Some(Header::Broadcast { seq_nr: queued_seq_nr })) =
                (bcast_seq_nr, queued.mac_header())
            {
                if seq_nr == *queued_seq_nr
                    && queued
                        .netif()
                        .is_some_and(|q| q.src_l2addr() == netif.src_l2addr())
                {
                    debug!("found duplicate broadcast packet, dropping");
                    return Err(DispatchError::Duplicate);
                }
            }
        }

        match free {
            Some(i) => {
                self.slots[i] = Some(pkt);
                Ok(())
            }
            None => {
                debug!("dispatch buffer full, dropping packet");
                Err(DispatchError::Full)
            }
        }
    }

    /// Deliver every buffered packet to the upper layers, without its MAC header
    ///
    /// Packets nobody accepts are dropped. The buffer is empty afterwards. Returns the number of
    /// accepted packets.
    pub fn flush(&mut self, upper: &mut impl Dispatch<Packet>) -> usize {
        let mut delivered = 0;
        for slot in self.slots.iter_mut() {
            let Some(mut pkt) = slot.take() else {
                continue;
            };
            pkt.strip_mac_header();
            let nettype = pkt.nettype;
            if upper.dispatch_receive(nettype, DEMUX_CTX_ALL, pkt) {
                delivered += 1;
            } else {
                debug!("unable to forward packet of type {}", nettype);
            }
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Upper layer that accepts one payload type and records what it got
    #[derive(Debug)]
    pub(crate) struct Upper {
        pub(crate) accepts: NetType,
        pub(crate) received: std::vec::Vec<Packet>,
        pub(crate) refused: usize,
    }

    impl Upper {
        pub(crate) fn new(accepts: NetType) -> Self {
            Self {
                accepts,
                received: std::vec::Vec::new(),
                refused: 0,
            }
        }
    }

    impl Dispatch<Packet> for Upper {
        fn dispatch_receive(&mut self, nettype: NetType, demux_ctx: u32, pkt: Packet) -> bool {
            assert_eq!(demux_ctx, DEMUX_CTX_ALL);
            if nettype == self.accepts {
                self.received.push(pkt);
                true
            } else {
                self.refused += 1;
                false
            }
        }
    }

    fn parsed(header: Header, src: &[u8], payload: &[u8]) -> Packet {
        let mut frame: heapless::Vec<u8, MAX_FRAME_LEN> =
            heapless::Vec::from_slice(&header.encode()).unwrap();
        frame.extend_from_slice(payload).unwrap();
        let mut pkt = Packet::received(
            NetType::Sixlowpan,
            &frame,
            NetifHeader::new(src, &[]).unwrap(),
        )
        .unwrap();
        parse_packet(&mut pkt).unwrap();
        pkt
    }

    fn broadcast(seq_nr: u8, src: &[u8]) -> Packet {
        parsed(Header::Broadcast { seq_nr }, src, &[seq_nr])
    }

    #[test]
    fn duplicate_broadcast_dropped() {
        let mut buffer = DispatchBuffer::new();
        assert_eq!(buffer.offer(broadcast(5, &[1, 2])), Ok(()));
        assert_eq!(
            buffer.offer(broadcast(5, &[1, 2])),
            Err(DispatchError::Duplicate)
        );
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn distinct_broadcasts_kept() {
        let mut buffer = DispatchBuffer::new();
        buffer.offer(broadcast(5, &[1, 2])).unwrap();
        buffer.offer(broadcast(6, &[1, 2])).unwrap();
        buffer.offer(broadcast(5, &[1, 3])).unwrap();
        // same prefix, different length
        buffer.offer(broadcast(5, &[1])).unwrap();
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn data_frames_are_not_deduplicated() {
        let mut buffer = DispatchBuffer::new();
        buffer.offer(parsed(Header::Data, &[1], &[9])).unwrap();
        buffer.offer(parsed(Header::Data, &[1], &[9])).unwrap();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn unparsed_packet_is_protocol_violation() {
        let mut buffer = DispatchBuffer::new();
        let pkt = Packet::received(
            NetType::Sixlowpan,
            &[3, 1],
            NetifHeader::new(&[1], &[2]).unwrap(),
        )
        .unwrap();
        assert_eq!(buffer.offer(pkt), Err(DispatchError::ProtocolViolation));
        assert!(buffer.is_empty());
    }

    #[test]
    fn full_buffer_keeps_existing_packets() {
        let mut buffer = DispatchBuffer::new();
        for seq_nr in 0..DISPATCH_BUFFER_SIZE as u8 {
            buffer.offer(broadcast(seq_nr, &[7])).unwrap();
        }
        assert_eq!(
            buffer.offer(broadcast(0xee, &[7])),
            Err(DispatchError::Full)
        );
        assert_eq!(buffer.len(), DISPATCH_BUFFER_SIZE);
        for (seq_nr, pkt) in buffer.iter().enumerate() {
            assert_eq!(
                pkt.mac_header(),
                Some(&Header::Broadcast {
                    seq_nr: seq_nr as u8
                })
            );
        }
    }

    #[test]
    fn flush_delivers_payload_and_netif() {
        let mut buffer = DispatchBuffer::new();
        buffer.offer(broadcast(1, &[7])).unwrap();
        buffer.offer(parsed(Header::Data, &[8], &[0xaa, 0xbb])).unwrap();

        let mut upper = Upper::new(NetType::Sixlowpan);
        assert_eq!(buffer.flush(&mut upper), 2);
        assert!(buffer.is_empty());
        assert_eq!(upper.received.len(), 2);

        let data = &upper.received[1];
        assert!(data.mac_header().is_none());
        assert_eq!(data.data(), &[0xaa, 0xbb]);
        assert_eq!(data.netif().unwrap().src_l2addr(), &[8]);
    }

    #[test]
    fn flush_empties_buffer_when_refused() {
        let mut buffer = DispatchBuffer::new();
        for seq_nr in 0..3 {
            buffer.offer(broadcast(seq_nr, &[7])).unwrap();
        }
        let mut upper = Upper::new(NetType::Ipv6);
        assert_eq!(buffer.flush(&mut upper), 0);
        assert_eq!(upper.refused, 3);
        assert!(buffer.is_empty());

        // buffer is usable again, the old broadcasts are forgotten
        assert_eq!(buffer.offer(broadcast(0, &[7])), Ok(()));
    }
}
