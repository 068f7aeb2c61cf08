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

use std::{cell::Cell, cmp::Ordering, collections::BinaryHeap, rc::Rc};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rand::RngCore;

use lwmac::{Header, L2Addr, NetifHeader, Packet, Ticks};
use mac_api::{DeviceError, Dispatch, NetDevice, NetOpt, NetOptState, NetType, TickSource};

/// Address of the simulated lwMAC node
pub const OWN_ADDR: [u8; 2] = [0x0a, 0x00];
pub const BROADCAST_ADDR: [u8; 2] = [0xff, 0xff];

/// Real-time counter shared between the simulation loop and the MAC
#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<Ticks>>);

impl SimClock {
    pub fn set(&self, ticks: Ticks) {
        self.0.set(ticks);
    }
}

impl TickSource for SimClock {
    fn now(&self) -> Ticks {
        self.0.get()
    }
}

/// Radio that only keeps its power state
#[derive(Debug)]
pub struct SimDevice {
    addr: [u8; 2],
    state: NetOptState,
    state_changes: usize,
}

impl SimDevice {
    pub fn new(addr: [u8; 2]) -> Self {
        Self {
            addr,
            state: NetOptState::Off,
            state_changes: 0,
        }
    }

    /// Frames are only received while the radio is idle listening
    pub fn is_listening(&self) -> bool {
        self.state == NetOptState::Idle
    }

    pub fn state_changes(&self) -> usize {
        self.state_changes
    }
}

impl NetDevice for SimDevice {
    fn set(&mut self, opt: NetOpt, value: &[u8]) -> Result<(), DeviceError> {
        match opt {
            NetOpt::State => {
                let state = value.first().copied().ok_or(DeviceError::InvalidValue)?;
                self.state = NetOptState::try_from(state).map_err(|_| DeviceError::InvalidValue)?;
                self.state_changes += 1;
                Ok(())
            }
            NetOpt::Address => Err(DeviceError::NotSupported),
        }
    }

    fn get(&mut self, opt: NetOpt, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let state = [self.state as u8];
        let value: &[u8] = match opt {
            NetOpt::State => &state,
            NetOpt::Address => &self.addr,
        };
        let dst = buf.get_mut(..value.len()).ok_or(DeviceError::InvalidValue)?;
        dst.copy_from_slice(value);
        Ok(value.len())
    }
}

/// Upper layer that takes every 6LoWPAN packet
#[derive(Debug, Default)]
pub struct UpperLayer {
    pub received: Vec<Packet>,
}

impl Dispatch<Packet> for UpperLayer {
    fn dispatch_receive(&mut self, nettype: NetType, _demux_ctx: u32, pkt: Packet) -> bool {
        if nettype != NetType::Sixlowpan {
            return false;
        }
        trace!("upper layer got {} bytes", pkt.data().len());
        self.received.push(pkt);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficKind {
    Broadcast,
    /// Unicast to the simulated node
    Data,
    /// Unicast to some other node
    Foreign,
    WakeupAck,
}

impl TrafficKind {
    pub fn random(rng: &mut impl RngCore) -> Self {
        match rng.next_u32() % 100 {
            0..=39 => TrafficKind::Broadcast,
            40..=69 => TrafficKind::Data,
            70..=84 => TrafficKind::Foreign,
            _ => TrafficKind::WakeupAck,
        }
    }
}

/// One-hop neighbor of the simulated node
#[derive(Debug)]
pub struct SimNeighbor {
    addr: L2Addr,
    seq_nr: u8,
}

impl SimNeighbor {
    pub fn new(index: u8) -> Self {
        Self {
            addr: L2Addr::new(&[0x0b, index]).unwrap_or_default(),
            seq_nr: 0,
        }
    }

    pub fn addr(&self) -> &L2Addr {
        &self.addr
    }

    /// Build a frame as the device would hand it to the MAC
    ///
    /// `now` is the neighbor's counter value, a WA reports it as current phase.
    pub fn frame(&mut self, kind: TrafficKind, now: Ticks) -> Option<Packet> {
        let own = L2Addr::new(&OWN_ADDR)?;
        let (header, dst): (Header, &[u8]) = match kind {
            TrafficKind::Broadcast => {
                self.seq_nr = self.seq_nr.wrapping_add(1);
                (
                    Header::Broadcast {
                        seq_nr: self.seq_nr,
                    },
                    &BROADCAST_ADDR,
                )
            }
            TrafficKind::Data => (Header::Data, &OWN_ADDR),
            TrafficKind::Foreign => (Header::Data, &[0x0c, 0x00]),
            TrafficKind::WakeupAck => (
                Header::WakeupAck {
                    dst_addr: own,
                    current_phase: now,
                },
                &BROADCAST_ADDR,
            ),
        };

        let mut frame = header.encode().to_vec();
        if matches!(header, Header::Data | Header::Broadcast { .. }) {
            frame.extend_from_slice(&[self.seq_nr, self.addr.as_slice()[1]]);
        }
        let netif = NetifHeader::new(self.addr.as_slice(), dst)?;
        Packet::received(NetType::Sixlowpan, &frame, netif)
    }

    /// Copy of the last broadcast, as sent again by a retransmission
    pub fn repeat_broadcast(&self) -> Option<Packet> {
        let header = Header::Broadcast {
            seq_nr: self.seq_nr,
        };
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&[self.seq_nr, self.addr.as_slice()[1]]);
        let netif = NetifHeader::new(self.addr.as_slice(), &BROADCAST_ADDR)?;
        Packet::received(NetType::Sixlowpan, &frame, netif)
    }
}

#[derive(Debug)]
pub enum EventKind {
    /// Timer the MAC asked for
    MacTimer(Ticks),
    /// Frame of a neighbor reaches the radio
    Frame(Packet),
    /// Neighbor wakes up at its phase
    NeighborWakeup(usize),
}

#[derive(Debug)]
pub struct Event {
    /// Simulation time in ticks, never wraps
    pub time: u64,
    /// Insertion order, events at the same time are handled first come first served
    seq: u64,
    pub kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed, the heap pops the earliest event first
        (other.time, other.seq).cmp(&(self.time, self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    seq: u64,
}

impl EventQueue {
    pub fn push(&mut self, time: u64, kind: EventKind) {
        self.seq += 1;
        self.heap.push(Event {
            time,
            seq: self.seq,
            kind,
        });
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_pop_in_time_order() {
        let mut queue = EventQueue::default();
        queue.push(20, EventKind::MacTimer(20));
        queue.push(10, EventKind::NeighborWakeup(1));
        queue.push(10, EventKind::NeighborWakeup(2));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|e| match e.kind {
                EventKind::MacTimer(t) => (e.time, t as usize),
                EventKind::NeighborWakeup(i) => (e.time, i),
                EventKind::Frame(_) => unreachable!(),
            })
            .collect();
        assert_eq!(order, [(10, 1), (10, 2), (20, 20)]);
    }

    #[test]
    fn device_keeps_state() {
        let mut dev = SimDevice::new(OWN_ADDR);
        assert!(!dev.is_listening());
        dev.set(NetOpt::State, &[NetOptState::Idle as u8]).unwrap();
        assert!(dev.is_listening());
        assert_eq!(dev.set(NetOpt::State, &[42]), Err(DeviceError::InvalidValue));
        assert_eq!(dev.set(NetOpt::State, &[]), Err(DeviceError::InvalidValue));

        let mut buf = [0u8; 8];
        assert_eq!(dev.get(NetOpt::Address, &mut buf), Ok(2));
        assert_eq!(&buf[..2], &OWN_ADDR);
        assert_eq!(dev.get(NetOpt::Address, &mut [0u8; 1]), Err(DeviceError::InvalidValue));
        assert_eq!(dev.state_changes(), 1);
    }

    #[test]
    fn neighbor_frames_parse() {
        let mut neighbor = SimNeighbor::new(3);
        let mut pkt = neighbor.frame(TrafficKind::Broadcast, 0).unwrap();
        let info = lwmac::parse_packet(&mut pkt).unwrap();
        assert_eq!(info.header, &Header::Broadcast { seq_nr: 1 });
        assert_eq!(info.src_addr.as_slice(), &[0x0b, 3]);

        let mut repeated = neighbor.repeat_broadcast().unwrap();
        assert_eq!(lwmac::parse_packet(&mut repeated).unwrap().header, &Header::Broadcast { seq_nr: 1 });

        let mut wa = neighbor.frame(TrafficKind::WakeupAck, 1234).unwrap();
        let info = lwmac::parse_packet(&mut wa).unwrap();
        assert_eq!(info.dst_addr.as_slice(), &OWN_ADDR);
        assert!(matches!(info.header, Header::WakeupAck { current_phase: 1234, .. }));
    }
}
