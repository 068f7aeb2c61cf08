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

//! Scheduling and packet dispatch internals of a duty-cycled low power MAC
//!
//! Nodes sleep most of the time and wake up once per wakeup interval at their own phase. A
//! sender rendezvous with a sleeping receiver by remembering the receiver's phase. All state
//! lives in fixed capacity containers, nothing allocates.

#![cfg_attr(not(test), no_std)]

use heapless::Vec;

pub use mac_api::{Action, Ticks};
use mac_api::*;

mod dispatch;
mod event;
mod event_log;
mod frame;
mod lwmac;
mod neighbor;
mod packet;
mod phase;
mod radio;

pub use crate::{
    dispatch::{DispatchBuffer, DispatchError},
    event::{EventConsumer, EventProducer, EventQueue, MacEvent},
    frame::{parse_packet, FrameType, Header, PacketInfo, ParseError},
    lwmac::{LwMac, MacState, MacStats},
    neighbor::{Neighbors, QueueError, TxNeighbor},
    packet::{L2Addr, NetifHeader, Packet},
    phase::{next_inphase_event, Timing},
    radio::{DutyCycle, Radio, RadioError},
};

#[cfg(feature = "defmt")]
#[allow(unused_imports)]
use defmt::{debug, error, info, warn};

#[cfg(not(feature = "defmt"))]
#[allow(unused_imports)]
use log::{debug, error, info, warn};

/// Position within the wakeup interval, `0..interval`
pub type Phase = Ticks;

/// Phase of neighbors whose wakeup time is not known yet, sorts after every known phase
pub const PHASE_MAX: Phase = Phase::MAX;

/// Count of one-hop neighbors that can be tracked
pub const NEIGHBOR_COUNT: usize = 8;
/// Received packets held back until the end of a listen period
pub const DISPATCH_BUFFER_SIZE: usize = 8;
/// Outgoing packets queued per neighbor
pub const TX_QUEUE_SIZE: usize = 8;
/// Events buffered between interrupt and MAC task
pub const RX_QUEUE_SIZE: usize = 8;
/// Maximum link layer address length stored by the MAC
pub const L2ADDR_MAX_LEN: usize = 8;
/// Maximum link layer address length a device can report in the interface header
pub const NETIF_L2ADDR_MAX_LEN: usize = 16;
/// Maximum frame size (IEEE 802.15.4 PHY)
pub const MAX_FRAME_LEN: usize = 127;

/// Real-time counter frequency in Hz
pub const RTT_FREQUENCY: u32 = 32_768;
/// Time between two consecutive wakeups of a node
pub const WAKEUP_INTERVAL_US: u32 = 100_000;
/// How long a node listens after waking up
pub const WAKEUP_DURATION_US: u32 = WAKEUP_INTERVAL_US / 10;
/// Minimum distance of a scheduled timer event to now, so it can be armed reliably
pub const RTT_EVENT_MARGIN_US: u32 = 2_000;

type L2AddrBytes = Vec<u8, L2ADDR_MAX_LEN>;

pub const fn us_to_ticks(us: u32) -> Ticks {
    ((us as u64 * RTT_FREQUENCY as u64) / 1_000_000) as Ticks
}

pub const fn ticks_to_us(ticks: Ticks) -> u32 {
    ((ticks as u64 * 1_000_000) / RTT_FREQUENCY as u64) as u32
}

/// Wraps defmt::write and returns Ok() to make it behave like core::write!.
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! defmt_write_wrapper {
    ($($arg:expr),*) => {{
        defmt::write!($($arg),*);
        Ok(())
    }};
}
