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

//! Interfaces between a duty-cycled MAC and the rest of the network stack
//!
//! The MAC consumes a network device (option get/set), a real-time tick counter and hands
//! received packets to the upper layers through [`Dispatch`].

#![cfg_attr(not(test), no_std)]

use serde::{Deserialize, Serialize};

/// Real-time counter value. Wraps at `u32::MAX`.
pub type Ticks = u32;

/// Demultiplexing context that reaches every registered receiver of a type
pub const DEMUX_CTX_ALL: u32 = 0xffff_0000;

/// What the MAC task expects to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action<TICKS> {
    /// Nothing scheduled
    None,
    /// Radio is asleep, arm the timer for `until`
    Sleep { until: TICKS },
    /// Radio is listening, arm the timer for `until`
    Listen { until: TICKS },
}

impl<TICKS: Copy> Action<TICKS> {
    /// Tick at which the MAC wants to be notified again
    pub fn deadline(&self) -> Option<TICKS> {
        match self {
            Action::None => None,
            Action::Sleep { until } | Action::Listen { until } => Some(*until),
        }
    }
}

/// Device options the MAC uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetOpt {
    /// Power state, encoded as one [`NetOptState`] byte
    State,
    /// Link layer address of the device
    Address,
}

/// Radio power states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NetOptState {
    Off = 0,
    Sleep = 1,
    /// Listening
    Idle = 2,
    Rx = 3,
    Tx = 4,
    Reset = 5,
    Standby = 6,
}

impl TryFrom<u8> for NetOptState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => NetOptState::Off,
            1 => NetOptState::Sleep,
            2 => NetOptState::Idle,
            3 => NetOptState::Rx,
            4 => NetOptState::Tx,
            5 => NetOptState::Reset,
            6 => NetOptState::Standby,
            other => return Err(other),
        })
    }
}

/// Device driver failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    NotSupported,
    InvalidValue,
    Busy,
    /// Driver specific error code
    Driver(i32),
}

impl core::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeviceError::NotSupported => write!(f, "option not supported"),
            DeviceError::InvalidValue => write!(f, "invalid option value"),
            DeviceError::Busy => write!(f, "device busy"),
            DeviceError::Driver(code) => write!(f, "driver error {}", code),
        }
    }
}

/// Generic option interface of a network device
pub trait NetDevice {
    /// Push `value` for `opt` to the device
    fn set(&mut self, opt: NetOpt, value: &[u8]) -> Result<(), DeviceError>;

    /// Read `opt` into `buf`, returns the number of bytes written
    fn get(&mut self, opt: NetOpt, buf: &mut [u8]) -> Result<usize, DeviceError>;
}

/// Monotonic hardware counter with wraparound
pub trait TickSource {
    fn now(&self) -> Ticks;
}

impl<F: Fn() -> Ticks> TickSource for F {
    fn now(&self) -> Ticks {
        self()
    }
}

/// Payload type a packet is dispatched by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetType {
    Undef,
    Netif,
    Lwmac,
    Sixlowpan,
    Ipv6,
    Udp,
}

impl core::fmt::Display for NetType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            NetType::Undef => "undef",
            NetType::Netif => "netif",
            NetType::Lwmac => "lwmac",
            NetType::Sixlowpan => "6lowpan",
            NetType::Ipv6 => "ipv6",
            NetType::Udp => "udp",
        };
        write!(f, "{}", name)
    }
}

/// Upper layer receive path
pub trait Dispatch<P> {
    /// Hand `pkt` to every receiver registered for `nettype` and `demux_ctx`
    ///
    /// Returns false when nobody accepted the packet. The packet is consumed either way.
    #[must_use]
    fn dispatch_receive(&mut self, nettype: NetType, demux_ctx: u32, pkt: P) -> bool;
}
