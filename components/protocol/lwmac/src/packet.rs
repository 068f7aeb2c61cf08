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
use serde::{Deserialize, Serialize};

use crate::*;

/// Link layer address as stored by the MAC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Addr(L2AddrBytes);

impl L2Addr {
    /// Returns `None` when `bytes` is longer than [`L2ADDR_MAX_LEN`]
    pub fn new(bytes: &[u8]) -> Option<Self> {
        Vec::from_slice(bytes).ok().map(Self)
    }

    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All bytes set, e.g. `ff:ff`
    pub fn is_broadcast(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == 0xff)
    }
}

macro_rules! l2addr_to_string {
    ($fmt:expr,$write:tt,$addr:expr) => {{
        let mut iter = $addr.0.iter();
        let mut next = iter.next();
        while let Some(byte) = next {
            $write!($fmt, "{:02x}", byte)?;
            next = iter.next();
            if next.is_some() {
                $write!($fmt, ":")?;
            }
        }
        Ok(())
    }};
}

impl Display for L2Addr {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        l2addr_to_string!(fmt, write, self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for L2Addr {
    fn format(&self, fmt: defmt::Formatter) {
        fn wrapper(addr: &L2Addr, fmt: defmt::Formatter) -> core::fmt::Result {
            l2addr_to_string!(fmt, defmt_write_wrapper, addr)
        }
        let _ = wrapper(self, fmt);
    }
}

/// Reception metadata the device driver prepends to a received frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetifHeader {
    src_l2addr: Vec<u8, NETIF_L2ADDR_MAX_LEN>,
    dst_l2addr: Vec<u8, NETIF_L2ADDR_MAX_LEN>,
    pub rssi: i16,
    pub lqi: u8,
}

impl NetifHeader {
    /// Returns `None` when an address is longer than [`NETIF_L2ADDR_MAX_LEN`]
    pub fn new(src_l2addr: &[u8], dst_l2addr: &[u8]) -> Option<Self> {
        Some(Self {
            src_l2addr: Vec::from_slice(src_l2addr).ok()?,
            dst_l2addr: Vec::from_slice(dst_l2addr).ok()?,
            rssi: 0,
            lqi: 0,
        })
    }

    pub fn src_l2addr(&self) -> &[u8] {
        &self.src_l2addr
    }

    pub fn dst_l2addr(&self) -> &[u8] {
        &self.dst_l2addr
    }
}

/// A frame and the headers that were split off it
///
/// A received packet starts out as raw frame bytes plus the interface header. Parsing moves
/// the MAC header out of the bytes, delivery to the upper layers drops it again.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Type of the payload, used to find the upper layer receiver
    pub nettype: NetType,
    data: Vec<u8, MAX_FRAME_LEN>,
    mac: Option<Header>,
    netif: Option<NetifHeader>,
}

impl Packet {
    /// Returns `None` when `data` exceeds [`MAX_FRAME_LEN`]
    pub fn new(nettype: NetType, data: &[u8]) -> Option<Self> {
        Some(Self {
            nettype,
            data: Vec::from_slice(data).ok()?,
            mac: None,
            netif: None,
        })
    }

    /// Received frame as handed over by the device driver
    pub fn received(nettype: NetType, frame: &[u8], netif: NetifHeader) -> Option<Self> {
        Self::new(nettype, frame).map(|pkt| pkt.with_netif(netif))
    }

    pub fn with_netif(mut self, netif: NetifHeader) -> Self {
        self.netif = Some(netif);
        self
    }

    /// Payload, or the whole frame while the MAC header has not been split off yet
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn netif(&self) -> Option<&NetifHeader> {
        self.netif.as_ref()
    }

    pub fn mac_header(&self) -> Option<&Header> {
        self.mac.as_ref()
    }

    /// Move the first `len` bytes out of the payload, they are represented by `header` now
    pub(crate) fn mark_mac_header(&mut self, header: Header, len: usize) {
        let len = len.min(self.data.len());
        self.data.rotate_left(len);
        self.data.truncate(self.data.len() - len);
        self.mac = Some(header);
    }

    pub(crate) fn strip_mac_header(&mut self) -> Option<Header> {
        self.mac.take()
    }
}
