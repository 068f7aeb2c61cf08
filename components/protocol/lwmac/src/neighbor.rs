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
use heapless::sorted_linked_list::{LinkedIndexU8, Min, SortedLinkedList};

use crate::*;

/// Outgoing packet with its queueing order
#[derive(Debug)]
struct QueuedPacket {
    /// Lower values are sent first
    priority: u8,
    /// Keeps packets of equal priority in FIFO order
    seq: u32,
    packet: Packet,
}

impl Ord for QueuedPacket {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

impl PartialOrd for QueuedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for QueuedPacket {}

type TxQueue = SortedLinkedList<QueuedPacket, LinkedIndexU8, Min, TX_QUEUE_SIZE>;

/// A one-hop neighbor with traffic waiting for it
#[derive(Debug)]
pub struct TxNeighbor {
    pub l2_addr: L2Addr,
    /// Remembered wakeup phase, [`PHASE_MAX`] when unknown
    pub phase: Phase,
    queue: TxQueue,
}

impl TxNeighbor {
    fn new(l2_addr: L2Addr) -> Self {
        Self {
            l2_addr,
            phase: PHASE_MAX,
            queue: SortedLinkedList::new_u8(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.iter().count()
    }

    /// Packet that will be sent next
    pub fn peek(&self) -> Option<&Packet> {
        self.queue.peek().map(|queued| &queued.packet)
    }

    pub fn pop(&mut self) -> Option<Packet> {
        self.queue.pop().ok().map(|queued| queued.packet)
    }
}

/// Why an outgoing packet was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Every entry has traffic pending for another neighbor
    NeighborTableFull,
    /// The neighbor's queue has no space left
    QueueFull,
}

impl Display for QueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QueueError::NeighborTableFull => write!(f, "neighbor table full"),
            QueueError::QueueFull => write!(f, "tx queue full"),
        }
    }
}

/// Fixed table of one-hop neighbors
///
/// Entries are allocated when traffic to or from a neighbor is seen. When the table is full an
/// entry without pending traffic is reused, which forgets that neighbor's phase.
#[derive(Debug)]
pub struct Neighbors {
    table: [Option<TxNeighbor>; NEIGHBOR_COUNT],
    seq: u32,
}

impl Default for Neighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl Neighbors {
    pub fn new() -> Self {
        Self {
            table: core::array::from_fn(|_| None),
            seq: 0,
        }
    }

    pub fn get(&self, index: usize) -> Option<&TxNeighbor> {
        self.table.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TxNeighbor> {
        self.table.get_mut(index)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxNeighbor> {
        self.table.iter().flatten()
    }

    pub fn find(&self, addr: &L2Addr) -> Option<usize> {
        self.table
            .iter()
            .position(|entry| matches!(entry, Some(n) if n.l2_addr == *addr))
    }

    pub fn find_or_alloc(&mut self, addr: &L2Addr) -> Option<usize> {
        self.find(addr).or_else(|| self.alloc(addr))
    }

    fn alloc(&mut self, addr: &L2Addr) -> Option<usize> {
        let index = self
            .table
            .iter()
            .position(Option::is_none)
            .or_else(|| {
                self.table
                    .iter()
                    .position(|entry| matches!(entry, Some(n) if !n.has_pending()))
            })?;

        if let Some(old) = &self.table[index] {
            debug!("reusing neighbor entry of {}", old.l2_addr);
        }
        self.table[index] = Some(TxNeighbor::new(addr.clone()));
        Some(index)
    }

    /// Queue `packet` for `dst`, ordered by `priority`
    ///
    /// Returns the index of the neighbor entry. The packet is dropped on error.
    pub fn queue_packet(
        &mut self,
        dst: &L2Addr,
        priority: u8,
        packet: Packet,
    ) -> Result<usize, QueueError> {
        let index = self.find_or_alloc(dst).ok_or_else(|| {
            warn!("no neighbor entry available for {}, dropping packet", dst);
            QueueError::NeighborTableFull
        })?;

        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        let neighbor = self.table[index]
            .as_mut()
            .ok_or(QueueError::NeighborTableFull)?;
        neighbor
            .queue
            .push(QueuedPacket {
                priority,
                seq,
                packet,
            })
            .map_err(|_| {
                warn!("tx queue of {} full, dropping packet", dst);
                QueueError::QueueFull
            })?;
        Ok(index)
    }

    /// Remember `phase` for `addr`, returns false when there is no entry available
    ///
    /// `phase` has to be below the wakeup interval, use [`Timing::ticks_to_phase`] to get one
    /// from a counter value. Larger values push the computed wakeup more than one interval
    /// ahead, [`PHASE_MAX`] marks the phase unknown.
    pub fn set_phase(&mut self, addr: &L2Addr, phase: Phase) -> bool {
        match self.find_or_alloc(addr).and_then(|i| self.get_mut(i)) {
            Some(neighbor) => {
                neighbor.phase = phase;
                true
            }
            None => false,
        }
    }

    /// Pick the neighbor with pending traffic that wakes up next
    ///
    /// On equal waiting time the neighbor later in the table wins.
    pub fn next_tx_neighbor(&self, timing: &Timing, now: Ticks) -> Option<usize> {
        let mut next = None;
        let mut phase_nearest = PHASE_MAX;

        for (i, entry) in self.table.iter().enumerate() {
            let Some(neighbor) = entry else {
                continue;
            };
            if neighbor.has_pending() {
                // Unknown destinations are initialized with the maximum phase, so known
                // destinations that still wake up in this interval are preferred.
                let phase_check = timing.ticks_until_phase(neighbor.phase, now);

                if phase_check <= phase_nearest {
                    next = Some(i);
                    phase_nearest = phase_check;
                    debug!("advancing queue #{}", i);
                }
            }
        }

        next
    }

    /// Number of queued packets over all neighbors
    pub fn pending(&self) -> usize {
        self.iter().map(TxNeighbor::queue_len).sum()
    }
}
