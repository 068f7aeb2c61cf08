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

//! Handoff from interrupt context to the MAC task
//!
//! Interrupt handlers only enqueue and return. The MAC task drains the queue and is the only
//! place where MAC state is modified.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::*;

/// Capacity of the underlying ring buffer, one slot stays unused
const QUEUE_LEN: usize = RX_QUEUE_SIZE + 1;

#[derive(Debug)]
pub enum MacEvent {
    /// Device received a frame
    FrameReceived(Packet),
    /// Timer armed for the given tick fired
    Timer(Ticks),
}

pub type EventQueue = Queue<MacEvent, QUEUE_LEN>;
pub type EventConsumer<'a> = Consumer<'a, MacEvent, QUEUE_LEN>;

/// Interrupt side of the event queue
pub struct EventProducer<'a> {
    inner: Producer<'a, MacEvent, QUEUE_LEN>,
    dropped: u32,
}

impl<'a> EventProducer<'a> {
    /// Split `queue` into the interrupt side and the task side
    pub fn split(queue: &'a mut EventQueue) -> (Self, EventConsumer<'a>) {
        let (inner, consumer) = queue.split();
        (Self { inner, dropped: 0 }, consumer)
    }

    /// Returns false when the queue is full, the packet is dropped then
    pub fn notify_frame(&mut self, pkt: Packet) -> bool {
        self.notify(MacEvent::FrameReceived(pkt))
    }

    pub fn notify_timer(&mut self, deadline: Ticks) -> bool {
        self.notify(MacEvent::Timer(deadline))
    }

    fn notify(&mut self, event: MacEvent) -> bool {
        match self.inner.enqueue(event) {
            Ok(()) => true,
            Err(_) => {
                self.dropped = self.dropped.wrapping_add(1);
                false
            }
        }
    }

    /// Events lost because the queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
