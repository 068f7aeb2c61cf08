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

use crate::*;

/// Radio schedule state of the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacState {
    #[default]
    Sleeping,
    Listening,
}

impl MacState {
    fn state_as_string(&self) -> &str {
        match self {
            MacState::Sleeping => "Sleeping",
            MacState::Listening => "Listening",
        }
    }
}

impl core::fmt::Display for MacState {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "{}", self.state_as_string())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacState {
    fn format(&self, fmt: defmt::Formatter) {
        use defmt::write;
        write!(fmt, "{}", self.state_as_string())
    }
}

/// Counters of received frames and what happened to them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacStats {
    pub rx_frames: u32,
    pub malformed: u32,
    /// Unicast frames addressed to another node
    pub not_for_us: u32,
    pub duplicates: u32,
    pub buffer_full: u32,
    pub delivered: u32,
    /// Packets no upper layer accepted
    pub refused: u32,
    pub radio_errors: u32,
}

/// lwMAC task state of one radio interface
///
/// Owns the device, the neighbor table and the dispatch buffer. There must be exactly one
/// instance per interface and only the MAC task may call into it; interrupt handlers talk to it
/// through an [`EventProducer`] only.
#[derive(Debug)]
pub struct LwMac<D, T> {
    addr: L2Addr,
    timing: Timing,
    state: MacState,
    radio: Radio<D>,
    ticks: T,
    neighbors: Neighbors,
    dispatch_buffer: DispatchBuffer,
    /// Last scheduled own wakeup, defines the own phase
    last_wakeup: Ticks,
    /// Tick the pending timer is armed for
    deadline: Option<Ticks>,
    stats: MacStats,
}

impl<D: NetDevice, T: TickSource> LwMac<D, T> {
    pub fn new(dev: D, ticks: T, timing: Timing) -> Self {
        Self {
            addr: L2Addr::empty(),
            timing,
            state: MacState::default(),
            radio: Radio::new(dev),
            ticks,
            neighbors: Neighbors::new(),
            dispatch_buffer: DispatchBuffer::new(),
            last_wakeup: 0,
            deadline: None,
            stats: MacStats::default(),
        }
    }

    /// Read the device address, put the radio to sleep and schedule the first wakeup
    ///
    /// The own phase is the counter value at initialization.
    pub fn init(&mut self) -> Result<Action<Ticks>, RadioError> {
        let now = self.ticks.now();
        self.addr = self.radio.address()?;
        event_log_reset!(now, self.addr);

        self.radio.set_state(NetOptState::Sleep, now)?;
        self.state = MacState::Sleeping;
        self.last_wakeup = now;
        self.schedule_wakeup(now);
        info!(
            "lwmac up, phase {} of {} ticks",
            self.own_phase(),
            self.timing.interval
        );
        Ok(self.action())
    }

    /// Process one event, returns what the caller has to arm next
    pub fn handle(&mut self, event: MacEvent, upper: &mut impl Dispatch<Packet>) -> Action<Ticks> {
        // one counter snapshot per decision
        let now = self.ticks.now();

        match event {
            MacEvent::FrameReceived(pkt) => self.on_frame(pkt, now),
            MacEvent::Timer(deadline) if self.deadline == Some(deadline) => {
                self.deadline = None;
                match self.state {
                    MacState::Sleeping => self.wake_up(deadline, now),
                    MacState::Listening => self.go_to_sleep(now, upper),
                }
            }
            MacEvent::Timer(deadline) => debug!("ignoring stale timer for {}", deadline),
        }

        self.action()
    }

    /// Handle every queued event
    pub fn run_pending(
        &mut self,
        events: &mut EventConsumer<'_>,
        upper: &mut impl Dispatch<Packet>,
    ) -> Action<Ticks> {
        while let Some(event) = events.dequeue() {
            self.handle(event, upper);
        }
        self.action()
    }

    /// Queue a packet from the upper layers for `dst`
    pub fn send(&mut self, dst: &L2Addr, priority: u8, pkt: Packet) -> Result<(), QueueError> {
        self.neighbors.queue_packet(dst, priority, pkt).map(|_| ())
    }

    /// Neighbor to serve next and the tick it wakes up at
    ///
    /// The tick is `None` while the neighbor's phase is unknown.
    pub fn next_tx(&self) -> Option<(usize, Option<Ticks>)> {
        let now = self.ticks.now();
        let index = self.neighbors.next_tx_neighbor(&self.timing, now)?;
        let phase = self.neighbors.get(index)?.phase;
        let wakeup = (phase != PHASE_MAX).then(|| self.timing.phase_to_ticks(phase, now));
        Some((index, wakeup))
    }

    /// Take the next packet queued for neighbor `index`
    pub fn pop_tx(&mut self, index: usize) -> Option<Packet> {
        self.neighbors.get_mut(index)?.pop()
    }

    pub fn action(&self) -> Action<Ticks> {
        match (self.state, self.deadline) {
            (_, None) => Action::None,
            (MacState::Sleeping, Some(until)) => Action::Sleep { until },
            (MacState::Listening, Some(until)) => Action::Listen { until },
        }
    }

    pub fn own_phase(&self) -> Phase {
        self.timing.ticks_to_phase(self.last_wakeup)
    }

    pub fn address(&self) -> &L2Addr {
        &self.addr
    }

    pub fn state(&self) -> MacState {
        self.state
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn stats(&self) -> &MacStats {
        &self.stats
    }

    pub fn duty_cycle(&self) -> &DutyCycle {
        self.radio.duty_cycle()
    }

    pub fn radio(&self) -> &Radio<D> {
        &self.radio
    }

    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    pub fn dispatch_buffer(&self) -> &DispatchBuffer {
        &self.dispatch_buffer
    }

    fn set_state(&mut self, state: MacState, now: Ticks) {
        if self.state != state {
            event_log_state!(now, self.addr, state);
            self.state = state;
        }
    }

    fn schedule_wakeup(&mut self, now: Ticks) {
        let next = self.timing.next_wakeup(self.last_wakeup, now);
        self.deadline = Some(next);
    }

    fn wake_up(&mut self, scheduled: Ticks, now: Ticks) {
        self.last_wakeup = scheduled;

        if let Err(e) = self.radio.set_state(NetOptState::Idle, now) {
            error!("could not switch radio on: {}", e);
            self.stats.radio_errors += 1;
            self.schedule_wakeup(now);
            return;
        }
        event_log_radio!(now, self.addr, self.radio.duty_cycle());

        self.set_state(MacState::Listening, now);
        self.deadline = Some(now.wrapping_add(self.timing.wakeup_duration));
    }

    fn go_to_sleep(&mut self, now: Ticks, upper: &mut impl Dispatch<Packet>) {
        let total = self.dispatch_buffer.len();
        if total > 0 {
            let delivered = self.dispatch_buffer.flush(upper);
            self.stats.delivered += delivered as u32;
            self.stats.refused += (total - delivered) as u32;
            event_log_dispatch!(now, self.addr, delivered, total);
        }

        match self.radio.set_state(NetOptState::Sleep, now) {
            Ok(()) => {
                event_log_radio!(now, self.addr, self.radio.duty_cycle());
            }
            Err(e) => {
                error!("could not switch radio off: {}", e);
                self.stats.radio_errors += 1;
            }
        }

        self.set_state(MacState::Sleeping, now);
        self.schedule_wakeup(now);
    }

    fn on_frame(&mut self, mut pkt: Packet, now: Ticks) {
        self.stats.rx_frames += 1;

        let (src_addr, dst_addr, header) = match parse_packet(&mut pkt) {
            Ok(info) => (info.src_addr, info.dst_addr, info.header.clone()),
            Err(e) => {
                warn!("dropping frame: {}", e);
                event_log_drop!(now, self.addr, e);
                self.stats.malformed += 1;
                return;
            }
        };
        event_log_frame!(now, self.addr, &header);

        match header {
            Header::WakeupAck { current_phase, .. } => {
                let phase = self.timing.ticks_to_phase(current_phase);
                if self.neighbors.set_phase(&src_addr, phase) {
                    debug!("phase of {} is {}", src_addr, phase);
                } else {
                    warn!("no neighbor entry left for {}", src_addr);
                }
            }
            Header::WakeupRequest { .. } => {
                if dst_addr == self.addr {
                    debug!("wakeup request from {}", src_addr);
                }
            }
            Header::Data | Header::Broadcast { .. } => {
                let for_us = matches!(header, Header::Broadcast { .. })
                    || dst_addr.is_empty()
                    || dst_addr.is_broadcast()
                    || dst_addr == self.addr;
                if !for_us {
                    debug!("frame for {}, not for us", dst_addr);
                    self.stats.not_for_us += 1;
                    return;
                }

                if let Err(e) = self.dispatch_buffer.offer(pkt) {
                    match e {
                        DispatchError::Duplicate => self.stats.duplicates += 1,
                        DispatchError::Full => self.stats.buffer_full += 1,
                        DispatchError::ProtocolViolation => self.stats.malformed += 1,
                    }
                    event_log_drop!(now, self.addr, e);
                }
            }
        }
    }
}
