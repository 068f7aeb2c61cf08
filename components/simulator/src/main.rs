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

//! Discrete event simulation of one lwMAC node and its one-hop neighbors
//!
//! Neighbors know the node's phase and send into its listen window, some frames are sent
//! late and get missed because the radio is asleep already.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rand::{RngCore, SeedableRng};
use std::env;

use lwmac::{ticks_to_us, EventProducer, LwMac, MacStats, Packet, Ticks, Timing};
use mac_api::{NetType, TickSource};

mod logger;
mod sim;

use crate::sim::*;

/// Probability in parts per thousand that a neighbor has something to send in an interval
const TRAFFIC_PPT: u32 = 600;
/// Probability in parts per thousand that the node queues a packet for a neighbor
const UPLINK_PPT: u32 = 250;

const EVENT_FILE_PATH: &str = "/tmp/lwmac_events.csv";

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub neighbors: usize,
    /// Simulated time in ticks
    pub duration: u64,
    /// Probability of a broadcast being received twice in parts per thousand
    pub duplicate_ppt: u32,
    pub timing: Timing,
    /// Counter value at simulation start
    pub clock_offset: Ticks,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            neighbors: 4,
            duration: ms_to_ticks(10_000),
            duplicate_ppt: 100,
            timing: Timing::DEFAULT,
            clock_offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub stats: MacStats,
    /// Packets handed to the upper layer
    pub delivered: usize,
    /// Frames that arrived while the radio was asleep
    pub missed: usize,
    /// Packets taken from the tx queues at the neighbor's wakeup
    pub sent: usize,
    pub send_failed: usize,
    /// Events lost in the interrupt queue
    pub dropped_events: u32,
    pub awake_ppm: u64,
    /// Radio state changes pushed to the device
    pub radio_switches: usize,
}

fn ms_to_ticks(ms: u64) -> u64 {
    ms * lwmac::RTT_FREQUENCY as u64 / 1000
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut rng_seed: u64 = 0;
    let mut config = SimConfig::default();

    for chunk in args[1..].chunks_exact(2) {
        let (arg, val) = (&chunk[0], &chunk[1]);
        match arg.as_str() {
            "--seed" => {
                rng_seed = val.parse().expect("invalid rng seed");
            }
            "--neighbors" => {
                config.neighbors = val.parse().expect("invalid number of neighbors");
            }
            "--time_ms" => {
                config.duration = ms_to_ticks(val.parse().expect("invalid simulation time"));
            }
            "--duplicate_ppt" => {
                config.duplicate_ppt = val.parse().expect("invalid duplicate probability");
            }
            _ => panic!("unknown argument: {}", arg),
        }
    }

    assert!(
        config.neighbors <= u8::MAX as usize,
        "too many neighbors: {}",
        config.neighbors
    );

    if let Err(e) = logger::init(log::Level::Debug, Some(EVENT_FILE_PATH)) {
        panic!("{}", e);
    }

    let report = run(&config, get_rng(rng_seed));
    log::logger().flush();

    println!("{:#?}", report);
    println!(
        "radio on {}.{:01}% of {} ms",
        report.awake_ppm / 10_000,
        report.awake_ppm / 1_000 % 10,
        config.duration * 1000 / lwmac::RTT_FREQUENCY as u64
    );
}

fn get_rng(rng_seed: u64) -> impl RngCore {
    println!("RNG seed: {rng_seed:#x}");
    rand_chacha::ChaCha8Rng::seed_from_u64(rng_seed)
}

fn chance(rng: &mut impl RngCore, ppt: u32) -> bool {
    rng.next_u32() % 1000 < ppt
}

fn run(config: &SimConfig, mut rng: impl RngCore) -> Report {
    let timing = config.timing;
    let interval = timing.interval as u64;

    let clock = SimClock::default();
    let ticks_at = |time: u64| (time as Ticks).wrapping_add(config.clock_offset);
    clock.set(ticks_at(0));

    let mut mac = LwMac::new(SimDevice::new(OWN_ADDR), clock.clone(), timing);
    let mut upper = UpperLayer::default();
    let mut report = Report::default();

    let mut mac_events = lwmac::EventQueue::new();
    let (mut producer, mut consumer) = EventProducer::split(&mut mac_events);

    let mut events = EventQueue::default();
    let mut neighbors: Vec<SimNeighbor> = (0..config.neighbors)
        .map(|i| SimNeighbor::new(i as u8))
        .collect();
    for i in 0..neighbors.len() {
        let phase = rng.next_u32() as u64 % interval;
        events.push(phase, EventKind::NeighborWakeup(i));
    }

    let mut armed = match mac.init() {
        Ok(action) => action.deadline(),
        Err(e) => {
            error!("could not initialize MAC: {}", e);
            return report;
        }
    };
    if let Some(deadline) = armed {
        events.push(deadline.wrapping_sub(ticks_at(0)) as u64, EventKind::MacTimer(deadline));
    }

    while let Some(event) = events.pop() {
        if event.time > config.duration {
            break;
        }
        let time = event.time;
        let now = ticks_at(time);
        clock.set(now);

        match event.kind {
            EventKind::MacTimer(deadline) => {
                producer.notify_timer(deadline);
            }
            EventKind::Frame(pkt) => {
                if mac.radio().device().is_listening() {
                    producer.notify_frame(pkt);
                } else {
                    trace!("frame missed, radio is asleep");
                    report.missed += 1;
                }
            }
            EventKind::NeighborWakeup(i) => {
                // serve the neighbor's queue while it listens
                while let Some((index, Some(at))) = mac.next_tx() {
                    let is_this = mac
                        .neighbors()
                        .get(index)
                        .is_some_and(|n| &n.l2_addr == neighbors[i].addr());
                    if !is_this || at.wrapping_sub(now) >= timing.margin {
                        break;
                    }
                    if mac.pop_tx(index).is_some() {
                        debug!("sent packet to {}", neighbors[i].addr());
                        report.sent += 1;
                    }
                }

                if chance(&mut rng, UPLINK_PPT) {
                    let payload = [i as u8; 4];
                    let sent = Packet::new(NetType::Sixlowpan, &payload)
                        .map(|pkt| mac.send(neighbors[i].addr(), (rng.next_u32() % 4) as u8, pkt));
                    if !matches!(sent, Some(Ok(()))) {
                        report.send_failed += 1;
                    }
                }

                if chance(&mut rng, TRAFFIC_PPT) {
                    let wakeup = timing.phase_to_ticks(mac.own_phase(), now);
                    // some frames are sent too late for the listen window
                    let offset = 1 + rng.next_u32() % (timing.wakeup_duration * 3 / 2);
                    let arrival = time + wakeup.wrapping_sub(now) as u64 + offset as u64;

                    let kind = TrafficKind::random(&mut rng);
                    if let Some(pkt) = neighbors[i].frame(kind, now) {
                        events.push(arrival, EventKind::Frame(pkt));
                    }
                    if kind == TrafficKind::Broadcast && chance(&mut rng, config.duplicate_ppt) {
                        if let Some(pkt) = neighbors[i].repeat_broadcast() {
                            events.push(arrival + 1, EventKind::Frame(pkt));
                        }
                    }
                }

                events.push(time + interval, EventKind::NeighborWakeup(i));
            }
        }

        let action = mac.run_pending(&mut consumer, &mut upper);
        let deadline = action.deadline();
        if deadline != armed {
            armed = deadline;
            if let Some(deadline) = deadline {
                let at = time + deadline.wrapping_sub(clock.now()) as u64;
                trace!("timer armed in {} us", ticks_to_us(deadline.wrapping_sub(now)));
                events.push(at, EventKind::MacTimer(deadline));
            }
        }
    }

    report.stats = mac.stats().clone();
    report.delivered = upper.received.len();
    report.dropped_events = producer.dropped();
    report.awake_ppm = mac.duty_cycle().awake_ppm(config.duration);
    report.radio_switches = mac.radio().device().state_changes();
    report
}
