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

//! Macros for generating parseable event log messages

#[macro_export]
macro_rules! event_log {
    ($uptime:expr,$node:expr,$kind:expr,$content:expr) => {
        info!("${};{};{};{}", $uptime, $node, $kind, $content)
    };
}

#[macro_export]
macro_rules! event_log_reset {
    ($uptime:expr,$node:expr) => {
        info!("${};{};reset;{{}}", $uptime, $node)
    };
}

#[macro_export]
macro_rules! event_log_state {
    ($uptime:expr,$node:expr,$new_state:expr) => {
        info!("${};{};state;\"{}\"", $uptime, $node, $new_state)
    };
}

#[macro_export]
macro_rules! event_log_frame {
    ($uptime:expr,$node:expr,$header:expr) => {
        $crate::event_log!($uptime, $node, "frame", $header)
    };
}

#[macro_export]
macro_rules! event_log_radio {
    ($uptime:expr,$node:expr,$duty_cycle:expr) => {
        info!(
            "${};{};radio;{{\"on\":{},\"awake_sum\":{}}}",
            $uptime,
            $node,
            $duty_cycle.radio_is_on,
            $duty_cycle.awake_duration_sum
        )
    };
}

#[macro_export]
macro_rules! event_log_dispatch {
    ($uptime:expr,$node:expr,$delivered:expr,$total:expr) => {
        info!(
            "${};{};dispatch;{{\"delivered\":{},\"total\":{}}}",
            $uptime,
            $node,
            $delivered,
            $total
        )
    };
}

#[macro_export]
macro_rules! event_log_drop {
    ($uptime:expr,$node:expr,$reason:expr) => {
        info!("${};{};drop;\"{}\"", $uptime, $node, $reason)
    };
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn usable_as_expression() {
        let duty_cycle = DutyCycle::default();
        let node = L2Addr::new(&[0x0a, 0x01]).unwrap();
        for result in [Ok(()), Err(RadioError::NoValue)] {
            match result {
                Ok(()) => event_log_radio!(0, node, duty_cycle),
                Err(e) => event_log_drop!(0, node, e),
            }
        }
        let header = Header::Data;
        let logged = |uptime: Ticks| event_log_frame!(uptime, node, &header);
        logged(10);
    }
}
