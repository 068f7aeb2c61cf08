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

/// Radio on/off bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycle {
    pub last_radio_on: Ticks,
    pub radio_off: Ticks,
    /// Sum of all completed on periods
    pub awake_duration_sum: u64,
    pub radio_is_on: bool,
}

impl DutyCycle {
    /// Account for a transition into `state` at `now`, returns true when on/off changed
    ///
    /// Only IDLE (listening) and SLEEP are considered, all other states leave the stats alone.
    pub fn record(&mut self, state: NetOptState, now: Ticks) -> bool {
        match state {
            NetOptState::Idle if !self.radio_is_on => {
                self.last_radio_on = now;
                self.radio_is_on = true;
                true
            }
            NetOptState::Sleep if self.radio_is_on => {
                self.radio_off = now;
                self.awake_duration_sum += self.radio_off.wrapping_sub(self.last_radio_on) as u64;
                self.radio_is_on = false;
                true
            }
            _ => false,
        }
    }

    /// Awake share of `elapsed` ticks in parts per million
    pub fn awake_ppm(&self, elapsed: u64) -> u64 {
        if elapsed == 0 {
            return 0;
        }
        self.awake_duration_sum * 1_000_000 / elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    Device(DeviceError),
    /// Device reported a state byte that is not a [`NetOptState`]
    InvalidState(u8),
    /// Device returned no data for an option
    NoValue,
}

impl From<DeviceError> for RadioError {
    fn from(value: DeviceError) -> Self {
        RadioError::Device(value)
    }
}

impl Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RadioError::Device(e) => write!(f, "{}", e),
            RadioError::InvalidState(state) => write!(f, "invalid radio state {}", state),
            RadioError::NoValue => write!(f, "device returned no value"),
        }
    }
}

/// Switches the radio between power states and keeps the duty cycle statistics
///
/// Owns the device, nothing else may change its state behind the controller's back.
#[derive(Debug)]
pub struct Radio<D> {
    dev: D,
    duty_cycle: DutyCycle,
}

impl<D: NetDevice> Radio<D> {
    pub fn new(dev: D) -> Self {
        Self {
            dev,
            duty_cycle: DutyCycle::default(),
        }
    }

    /// Push `state` to the device
    ///
    /// Failures are not retried. Statistics are only updated when the device accepted the state.
    pub fn set_state(&mut self, state: NetOptState, now: Ticks) -> Result<(), RadioError> {
        self.dev.set(NetOpt::State, &[state as u8])?;

        #[cfg(feature = "duty-cycle-record")]
        self.duty_cycle.record(state, now);
        #[cfg(not(feature = "duty-cycle-record"))]
        let _ = now;

        Ok(())
    }

    /// State as reported by the device
    pub fn state(&mut self) -> Result<NetOptState, RadioError> {
        let mut buf = [0u8; 1];
        if self.dev.get(NetOpt::State, &mut buf)? == 0 {
            return Err(RadioError::NoValue);
        }
        NetOptState::try_from(buf[0]).map_err(RadioError::InvalidState)
    }

    /// Link layer address of the device
    pub fn address(&mut self) -> Result<L2Addr, RadioError> {
        let mut buf = [0u8; L2ADDR_MAX_LEN];
        let len = self.dev.get(NetOpt::Address, &mut buf)?;
        if len == 0 {
            return Err(RadioError::NoValue);
        }
        L2Addr::new(&buf[..len.min(L2ADDR_MAX_LEN)]).ok_or(RadioError::NoValue)
    }

    pub fn duty_cycle(&self) -> &DutyCycle {
        &self.duty_cycle
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Device that remembers its state and can be told to fail
    #[derive(Debug, Default)]
    pub(crate) struct FakeDevice {
        pub(crate) state: u8,
        pub(crate) addr: std::vec::Vec<u8>,
        pub(crate) fail: Option<DeviceError>,
        pub(crate) sets: usize,
    }

    impl NetDevice for FakeDevice {
        fn set(&mut self, opt: NetOpt, value: &[u8]) -> Result<(), DeviceError> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            match opt {
                NetOpt::State => {
                    self.state = value[0];
                    self.sets += 1;
                    Ok(())
                }
                NetOpt::Address => Err(DeviceError::NotSupported),
            }
        }

        fn get(&mut self, opt: NetOpt, buf: &mut [u8]) -> Result<usize, DeviceError> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            match opt {
                NetOpt::State => {
                    buf[0] = self.state;
                    Ok(1)
                }
                NetOpt::Address => {
                    buf[..self.addr.len()].copy_from_slice(&self.addr);
                    Ok(self.addr.len())
                }
            }
        }
    }

    #[test]
    fn state_is_pushed_to_device() {
        let mut radio = Radio::new(FakeDevice::default());
        radio.set_state(NetOptState::Idle, 0).unwrap();
        assert_eq!(radio.device().state, NetOptState::Idle as u8);
        assert_eq!(radio.state(), Ok(NetOptState::Idle));
        radio.set_state(NetOptState::Sleep, 0).unwrap();
        assert_eq!(radio.state(), Ok(NetOptState::Sleep));
    }

    #[test]
    fn query_errors() {
        let mut radio = Radio::new(FakeDevice {
            state: 42,
            ..Default::default()
        });
        assert_eq!(radio.state(), Err(RadioError::InvalidState(42)));
        assert_eq!(radio.address(), Err(RadioError::NoValue));
        radio.device_mut().fail = Some(DeviceError::Busy);
        assert_eq!(radio.state(), Err(RadioError::Device(DeviceError::Busy)));
    }

    #[test]
    fn address_from_device() {
        let mut radio = Radio::new(FakeDevice {
            addr: vec![0xca, 0xfe],
            ..Default::default()
        });
        assert_eq!(radio.address(), Ok(L2Addr::new(&[0xca, 0xfe]).unwrap()));
    }

    #[cfg(feature = "duty-cycle-record")]
    #[test]
    fn awake_time_is_accumulated() {
        let mut radio = Radio::new(FakeDevice::default());
        radio.set_state(NetOptState::Idle, 100).unwrap();
        radio.set_state(NetOptState::Sleep, 130).unwrap();
        assert_eq!(radio.duty_cycle().awake_duration_sum, 30);
        assert!(!radio.duty_cycle().radio_is_on);

        radio.set_state(NetOptState::Idle, 1000).unwrap();
        // listening again does not restart the on period
        radio.set_state(NetOptState::Idle, 1005).unwrap();
        radio.set_state(NetOptState::Tx, 1007).unwrap();
        radio.set_state(NetOptState::Sleep, 1010).unwrap();
        assert_eq!(radio.duty_cycle().awake_duration_sum, 40);
        assert_eq!(radio.duty_cycle().last_radio_on, 1000);
        assert_eq!(radio.duty_cycle().radio_off, 1010);

        // sleeping while asleep changes nothing
        radio.set_state(NetOptState::Sleep, 2000).unwrap();
        assert_eq!(radio.duty_cycle().awake_duration_sum, 40);
        assert_eq!(radio.duty_cycle().radio_off, 1010);
    }

    #[cfg(feature = "duty-cycle-record")]
    #[test]
    fn awake_time_across_counter_wrap() {
        let mut duty_cycle = DutyCycle::default();
        assert!(duty_cycle.record(NetOptState::Idle, Ticks::MAX - 4));
        assert!(duty_cycle.record(NetOptState::Sleep, 5));
        assert_eq!(duty_cycle.awake_duration_sum, 10);
    }

    #[cfg(feature = "duty-cycle-record")]
    #[test]
    fn failed_transition_is_not_recorded() {
        let mut radio = Radio::new(FakeDevice::default());
        radio.device_mut().fail = Some(DeviceError::Driver(-5));
        assert_eq!(
            radio.set_state(NetOptState::Idle, 10),
            Err(RadioError::Device(DeviceError::Driver(-5)))
        );
        assert!(!radio.duty_cycle().radio_is_on);
        assert_eq!(radio.duty_cycle(), &DutyCycle::default());
    }

    #[test]
    fn awake_share() {
        let duty_cycle = DutyCycle {
            awake_duration_sum: 25,
            ..Default::default()
        };
        assert_eq!(duty_cycle.awake_ppm(1000), 25_000);
        assert_eq!(duty_cycle.awake_ppm(0), 0);
    }
}
