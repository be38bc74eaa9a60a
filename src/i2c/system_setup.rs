// Licensed under the Apache-2.0 license

//! SMBus System Setup Helper
//!
//! Bring-up steps that live outside the SMBus register block: looking up the
//! module's input clock and routing its pins. [`SmbusSystemSetup::init_bus`]
//! strings them together with controller initialisation in the order the
//! hardware needs.

use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::common::Logger;
use crate::i2c::common::SmbusConfig;
use crate::i2c::error::Error;
use crate::i2c::npcm_smbus::NpcmSmbus;
use crate::i2c::poll::PollPolicy;
use crate::i2c::registers::SmbusRegisters;
use crate::pinctrl::{self, GcrAccess};

/// Source of a module's input (APB) clock rate.
pub trait ClockProvider {
    type Error: core::fmt::Debug;

    fn input_clock(&mut self, module: u8) -> Result<HertzU32, Self::Error>;
}

/// A clock known up front, e.g. from a board description.
#[derive(Copy, Clone, Debug)]
pub struct FixedClock(pub HertzU32);

impl ClockProvider for FixedClock {
    type Error = core::convert::Infallible;

    fn input_clock(&mut self, _module: u8) -> Result<HertzU32, Self::Error> {
        Ok(self.0)
    }
}

/// Helper for SMBus system-level operations
pub struct SmbusSystemSetup;

impl SmbusSystemSetup {
    /// Input clock frequency for timing calculations
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` if the provider fails or reports 0 Hz.
    pub fn input_clock<C: ClockProvider>(clock: &mut C, module: u8) -> Result<HertzU32, Error> {
        match clock.input_clock(module) {
            Ok(rate) if rate.raw() != 0 => Ok(rate),
            _ => Err(Error::ClockUnavailable),
        }
    }

    /// Complete bring-up of one SMBus module
    ///
    /// Fetches the input clock, routes the pins, then initialises the
    /// controller. Each step must succeed before the next runs.
    ///
    /// # Errors
    ///
    /// * `ClockUnavailable` when no input clock rate can be had.
    /// * `InvalidArgument` for a module without pin routing.
    /// * Clock configuration errors from [`NpcmSmbus::init`].
    pub fn init_bus<R, D, P, L, C, G>(
        config: &SmbusConfig,
        regs: R,
        clock: &mut C,
        gcr: &mut G,
        delay: D,
        poll: P,
        mut logger: L,
    ) -> Result<NpcmSmbus<R, D, P, L>, Error>
    where
        R: SmbusRegisters,
        D: DelayNs,
        P: PollPolicy,
        L: Logger,
        C: ClockProvider,
        G: GcrAccess,
    {
        let input_clock = match Self::input_clock(clock, config.module) {
            Ok(rate) => rate,
            Err(e) => {
                logger.error(format_args!("bus{}: fail to get rate", config.module));
                return Err(e);
            }
        };

        if let Err(e) = pinctrl::route_smbus(gcr, config.module) {
            logger.error(format_args!("bus{}: no pin routing", config.module));
            return Err(e);
        }

        let mut bus = NpcmSmbus::new(regs, config, input_clock, delay, poll, logger);
        bus.init()?;
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::RecordingLogger;
    use crate::i2c::common::SmbusConfigBuilder;
    use crate::i2c::mock::{MockController, NoDelay};
    use crate::i2c::poll::IterationBudget;
    use crate::i2c::registers::{ctl2, Register};
    use crate::pinctrl::test_support::MockGcr;
    use crate::pinctrl::GcrRegister;
    use fugit::RateExtU32;
    use std::collections::HashMap;

    struct MockClocks {
        rates: HashMap<u8, u32>,
    }

    impl ClockProvider for MockClocks {
        type Error = ();

        fn input_clock(&mut self, module: u8) -> Result<HertzU32, Self::Error> {
            self.rates.get(&module).map(|hz| HertzU32::from_raw(*hz)).ok_or(())
        }
    }

    fn clocks(module: u8, hz: u32) -> MockClocks {
        MockClocks {
            rates: HashMap::from([(module, hz)]),
        }
    }

    #[test]
    fn zero_rate_is_unavailable() {
        assert_eq!(
            SmbusSystemSetup::input_clock(&mut clocks(1, 0), 1),
            Err(Error::ClockUnavailable)
        );
        assert_eq!(
            SmbusSystemSetup::input_clock(&mut clocks(1, 50_000_000), 2),
            Err(Error::ClockUnavailable)
        );
        assert_eq!(
            SmbusSystemSetup::input_clock(&mut FixedClock(25.MHz()), 9),
            Ok(HertzU32::from_raw(25_000_000))
        );
    }

    #[test]
    fn init_bus_routes_pins_and_enables() {
        let mut mock = MockController::new();
        let mut gcr = MockGcr::default();
        let config = SmbusConfigBuilder::new().module(8).build();
        {
            let bus = SmbusSystemSetup::init_bus(
                &config,
                &mut mock,
                &mut clocks(8, 50_000_000),
                &mut gcr,
                NoDelay,
                IterationBudget::new(),
                RecordingLogger::default(),
            )
            .unwrap();
            assert_eq!(bus.module(), 8);
            assert_eq!(bus.input_clock().raw(), 50_000_000);
        }
        assert_eq!(gcr.get(GcrRegister::Mfsel4), 1 << 11);
        assert_eq!(mock.peek(Register::Ctl2) & ctl2::ENABLE, ctl2::ENABLE);
    }

    #[test]
    fn missing_clock_stops_before_pinmux() {
        let mut mock = MockController::new();
        let mut gcr = MockGcr::default();
        let config = SmbusConfigBuilder::new().module(3).build();
        let result = SmbusSystemSetup::init_bus(
            &config,
            &mut mock,
            &mut clocks(4, 50_000_000),
            &mut gcr,
            NoDelay,
            IterationBudget::new(),
            RecordingLogger::default(),
        );
        assert!(matches!(result, Err(Error::ClockUnavailable)));
        assert!(gcr.writes.is_empty());
        assert!(mock.log().is_empty());
    }

    #[test]
    fn unreachable_speed_fails_init() {
        let mut mock = MockController::new();
        let mut gcr = MockGcr::default();
        let config = SmbusConfigBuilder::new()
            .module(1)
            .bus_frequency(1.kHz())
            .build();
        let result = SmbusSystemSetup::init_bus(
            &config,
            &mut mock,
            &mut FixedClock(100.MHz()),
            &mut gcr,
            NoDelay,
            IterationBudget::new(),
            RecordingLogger::default(),
        );
        assert!(matches!(result, Err(Error::FrequencyOutOfRange)));
        assert_eq!(mock.peek(Register::Ctl2) & ctl2::ENABLE, 0);
    }
}
