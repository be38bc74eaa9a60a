// Licensed under the Apache-2.0 license

//! Stuck-bus recovery and controller reset.

use embedded_hal::delay::DelayNs;

use crate::common::Logger;
use crate::i2c::npcm_smbus::{BusState, NpcmSmbus};
use crate::i2c::poll::PollPolicy;
use crate::i2c::registers::{
    cst, cst3, ctl2, ctl3, fif_ctl, fif_cts, st, Register, SmbusRegisters,
};

/// SCL pulses before giving up on a target that holds SDA low.
pub const RECOVERY_TOGGLES: u32 = 27;

const TOGGLE_SETTLE_US: u32 = 20;
const STOP_SETTLE_US: u32 = 200;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Both lines were already high.
    NotStuck,
    /// SDA came back and a START/STOP pair went out.
    Recovered,
    /// SDA stayed low, or the START afterwards failed.
    Failed,
}

impl<R, D, P, L> NpcmSmbus<R, D, P, L>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    /// Free a bus a target is holding, then reset the controller.
    ///
    /// While SDA reads low, SCL is pulsed (up to [`RECOVERY_TOGGLES`]
    /// times). Once SDA is released a START to `address` and an immediate
    /// STOP put every target back into a known state. The controller reset
    /// runs whatever the outcome.
    pub fn recover(&mut self, address: u8) -> RecoveryOutcome {
        let levels = self.regs.read(Register::Ctl3);
        let outcome = if levels & ctl3::SDA_LVL != 0 && levels & ctl3::SCL_LVL != 0 {
            self.logger
                .debug(format_args!("bus{} not stuck", self.module));
            RecoveryOutcome::NotStuck
        } else {
            self.release_lines(address)
        };

        self.reset();
        outcome
    }

    fn release_lines(&mut self, address: u8) -> RecoveryOutcome {
        self.logger.info(format_args!(
            "Performing I2C bus {} recovery...",
            self.module
        ));

        let mut released = false;
        for _ in 0..RECOVERY_TOGGLES {
            self.regs.write(Register::Cst, cst::TGSCL);
            self.delay.delay_us(TOGGLE_SETTLE_US);
            if self.regs.read(Register::Ctl3) & ctl3::SDA_LVL != 0 {
                released = true;
                break;
            }
        }

        if !released {
            self.logger
                .error(format_args!("Fail to recover I2C bus {}", self.module));
            return RecoveryOutcome::Failed;
        }

        self.regs.write(Register::Sda, address << 1);
        if let Err(e) = self.send_start(self.budgets.recovery_start) {
            self.logger
                .error(format_args!("recovery: send START err {e}"));
            return RecoveryOutcome::Failed;
        }
        self.delay.delay_us(TOGGLE_SETTLE_US);
        if let Err(e) = self.send_stop(0) {
            self.logger
                .error(format_args!("recovery: send STOP err {e}"));
        }
        self.delay.delay_us(STOP_SETTLE_US);

        self.logger
            .info(format_args!("I2C bus {} recovery completed", self.module));
        RecoveryOutcome::Recovered
    }

    /// Return the controller to its post-init state: module cycled, latches
    /// and FIFO cleared, bank 0 selected, no pending requests.
    pub fn reset(&mut self) {
        self.logger
            .debug(format_args!("bus{}: controller reset", self.module));

        self.regs.clear_bits(Register::Ctl2, ctl2::ENABLE);
        self.regs.set_bits(Register::Ctl2, ctl2::ENABLE);

        self.regs.write(Register::Cst, cst::BB);
        self.regs.write(Register::St, st::CLEAR_ALL);

        self.regs.set_bits(Register::Ctl3, ctl3::BNK_SEL);
        self.regs.write(Register::FifCts, fif_cts::CLR_FIFO);
        self.regs.clear_bits(Register::Ctl3, ctl3::BNK_SEL);

        self.regs.write(Register::Cst3, cst3::EO_BUSY);
        self.regs.clear_bits(Register::FifCtl, fif_ctl::FIFO_EN);
        self.regs.write(Register::Ctl1, 0);

        self.state = BusState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::RecordingLogger;
    use crate::i2c::common::SmbusConfigBuilder;
    use crate::i2c::mock::{MockController, StartFault};
    use crate::i2c::poll::test_support::SimClock;
    use crate::i2c::poll::IterationBudget;
    use crate::i2c::registers::ctl1;
    use fugit::RateExtU32;

    type TestBus<'a> = NpcmSmbus<&'a mut MockController, SimClock, IterationBudget, RecordingLogger>;

    fn bus(mock: &mut MockController, clock: SimClock) -> TestBus<'_> {
        let config = SmbusConfigBuilder::new().module(4).build();
        NpcmSmbus::new(
            mock,
            &config,
            50.MHz(),
            clock,
            IterationBudget::new(),
            RecordingLogger::default(),
        )
    }

    #[test]
    fn idle_bus_is_only_reset() {
        let mut mock = MockController::new();
        let clock = SimClock::default();
        {
            let mut bus = bus(&mut mock, clock.clone());
            assert_eq!(bus.recover(0x50), RecoveryOutcome::NotStuck);
            assert_eq!(bus.state(), BusState::Idle);
        }
        assert_eq!(mock.toggles(), 0);
        assert_eq!(mock.starts(), 0);
        assert_eq!(clock.elapsed_ns(), 0);
        assert_eq!(mock.writes_to(Register::Cst3), [cst3::EO_BUSY]);
    }

    #[test]
    fn released_sda_gets_start_stop() {
        let mut mock = MockController::new();
        mock.hold_sda_low(Some(3));
        let clock = SimClock::default();
        {
            let mut bus = bus(&mut mock, clock.clone());
            assert_eq!(bus.recover(0x50), RecoveryOutcome::Recovered);
            assert!(bus.logger.contains("I2C bus 4 recovery completed"));
            assert!(!bus.started());
        }
        assert_eq!(mock.toggles(), 3);
        assert_eq!(mock.starts(), 1);
        assert_eq!(mock.stops(), 1);
        assert_eq!(mock.writes_to(Register::Sda), [0xA0]);
        // three toggle settles, one after START, one after STOP
        assert_eq!(clock.elapsed_ns(), (3 * 20 + 20 + 200) * 1_000);
        assert_eq!(mock.peek(Register::Ctl1), 0);
    }

    #[test]
    fn sda_held_forever_gives_up() {
        let mut mock = MockController::new();
        mock.hold_sda_low(None);
        let clock = SimClock::default();
        {
            let mut bus = bus(&mut mock, clock.clone());
            assert_eq!(bus.recover(0x50), RecoveryOutcome::Failed);
            assert!(bus.logger.contains("Fail to recover I2C bus 4"));
        }
        assert_eq!(mock.toggles(), RECOVERY_TOGGLES);
        assert_eq!(mock.starts(), 0);
        assert_eq!(clock.elapsed_ns(), u64::from(RECOVERY_TOGGLES) * 20_000);
        // reset still happened
        assert_eq!(mock.writes_to(Register::Cst3), [cst3::EO_BUSY]);
    }

    #[test]
    fn scl_low_alone_counts_as_stuck() {
        let mut mock = MockController::new();
        mock.hold_scl_low();
        let mut bus = bus(&mut mock, SimClock::default());
        // SDA is high, so the first toggle already sees it released.
        assert_eq!(bus.recover(0x20), RecoveryOutcome::Recovered);
    }

    #[test]
    fn recovery_start_failure() {
        let mut mock = MockController::new();
        mock.hold_sda_low(Some(1));
        mock.script_start(StartFault::NoMaster);
        {
            let mut bus = bus(&mut mock, SimClock::default());
            assert_eq!(bus.recover(0x50), RecoveryOutcome::Failed);
            assert!(bus.logger.contains("recovery: send START err timeout"));
        }
        assert_eq!(mock.stops(), 0);
    }

    #[test]
    fn reset_restores_post_init_state() {
        let mut mock = MockController::new();
        mock.poke(Register::Ctl1, ctl1::STASTRE | ctl1::ACK);
        mock.poke(Register::FifCtl, fif_ctl::FIFO_EN);
        mock.poke(Register::St, st::NEGACK | st::STASTR);
        {
            let mut bus = bus(&mut mock, SimClock::default());
            bus.send_start(4).unwrap();
            bus.reset();
            assert_eq!(bus.state(), BusState::Idle);
        }
        assert_eq!(mock.peek(Register::Ctl1), 0);
        assert_eq!(mock.peek(Register::FifCtl) & fif_ctl::FIFO_EN, 0);
        assert_eq!(mock.peek(Register::St), 0);
        assert_eq!(mock.peek(Register::Ctl3) & ctl3::BNK_SEL, 0);
        assert_eq!(mock.peek(Register::Ctl2) & ctl2::ENABLE, ctl2::ENABLE);
        assert_eq!(mock.writes_to(Register::FifCts), [fif_cts::CLR_FIFO]);
    }
}
