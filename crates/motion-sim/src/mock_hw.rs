//! Mock driver and end-stop pair used in place of real GPIO/timer hardware.
//!
//! Shaped after the `MockDriver`/`NoEndStop` test doubles in
//! `motion::ramp`'s own unit tests — this harness just needs something
//! that implements the two hardware traits so `RampGenerator::tick` can
//! run against a real pipeline outside of a test.

use motion::ramp::{EndStop, RampGenerator, StepperDriver};

#[derive(Default)]
pub struct MockDriver {
    step_pending: bool,
    direction_positive: bool,
}

impl StepperDriver for MockDriver {
    fn set_direction(&mut self, positive: bool) {
        self.direction_positive = positive;
    }

    fn step_start(&mut self) {
        self.step_pending = true;
    }

    fn step_end(&mut self) -> bool {
        if self.step_pending {
            self.step_pending = false;
            true
        } else {
            false
        }
    }
}

/// An end-stop that never reports itself hit or valid, since this harness
/// has no physical limit switches to poll.
pub struct MockEndStop;

impl EndStop for MockEndStop {
    fn is_at_end_stop(&self, _is_max: bool) -> bool {
        false
    }

    fn is_valid(&self, _is_max: bool) -> bool {
        false
    }
}

pub fn new_ramp(step_gen_period_ns: u32, ticks_per_sec: f32) -> RampGenerator<MockDriver, MockEndStop, { motion::MAX_AXES }> {
    RampGenerator::new(step_gen_period_ns, ticks_per_sec)
}
