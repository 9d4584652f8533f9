//! `RampGenerator` — the tick-driven step-pulse engine.
//!
//! Runs from a periodic timer (ISR) or a tight polling loop; either way
//! `tick()` is called once per period and does a bounded, allocation-free,
//! float-free amount of work (§5: nothing in this path may block, allocate,
//! or touch the FPU). Hardware is reached only through the [`StepperDriver`]
//! and [`EndStop`] traits, folded in from the same shape as
//! `mcu-drivers::stepper::{AtomicGpioPort, Timer}` but keyed per axis
//! (one driver object per stepper) rather than per GPIO port, matching how
//! the original drives one `StepDriverBase` per axis rather than a single
//! packed port register.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::axes::{AxisEndstopChecks, EndstopCheck, MAX_AXES, NS_IN_A_MS, TTICKS_VALUE};
use crate::block::MotionBlock;
use crate::pipeline::MotionPipeline;

/// One axis's stepper driver, toggled only from the tick path.
pub trait StepperDriver {
    fn set_direction(&mut self, positive: bool);
    /// Raises the STEP pin.
    fn step_start(&mut self);
    /// Lowers the STEP pin. Returns `true` if a pin was actually lowered
    /// (a driver with no pending step returns `false`).
    fn step_end(&mut self) -> bool;
}

/// One axis's end-stop pair, polled only from the tick path.
pub trait EndStop {
    fn is_at_end_stop(&self, is_max: bool) -> bool;
    fn is_valid(&self, is_max: bool) -> bool;
}

const MIN_STEP_RATE_PER_SEC: f32 = 10.0;

/// `MotionBlock::calcMinStepRatePerTTicks` — the floor that keeps the step
/// accumulator from ever stalling, even with `entry_speed_mmps == 0`.
pub fn min_step_rate_per_tticks(ticks_per_sec: f32) -> u32 {
    ((MIN_STEP_RATE_PER_SEC * TTICKS_VALUE as f32) / ticks_per_sec) as u32
}

#[derive(Debug, Default, Copy, Clone)]
struct EndStopCheckEntry {
    axis_idx: usize,
    is_max: bool,
    check_hit: bool,
}

/// Per-tick engine state. Generic over `N`, the driver/endstop count, which
/// must match the pipeline's axis count.
pub struct RampGenerator<D, E, const N: usize> {
    drivers: [Option<D>; N],
    end_stops: [Option<E>; N],

    is_paused: bool,
    stop_pending: bool,
    end_stop_reached: bool,

    axis_total_steps: [AtomicI32; N],
    total_steps_inc: [i32; N],
    steps_total_abs: [u32; N],
    cur_step_count: [u32; N],
    cur_accumulator_relative: [u32; N],

    cur_step_rate_per_tticks: u32,
    cur_accumulator_step: u32,
    cur_accumulator_ns: u32,
    min_step_rate_per_tticks: u32,

    end_stop_checks: heapless::Vec<EndStopCheckEntry, MAX_AXES>,

    step_gen_period_ns: u32,
}

impl<D, E, const N: usize> RampGenerator<D, E, N>
where
    D: StepperDriver,
    E: EndStop,
{
    pub fn new(step_gen_period_ns: u32, ticks_per_sec: f32) -> Self {
        Self {
            drivers: core::array::from_fn(|_| None),
            end_stops: core::array::from_fn(|_| None),
            is_paused: true,
            stop_pending: false,
            end_stop_reached: false,
            axis_total_steps: core::array::from_fn(|_| AtomicI32::new(0)),
            total_steps_inc: [0; N],
            steps_total_abs: [0; N],
            cur_step_count: [0; N],
            cur_accumulator_relative: [0; N],
            cur_step_rate_per_tticks: 0,
            cur_accumulator_step: 0,
            cur_accumulator_ns: 0,
            min_step_rate_per_tticks: min_step_rate_per_tticks(ticks_per_sec),
            end_stop_checks: heapless::Vec::new(),
            step_gen_period_ns,
        }
    }

    pub fn set_driver(&mut self, axis_idx: usize, driver: D) {
        self.drivers[axis_idx] = Some(driver);
    }

    pub fn set_end_stop(&mut self, axis_idx: usize, end_stop: E) {
        self.end_stops[axis_idx] = Some(end_stop);
    }

    pub fn start(&mut self) {
        self.stop_pending = false;
        self.is_paused = false;
        self.end_stop_reached = false;
    }

    pub fn stop(&mut self) {
        self.stop_pending = true;
    }

    pub fn pause(&mut self, pause_it: bool) {
        self.is_paused = pause_it;
        if !self.is_paused {
            self.end_stop_reached = false;
        }
    }

    pub fn clear_end_stop_reached(&mut self) {
        self.end_stop_reached = false;
    }

    pub fn is_end_stop_reached(&self) -> bool {
        self.end_stop_reached
    }

    pub fn total_step_position(&self, axis_idx: usize) -> i32 {
        self.axis_total_steps[axis_idx].load(Ordering::Acquire)
    }

    pub fn reset_total_step_position(&mut self) {
        for v in &self.axis_total_steps {
            v.store(0, Ordering::Release);
        }
    }

    /// §4.5's 8-step per-tick algorithm. Call once per ramp-tick period.
    pub fn tick<const PIPE_N: usize>(&mut self, pipeline: &mut MotionPipeline<PIPE_N>) {
        // 1. Step-end first: guarantees pulse high-time >= one tick.
        if self.handle_step_end() {
            return;
        }

        // 2. Stop pending.
        if self.stop_pending {
            if let Some(block) = pipeline.peek_get() {
                if block.is_executing {
                    self.end_motion(pipeline);
                }
            }
            self.stop_pending = false;
            return;
        }

        // 3. Pause.
        if self.is_paused {
            return;
        }

        // 4. Pick up head block.
        let new_block = match pipeline.peek_get() {
            Some(block) if block.can_execute => !block.is_executing,
            _ => return,
        };
        {
            let block = pipeline.peek_get().expect("checked above");
            block.is_executing = true;
        }

        // 5. First tick of a new block: setup only, return.
        if new_block {
            let block = *pipeline.peek_get().expect("checked above");
            self.setup_new_block(&block);
            return;
        }

        // 6. End-stop check.
        if self.check_end_stops() {
            self.end_stop_reached = true;
            self.end_motion(pipeline);
            return;
        }

        // 7. Per-millisecond acceleration accumulator.
        let axis_idx_with_max_steps = pipeline.peek_get().expect("checked above").axis_idx_with_max_steps;
        let block = *pipeline.peek_get().expect("checked above");
        self.update_ms_accumulator(&block, axis_idx_with_max_steps);

        // 8. Step accumulator.
        self.cur_accumulator_step = self.cur_accumulator_step.wrapping_add(self.cur_step_rate_per_tticks.max(self.min_step_rate_per_tticks));
        if self.cur_accumulator_step >= TTICKS_VALUE {
            let any_axis_moving = self.handle_step_motion(&block);
            if !any_axis_moving {
                self.end_motion(pipeline);
            }
        }
    }

    fn handle_step_end(&mut self) -> bool {
        let mut any_pin_reset = false;
        for i in 0..N {
            if let Some(driver) = self.drivers[i].as_mut() {
                if driver.step_end() {
                    any_pin_reset = true;
                    self.axis_total_steps[i].fetch_add(self.total_steps_inc[i], Ordering::AcqRel);
                }
            }
        }
        any_pin_reset
    }

    fn setup_new_block(&mut self, block: &MotionBlock) {
        self.end_stop_checks.clear();
        for axis_idx in 0..N {
            if self.drivers[axis_idx].is_none() {
                continue;
            }
            let steps_total = block.steps_total_maybe_neg[axis_idx];
            self.steps_total_abs[axis_idx] = steps_total.unsigned_abs();
            self.cur_step_count[axis_idx] = 0;
            self.cur_accumulator_relative[axis_idx] = 0;

            let positive = steps_total >= 0;
            if let Some(driver) = self.drivers[axis_idx].as_mut() {
                driver.set_direction(positive);
            }
            self.total_steps_inc[axis_idx] = if positive { 1 } else { -1 };

            if block.end_stops_to_check.any_active() {
                for side in [AxisEndstopChecks::MIN, AxisEndstopChecks::MAX] {
                    let check = block.end_stops_to_check.get(axis_idx, side);
                    if matches!(check, EndstopCheck::None) {
                        continue;
                    }
                    let is_max = side == AxisEndstopChecks::MAX;
                    if matches!(check, EndstopCheck::Towards) {
                        let heading_towards = (is_max && steps_total > 0) || (!is_max && steps_total < 0);
                        if !heading_towards {
                            continue;
                        }
                    }
                    if let Some(end_stop) = self.end_stops[axis_idx].as_ref() {
                        if end_stop.is_valid(is_max) {
                            let _ = self.end_stop_checks.push(EndStopCheckEntry {
                                axis_idx,
                                is_max,
                                check_hit: !matches!(check, EndstopCheck::NotHit),
                            });
                        }
                    }
                }
            }
        }

        self.cur_accumulator_step = 0;
        self.cur_accumulator_ns = 0;
        self.cur_step_rate_per_tticks = block.initial_step_rate_per_tticks;
    }

    fn check_end_stops(&self) -> bool {
        for entry in &self.end_stop_checks {
            if let Some(end_stop) = self.end_stops[entry.axis_idx].as_ref() {
                if end_stop.is_at_end_stop(entry.is_max) == entry.check_hit {
                    return true;
                }
            }
        }
        false
    }

    fn update_ms_accumulator(&mut self, block: &MotionBlock, axis_idx_with_max_steps: usize) {
        self.cur_accumulator_ns = self.cur_accumulator_ns.wrapping_add(self.step_gen_period_ns);
        if self.cur_accumulator_ns >= NS_IN_A_MS {
            self.cur_accumulator_ns -= NS_IN_A_MS;

            if self.cur_step_count[axis_idx_with_max_steps] > block.steps_before_decel {
                let floor = self
                    .min_step_rate_per_tticks
                    .saturating_add(block.acc_steps_per_tticks_per_ms)
                    .max(block.final_step_rate_per_tticks.saturating_add(block.acc_steps_per_tticks_per_ms));
                if self.cur_step_rate_per_tticks > floor {
                    self.cur_step_rate_per_tticks -= block.acc_steps_per_tticks_per_ms;
                }
            } else if self.cur_step_rate_per_tticks < self.min_step_rate_per_tticks || self.cur_step_rate_per_tticks < block.max_step_rate_per_tticks {
                if self.cur_step_rate_per_tticks + block.acc_steps_per_tticks_per_ms < TTICKS_VALUE {
                    self.cur_step_rate_per_tticks += block.acc_steps_per_tticks_per_ms;
                }
            }
        }
    }

    fn handle_step_motion(&mut self, block: &MotionBlock) -> bool {
        let mut any_axis_moving = false;
        let axis_idx_max = block.axis_idx_with_max_steps;
        if axis_idx_max >= N {
            return false;
        }

        self.cur_accumulator_step -= TTICKS_VALUE;

        if self.cur_step_count[axis_idx_max] < self.steps_total_abs[axis_idx_max] {
            if let Some(driver) = self.drivers[axis_idx_max].as_mut() {
                driver.step_start();
            }
            self.cur_step_count[axis_idx_max] += 1;
            if self.cur_step_count[axis_idx_max] < self.steps_total_abs[axis_idx_max] {
                any_axis_moving = true;
            }
        }

        for axis_idx in 0..N {
            if axis_idx == axis_idx_max || self.cur_step_count[axis_idx] == self.steps_total_abs[axis_idx] {
                continue;
            }

            self.cur_accumulator_relative[axis_idx] += self.steps_total_abs[axis_idx];
            if self.cur_accumulator_relative[axis_idx] >= self.steps_total_abs[axis_idx_max] {
                self.cur_accumulator_relative[axis_idx] -= self.steps_total_abs[axis_idx_max];

                if let Some(driver) = self.drivers[axis_idx].as_mut() {
                    driver.step_start();
                }
                self.cur_step_count[axis_idx] += 1;
                if self.cur_step_count[axis_idx] < self.steps_total_abs[axis_idx] {
                    any_axis_moving = true;
                }
            }
        }

        any_axis_moving
    }

    fn end_motion<const PIPE_N: usize>(&mut self, pipeline: &mut MotionPipeline<PIPE_N>) {
        pipeline.remove();
    }
}
