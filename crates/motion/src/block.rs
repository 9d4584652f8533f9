//! `MotionBlock` — one planned trapezoidal segment in the pipeline.

use crate::axes::{AxesValues, AxisEndstopChecks, AxisSteps, MAX_AXES};

/// One planned trapezoidal motion segment. Constructed by the planner,
/// mutated during look-ahead recalculation, then frozen once the ramp
/// generator sets `is_executing = true`.
#[derive(Debug, Copy, Clone)]
pub struct MotionBlock {
    /// Signed target step delta per axis (sign = direction).
    pub steps_total_maybe_neg: AxesValues<AxisSteps>,
    /// The axis with the largest absolute step count — the Bresenham "clock".
    pub axis_idx_with_max_steps: usize,
    pub move_dist_primary_axes_mm: f32,
    /// Component of the move's unit vector along `axis_idx_with_max_steps` only.
    pub unit_vec_axis_with_max_dist: f32,

    pub requested_speed_mmps: f32,
    pub max_entry_speed_mmps: f32,
    pub entry_speed_mmps: f32,
    pub exit_speed_mmps: f32,

    /// Fixed-point ramp parameters (§4.5 / §4.3.3). These, and only
    /// these, are what the tick path reads — never floats.
    pub initial_step_rate_per_tticks: u32,
    pub max_step_rate_per_tticks: u32,
    pub final_step_rate_per_tticks: u32,
    pub acc_steps_per_tticks_per_ms: u32,
    pub steps_before_decel: u32,

    pub is_executing: bool,
    pub can_execute: bool,
    /// True when this block is a non-final sub-block of a split move;
    /// used to defer commit so acceleration continues smoothly (§4.3.2).
    pub block_is_followed: bool,

    pub end_stops_to_check: AxisEndstopChecks,
    pub motion_tracking_index: u32,

    pub is_ramped: bool,
}

impl Default for MotionBlock {
    fn default() -> Self {
        Self {
            steps_total_maybe_neg: AxesValues::splat(0),
            axis_idx_with_max_steps: 0,
            move_dist_primary_axes_mm: 0.0,
            unit_vec_axis_with_max_dist: 0.0,
            requested_speed_mmps: 0.0,
            max_entry_speed_mmps: 0.0,
            entry_speed_mmps: 0.0,
            exit_speed_mmps: 0.0,
            initial_step_rate_per_tticks: 0,
            max_step_rate_per_tticks: 0,
            final_step_rate_per_tticks: 0,
            acc_steps_per_tticks_per_ms: 0,
            steps_before_decel: 0,
            is_executing: false,
            can_execute: false,
            block_is_followed: false,
            end_stops_to_check: AxisEndstopChecks::new(),
            motion_tracking_index: 0,
            is_ramped: true,
        }
    }
}

impl MotionBlock {
    pub fn abs_steps(&self, axis: usize) -> u32 {
        self.steps_total_maybe_neg[axis].unsigned_abs()
    }

    pub fn direction_positive(&self, axis: usize) -> bool {
        self.steps_total_maybe_neg[axis] >= 0
    }

    pub fn max_steps(&self) -> u32 {
        (0..MAX_AXES).map(|i| self.abs_steps(i)).max().unwrap_or(0)
    }
}
