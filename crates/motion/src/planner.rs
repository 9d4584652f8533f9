//! `MotionPlanner` — turns a [`MotionArgs`] move request into one or more
//! [`MotionBlock`]s on the pipeline, then runs the backward/forward
//! look-ahead pass that settles every block's entry and exit speed.
//!
//! The planner itself holds almost no state: a `step_gen_period_ns` (the
//! ramp tick period) and a single side-channel remembering the previous
//! ramped move's unit vectors for the junction-deviation calculation. The
//! pipeline is owned by the caller (the block manager) and passed in by
//! reference to every method here.

use crate::args::MotionArgs;
use crate::axes::{AxesParams, AxesState, AxesValues, AxisPos, AxisSteps, MAX_AXES};
use crate::block::MotionBlock;
use crate::mathf::{fabsf, fminf, sqrtf};
use crate::pipeline::MotionPipeline;

/// Speed floor used as `max_entry_speed_mmps` when no junction-deviation
/// refinement applies (near-reversal junctions, or no previous move).
const MINIMUM_PLANNER_SPEED_MMPS: f32 = 0.0;

/// Remembers the previous ramped move's requested speed and per-axis unit
/// vector, kept separately from the pipeline because the previous block may
/// already have been dequeued and executed by the time the next move
/// arrives.
#[derive(Debug, Copy, Clone)]
struct PrevMoveInfo {
    max_param_speed_mmps: f32,
    unit_vectors: AxesValues<f32>,
}

pub struct MotionPlanner {
    step_gen_period_ns: u32,
    prev_move: Option<PrevMoveInfo>,
}

impl MotionPlanner {
    pub fn new(step_gen_period_ns: u32) -> Self {
        Self { step_gen_period_ns, prev_move: None }
    }

    pub fn setup(&mut self, step_gen_period_ns: u32) {
        self.step_gen_period_ns = step_gen_period_ns;
    }

    /// Stepwise (non-ramped) move: constant rate, used for homing and
    /// similar moves. `args.target` holds step counts directly on the axes
    /// it specifies (relative) or target units to diff against the current
    /// position (absolute, still step-domain on this path).
    ///
    /// Returns the prospective new steps-from-origin; the caller commits it
    /// to `axes_state` only once it is satisfied the move was accepted.
    pub fn move_to_non_ramped<const N: usize>(
        &mut self,
        args: &MotionArgs,
        axes_state: &AxesState,
        axes_params: &AxesParams,
        pipeline: &mut MotionPipeline<N>,
    ) -> AxesValues<AxisSteps> {
        let mut block = MotionBlock::default();
        block.entry_speed_mmps = 0.0;
        block.exit_speed_mmps = 0.0;

        let mut has_steps = false;
        let mut lowest_max_step_rate = f32::MAX;
        let mut steps_to_target = AxesValues::<AxisSteps>::splat(0);
        for axis in 0..MAX_AXES {
            let mut steps = 0i32;
            if args.axes_specified[axis] {
                steps = if args.mode.is_relative() {
                    args.target[axis] as i32
                } else {
                    (args.target[axis] - axes_state.units_from_origin[axis]) as i32
                };
            }
            if steps != 0 {
                has_steps = true;
                lowest_max_step_rate = fminf(lowest_max_step_rate, axes_params.max_step_rate_per_sec(axis));
            }
            steps_to_target[axis] = steps;
        }
        for axis in 0..MAX_AXES {
            if steps_to_target[axis].unsigned_abs() > steps_to_target[block.axis_idx_with_max_steps].unsigned_abs() {
                block.axis_idx_with_max_steps = axis;
            }
        }
        block.steps_total_maybe_neg = steps_to_target;

        if !has_steps {
            return axes_state.steps_from_origin;
        }

        block.unit_vec_axis_with_max_dist = 1.0;
        block.end_stops_to_check = args.endstops;
        block.motion_tracking_index = args.motion_tracking_index.unwrap_or(0);
        block.is_ramped = false;

        let requested_velocity = args.speed.resolve_step_rate(lowest_max_step_rate, axes_params.master().steps_per_unit());
        block.requested_speed_mmps = requested_velocity;

        if block.prepare_for_stepping(axes_params, true) {
            block.can_execute = true;
        }

        pipeline.add(block);
        if self.prev_move.is_none() {
            self.prev_move = Some(PrevMoveInfo { max_param_speed_mmps: 0.0, unit_vectors: AxesValues::splat(0.0) });
        }

        axes_state.steps_from_origin + block.steps_total_maybe_neg
    }

    /// Ramped move: the core trapezoidal-profile path. `dest_actuator_coords`
    /// is the already-kinematics-resolved target in step space;
    /// `args.target` is the full (pre-processed) target in units.
    ///
    /// Returns `true` if a block was added. Commits the new position to
    /// `axes_state` itself on success, mirroring the original's single call
    /// doing both the push and the position update.
    ///
    /// `run_recalc` lets a caller splitting one command into many sub-blocks
    /// defer the (relatively expensive) look-ahead pass until the final
    /// sub-block has been pushed, then run it once for the whole batch.
    pub fn move_to_ramped<const N: usize>(
        &mut self,
        args: &MotionArgs,
        dest_actuator_coords: &AxesValues<AxisSteps>,
        axes_state: &mut AxesState,
        axes_params: &AxesParams,
        pipeline: &mut MotionPipeline<N>,
        run_recalc: bool,
    ) -> bool {
        // The "first" primary axis: literally the *last* one found while
        // scanning forward, matching the original source exactly (most
        // configurations have exactly one primary axis, making this moot).
        let mut first_primary_axis: i32 = -1;
        for axis in 0..MAX_AXES {
            if axes_params.axes[axis].is_primary_axis {
                first_primary_axis = axis as i32;
            }
        }
        let first_primary_axis = if first_primary_axis < 0 { 0 } else { first_primary_axis as usize };

        let mut deltas = [0.0f32; MAX_AXES];
        let mut is_a_move = false;
        let mut is_a_primary_move = false;
        let mut axis_with_max_move_dist = 0usize;
        let mut square_sum = 0.0f32;
        let mut target_axes_pos = AxesValues::<AxisPos>::splat(0.0);
        for axis in 0..MAX_AXES {
            target_axes_pos[axis] = args.target[axis];
            deltas[axis] = target_axes_pos[axis] - axes_state.units_from_origin[axis];
            if deltas[axis] != 0.0 {
                is_a_move = true;
                if axes_params.axes[axis].is_primary_axis {
                    square_sum += deltas[axis] * deltas[axis];
                    is_a_primary_move = true;
                }
            }
            if fabsf(deltas[axis]) > fabsf(deltas[axis_with_max_move_dist]) {
                axis_with_max_move_dist = axis;
            }
        }

        let move_dist = sqrtf(square_sum);
        if !is_a_move || move_dist < crate::axes::MINIMUM_MOVE_DIST_MM {
            return false;
        }

        let mut block = MotionBlock::default();
        block.is_ramped = true;
        block.block_is_followed = args.more_moves_coming;
        block.end_stops_to_check = args.endstops;
        block.motion_tracking_index = args.motion_tracking_index.unwrap_or(0);

        let mut requested_velocity = axes_params.axes[first_primary_axis].max_speed_ups;
        let resolved = args.speed.resolve_units_per_sec(axes_params.master().max_speed_ups, axes_params.master().steps_per_unit());
        if resolved < requested_velocity {
            requested_velocity = resolved;
        }

        let mut unit_vectors = AxesValues::<f32>::splat(0.0);
        for axis in 0..MAX_AXES {
            if axes_params.axes[axis].is_primary_axis {
                unit_vectors[axis] = deltas[axis] / move_dist;
            }
        }

        block.requested_speed_mmps = requested_velocity;
        block.move_dist_primary_axes_mm = move_dist;

        let mut has_steps = false;
        let mut steps_to_perform = AxesValues::<AxisSteps>::splat(0);
        for axis in 0..MAX_AXES {
            let steps_float = dest_actuator_coords[axis] as f32 - axes_state.steps_from_origin[axis] as f32;
            let steps = crate::mathf::ceilf(steps_float) as i32;
            if steps != 0 {
                has_steps = true;
            }
            steps_to_perform[axis] = steps;
        }
        block.steps_total_maybe_neg = steps_to_perform;
        for axis in 0..MAX_AXES {
            if steps_to_perform[axis].unsigned_abs() > steps_to_perform[block.axis_idx_with_max_steps].unsigned_abs() {
                block.axis_idx_with_max_steps = axis;
            }
        }

        if !has_steps {
            return false;
        }

        block.unit_vec_axis_with_max_dist = unit_vectors[axis_with_max_move_dist];

        let max_junction_deviation_mm = axes_params.max_junction_deviation_mm;
        let mut vmax_junction_mmps = MINIMUM_PLANNER_SPEED_MMPS;

        if pipeline.is_empty() {
            self.prev_move = None;
        }

        if is_a_primary_move {
            if let Some(prev) = &self.prev_move {
                let prev_param_speed = prev.max_param_speed_mmps;
                if max_junction_deviation_mm > 0.0 && prev_param_speed > 0.0 {
                    let cos_theta = -unit_vectors.dot(&prev.unit_vectors);
                    if cos_theta < 0.95 {
                        vmax_junction_mmps = fminf(prev_param_speed, block.requested_speed_mmps);
                        if cos_theta > -0.95 {
                            let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
                            vmax_junction_mmps = fminf(
                                vmax_junction_mmps,
                                sqrtf(axes_params.master().max_accel_ups2 * max_junction_deviation_mm * sin_theta_d2 / (1.0 - sin_theta_d2)),
                            );
                        }
                    }
                }
            }
        }
        block.max_entry_speed_mmps = vmax_junction_mmps;

        pipeline.add(block);
        self.prev_move = Some(PrevMoveInfo { max_param_speed_mmps: block.requested_speed_mmps, unit_vectors });

        if run_recalc {
            self.recalculate_pipeline(pipeline, axes_params);
        }

        axes_state.units_from_origin = target_axes_pos;
        axes_state.steps_from_origin = axes_state.steps_from_origin + block.steps_total_maybe_neg;

        true
    }

    /// Backward pass (settle exit speeds from the tail), forward pass
    /// (settle entry/exit speeds from the earliest touched block), then a
    /// final pass computing each touched block's ramp parameters and
    /// releasing it to the ramp generator once `can_execute` is safe to set.
    pub fn recalculate_pipeline<const N: usize>(&mut self, pipeline: &mut MotionPipeline<N>, axes_params: &AxesParams) {
        let master_accel = axes_params.master().max_accel_ups2;

        let mut reverse_idx: usize = 0;
        let mut earliest: i64 = -1;
        let mut previous_block_exit_speed = 0.0f32;
        let mut following_block_entry_speed = 0.0f32;
        let mut have_following = false;
        let mut following_exit_speed = 0.0f32;
        let mut following_max_entry_speed = 0.0f32;
        let mut following_move_dist = 0.0f32;

        loop {
            let should_break = {
                let blk = match pipeline.peek_nth_from_put(reverse_idx) {
                    Some(b) => b,
                    None => break,
                };
                if blk.is_executing {
                    previous_block_exit_speed = blk.exit_speed_mmps;
                    true
                } else if blk.entry_speed_mmps == blk.max_entry_speed_mmps && reverse_idx > 1 {
                    previous_block_exit_speed = blk.exit_speed_mmps;
                    true
                } else {
                    false
                }
            };
            if should_break {
                break;
            }

            if have_following {
                let max_achievable = max_achievable_speed(master_accel, following_exit_speed, following_move_dist);
                following_block_entry_speed = fminf(max_achievable, following_max_entry_speed);
                let prev_blk = pipeline.peek_nth_from_put(reverse_idx - 1).expect("previous iteration visited this index");
                prev_blk.entry_speed_mmps = following_block_entry_speed;
            }

            let blk = pipeline.peek_nth_from_put(reverse_idx).expect("checked above");
            blk.exit_speed_mmps = following_block_entry_speed;
            following_exit_speed = blk.exit_speed_mmps;
            following_max_entry_speed = blk.max_entry_speed_mmps;
            following_move_dist = blk.move_dist_primary_axes_mm;
            have_following = true;

            earliest = reverse_idx as i64;
            reverse_idx += 1;
        }

        if earliest < 0 {
            return;
        }

        let mut idx = earliest;
        while idx >= 0 {
            let blk = match pipeline.peek_nth_from_put(idx as usize) {
                Some(b) => b,
                None => break,
            };
            blk.entry_speed_mmps = previous_block_exit_speed;
            let max_exit_speed = max_achievable_speed(master_accel, blk.entry_speed_mmps, blk.move_dist_primary_axes_mm);
            blk.exit_speed_mmps = fminf(max_exit_speed, blk.exit_speed_mmps);
            previous_block_exit_speed = blk.exit_speed_mmps;
            idx -= 1;
        }

        let mut idx = earliest;
        while idx >= 0 {
            let pipeline_count = pipeline.count();
            let blk = match pipeline.peek_nth_from_put(idx as usize) {
                Some(b) => b,
                None => break,
            };
            if blk.prepare_for_stepping(axes_params, false) && (!blk.block_is_followed || pipeline_count > 1) {
                blk.can_execute = true;
            }
            idx -= 1;
        }
    }
}

/// `v_result = sqrt(v^2 + 2*a*s)` — the speed reachable (or required) over
/// distance `s` at constant acceleration `a` starting from (or ending at) `v`.
fn max_achievable_speed(acceleration: f32, velocity: f32, distance: f32) -> f32 {
    sqrtf(velocity * velocity + 2.0 * acceleration * distance)
}

impl MotionBlock {
    /// Computes the fixed-point ramp parameters the tick path consumes.
    /// `is_linear` selects the stepwise (constant-rate, no accel/decel)
    /// path used for non-ramped moves; otherwise this derives the
    /// acceleration/deceleration split for the trapezoidal profile.
    #[allow(unused_assignments)]
    pub fn prepare_for_stepping(&mut self, axes_params: &AxesParams, is_linear: bool) -> bool {
        if self.is_executing {
            return false;
        }

        let abs_max_steps_for_any_axis = self.steps_total_maybe_neg[self.axis_idx_with_max_steps].unsigned_abs();

        let initial_step_rate_per_sec;
        let final_step_rate_per_sec;
        let max_acc_steps_per_sec2;
        let mut axis_max_step_rate_per_sec;
        let steps_decelerating;
        let mut step_dist_mm = 0.0f32;

        if is_linear {
            let mut step_rate_per_sec = self.requested_speed_mmps;
            let axis_max = axes_params.max_step_rate_per_sec(self.axis_idx_with_max_steps);
            if step_rate_per_sec > axis_max {
                step_rate_per_sec = axis_max;
            }
            initial_step_rate_per_sec = step_rate_per_sec;
            final_step_rate_per_sec = step_rate_per_sec;
            max_acc_steps_per_sec2 = step_rate_per_sec;
            axis_max_step_rate_per_sec = step_rate_per_sec;
            steps_decelerating = 0u32;
        } else {
            step_dist_mm = fabsf(self.move_dist_primary_axes_mm / self.steps_total_maybe_neg[self.axis_idx_with_max_steps] as f32);
            let axis_max = axes_params.max_step_rate_per_sec(self.axis_idx_with_max_steps);

            let mut initial = fabsf(self.entry_speed_mmps / step_dist_mm);
            if initial > axis_max {
                initial = axis_max;
            }
            initial_step_rate_per_sec = initial;

            let mut fin = fabsf(self.exit_speed_mmps / step_dist_mm);
            if fin > axis_max {
                fin = axis_max;
            }
            final_step_rate_per_sec = fin;

            max_acc_steps_per_sec2 = fabsf(axes_params.axes[self.axis_idx_with_max_steps].max_accel_ups2 / step_dist_mm);

            let steps_accelerating_float = crate::mathf::ceilf(
                (final_step_rate_per_sec * final_step_rate_per_sec - initial_step_rate_per_sec * initial_step_rate_per_sec) / 4.0 / max_acc_steps_per_sec2
                    + abs_max_steps_for_any_axis as f32 / 2.0,
            );
            let mut steps_accelerating = if steps_accelerating_float > 0.0 {
                let v = steps_accelerating_float as u32;
                if v > abs_max_steps_for_any_axis { abs_max_steps_for_any_axis } else { v }
            } else {
                0
            };

            let mut axis_max_rate = fabsf(self.requested_speed_mmps / step_dist_mm);
            if axis_max_rate > axis_max {
                axis_max_rate = axis_max;
            }
            axis_max_step_rate_per_sec = axis_max_rate;

            let steps_to_max_speed = ((axis_max_step_rate_per_sec * axis_max_step_rate_per_sec - initial_step_rate_per_sec * initial_step_rate_per_sec) / 2.0 / max_acc_steps_per_sec2) as u32;
            if steps_accelerating > steps_to_max_speed {
                steps_accelerating = steps_to_max_speed;
                steps_decelerating = ((axis_max_step_rate_per_sec * axis_max_step_rate_per_sec - final_step_rate_per_sec * final_step_rate_per_sec) / 2.0 / max_acc_steps_per_sec2) as u32;
            } else {
                axis_max_step_rate_per_sec = sqrtf(initial_step_rate_per_sec * initial_step_rate_per_sec + 2.0 * max_acc_steps_per_sec2 * steps_accelerating as f32);
                steps_decelerating = abs_max_steps_for_any_axis - steps_accelerating;
            }
        }

        let ticks_per_sec = axes_params.ticks_per_sec;
        self.initial_step_rate_per_tticks = ((initial_step_rate_per_sec * crate::axes::TTICKS_VALUE as f32) / ticks_per_sec) as u32;
        self.max_step_rate_per_tticks = ((axis_max_step_rate_per_sec * crate::axes::TTICKS_VALUE as f32) / ticks_per_sec) as u32;
        self.final_step_rate_per_tticks = ((final_step_rate_per_sec * crate::axes::TTICKS_VALUE as f32) / ticks_per_sec) as u32;
        self.acc_steps_per_tticks_per_ms = ((max_acc_steps_per_sec2 * crate::axes::TTICKS_VALUE as f32) / ticks_per_sec / 1000.0) as u32;
        self.steps_before_decel = abs_max_steps_for_any_axis - steps_decelerating;
        let _ = step_dist_mm;

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::{AxisEndstopChecks, AxisParams};

    fn test_axes_params() -> AxesParams {
        let axis = AxisParams {
            max_speed_ups: 100.0,
            max_accel_ups2: 500.0,
            max_rpm: 0.0,
            steps_per_rot: 200.0,
            units_per_rot: 1.0,
            min_val_valid: false,
            min_val: 0.0,
            max_val_valid: false,
            max_val: 0.0,
            is_primary_axis: true,
            is_dominant_axis: false,
        };
        AxesParams::new([axis; MAX_AXES], 3)
    }

    #[test]
    fn non_ramped_move_produces_executable_block() {
        let params = test_axes_params();
        let mut state = AxesState::default();
        state.set_cur_position_as_origin();
        let mut pipeline: MotionPipeline<8> = MotionPipeline::new();
        let mut planner = MotionPlanner::new(20_000);

        let mut args = MotionArgs::default();
        args.mode = crate::args::MotionMode::PosRelStepsNoRamp;
        args.set_axis(0, 400.0);

        let new_steps = planner.move_to_non_ramped(&args, &state, &params, &mut pipeline);
        assert_eq!(new_steps[0], 400);
        assert_eq!(pipeline.count(), 1);
        assert!(pipeline.peek_nth_from_get(0).unwrap().can_execute);
    }

    #[test]
    fn ramped_move_settles_trapezoid_speeds() {
        let params = test_axes_params();
        let mut state = AxesState::default();
        state.set_cur_position_as_origin();
        let mut pipeline: MotionPipeline<8> = MotionPipeline::new();
        let mut planner = MotionPlanner::new(20_000);

        let mut args = MotionArgs::default();
        args.set_axis(0, 10.0);
        let dest = AxesValues::<AxisSteps>::new([2000, 0, 0]);

        let added = planner.move_to_ramped(&args, &dest, &mut state, &params, &mut pipeline, true);
        assert!(added);
        let blk = pipeline.peek_nth_from_get(0).unwrap();
        assert!(blk.can_execute);
        assert_eq!(blk.exit_speed_mmps, 0.0);
        assert!(blk.max_step_rate_per_tticks > 0);
    }

    #[test]
    fn straight_consecutive_moves_keep_full_junction_speed() {
        let params = test_axes_params();
        let mut state = AxesState::default();
        state.set_cur_position_as_origin();
        let mut pipeline: MotionPipeline<8> = MotionPipeline::new();
        let mut planner = MotionPlanner::new(20_000);

        let mut args1 = MotionArgs::default();
        args1.set_axis(0, 10.0);
        args1.more_moves_coming = true;
        let dest1 = AxesValues::<AxisSteps>::new([2000, 0, 0]);
        assert!(planner.move_to_ramped(&args1, &dest1, &mut state, &params, &mut pipeline, true));

        let mut args2 = MotionArgs::default();
        args2.set_axis(0, 20.0);
        let dest2 = AxesValues::<AxisSteps>::new([4000, 0, 0]);
        assert!(planner.move_to_ramped(&args2, &dest2, &mut state, &params, &mut pipeline, true));

        let first = pipeline.peek_nth_from_get(0).unwrap();
        assert_eq!(first.exit_speed_mmps, first.requested_speed_mmps.min(100.0));
    }

    #[test]
    fn no_real_movement_is_rejected() {
        let params = test_axes_params();
        let mut state = AxesState::default();
        state.set_cur_position_as_origin();
        let mut pipeline: MotionPipeline<8> = MotionPipeline::new();
        let mut planner = MotionPlanner::new(20_000);

        let args = MotionArgs::default();
        let dest = AxesValues::<AxisSteps>::new([0, 0, 0]);
        assert!(!planner.move_to_ramped(&args, &dest, &mut state, &params, &mut pipeline, true));
        let _ = AxisEndstopChecks::new();
    }
}
