//! `MotionBlockManager` — owns axis state and kinematics, resolves a
//! [`MotionArgs`] move request into actuator coordinates, and pumps a
//! large move through the planner as a sequence of sub-blocks so the
//! pipeline never blocks waiting for a single huge IK-resolved segment.

use crate::args::{MotionArgs, OutOfBoundsPolicy};
use crate::axes::{AxesParams, AxesState, AxesValues, AxisPos, AxisSteps};
use crate::error::{MotionError, MotionResult};
use crate::kinematics::Kinematics;
use crate::pipeline::MotionPipeline;
use crate::planner::MotionPlanner;

pub struct MotionBlockManager {
    axes_state: AxesState,
    planner: MotionPlanner,
    kinematics: Option<Kinematics>,
    homing_needed_before_any_move: bool,

    block_motion_args: MotionArgs,
    final_target_pos: AxesValues<AxisPos>,
    block_motion_vector: AxesValues<AxisPos>,
    num_blocks: u32,
    next_block_idx: u32,

    /// Set when a split move's start and end actuator coordinates both
    /// resolve cleanly, so intermediate sub-blocks can be interpolated in
    /// actuator space instead of each paying for a fresh IK solve.
    use_actuator_interpolation: bool,
    start_actuator_coords: AxesValues<AxisSteps>,
    end_actuator_coords: AxesValues<AxisSteps>,
}

impl MotionBlockManager {
    pub fn new(step_gen_period_ns: u32) -> Self {
        Self {
            axes_state: AxesState::default(),
            planner: MotionPlanner::new(step_gen_period_ns),
            kinematics: None,
            homing_needed_before_any_move: false,
            block_motion_args: MotionArgs::default(),
            final_target_pos: AxesValues::splat(0.0),
            block_motion_vector: AxesValues::splat(0.0),
            num_blocks: 0,
            next_block_idx: 0,
            use_actuator_interpolation: false,
            start_actuator_coords: AxesValues::splat(0),
            end_actuator_coords: AxesValues::splat(0),
        }
    }

    pub fn setup(&mut self, step_gen_period_ns: u32, kinematics: Kinematics) {
        self.planner.setup(step_gen_period_ns);
        self.kinematics = Some(kinematics);
    }

    pub fn set_homing_needed_before_move(&mut self, needed: bool) {
        self.homing_needed_before_any_move = needed;
    }

    pub fn is_homing_needed_before_move(&self) -> bool {
        self.homing_needed_before_any_move
    }

    pub fn is_busy(&self) -> bool {
        self.num_blocks != 0
    }

    pub fn axes_state(&self) -> &AxesState {
        &self.axes_state
    }

    pub fn set_cur_position_as_origin(&mut self) {
        self.axes_state.set_cur_position_as_origin();
    }

    /// Non-ramped (constant speed) move — homing and similar. Leaves
    /// `units_from_origin` marked invalid since only step counts moved.
    pub fn add_non_ramped_block<const N: usize>(&mut self, args: MotionArgs, params: &AxesParams, pipeline: &mut MotionPipeline<N>) -> MotionResult<()> {
        if self.homing_needed_before_any_move && !self.axes_state.units_from_origin_valid && !args.mode.is_steps() {
            return Err(MotionError::NotHomed);
        }
        let new_steps = self.planner.move_to_non_ramped(&args, &self.axes_state, params, pipeline);
        self.axes_state.steps_from_origin = new_steps;
        self.axes_state.units_from_origin_valid = false;
        Ok(())
    }

    /// Begins a ramped move, to be split into `num_blocks` sub-blocks by
    /// `pump_block_splitter`. For `num_blocks > 1`, resolves the start and
    /// end actuator coordinates once via full IK; if both resolve, every
    /// intermediate sub-block is later placed by linear interpolation
    /// between them instead of its own IK solve, and only the final
    /// sub-block re-resolves exactly (so cumulative interpolation error
    /// never reaches the commanded target). A failure at either anchor
    /// rejects the whole move before anything is committed to the pipeline.
    pub fn add_ramped_block<const N: usize>(&mut self, args: MotionArgs, num_blocks: u32, params: &AxesParams) -> MotionResult<()> {
        let kinematics = self.kinematics.as_ref().ok_or(MotionError::NoKinematics)?;
        if self.homing_needed_before_any_move && !self.axes_state.units_from_origin_valid {
            return Err(MotionError::NotHomed);
        }

        let num_blocks = num_blocks.max(1);
        let final_target_pos = args.target;
        let start = self.axes_state.units_from_origin;
        let vector = (final_target_pos - start) / num_blocks as f32;

        self.use_actuator_interpolation = false;
        if num_blocks > 1 {
            let mut start_pt = start;
            let mut start_steps = AxesValues::splat(0);
            let start_valid = kinematics.pt_to_actuator(&mut start_pt, &mut start_steps, &self.axes_state, params, OutOfBoundsPolicy::Allow);

            let mut end_pt = final_target_pos;
            let mut end_steps = AxesValues::splat(0);
            let end_valid = kinematics.pt_to_actuator(&mut end_pt, &mut end_steps, &self.axes_state, params, args.out_of_bounds);

            if start_valid && end_valid {
                self.start_actuator_coords = start_steps;
                self.end_actuator_coords = end_steps;
                self.use_actuator_interpolation = true;
            } else {
                return Err(MotionError::OutOfBounds);
            }
        }

        self.block_motion_args = args;
        self.final_target_pos = final_target_pos;
        self.block_motion_vector = vector;
        self.num_blocks = num_blocks;
        self.next_block_idx = 0;
        Ok(())
    }

    /// Drains as many sub-blocks into the pipeline as there is room for.
    /// Call repeatedly (e.g. from the same loop that drives the ramp
    /// generator) until `is_busy()` returns false.
    pub fn pump_block_splitter<const N: usize>(&mut self, params: &AxesParams, pipeline: &mut MotionPipeline<N>) -> MotionResult<()> {
        while pipeline.can_accept() {
            if self.num_blocks == 0 {
                return Ok(());
            }

            let mut next_block_dest = self.axes_state.units_from_origin + self.block_motion_vector;
            self.next_block_idx += 1;
            let is_last_block = self.next_block_idx >= self.num_blocks;
            if is_last_block {
                self.num_blocks = 0;
                next_block_dest = self.final_target_pos;
            }

            self.block_motion_args.target = next_block_dest;
            self.block_motion_args.more_moves_coming = self.num_blocks != 0;

            self.add_to_planner(is_last_block, params, pipeline)?;
        }
        Ok(())
    }

    fn add_to_planner<const N: usize>(&mut self, run_recalc: bool, params: &AxesParams, pipeline: &mut MotionPipeline<N>) -> MotionResult<()> {
        let kinematics = self.kinematics.as_ref().ok_or(MotionError::NoKinematics)?;

        let args = self.block_motion_args.clone();

        // Intermediate sub-blocks reuse the start/end IK already resolved in
        // `add_ramped_block`, interpolating in actuator space; only the
        // final sub-block (`num_blocks` back to 0) resolves fresh.
        let actuator_coords = if self.use_actuator_interpolation && self.next_block_idx > 0 && self.num_blocks > 0 {
            let t = self.next_block_idx as f32 / (self.next_block_idx + self.num_blocks) as f32;
            let mut coords = AxesValues::splat(0);
            for i in 0..params.num_axes {
                let delta = self.end_actuator_coords[i] - self.start_actuator_coords[i];
                coords[i] = self.start_actuator_coords[i] + (delta as f32 * t) as AxisSteps;
            }
            coords
        } else {
            let mut target = args.target;
            let mut coords = AxesValues::splat(0);
            let coords_valid = kinematics.pt_to_actuator(&mut target, &mut coords, &self.axes_state, params, args.out_of_bounds);
            if !coords_valid {
                return Err(MotionError::OutOfBounds);
            }
            coords
        };

        self.planner.move_to_ramped(&args, &actuator_coords, &mut self.axes_state, params, pipeline, run_recalc);
        Ok(())
    }
}
