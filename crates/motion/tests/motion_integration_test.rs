//! End-to-end scenarios driving `MotionBlockManager` + `RampGenerator`
//! together, the literal S1-S6 scenarios.

use motion::ramp::{EndStop, RampGenerator, StepperDriver};
use motion::{AxesParams, AxisParams, Kinematics, MotionArgs, MotionBlockManager, MotionMode, MotionPipeline, OutOfBoundsPolicy, ScaraParams, SpeedSpec, MAX_AXES};

#[derive(Default)]
struct MockDriver {
    step_pending: bool,
}

impl StepperDriver for MockDriver {
    fn set_direction(&mut self, _positive: bool) {}
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

struct NoEndStop;
impl EndStop for NoEndStop {
    fn is_at_end_stop(&self, _is_max: bool) -> bool {
        false
    }
    fn is_valid(&self, _is_max: bool) -> bool {
        false
    }
}

fn xyz_params() -> AxesParams {
    let axis = AxisParams {
        max_speed_ups: 100.0,
        max_accel_ups2: 100.0,
        max_rpm: 0.0,
        steps_per_rot: 1000.0,
        units_per_rot: 1.0,
        min_val_valid: false,
        min_val: 0.0,
        max_val_valid: false,
        max_val: 0.0,
        is_primary_axis: true,
        is_dominant_axis: false,
    };
    let mut params = AxesParams::new([axis; MAX_AXES], 2);
    params.max_block_dist_mm = 0.0;
    params
}

/// Drains `block_manager`'s split queue into `pipeline` and ticks `ramp`
/// until the manager has finished splitting and the pipeline is empty.
fn run_to_completion(block_manager: &mut MotionBlockManager, params: &AxesParams, pipeline: &mut MotionPipeline<8>, ramp: &mut RampGenerator<MockDriver, NoEndStop, MAX_AXES>, max_ticks: u32) {
    let mut ticks = 0;
    while (block_manager.is_busy() || !pipeline.is_empty()) && ticks < max_ticks {
        block_manager.pump_block_splitter(params, pipeline).unwrap();
        ramp.tick(pipeline);
        ticks += 1;
    }
    assert!(ticks < max_ticks, "move did not complete within {max_ticks} ticks");
    // The last step's step-end (which commits it into the atomic position
    // counter) lands on the tick after the block leaves the pipeline.
    for _ in 0..5 {
        ramp.tick(pipeline);
    }
}

fn new_manager_and_ramp(kinematics: Kinematics) -> (MotionBlockManager, MotionPipeline<8>, RampGenerator<MockDriver, NoEndStop, MAX_AXES>) {
    let mut block_manager = MotionBlockManager::new(20_000);
    block_manager.setup(20_000, kinematics);
    block_manager.set_cur_position_as_origin();

    let mut ramp: RampGenerator<MockDriver, NoEndStop, MAX_AXES> = RampGenerator::new(20_000, 50_000.0);
    for axis in 0..2 {
        ramp.set_driver(axis, MockDriver::default());
        ramp.set_end_stop(axis, NoEndStop);
    }
    ramp.start();

    (block_manager, MotionPipeline::new(), ramp)
}

fn abs_move(x: f32, y: f32) -> MotionArgs {
    let mut args = MotionArgs::default();
    args.mode = MotionMode::Absolute;
    args.set_axis(0, x);
    args.set_axis(1, y);
    args
}

#[test]
fn s1_simple_absolute_move_reaches_target() {
    let params = xyz_params();
    let (mut bm, mut pipeline, mut ramp) = new_manager_and_ramp(Kinematics::Xyz);

    bm.add_ramped_block::<8>(abs_move(10.0, 0.0), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 100_000);

    assert_eq!(ramp.total_step_position(0), 10_000);
    assert_eq!(ramp.total_step_position(1), 0);
    assert_eq!(bm.axes_state().steps_from_origin[0], 10_000);
    assert_eq!(bm.axes_state().units_from_origin[0], 10.0);
    assert!(pipeline.is_empty());
}

#[test]
fn s2_second_move_plans_from_first_moves_end() {
    let params = xyz_params();
    let (mut bm, mut pipeline, mut ramp) = new_manager_and_ramp(Kinematics::Xyz);

    bm.add_ramped_block::<8>(abs_move(10.0, 0.0), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 100_000);

    bm.add_ramped_block::<8>(abs_move(10.0, 10.0), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 100_000);

    assert_eq!(ramp.total_step_position(0), 10_000);
    assert_eq!(ramp.total_step_position(1), 10_000);
}

#[test]
fn s3_straight_consecutive_moves_keep_full_junction_speed() {
    let params = xyz_params();
    let (mut bm, mut pipeline, _ramp) = new_manager_and_ramp(Kinematics::Xyz);

    let mut first = abs_move(10.0, 0.0);
    first.more_moves_coming = true;
    bm.add_ramped_block::<8>(first, 1, &params).unwrap();
    bm.pump_block_splitter(&params, &mut pipeline).unwrap();

    bm.add_ramped_block::<8>(abs_move(20.0, 0.0), 1, &params).unwrap();
    bm.pump_block_splitter(&params, &mut pipeline).unwrap();

    assert_eq!(pipeline.count(), 2);
    let head = pipeline.peek_nth_from_get(0).unwrap();
    assert!(head.can_execute);
    // Continuing straight through the junction: no deceleration planned.
    assert!(head.exit_speed_mmps > 0.0);
    let tail = pipeline.peek_nth_from_get(1).unwrap();
    assert!(tail.entry_speed_mmps > 0.0);
}

#[test]
fn s4_non_ramped_move_steps_at_constant_rate() {
    let params = xyz_params();
    let (mut bm, mut pipeline, mut ramp) = new_manager_and_ramp(Kinematics::Xyz);

    let mut args = MotionArgs::default();
    args.mode = MotionMode::PosAbsStepsNoRamp;
    args.set_axis(0, 1000.0);
    args.speed = SpeedSpec::StepsPerSec(200.0);

    bm.add_non_ramped_block(args, &params, &mut pipeline).unwrap();
    assert_eq!(pipeline.count(), 1);
    assert!(!pipeline.peek_nth_from_get(0).unwrap().is_ramped);

    let mut ticks = 0;
    while !pipeline.is_empty() && ticks < 1_000_000 {
        ramp.tick(&mut pipeline);
        ticks += 1;
    }
    assert!(ticks < 1_000_000);
    for _ in 0..5 {
        ramp.tick(&mut pipeline);
    }
    assert_eq!(ramp.total_step_position(0), 1000);
}

#[test]
fn s5_scara_reaches_symmetric_target() {
    let scara = ScaraParams {
        arm1_len_mm: 100.0,
        arm2_len_mm: 100.0,
        max_radius_mm: 200.0,
        theta2_offset_deg: 180.0,
    };
    let params = xyz_params();
    let (mut bm, mut pipeline, mut ramp) = new_manager_and_ramp(Kinematics::scara(scara));

    // Establish the machine at the fully-extended pose (200, 0) first.
    bm.add_ramped_block::<8>(abs_move(200.0, 0.0), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 200_000);

    bm.add_ramped_block::<8>(abs_move(141.42, 141.42), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 200_000);

    let pos = bm.axes_state().units_from_origin;
    assert!((pos[0] - 141.42).abs() < 1.0);
    assert!((pos[1] - 141.42).abs() < 1.0);
}

#[test]
fn scara_split_move_reaches_target_via_interpolated_sub_blocks() {
    let scara = ScaraParams {
        arm1_len_mm: 100.0,
        arm2_len_mm: 100.0,
        max_radius_mm: 200.0,
        theta2_offset_deg: 180.0,
    };
    let params = xyz_params();
    let (mut bm, mut pipeline, mut ramp) = new_manager_and_ramp(Kinematics::scara(scara));

    bm.add_ramped_block::<8>(abs_move(200.0, 0.0), 1, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 200_000);

    // The first of this 2-way split is placed by actuator-space
    // interpolation rather than a fresh IK solve; only the second (final)
    // sub-block re-resolves exactly.
    bm.add_ramped_block::<8>(abs_move(141.42, 141.42), 2, &params).unwrap();
    run_to_completion(&mut bm, &params, &mut pipeline, &mut ramp, 200_000);

    let pos = bm.axes_state().units_from_origin;
    assert!((pos[0] - 141.42).abs() < 1.0);
    assert!((pos[1] - 141.42).abs() < 1.0);
}

#[test]
fn s6_out_of_bounds_discard_is_rejected_and_pipeline_unchanged() {
    let mut params = xyz_params();
    params.axes[0].max_val_valid = true;
    params.axes[0].max_val = 100.0;
    params.recompute();

    let (mut bm, mut pipeline, _ramp) = new_manager_and_ramp(Kinematics::Xyz);

    let mut args = abs_move(300.0, 0.0);
    args.out_of_bounds = OutOfBoundsPolicy::Discard;

    // A single-block move has no interpolation anchors to pre-validate; the
    // IK failure only surfaces once the splitter actually resolves it.
    bm.add_ramped_block::<8>(args, 1, &params).unwrap();
    let result = bm.pump_block_splitter(&params, &mut pipeline);
    assert!(result.is_err());
    assert!(pipeline.is_empty());
}
