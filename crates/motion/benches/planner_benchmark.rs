use criterion::{black_box, criterion_group, criterion_main, Criterion};

use motion::ramp::{EndStop, RampGenerator, StepperDriver};
use motion::{AxesParams, AxesState, AxesValues, AxisParams, AxisSteps, MotionArgs, MotionPipeline, MAX_AXES};

#[derive(Default)]
struct NullDriver {
    step_pending: bool,
}

impl StepperDriver for NullDriver {
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

struct NullEndStop;
impl EndStop for NullEndStop {
    fn is_at_end_stop(&self, _is_max: bool) -> bool {
        false
    }
    fn is_valid(&self, _is_max: bool) -> bool {
        false
    }
}

fn bench_params() -> AxesParams {
    let axis = AxisParams {
        max_speed_ups: 150.0,
        max_accel_ups2: 1500.0,
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

/// Look-ahead / planning throughput: a straight run of small back-to-back
/// moves through `MotionPlanner`, which is what pays for the backward
/// recalculation pass on every new block.
fn bench_planner_recalculation(c: &mut Criterion) {
    let params = bench_params();

    c.bench_function("plan_100_chained_moves", |b| {
        b.iter(|| {
            let mut planner = motion::MotionPlanner::new(20_000);
            let mut state = AxesState::default();
            state.set_cur_position_as_origin();
            let mut pipeline: MotionPipeline<128> = MotionPipeline::new();

            for i in 1..=100i32 {
                let mut args = MotionArgs::default();
                args.set_axis(0, (i * 10) as f32);
                let dest = AxesValues::<AxisSteps>::new([i * 2000, 0, 0]);
                planner.move_to_ramped(black_box(&args), &dest, &mut state, &params, &mut pipeline, true);
            }
        })
    });
}

/// Ramp-tick throughput: the steady-state per-tick cost of
/// `RampGenerator::tick`, which must stay small and bounded since it
/// represents ISR execution time.
fn bench_ramp_tick(c: &mut Criterion) {
    let mut ramp: RampGenerator<NullDriver, NullEndStop, MAX_AXES> = RampGenerator::new(20_000, 50_000.0);
    for axis in 0..MAX_AXES {
        ramp.set_driver(axis, NullDriver::default());
        ramp.set_end_stop(axis, NullEndStop);
    }
    ramp.start();

    let mut pipeline: MotionPipeline<8> = MotionPipeline::new();

    c.bench_function("ramp_tick_steady_state", |b| {
        b.iter(|| {
            if pipeline.is_empty() {
                let mut block = motion::MotionBlock::default();
                block.steps_total_maybe_neg = AxesValues::new([1_000_000, 0, 0]);
                block.axis_idx_with_max_steps = 0;
                block.initial_step_rate_per_tticks = 100_000_000;
                block.max_step_rate_per_tticks = 100_000_000;
                block.final_step_rate_per_tticks = 100_000_000;
                block.acc_steps_per_tticks_per_ms = 0;
                block.steps_before_decel = u32::MAX;
                block.can_execute = true;
                pipeline.add(block);
            }
            ramp.tick(black_box(&mut pipeline));
        })
    });
}

criterion_group!(benches, bench_planner_recalculation, bench_ramp_tick);
criterion_main!(benches);
