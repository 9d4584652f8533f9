//! Command-line harness for the motion core.
//!
//! Reads a machine configuration and a sequence of move commands (the same
//! JSON wire format the core's `MotionArgs` deserializer accepts), drives
//! `MotionBlockManager` + `RampGenerator` against mock drivers and end-stops
//! in a tight loop, and logs the resulting step trace and final position.
//! This is a demonstration harness for the core, not a server or G-code
//! dispatcher.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use motion::{AxesParams, AxesValues, AxisParams, Kinematics, MotionArgs, MotionBlockManager, MotionPipeline, ScaraParams, MAX_AXES};
use tracing::info;

mod mock_hw;

use mock_hw::{MockDriver, MockEndStop};

/// Exercises the motion core against a mock clock and driver set.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a file of newline-delimited move commands and print the
    /// resulting step trace and final position.
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Path to a newline-delimited-JSON file of move commands (§6.1 wire format).
    commands_file: PathBuf,

    /// Path to a machine configuration file (JSON). Falls back to a
    /// 2-axis XYZ-style default machine if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ramp-tick period, in nanoseconds.
    #[arg(long, default_value_t = 20_000)]
    step_gen_period_ns: u32,

    /// Safety bound on ticks run per command, so a misconfigured move
    /// can't spin the harness forever.
    #[arg(long, default_value_t = 2_000_000)]
    max_ticks_per_command: u32,
}

/// The on-disk machine configuration: per-axis limits plus which
/// kinematics geometry to resolve moves through.
#[derive(Debug, serde::Deserialize)]
struct MachineConfig {
    axes: Vec<AxisParams>,
    #[serde(default)]
    max_block_dist_mm: f32,
    #[serde(default)]
    max_junction_deviation_mm: f32,
    #[serde(default)]
    kinematics: KinematicsConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
enum KinematicsConfig {
    #[default]
    Xyz,
    SingleArmScara(ScaraParams),
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            axes: vec![AxisParams::default(), AxisParams::default()],
            max_block_dist_mm: 0.0,
            max_junction_deviation_mm: 0.05,
            kinematics: KinematicsConfig::Xyz,
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<MachineConfig> {
    let Some(path) = path else {
        info!("no --config given, using the default 2-axis machine");
        return Ok(MachineConfig::default());
    };
    let text = fs::read_to_string(&path).with_context(|| format!("failed to read config file {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config file {:?}", path))
}

fn build_axes_params(config: &MachineConfig) -> AxesParams {
    let mut axes = [AxisParams::default(); MAX_AXES];
    let num_axes = config.axes.len().min(MAX_AXES);
    axes[..num_axes].copy_from_slice(&config.axes[..num_axes]);

    let mut params = AxesParams::new(axes, num_axes);
    params.max_block_dist_mm = config.max_block_dist_mm;
    params.max_junction_deviation_mm = config.max_junction_deviation_mm;
    params.recompute();
    params
}

fn num_blocks_for(args: &MotionArgs, params: &AxesParams, start: AxesValues<f32>) -> u32 {
    if params.max_block_dist_mm <= 0.0 {
        return 1;
    }
    let delta = args.target - start;
    let dist = delta.magnitude();
    if dist <= 0.0 {
        return 1;
    }
    ((dist / params.max_block_dist_mm).ceil() as u32).max(1)
}

fn run_replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(args.config)?;
    let params = build_axes_params(&config);

    let kinematics = match config.kinematics {
        KinematicsConfig::Xyz => Kinematics::Xyz,
        KinematicsConfig::SingleArmScara(sp) => Kinematics::scara(sp),
    };

    let mut block_manager = MotionBlockManager::new(args.step_gen_period_ns);
    block_manager.setup(args.step_gen_period_ns, kinematics);
    block_manager.set_cur_position_as_origin();

    let mut pipeline: MotionPipeline<8> = MotionPipeline::new();
    let mut ramp = mock_hw::new_ramp(args.step_gen_period_ns, params.ticks_per_sec);
    for axis in 0..MAX_AXES {
        ramp.set_driver(axis, MockDriver::default());
        ramp.set_end_stop(axis, MockEndStop);
    }
    ramp.start();

    let file = fs::File::open(&args.commands_file).with_context(|| format!("failed to open commands file {:?}", args.commands_file))?;
    let reader = BufReader::new(file);

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let motion_args: MotionArgs = serde_json::from_str(line).with_context(|| format!("failed to parse move command on line {}", line_num + 1))?;
        info!(line = line_num + 1, mode = ?motion_args.mode, "dispatching move command");

        let start = block_manager.axes_state().units_from_origin;
        if motion_args.mode.is_ramped() {
            let num_blocks = num_blocks_for(&motion_args, &params, start);
            block_manager.add_ramped_block::<8>(motion_args, num_blocks, &params)?;
        } else {
            block_manager.add_non_ramped_block(motion_args, &params, &mut pipeline)?;
        }

        let mut ticks = 0;
        while (block_manager.is_busy() || !pipeline.is_empty()) && ticks < args.max_ticks_per_command {
            block_manager.pump_block_splitter(&params, &mut pipeline)?;
            ramp.tick(&mut pipeline);
            ticks += 1;
        }
        if ticks >= args.max_ticks_per_command {
            anyhow::bail!("move on line {} did not complete within {} ticks", line_num + 1, args.max_ticks_per_command);
        }

        let pos = block_manager.axes_state();
        info!(
            ticks,
            units_from_origin = ?pos.units_from_origin.as_slice(),
            steps_from_origin = ?pos.steps_from_origin.as_slice(),
            "move complete"
        );
    }

    info!("replay finished");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => run_replay(args),
    }
}
