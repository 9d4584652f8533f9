//! `MotionArgs` — the inbound move command and its JSON wire format.

use crate::axes::{AxesValues, AxisEndstopChecks, AxisPos, EndstopCheck, MAX_AXES};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MotionMode {
    Absolute,
    Relative,
    PosAbsSteps,
    PosRelSteps,
    PosAbsStepsNoRamp,
    PosRelStepsNoRamp,
    Velocity,
    VelocitySteps,
    Proportionate,
    ProportionateRelative,
}

impl MotionMode {
    pub fn is_relative(self) -> bool {
        matches!(self, MotionMode::Relative | MotionMode::PosRelSteps | MotionMode::PosRelStepsNoRamp)
    }

    pub fn is_steps(self) -> bool {
        matches!(
            self,
            MotionMode::PosAbsSteps | MotionMode::PosRelSteps | MotionMode::PosAbsStepsNoRamp | MotionMode::PosRelStepsNoRamp | MotionMode::VelocitySteps
        )
    }

    pub fn is_ramped(self) -> bool {
        !matches!(self, MotionMode::PosAbsStepsNoRamp | MotionMode::PosRelStepsNoRamp)
    }

    pub fn is_velocity(self) -> bool {
        matches!(self, MotionMode::Velocity | MotionMode::VelocitySteps)
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "abs" => MotionMode::Absolute,
            "rel" => MotionMode::Relative,
            "pos-abs-steps" => MotionMode::PosAbsSteps,
            "pos-rel-steps" => MotionMode::PosRelSteps,
            "pos-abs-steps-noramp" => MotionMode::PosAbsStepsNoRamp,
            "pos-rel-steps-noramp" => MotionMode::PosRelStepsNoRamp,
            "vel" => MotionMode::Velocity,
            "vel-steps" => MotionMode::VelocitySteps,
            "prop" => MotionMode::Proportionate,
            "prop-rel" => MotionMode::ProportionateRelative,
            _ => return None,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutOfBoundsPolicy {
    Allow,
    Clamp,
    Discard,
}

impl OutOfBoundsPolicy {
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "allow" | "ok" => OutOfBoundsPolicy::Allow,
            "clamp" | "constrain" => OutOfBoundsPolicy::Clamp,
            "discard" | "reject" => OutOfBoundsPolicy::Discard,
            _ => return None,
        })
    }
}

/// The `speed` field: a bare percentage, or a suffixed unit string.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SpeedSpec {
    PercentOfMax(f32),
    UnitsPerSec(f32),
    UnitsPerMin(f32),
    MmPerSec(f32),
    MmPerMin(f32),
    StepsPerSec(f32),
}

impl SpeedSpec {
    /// Parses the numeric-or-suffixed-string form from §6.1.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let suffixes: &[(&str, fn(f32) -> SpeedSpec)] = &[
            ("pc", SpeedSpec::PercentOfMax),
            ("ups", SpeedSpec::UnitsPerSec),
            ("upm", SpeedSpec::UnitsPerMin),
            ("mmps", SpeedSpec::MmPerSec),
            ("mmpm", SpeedSpec::MmPerMin),
            ("sps", SpeedSpec::StepsPerSec),
        ];
        for (suffix, ctor) in suffixes {
            if let Some(num) = s.strip_suffix(suffix) {
                return num.trim().parse::<f32>().ok().map(*ctor);
            }
        }
        s.parse::<f32>().ok().map(SpeedSpec::PercentOfMax)
    }

    /// Resolves to units/sec given the master axis's max speed (for
    /// percentage) and steps-per-unit (for the steps/sec and mm forms,
    /// which are treated as unit-equivalent since this core's "mm" is
    /// simply its configured linear unit).
    pub fn resolve_units_per_sec(self, master_max_ups: f32, master_steps_per_unit: f32) -> f32 {
        match self {
            SpeedSpec::PercentOfMax(pc) => master_max_ups * (pc / 100.0),
            SpeedSpec::UnitsPerSec(v) => v,
            SpeedSpec::UnitsPerMin(v) => v / 60.0,
            SpeedSpec::MmPerSec(v) => v,
            SpeedSpec::MmPerMin(v) => v / 60.0,
            SpeedSpec::StepsPerSec(v) => v / master_steps_per_unit,
        }
    }

    /// Resolves to a step rate (steps/sec) for non-ramped (stepwise) moves,
    /// where percentages scale the lowest per-axis max step rate among the
    /// axes actually moving rather than a units/sec ceiling.
    pub fn resolve_step_rate(self, baseline_step_rate: f32, steps_per_unit: f32) -> f32 {
        match self {
            SpeedSpec::PercentOfMax(pc) => baseline_step_rate * (pc / 100.0),
            SpeedSpec::UnitsPerSec(v) => v * steps_per_unit,
            SpeedSpec::UnitsPerMin(v) => v / 60.0 * steps_per_unit,
            SpeedSpec::MmPerSec(v) => v * steps_per_unit,
            SpeedSpec::MmPerMin(v) => v / 60.0 * steps_per_unit,
            SpeedSpec::StepsPerSec(v) => v,
        }
    }
}

impl Default for SpeedSpec {
    fn default() -> Self {
        SpeedSpec::PercentOfMax(100.0)
    }
}

/// The inbound move command (§6.1).
#[derive(Debug, Clone)]
pub struct MotionArgs {
    pub mode: MotionMode,
    pub target: AxesValues<AxisPos>,
    pub axes_specified: [bool; MAX_AXES],
    pub speed: SpeedSpec,
    pub dont_split: bool,
    pub move_rapid: bool,
    pub clockwise: bool,
    pub more_moves_coming: bool,
    pub out_of_bounds: OutOfBoundsPolicy,
    pub motion_tracking_index: Option<u32>,
    pub endstops: AxisEndstopChecks,
}

impl Default for MotionArgs {
    fn default() -> Self {
        Self {
            mode: MotionMode::Absolute,
            target: AxesValues::splat(0.0),
            axes_specified: [false; MAX_AXES],
            speed: SpeedSpec::default(),
            dont_split: false,
            move_rapid: false,
            clockwise: false,
            more_moves_coming: false,
            out_of_bounds: OutOfBoundsPolicy::Allow,
            motion_tracking_index: None,
            endstops: AxisEndstopChecks::new(),
        }
    }
}

impl MotionArgs {
    pub fn set_axis(&mut self, axis: usize, val: AxisPos) {
        self.target[axis] = val;
        self.axes_specified[axis] = true;
    }

    pub fn set_endstop_pair(&mut self, axis: usize, min: char, max: char) {
        self.endstops.set(axis, AxisEndstopChecks::MIN, EndstopCheck::from_char(min));
        self.endstops.set(axis, AxisEndstopChecks::MAX, EndstopCheck::from_char(max));
    }
}

#[cfg(feature = "serde-support")]
mod wire {
    use super::*;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    struct RawMotionArgs {
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        speed: Option<RawSpeed>,
        #[serde(default)]
        nosplit: bool,
        #[serde(default)]
        cw: bool,
        #[serde(default)]
        rapid: bool,
        #[serde(default)]
        more: bool,
        #[serde(rename = "outOfBounds", default)]
        out_of_bounds: Option<String>,
        #[serde(default)]
        idx: Option<u32>,
        #[serde(default)]
        endstops: Option<Vec<[String; 2]>>,
        #[serde(default)]
        pos: Option<Vec<Option<f32>>>,
        #[serde(default)]
        vel: Option<Vec<Option<f32>>>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSpeed {
        Number(f32),
        Text(String),
    }

    impl<'de> Deserialize<'de> for MotionArgs {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = RawMotionArgs::deserialize(deserializer)?;
            let mut args = MotionArgs::default();

            if let Some(mode_str) = raw.mode.as_deref() {
                args.mode = MotionMode::from_wire(mode_str).ok_or_else(|| serde::de::Error::custom(format!("unknown mode {mode_str}")))?;
            }

            let coords = raw.pos.or(raw.vel);
            if let Some(coords) = coords {
                for (i, v) in coords.into_iter().enumerate().take(MAX_AXES) {
                    if let Some(v) = v {
                        args.set_axis(i, v);
                    }
                }
            }

            if let Some(speed) = raw.speed {
                args.speed = match speed {
                    RawSpeed::Number(n) => SpeedSpec::PercentOfMax(n),
                    RawSpeed::Text(s) => SpeedSpec::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("bad speed {s}")))?,
                };
            }

            args.dont_split = raw.nosplit;
            args.clockwise = raw.cw;
            args.move_rapid = raw.rapid;
            args.more_moves_coming = raw.more;
            args.motion_tracking_index = raw.idx;

            if let Some(oob) = raw.out_of_bounds.as_deref() {
                args.out_of_bounds = OutOfBoundsPolicy::from_wire(oob).ok_or_else(|| serde::de::Error::custom(format!("unknown outOfBounds {oob}")))?;
            }

            if let Some(pairs) = raw.endstops {
                for (i, pair) in pairs.into_iter().enumerate().take(MAX_AXES) {
                    let min = pair[0].chars().next().unwrap_or('0');
                    let max = pair[1].chars().next().unwrap_or('0');
                    args.set_endstop_pair(i, min, max);
                }
            }

            Ok(args)
        }
    }
}
