//! Static axis configuration and the mutable current-position state.

use core::ops::{Add, Div, Index, IndexMut, Mul, Sub};

/// Compile-time maximum number of axes this core coordinates.
pub const MAX_AXES: usize = 3;

pub const TTICKS_VALUE: u32 = 1_000_000_000;
pub const NS_IN_A_MS: u32 = 1_000_000;
pub const MIN_STEP_RATE_PER_SEC: f32 = 10.0;
pub const MINIMUM_MOVE_DIST_MM: f32 = 1e-4;
/// Default ramp-tick period, matching the 20us default tick rate.
pub const DEFAULT_TICKS_PER_SEC: f32 = 50_000.0;

/// A fixed-size tuple of `MAX_AXES` values, used uniformly for positions,
/// step counts, unit vectors and per-axis masks.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AxesValues<T> {
    vals: [T; MAX_AXES],
}

impl<T: Copy + Default> AxesValues<T> {
    pub fn new(vals: [T; MAX_AXES]) -> Self {
        Self { vals }
    }

    pub fn splat(v: T) -> Self {
        Self { vals: [v; MAX_AXES] }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.vals
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.vals
    }
}

impl<T: Copy + Default> Index<usize> for AxesValues<T> {
    type Output = T;
    fn index(&self, idx: usize) -> &T {
        &self.vals[idx]
    }
}

impl<T: Copy + Default> IndexMut<usize> for AxesValues<T> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.vals[idx]
    }
}

impl<T> Add for AxesValues<T>
where
    T: Copy + Default + Add<Output = T>,
{
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut out = [T::default(); MAX_AXES];
        for i in 0..MAX_AXES {
            out[i] = self.vals[i] + rhs.vals[i];
        }
        Self { vals: out }
    }
}

impl<T> Sub for AxesValues<T>
where
    T: Copy + Default + Sub<Output = T>,
{
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let mut out = [T::default(); MAX_AXES];
        for i in 0..MAX_AXES {
            out[i] = self.vals[i] - rhs.vals[i];
        }
        Self { vals: out }
    }
}

impl<T> Mul<T> for AxesValues<T>
where
    T: Copy + Default + Mul<Output = T>,
{
    type Output = Self;
    fn mul(self, scalar: T) -> Self {
        let mut out = [T::default(); MAX_AXES];
        for i in 0..MAX_AXES {
            out[i] = self.vals[i] * scalar;
        }
        Self { vals: out }
    }
}

impl<T> Div<T> for AxesValues<T>
where
    T: Copy + Default + Div<Output = T>,
{
    type Output = Self;
    fn div(self, scalar: T) -> Self {
        let mut out = [T::default(); MAX_AXES];
        for i in 0..MAX_AXES {
            out[i] = self.vals[i] / scalar;
        }
        Self { vals: out }
    }
}

impl AxesValues<f32> {
    /// Dot product, summing only the first `n` elements (primary axes).
    pub fn dot(&self, other: &Self) -> f32 {
        let mut acc = 0.0;
        for i in 0..MAX_AXES {
            acc += self.vals[i] * other.vals[i];
        }
        acc
    }

    pub fn magnitude(&self) -> f32 {
        crate::mathf::sqrtf(self.dot(self))
    }
}

/// Position of one axis, in configured units (usually millimetres).
pub type AxisPos = f32;
/// Absolute step count for one axis.
pub type AxisSteps = i32;

/// Static, once-populated-from-configuration limits for a single axis.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisParams {
    pub max_speed_ups: f32,
    pub max_accel_ups2: f32,
    pub max_rpm: f32,
    pub steps_per_rot: f32,
    pub units_per_rot: f32,
    pub min_val_valid: bool,
    pub min_val: f32,
    pub max_val_valid: bool,
    pub max_val: f32,
    pub is_primary_axis: bool,
    pub is_dominant_axis: bool,
}

impl AxisParams {
    pub fn steps_per_unit(&self) -> f32 {
        self.steps_per_rot / self.units_per_rot
    }

    /// The fastest this axis may ever step, in steps/sec, derived from
    /// `max_speed_ups` and `max_rpm` (whichever binds first).
    pub fn max_step_rate_per_sec(&self) -> f32 {
        let from_speed = self.max_speed_ups * self.steps_per_unit();
        let from_rpm = self.max_rpm / 60.0 * self.steps_per_rot;
        if from_rpm > 0.0 {
            crate::mathf::fminf(from_speed, from_rpm)
        } else {
            from_speed
        }
    }

    pub fn in_bounds(&self, val: f32) -> bool {
        if self.min_val_valid && val < self.min_val {
            return false;
        }
        if self.max_val_valid && val > self.max_val {
            return false;
        }
        true
    }

    pub fn clamp(&self, val: f32) -> f32 {
        let mut v = val;
        if self.min_val_valid && v < self.min_val {
            v = self.min_val;
        }
        if self.max_val_valid && v > self.max_val {
            v = self.max_val;
        }
        v
    }
}

impl Default for AxisParams {
    fn default() -> Self {
        Self {
            max_speed_ups: 100.0,
            max_accel_ups2: 100.0,
            max_rpm: 0.0,
            steps_per_rot: 200.0,
            units_per_rot: 1.0,
            min_val_valid: false,
            min_val: 0.0,
            max_val_valid: false,
            max_val: 0.0,
            is_primary_axis: true,
            is_dominant_axis: false,
        }
    }
}

/// The ordered collection of `AxisParams`, plus kinematics-relevant
/// planner metadata derived from them.
#[derive(Debug, Clone)]
pub struct AxesParams {
    pub axes: [AxisParams; MAX_AXES],
    pub num_axes: usize,
    pub master_axis_idx: usize,
    pub max_block_dist_mm: f32,
    pub max_junction_deviation_mm: f32,
    /// Ramp-tick rate (ticks/sec) used to convert step rates into the
    /// fixed-point per-tick-accumulator units the tick path consumes.
    pub ticks_per_sec: f32,
    max_step_rate_cache: [f32; MAX_AXES],
}

impl AxesParams {
    pub fn new(axes: [AxisParams; MAX_AXES], num_axes: usize) -> Self {
        let mut p = Self {
            axes,
            num_axes,
            master_axis_idx: 0,
            max_block_dist_mm: 0.0,
            max_junction_deviation_mm: 0.05,
            ticks_per_sec: DEFAULT_TICKS_PER_SEC,
            max_step_rate_cache: [0.0; MAX_AXES],
        };
        p.recompute();
        p
    }

    /// Recomputes `master_axis_idx` and the cached max step rates. Must be
    /// called whenever any `AxisParams` entry changes.
    pub fn recompute(&mut self) {
        self.master_axis_idx = self
            .axes
            .iter()
            .take(self.num_axes)
            .position(|a| a.is_dominant_axis)
            .or_else(|| self.axes.iter().take(self.num_axes).position(|a| a.is_primary_axis))
            .unwrap_or(0);

        for i in 0..self.num_axes {
            self.max_step_rate_cache[i] = self.axes[i].max_step_rate_per_sec();
        }
    }

    pub fn max_step_rate_per_sec(&self, axis: usize) -> f32 {
        self.max_step_rate_cache[axis]
    }

    pub fn master(&self) -> &AxisParams {
        &self.axes[self.master_axis_idx]
    }
}

/// The mutable current pose of the machine.
#[derive(Debug, Copy, Clone, Default)]
pub struct AxesState {
    pub units_from_origin: AxesValues<AxisPos>,
    pub steps_from_origin: AxesValues<AxisSteps>,
    pub units_from_origin_valid: bool,
}

impl AxesState {
    pub fn set_cur_position_as_origin(&mut self) {
        self.units_from_origin = AxesValues::splat(0.0);
        self.steps_from_origin = AxesValues::splat(0);
        self.units_from_origin_valid = true;
    }
}

/// Per-axis, per-side endstop check state used by homing moves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EndstopCheck {
    #[default]
    NotHit,
    Hit,
    Towards,
    None,
}

impl EndstopCheck {
    pub fn from_char(c: char) -> Self {
        match c {
            '1' => EndstopCheck::Hit,
            'T' | 't' => EndstopCheck::Towards,
            'X' | 'x' => EndstopCheck::None,
            _ => EndstopCheck::NotHit,
        }
    }
}

/// A natural (non-bitfield) reimplementation of the endstop-check bitmap:
/// one `{min, max}` pair of `EndstopCheck` per axis.
#[derive(Debug, Copy, Clone, Default)]
pub struct AxisEndstopChecks {
    checks: [[EndstopCheck; 2]; MAX_AXES],
}

impl AxisEndstopChecks {
    pub const MIN: usize = 0;
    pub const MAX: usize = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, axis: usize, side: usize, check: EndstopCheck) {
        self.checks[axis][side] = check;
    }

    pub fn get(&self, axis: usize, side: usize) -> EndstopCheck {
        self.checks[axis][side]
    }

    pub fn any_active(&self) -> bool {
        self.checks
            .iter()
            .flatten()
            .any(|c| !matches!(c, EndstopCheck::NotHit))
    }
}
