//! Kinematics: Cartesian ↔ actuator-step conversion.
//!
//! Polymorphic over two geometries, `Xyz` and `SingleArmScara`, following
//! the same shape as a `dyn`-free tagged enum rather than a vtable — the
//! original uses a base class with virtual methods, but a closed two-member
//! set is cheaper as a plain match here.

use crate::args::OutOfBoundsPolicy;
use crate::axes::{AxesParams, AxesState, AxesValues, AxisPos, AxisSteps, MAX_AXES};
use crate::mathf::{acosf, atan2f, cosf, fabsf, roundf, sinf, sqrtf, PI};

/// A Cartesian point in the primary axes (X, Y, Z — or X, Y for SCARA).
pub type CartesianPoint = AxesValues<AxisPos>;

const CLOSE_TO_ORIGIN_TOLERANCE_MM: f32 = 1.0;
const MIN_ARM_LENGTH_MM: f32 = 0.1;

/// Single-arm SCARA geometry parameters.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaraParams {
    pub arm1_len_mm: f32,
    pub arm2_len_mm: f32,
    pub max_radius_mm: f32,
    pub theta2_offset_deg: f32,
}

impl Default for ScaraParams {
    fn default() -> Self {
        Self {
            arm1_len_mm: 100.0,
            arm2_len_mm: 100.0,
            max_radius_mm: 200.0,
            theta2_offset_deg: 180.0,
        }
    }
}

impl ScaraParams {
    pub fn validated(mut self) -> Self {
        if self.arm1_len_mm < MIN_ARM_LENGTH_MM {
            self.arm1_len_mm = MIN_ARM_LENGTH_MM;
        }
        if self.arm2_len_mm < MIN_ARM_LENGTH_MM {
            self.arm2_len_mm = MIN_ARM_LENGTH_MM;
        }
        let reach = self.arm1_len_mm + self.arm2_len_mm;
        if self.max_radius_mm > reach || self.max_radius_mm <= 0.0 {
            self.max_radius_mm = reach;
        }
        self
    }
}

/// The two geometries this core supports.
#[derive(Debug, Clone)]
pub enum Kinematics {
    Xyz,
    SingleArmScara {
        params: ScaraParams,
        prefer_alternate: bool,
    },
}

impl Kinematics {
    pub fn scara(params: ScaraParams) -> Self {
        Kinematics::SingleArmScara {
            params: params.validated(),
            prefer_alternate: false,
        }
    }

    pub fn supports_alternate_solutions(&self) -> bool {
        matches!(self, Kinematics::SingleArmScara { .. })
    }

    pub fn set_prefer_alternate_solution(&mut self, flag: bool) {
        if let Kinematics::SingleArmScara { prefer_alternate, .. } = self {
            *prefer_alternate = flag;
        }
    }

    /// Converts a target Cartesian point into absolute actuator step
    /// counts. Returns `false` (leaving `out_steps` untouched) if the
    /// target cannot be reached and the out-of-bounds policy is
    /// `Discard`. `Clamp` modifies `target_pt` in place.
    pub fn pt_to_actuator(
        &self,
        target_pt: &mut CartesianPoint,
        out_steps: &mut AxesValues<AxisSteps>,
        cur_state: &AxesState,
        params: &AxesParams,
        oob_policy: OutOfBoundsPolicy,
    ) -> bool {
        match self {
            Kinematics::Xyz => xyz_pt_to_actuator(target_pt, out_steps, params, oob_policy),
            Kinematics::SingleArmScara { params: sp, prefer_alternate } => {
                scara_pt_to_actuator(*sp, *prefer_alternate, target_pt, out_steps, cur_state, params, oob_policy)
            }
        }
    }

    pub fn actuator_to_pt(
        &self,
        steps: &AxesValues<AxisSteps>,
        out_pt: &mut CartesianPoint,
        params: &AxesParams,
    ) -> bool {
        match self {
            Kinematics::Xyz => xyz_actuator_to_pt(steps, out_pt, params),
            Kinematics::SingleArmScara { params: sp, .. } => scara_actuator_to_pt(*sp, steps, out_pt, params),
        }
    }

    /// Fills unspecified axes from current state (absolute) or zero
    /// (relative), converts relative targets to absolute, and returns the
    /// primary-axes Euclidean distance of the move.
    pub fn pre_process_coords(
        &self,
        target: &mut CartesianPoint,
        axes_specified: &[bool; MAX_AXES],
        relative: bool,
        state: &AxesState,
        axes_params: &AxesParams,
    ) -> f32 {
        let mut dist_sq = 0.0;
        for i in 0..axes_params.num_axes {
            let requested = if axes_specified[i] {
                target[i]
            } else if relative {
                0.0
            } else {
                state.units_from_origin[i]
            };
            let absolute = if relative { state.units_from_origin[i] + requested } else { requested };
            if axes_params.axes[i].is_primary_axis {
                let delta = absolute - state.units_from_origin[i];
                dist_sq += delta * delta;
            }
            target[i] = absolute;
        }
        sqrtf(dist_sq)
    }
}

fn xyz_pt_to_actuator(
    target_pt: &mut CartesianPoint,
    out_steps: &mut AxesValues<AxisSteps>,
    params: &AxesParams,
    oob_policy: OutOfBoundsPolicy,
) -> bool {
    for i in 0..params.num_axes {
        let ap = &params.axes[i];
        if !ap.in_bounds(target_pt[i]) {
            match oob_policy {
                OutOfBoundsPolicy::Allow => {}
                OutOfBoundsPolicy::Clamp => {
                    target_pt[i] = ap.clamp(target_pt[i]);
                }
                OutOfBoundsPolicy::Discard => return false,
            }
        }
    }
    for i in 0..params.num_axes {
        out_steps[i] = roundf(target_pt[i] * params.axes[i].steps_per_unit()) as i32;
    }
    true
}

fn xyz_actuator_to_pt(steps: &AxesValues<AxisSteps>, out_pt: &mut CartesianPoint, params: &AxesParams) -> bool {
    for i in 0..params.num_axes {
        out_pt[i] = steps[i] as f32 / params.axes[i].steps_per_unit();
    }
    true
}

fn wrap_deg(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a < -180.0 {
        a += 360.0;
    }
    a
}

fn scara_actuator_to_pt(sp: ScaraParams, steps: &AxesValues<AxisSteps>, out_pt: &mut CartesianPoint, params: &AxesParams) -> bool {
    // `theta2` here is motor2's command angle plus `theta2_offset_deg`, which
    // (per `scara_solutions`) already represents the *absolute* angle of arm2
    // in the global frame, not an angle relative to arm1 — motor2 is driven
    // off a differential that keeps arm2's absolute orientation fixed as
    // motor1 alone turns.
    let theta1 = steps[0] as f32 * 360.0 / params.axes[0].steps_per_rot;
    let theta2 = steps[1] as f32 * 360.0 / params.axes[1].steps_per_rot + sp.theta2_offset_deg;
    let t1 = theta1 * PI / 180.0;
    let t12 = theta2 * PI / 180.0;
    out_pt[0] = sp.arm1_len_mm * cosf(t1) + sp.arm2_len_mm * cosf(t12);
    out_pt[1] = sp.arm1_len_mm * sinf(t1) + sp.arm2_len_mm * sinf(t12);
    true
}

/// `r`, `a2`, `a3`, `phi` per the law-of-cosines solution; `None` if `r` is
/// outside the reachable annulus.
fn cartesian_to_polar(sp: ScaraParams, x: f32, y: f32) -> Option<(f32, f32, f32, f32)> {
    let r = sqrtf(x * x + y * y);
    let lo = fabsf(sp.arm1_len_mm - sp.arm2_len_mm);
    let hi = if sp.arm1_len_mm + sp.arm2_len_mm < sp.max_radius_mm {
        sp.arm1_len_mm + sp.arm2_len_mm
    } else {
        sp.max_radius_mm
    };
    if r < lo || r > hi {
        return None;
    }
    if r < CLOSE_TO_ORIGIN_TOLERANCE_MM {
        return Some((r, 0.0, 0.0, 0.0));
    }
    let l1 = sp.arm1_len_mm;
    let l2 = sp.arm2_len_mm;
    let a2 = acosf(((l1 * l1 + r * r - l2 * l2) / (2.0 * l1 * r)).clamp(-1.0, 1.0));
    let a3 = acosf(((l1 * l1 + l2 * l2 - r * r) / (2.0 * l1 * l2)).clamp(-1.0, 1.0));
    let phi = atan2f(y, x);
    Some((r, a2, a3, phi))
}

fn scara_solutions(sp: ScaraParams, x: f32, y: f32) -> Option<[(f32, f32); 2]> {
    let (r, a2, a3, phi) = cartesian_to_polar(sp, x, y)?;
    if r < CLOSE_TO_ORIGIN_TOLERANCE_MM {
        return Some([(0.0, 0.0), (0.0, 0.0)]);
    }
    let to_deg = 180.0 / PI;
    let sol1 = ((phi - a2) * to_deg, (PI + phi - a2 - a3) * to_deg - sp.theta2_offset_deg);
    let sol2 = ((phi + a2) * to_deg, (-PI + phi + a2 + a3) * to_deg - sp.theta2_offset_deg);
    Some([sol1, sol2])
}

fn steps_for_angles(sol: (f32, f32), params: &AxesParams) -> AxesValues<AxisSteps> {
    let mut out = AxesValues::splat(0);
    out[0] = roundf(sol.0 * params.axes[0].steps_per_rot / 360.0) as i32;
    out[1] = roundf(sol.1 * params.axes[1].steps_per_rot / 360.0) as i32;
    out
}

/// `max(|Δθ1|, |Δθ2|)` in steps between a candidate solution and the
/// current angle, wrapped to `[-180, 180]`.
fn motion_cost(sol: (f32, f32), cur_theta1_deg: f32, cur_theta2_deg: f32, params: &AxesParams) -> f32 {
    let d1 = wrap_deg(sol.0 - cur_theta1_deg) * params.axes[0].steps_per_rot / 360.0;
    let d2 = wrap_deg(sol.1 - cur_theta2_deg) * params.axes[1].steps_per_rot / 360.0;
    fabsf(d1).max(fabsf(d2))
}

fn scara_pt_to_actuator(
    sp: ScaraParams,
    prefer_alternate: bool,
    target_pt: &mut CartesianPoint,
    out_steps: &mut AxesValues<AxisSteps>,
    cur_state: &AxesState,
    params: &AxesParams,
    oob_policy: OutOfBoundsPolicy,
) -> bool {
    let solutions = match scara_solutions(sp, target_pt[0], target_pt[1]) {
        Some(s) => s,
        None => {
            return match oob_policy {
                OutOfBoundsPolicy::Discard => false,
                OutOfBoundsPolicy::Allow | OutOfBoundsPolicy::Clamp => {
                    let r = sqrtf(target_pt[0] * target_pt[0] + target_pt[1] * target_pt[1]);
                    if r < 1e-6 {
                        return false;
                    }
                    let lo = fabsf(sp.arm1_len_mm - sp.arm2_len_mm);
                    let hi = if sp.arm1_len_mm + sp.arm2_len_mm < sp.max_radius_mm {
                        sp.arm1_len_mm + sp.arm2_len_mm
                    } else {
                        sp.max_radius_mm
                    };
                    let clamped_r = r.clamp(lo + 1e-3, hi - 1e-3);
                    let scale = clamped_r / r;
                    target_pt[0] *= scale;
                    target_pt[1] *= scale;
                    let solutions = match scara_solutions(sp, target_pt[0], target_pt[1]) {
                        Some(s) => s,
                        None => return false,
                    };
                    *out_steps = steps_for_angles(solutions[0], params);
                    true
                }
            };
        }
    };

    let cur_theta1 = cur_state.steps_from_origin[0] as f32 * 360.0 / params.axes[0].steps_per_rot;
    let cur_theta2 = cur_state.steps_from_origin[1] as f32 * 360.0 / params.axes[1].steps_per_rot;

    let chosen = if prefer_alternate {
        solutions[1]
    } else {
        let cost0 = motion_cost(solutions[0], cur_theta1, cur_theta2, params);
        let cost1 = motion_cost(solutions[1], cur_theta1, cur_theta2, params);
        if cost0 <= cost1 {
            solutions[0]
        } else {
            solutions[1]
        }
    };

    *out_steps = steps_for_angles(chosen, params);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::AxisParams;

    fn xyz_params() -> AxesParams {
        let ap = AxisParams {
            max_speed_ups: 100.0,
            max_accel_ups2: 100.0,
            steps_per_rot: 800.0,
            units_per_rot: 1.0,
            max_val_valid: true,
            max_val: 500.0,
            min_val_valid: true,
            min_val: -500.0,
            ..Default::default()
        };
        AxesParams::new([ap, ap, ap], 3)
    }

    #[test]
    fn xyz_round_trip() {
        let k = Kinematics::Xyz;
        let params = xyz_params();
        let state = AxesState::default();
        let mut target = CartesianPoint::new([12.5, -30.25, 4.0]);
        let mut steps = AxesValues::splat(0);
        assert!(k.pt_to_actuator(&mut target, &mut steps, &state, &params, OutOfBoundsPolicy::Allow));

        let mut back = CartesianPoint::default();
        assert!(k.actuator_to_pt(&steps, &mut back, &params));
        for i in 0..3 {
            let tol = 1.0 / (2.0 * params.axes[i].steps_per_unit());
            assert!(fabsf(back[i] - target[i]) <= tol, "axis {i}: {} vs {}", back[i], target[i]);
        }
    }

    #[test]
    fn xyz_out_of_bounds_discard() {
        let k = Kinematics::Xyz;
        let params = xyz_params();
        let state = AxesState::default();
        let mut target = CartesianPoint::new([1000.0, 0.0, 0.0]);
        let mut steps = AxesValues::splat(0);
        assert!(!k.pt_to_actuator(&mut target, &mut steps, &state, &params, OutOfBoundsPolicy::Discard));
    }

    #[test]
    fn xyz_out_of_bounds_clamp() {
        let k = Kinematics::Xyz;
        let params = xyz_params();
        let state = AxesState::default();
        let mut target = CartesianPoint::new([1000.0, 0.0, 0.0]);
        let mut steps = AxesValues::splat(0);
        assert!(k.pt_to_actuator(&mut target, &mut steps, &state, &params, OutOfBoundsPolicy::Clamp));
        assert_eq!(target[0], 500.0);
    }

    fn scara_params() -> AxesParams {
        let ap = AxisParams {
            max_speed_ups: 100.0,
            max_accel_ups2: 100.0,
            steps_per_rot: 3600.0,
            units_per_rot: 360.0,
            min_val_valid: false,
            max_val_valid: false,
            ..Default::default()
        };
        AxesParams::new([ap, ap, AxisParams::default()], 2)
    }

    #[test]
    fn scara_round_trip() {
        let sp = ScaraParams { arm1_len_mm: 100.0, arm2_len_mm: 100.0, max_radius_mm: 200.0, theta2_offset_deg: 180.0 };
        let k = Kinematics::scara(sp);
        let params = scara_params();
        let state = AxesState::default();

        let mut target = CartesianPoint::new([141.42, 141.42, 0.0]);
        let mut steps = AxesValues::splat(0);
        assert!(k.pt_to_actuator(&mut target, &mut steps, &state, &params, OutOfBoundsPolicy::Allow));

        let mut back = CartesianPoint::default();
        assert!(k.actuator_to_pt(&steps, &mut back, &params));
        let tol = sp.arm1_len_mm.max(sp.arm2_len_mm) / params.axes[0].steps_per_rot;
        assert!(fabsf(back[0] - target[0]) < tol * 10.0, "{} vs {}", back[0], target[0]);
        assert!(fabsf(back[1] - target[1]) < tol * 10.0, "{} vs {}", back[1], target[1]);
    }

    #[test]
    fn scara_unreachable_is_rejected() {
        let sp = ScaraParams { arm1_len_mm: 100.0, arm2_len_mm: 100.0, max_radius_mm: 200.0, theta2_offset_deg: 180.0 };
        let k = Kinematics::scara(sp);
        let params = scara_params();
        let state = AxesState::default();
        let mut target = CartesianPoint::new([500.0, 500.0, 0.0]);
        let mut steps = AxesValues::splat(0);
        assert!(!k.pt_to_actuator(&mut target, &mut steps, &state, &params, OutOfBoundsPolicy::Discard));
    }
}
