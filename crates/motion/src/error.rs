//! Error kinds returned by the motion core.
//!
//! The tick path never returns an error — it only cancels blocks and sets
//! flags (see `ramp`). Everything else flows back synchronously to the
//! caller of `move_to_ramped` / `move_to_non_ramped` / the block manager.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum MotionError {
    /// The block manager is still splitting a prior move.
    #[cfg_attr(feature = "std", error("motion core is busy splitting a prior move"))]
    Busy,
    /// Kinematics rejected the target (and the out-of-bounds policy did not
    /// allow or clamp it).
    #[cfg_attr(feature = "std", error("target is out of bounds"))]
    OutOfBounds,
    /// No kinematics geometry has been configured.
    #[cfg_attr(feature = "std", error("no kinematics configured"))]
    NoKinematics,
    /// `homeBeforeMove` is set and the axes state is not valid.
    #[cfg_attr(feature = "std", error("axes must be homed before this move"))]
    NotHomed,
    /// Move distance below `MINIMUM_MOVE_DIST_MM`; caller treats as success.
    #[cfg_attr(feature = "std", error("move distance below the minimum threshold"))]
    NoMovement,
    /// An endstop was hit mid-motion; the head block was cancelled.
    #[cfg_attr(feature = "std", error("endstop hit during motion"))]
    EndStopHit,
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for MotionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            MotionError::Busy => "motion core is busy splitting a prior move",
            MotionError::OutOfBounds => "target is out of bounds",
            MotionError::NoKinematics => "no kinematics configured",
            MotionError::NotHomed => "axes must be homed before this move",
            MotionError::NoMovement => "move distance below the minimum threshold",
            MotionError::EndStopHit => "endstop hit during motion",
        };
        f.write_str(msg)
    }
}

pub type MotionResult<T> = Result<T, MotionError>;
