//! `f32` math that works both on `std` and on bare `libm` in `no_std`.

#[cfg(feature = "std")]
pub fn sqrtf(v: f32) -> f32 {
    v.sqrt()
}
#[cfg(not(feature = "std"))]
pub fn sqrtf(v: f32) -> f32 {
    libm::sqrtf(v)
}

#[cfg(feature = "std")]
pub fn fabsf(v: f32) -> f32 {
    v.abs()
}
#[cfg(not(feature = "std"))]
pub fn fabsf(v: f32) -> f32 {
    libm::fabsf(v)
}

#[cfg(feature = "std")]
pub fn fminf(a: f32, b: f32) -> f32 {
    a.min(b)
}
#[cfg(not(feature = "std"))]
pub fn fminf(a: f32, b: f32) -> f32 {
    libm::fminf(a, b)
}

#[cfg(feature = "std")]
pub fn fmaxf(a: f32, b: f32) -> f32 {
    a.max(b)
}
#[cfg(not(feature = "std"))]
pub fn fmaxf(a: f32, b: f32) -> f32 {
    libm::fmaxf(a, b)
}

#[cfg(feature = "std")]
pub fn acosf(v: f32) -> f32 {
    v.acos()
}
#[cfg(not(feature = "std"))]
pub fn acosf(v: f32) -> f32 {
    libm::acosf(v)
}

#[cfg(feature = "std")]
pub fn atan2f(y: f32, x: f32) -> f32 {
    y.atan2(x)
}
#[cfg(not(feature = "std"))]
pub fn atan2f(y: f32, x: f32) -> f32 {
    libm::atan2f(y, x)
}

#[cfg(feature = "std")]
pub fn sinf(v: f32) -> f32 {
    v.sin()
}
#[cfg(not(feature = "std"))]
pub fn sinf(v: f32) -> f32 {
    libm::sinf(v)
}

#[cfg(feature = "std")]
pub fn cosf(v: f32) -> f32 {
    v.cos()
}
#[cfg(not(feature = "std"))]
pub fn cosf(v: f32) -> f32 {
    libm::cosf(v)
}

#[cfg(feature = "std")]
pub fn roundf(v: f32) -> f32 {
    v.round()
}
#[cfg(not(feature = "std"))]
pub fn roundf(v: f32) -> f32 {
    libm::roundf(v)
}

#[cfg(feature = "std")]
pub fn ceilf(v: f32) -> f32 {
    v.ceil()
}
#[cfg(not(feature = "std"))]
pub fn ceilf(v: f32) -> f32 {
    libm::ceilf(v)
}

pub const PI: f32 = core::f32::consts::PI;
