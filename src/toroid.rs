//! Toroidal (wrap-around) geometry on a square world of side `L`.
//!
//! Every wrap-aware query re-centers one operand with [`nearest_image`]
//! before running the same test it would run in flat space.

use glam::Vec2;

/// Move `value` by whole periods so it lies within `side / 2` of `home`.
///
/// Values already within half a period are returned untouched, so a point
/// exactly `side / 2` away keeps its raw coordinate.
#[inline]
pub fn nearest_coord(value: f32, home: f32, side: f32) -> f32 {
    let half = side * 0.5;
    let offset = value - home;
    if offset.abs() <= half {
        return value;
    }
    home + (offset + half).rem_euclid(side) - half
}

/// The copy of `point` closest to `home` on a torus of side `side`.
#[inline]
pub fn nearest_image(point: Vec2, home: Vec2, side: f32) -> Vec2 {
    Vec2::new(
        nearest_coord(point.x, home.x, side),
        nearest_coord(point.y, home.y, side),
    )
}

/// Shortest displacement from `from` to `to`.
#[inline]
pub fn wrapped_delta(from: Vec2, to: Vec2, side: f32) -> Vec2 {
    nearest_image(to, from, side) - from
}

/// Shortest distance between two points; never exceeds `side * sqrt(2) / 2`.
#[inline]
pub fn wrapped_distance(p: Vec2, q: Vec2, side: f32) -> f32 {
    wrapped_delta(p, q, side).length()
}

/// Canonical representative of `point` in `[0, side)²`.
#[inline]
pub fn wrap_into(point: Vec2, side: f32) -> Vec2 {
    let wrap = |v: f32| {
        let w = v.rem_euclid(side);
        // rem_euclid can round up to `side` for tiny negative inputs
        if w >= side { 0.0 } else { w }
    };
    Vec2::new(wrap(point.x), wrap(point.y))
}

/// Re-center `point` next to `home` when a side length is given; identity otherwise.
#[inline]
pub(crate) fn recenter(point: Vec2, home: Vec2, side: Option<f32>) -> Vec2 {
    match side {
        Some(l) => nearest_image(point, home, l),
        None => point,
    }
}
