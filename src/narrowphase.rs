use glam::Vec2;

use crate::api::NarrowphaseApi;

/// Circle/capsule primitive tests.
pub struct Narrowphase;

impl NarrowphaseApi for Narrowphase {
    fn overlap_circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> bool {
        let rsum = r0 + r1;
        (c0 - c1).length_squared() < rsum * rsum
    }

    fn sweep_roots(start: Vec2, vector: Vec2, center: Vec2, radius: f32) -> Option<(f32, f32)> {
        // Half-b form of |m + t*d|^2 = r^2
        let m = start - center;
        let a = vector.length_squared();
        if a == 0.0 {
            return None;
        }
        let b = m.dot(vector);
        let c = m.length_squared() - radius * radius;
        let disc = b * b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        Some(((-b - sqrt_disc) / a, (-b + sqrt_disc) / a))
    }

    fn line_segment_circle(
        start: Vec2,
        vector: Vec2,
        sweep_radius: f32,
        center: Vec2,
        radius: f32,
    ) -> Option<f32> {
        let (t0, t1) = Self::sweep_roots(start, vector, center, radius + sweep_radius)?;
        if t0 > 1.0 || t1 < 0.0 {
            return None;
        }
        Some(t0.max(0.0))
    }

    fn contact_normal(a: Vec2, b: Vec2) -> Vec2 {
        let n = a - b;
        let len = n.length();
        if len > 0.0 { n / len } else { Vec2::X }
    }

    fn contact_point(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Vec2 {
        (a * rb + b * ra) / (ra + rb)
    }

    fn contact_impulse(
        rel_pos: Vec2,
        rel_vel: Vec2,
        normal: Vec2,
        inv_mass_sum: f32,
        radius_sum: f32,
        dt: f32,
        damping: f32,
    ) -> f32 {
        // Predicted separation after one step, and how a unit impulse moves it
        let q = rel_pos + rel_vel * dt;
        let push = normal * (dt * dt * inv_mass_sum);

        let a = push.length_squared();
        if a == 0.0 {
            return 0.0;
        }
        let b = 2.0 * q.dot(push);
        let c = q.length_squared() - radius_sum * radius_sum;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return 0.0;
        }
        let sqrt_disc = disc.sqrt();
        let f0 = (-b - sqrt_disc) / (2.0 * a) * damping;
        let f1 = (-b + sqrt_disc) / (2.0 * a) * damping;
        if f0 > 0.0 {
            f0
        } else if f1 > 0.0 {
            f1
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_overlap_circle_circle_is_strict() {
        assert!(Narrowphase::overlap_circle_circle(Vec2::ZERO, 5.0, Vec2::new(9.0, 0.0), 5.0));
        // Tangent circles do not overlap
        assert!(!Narrowphase::overlap_circle_circle(Vec2::ZERO, 1.0, Vec2::new(2.0, 0.0), 1.0));
    }

    #[test]
    fn test_segment_circle_entry() {
        let t = Narrowphase::line_segment_circle(
            Vec2::ZERO,
            Vec2::new(20.0, 0.0),
            0.0,
            Vec2::new(10.0, 0.0),
            3.0,
        )
        .unwrap();
        assert_abs_diff_eq!(t, 0.35, epsilon = 1e-5);
    }

    #[test]
    fn test_segment_circle_sweep_radius_widens() {
        let start = Vec2::new(0.0, 4.0);
        let v = Vec2::new(20.0, 0.0);
        let c = Vec2::new(10.0, 0.0);
        assert!(Narrowphase::line_segment_circle(start, v, 0.0, c, 3.0).is_none());
        assert!(Narrowphase::line_segment_circle(start, v, 1.5, c, 3.0).is_some());
    }

    #[test]
    fn test_segment_circle_inside_clamps_to_zero() {
        let t = Narrowphase::line_segment_circle(
            Vec2::new(10.0, 1.0),
            Vec2::new(5.0, 0.0),
            0.0,
            Vec2::new(10.0, 0.0),
            3.0,
        );
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn test_segment_circle_out_of_range() {
        // Circle behind the start
        assert!(Narrowphase::line_segment_circle(
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            0.0,
            Vec2::new(-5.0, 0.0),
            1.0
        )
        .is_none());
        // Circle beyond the end
        assert!(Narrowphase::line_segment_circle(
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            0.0,
            Vec2::new(5.0, 0.0),
            1.0
        )
        .is_none());
    }

    #[test]
    fn test_zero_vector_is_no_hit() {
        assert!(Narrowphase::sweep_roots(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_contact_point_radius_weighted() {
        let p = Narrowphase::contact_point(Vec2::ZERO, 5.0, Vec2::new(9.0, 0.0), 5.0);
        assert_abs_diff_eq!(p.x, 4.5, epsilon = 1e-5);
        // Smaller body pulls the contact toward itself
        let q = Narrowphase::contact_point(Vec2::ZERO, 1.0, Vec2::new(4.0, 0.0), 3.0);
        assert_abs_diff_eq!(q.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_contact_normal_fallback() {
        assert_eq!(Narrowphase::contact_normal(Vec2::ONE, Vec2::ONE), Vec2::X);
        let n = Narrowphase::contact_normal(Vec2::ZERO, Vec2::new(0.0, 3.0));
        assert_abs_diff_eq!(n.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_contact_impulse_head_on() {
        // A at origin, B at (9,0) closing at 10 u/s, masses 10, dt 0.1
        let f = Narrowphase::contact_impulse(
            Vec2::new(-9.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(-1.0, 0.0),
            0.2,
            10.0,
            0.1,
            0.8,
        );
        assert_abs_diff_eq!(f, 800.0, epsilon = 1.0);
    }

    #[test]
    fn test_contact_impulse_prefers_smaller_positive_root() {
        // Predicted separation 15 > 10, with a unit push moving it by 1 per
        // unit impulse: roots 5 and 25, both positive.
        let f = Narrowphase::contact_impulse(
            Vec2::new(-15.0, 0.0),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            1.0,
            10.0,
            1.0,
            0.5,
        );
        assert_abs_diff_eq!(f, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_contact_impulse_zero_dt() {
        let f = Narrowphase::contact_impulse(
            Vec2::new(-9.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(-1.0, 0.0),
            0.2,
            10.0,
            0.0,
            0.8,
        );
        assert_eq!(f, 0.0);
    }
}
