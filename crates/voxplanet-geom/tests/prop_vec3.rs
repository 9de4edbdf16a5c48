use proptest::prelude::*;
use proptest::strategy::Strategy;
use voxplanet_geom::Vec3;

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn vapprox(a: Vec3, b: Vec3, eps: f32) -> bool {
    approx(a.x, b.x, eps) && approx(a.y, b.y, eps) && approx(a.z, b.z, eps)
}

fn bounded_f32() -> impl Strategy<Value = f32> {
    proptest::num::f32::NORMAL.prop_filter("bounded", |v| v.is_finite() && v.abs() <= 1e4)
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (bounded_f32(), bounded_f32(), bounded_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn add_commutative(a in arb_vec3(), b in arb_vec3()) {
        prop_assert!(vapprox(a + b, b + a, 1e-3));
    }

    #[test]
    fn cross_is_perpendicular(a in arb_vec3(), b in arb_vec3()) {
        let c = a.cross(b);
        let scale = a.length() * b.length();
        prop_assert!(c.dot(a).abs() <= 1e-2 * scale.max(1.0) * a.length().max(1.0));
        prop_assert!(c.dot(b).abs() <= 1e-2 * scale.max(1.0) * b.length().max(1.0));
    }

    #[test]
    fn normalized_has_unit_length(a in arb_vec3()) {
        prop_assume!(a.length() > 1e-3);
        prop_assert!(approx(a.normalized().length(), 1.0, 1e-4));
    }

    #[test]
    fn length_sq_matches_length(a in arb_vec3()) {
        let l = a.length();
        prop_assert!(approx(a.length_sq(), l * l, 1e-2 * (l * l).max(1.0)));
    }
}
