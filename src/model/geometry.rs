//! Small vector helpers used when freezing geometric payloads at creation.

#[inline]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Bending angle at the vertex of two bond vectors, in radians.
///
/// `r_ij` and `r_kj` point from the middle particle towards the two ends.
pub fn bend_angle(r_ij: [f64; 3], r_kj: [f64; 3]) -> f64 {
    let cos = dot(r_ij, r_kj) / (norm(r_ij) * norm(r_kj));
    cos.clamp(-1.0, 1.0).acos()
}

/// Dihedral angle over three consecutive bond vectors, in radians.
pub fn dihedral_angle(b1: [f64; 3], b2: [f64; 3], b3: [f64; 3]) -> f64 {
    let n1 = cross(b1, b2);
    let n2 = cross(b2, b3);
    let m = cross(n1, b2);
    let norm_b2 = norm(b2);
    if norm_b2 == 0.0 {
        return 0.0;
    }
    let x = dot(n1, n2);
    let y = dot(m, n2) / norm_b2;
    y.atan2(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_angle_bend() {
        let a = bend_angle([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!((a - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn straight_chain_bend() {
        let a = bend_angle([1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        assert!((a - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn planar_trans_dihedral() {
        // Zig-zag chain in the xy plane: trans configuration, |phi| = pi.
        let b1 = [1.0, 1.0, 0.0];
        let b2 = [1.0, -1.0, 0.0];
        let b3 = [1.0, 1.0, 0.0];
        let phi = dihedral_angle(b1, b2, b3);
        assert!((phi.abs() - std::f64::consts::PI).abs() < 1e-12);
    }
}
