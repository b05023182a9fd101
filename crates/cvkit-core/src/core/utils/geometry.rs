use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Cannot align empty point sets")]
    Empty,
    #[error("Point sets differ in size: {mobile} mobile vs {reference} reference points")]
    LengthMismatch { mobile: usize, reference: usize },
    #[error("Singular value decomposition of the covariance matrix failed")]
    Decomposition,
}

/// Optimal superposition of a mobile point set onto a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Rotation `R` minimizing `sum |R * mobile_k - reference_k|^2`.
    pub rotation: Rotation3<f64>,
    pub rmsd: f64,
}

pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

/// Positions relative to the centroid of the set.
pub fn centered(points: &[Point3<f64>]) -> Vec<Vector3<f64>> {
    let center = centroid(points);
    points.iter().map(|p| p - center).collect()
}

/// Kabsch alignment of two point sets that are already expressed relative to their own
/// centroids.
///
/// The mean-squared deviation is obtained from the singular values of the
/// cross-covariance matrix, `(E0 - 2 * (s1 + s2 + d * s3)) / N`, with `d` the sign that
/// excludes reflections. Rounding can push that difference slightly below zero for a
/// perfect match, so it is clamped before the square root.
pub fn align(
    mobile: &[Vector3<f64>],
    reference: &[Vector3<f64>],
) -> Result<Alignment, AlignmentError> {
    if mobile.len() != reference.len() {
        return Err(AlignmentError::LengthMismatch {
            mobile: mobile.len(),
            reference: reference.len(),
        });
    }
    if mobile.is_empty() {
        return Err(AlignmentError::Empty);
    }

    let covariance = mobile
        .iter()
        .zip(reference.iter())
        .fold(Matrix3::zeros(), |acc, (m, r)| acc + m * r.transpose());
    let inner_product: f64 = mobile
        .iter()
        .chain(reference.iter())
        .map(|v| v.norm_squared())
        .sum();

    let svd = covariance.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(AlignmentError::Decomposition),
    };
    let singular = svd.singular_values;

    let mut v = v_t.transpose();
    let mut trace = singular.sum();
    if (v * u.transpose()).determinant() < 0.0 {
        let smallest = singular.imin();
        v.column_mut(smallest).neg_mut();
        trace -= 2.0 * singular[smallest];
    }
    // The SVD product is orthonormal only up to rounding, which can leave the trace just
    // above 3 and the rotation angle undefined.
    let rotation =
        Rotation3::from_matrix_eps(&(v * u.transpose()), 1e-12, 0, Rotation3::identity());

    let msd = ((inner_product - 2.0 * trace) / mobile.len() as f64).max(0.0);
    Ok(Alignment {
        rotation,
        rmsd: msd.sqrt(),
    })
}

/// Distance between two points and its gradient with respect to each of them.
pub fn distance_with_gradient(a: &Vector3<f64>, b: &Vector3<f64>) -> (f64, [Vector3<f64>; 2]) {
    let delta = a - b;
    let r = delta.norm();
    if r < 1e-12 {
        return (r, [Vector3::zeros(); 2]);
    }
    let unit = delta / r;
    (r, [unit, -unit])
}

/// Angle at `b` formed by `a-b-c`, in radians, and its gradient.
pub fn angle_with_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> (f64, [Vector3<f64>; 3]) {
    let u = a - b;
    let v = c - b;
    let normal = u.cross(&v);
    let theta = normal.norm().atan2(u.dot(&v));

    let (u_norm, v_norm) = (u.norm(), v.norm());
    let normal_norm = normal.norm();
    if u_norm < 1e-12 || v_norm < 1e-12 || normal_norm < 1e-12 {
        return (theta, [Vector3::zeros(); 3]);
    }
    // In-plane directions perpendicular to each arm, pointing towards the other arm.
    let grad_a = -(v - u * (u.dot(&v) / (u_norm * u_norm))).normalize() / u_norm;
    let grad_c = -(u - v * (u.dot(&v) / (v_norm * v_norm))).normalize() / v_norm;
    (theta, [grad_a, -(grad_a + grad_c), grad_c])
}

/// Dihedral angle `p0-p1-p2-p3` in radians (IUPAC sign convention) and its gradient,
/// following Blondel and Karplus.
pub fn dihedral_with_gradient(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
) -> (f64, [Vector3<f64>; 4]) {
    let f = p0 - p1;
    let g = p1 - p2;
    let h = p3 - p2;
    let a = f.cross(&g);
    let b = h.cross(&g);
    let g_norm = g.norm();

    let sin_term = b.cross(&a).dot(&g) / g_norm.max(1e-300);
    let phi = sin_term.atan2(a.dot(&b));

    let (a_sq, b_sq) = (a.norm_squared(), b.norm_squared());
    if a_sq < 1e-24 || b_sq < 1e-24 || g_norm < 1e-12 {
        return (phi, [Vector3::zeros(); 4]);
    }
    let grad_f = a * (-g_norm / a_sq);
    let grad_h = b * (g_norm / b_sq);
    let grad_g = a * (f.dot(&g) / (a_sq * g_norm)) - b * (h.dot(&g) / (b_sq * g_norm));
    (
        phi,
        [grad_f, grad_g - grad_f, -grad_g - grad_h, grad_h],
    )
}

/// Minimum-image displacement in a rectangular periodic box.
pub fn minimum_image(delta: Vector3<f64>, box_lengths: &Vector3<f64>) -> Vector3<f64> {
    delta.zip_map(box_lengths, |d, length| {
        if length > 0.0 {
            d - length * (d / length).round()
        } else {
            d
        }
    })
}
