//! Small symmetric linear solves for simultaneous template fits.
//!
//! For a fixed set of template shifts the least-squares amplitudes satisfy the normal equations
//!
//! ```text
//! P a = q
//! ```
//!
//! where `P` is the (tiny) matrix of PSD-weighted template inner products and `q` the weighted
//! projections of the signal. `P` never depends on the signal, so it is inverted once per template
//! configuration and every event reduces to `a = P⁻¹ q`.
//!
//! Implementation choices:
//! - SVD on the square system, so that rank deficiency is visible through the singular values.
//! - A relative singular value cutoff rejects degenerate systems instead of returning a
//!   pseudo-inverse solution; callers decide whether that is fatal.

use nalgebra::DMatrix;

/// Smallest accepted ratio between the smallest and largest singular value.
const MIN_RCOND: f64 = 1e-12;

/// Invert a symmetric positive (semi)definite `P`.
///
/// Returns `None` if `P` is singular or too ill-conditioned to invert robustly.
pub fn invert_normal_matrix(p: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let k = p.nrows();
    if k == 0 || k != p.ncols() || p.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = p.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min <= s_max * MIN_RCOND {
        return None;
    }

    let inverse = svd.solve(&DMatrix::<f64>::identity(k, k), 0.0).ok()?;
    if inverse.iter().all(|v| v.is_finite()) {
        Some(inverse)
    } else {
        None
    }
}

/// Whether `P` is well-conditioned enough for `invert_normal_matrix`.
pub fn is_well_conditioned(p: &DMatrix<f64>) -> bool {
    if p.nrows() == 0 || p.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let singular = p.clone().singular_values();
    let s_max = singular.max();
    s_max > 0.0 && singular.min() > s_max * MIN_RCOND
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    #[test]
    fn inverts_simple_spd_system() {
        // [[4, 1], [1, 3]] a = [1, 2]  ->  a = [1/11, 7/11]
        let p = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let q = DVector::from_row_slice(&[1.0, 2.0]);

        let inv = invert_normal_matrix(&p).unwrap();
        let a = &inv * &q;
        assert!((a[0] - 1.0 / 11.0).abs() < 1e-12);
        assert!((a[1] - 7.0 / 11.0).abs() < 1e-12);
        assert!((&inv * &p - DMatrix::<f64>::identity(2, 2)).amax() < 1e-12);
    }

    #[test]
    fn rejects_singular_system() {
        let p = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(invert_normal_matrix(&p).is_none());
        assert!(!is_well_conditioned(&p));
    }

    #[test]
    fn scale_does_not_affect_conditioning() {
        // Typical OF inner products are far from unity.
        let p = DMatrix::from_row_slice(2, 2, &[4e14, 1e14, 1e14, 3e14]);
        let q = DVector::from_row_slice(&[1e7, 2e7]);
        let a = invert_normal_matrix(&p).unwrap() * q;
        assert!((a[0] - 1e-7 / 11.0).abs() < 1e-19);
    }
}
