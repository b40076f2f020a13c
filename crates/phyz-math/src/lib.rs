//! Dimension-generic math primitives for phyz grid/particle solvers.
//!
//! Vectors and square matrices are `nalgebra` static types parameterized by
//! the spatial dimension `D`, so the same solver code runs in 2D and 3D.

pub mod hypercube;

pub use hypercube::{corner_count, corner_offsets, corner_signs};

use nalgebra as na;

/// D-dimensional column vector.
pub type Vector<const D: usize> = na::SVector<f64, D>;
/// D×D square matrix.
pub type Matrix<const D: usize> = na::SMatrix<f64, D, D>;

/// 2D vector alias.
pub type Vec2 = Vector<2>;
/// 3D vector alias.
pub type Vec3 = Vector<3>;
/// 2x2 matrix alias.
pub type Mat2 = Matrix<2>;
/// 3x3 matrix alias.
pub type Mat3 = Matrix<3>;

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Outer product a ⊗ b = a bᵀ.
#[inline]
pub fn outer<const D: usize>(a: &Vector<D>, b: &Vector<D>) -> Matrix<D> {
    a * b.transpose()
}

/// Determinant of a square matrix of any static size.
///
/// Closed forms for D ≤ 3, Gaussian elimination with partial pivoting above.
pub fn determinant<const D: usize>(m: &Matrix<D>) -> f64 {
    match D {
        0 => 1.0,
        1 => m[(0, 0)],
        2 => m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        3 => {
            m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
                - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
                + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
        }
        _ => {
            let mut a = *m;
            let mut det = 1.0;
            for col in 0..D {
                let pivot = (col..D)
                    .max_by(|&i, &j| a[(i, col)].abs().total_cmp(&a[(j, col)].abs()))
                    .unwrap_or(col);
                if a[(pivot, col)] == 0.0 {
                    return 0.0;
                }
                if pivot != col {
                    a.swap_rows(pivot, col);
                    det = -det;
                }
                let p = a[(col, col)];
                det *= p;
                for row in (col + 1)..D {
                    let factor = a[(row, col)] / p;
                    for k in col..D {
                        a[(row, k)] -= factor * a[(col, k)];
                    }
                }
            }
            det
        }
    }
}

/// Condition number of `m` in the Frobenius norm, ‖m‖·‖m⁻¹‖.
///
/// Returns `f64::INFINITY` for singular matrices.
pub fn frobenius_condition<const D: usize>(m: &Matrix<D>) -> f64 {
    match m.try_inverse() {
        Some(inv) => m.norm() * inv.norm(),
        None => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_determinant_closed_forms() {
        let m2 = Mat2::new(2.0, 1.0, 1.0, 3.0);
        assert_relative_eq!(determinant(&m2), 5.0);

        let m3 = Mat3::new(2.0, 0.0, 1.0, 1.0, 3.0, 0.0, 0.0, 1.0, 4.0);
        assert_relative_eq!(determinant(&m3), m3.determinant(), epsilon = 1e-12);
    }

    #[test]
    fn test_determinant_elimination() {
        let m = na::SMatrix::<f64, 4, 4>::from_diagonal(&na::Vector4::new(1.0, 2.0, 3.0, 4.0));
        assert_relative_eq!(determinant(&m), 24.0, epsilon = 1e-12);

        let mut swapped = m;
        swapped.swap_rows(0, 1);
        assert_relative_eq!(determinant(&swapped), -24.0, epsilon = 1e-12);
    }

    #[test]
    fn test_outer_product() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 4.0);
        let m = outer(&a, &b);
        assert_eq!(m, Mat2::new(3.0, 4.0, 6.0, 8.0));
    }

    #[test]
    fn test_condition_number() {
        assert_relative_eq!(frobenius_condition(&Mat2::identity()), 2.0, epsilon = 1e-12);
        assert!(frobenius_condition(&Mat2::zeros()).is_infinite());
    }
}
