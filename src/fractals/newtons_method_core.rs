// Common library funcions for fractals that are backed by Newton's method:
// the per-point convergence classifier and the nearest-root matching.

#[cfg(test)]
use nalgebra::Matrix2;
use num::complex::Complex64;

/// A complex-valued function with its derivative (slope).
pub trait ComplexFunctionWithSlope {
    /// f(z)
    fn value(&self, z: Complex64) -> Complex64;

    /// f'(z)
    fn slope(&self, z: Complex64) -> Complex64;
}

/// Adapter that pairs two independent closures, `f` and `f'`.
pub struct FunctionAndSlope<F, D> {
    pub function: F,
    pub derivative: D,
}

impl<F, D> ComplexFunctionWithSlope for FunctionAndSlope<F, D>
where
    F: Fn(Complex64) -> Complex64,
    D: Fn(Complex64) -> Complex64,
{
    #[inline]
    fn value(&self, z: Complex64) -> Complex64 {
        (self.function)(z)
    }

    #[inline]
    fn slope(&self, z: Complex64) -> Complex64 {
        (self.derivative)(z)
    }
}

/// The point reached by Newton's method, and the iteration count when it stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceResult {
    pub root: Complex64,
    pub iteration_count: u32,
}

/**
 * Runs Newton-Raphson from `x0`, for at most `max_iteration_count` steps.
 *
 * On iteration `i` (zero based):
 * - if f'(sol) is exactly zero, stops and reports `(sol, i)`;
 * - otherwise takes the step `next = sol - f(sol) / f'(sol)`, and if
 *   `|sol - next| < tolerance` reports `(next, i)`.
 *
 * Note that on convergence the reported count is the index of the step that
 * detected convergence, not the number of steps taken. The rendered images
 * depend on this convention, so it is kept as-is.
 *
 * If the loop runs out, reports `(sol, max_iteration_count)`. NaN and
 * overflow are not checked; they simply propagate into the result.
 */
pub fn classify<F>(
    function: &F,
    x0: Complex64,
    max_iteration_count: u32,
    tolerance: f64,
) -> ConvergenceResult
where
    F: ComplexFunctionWithSlope,
{
    let mut sol = x0;
    for i in 0..max_iteration_count {
        let slope = function.slope(sol);
        if slope == Complex64::new(0.0, 0.0) {
            return ConvergenceResult {
                root: sol,
                iteration_count: i,
            };
        }
        let next = sol - function.value(sol) / slope;
        if (sol - next).norm() < tolerance {
            return ConvergenceResult {
                root: next,
                iteration_count: i,
            };
        }
        sol = next;
    }
    ConvergenceResult {
        root: sol,
        iteration_count: max_iteration_count,
    }
}

/**
 * Index of the root closest to `point`. Roots are scanned in order and only a
 * strictly smaller distance replaces the current best, so ties go to the
 * lowest index. Panics if `roots` is empty.
 */
pub fn nearest_root_index(point: Complex64, roots: &[Complex64]) -> usize {
    let mut min_index = 0;
    let mut min_distance = (point - roots[0]).norm();
    for (index, root) in roots.iter().enumerate().skip(1) {
        let distance = (point - root).norm();
        if distance < min_distance {
            min_distance = distance;
            min_index = index;
        }
    }
    min_index
}

/// Real (left-regular) representation of a complex scalar as a 2×2 real matrix.
///
/// Maps s = a + i b to the real-linear map x ↦ s·x on C ≅ R^2:
///     [ a  -b ]
///     [ b   a ]
#[inline]
#[cfg(test)]
fn left_multiply_matrix(s: Complex64) -> Matrix2<f64> {
    Matrix2::new(s.re, -s.im, s.im, s.re)
}

/// Checks the analytic slope of `function` against central finite differences.
#[cfg(test)]
pub fn assert_consistent_value_and_slope<F: ComplexFunctionWithSlope>(
    function: &F,
    z0: Complex64,
    abs_tol: f64,
    rel_tol: f64,
) {
    // Scaled step size for the finite difference operation
    let scale = (z0.norm() + 1.0).sqrt();
    let h = 1e-7 / scale;

    let dfdx = {
        let f_xp = function.value(z0 + Complex64::new(h, 0.0));
        let f_xm = function.value(z0 - Complex64::new(h, 0.0));
        (f_xp - f_xm) * (0.5 / h)
    };
    let dfdy = {
        let f_yp = function.value(z0 + Complex64::new(0.0, h));
        let f_ym = function.value(z0 - Complex64::new(0.0, h));
        (f_yp - f_ym) * (0.5 / h)
    };

    // J_num = [[∂u/∂x, ∂u/∂y],
    //          [∂v/∂x, ∂v/∂y]]
    let finite_difference_slope = Matrix2::new(dfdx.re, dfdy.re, dfdx.im, dfdy.im);
    let analytic_slope = left_multiply_matrix(function.slope(z0));

    // nalgebra's `.norm()` on matrices is the Frobenius norm (Euclidean of all entries)
    let error_norm = (finite_difference_slope - analytic_slope).norm();
    let reference_scale = analytic_slope.norm().max(1.0);

    assert!(
        error_norm <= abs_tol + rel_tol * reference_scale,
        "Derivative check failed at z0={z0:?}\n\
         numerical J = {finite_difference_slope}\n\
         analytic  J = {analytic_slope}\n\
         err_frob   = {error_norm:e},  bound = {}",
        abs_tol + rel_tol * reference_scale
    );
}
