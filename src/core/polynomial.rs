// Polynomials with complex coefficients: construction from a parsed
// expression, exact differentiation, and numerical root extraction.

use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::expression::{
    complex_power, BinaryOperator, Expression, ExpressionError, UnaryOperator,
};

/// Upper bound on the degree of any polynomial built from an expression.
pub const MAX_DEGREE: usize = 64;

/// Relative threshold below which a root component is considered to be zero.
const ROOT_SNAP_THRESHOLD: f64 = 1e-12;

/// Offset (radians) applied to the initial Durand-Kerner guesses, so that they
/// are not aligned with the symmetry axes of typical polynomials.
const INITIAL_GUESS_ANGLE_OFFSET: f64 = 0.4;

#[derive(Debug, Error, PartialEq)]
pub enum PolynomialError {
    #[error("unable to parse expression: {0}")]
    Parse(#[from] ExpressionError),

    #[error("expression is not a polynomial in x: {0}")]
    NotAPolynomial(String),

    #[error("polynomial degree {degree} exceeds the maximum of {max}")]
    DegreeTooLarge { degree: usize, max: usize },

    #[error("division by zero in expression")]
    DivisionByZero,

    #[error("polynomial has no roots: {0}")]
    NoRoots(String),
}

fn default_multiplicity_tolerance() -> f64 {
    1e-9
}

/// Explicit numeric settings for the polynomial root solver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RootSolverParams {
    /// Sweeps stop once every root update is below `tolerance * (1 + |z|)`.
    pub tolerance: f64,
    pub max_iteration_count: u32,
    /// A Euclidean remainder whose coefficients are all below this fraction of
    /// the dividend's largest coefficient counts as zero when removing
    /// repeated roots.
    #[serde(default = "default_multiplicity_tolerance")]
    pub multiplicity_tolerance: f64,
}

impl Default for RootSolverParams {
    fn default() -> Self {
        RootSolverParams {
            tolerance: 1e-12,
            max_iteration_count: 500,
            multiplicity_tolerance: default_multiplicity_tolerance(),
        }
    }
}

/**
 * Polynomial in a single complex variable. Coefficients are stored in order
 * of ascending degree, with trailing zeros removed. The zero polynomial is
 * stored as a single zero coefficient.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<Complex64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<Complex64>) -> Polynomial {
        let mut polynomial = Polynomial { coefficients };
        polynomial.trim();
        polynomial
    }

    pub fn constant(value: Complex64) -> Polynomial {
        Polynomial::new(vec![value])
    }

    /// p(x) = x
    pub fn identity() -> Polynomial {
        Polynomial::new(vec![Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)])
    }

    /// Parse a textual expression (e.g. `x**3 - 1`) directly into a polynomial.
    pub fn parse(source: &str) -> Result<Polynomial, PolynomialError> {
        let expression = Expression::parse(source)?;
        Polynomial::from_expression(&expression)
    }

    /**
     * Folds an expression tree into coefficient form. Powers must have a
     * constant, non-negative integer exponent (unless the base is itself a
     * constant), and division is only allowed by a non-zero constant.
     */
    pub fn from_expression(expression: &Expression) -> Result<Polynomial, PolynomialError> {
        match expression {
            Expression::Constant(value) => Ok(Polynomial::constant(*value)),
            Expression::Variable => Ok(Polynomial::identity()),
            Expression::Unary(UnaryOperator::Plus, operand) => Polynomial::from_expression(operand),
            Expression::Unary(UnaryOperator::Negate, operand) => {
                Ok(Polynomial::from_expression(operand)?.scale(Complex64::new(-1.0, 0.0)))
            }
            Expression::Binary(operator, lhs, rhs) => {
                let a = Polynomial::from_expression(lhs)?;
                let b = Polynomial::from_expression(rhs)?;
                match operator {
                    BinaryOperator::Add => Ok(a.add(&b)),
                    BinaryOperator::Subtract => Ok(a.sub(&b)),
                    BinaryOperator::Multiply => a.mul(&b),
                    BinaryOperator::Divide => {
                        let divisor = b.as_constant().ok_or_else(|| {
                            PolynomialError::NotAPolynomial(
                                "division by a non-constant expression".to_owned(),
                            )
                        })?;
                        if divisor == Complex64::new(0.0, 0.0) {
                            return Err(PolynomialError::DivisionByZero);
                        }
                        Ok(a.scale(divisor.inv()))
                    }
                    BinaryOperator::Power => {
                        let exponent = b.as_constant().ok_or_else(|| {
                            PolynomialError::NotAPolynomial(
                                "exponent depends on the variable".to_owned(),
                            )
                        })?;
                        if let Some(base) = a.as_constant() {
                            return Ok(Polynomial::constant(complex_power(base, exponent)));
                        }
                        a.powi(Polynomial::integer_exponent(exponent)?)
                    }
                }
            }
        }
    }

    fn integer_exponent(exponent: Complex64) -> Result<usize, PolynomialError> {
        let is_non_negative_integer =
            exponent.im == 0.0 && exponent.re >= 0.0 && exponent.re.fract() == 0.0;
        if !is_non_negative_integer {
            return Err(PolynomialError::NotAPolynomial(format!(
                "exponent {} is not a non-negative integer",
                exponent
            )));
        }
        if exponent.re > MAX_DEGREE as f64 {
            return Err(PolynomialError::DegreeTooLarge {
                degree: exponent.re as usize,
                max: MAX_DEGREE,
            });
        }
        Ok(exponent.re as usize)
    }

    fn trim(&mut self) {
        while self.coefficients.len() > 1
            && self.coefficients.last() == Some(&Complex64::new(0.0, 0.0))
        {
            self.coefficients.pop();
        }
        if self.coefficients.is_empty() {
            self.coefficients.push(Complex64::new(0.0, 0.0));
        }
    }

    pub fn coefficients(&self) -> &[Complex64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.len() == 1 && self.coefficients[0] == Complex64::new(0.0, 0.0)
    }

    pub fn as_constant(&self) -> Option<Complex64> {
        if self.degree() == 0 {
            Some(self.coefficients[0])
        } else {
            None
        }
    }

    /// Horner evaluation.
    #[inline]
    pub fn evaluate(&self, z: Complex64) -> Complex64 {
        self.coefficients
            .iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z + c)
    }

    pub fn derivative(&self) -> Polynomial {
        Polynomial::new(
            self.coefficients
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| c * (k as f64))
                .collect(),
        )
    }

    pub fn scale(&self, factor: Complex64) -> Polynomial {
        Polynomial::new(self.coefficients.iter().map(|&c| c * factor).collect())
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let n = self.coefficients.len().max(other.coefficients.len());
        let zero = Complex64::new(0.0, 0.0);
        Polynomial::new(
            (0..n)
                .map(|k| {
                    self.coefficients.get(k).copied().unwrap_or(zero)
                        + other.coefficients.get(k).copied().unwrap_or(zero)
                })
                .collect(),
        )
    }

    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.scale(Complex64::new(-1.0, 0.0)))
    }

    pub fn mul(&self, other: &Polynomial) -> Result<Polynomial, PolynomialError> {
        if self.is_zero() || other.is_zero() {
            return Ok(Polynomial::constant(Complex64::new(0.0, 0.0)));
        }
        let degree = self.degree() + other.degree();
        if degree > MAX_DEGREE {
            return Err(PolynomialError::DegreeTooLarge {
                degree,
                max: MAX_DEGREE,
            });
        }
        let mut product = vec![Complex64::new(0.0, 0.0); degree + 1];
        for (i, &a) in self.coefficients.iter().enumerate() {
            for (j, &b) in other.coefficients.iter().enumerate() {
                product[i + j] += a * b;
            }
        }
        Ok(Polynomial::new(product))
    }

    /// Largest coefficient magnitude.
    fn max_coefficient_norm(&self) -> f64 {
        self.coefficients.iter().map(|c| c.norm()).fold(0.0, f64::max)
    }

    /// Divides through by the leading coefficient. The zero polynomial is returned as-is.
    pub fn monic(&self) -> Polynomial {
        if self.is_zero() {
            return self.clone();
        }
        self.scale(self.coefficients[self.degree()].inv())
    }

    /**
     * Long division: returns `(quotient, remainder)` with
     * `self = quotient * divisor + remainder` and `deg(remainder) < deg(divisor)`.
     * Returns `None` when dividing by the zero polynomial.
     */
    pub fn div_rem(&self, divisor: &Polynomial) -> Option<(Polynomial, Polynomial)> {
        if divisor.is_zero() {
            return None;
        }
        let zero = Complex64::new(0.0, 0.0);
        let n = self.degree();
        let m = divisor.degree();
        if n < m {
            return Some((Polynomial::constant(zero), self.clone()));
        }

        let leading = divisor.coefficients[m];
        let mut remainder = self.coefficients.clone();
        let mut quotient = vec![zero; n - m + 1];
        for k in (0..=n - m).rev() {
            let factor = remainder[k + m] / leading;
            quotient[k] = factor;
            for (j, &d) in divisor.coefficients.iter().enumerate() {
                remainder[k + j] -= factor * d;
            }
        }
        // Everything at or above degree m was cancelled by construction.
        remainder.truncate(m);
        Some((Polynomial::new(quotient), Polynomial::new(remainder)))
    }

    /**
     * Monic greatest common divisor by the Euclidean algorithm, where a
     * remainder counts as zero once it is negligible (see
     * `RootSolverParams::multiplicity_tolerance`) relative to the dividend.
     */
    pub fn approximate_gcd(&self, other: &Polynomial, tolerance: f64) -> Polynomial {
        let mut a = self.monic();
        let mut b = other.monic();
        if a.is_zero() {
            return b;
        }
        while !b.is_zero() {
            let scale = a.max_coefficient_norm().max(b.max_coefficient_norm());
            let remainder = match a.div_rem(&b) {
                Some((_, remainder)) => remainder,
                None => break,
            };
            if remainder.max_coefficient_norm() <= tolerance * scale {
                return b;
            }
            a = b;
            b = remainder.monic();
        }
        a
    }

    /// `p / gcd(p, p')`: same roots as `p`, each with multiplicity one.
    pub fn square_free_part(&self, tolerance: f64) -> Polynomial {
        if self.degree() < 2 {
            return self.clone();
        }
        let gcd = self.approximate_gcd(&self.derivative(), tolerance);
        if gcd.degree() == 0 {
            return self.clone();
        }
        match self.div_rem(&gcd) {
            Some((quotient, _)) => quotient,
            None => self.clone(),
        }
    }

    pub fn powi(&self, exponent: usize) -> Result<Polynomial, PolynomialError> {
        let mut result = Polynomial::constant(Complex64::new(1.0, 0.0));
        for _ in 0..exponent {
            result = result.mul(self)?;
        }
        Ok(result)
    }

    /**
     * Computes the distinct roots of the polynomial, each reported once.
     *
     * Repeated roots are first removed by dividing out `gcd(p, p')`, since
     * simultaneous iteration only converges slowly onto a cluster and leaves
     * several slightly different copies of the same root. Linear polynomials
     * are then solved in closed form. Higher degrees use the Durand-Kerner
     * (Weierstrass) simultaneous iteration on the monic polynomial, seeded on
     * a circle whose radius is the Cauchy bound.
     *
     * The returned roots are ordered by argument on (-pi, pi], then by
     * magnitude. This ordering is stable for a given polynomial and is used
     * downstream as the root-index-to-color mapping.
     */
    pub fn roots(&self, params: &RootSolverParams) -> Result<Vec<Complex64>, PolynomialError> {
        let n = self.degree();
        if n == 0 {
            return Err(PolynomialError::NoRoots(if self.is_zero() {
                "the zero polynomial has no isolated roots".to_owned()
            } else {
                "constant polynomial".to_owned()
            }));
        }

        let monic = self.square_free_part(params.multiplicity_tolerance).monic();
        if monic.degree() < n {
            log::debug!(
                "Removed repeated roots: degree {} reduced to {}",
                n,
                monic.degree()
            );
        }

        let mut roots = if monic.degree() == 1 {
            vec![-monic.coefficients[0]]
        } else {
            monic.durand_kerner(params)
        };

        clean_up_roots(&mut roots);
        Ok(roots)
    }

    /// Assumes `self` is monic with degree >= 2.
    fn durand_kerner(&self, params: &RootSolverParams) -> Vec<Complex64> {
        let n = self.degree();
        let cauchy_radius = 1.0
            + self.coefficients[..n]
                .iter()
                .map(|c| c.norm())
                .fold(0.0, f64::max);

        let mut roots: Vec<Complex64> = (0..n)
            .map(|k| {
                let angle = 2.0 * std::f64::consts::PI * (k as f64) / (n as f64)
                    + INITIAL_GUESS_ANGLE_OFFSET;
                Complex64::from_polar(cauchy_radius, angle)
            })
            .collect();

        for iteration in 0..params.max_iteration_count {
            let mut max_relative_step: f64 = 0.0;
            for k in 0..n {
                let z = roots[k];
                let mut denominator = Complex64::new(1.0, 0.0);
                for (j, &other) in roots.iter().enumerate() {
                    if j != k {
                        denominator *= z - other;
                    }
                }
                if denominator == Complex64::new(0.0, 0.0) {
                    // Two estimates collided; nudge instead of dividing by zero.
                    denominator = Complex64::new(f64::EPSILON, f64::EPSILON);
                }
                let step = self.evaluate(z) / denominator;
                roots[k] = z - step;
                max_relative_step = max_relative_step.max(step.norm() / (1.0 + roots[k].norm()));
            }

            if max_relative_step < params.tolerance {
                log::debug!(
                    "Durand-Kerner converged after {} sweeps (max relative step: {:e})",
                    iteration + 1,
                    max_relative_step
                );
                return roots;
            }
        }

        log::warn!(
            "Durand-Kerner did not converge within {} sweeps; using current root estimates",
            params.max_iteration_count
        );
        roots
    }
}

/// Snap numerically-zero components to exactly zero, then sort.
fn clean_up_roots(roots: &mut [Complex64]) {
    let scale = roots.iter().map(|z| z.norm()).fold(1.0, f64::max);
    let threshold = ROOT_SNAP_THRESHOLD * scale;
    for z in roots.iter_mut() {
        if z.re.abs() < threshold {
            z.re = 0.0;
        }
        if z.im.abs() < threshold {
            z.im = 0.0;
        }
    }
    roots.sort_by(|a, b| {
        a.arg()
            .total_cmp(&b.arg())
            .then(a.norm().total_cmp(&b.norm()))
    });
}
