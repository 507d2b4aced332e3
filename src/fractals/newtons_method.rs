// Newton's method fractal: parameters, the polynomial system, the scalar
// field computed over the sampling grid, and the final render to an image.

use num::complex::Complex64;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

use crate::core::{
    color_map::{ColorMapError, ColorMapLookUpTable, ColorMapParams, ColorMapper},
    image_utils::{create_buffer, write_image_to_file, ImageSpecification, PixelMapper},
    polynomial::{Polynomial, PolynomialError, RootSolverParams},
    stopwatch::Stopwatch,
};

use super::newtons_method_core::{classify, nearest_root_index, ComplexFunctionWithSlope};

/// Weight of the iteration count in each field value. Root indices are whole
/// numbers, so different roots stay at least 1.0 apart as long as
/// `iteration_count * ITERATION_COUNT_DAMPING < 1.0`. Nothing clamps it.
pub const ITERATION_COUNT_DAMPING: f64 = 0.025;

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("grid resolution must be at least 1")]
    EmptyGrid,

    #[error("convergence tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("grid width must be positive and finite, got {0}")]
    InvalidWidth(f64),

    #[error("invalid color map: {0}")]
    ColorMap(#[from] ColorMapError),
}

/// Complete set of parameters for rendering a Newton's method fractal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewtonsMethodParams {
    /// Polynomial in `x`, for example `x**3 - 1`.
    pub expression: String,
    pub image_specification: ImageSpecification,
    pub max_iteration_count: u32,
    /// Newton's method stops once |x_{n+1} - x_n| < convergence_tolerance.
    pub convergence_tolerance: f64,
    #[serde(default)]
    pub root_solver: RootSolverParams,
    #[serde(default)]
    pub color_map: ColorMapParams,
}

impl NewtonsMethodParams {
    /// Parameters for the default [-1,1]x[-1,1] grid, as used by the command line.
    pub fn new(
        expression: &str,
        resolution: u32,
        max_iteration_count: u32,
        convergence_tolerance: f64,
    ) -> NewtonsMethodParams {
        NewtonsMethodParams {
            expression: expression.to_owned(),
            image_specification: ImageSpecification::unit_square(resolution),
            max_iteration_count,
            convergence_tolerance,
            root_solver: RootSolverParams::default(),
            color_map: ColorMapParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.image_specification.resolution == 0 {
            return Err(ParamsError::EmptyGrid);
        }
        if !(self.convergence_tolerance > 0.0 && self.convergence_tolerance.is_finite()) {
            return Err(ParamsError::InvalidTolerance(self.convergence_tolerance));
        }
        let width = self.image_specification.width;
        if !(width > 0.0 && width.is_finite()) {
            return Err(ParamsError::InvalidWidth(width));
        }
        ColorMapLookUpTable::from_params(&self.color_map)?;
        Ok(())
    }

    pub fn title(&self) -> String {
        format!("Newton fractal for {}", self.expression)
    }
}

/**
 * The function whose roots are being visualized, its derivative, and the
 * ordered set of roots. The index of each root in `roots` is its color class.
 */
#[derive(Debug, Clone)]
pub struct NewtonsMethodSystem {
    pub function: Polynomial,
    pub derivative: Polynomial,
    pub roots: Vec<Complex64>,
}

impl NewtonsMethodSystem {
    /// Parses `expression`, then computes its derivative and roots once.
    /// Fails if the expression is not a polynomial, or if it has no roots.
    pub fn from_expression(
        expression: &str,
        root_solver: &RootSolverParams,
    ) -> Result<NewtonsMethodSystem, PolynomialError> {
        let function = Polynomial::parse(expression)?;
        let derivative = function.derivative();
        let roots = function.roots(root_solver)?;
        log::info!(
            "Parsed `{}`: degree {} with roots {:?}",
            expression,
            function.degree(),
            roots
        );
        Ok(NewtonsMethodSystem {
            function,
            derivative,
            roots,
        })
    }
}

impl ComplexFunctionWithSlope for NewtonsMethodSystem {
    #[inline]
    fn value(&self, z: Complex64) -> Complex64 {
        self.function.evaluate(z)
    }

    #[inline]
    fn slope(&self, z: Complex64) -> Complex64 {
        self.derivative.evaluate(z)
    }
}

/**
 * Square matrix of per-cell values, stored row-major: `values[row][col]`.
 * Each value is `root_index + iteration_count * ITERATION_COUNT_DAMPING`.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct FractalField {
    pub values: Vec<Vec<f64>>,
}

impl FractalField {
    pub fn resolution(&self) -> usize {
        self.values.len()
    }

    /// `[min, max]` over all finite cells, or `None` if there are none.
    pub fn value_range(&self) -> Option<[f64; 2]> {
        self.values
            .iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold(None, |range, &v| match range {
                None => Some([v, v]),
                Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
            })
    }

    /// SHA-256 over the bit patterns of all cells, in row-major order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for value in self.values.iter().flatten() {
            hasher.update(value.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /**
     * Maps each cell through `color_map` after normalizing the field onto
     * [0,1] using its own minimum and maximum. A constant field maps to 0.
     * Row zero of the field becomes the top row of the image.
     */
    pub fn to_image<C: ColorMapper>(&self, color_map: &C) -> image::RgbImage {
        let [lo, hi] = self.value_range().unwrap_or([0.0, 0.0]);
        let span = hi - lo;
        let n = self.resolution() as u32;
        image::RgbImage::from_fn(n, n, |col, row| {
            let value = self.values[row as usize][col as usize];
            let query = if span > 0.0 { (value - lo) / span } else { 0.0 };
            color_map.compute_pixel(query as f32)
        })
    }
}

/**
 * Classifies every cell of the grid and builds the field. Rows are
 * distributed across the rayon thread pool; each cell depends only on its own
 * coordinates, so the result does not depend on the scheduling.
 */
pub fn compute_fractal_field<F>(
    function: &F,
    roots: &[Complex64],
    image_specification: &ImageSpecification,
    max_iteration_count: u32,
    convergence_tolerance: f64,
) -> FractalField
where
    F: ComplexFunctionWithSlope + Sync,
{
    assert!(!roots.is_empty(), "at least one root is required");
    let pixel_mapper = PixelMapper::new(image_specification);
    let mut values = create_buffer(0.0, image_specification.resolution);

    values.par_iter_mut().enumerate().for_each(|(row, cells)| {
        for (col, cell) in cells.iter_mut().enumerate() {
            let z0 = pixel_mapper.map(row as u32, col as u32);
            let result = classify(function, z0, max_iteration_count, convergence_tolerance);
            let root_index = nearest_root_index(result.root, roots);
            *cell = root_index as f64 + (result.iteration_count as f64) * ITERATION_COUNT_DAMPING;
        }
    });

    FractalField { values }
}

/// Summary of a completed render, used for the diagnostics file.
pub struct RenderDiagnostics {
    pub stopwatch: Stopwatch,
    pub system: NewtonsMethodSystem,
    pub field_range: Option<[f64; 2]>,
    pub field_digest: String,
}

impl RenderDiagnostics {
    pub fn display<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.stopwatch.display(writer)?;
        writeln!(writer, "Polynomial degree: {}", self.system.function.degree())?;
        writeln!(writer, "Roots:")?;
        for (index, root) in self.system.roots.iter().enumerate() {
            writeln!(writer, "  {}: {}", index, root)?;
        }
        match self.field_range {
            Some([lo, hi]) => writeln!(writer, "Field range: [{}, {}]", lo, hi)?,
            None => writeln!(writer, "Field range: (no finite values)")?,
        }
        writeln!(writer, "Field SHA-256: {}", self.field_digest)?;
        Ok(())
    }
}

/**
 * Renders the Newton's method fractal described by `params` and writes the
 * image to `output_path`. Errors from parsing, root finding, and image
 * encoding are all returned to the caller.
 */
pub fn render_newtons_method(
    params: &NewtonsMethodParams,
    output_path: &Path,
) -> Result<RenderDiagnostics, Box<dyn std::error::Error>> {
    let mut stopwatch = Stopwatch::new("Render Stopwatch");
    params.validate()?;

    let system = NewtonsMethodSystem::from_expression(&params.expression, &params.root_solver)?;
    let color_map = ColorMapLookUpTable::from_params(&params.color_map)?;
    stopwatch.record_split("parse expression and solve for roots");

    let field = compute_fractal_field(
        &system,
        &system.roots,
        &params.image_specification,
        params.max_iteration_count,
        params.convergence_tolerance,
    );
    stopwatch.record_split("compute fractal field");

    let image = field.to_image(&color_map);
    stopwatch.record_split("apply color map");

    write_image_to_file(output_path, &image, &params.title())?;
    stopwatch.record_split("write image");

    Ok(RenderDiagnostics {
        field_range: field.value_range(),
        field_digest: field.digest(),
        stopwatch,
        system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractals::newtons_method_core::assert_consistent_value_and_slope;
    use approx::assert_relative_eq;

    fn cubic_system() -> NewtonsMethodSystem {
        NewtonsMethodSystem::from_expression("x**3 - 1", &RootSolverParams::default()).unwrap()
    }

    #[test]
    fn derivative_matches_jacobian_cubic() {
        let system = cubic_system();
        for &z0 in &[
            Complex64::new(0.2, 0.8),
            Complex64::new(-1.3, 0.4),
            Complex64::new(2.0, -1.0),
        ] {
            assert_consistent_value_and_slope(&system, z0, 1e-8, 1e-7);
        }
    }

    #[test]
    fn test_system_requires_roots() {
        let result = NewtonsMethodSystem::from_expression("3", &RootSolverParams::default());
        assert!(matches!(result, Err(PolynomialError::NoRoots(_))));
    }

    #[test]
    fn test_field_values_for_cubic() {
        let system = cubic_system();
        let field = compute_fractal_field(
            &system,
            &system.roots,
            &ImageSpecification::unit_square(3),
            5,
            1e-3,
        );
        assert_eq!(field.resolution(), 3);
        for value in field.values.iter().flatten() {
            assert!((0.0..=2.125).contains(value), "value out of range: {value}");
            assert!(value.floor() < 3.0);
        }

        // The origin is a critical point of x^3 - 1: the iteration stops
        // immediately at index zero, so only the root index contributes.
        assert_eq!(field.values[1][1].fract(), 0.0);

        // z = 1 sits exactly on a root and converges on the first step.
        assert_eq!(field.values[1][2], 1.0);
    }

    #[test]
    fn test_field_is_deterministic() {
        let system = cubic_system();
        let image_specification = ImageSpecification::unit_square(17);
        let a = compute_fractal_field(&system, &system.roots, &image_specification, 20, 1e-6);
        let b = compute_fractal_field(&system, &system.roots, &image_specification, 20, 1e-6);
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_field_range_and_image() {
        let field = FractalField {
            values: vec![vec![0.0, 1.0], vec![2.0, f64::NAN]],
        };
        assert_eq!(field.value_range(), Some([0.0, 2.0]));

        let color_map = ColorMapLookUpTable::from_params(&ColorMapParams::default()).unwrap();
        let image = field.to_image(&color_map);
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(*image.get_pixel(0, 0), image::Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(0, 1), image::Rgb([0, 0, 255]));

        let constant = FractalField {
            values: vec![vec![1.5]],
        };
        let image = constant.to_image(&color_map);
        assert_eq!(*image.get_pixel(0, 0), image::Rgb([0, 255, 0]));
    }

    #[test]
    fn test_params_validation() {
        let params = NewtonsMethodParams::new("x**3-1", 10, 40, 1e-3);
        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.title(), "Newton fractal for x**3-1");

        let mut empty = params.clone();
        empty.image_specification.resolution = 0;
        assert_eq!(empty.validate(), Err(ParamsError::EmptyGrid));

        let mut bad_tolerance = params.clone();
        bad_tolerance.convergence_tolerance = 0.0;
        assert_eq!(
            bad_tolerance.validate(),
            Err(ParamsError::InvalidTolerance(0.0))
        );

        let mut bad_width = params.clone();
        bad_width.image_specification.width = -1.0;
        assert_eq!(bad_width.validate(), Err(ParamsError::InvalidWidth(-1.0)));

        let mut bad_color_map = params;
        bad_color_map.color_map.lookup_table_count = 0;
        assert!(matches!(
            bad_color_map.validate(),
            Err(ParamsError::ColorMap(_))
        ));
    }

    #[test]
    fn test_params_json_defaults() {
        let params: NewtonsMethodParams = serde_json::from_str(
            r#"{
                "expression": "x**4 - 1",
                "image_specification": { "resolution": 8 },
                "max_iteration_count": 30,
                "convergence_tolerance": 0.001
            }"#,
        )
        .unwrap();
        assert_eq!(params, NewtonsMethodParams::new("x**4 - 1", 8, 30, 1e-3));
        assert_relative_eq!(params.image_specification.width, 2.0);
    }
}
