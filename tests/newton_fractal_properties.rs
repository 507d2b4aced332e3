use approx::assert_relative_eq;
use newton_fractal::core::image_utils::{ImageSpecification, PixelMapper};
use newton_fractal::core::polynomial::RootSolverParams;
use newton_fractal::fractals::newtons_method::{
    compute_fractal_field, NewtonsMethodSystem, ITERATION_COUNT_DAMPING,
};
use newton_fractal::fractals::newtons_method_core::{
    classify, nearest_root_index, ComplexFunctionWithSlope, FunctionAndSlope,
};
use num::complex::Complex64;
use ordered_float::OrderedFloat;
use std::collections::BTreeSet;

fn system(expression: &str) -> NewtonsMethodSystem {
    NewtonsMethodSystem::from_expression(expression, &RootSolverParams::default()).unwrap()
}

#[test]
fn test_cubic_roots_are_on_the_unit_circle() {
    let cubic = system("x**3-1");
    assert_eq!(cubic.roots.len(), 3);
    for (i, a) in cubic.roots.iter().enumerate() {
        assert_relative_eq!(a.norm(), 1.0, epsilon = 1e-10);
        for b in cubic.roots.iter().skip(i + 1) {
            assert_relative_eq!((a - b).norm(), 3f64.sqrt(), epsilon = 1e-10);
        }
    }
}

#[test]
fn test_classify_converged_points_are_roots() {
    let quartic = system("x**4 - 1");
    let pixel_mapper = PixelMapper::new(&ImageSpecification::unit_square(9));
    for row in 0..9 {
        for col in 0..9 {
            let result = classify(&quartic, pixel_mapper.map(row, col), 200, 1e-12);
            if result.iteration_count < 200 && quartic.slope(result.root) != Complex64::new(0.0, 0.0) {
                assert!(quartic.value(result.root).norm() < 1e-9);
            }
        }
    }
}

#[test]
fn test_classify_without_roots_runs_to_exhaustion() {
    let shifted_exp = FunctionAndSlope {
        function: |z: Complex64| 2.0 * z.exp(),
        derivative: |z: Complex64| 2.0 * z.exp(),
    };
    for max_iteration_count in [1, 7, 25] {
        let result = classify(&shifted_exp, Complex64::new(0.1, -0.3), max_iteration_count, 1e-6);
        assert_eq!(result.iteration_count, max_iteration_count);
    }
}

#[test]
fn test_duplicate_roots_map_to_first_index() {
    let r = Complex64::new(-0.25, 0.75);
    for point in [Complex64::new(0.0, 0.0), r, Complex64::new(10.0, -4.0)] {
        assert_eq!(nearest_root_index(point, &[r, r]), 0);
    }
}

#[test]
fn test_cubic_field_bounds() {
    let cubic = system("x**3-1");
    let field = compute_fractal_field(
        &cubic,
        &cubic.roots,
        &ImageSpecification::unit_square(3),
        5,
        1e-3,
    );
    let upper_bound = 2.0 + 5.0 * ITERATION_COUNT_DAMPING;
    assert_eq!(field.values.len(), 3);
    for row in field.values.iter() {
        assert_eq!(row.len(), 3);
        for &value in row {
            assert!((0.0..=upper_bound).contains(&value));
            assert!((value.floor() as usize) < cubic.roots.len());
        }
    }
}

#[test]
fn test_every_basin_of_the_cubic_is_visited() {
    let cubic = system("x**3-1");
    let field = compute_fractal_field(
        &cubic,
        &cubic.roots,
        &ImageSpecification::unit_square(41),
        40,
        1e-6,
    );
    let root_indices: BTreeSet<usize> = field
        .values
        .iter()
        .flatten()
        .map(|v| v.floor() as usize)
        .collect();
    assert_eq!(root_indices, BTreeSet::from([0, 1, 2]));

    // Shading by iteration count produces many distinct values, not just one per basin.
    let distinct_values: BTreeSet<OrderedFloat<f64>> =
        field.values.iter().flatten().map(|&v| OrderedFloat(v)).collect();
    assert!(distinct_values.len() > 3);
}

#[test]
fn test_repeated_root_has_a_single_basin() {
    let double_root = system("(x-1)**2*(x+1)");
    assert_eq!(double_root.roots.len(), 2);

    let field = compute_fractal_field(
        &double_root,
        &double_root.roots,
        &ImageSpecification::unit_square(41),
        60,
        1e-6,
    );
    let root_indices: BTreeSet<usize> = field
        .values
        .iter()
        .flatten()
        .map(|v| v.floor() as usize)
        .collect();
    assert_eq!(root_indices, BTreeSet::from([0, 1]));
}

#[test]
fn test_field_is_bit_identical_across_runs() {
    let quintic = system("(x - I)*(x**4 + 2*x - 0.5*I)");
    let image_specification = ImageSpecification::unit_square(31);
    let first = compute_fractal_field(&quintic, &quintic.roots, &image_specification, 30, 1e-5);
    let second = compute_fractal_field(&quintic, &quintic.roots, &image_specification, 30, 1e-5);
    let first_bits: Vec<u64> = first.values.iter().flatten().map(|v| v.to_bits()).collect();
    let second_bits: Vec<u64> = second.values.iter().flatten().map(|v| v.to_bits()).collect();
    assert_eq!(first_bits, second_bits);
    assert_eq!(first.digest(), second.digest());
}

#[test]
fn test_grid_corners() {
    let pixel_mapper = PixelMapper::new(&ImageSpecification::unit_square(5));
    assert_eq!(pixel_mapper.map(0, 0), Complex64::new(-1.0, -1.0));
    assert_eq!(pixel_mapper.map(4, 0), Complex64::new(-1.0, 1.0));
    assert_eq!(pixel_mapper.map(0, 4), Complex64::new(1.0, -1.0));
    assert_eq!(pixel_mapper.map(4, 4), Complex64::new(1.0, 1.0));
}
