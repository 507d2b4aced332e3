use clap::{Args, Parser};
use std::path::PathBuf;

/// Render the Newton fractal of a polynomial over the square [-1,1]x[-1,1].
///
/// Example:  newton-fractal x**3-1 200 40 0.001 cubic.png
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct NewtonFractalArgs {
    /// Polynomial in `x`, using `+ - * / ** ( )` and `I` for the imaginary unit.
    #[arg(allow_hyphen_values = true)]
    pub expression: String,

    /// Side length of the sampling grid, and so of the output image in pixels.
    pub densidad: u32,

    /// Maximum number of Newton-Raphson iterations per grid point.
    pub max_iterations: u32,

    /// Newton-Raphson stops once |x_{n+1} - x_n| < tolerance.
    pub tolerance: f64,

    /// Output image; the format is deduced from the extension (e.g. `.png`).
    pub output_path: PathBuf,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Render a Newton fractal from a JSON parameter file.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct RenderParamsArgs {
    pub params_path: String,

    /// Write into a time-stamped sub-directory of the output directory.
    #[clap(long, short)]
    pub date_time_out: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Debug, Args)]
pub struct LoggingArgs {
    /// Log progress to stderr; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_arg_definitions_are_consistent() {
        NewtonFractalArgs::command().debug_assert();
        RenderParamsArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_positional_args() {
        let args = NewtonFractalArgs::try_parse_from([
            "newton-fractal",
            "-x**2+1",
            "200",
            "40",
            "0.001",
            "out.png",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.expression, "-x**2+1");
        assert_eq!(args.densidad, 200);
        assert_eq!(args.max_iterations, 40);
        assert_eq!(args.tolerance, 0.001);
        assert_eq!(args.output_path, PathBuf::from("out.png"));
        assert_eq!(args.logging.verbose, 2);
    }

    #[test]
    fn test_wrong_argument_count_is_rejected() {
        assert!(NewtonFractalArgs::try_parse_from(["newton-fractal", "x**3-1", "200"]).is_err());
        assert!(NewtonFractalArgs::try_parse_from([
            "newton-fractal",
            "x**3-1",
            "200",
            "40",
            "0.001",
            "out.png",
            "extra"
        ])
        .is_err());
    }

    #[test]
    fn test_parse_render_params_args() {
        let args =
            RenderParamsArgs::try_parse_from(["render-params", "demos/cubic.json", "-d"]).unwrap();
        assert_eq!(args.params_path, "demos/cubic.json");
        assert!(args.date_time_out);
        assert_eq!(args.logging.verbose, 0);
    }
}
