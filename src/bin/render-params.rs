use clap::Parser;
use newton_fractal::cli::args::RenderParamsArgs;
use newton_fractal::cli::render::{init_logging, render_from_params_file};

/// Renders a Newton fractal from a parameter file, e.g.:
/// ```sh
/// cargo run --release --bin render-params -- demos/cubic-roots-of-unity.json
/// ```
fn main() {
    let args = RenderParamsArgs::parse();
    init_logging(args.logging.verbose);

    if let Err(error) = render_from_params_file(&args) {
        eprintln!("ERROR:  {}", error);
        std::process::exit(1);
    }
}
