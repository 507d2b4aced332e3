use clap::Parser;
use newton_fractal::cli::args::NewtonFractalArgs;
use newton_fractal::cli::render::{init_logging, render_from_args};

fn main() {
    let args = NewtonFractalArgs::parse();
    init_logging(args.logging.verbose);

    if let Err(error) = render_from_args(&args) {
        eprintln!("ERROR:  {}", error);
        std::process::exit(1);
    }
}
