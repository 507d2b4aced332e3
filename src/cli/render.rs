use std::io::Write;

use crate::cli::args::{NewtonFractalArgs, RenderParamsArgs};
use crate::core::file_io::{
    build_output_path_with_date_time, date_time_string, extract_base_name,
    maybe_date_time_string, serialize_to_json, FilePrefix,
};
use crate::fractals::newtons_method::{render_newtons_method, NewtonsMethodParams};

/// Installs a stderr log subscriber when `verbose > 0`; otherwise logging stays off.
pub fn init_logging(verbose: u8) {
    if verbose == 0 {
        return;
    }
    let level = if verbose > 1 {
        tracing_subscriber::filter::LevelFilter::TRACE
    } else {
        tracing_subscriber::filter::LevelFilter::DEBUG
    };
    tracing_subscriber::fmt::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    log::set_max_level(if verbose > 1 {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Debug
    });
}

/// Renders over [-1,1]x[-1,1] straight from the command line. Writes only the image.
pub fn render_from_args(args: &NewtonFractalArgs) -> Result<(), Box<dyn std::error::Error>> {
    let params = NewtonsMethodParams::new(
        &args.expression,
        args.densidad,
        args.max_iterations,
        args.tolerance,
    );
    log::debug!("{:?}", params);

    let diagnostics = render_newtons_method(&params, &args.output_path)?;
    println!(
        "INFO:  Rendered {}x{} grid in {:?}",
        args.densidad,
        args.densidad,
        diagnostics.stopwatch.total_elapsed()
    );
    Ok(())
}

/**
 * Renders from a JSON parameter file into `out/<params base name>/`, next to a
 * copy of the parameters and a diagnostics file.
 */
pub fn render_from_params_file(args: &RenderParamsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let params: NewtonsMethodParams =
        serde_json::from_str(&std::fs::read_to_string(&args.params_path)?)?;

    let file_prefix = FilePrefix {
        directory_path: build_output_path_with_date_time(
            &args.params_path,
            &maybe_date_time_string(args.date_time_out),
        )?,
        file_base: extract_base_name(&args.params_path).to_owned(),
    };

    serialize_to_json(&file_prefix.with_suffix(".json"), &params)?;
    let diagnostics = render_newtons_method(&params, &file_prefix.with_suffix(".png"))?;

    let mut diagnostics_file = file_prefix.create_file_with_suffix("_diagnostics.txt")?;
    writeln!(diagnostics_file, "Rendered at: {}", date_time_string())?;
    writeln!(diagnostics_file, "Expression: {}", params.expression)?;
    diagnostics.display(&mut diagnostics_file)?;
    diagnostics_file.flush()?;

    println!(
        "INFO:  Total render time: {:?}",
        diagnostics.stopwatch.total_elapsed()
    );
    Ok(())
}
