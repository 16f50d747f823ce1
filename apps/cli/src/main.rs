use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use idb_core::CoreEngine;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> ExitCode {
  let cli = cli::Cli::parse();
  init_logging(cli.verbose);

  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("mozidb: {e:#}");
      ExitCode::FAILURE
    }
  }
}

fn init_logging(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(verbose)
    .without_time()
    .init();
}

fn run(cli: &cli::Cli) -> Result<()> {
  let engine = CoreEngine::new(cli.core_options());
  let request = cli.resolve_request();

  if let Some(out) = &cli.export {
    let res = engine
      .export(&request, out)
      .with_context(|| format!("exporting to {}", out.display()))?;
    eprintln!("wrote {} records to {}", res.records_written, res.output_path);
    return Ok(());
  }

  let rendered = engine.run(&request, &cli.query)?;
  println!("{}", rendered.text);
  if rendered.decode_errors > 0 {
    bail!("{} value(s) could not be decoded", rendered.decode_errors);
  }
  Ok(())
}
