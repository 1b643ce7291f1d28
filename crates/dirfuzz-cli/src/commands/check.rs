use std::process::ExitCode;

use dirfuzz_config::FuzzConfig;
use dirfuzz_core::Roots;
use tracing::error;

use crate::EXIT_SETUP;

/// Report every configuration problem, then inspect the roots.
pub fn run(config: &FuzzConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let errors = config.validate();
    if !errors.is_empty() {
        for err in &errors {
            error!("{}", err);
            eprintln!("config: {}", err);
        }
        return Ok(ExitCode::from(EXIT_SETUP));
    }

    let roots = Roots::from_config(config)?;
    if let Err(err) = roots.validate() {
        error!("{}", err);
        eprintln!("setup: {}", err);
        return Ok(ExitCode::from(EXIT_SETUP));
    }

    println!(
        "ok: reference={} primary={} alternate={}",
        roots.reference.display(),
        roots.primary.display(),
        roots.alternate.display()
    );
    Ok(ExitCode::SUCCESS)
}
