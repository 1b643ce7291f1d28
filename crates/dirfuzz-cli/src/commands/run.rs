use std::path::PathBuf;
use std::process::ExitCode;

use dirfuzz_config::FuzzConfig;
use dirfuzz_core::{FuzzError, Fuzzer, RunSummary, SetupError};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::{EXIT_DIVERGENCE, EXIT_SETUP};

pub async fn run(
    config: FuzzConfig,
    config_path: Option<PathBuf>,
    print_summary: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Err(err) = config.validate_or_err() {
        error!("{}", err);
        eprintln!("config: {}", err);
        return Ok(ExitCode::from(EXIT_SETUP));
    }
    if config.run.instances > 1 {
        return supervise(config, config_path).await;
    }

    let iterations = config.run.iterations;
    let outcome = tokio::task::spawn_blocking(
        move || -> Result<(Result<RunSummary, FuzzError>, RunSummary), SetupError> {
            let mut fuzzer = Fuzzer::from_config(&config)?;
            info!(
                seed = fuzzer.seed(),
                subtree = %fuzzer.targets().subtree,
                iterations,
                "Fuzzer ready"
            );
            let result = fuzzer.run(iterations);
            Ok((result, fuzzer.summary()))
        },
    )
    .await?;

    let (result, summary) = match outcome {
        Ok(done) => done,
        Err(err) => return Ok(setup_fault(&err)),
    };
    match result {
        Ok(summary) => {
            println!(
                "completed {} iterations, zero divergences",
                summary.iterations
            );
            if print_summary {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(FuzzError::Divergence(report)) => {
            error!(
                iteration = report.iteration,
                action = %report.action,
                seed = summary.seed,
                "{}",
                report
            );
            println!("{}", report.to_json());
            if print_summary {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(ExitCode::from(EXIT_DIVERGENCE))
        }
        Err(FuzzError::Setup(err)) => Ok(setup_fault(&err)),
    }
}

fn setup_fault(err: &SetupError) -> ExitCode {
    error!("{}", err);
    eprintln!("setup: {}", err);
    ExitCode::from(EXIT_SETUP)
}

/// Command line for one child instance: the same config file, the resolved
/// roots, a single instance with its own seed and a random subtree.
fn child_args(config: &FuzzConfig, config_path: Option<&PathBuf>, seed: u64) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args.push("run".to_string());
    for (flag, value) in [
        ("--reference", &config.targets.reference),
        ("--primary", &config.targets.primary),
        ("--alternate", &config.targets.alternate),
    ] {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }
    args.extend([
        "--iterations".to_string(),
        config.run.iterations.to_string(),
        "--instances".to_string(),
        "1".to_string(),
        "--seed".to_string(),
        seed.to_string(),
    ]);
    args
}

/// Run every instance as its own process and wait for all of them. A
/// divergence in any instance outranks setup faults in the others.
async fn supervise(
    config: FuzzConfig,
    config_path: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let exe = std::env::current_exe()?;
    let base_seed = config.run.seed.unwrap_or_else(rand::random);
    info!(
        instances = config.run.instances,
        base_seed, "Starting fuzzer instances"
    );

    let mut children = Vec::with_capacity(config.run.instances);
    for instance in 0..config.run.instances {
        let seed = base_seed.wrapping_add(instance as u64);
        let child = Command::new(&exe)
            .args(child_args(&config, config_path.as_ref(), seed))
            .kill_on_drop(true)
            .spawn()?;
        info!(instance, seed, pid = child.id(), "Spawned fuzzer instance");
        children.push((instance, seed, child));
    }

    let mut diverged = false;
    let mut faulted = false;
    for (instance, seed, mut child) in children {
        let status = child.wait().await?;
        match status.code() {
            Some(0) => info!(instance, seed, "Instance completed"),
            Some(code) if code == i32::from(EXIT_DIVERGENCE) => {
                warn!(instance, seed, "Instance halted on a divergence");
                diverged = true;
            }
            _ => {
                warn!(instance, seed, %status, "Instance failed");
                faulted = true;
            }
        }
    }

    Ok(if diverged {
        ExitCode::from(EXIT_DIVERGENCE)
    } else if faulted {
        ExitCode::from(EXIT_SETUP)
    } else {
        ExitCode::SUCCESS
    })
}
