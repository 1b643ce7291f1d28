use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dirfuzz_config::FuzzConfig;

mod commands;
mod logging;

/// Exit code for a run that halted on a divergence.
pub const EXIT_DIVERGENCE: u8 = 1;
/// Exit code for setup faults and configuration errors.
pub const EXIT_SETUP: u8 = 2;

#[derive(Parser)]
#[command(name = "dirfuzz", version, about = "Differential filesystem fuzzer")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuzz the system under test against the reference
    Run(RunArgs),
    /// Validate the configuration and the three roots without fuzzing
    Check(TargetArgs),
    /// Show effective configuration
    Config(TargetArgs),
}

/// Root overrides shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Reference filesystem root (ground truth)
    #[arg(long)]
    pub reference: Option<String>,
    /// Primary mount path of the system under test
    #[arg(long)]
    pub primary: Option<String>,
    /// Alternate mount path of the system under test (defaults to primary)
    #[arg(long)]
    pub alternate: Option<String>,
}

impl TargetArgs {
    fn apply(&self, config: &mut FuzzConfig) {
        if let Some(reference) = &self.reference {
            config.targets.reference = Some(reference.clone());
        }
        if let Some(primary) = &self.primary {
            config.targets.primary = Some(primary.clone());
        }
        if let Some(alternate) = &self.alternate {
            config.targets.alternate = Some(alternate.clone());
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub targets: TargetArgs,
    /// Number of actions per instance
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,
    /// Number of parallel fuzzer processes
    #[arg(short = 'j', long)]
    pub instances: Option<usize>,
    /// Seed for the random source (random when omitted)
    #[arg(short, long)]
    pub seed: Option<u64>,
    /// Fixed subtree name instead of a random one
    #[arg(long)]
    pub subtree: Option<String>,
    /// Print the run summary as JSON on completion
    #[arg(long)]
    pub summary: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut FuzzConfig) {
        self.targets.apply(config);
        if let Some(iterations) = self.iterations {
            config.run.iterations = iterations;
        }
        if let Some(instances) = self.instances {
            config.run.instances = instances;
        }
        if let Some(seed) = self.seed {
            config.run.seed = Some(seed);
        }
        if let Some(subtree) = &self.subtree {
            config.run.subtree = Some(subtree.clone());
        }
    }
}

fn find_config() -> Option<PathBuf> {
    // 1. DIRFUZZ_CONFIG environment variable
    if let Ok(path) = std::env::var("DIRFUZZ_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. dirfuzz.yaml in current directory
    let cwd_config = PathBuf::from("dirfuzz.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/dirfuzz/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/dirfuzz/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// The config file (if any) overlaid with command-line flags, with defaults
/// applied. Flags alone are enough when no file exists.
fn load_config(
    explicit: Option<PathBuf>,
    command: &Commands,
) -> Result<(FuzzConfig, Option<PathBuf>), Box<dyn std::error::Error>> {
    let path = explicit.or_else(find_config);
    let mut config = match &path {
        Some(path) => FuzzConfig::from_file(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => FuzzConfig::default(),
    };
    match command {
        Commands::Run(args) => args.apply(&mut config),
        Commands::Check(targets) | Commands::Config(targets) => targets.apply(&mut config),
    }
    config.apply_defaults();
    Ok((config, path))
}

async fn run_cli(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (config, config_path) = load_config(cli.config, &cli.command)?;

    match cli.command {
        Commands::Config(_) => {
            commands::config::run(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check(_) => {
            logging::init_logging(&config.logging)?;
            commands::check::run(&config)
        }
        Commands::Run(args) => {
            logging::init_logging(&config.logging)?;
            commands::run::run(config, config_path, args.summary).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(EXIT_SETUP)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_override_config() {
        let cli = Cli::parse_from([
            "dirfuzz",
            "run",
            "--reference",
            "/ref",
            "--primary",
            "/sut",
            "-n",
            "25",
            "--seed",
            "9",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = FuzzConfig::default();
        config.run.iterations = 1000;
        args.apply(&mut config);
        config.apply_defaults();

        assert_eq!(config.targets.reference.as_deref(), Some("/ref"));
        assert_eq!(config.targets.alternate.as_deref(), Some("/sut"));
        assert_eq!(config.run.iterations, 25);
        assert_eq!(config.run.seed, Some(9));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["dirfuzz", "check", "--config", "/etc/dirfuzz.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dirfuzz.yaml")));
        assert!(matches!(cli.command, Commands::Check(_)));
    }
}
