use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dirfuzz_config::FuzzConfig;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::actions::apply;
use crate::choice::NamePicker;
use crate::error::{FuzzError, SetupError};
use crate::ops::{generate, Action, IoSizes, Op};
use crate::oracle::Agreed;
use crate::report::DivergenceReport;
use crate::target::{random_subtree_name, Roots, SutPath, Targets};
use crate::tracker::DirectoryTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Halted,
}

/// Agreed outcomes per action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub seed: u64,
    pub subtree: String,
    pub iterations: usize,
    pub actions: BTreeMap<Action, ActionCounts>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub report: Option<DivergenceReport>,
}

/// One fuzzer instance: a single sequential control flow that owns its
/// tracker and random source.
pub struct Fuzzer {
    targets: Targets,
    tracker: DirectoryTracker,
    rng: ChaCha8Rng,
    seed: u64,
    picker: NamePicker,
    io: IoSizes,
    state: RunState,
    iteration: usize,
    counts: BTreeMap<Action, ActionCounts>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    report: Option<DivergenceReport>,
}

impl Fuzzer {
    pub fn new(targets: Targets, seed: u64) -> Self {
        Fuzzer {
            targets,
            tracker: DirectoryTracker::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            picker: NamePicker::default(),
            io: IoSizes::default(),
            state: RunState::Idle,
            iteration: 0,
            counts: BTreeMap::new(),
            started_at: None,
            finished_at: None,
            report: None,
        }
    }

    /// Resolve roots, pick the subtree and prepare it, all from `config`.
    /// A missing seed is drawn at random and reported in the summary.
    pub fn from_config(config: &FuzzConfig) -> Result<Self, SetupError> {
        let config = config.effective();
        let roots = Roots::from_config(&config)?;
        let seed = config.run.seed.unwrap_or_else(rand::random);
        let subtree = match &config.run.subtree {
            Some(subtree) => subtree.clone(),
            None => {
                // Independent stream, so the action sequence for a seed does
                // not depend on whether the subtree was fixed.
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(1);
                random_subtree_name(&mut rng, &config.run.subtree_prefix)
            }
        };
        let targets = Targets::prepare(&roots, &subtree)?;
        Ok(Fuzzer::new(targets, seed)
            .with_names(NamePicker::from_config(&config.names))
            .with_io(IoSizes::from(&config.io)))
    }

    pub fn with_names(mut self, picker: NamePicker) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_io(mut self, io: IoSizes) -> Self {
        self.io = io;
        self
    }

    /// Run `iterations` random actions, stopping at the first divergence.
    pub fn run(&mut self, iterations: usize) -> Result<RunSummary, FuzzError> {
        for _ in 0..iterations {
            let action = Action::choose(&mut self.rng);
            let op = generate(&mut self.rng, action, &self.tracker, &self.picker, self.io);
            self.step_with(op)?;
        }
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        info!(
            iterations = self.iteration,
            seed = self.seed,
            "Completed {} iterations, zero divergences",
            self.iteration
        );
        Ok(self.summary())
    }

    /// Execute a scripted operation through the path its iteration's parity
    /// selects.
    pub fn step_with(&mut self, op: Op) -> Result<Agreed<()>, FuzzError> {
        let path = SutPath::for_iteration(self.iteration + 1);
        self.step_on(op, path)
    }

    /// Execute a scripted operation through an explicit SUT path.
    pub fn step_on(&mut self, op: Op, path: SutPath) -> Result<Agreed<()>, FuzzError> {
        if let Some(report) = &self.report {
            return Err(FuzzError::Divergence(Box::new(report.clone())));
        }
        if self.state != RunState::Running {
            self.state = RunState::Running;
            self.started_at.get_or_insert_with(Utc::now);
        }
        self.iteration += 1;
        let action = op.action();
        info!("Starting action #{} - {}", self.iteration, action);

        match apply(&op, &self.targets, path, &mut self.tracker) {
            Ok(agreed) => {
                let counts = self.counts.entry(action).or_default();
                match agreed {
                    Agreed::Success(()) => counts.successes += 1,
                    Agreed::Failure(_) => counts.failures += 1,
                }
                Ok(agreed)
            }
            Err(mismatch) => {
                let report = DivergenceReport {
                    iteration: self.iteration,
                    action,
                    args: op.args(),
                    access_path: path,
                    reference_dir: self.targets.reference.clone(),
                    sut_dir: self.targets.sut(path).to_path_buf(),
                    reason: mismatch.reason,
                    reference: mismatch.reference,
                    sut: mismatch.sut,
                };
                warn!(
                    iteration = self.iteration,
                    action = %action,
                    reason = %report.reason,
                    "Divergence detected, halting run"
                );
                self.state = RunState::Halted;
                self.finished_at = Some(Utc::now());
                self.report = Some(report.clone());
                Err(report.into())
            }
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            state: self.state,
            seed: self.seed,
            subtree: self.targets.subtree.clone(),
            iterations: self.iteration,
            actions: self.counts.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            report: self.report.clone(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tracker(&self) -> &DirectoryTracker {
        &self.tracker
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fuzzer(tmp: &TempDir, seed: u64) -> Fuzzer {
        let reference = tmp.path().join("ref");
        let sut = tmp.path().join("sut");
        fs::create_dir(&reference).unwrap();
        fs::create_dir(&sut).unwrap();
        let targets = Targets::prepare(&Roots::new(reference, &sut, &sut), "sub").unwrap();
        Fuzzer::new(targets, seed)
    }

    #[test]
    fn test_state_transitions() {
        let tmp = TempDir::new().unwrap();
        let mut fuzzer = fuzzer(&tmp, 1);
        assert_eq!(fuzzer.state(), RunState::Idle);

        fuzzer.step_with(Op::List).unwrap();
        assert_eq!(fuzzer.state(), RunState::Running);

        let summary = fuzzer.run(10).unwrap();
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.iterations, 11);
        assert!(summary.started_at.is_some());
        assert!(summary.finished_at.is_some());
        assert!(summary.report.is_none());
    }

    #[test]
    fn test_counts_split_successes_and_failures() {
        let tmp = TempDir::new().unwrap();
        let mut fuzzer = fuzzer(&tmp, 2);
        let create = Op::CreateFile {
            name: "x".to_string(),
        };
        fuzzer.step_with(create.clone()).unwrap();
        fuzzer.step_with(create).unwrap();

        let counts = fuzzer.summary().actions[&Action::CreateFile];
        assert_eq!(counts, ActionCounts { successes: 1, failures: 1 });
    }

    #[test]
    fn test_halted_run_refuses_further_steps() {
        let tmp = TempDir::new().unwrap();
        let mut fuzzer = fuzzer(&tmp, 3);
        fs::write(fuzzer.targets().primary.join("stray"), b"").unwrap();

        let err = fuzzer.step_with(Op::List).unwrap_err();
        let FuzzError::Divergence(report) = err else {
            panic!("expected divergence");
        };
        assert_eq!(report.iteration, 1);
        assert_eq!(report.access_path, SutPath::Alternate);
        assert_eq!(fuzzer.state(), RunState::Halted);

        assert!(fuzzer.step_with(Op::List).is_err());
        assert_eq!(fuzzer.iteration(), 1);
        assert!(fuzzer.summary().report.is_some());
    }

    fn seeded_config(tmp: &TempDir, seed: u64) -> FuzzConfig {
        let reference = tmp.path().join("ref");
        let sut = tmp.path().join("sut");
        fs::create_dir(&reference).unwrap();
        fs::create_dir(&sut).unwrap();

        let mut config = FuzzConfig::default();
        config.targets.reference = Some(reference.display().to_string());
        config.targets.primary = Some(sut.display().to_string());
        config.run.seed = Some(seed);
        config
    }

    #[test]
    fn test_from_config_prepares_subtree() {
        let tmp = TempDir::new().unwrap();
        let a = Fuzzer::from_config(&seeded_config(&tmp, 77)).unwrap();
        assert_eq!(a.seed(), 77);
        assert!(a.targets().subtree.starts_with(dirfuzz_config::DEFAULT_SUBTREE_PREFIX));
        assert!(tmp.path().join("ref").join(&a.targets().subtree).is_dir());

        // Same seed on other roots picks the same subtree name.
        let other = TempDir::new().unwrap();
        let b = Fuzzer::from_config(&seeded_config(&other, 77)).unwrap();
        assert_eq!(a.targets().subtree, b.targets().subtree);
    }

    #[test]
    fn test_rerun_of_seed_on_same_roots_is_setup_fault() {
        let tmp = TempDir::new().unwrap();
        let config = seeded_config(&tmp, 42);
        let mut first = Fuzzer::from_config(&config).unwrap();
        first.run(200).unwrap();

        assert!(matches!(
            Fuzzer::from_config(&config),
            Err(SetupError::DirtySubtree { .. })
        ));
    }
}
