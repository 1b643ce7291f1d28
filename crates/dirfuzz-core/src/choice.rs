//! Random argument selection. Everything here draws from an injected RNG so
//! a seed fully determines the chosen names and buffers.

use std::ops::RangeInclusive;

use dirfuzz_config::{NamePolicyKind, NamesConfig};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::tracker::DirectoryTracker;

const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// How an action picks the entry name it operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// Uniform over every tracked name plus one fresh name, so the chance of
    /// a fresh name shrinks as the directory fills up.
    Uniform,
    /// Tracked name with weight `reuse`, fresh name with weight `fresh`.
    Weighted { reuse: u32, fresh: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePicker {
    policy: NamePolicy,
    lengths: RangeInclusive<usize>,
}

impl Default for NamePicker {
    fn default() -> Self {
        NamePicker::from_config(&NamesConfig::default())
    }
}

impl NamePicker {
    pub fn new(policy: NamePolicy, lengths: RangeInclusive<usize>) -> Self {
        NamePicker { policy, lengths }
    }

    pub fn from_config(config: &NamesConfig) -> Self {
        let policy = match config.policy {
            NamePolicyKind::Uniform => NamePolicy::Uniform,
            NamePolicyKind::Weighted => NamePolicy::Weighted {
                reuse: config.reuse_weight,
                fresh: config.fresh_weight,
            },
        };
        let min = config.min_len.max(1);
        NamePicker::new(policy, min..=config.max_len.max(min))
    }

    pub fn policy(&self) -> NamePolicy {
        self.policy
    }

    /// A tracked name or a fresh one, according to the policy.
    pub fn pick<R: Rng>(&self, rng: &mut R, tracker: &DirectoryTracker) -> String {
        let names = tracker.names();
        if names.is_empty() {
            return self.fresh(rng);
        }
        let reuse = match self.policy {
            NamePolicy::Uniform => rng.gen_range(0..=names.len()) < names.len(),
            NamePolicy::Weighted { reuse, fresh } => {
                let total = u64::from(reuse) + u64::from(fresh);
                total > 0 && rng.gen_range(0..total) < u64::from(reuse)
            }
        };
        match names.choose(rng) {
            Some(name) if reuse => (*name).to_string(),
            _ => self.fresh(rng),
        }
    }

    /// A random lowercase alphanumeric name.
    pub fn fresh<R: Rng>(&self, rng: &mut R) -> String {
        let len = rng.gen_range(self.lengths.clone());
        (0..len)
            .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
            .collect()
    }
}

pub fn random_buf<R: Rng>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rng.fill(buf.as_mut_slice());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::EntryKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tracker_with(names: &[&str]) -> DirectoryTracker {
        let mut tracker = DirectoryTracker::new();
        for (i, name) in names.iter().enumerate() {
            tracker.insert(name, EntryKind::File, i as u64);
        }
        tracker
    }

    #[test]
    fn test_fresh_names_respect_length_and_charset() {
        let picker = NamePicker::new(NamePolicy::Uniform, 3..=5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            let name = picker.fresh(&mut rng);
            assert!((3..=5).contains(&name.len()), "{}", name);
            assert!(name.bytes().all(|b| NAME_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_empty_tracker_always_fresh() {
        let picker = NamePicker::new(NamePolicy::Weighted { reuse: 100, fresh: 1 }, 8..=8);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let tracker = DirectoryTracker::new();
        for _ in 0..20 {
            assert_eq!(picker.pick(&mut rng, &tracker).len(), 8);
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let picker = NamePicker::default();
        let tracker = tracker_with(&["a", "b", "c"]);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..50)
                .map(|_| picker.pick(&mut rng, &tracker))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
    }

    #[test]
    fn test_uniform_policy_mostly_reuses_with_many_names() {
        let names: Vec<String> = (0..9).map(|i| format!("n{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tracker = tracker_with(&refs);
        // Fresh names are 12 characters, tracked ones 2.
        let picker = NamePicker::new(NamePolicy::Uniform, 12..=12);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let picks = 2000;
        let reused = (0..picks)
            .filter(|_| tracker.contains(&picker.pick(&mut rng, &tracker)))
            .count();
        // Expected 9/10 reuse.
        assert!(reused > picks * 8 / 10 && reused < picks * 98 / 100, "{}", reused);
    }

    #[test]
    fn test_weighted_policy_extremes() {
        let tracker = tracker_with(&["only"]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let never_reuse = NamePicker::new(NamePolicy::Weighted { reuse: 0, fresh: 1 }, 6..=6);
        for _ in 0..50 {
            assert_ne!(never_reuse.pick(&mut rng, &tracker), "only");
        }

        let always_reuse = NamePicker::new(NamePolicy::Weighted { reuse: 1, fresh: 0 }, 6..=6);
        for _ in 0..50 {
            assert_eq!(always_reuse.pick(&mut rng, &tracker), "only");
        }
    }

    #[test]
    fn test_from_config() {
        let config = NamesConfig {
            policy: NamePolicyKind::Weighted,
            reuse_weight: 2,
            fresh_weight: 5,
            min_len: 4,
            max_len: 6,
        };
        let picker = NamePicker::from_config(&config);
        assert_eq!(picker.policy(), NamePolicy::Weighted { reuse: 2, fresh: 5 });
    }

    #[test]
    fn test_random_buf_len() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(random_buf(&mut rng, 100).len(), 100);
        assert!(random_buf(&mut rng, 0).is_empty());
    }
}
