//! Liveness challenges and random selection.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A primitive action the user can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    LookStraight,
    Blink,
    Smile,
    HeadShake,
}

impl Action {
    /// Prompt shown to the user while this action is pending.
    pub fn instruction(&self) -> &'static str {
        match self {
            Action::LookStraight => "Look straight at the camera",
            Action::Blink => "Blink your eyes",
            Action::Smile => "Smile",
            Action::HeadShake => "Shake your head left and right",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::LookStraight => "look-straight",
            Action::Blink => "blink",
            Action::Smile => "smile",
            Action::HeadShake => "head-shake",
        };
        f.write_str(name)
    }
}

/// The challenge currently presented to the user.
///
/// `kind` is the first action of `sequence` and selects the stability
/// threshold. `completed_actions` is always a prefix of `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub kind: Action,
    pub sequence: Vec<Action>,
    pub completed_actions: Vec<Action>,
}

impl Challenge {
    pub fn single(action: Action) -> Self {
        Self {
            kind: action,
            sequence: vec![action],
            completed_actions: Vec::new(),
        }
    }

    /// Build a challenge from an ordered action list. Returns `None` for an empty list.
    pub fn from_sequence(sequence: Vec<Action>) -> Option<Self> {
        let kind = *sequence.first()?;
        Some(Self {
            kind,
            sequence,
            completed_actions: Vec::new(),
        })
    }

    pub fn is_double(&self) -> bool {
        self.sequence.len() > 1
    }

    pub fn is_complete(&self) -> bool {
        self.completed_actions.len() == self.sequence.len()
    }

    /// Next action still to be performed, in sequence order.
    pub fn next_action(&self) -> Option<Action> {
        self.sequence.get(self.completed_actions.len()).copied()
    }
}

/// Pools of enabled challenges.
///
/// Disabled variants are simply left out of the lists; re-enabling head shake
/// or a double combination is a configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengePool {
    pub single: Vec<Action>,
    pub double: Vec<Vec<Action>>,
}

impl Default for ChallengePool {
    fn default() -> Self {
        Self {
            single: vec![Action::LookStraight, Action::Blink, Action::Smile],
            double: vec![vec![Action::Blink]],
        }
    }
}

impl ChallengePool {
    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.double.iter().all(|seq| seq.is_empty())
    }
}

/// Pick a challenge uniformly at random.
///
/// One of the two pools is chosen with equal probability (an empty pool is
/// skipped), then an entry within it. An entirely empty pool falls back to
/// look-straight so a session can always start.
pub fn select_random_challenge<R: Rng>(pool: &ChallengePool, rng: &mut R) -> Challenge {
    let doubles: Vec<&Vec<Action>> = pool.double.iter().filter(|seq| !seq.is_empty()).collect();

    let use_double = match (pool.single.is_empty(), doubles.is_empty()) {
        (true, true) => return Challenge::single(Action::LookStraight),
        (true, false) => true,
        (false, true) => false,
        (false, false) => rng.gen_bool(0.5),
    };

    if use_double {
        doubles
            .choose(rng)
            .and_then(|seq| Challenge::from_sequence(seq.to_vec()))
            .unwrap_or_else(|| Challenge::single(Action::LookStraight))
    } else {
        pool.single
            .choose(rng)
            .copied()
            .map(Challenge::single)
            .unwrap_or_else(|| Challenge::single(Action::LookStraight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_pool_never_yields_head_shake() {
        let pool = ChallengePool::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let c = select_random_challenge(&pool, &mut rng);
            assert_ne!(c.kind, Action::HeadShake);
            assert!(c.completed_actions.is_empty());
            assert_eq!(c.sequence.len(), 1);
        }
    }

    #[test]
    fn test_all_enabled_actions_reachable() {
        let pool = ChallengePool::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(select_random_challenge(&pool, &mut rng).kind);
        }
        assert!(seen.contains(&Action::LookStraight));
        assert!(seen.contains(&Action::Blink));
        assert!(seen.contains(&Action::Smile));
    }

    #[test]
    fn test_double_pool_only() {
        let pool = ChallengePool {
            single: vec![],
            double: vec![vec![Action::Blink, Action::HeadShake]],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let c = select_random_challenge(&pool, &mut rng);
        assert!(c.is_double());
        assert_eq!(c.kind, Action::Blink);
        assert_eq!(c.next_action(), Some(Action::Blink));
    }

    #[test]
    fn test_empty_pool_falls_back_to_look_straight() {
        let pool = ChallengePool {
            single: vec![],
            double: vec![vec![]],
        };
        assert!(pool.is_empty());
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            select_random_challenge(&pool, &mut rng),
            Challenge::single(Action::LookStraight)
        );
    }

    #[test]
    fn test_pool_deserializes_snake_case() {
        let pool: ChallengePool =
            serde_json::from_str(r#"{"single":["head_shake"],"double":[["blink","smile"]]}"#).unwrap();
        assert_eq!(pool.single, vec![Action::HeadShake]);
        assert_eq!(pool.double, vec![vec![Action::Blink, Action::Smile]]);
    }
}
