//! Puzzle catalog, loaded once at startup and shared read-only across rooms.

use crate::types::{Difficulty, Puzzle};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;

/// Immutable set of puzzles with uniform random selection (with replacement,
/// so repeats across rounds are fine).
pub struct PuzzleStore {
    puzzles: Vec<Arc<Puzzle>>,
}

impl PuzzleStore {
    /// Load puzzles from a JSON file of `{category, answer, difficulty}`
    /// records. A missing or malformed file is non-fatal: the built-in
    /// default set is used instead.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(store) => {
                tracing::info!("Loaded {} puzzles from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load puzzles from {}: {}. Using built-in set.",
                    path.display(),
                    e
                );
                Self::builtin()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let puzzles: Vec<Puzzle> = serde_json::from_str(&data)?;
        if puzzles.is_empty() {
            return Err("puzzle file is empty".into());
        }
        Ok(Self::new(puzzles))
    }

    /// An empty input degrades to the built-in set, so a store always has
    /// at least one puzzle.
    pub fn new(puzzles: Vec<Puzzle>) -> Self {
        if puzzles.is_empty() {
            return Self::builtin();
        }
        Self {
            puzzles: puzzles.into_iter().map(Arc::new).collect(),
        }
    }

    /// Minimal fallback set used when the puzzle file is unavailable.
    pub fn builtin() -> Self {
        Self::new(vec![
            Puzzle {
                category: "PHRASE".to_string(),
                answer: "A DIME A DOZEN".to_string(),
                difficulty: Difficulty::Easy,
            },
            Puzzle {
                category: "THING".to_string(),
                answer: "LAPTOP COMPUTER".to_string(),
                difficulty: Difficulty::Medium,
            },
        ])
    }

    /// Pick one puzzle uniformly at random.
    pub fn choose(&self, rng: &mut impl Rng) -> Arc<Puzzle> {
        // Constructors guarantee at least one puzzle.
        self.puzzles
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| unreachable!("puzzle store is never empty"))
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }
}
