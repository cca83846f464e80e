//! Persisted memo of parameter vector evaluations.

use crate::error::{SynResult, SynoptError};
use crate::evaluation::EvaluationResult;
use crate::params::ParameterVector;
use crate::util::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Engine time spent filling a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_seconds: u64,
    pub run_count: u64,
}

impl RunStats {
    pub fn add(&mut self, elapsed: Duration) {
        self.total_seconds += elapsed.as_secs_f64().round() as u64;
        self.run_count += 1;
    }

    pub fn average_seconds(&self) -> Option<f64> {
        if self.run_count == 0 {
            None
        } else {
            Some(self.total_seconds as f64 / self.run_count as f64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    params: ParameterVector,
    rmse: f64,
    ratio: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: Vec<CacheEntry>,
    #[serde(default)]
    stats: RunStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<Vec<ParameterVector>>,
}

/// Append-only mapping from parameter vector to its evaluation.
///
/// When bound to a path every [`ResultCache::record`] rewrites the file, so a
/// crash loses at most the evaluation in flight.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: BTreeMap<ParameterVector, EvaluationResult>,
    stats: RunStats,
    session: RunStats,
    history: Vec<Vec<ParameterVector>>,
    path: Option<PathBuf>,
}

impl ResultCache {
    /// A cache that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An empty cache that will persist to `path`, ignoring any existing file.
    pub fn create<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads `path` if it exists, otherwise starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> SynResult<Self> {
        match Self::load(path.as_ref()) {
            Err(SynoptError::PersistenceMissing(_)) => Ok(Self::create(path.as_ref())),
            other => other,
        }
    }

    /// Loads `path`; a missing file is [`SynoptError::PersistenceMissing`].
    pub fn load<P: AsRef<Path>>(path: P) -> SynResult<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SynoptError::PersistenceMissing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: CacheFile = serde_json::from_str(&content)?;
        let mut entries = BTreeMap::new();
        for e in file.entries {
            entries.insert(e.params, EvaluationResult::new(e.rmse, e.ratio));
        }

        debug!("Loaded {} cached results from {}", entries.len(), path.display());
        Ok(Self {
            entries,
            stats: file.stats,
            session: RunStats::default(),
            history: file.history,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, params: &ParameterVector) -> Option<EvaluationResult> {
        self.entries.get(params).copied()
    }

    pub fn contains(&self, params: &ParameterVector) -> bool {
        self.entries.contains_key(params)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterVector, &EvaluationResult)> {
        self.entries.iter()
    }

    /// Cumulative statistics across every run that used this file.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Statistics of this process only.
    pub fn session_stats(&self) -> RunStats {
        self.session
    }

    pub fn history(&self) -> &[Vec<ParameterVector>] {
        &self.history
    }

    /// Stores a fresh evaluation and checkpoints. An existing entry is kept.
    pub fn record(
        &mut self,
        params: ParameterVector,
        result: EvaluationResult,
        elapsed: Duration,
    ) -> SynResult<()> {
        if self.entries.contains_key(&params) {
            warn!("Ignoring second evaluation of {}", params);
            return Ok(());
        }

        self.entries.insert(params, result);
        self.stats.add(elapsed);
        self.session.add(elapsed);
        self.save()
    }

    /// Appends one generation's population and checkpoints.
    pub fn push_generation(&mut self, population: Vec<ParameterVector>) -> SynResult<()> {
        self.history.push(population);
        self.save()
    }

    /// Entries sorted ascending by `score`; ties keep vector order.
    pub fn ranked_by<F>(&self, score: F) -> Vec<(ParameterVector, EvaluationResult)>
    where
        F: Fn(&EvaluationResult) -> f64,
    {
        let mut scored: Vec<(f64, ParameterVector, EvaluationResult)> = self
            .entries
            .iter()
            .map(|(p, r)| (score(r), *p, *r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().map(|(_, p, r)| (p, r)).collect()
    }

    /// The `k` best vectors under `score`.
    pub fn top_by<F>(&self, k: usize, score: F) -> Vec<ParameterVector>
    where
        F: Fn(&EvaluationResult) -> f64,
    {
        self.ranked_by(score)
            .into_iter()
            .take(k)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn best_by<F>(&self, score: F) -> Option<(ParameterVector, EvaluationResult)>
    where
        F: Fn(&EvaluationResult) -> f64,
    {
        self.entries
            .iter()
            .map(|(p, r)| (score(r), *p, *r))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p, r)| (p, r))
    }

    /// Writes the full cache if it is bound to a path.
    pub fn save(&self) -> SynResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = CacheFile {
            entries: self
                .entries
                .iter()
                .map(|(p, r)| CacheEntry {
                    params: *p,
                    rmse: r.rmse,
                    ratio: r.ratio,
                })
                .collect(),
            stats: self.stats,
            history: self.history.clone(),
        };

        atomic_write(path, serde_json::to_vec(&file)?)?;
        debug!("💾 Checkpointed {} results to {}", self.entries.len(), path.display());
        Ok(())
    }
}
