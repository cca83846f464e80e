//! End-to-end tuning procedures built on the optimizer: cross-validated
//! training, temporal (online) training and hyperparameter sweeps, plus the
//! per-type export of a whole dataset.

pub mod export;
pub mod folds;
pub mod online;
pub mod sweep;

use crate::cache::ResultCache;
use crate::config::DataSource;
use crate::engine::EngineFactory;
use crate::error::SynResult;
use crate::evaluation::EstimationMode;
use crate::optimizer::{Criterion, OptimizerContext};
use std::path::PathBuf;
use tracing::warn;

pub const CROSS_SAVE_ROOT: &str = "saves";
pub const ONLINE_SAVE_ROOT: &str = "saves_running";

/// A dataset and ship type together with where its results are persisted.
#[derive(Debug, Clone)]
pub struct Study {
    pub data: DataSource,
    pub save_root: PathBuf,
    pub mode: EstimationMode,
    pub seed: Option<u64>,
}

impl Study {
    pub fn new(data: DataSource, save_root: impl Into<PathBuf>) -> Self {
        Self {
            data,
            save_root: save_root.into(),
            mode: EstimationMode::default(),
            seed: None,
        }
    }

    /// `{save_root}/{dataset}/type{ship}`
    pub fn save_dir(&self) -> PathBuf {
        self.save_root
            .join(&self.data.dataset)
            .join(format!("type{}", self.data.ship_type))
    }

    /// Training results of one held-out part, `{fcode}{part}.json`.
    /// An empty part names the unpartitioned cache used by sweeps.
    pub fn cache_path(&self, part: &str) -> PathBuf {
        self.save_dir()
            .join(format!("{}{}.json", self.data.fcode, part))
    }

    pub fn eval_path(&self, part: &str) -> PathBuf {
        self.save_dir()
            .join(format!("eval_{}{}.json", self.data.fcode, part))
    }

    pub fn segment_path(&self, segment: &str) -> PathBuf {
        self.save_dir().join(format!("{}.json", segment))
    }

    pub fn segment_eval_path(&self, segment: &str) -> PathBuf {
        self.save_dir().join(format!("{}_eval.json", segment))
    }

    /// Opens an engine over `sources`, hands a context to `body` and closes
    /// the engine on every exit path. The cache comes back with the value.
    pub fn session<F, T, B>(
        &self,
        factory: &F,
        sources: &[PathBuf],
        cache: ResultCache,
        criterion: Criterion,
        body: B,
    ) -> SynResult<(T, ResultCache)>
    where
        F: EngineFactory,
        B: FnOnce(&mut OptimizerContext<F::Engine>) -> SynResult<T>,
    {
        let engine = factory.open(sources)?;
        let mut ctx = OptimizerContext::new(engine, cache, criterion, self.seed).with_mode(self.mode);

        let outcome = body(&mut ctx);
        let (cache, engine) = ctx.into_parts();
        let closed = factory.close(engine);

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok((value, cache)),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("⚠️  Engine teardown also failed: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_layout() {
        let study = Study::new(DataSource::new("data", "brest", "30", "month"), CROSS_SAVE_ROOT);
        assert_eq!(study.cache_path("4"), PathBuf::from("saves/brest/type30/month4.json"));
        assert_eq!(study.eval_path("4"), PathBuf::from("saves/brest/type30/eval_month4.json"));
        assert_eq!(study.cache_path(""), PathBuf::from("saves/brest/type30/month.json"));
        assert_eq!(
            study.segment_eval_path("april"),
            PathBuf::from("saves/brest/type30/april_eval.json")
        );
    }
}
