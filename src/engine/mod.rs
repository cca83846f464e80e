//! Bridge between parameter vectors and the external compression engine.

pub mod process;
pub mod records;
pub mod relabel;
pub mod rtec;
pub mod staging;

pub use self::process::{ProcessEngine, ProcessEngineFactory};
pub use self::records::{Annotation, EngineRecord, Reading};
pub use self::staging::SlotFiles;

use crate::error::SynResult;
use crate::evaluation::{estimate, EstimationMode, EvaluationResult};
use crate::params::ParameterVector;
use crate::trajectory::{NoiseAnnotation, TrajectorySet};
use std::path::PathBuf;

/// What one engine run yields for scoring.
#[derive(Debug, Clone, Default)]
pub struct EngineRun {
    pub reduced: TrajectorySet,
    pub noise: NoiseAnnotation,
}

/// The three parsed output streams of one engine run.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub critical: Vec<EngineRecord>,
    pub notifications: Vec<EngineRecord>,
    pub noise: Vec<EngineRecord>,
}

impl EngineOutput {
    /// Critical points plus gap notifications, per entity.
    pub fn reduced(&self) -> TrajectorySet {
        let mut set = TrajectorySet::new();
        for rec in self.critical.iter().chain(self.notifications.iter()) {
            set.push(&rec.id, rec.point());
        }
        set
    }

    pub fn noise_annotation(&self) -> NoiseAnnotation {
        let mut noise = NoiseAnnotation::new();
        for rec in &self.noise {
            noise.record(&rec.id, &rec.point());
        }
        noise
    }

    /// Merged records grouped by entity in order of first appearance,
    /// critical points before notifications within an entity.
    pub fn merged_records(&self) -> Vec<&EngineRecord> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: std::collections::HashMap<&str, Vec<&EngineRecord>> =
            std::collections::HashMap::new();

        for rec in self.critical.iter().chain(self.notifications.iter()) {
            let bucket = groups.entry(rec.id.as_str()).or_insert_with(|| {
                order.push(rec.id.as_str());
                Vec::new()
            });
            bucket.push(rec);
        }

        order
            .into_iter()
            .flat_map(|id| groups.remove(id).unwrap_or_default())
            .collect()
    }

    pub fn into_run(self) -> EngineRun {
        EngineRun {
            reduced: self.reduced(),
            noise: self.noise_annotation(),
        }
    }
}

/// An opaque function from parameters to a reduced trajectory set, bound to
/// one staged raw input.
pub trait SynopsesEngine {
    /// The raw trajectories the engine was staged with.
    fn raw(&self) -> &TrajectorySet;

    /// Runs the engine once (including its own retries) for `params`.
    fn run(&mut self, params: &ParameterVector) -> SynResult<EngineRun>;
}

impl<E: SynopsesEngine + ?Sized> SynopsesEngine for Box<E> {
    fn raw(&self) -> &TrajectorySet {
        (**self).raw()
    }

    fn run(&mut self, params: &ParameterVector) -> SynResult<EngineRun> {
        (**self).run(params)
    }
}

/// Opens engines over a set of input partitions and tears them down.
pub trait EngineFactory {
    type Engine: SynopsesEngine;

    fn open(&self, sources: &[PathBuf]) -> SynResult<Self::Engine>;

    fn close(&self, engine: Self::Engine) -> SynResult<()>;
}

/// Runs the engine and scores its output against the staged raw data.
pub fn evaluate_with<E: SynopsesEngine + ?Sized>(
    engine: &mut E,
    params: &ParameterVector,
    mode: EstimationMode,
) -> SynResult<EvaluationResult> {
    let run = engine.run(params)?;
    estimate(engine.raw(), &run.reduced, &run.noise, mode)
}
