#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use synopt::config::DataSource;
use synopt::engine::{EngineFactory, EngineRun, SynopsesEngine};
use synopt::error::{SynResult, SynoptError};
use synopt::params::{Parameter, ParameterVector};
use synopt::trajectory::{load_raw, NoiseAnnotation, TrajectoryPoint, TrajectorySet};
use synopt::workflows::Study;
use tempfile::TempDir;

pub const DATASET: &str = "brest";
pub const SHIP_TYPE: &str = "70";
pub const FCODE: &str = "month";

/// A wiggly eastbound track per vessel, one fix per minute.
pub fn fleet(vessels: usize, points: usize, offset: i64) -> Vec<(String, TrajectoryPoint)> {
    let mut out = Vec::with_capacity(vessels * points);
    for v in 0..vessels {
        for k in 0..points {
            let x = k as f64;
            out.push((
                format!("2270067{:02}", v),
                TrajectoryPoint::new(
                    -4.5 + 0.002 * x,
                    48.3 + 0.01 * v as f64 + 0.0005 * (0.7 * x).sin(),
                    offset + 60_000 * k as i64,
                ),
            ));
        }
    }
    out
}

pub fn fleet_set(vessels: usize, points: usize) -> TrajectorySet {
    fleet(vessels, points, 1_443_650_400_000).into_iter().collect()
}

/// Writes points in the AIS partition format.
pub fn write_points(path: &Path, points: &[(String, TrajectoryPoint)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(path).unwrap();
    for (id, p) in points {
        writeln!(f, "{} {} {} {} 0 0 5 0", p.t, id, p.lon, p.lat).unwrap();
    }
}

/// Keeps every `stride`-th point of each track plus its last point.
pub fn thin(raw: &TrajectorySet, stride: usize) -> TrajectorySet {
    let mut set = TrajectorySet::new();
    for (id, pts) in raw.iter() {
        for (i, p) in pts.iter().enumerate() {
            if i % stride == 0 || i + 1 == pts.len() {
                set.push(id, *p);
            }
        }
    }
    set
}

/// Deterministic stand-in for the engine's sensitivity to its parameters.
pub fn stride_for(params: &ParameterVector) -> usize {
    let buffer = params.get(Parameter::BufferSize) as usize;
    let angle = params.get(Parameter::AngleThreshold);
    1 + buffer % 6 + (angle / 10.0) as usize
}

/// In-process engine that thins the raw tracks instead of spawning anything.
pub struct FakeEngine {
    raw: TrajectorySet,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeEngine {
    pub fn new(raw: TrajectorySet) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                raw,
                calls: calls.clone(),
                fail: false,
            },
            calls,
        )
    }
}

impl SynopsesEngine for FakeEngine {
    fn raw(&self) -> &TrajectorySet {
        &self.raw
    }

    fn run(&mut self, params: &ParameterVector) -> SynResult<EngineRun> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SynoptError::EngineInvocation { attempts: 1 });
        }
        Ok(EngineRun {
            reduced: thin(&self.raw, stride_for(params)),
            noise: NoiseAnnotation::new(),
        })
    }
}

/// Opens [`FakeEngine`]s over real partition files and counts the traffic.
#[derive(Default)]
pub struct FakeFactory {
    pub calls: Arc<AtomicUsize>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub sources: Mutex<Vec<Vec<PathBuf>>>,
    pub fail: bool,
}

impl FakeFactory {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_sources(&self) -> Vec<PathBuf> {
        self.sources.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    fn open(&self, sources: &[PathBuf]) -> SynResult<FakeEngine> {
        let mut raw = TrajectorySet::new();
        for src in sources {
            for (id, pts) in load_raw(src)?.iter() {
                for p in pts {
                    raw.push(id, *p);
                }
            }
        }
        raw.sort_by_time();

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(sources.to_vec());
        Ok(FakeEngine {
            raw,
            calls: self.calls.clone(),
            fail: self.fail,
        })
    }

    fn close(&self, _engine: FakeEngine) -> SynResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A temporary data root and save root with a seeded study over them.
pub struct TestContext {
    pub dir: TempDir,
    pub study: Study,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data = DataSource::new(dir.path().join("data"), DATASET, SHIP_TYPE, FCODE);
        let mut study = Study::new(data, dir.path().join("saves"));
        study.seed = Some(7);
        Self { dir, study }
    }

    /// `{fcode}1.csv` .. `{fcode}6.csv`, each a different time window.
    pub fn with_cross_parts(self) -> Self {
        for part in 1..=6 {
            let path = self.study.data.partition_path(FCODE, &part.to_string());
            write_points(&path, &fleet(3, 30, part as i64 * 10_000_000));
        }
        self
    }

    /// Parts 1..6 of every online segment of the dataset.
    pub fn with_segments(self) -> Self {
        for (m, seg) in ["month1", "month2", "month3", "month4", "month5", "month6"]
            .iter()
            .enumerate()
        {
            for part in 1..=6 {
                let path = self.study.data.partition_path(seg, &part.to_string());
                let offset = (m * 6 + part) as i64 * 10_000_000;
                write_points(&path, &fleet(2, 20, offset));
            }
        }
        self
    }

    /// The unpartitioned `{fcode}.csv`.
    pub fn with_unpartitioned(self) -> Self {
        write_points(&self.study.data.unpartitioned(), &fleet(3, 40, 0));
        self
    }
}
