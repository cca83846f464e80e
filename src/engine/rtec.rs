//! Event recognition input built from per-type synopses exports.
//!
//! The synopses of every ship type are merged per `(id, second, lon, lat)`,
//! once alone ("critical") and once together with the noiseless positions
//! ("enriched"). Each set is written twice, as `HappensAt` facts for spatial
//! preprocessing and as pipe-separated rows. The rows can afterwards be
//! interleaved with the spatial events that preprocessing produced.

use crate::engine::records::{read_records, Annotation, EngineRecord, Reading};
use crate::error::{SynResult, SynoptError};
use crate::trajectory::loader::parse_field;
use crate::util::atomic_write;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Knots to km/h.
const KNOTS_TO_KMH: f64 = 1.852;

/// Event rows in the order they follow a position.
pub const EVENTS: [&str; 9] = [
    "change_in_speed_start",
    "change_in_speed_end",
    "change_in_heading",
    "stop_start",
    "stop_end",
    "slow_motion_start",
    "slow_motion_end",
    "gap_start",
    "gap_end",
];

fn flag(a: &Annotation, event: &str) -> bool {
    match event {
        "change_in_speed_start" => a.change_in_speed_start,
        "change_in_speed_end" => a.change_in_speed_end,
        "change_in_heading" => a.change_in_heading,
        "stop_start" => a.stop_start,
        "stop_end" => a.stop_end,
        "slow_motion_start" => a.slow_motion_start,
        "slow_motion_end" => a.slow_motion_end,
        "gap_start" => a.gap_start,
        "gap_end" => a.gap_end,
        _ => false,
    }
}

fn reading_value(r: Option<Reading>) -> f64 {
    match r {
        Some(Reading::Finite(v)) => v,
        Some(Reading::Infinite) => f64::INFINITY,
        Some(Reading::Undefined) => f64::NAN,
        None => 0.0,
    }
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || a.to_bits() == b.to_bits()
}

type FixKey = (String, i64, u64, u64);

fn fix_key(id: &str, t: i64, lon: f64, lat: f64) -> FixKey {
    (id.to_string(), t, (lon + 0.0).to_bits(), (lat + 0.0).to_bits())
}

/// One position of the event recognition input, timestamped in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub id: String,
    pub t: i64,
    pub lon: f64,
    pub lat: f64,
    pub speed: f64,
    pub heading: f64,
    pub true_heading: Option<f64>,
    pub flags: Annotation,
}

impl Fix {
    pub fn from_record(r: &EngineRecord) -> Self {
        Self {
            id: r.id.clone(),
            t: r.timestamp.div_euclid(1000),
            lon: r.longitude,
            lat: r.latitude,
            speed: reading_value(r.speed),
            heading: reading_value(r.heading),
            true_heading: None,
            flags: r.annotation.clone(),
        }
    }

    fn key(&self) -> FixKey {
        fix_key(&self.id, self.t, self.lon, self.lat)
    }

    /// `HappensAt` facts: position, velocity in km/h and a gap start if flagged.
    pub fn spatial_lines(&self, out: &mut String) {
        let speed = self.speed * KNOTS_TO_KMH;
        let _ = writeln!(
            out,
            "HappensAt [coord <{}> {:.9} {:.9}] {}",
            self.id, self.lon, self.lat, self.t
        );
        let _ = writeln!(
            out,
            "HappensAt [velocity <{}> {:.9} {:.9}] {}",
            self.id, speed, self.heading, self.t
        );
        if self.flags.gap_start {
            let _ = writeln!(
                out,
                "HappensAt [gap_start <{}> {:.9} {:.9}] {}",
                self.id, speed, self.heading, self.t
            );
        }
    }

    /// `coord` and `velocity` rows followed by one row per raised event.
    pub fn row_lines(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "coord|{t}|{t}|{}|{:.9}|{:.9}",
            self.id,
            self.lon,
            self.lat,
            t = self.t
        );
        let _ = writeln!(
            out,
            "velocity|{t}|{t}|{}|{:.9}|{:.9}|{:.9}",
            self.id,
            self.speed,
            self.heading,
            self.true_heading.unwrap_or(0.0),
            t = self.t
        );
        for event in EVENTS.iter().filter(|e| flag(&self.flags, e)) {
            let _ = writeln!(out, "{}|{t}|{t}|{}", event, self.id, t = self.t);
        }
    }
}

/// Fixes merged per `(id, second, lon, lat)` in order of first insertion.
#[derive(Debug, Clone, Default)]
pub struct FixSet {
    fixes: Vec<Fix>,
    index: HashMap<FixKey, usize>,
}

impl FixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Adds a fix, or ORs its flags into the fix already at the same key.
    /// Two fixes at one key must agree on speed and heading.
    pub fn insert(&mut self, fix: Fix) -> SynResult<()> {
        let key = fix.key();
        match self.index.get(&key) {
            Some(&i) => {
                let held = &mut self.fixes[i];
                if !same_value(held.speed, fix.speed) || !same_value(held.heading, fix.heading) {
                    return Err(SynoptError::DataIntegrity(format!(
                        "vessel {} at {}s has two readings: ({}, {}) and ({}, {})",
                        fix.id, fix.t, held.speed, held.heading, fix.speed, fix.heading
                    )));
                }
                held.flags.union(&fix.flags);
            }
            None => {
                self.index.insert(key, self.fixes.len());
                self.fixes.push(fix);
            }
        }
        Ok(())
    }

    /// Sets the true heading of the fix at this position, if there is one.
    pub fn set_true_heading(&mut self, id: &str, t: i64, lon: f64, lat: f64, heading: f64) -> bool {
        match self.index.get(&fix_key(id, t, lon, lat)) {
            Some(&i) => {
                self.fixes[i].true_heading = Some(heading);
                true
            }
            None => false,
        }
    }

    /// Fixes by time; equal times keep vessels in order of first appearance.
    pub fn by_time(&self) -> Vec<&Fix> {
        let mut rank: HashMap<&str, usize> = HashMap::new();
        for f in &self.fixes {
            let next = rank.len();
            rank.entry(f.id.as_str()).or_insert(next);
        }
        let mut sorted: Vec<&Fix> = self.fixes.iter().collect();
        sorted.sort_by_key(|f| (f.t, rank[f.id.as_str()]));
        sorted
    }
}

/// `synopses_*{dataset}*.json` exports in `dir` except the noiseless ones, sorted.
pub fn synopses_files(dir: &Path, dataset: &str) -> SynResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if name.starts_with("synopses")
            && name.contains(dataset)
            && name.ends_with(".json")
            && !name.contains("noiseless")
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn noiseless_sibling(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    path.with_file_name(format!("{}_noiseless.json", stem))
}

/// Reads every export of `dataset` in `dir` into the critical and the
/// enriched set.
pub fn collect_exports(dir: &Path, dataset: &str) -> SynResult<(FixSet, FixSet)> {
    let mut critical = FixSet::new();
    let mut enriched = FixSet::new();

    for file in synopses_files(dir, dataset)? {
        for rec in read_records(&file)? {
            let fix = Fix::from_record(&rec);
            critical.insert(fix.clone())?;
            enriched.insert(fix)?;
        }

        let noiseless = noiseless_sibling(&file);
        if !noiseless.exists() {
            warn!("No noiseless export next to {}", file.display());
        }
        for rec in read_records(&noiseless)? {
            enriched.insert(Fix::from_record(&rec))?;
        }
    }
    Ok((critical, enriched))
}

/// Copies `trueheading` of the raw feed (a CSV with a header naming
/// `sourcemmsi`, `t`, `lon`, `lat` and `trueheading`) onto matching fixes.
pub fn apply_true_headings(raw_feed: &Path, sets: &mut [&mut FixSet]) -> SynResult<usize> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(raw_feed)?;

    let headers = rdr.headers()?.clone();
    let column = |name: &str| -> SynResult<usize> {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            SynoptError::DataIntegrity(format!("{} has no '{}' column", raw_feed.display(), name))
        })
    };
    let (c_id, c_t, c_lon, c_lat, c_head) = (
        column("sourcemmsi")?,
        column("t")?,
        column("lon")?,
        column("lat")?,
        column("trueheading")?,
    );

    let mut matched = 0;
    for result in rdr.records() {
        let rec = result?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        let get = |i: usize| rec.get(i).map(str::trim).unwrap_or_default();

        let id = get(c_id);
        let t: i64 = parse_field(get(c_t), raw_feed, line)?;
        let lon: f64 = parse_field(get(c_lon), raw_feed, line)?;
        let lat: f64 = parse_field(get(c_lat), raw_feed, line)?;

        let mut heading: Option<f64> = None;
        for set in sets.iter_mut() {
            if set.index.contains_key(&fix_key(id, t, lon, lat)) {
                let h = match heading {
                    Some(h) => h,
                    None => *heading.insert(parse_field(get(c_head), raw_feed, line)?),
                };
                if set.set_true_heading(id, t, lon, lat, h) {
                    matched += 1;
                }
            }
        }
    }
    Ok(matched)
}

/// Paths written by [`prepare`] for one variant (`critical` or `enriched`).
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFiles {
    pub variant: &'static str,
    pub fixes: usize,
    pub spatial: PathBuf,
    pub rows: PathBuf,
}

pub fn spatial_path(dir: &Path, dataset: &str, variant: &str) -> PathBuf {
    dir.join(format!("{}_{}.spatial.csv", dataset, variant))
}

pub fn rows_path(dir: &Path, dataset: &str, variant: &str) -> PathBuf {
    dir.join(format!("{}_{}_without_spatial.csv", dataset, variant))
}

pub fn merged_path(dir: &Path, dataset: &str, variant: &str) -> PathBuf {
    dir.join(format!("{}_{}_with_spatial.csv", dataset, variant))
}

/// Builds the critical and enriched inputs of `dataset` from the exports in
/// `dir`, taking true headings from `raw_feed` when given.
pub fn prepare(dir: &Path, dataset: &str, raw_feed: Option<&Path>) -> SynResult<Vec<PreparedFiles>> {
    let (mut critical, mut enriched) = collect_exports(dir, dataset)?;
    if critical.is_empty() {
        return Err(SynoptError::DataIntegrity(format!(
            "no synopses exports of {} in {}",
            dataset,
            dir.display()
        )));
    }
    info!(
        "📥 Merged {} critical and {} enriched positions",
        critical.len(),
        enriched.len()
    );

    if let Some(feed) = raw_feed {
        let matched = apply_true_headings(feed, &mut [&mut critical, &mut enriched])?;
        info!("🧭 Added {} true headings from {}", matched, feed.display());
    }

    let mut written = Vec::with_capacity(2);
    for (variant, set) in [("critical", &critical), ("enriched", &enriched)] {
        let fixes = set.by_time();
        let mut spatial = String::new();
        let mut rows = String::new();
        for f in &fixes {
            f.spatial_lines(&mut spatial);
            f.row_lines(&mut rows);
        }

        let files = PreparedFiles {
            variant,
            fixes: fixes.len(),
            spatial: spatial_path(dir, dataset, variant),
            rows: rows_path(dir, dataset, variant),
        };
        atomic_write(&files.spatial, spatial)?;
        atomic_write(&files.rows, rows)?;
        written.push(files);
    }
    Ok(written)
}

type AreaEvent = (i64, String, String, String);
type Proximity = (i64, i64, String, String);

fn parse_spatial_events(path: &Path) -> SynResult<(Vec<AreaEvent>, Vec<Proximity>)> {
    let content = fs::read_to_string(path)?;
    let mut areas = Vec::new();
    let mut proximities = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let w: Vec<&str> = line.split(',').collect();
        if w.len() < 4 {
            return Err(SynoptError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: format!("expected 4 fields, found {}", w.len()),
            });
        }
        if line.contains("proximity") {
            let t1: i64 = parse_field(w[2], path, idx + 1)?;
            let t2: i64 = parse_field(w[1], path, idx + 1)?;
            proximities.push((t1, t2, w[0].to_string(), w[3].to_string()));
        } else {
            let t: i64 = parse_field(w[1], path, idx + 1)?;
            areas.push((t, w[0].to_string(), w[2].to_string(), w[3].to_string()));
        }
    }
    Ok((areas, proximities))
}

/// Drops `entersArea` events for an area the vessel is already in. A gap
/// start forgets every area of its vessel.
fn drop_repeated_entries(areas: Vec<AreaEvent>) -> SynResult<Vec<AreaEvent>> {
    let mut inside: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut kept = Vec::with_capacity(areas.len());

    for ev in areas {
        let (_, id, area, event) = &ev;
        match event.as_str() {
            "gap_start" => {
                inside.insert(id.clone(), BTreeSet::new());
            }
            "leavesArea" => {
                if let Some(set) = inside.get_mut(id) {
                    set.remove(area);
                }
                kept.push(ev);
            }
            "entersArea" => {
                if inside.entry(id.clone()).or_default().insert(area.clone()) {
                    kept.push(ev);
                }
            }
            other => {
                return Err(SynoptError::DataIntegrity(format!(
                    "unknown spatial event '{}'",
                    other
                )))
            }
        }
    }
    Ok(kept)
}

/// Interleaves the spatial events of `spatial_events` into the rows at
/// `rows`: every event strictly before a `coord` row is written ahead of it,
/// proximities first. Returns the number of events written.
pub fn merge_spatial(rows: &Path, spatial_events: &Path, target: &Path) -> SynResult<usize> {
    let crit = fs::read_to_string(rows)?;
    let (mut areas, mut proximities) = parse_spatial_events(spatial_events)?;

    for (idx, line) in crit.lines().enumerate() {
        let w: Vec<&str> = line.split('|').collect();
        if w[0] == "gap_start" && w.len() >= 4 {
            let t: i64 = parse_field(w[1], rows, idx + 1)?;
            areas.push((t, w[3].to_string(), String::new(), "gap_start".to_string()));
        }
    }
    areas.sort();
    proximities.sort();
    let areas = drop_repeated_entries(areas)?;

    let mut out = String::with_capacity(crit.len());
    let mut written = 0;
    let (mut a, mut p) = (areas.iter().peekable(), proximities.iter().peekable());

    let mut flush = |out: &mut String, before: Option<i64>| {
        while let Some((t1, t2, id1, id2)) = p.next_if(|x| before.map_or(true, |t| x.0 < t)) {
            let _ = writeln!(out, "proximity|{}|{}|{}|true|{}|{}", t2, t1, t2, id1, id2);
            written += 1;
        }
        while let Some((t, id, area, event)) = a.next_if(|x| before.map_or(true, |t| x.0 < t)) {
            let _ = writeln!(out, "{}|{t}|{t}|{}|{}", event, id, area, t = t);
            written += 1;
        }
    };

    for (idx, line) in crit.lines().enumerate() {
        if let Some(rest) = line.strip_prefix("coord|") {
            let t_raw = rest.split('|').next().unwrap_or_default();
            let t: i64 = parse_field(t_raw, rows, idx + 1)?;
            flush(&mut out, Some(t));
        }
        out.push_str(line);
        out.push('\n');
    }
    flush(&mut out, None);

    atomic_write(target, out)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNOPSES: &str = r#"{"id":"b","timestamp":5000,"longitude":1.5,"latitude":2.5,"speed":2.0,"heading":90.0,"annotation":{"gap_start":true}}
{"id":"a","timestamp":1000,"longitude":1.0,"latitude":2.0,"speed":1.0,"heading":10.0,"annotation":{"stop_start":true}}
{"id":"a","timestamp":1400,"longitude":1.0,"latitude":2.0,"speed":1.0,"heading":10.0,"annotation":{"change_in_heading":true}}
"#;

    const NOISELESS: &str = r#"{"id":"a","timestamp":3000,"longitude":1.2,"latitude":2.0,"speed":1.0,"heading":10.0}
"#;

    const RAW_FEED: &str = "sourcemmsi,t,lon,lat,trueheading\na,1,1.0,2.0,11\nb,5,1.5,2.5,91\nc,9,0.0,0.0,5\n";

    fn exports() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("synopses_brest_70.json"), SYNOPSES).unwrap();
        fs::write(dir.path().join("synopses_brest_70_noiseless.json"), NOISELESS).unwrap();
        fs::write(dir.path().join("synopses_other_70.json"), "not read").unwrap();
        fs::write(dir.path().join("nari.csv"), RAW_FEED).unwrap();
        dir
    }

    #[test]
    fn duplicates_merge_per_second_and_sort_by_time() {
        let dir = exports();
        let (critical, enriched) = collect_exports(dir.path(), "brest").unwrap();
        assert_eq!((critical.len(), enriched.len()), (2, 3));

        let order: Vec<(i64, &str)> = enriched.by_time().iter().map(|f| (f.t, f.id.as_str())).collect();
        assert_eq!(order, vec![(1, "a"), (3, "a"), (5, "b")]);

        let first = critical.by_time()[0];
        assert!(first.flags.stop_start && first.flags.change_in_heading);
    }

    #[test]
    fn prepared_files_follow_both_line_formats() {
        let dir = exports();
        let feed = dir.path().join("nari.csv");
        let written = prepare(dir.path(), "brest", Some(&feed)).unwrap();
        assert_eq!(written.len(), 2);

        let spatial = fs::read_to_string(spatial_path(dir.path(), "brest", "critical")).unwrap();
        assert_eq!(
            spatial,
            "HappensAt [coord <a> 1.000000000 2.000000000] 1\n\
             HappensAt [velocity <a> 1.852000000 10.000000000] 1\n\
             HappensAt [coord <b> 1.500000000 2.500000000] 5\n\
             HappensAt [velocity <b> 3.704000000 90.000000000] 5\n\
             HappensAt [gap_start <b> 3.704000000 90.000000000] 5\n"
        );

        let rows = fs::read_to_string(rows_path(dir.path(), "brest", "critical")).unwrap();
        assert_eq!(
            rows,
            "coord|1|1|a|1.000000000|2.000000000\n\
             velocity|1|1|a|1.000000000|10.000000000|11.000000000\n\
             change_in_heading|1|1|a\n\
             stop_start|1|1|a\n\
             coord|5|5|b|1.500000000|2.500000000\n\
             velocity|5|5|b|2.000000000|90.000000000|91.000000000\n\
             gap_start|5|5|b\n"
        );

        let enriched = fs::read_to_string(rows_path(dir.path(), "brest", "enriched")).unwrap();
        assert!(enriched.contains("velocity|3|3|a|1.000000000|10.000000000|0.000000000\n"));
    }

    #[test]
    fn conflicting_readings_are_rejected() {
        let mut set = FixSet::new();
        let rec = |speed: f64| EngineRecord {
            id: "a".into(),
            timestamp: 1000,
            longitude: 0.0,
            latitude: 0.0,
            speed: Some(Reading::Finite(speed)),
            heading: None,
            annotation: Annotation::default(),
            distance: None,
            heading_diff: None,
            percental_speed_change: None,
            extra: BTreeMap::new(),
        };
        set.insert(Fix::from_record(&rec(1.0))).unwrap();
        assert!(matches!(
            set.insert(Fix::from_record(&rec(2.0))),
            Err(SynoptError::DataIntegrity(_))
        ));
    }

    #[test]
    fn spatial_events_are_interleaved_before_positions() {
        let dir = tempfile::tempdir().unwrap();
        let rows = dir.path().join("rows.csv");
        let events = dir.path().join("spatial_events.csv");
        let target = dir.path().join("merged.csv");
        fs::write(&rows, "coord|1|1|a|x\ngap_start|1|1|a\ncoord|10|10|a|x\n").unwrap();
        fs::write(
            &events,
            "a,2,port,entersArea\na,3,port,entersArea\na,4,port,leavesArea\na,8,6,b,proximity\n",
        )
        .unwrap();

        let written = merge_spatial(&rows, &events, &target).unwrap();
        assert_eq!(written, 3);
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "coord|1|1|a|x\n\
             gap_start|1|1|a\n\
             proximity|8|6|8|true|a|b\n\
             entersArea|2|2|a|port\n\
             leavesArea|4|4|a|port\n\
             coord|10|10|a|x\n"
        );
    }
}
