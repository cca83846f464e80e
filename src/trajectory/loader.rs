use crate::error::{SynResult, SynoptError};
use crate::trajectory::{TrajectoryPoint, TrajectorySet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Loads a space-delimited AIS file:
/// `<timestamp> <entity_id> <lon> <lat> [heading course speed flag]`.
///
/// Tracks are sorted by time after loading. A file without a single record
/// is a data integrity error.
pub fn load_raw<P: AsRef<Path>>(path: P) -> SynResult<TrajectorySet> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let set = read_raw(file, path)?;

    debug!(
        "Loaded {} points for {} entities from {}",
        set.point_count(),
        set.entity_count(),
        path.display()
    );
    Ok(set)
}

/// Same as [`load_raw`] over any reader; `origin` is only used in errors.
pub fn read_raw<R: Read>(reader: R, origin: &Path) -> SynResult<TrajectorySet> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut set = TrajectorySet::new();

    for result in rdr.records() {
        let rec = result?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);

        if rec.len() < 4 {
            if rec.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            return Err(SynoptError::Parse {
                path: origin.to_path_buf(),
                line,
                message: format!("expected at least 4 fields, found {}", rec.len()),
            });
        }

        let t: i64 = parse_field(field(&rec, 0, "timestamp", origin, line)?, origin, line)?;
        let id = field(&rec, 1, "entity id", origin, line)?;
        let lon: f64 = parse_field(field(&rec, 2, "longitude", origin, line)?, origin, line)?;
        let lat: f64 = parse_field(field(&rec, 3, "latitude", origin, line)?, origin, line)?;

        set.push(id, TrajectoryPoint::new(lon, lat, t));
    }

    if set.is_empty() {
        return Err(SynoptError::DataIntegrity(format!(
            "couldn't read raw data from {}",
            origin.display()
        )));
    }

    set.sort_by_time();
    Ok(set)
}

fn field<'r>(
    rec: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    origin: &Path,
    line: usize,
) -> SynResult<&'r str> {
    let v = rec[idx].trim();
    if v.is_empty() {
        Err(SynoptError::Parse {
            path: origin.to_path_buf(),
            line,
            message: format!("empty {}", name),
        })
    } else {
        Ok(v)
    }
}

pub(crate) fn parse_field<T: std::str::FromStr>(raw: &str, origin: &Path, line: usize) -> SynResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| SynoptError::Parse {
        path: origin.to_path_buf(),
        line,
        message: format!("'{}': {}", raw, e),
    })
}
