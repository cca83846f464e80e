//! Synopses of every ship type of a dataset with its tuned parameters.

use crate::config::{DataSource, EngineSettings};
use crate::engine::ProcessEngine;
use crate::error::{SynResult, SynoptError};
use crate::params::{ship_type_name, tuned_for, ParameterVector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one ship type's export.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExport {
    pub ship_type: String,
    pub params: ParameterVector,
    /// False when the type has no tuned vector or defaults were requested.
    pub tuned: bool,
    pub records: usize,
    pub noiseless: usize,
    pub synopses_path: PathBuf,
    pub noiseless_path: PathBuf,
}

/// Codes of every `type_<code>.csv` under `{root}/{dataset}/data_per_type/all`,
/// sorted.
pub fn dataset_types(data_root: &Path, dataset: &str) -> SynResult<Vec<String>> {
    let dir = data_root.join(dataset).join("data_per_type").join("all");
    if !dir.is_dir() {
        return Err(SynoptError::PersistenceMissing(dir));
    }

    let mut types = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(code) = name.strip_prefix("type_").and_then(|s| s.strip_suffix(".csv")) {
            types.push(code.to_string());
        }
    }
    types.sort();
    Ok(types)
}

/// `synopses_{dataset}_{type}.json` and its `_noiseless` sibling.
pub fn synopses_paths(out_dir: &Path, dataset: &str, ship_type: &str) -> (PathBuf, PathBuf) {
    (
        out_dir.join(format!("synopses_{}_{}.json", dataset, ship_type)),
        out_dir.join(format!("synopses_{}_{}_noiseless.json", dataset, ship_type)),
    )
}

/// Runs the engine once per ship type of `dataset`.
///
/// The engine is told not to print noise, so its third stream carries the
/// noiseless positions instead. Types without a tuned vector, and every type
/// when `use_default` is set, run with the engine defaults.
pub fn export_dataset(
    settings: &EngineSettings,
    data_root: &Path,
    dataset: &str,
    out_dir: &Path,
    use_default: bool,
) -> SynResult<Vec<TypeExport>> {
    let mut settings = settings.clone();
    settings.print_noise = false;

    let types = dataset_types(data_root, dataset)?;
    if types.is_empty() {
        warn!("No type_*.csv files for dataset {}", dataset);
    }

    let mut exports = Vec::with_capacity(types.len());
    for ship_type in types {
        let source = DataSource::new(data_root, dataset, &ship_type, "all").single_file();
        let tuned = if use_default { None } else { tuned_for(&ship_type) };
        let params = tuned.unwrap_or_default();
        let (synopses_path, noiseless_path) = synopses_paths(out_dir, dataset, &ship_type);

        info!(
            "🚢 Type {} ({}) with {}",
            ship_type,
            ship_type_name(&ship_type).unwrap_or("unlisted"),
            params
        );

        let mut engine = ProcessEngine::start(&settings, &[source])?;
        let exported = engine.run_and_export(&params, &synopses_path, &noiseless_path);
        let finished = engine.finish();
        let output = exported?;
        finished?;

        exports.push(TypeExport {
            ship_type,
            params,
            tuned: tuned.is_some(),
            records: output.merged_records().len(),
            noiseless: output.noise.len(),
            synopses_path,
            noiseless_path,
        });
    }
    Ok(exports)
}
