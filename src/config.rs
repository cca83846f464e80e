use crate::error::{SynResult, SynoptError};
use crate::slots::DEFAULT_SLOT_CAPACITY;
use clap::{parser::ValueSource, ArgAction, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENGINE_COMMAND: &str =
    "nice flink run -c eu.datacron.synopses.maritime.TrajectoryStreamManager synopses-type{slot}.jar";

/// Genetic search knobs.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Number of generations
    #[arg(long, default_value_t = 15)]
    pub ngen: usize,
    /// Population size
    #[arg(long, default_value_t = 15)]
    pub pops: usize,
    #[arg(long, default_value_t = 0.4)]
    pub cxpb: f64,
    #[arg(long, default_value_t = 0.8)]
    pub mutpb: f64,
    #[arg(long, default_value_t = 0.5)]
    pub indpb: f64,
    #[arg(long, default_value_t = 3)]
    pub tournament_size: usize,
    /// Probability of copying a new individual from the best cached ones
    #[arg(long, default_value_t = 0.7)]
    pub elite_probability: f64,
    /// How many of the best cached vectors elitist seeding picks from
    #[arg(long, default_value_t = 10)]
    pub elite_pool: usize,
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            ngen: 15,
            pops: 15,
            cxpb: 0.4,
            mutpb: 0.8,
            indpb: 0.5,
            tournament_size: 3,
            elite_probability: 0.7,
            elite_pool: 10,
            seed: None,
        }
    }
}

/// How the external compression engine is located and driven.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Directory for staged inputs, engine outputs and the slot registry
    #[arg(long, default_value = "tmp")]
    pub work_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SLOT_CAPACITY)]
    pub slot_capacity: usize,

    /// Template configuration the parameter lines are appended to
    #[arg(long, default_value = "parameters/maritime_config_template.properties")]
    pub config_template: PathBuf,

    /// Whitespace-separated engine command; `{slot}` is replaced by the slot id
    #[arg(long, default_value = DEFAULT_ENGINE_COMMAND)]
    pub engine_command: String,

    /// Ask the engine to print noisy points (`true`) or noiseless ones
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_noise: bool,

    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            config_template: PathBuf::from("parameters/maritime_config_template.properties"),
            engine_command: DEFAULT_ENGINE_COMMAND.to_string(),
            print_noise: true,
            max_attempts: 3,
        }
    }
}

impl EngineSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SynResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overwrites fields with values the user typed on the command line.
    /// Defaults filled in by clap do not override the file.
    pub fn merge_from_cli(&mut self, cli: &EngineSettings, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(work_dir, "work_dir");
        update_if_present!(slot_capacity, "slot_capacity");
        update_if_present!(config_template, "config_template");
        update_if_present!(engine_command, "engine_command");
        update_if_present!(print_noise, "print_noise");
        update_if_present!(max_attempts, "max_attempts");
    }

    pub fn registry_path(&self) -> PathBuf {
        self.work_dir.join("ids.txt")
    }

    pub fn validate(&self) -> SynResult<()> {
        if self.engine_command.split_whitespace().next().is_none() {
            return Err(SynoptError::Config("engine command is empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(SynoptError::Config("max_attempts must be at least 1".into()));
        }
        if self.slot_capacity == 0 {
            return Err(SynoptError::Config("slot_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Where the partitioned AIS files of one ship type live.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Root holding one directory per dataset
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub dataset: String,

    /// Ship type number
    #[arg(long = "type")]
    pub ship_type: String,

    /// File code prefix of the partitions (e.g. `month`)
    #[arg(long, default_value = "month")]
    pub fcode: String,
}

impl DataSource {
    pub fn new(data_root: impl Into<PathBuf>, dataset: &str, ship_type: &str, fcode: &str) -> Self {
        Self {
            data_root: data_root.into(),
            dataset: dataset.to_string(),
            ship_type: ship_type.to_string(),
            fcode: fcode.to_string(),
        }
    }

    /// `{root}/{dataset}/data_per_type/cross/type{ship}/{file_code}{part}.csv`
    pub fn partition_path(&self, file_code: &str, part: &str) -> PathBuf {
        self.data_root
            .join(&self.dataset)
            .join("data_per_type")
            .join("cross")
            .join(format!("type{}", self.ship_type))
            .join(format!("{}{}.csv", file_code, part))
    }

    /// Every `(file_code, part)` combination, file codes outermost.
    pub fn partitions(&self, file_codes: &[&str], parts: &[usize]) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(file_codes.len() * parts.len());
        for code in file_codes {
            for p in parts {
                out.push(self.partition_path(code, &p.to_string()));
            }
        }
        out
    }

    /// The whole file code as one unpartitioned file.
    pub fn unpartitioned(&self) -> PathBuf {
        self.partition_path(&self.fcode, "")
    }

    /// `{root}/{dataset}/data_per_type/all/type_{ship}.csv`
    pub fn single_file(&self) -> PathBuf {
        self.data_root
            .join(&self.dataset)
            .join("data_per_type")
            .join("all")
            .join(format!("type_{}.csv", self.ship_type))
    }
}

/// Parses a comma separated list such as `15,10,10`.
pub fn parse_usize_list(raw: &str, name: &str) -> SynResult<Vec<usize>> {
    let values: Result<Vec<usize>, _> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect();

    match values {
        Ok(v) if !v.is_empty() => Ok(v),
        Ok(_) => Err(SynoptError::Config(format!("--{} needs at least one value", name))),
        Err(e) => Err(SynoptError::Config(format!("invalid number in --{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_layout() {
        let src = DataSource::new("data", "brest", "70", "month");
        assert_eq!(
            src.partition_path("month", "3"),
            PathBuf::from("data/brest/data_per_type/cross/type70/month3.csv")
        );
        assert_eq!(
            src.single_file(),
            PathBuf::from("data/brest/data_per_type/all/type_70.csv")
        );
        assert_eq!(src.partitions(&["a", "b"], &[1, 2]).len(), 4);
    }

    #[test]
    fn usize_list_rejects_garbage() {
        assert_eq!(parse_usize_list("15, 10", "popsizes").unwrap(), vec![15, 10]);
        assert!(parse_usize_list("", "popsizes").is_err());
        assert!(parse_usize_list("1,x", "popsizes").is_err());
    }
}
