use crate::config::EngineSettings;
use crate::engine::records::{read_records, to_json_lines};
use crate::engine::staging::{stage_input, write_config, SlotFiles};
use crate::engine::{EngineFactory, EngineOutput, EngineRun, SynopsesEngine};
use crate::error::{SynResult, SynoptError};
use crate::params::ParameterVector;
use crate::slots::{SlotLease, SlotRegistry};
use crate::trajectory::{load_raw, TrajectorySet};
use crate::util::{atomic_write, remove_if_exists};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The external engine driven as a child process from a leased slot.
///
/// Staged input and configuration are removed by [`ProcessEngine::finish`];
/// dropping an unfinished engine performs the same teardown best-effort.
#[derive(Debug)]
pub struct ProcessEngine {
    settings: EngineSettings,
    lease: Option<SlotLease>,
    files: SlotFiles,
    raw: TrajectorySet,
    invocations: usize,
}

impl ProcessEngine {
    /// Leases a slot, stages `sources` into the slot's input file and loads it.
    pub fn start(settings: &EngineSettings, sources: &[PathBuf]) -> SynResult<Self> {
        settings.validate()?;
        if !settings.config_template.exists() {
            return Err(SynoptError::Config(format!(
                "template file does not exist at {}",
                settings.config_template.display()
            )));
        }

        fs::create_dir_all(&settings.work_dir)?;
        let registry = SlotRegistry::new(settings.registry_path(), settings.slot_capacity);
        let lease = registry.acquire()?;
        let files = SlotFiles::new(&settings.work_dir, lease.id());

        let mut engine = ProcessEngine {
            settings: settings.clone(),
            lease: Some(lease),
            files,
            raw: TrajectorySet::new(),
            invocations: 0,
        };

        stage_input(sources, &engine.files.input)?;
        engine.raw = load_raw(&engine.files.input)?;

        info!(
            "📂 Staged {} points of {} vessels on slot {}",
            engine.raw.point_count(),
            engine.raw.entity_count(),
            engine.slot()
        );
        Ok(engine)
    }

    pub fn slot(&self) -> usize {
        self.lease.as_ref().map(|l| l.id()).unwrap_or_default()
    }

    pub fn files(&self) -> &SlotFiles {
        &self.files
    }

    /// Child processes spawned so far, retries included.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn write_config(&self, params: &ParameterVector) -> SynResult<()> {
        write_config(&self.settings.config_template, &self.files.config, params)
    }

    /// The full argument vector for this slot.
    pub fn command_line(&self) -> Vec<String> {
        build_command(&self.settings, self.slot(), &self.files)
    }

    /// Runs the engine once and waits for it. A nonzero exit status is only
    /// logged; the outputs decide whether the attempt worked.
    pub fn invoke(&mut self) -> SynResult<()> {
        let argv = self.command_line();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SynoptError::Config("engine command is empty".into()))?;

        self.invocations += 1;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            warn!(
                "⚠️  Engine exited with {} on slot {}: {}",
                output.status,
                self.slot(),
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
        }
        Ok(())
    }

    /// Parses the three output streams. `None` when the critical stream is empty.
    pub fn collect(&self) -> SynResult<Option<EngineOutput>> {
        let critical = read_records(&self.files.critical)?;
        if critical.is_empty() {
            return Ok(None);
        }

        Ok(Some(EngineOutput {
            critical,
            notifications: read_records(&self.files.notifications)?,
            noise: read_records(&self.files.noise)?,
        }))
    }

    /// Writes the configuration, then invokes and collects up to
    /// `max_attempts` times. Output files stay on disk for the caller.
    fn produce(&mut self, params: &ParameterVector) -> SynResult<EngineOutput> {
        self.write_config(params)?;
        let attempts = self.settings.max_attempts;

        for attempt in 1..=attempts {
            self.files.clear_outputs()?;
            let started = Instant::now();
            self.invoke()?;

            if let Some(output) = self.collect()? {
                debug!(
                    "Engine attempt {} on slot {} took {:.1}s ({} critical, {} noise)",
                    attempt,
                    self.slot(),
                    started.elapsed().as_secs_f64(),
                    output.critical.len(),
                    output.noise.len()
                );
                return Ok(output);
            }

            warn!(
                "🔁 Engine attempt {}/{} produced no critical points",
                attempt, attempts
            );
        }

        Err(SynoptError::EngineInvocation { attempts })
    }

    /// Runs once for `params` and writes the merged critical and notification
    /// records to `out_target` and the noise stream to `noise_target`.
    pub fn run_and_export(
        &mut self,
        params: &ParameterVector,
        out_target: &Path,
        noise_target: &Path,
    ) -> SynResult<EngineOutput> {
        let output = self.produce(params)?;

        atomic_write(out_target, to_json_lines(output.merged_records())?)?;

        if self.files.noise.exists() {
            if let Some(parent) = noise_target.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::copy(&self.files.noise, noise_target)?;
        } else {
            warn!("Engine wrote no noise stream; {} is empty", noise_target.display());
            atomic_write(noise_target, "")?;
        }

        self.files.clear_outputs()?;
        Ok(output)
    }

    /// Removes the staged input and configuration and releases the slot.
    pub fn finish(mut self) -> SynResult<()> {
        self.teardown_files()?;
        match self.lease.take() {
            Some(lease) => lease.release(),
            None => Ok(()),
        }
    }

    fn teardown_files(&self) -> SynResult<()> {
        remove_if_exists(&self.files.input)?;
        remove_if_exists(&self.files.config)?;
        Ok(())
    }
}

impl SynopsesEngine for ProcessEngine {
    fn raw(&self) -> &TrajectorySet {
        &self.raw
    }

    fn run(&mut self, params: &ParameterVector) -> SynResult<EngineRun> {
        let output = self.produce(params)?;
        self.files.clear_outputs()?;
        Ok(output.into_run())
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if self.lease.is_some() {
            if let Err(e) = self.teardown_files() {
                warn!("⚠️  Could not clean slot {} files: {}", self.slot(), e);
            }
        }
    }
}

/// `engine_command` with `{slot}` substituted, followed by
/// `slot input critical noise notifications print_noise`.
pub fn build_command(settings: &EngineSettings, slot: usize, files: &SlotFiles) -> Vec<String> {
    let slot_str = slot.to_string();
    let mut argv: Vec<String> = settings
        .engine_command
        .split_whitespace()
        .map(|s| s.replace("{slot}", &slot_str))
        .collect();

    argv.push(slot_str);
    for p in [
        &files.input,
        &files.critical,
        &files.noise,
        &files.notifications,
    ] {
        argv.push(p.to_string_lossy().into_owned());
    }
    argv.push(settings.print_noise.to_string());
    argv
}

/// Opens a [`ProcessEngine`] per request with shared settings.
#[derive(Debug, Clone)]
pub struct ProcessEngineFactory {
    pub settings: EngineSettings,
}

impl ProcessEngineFactory {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for ProcessEngineFactory {
    type Engine = ProcessEngine;

    fn open(&self, sources: &[PathBuf]) -> SynResult<ProcessEngine> {
        ProcessEngine::start(&self.settings, sources)
    }

    fn close(&self, engine: ProcessEngine) -> SynResult<()> {
        engine.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_appends_slot_files() {
        let settings = EngineSettings {
            engine_command: "nice flink run engine-{slot}.jar".into(),
            print_noise: false,
            ..Default::default()
        };
        let files = SlotFiles::new(Path::new("tmp"), 4);
        let argv = build_command(&settings, 4, &files);

        assert_eq!(argv[3], "engine-4.jar");
        assert_eq!(argv[4], "4");
        assert!(argv[5].ends_with("type4.in"));
        assert!(argv[6].ends_with("type4.out"));
        assert!(argv[7].ends_with("type4_loc.out"));
        assert!(argv[8].ends_with("type4_not.out"));
        assert_eq!(argv[9], "false");
    }
}
