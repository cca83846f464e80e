use crate::error::SynResult;
use crate::params::ParameterVector;
use crate::util::remove_if_exists;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-slot file names inside the work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFiles {
    pub input: PathBuf,
    pub critical: PathBuf,
    pub noise: PathBuf,
    pub notifications: PathBuf,
    pub config: PathBuf,
}

impl SlotFiles {
    pub fn new(work_dir: &Path, slot: usize) -> Self {
        Self {
            input: work_dir.join(format!("type{}.in", slot)),
            critical: work_dir.join(format!("type{}.out", slot)),
            noise: work_dir.join(format!("type{}_loc.out", slot)),
            notifications: work_dir.join(format!("type{}_not.out", slot)),
            config: work_dir.join(format!("maritime_config{}.properties", slot)),
        }
    }

    pub fn outputs(&self) -> [&Path; 3] {
        [&self.critical, &self.noise, &self.notifications]
    }

    pub fn clear_outputs(&self) -> SynResult<()> {
        for p in self.outputs() {
            remove_if_exists(p)?;
        }
        Ok(())
    }
}

/// Concatenates the source partitions into `target`, dropping blank lines.
/// Sources are only read. Returns the number of lines written.
pub fn stage_input(sources: &[PathBuf], target: &Path) -> SynResult<usize> {
    let mut out = BufWriter::new(File::create(target)?);
    let mut written = 0;

    for src in sources {
        let reader = BufReader::new(File::open(src)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
            written += 1;
        }
    }

    out.flush()?;
    debug!(
        "Staged {} lines from {} partitions into {}",
        written,
        sources.len(),
        target.display()
    );
    Ok(written)
}

/// Copies the template and appends one `val_<NAME>=<value>` line per gene.
pub fn write_config(template: &Path, target: &Path, params: &ParameterVector) -> SynResult<()> {
    fs::copy(template, target)?;

    let needs_newline = match fs::read(target) {
        Ok(bytes) => !bytes.is_empty() && !bytes.ends_with(b"\n"),
        Err(_) => false,
    };

    let mut f = OpenOptions::new().append(true).open(target)?;
    if needs_newline {
        f.write_all(b"\n")?;
    }
    f.write_all(params.config_lines().as_bytes())?;
    Ok(())
}
