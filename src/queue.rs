//! A text file of shell commands drained one line at a time.
//!
//! Several workers may drain the same file; every pop happens under the same
//! kind of lock file that guards the slot registry.

use crate::error::SynResult;
use crate::slots::FileLock;
use crate::util::atomic_write;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_QUEUE_FILE: &str = "runs.info";

/// Removes and returns the first non-blank line of `path`, dropping the blank
/// lines ahead of it. `None` once no command is left or the file is absent.
pub fn pop_command(path: &Path) -> SynResult<Option<String>> {
    let _guard = FileLock::acquire(path)?;
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut lines = content.lines().skip_while(|l| l.trim().is_empty());
    let command = match lines.next() {
        Some(line) => line.trim().to_string(),
        None => return Ok(None),
    };

    let rest: Vec<&str> = lines.collect();
    atomic_write(path, rest.join("\n"))?;
    Ok(Some(command))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueRun {
    pub executed: usize,
    pub failed: usize,
}

/// Runs queued commands with `sh -c` until the queue is empty, sleeping
/// `pause` after each one.
pub fn drain(path: &Path, pause: Duration) -> SynResult<QueueRun> {
    let mut run = QueueRun::default();

    while let Some(command) = pop_command(path)? {
        info!("▶️  {}", command);
        let status = Command::new("sh").arg("-c").arg(&command).status()?;
        run.executed += 1;

        if !status.success() {
            warn!("⚠️  '{}' exited with {}", command, status);
            run.failed += 1;
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
    Ok(run)
}
