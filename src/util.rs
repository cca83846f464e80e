use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Writes `contents` to `{path}.tmp`, syncs it, then renames it over `path`.
///
/// Readers never observe a half-written checkpoint.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    {
        let mut file = fs::File::create(temp_path)?;
        file.write_all(contents.as_ref())?;
        file.sync_all()?;
    }

    fs::rename(temp_path, path)
}

/// Removes a file, treating "already gone" as success.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_overwrites_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("nested").join("cache.json");

        atomic_write(&file_path, b"initial").unwrap();
        atomic_write(&file_path, b"updated").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
        assert!(!dir.path().join("nested").join("cache.json.tmp").exists());
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(dir.path().join("nope")).is_ok());
    }
}
