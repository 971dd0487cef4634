use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;

/// The two directories the service writes to: annotated images and the text log.
#[derive(Clone, Debug)]
pub struct StoragePaths {
    output_dir: PathBuf,
    text_dir: PathBuf,
}

/// An entry that could not be removed during [`StoragePaths::clear_all`].
#[derive(Debug)]
pub struct ClearFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

impl StoragePaths {
    pub fn new(output_dir: PathBuf, text_dir: PathBuf) -> Self {
        Self {
            output_dir,
            text_dir,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.output_dir(), config.text_dir())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn text_dir(&self) -> &Path {
        &self.text_dir
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [self.output_dir(), self.text_dir()] {
            fs::create_dir_all(dir)?;
            log::debug!("Storage directory ready: {}", dir.display());
        }
        Ok(())
    }

    /// Removes every entry inside both directories, continuing past failures.
    pub fn clear_all(&self) -> Vec<ClearFailure> {
        let mut failures = Vec::new();
        for dir in [&self.output_dir, &self.text_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(error) => {
                    log::warn!("Failed to list {}. Reason: {}", dir.display(), error);
                    failures.push(ClearFailure {
                        path: dir.clone(),
                        error,
                    });
                    continue;
                }
            };

            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(error) => {
                        log::warn!("Failed to read entry in {}. Reason: {}", dir.display(), error);
                        failures.push(ClearFailure {
                            path: dir.clone(),
                            error,
                        });
                        continue;
                    }
                };
                if let Err(error) = remove_entry(&path) {
                    log::warn!("Failed to delete {}. Reason: {}", path.display(), error);
                    failures.push(ClearFailure { path, error });
                }
            }
        }
        failures
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    // symlink_metadata so a link to a directory is unlinked, not followed
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths_in(root: &Path) -> StoragePaths {
        StoragePaths::new(root.join("output_images"), root.join("text_files"))
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let root = tempdir().unwrap();
        let paths = paths_in(root.path());

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.output_dir().is_dir());
        assert!(paths.text_dir().is_dir());
    }

    #[test]
    fn clear_all_removes_files_and_subtrees() {
        let root = tempdir().unwrap();
        let paths = paths_in(root.path());
        paths.ensure_dirs().unwrap();

        fs::write(paths.output_path("a_happy.png"), b"png").unwrap();
        fs::create_dir_all(paths.output_dir().join("nested/deeper")).unwrap();
        fs::write(paths.output_dir().join("nested/deeper/b.png"), b"png").unwrap();
        fs::write(paths.text_dir().join("detected_emotions.txt"), b"a.png: happy\n").unwrap();

        let failures = paths.clear_all();

        assert!(failures.is_empty());
        assert_eq!(fs::read_dir(paths.output_dir()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(paths.text_dir()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn clear_all_unlinks_symlinks_without_following() {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("keep.txt"), b"keep").unwrap();

        let paths = paths_in(root.path());
        paths.ensure_dirs().unwrap();
        std::os::unix::fs::symlink(outside.path(), paths.output_dir().join("link")).unwrap();

        assert!(paths.clear_all().is_empty());
        assert!(outside.path().join("keep.txt").exists());
        assert_eq!(fs::read_dir(paths.output_dir()).unwrap().count(), 0);
    }

    #[test]
    fn clear_all_reports_missing_directory_and_keeps_going() {
        let root = tempdir().unwrap();
        let paths = paths_in(root.path());
        fs::create_dir_all(paths.text_dir()).unwrap();
        fs::write(paths.text_dir().join("detected_emotions.txt"), b"").unwrap();

        let failures = paths.clear_all();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, paths.output_dir());
        assert_eq!(fs::read_dir(paths.text_dir()).unwrap().count(), 0);
    }
}
