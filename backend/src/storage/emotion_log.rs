use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = ": ";

#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("Failed to read emotion log {0}: {1}")]
    Read(PathBuf, io::Error),
    #[error("Failed to write emotion log {0}: {1}")]
    Write(PathBuf, io::Error),
}

/// One processed image: the sanitized upload name and its representative label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionRecord {
    pub original_filename: String,
    pub label: String,
}

impl EmotionRecord {
    pub fn new(original_filename: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            label: label.into(),
        }
    }

    /// Parses `"{filename}: {label}"`, splitting on the first separator.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (filename, label) = line.trim().split_once(SEPARATOR)?;
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        Some(Self::new(filename, label))
    }
}

impl fmt::Display for EmotionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.original_filename, SEPARATOR, self.label)
    }
}

/// Flat text file holding the records of the most recent batch.
///
/// Every write replaces the whole file. A missing file reads as empty.
#[derive(Clone, Debug)]
pub struct EmotionLogStore {
    path: PathBuf,
}

impl EmotionLogStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_batch(&self, records: &[EmotionRecord]) -> Result<(), LogStoreError> {
        let contents: String = records.iter().map(|r| format!("{}\n", r)).collect();
        fs::write(&self.path, contents).map_err(|e| LogStoreError::Write(self.path.clone(), e))?;
        log::debug!(
            "Rewrote emotion log {} with {} records",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<EmotionRecord>, LogStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LogStoreError::Read(self.path.clone(), e)),
        };

        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match EmotionRecord::parse_line(line) {
                Some(record) => records.push(record),
                None => log::warn!(
                    "Skipping malformed line {} in {}: {:?}",
                    number + 1,
                    self.path.display(),
                    line
                ),
            }
        }
        Ok(records)
    }
}
