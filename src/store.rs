//! On-disk state: the dedup store and the article log.
//!
//! # Dedup store
//!
//! A JSON array of processed hrefs. Loaded once at startup and rewritten in
//! full after every page sweep. Entries are written sorted so an unchanged
//! set produces a byte-identical file.
//!
//! # Article log
//!
//! Newline-delimited JSON, one [`ArticleRecord`] per line, opened in append
//! mode for every record. Non-ASCII text is written as-is.

use crate::models::ArticleRecord;
use itertools::Itertools;
use std::collections::HashSet;
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl DedupStore {
    /// Load the store at `path`, or start empty if the file does not exist.
    ///
    /// # Arguments
    ///
    /// * `path` - JSON file holding an array of processed hrefs
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The contents are not a JSON array of strings
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref().to_path_buf();
        let seen = match fs::read_to_string(&path).await {
            Ok(raw) => {
                let hrefs: Vec<String> = serde_json::from_str(&raw)
                    .map_err(|e| format!("dedup store {} is not a JSON array of strings: {e}", path.display()))?;
                hrefs.into_iter().collect::<HashSet<_>>()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No dedup store yet; starting empty");
                HashSet::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(count = seen.len(), "Loaded processed links");
        Ok(Self { path, seen })
    }

    pub fn contains(&self, href: &str) -> bool {
        self.seen.contains(href)
    }

    /// Record `href`. Returns false if it was already present.
    pub fn insert(&mut self, href: impl Into<String>) -> bool {
        self.seen.insert(href.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Overwrite the file with the full set, via a temp file and rename.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), count = self.seen.len()))]
    pub async fn persist(&self) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let sorted = self.seen.iter().sorted().collect::<Vec<_>>();
        let json = serde_json::to_string(&sorted)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Persisted dedup store");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ArticleLog {
    path: PathBuf,
}

impl ArticleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    #[instrument(level = "debug", skip_all, fields(href = %record.href))]
    pub async fn append(&self, record: &ArticleRecord) -> Result<(), Box<dyn Error>> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
