use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::Result;

/// A named on-disk set of short strings used for exactly-once accounting.
///
/// The backing file is JSON and is replaced atomically on every save so a
/// crash mid-write can never corrupt the previous state. A file that fails
/// to decode is treated as the empty set.
#[derive(Debug)]
pub struct Preset {
    path: PathBuf,
    items: BTreeSet<String>,
}

impl Preset {
    /// Open the set at `path`, creating an empty one if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let items = if path.exists() {
            match fs::read(&path) {
                Ok(raw) => match serde_json::from_slice::<BTreeSet<String>>(&raw) {
                    Ok(items) => items,
                    Err(err) => {
                        warn!("preset {path:?} is corrupt, starting empty: {err}");
                        BTreeSet::new()
                    }
                },
                Err(err) => {
                    warn!("preset {path:?} is unreadable, starting empty: {err}");
                    BTreeSet::new()
                }
            }
        } else {
            let preset = Preset {
                path: path.clone(),
                items: BTreeSet::new(),
            };
            preset.save()?;
            return Ok(preset);
        };
        Ok(Preset { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    pub fn add(&mut self, item: impl Into<String>) {
        self.items.insert(item.into());
    }

    pub fn extend<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self.items.insert(item.into());
        }
    }

    /// Largest member, if any. Members sort lexicographically which for slot
    /// stamps is also chronological order.
    pub fn max(&self) -> Option<&str> {
        self.items.iter().next_back().map(String::as_str)
    }

    /// Items of `names` not yet in the set, in the order given.
    pub fn difference<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter(|name| !self.items.contains(*name))
            .map(str::to_string)
            .collect()
    }

    /// Write the set to a temp file in the target directory and rename it
    /// over the previous state.
    pub fn save(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&tmp, &self.items)?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Remove the backing file and clear the in-memory set (day rollover).
    pub fn delete(&mut self) -> Result<()> {
        self.items.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
