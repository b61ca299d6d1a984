//! Mirror entries and the JSON configuration loader
//!
//! The configuration file is a JSON array of objects:
//!
//! ```json
//! [
//!   {
//!     "name": "Photos",
//!     "source": "D:\\Photos",
//!     "relativeDestination": "photos",
//!     "enabled": true
//!   }
//! ]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::instrument;

/// One configured mirror job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSpec {
    /// Free-form label used in log output
    pub name: String,
    /// Directory to mirror from, must exist
    pub source: std::path::PathBuf,
    /// Destination path segment, resolved against the program's base directory
    pub relative_destination: String,
    /// Disabled entries are skipped by the batch runner
    pub enabled: bool,
}

impl MirrorSpec {
    /// Destination directory the tool writes to
    #[must_use]
    pub fn destination(&self, base_dir: &std::path::Path) -> std::path::PathBuf {
        base_dir.join(&self.relative_destination)
    }
}

impl std::fmt::Display for MirrorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Name: {}, Source: {}, Relative destination: {}, Enabled: {}",
            self.name,
            self.source.display(),
            self.relative_destination,
            self.enabled
        )
    }
}

/// Ordered mirror entries; insertion order is execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MirrorSpecCollection {
    specs: Vec<MirrorSpec>,
}

impl MirrorSpecCollection {
    /// Load the collection from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid mirror list.
    #[instrument]
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read configuration file {:?}", path))?;
        let collection = Self::from_json(&contents)
            .with_context(|| format!("failed parsing configuration file {:?}", path))?;
        tracing::debug!("loaded {} mirror entries", collection.len());
        Ok(collection)
    }

    /// Parse the collection from JSON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON array of mirror entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<MirrorSpec> = serde_json::from_str(json)?;
        Ok(Self { specs })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MirrorSpec> {
        self.specs.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &MirrorSpec> {
        self.specs.iter().filter(|spec| spec.enabled)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl From<Vec<MirrorSpec>> for MirrorSpecCollection {
    fn from(specs: Vec<MirrorSpec>) -> Self {
        Self { specs }
    }
}

impl<'a> IntoIterator for &'a MirrorSpecCollection {
    type Item = &'a MirrorSpec;
    type IntoIter = std::slice::Iter<'a, MirrorSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
