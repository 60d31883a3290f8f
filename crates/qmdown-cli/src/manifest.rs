//! Song manifests.
//!
//! A manifest is the CLI's stand-in for the music service: a JSON file
//! listing songs by identifier, with a display name and the URL of each
//! quality the service would offer.
//!
//! ```json
//! {
//!   "songs": [
//!     {
//!       "mid": "003OUlho2HcRHC",
//!       "name": "Song Title - Artist",
//!       "urls": { "flac": "https://cdn/1.flac", "M500": "https://cdn/1.mp3" }
//!     }
//!   ]
//! }
//! ```
//!
//! URL keys may be a quality name (`flac`, `mp3_128`) or its service code
//! (`F000`, `M500`), in any case.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qmdown_core::download::QualityTier;
use qmdown_core::ports::{LookupError, UrlLookupPort, UrlMap};

use crate::error::CliError;

/// One song entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongEntry {
    /// Service-side song identifier.
    pub mid: String,
    /// Name used for the output file.
    pub name: String,
    /// URL per quality key.
    #[serde(default)]
    pub urls: HashMap<String, String>,
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Songs in the order they should be resolved.
    pub songs: Vec<SongEntry>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Parse manifest JSON.
    pub fn from_json(text: &str) -> Result<Self, CliError> {
        serde_json::from_str(text).map_err(|e| CliError::Manifest(e.to_string()))
    }

    /// Song identifiers in manifest order.
    pub fn ids(&self) -> Vec<String> {
        self.songs.iter().map(|song| song.mid.clone()).collect()
    }

    /// Display name for a song; the first entry wins for duplicates.
    pub fn name_of(&self, mid: &str) -> Option<&str> {
        self.songs
            .iter()
            .find(|song| song.mid == mid)
            .map(|song| song.name.as_str())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

/// [`UrlLookupPort`] answering from a manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestLookup {
    urls: HashMap<String, HashMap<String, String>>,
}

impl ManifestLookup {
    /// Index a manifest's URLs.
    pub fn new(manifest: &Manifest) -> Self {
        let mut urls: HashMap<String, HashMap<String, String>> = HashMap::new();
        for song in &manifest.songs {
            let entry = urls.entry(song.mid.clone()).or_default();
            for (key, url) in &song.urls {
                entry.entry(normalize_key(key)).or_insert_with(|| url.clone());
            }
        }
        Self { urls }
    }

    fn find(&self, mid: &str, tier: &QualityTier) -> Option<String> {
        let song = self.urls.get(mid)?;
        song.get(&normalize_key(&tier.name))
            .or_else(|| song.get(&normalize_key(&tier.id)))
            .cloned()
    }
}

#[async_trait]
impl UrlLookupPort for ManifestLookup {
    async fn lookup_urls(&self, ids: &[String], tier: &QualityTier) -> Result<UrlMap, LookupError> {
        let found: UrlMap = ids
            .iter()
            .map(|id| (id.clone(), self.find(id, tier)))
            .collect();
        tracing::debug!(
            tier = %tier,
            requested = ids.len(),
            found = found.values().filter(|url| url.is_some()).count(),
            "Manifest lookup"
        );
        Ok(found)
    }
}
