//! Persisted user preference lists: favorite cities and recent searches.
//!
//! Each list is a small JSON file under the config directory. Load errors
//! degrade to defaults with a logged warning; the data layer treats this
//! store purely as "read list / write list".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recent searches are bounded to this many entries.
pub const MAX_RECENT_SEARCHES: usize = 5;

const FAVORITES_FILE: &str = "favorites.json";
const RECENT_SEARCHES_FILE: &str = "recent_searches.json";

/// A city as persisted in the favorites / recent-searches lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCity {
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl SavedCity {
    pub fn new(name: &str, country: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            country: country.to_string(),
            state: None,
            lat,
            lon,
        }
    }
}

fn default_favorites() -> Vec<SavedCity> {
    vec![
        SavedCity::new("London", "GB", 51.5074, -0.1278),
        SavedCity::new("New York", "US", 40.7128, -74.0060),
        SavedCity::new("Tokyo", "JP", 35.6762, 139.6503),
    ]
}

/// JSON-file-backed store for user preference lists.
#[derive(Debug)]
pub struct PrefsStore {
    dir: PathBuf,
}

impl PrefsStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            dir: config_dir.to_path_buf(),
        }
    }

    /// Favorite cities; seeds a default list when nothing is saved yet.
    pub fn load_favorites(&self) -> Vec<SavedCity> {
        match self.load_list(FAVORITES_FILE) {
            Some(list) => list,
            None => default_favorites(),
        }
    }

    pub fn save_favorites(&self, favorites: &[SavedCity]) -> Result<()> {
        self.save_list(FAVORITES_FILE, favorites)
    }

    pub fn add_favorite(&self, city: SavedCity) -> Result<Vec<SavedCity>> {
        let mut favorites = self.load_favorites();
        if !favorites.iter().any(|c| c.name == city.name) {
            favorites.push(city);
            self.save_favorites(&favorites)?;
        }
        Ok(favorites)
    }

    pub fn remove_favorite(&self, name: &str) -> Result<Vec<SavedCity>> {
        let mut favorites = self.load_favorites();
        favorites.retain(|c| c.name != name);
        self.save_favorites(&favorites)?;
        Ok(favorites)
    }

    /// Most-recent-first searched cities, empty when nothing is saved.
    pub fn load_recent_searches(&self) -> Vec<SavedCity> {
        self.load_list(RECENT_SEARCHES_FILE).unwrap_or_default()
    }

    /// Record a search: de-duplicated by name, pushed to the front, bounded
    /// to the five most recent.
    pub fn add_recent_search(&self, city: SavedCity) -> Result<Vec<SavedCity>> {
        let mut searches = self.load_recent_searches();
        searches.retain(|c| c.name != city.name);
        searches.insert(0, city);
        searches.truncate(MAX_RECENT_SEARCHES);
        self.save_list(RECENT_SEARCHES_FILE, &searches)?;
        Ok(searches)
    }

    pub fn clear_recent_searches(&self) -> Result<()> {
        let path = self.dir.join(RECENT_SEARCHES_FILE);
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove recent searches file")?;
        }
        Ok(())
    }

    fn load_list(&self, file: &str) -> Option<Vec<SavedCity>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read preference list");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt preference list, using defaults");
                None
            }
        }
    }

    fn save_list(&self, file: &str, list: &[SavedCity]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create config directory")?;
        let path = self.dir.join(file);
        let contents = serde_json::to_string_pretty(list).context("Failed to serialize list")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
