//! Most recent successfully parsed snapshot, kept for diagnostics.
//!
//! Never consulted as a fallback when a fetch fails.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{WeatherError, WeatherSnapshot};

const CACHE_FILE: &str = "weather_last.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    snapshot: WeatherSnapshot,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct WeatherCache {
    cache_path: Option<PathBuf>,
    entry: Option<CacheEntry>,
}

impl WeatherCache {
    /// Cache persisted as `weather_last.json` under `config_dir`
    pub fn new(config_dir: &Path) -> Self {
        Self {
            cache_path: Some(config_dir.join(CACHE_FILE)),
            entry: None,
        }
    }

    /// Cache that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: WeatherSnapshot) {
        self.entry = Some(CacheEntry {
            snapshot,
            fetched_at: Utc::now(),
        });
    }

    pub fn get(&self) -> Option<&WeatherSnapshot> {
        self.entry.as_ref().map(|e| &e.snapshot)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|e| e.fetched_at)
    }

    pub fn path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Read a previously saved entry. A missing file is not an error.
    pub fn load(&mut self) -> Result<(), WeatherError> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| WeatherError::Cache(e.to_string()))?;
        let entry: CacheEntry =
            serde_json::from_str(&contents).map_err(|e| WeatherError::Cache(e.to_string()))?;
        self.entry = Some(entry);
        Ok(())
    }

    pub fn save(&self) -> Result<(), WeatherError> {
        let (Some(path), Some(entry)) = (&self.cache_path, &self.entry) else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WeatherError::Cache(e.to_string()))?;
        }
        let contents =
            serde_json::to_string_pretty(entry).map_err(|e| WeatherError::Cache(e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| WeatherError::Cache(e.to_string()))?;

        tracing::debug!("Saved last weather snapshot to {}", path.display());
        Ok(())
    }
}
