use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    ranking::RankingWeights,
    search::{EmbedderKind, SearchPolicy, DEFAULT_HASH_DIMENSION},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub ranking: RankingWeights,
    pub search: SearchPolicy,
    pub embedder: EmbedderKind,
    pub hash_dimension: usize,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            ranking: RankingWeights::default(),
            search: SearchPolicy::default(),
            embedder: EmbedderKind::default(),
            hash_dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unparsable settings at {}: {err}; using defaults",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.get();
        assert_eq!(settings, UserSettings::default());
        assert_eq!(settings.search.top_k, 20);
        assert!((settings.ranking.access - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "search": { "topK": 5 } }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.search.top_k, 5);
        assert!((settings.search.threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(settings.hash_dimension, DEFAULT_HASH_DIMENSION);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().get(), UserSettings::default());
    }

    #[test]
    fn updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.update(|s| s.search.top_k = 7).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.get().search.top_k, 7);
    }
}
