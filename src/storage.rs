use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    error::{Error, Result},
    store::{EntryStore, ListQuery},
    structs::drink_entry::{DrinkEntry, DrinkPatch},
};

pub const HISTORY_FILE: &str = "history.json";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InnerAppState {
    pub drink_history: Vec<DrinkEntry>,
}

/// Drink history kept on this machine.
///
/// The whole history is held in memory and rewritten to `path` after every
/// change. A change only reaches memory once it is on disk. Without a path
/// nothing touches the disk.
pub struct LocalStore {
    path: Option<PathBuf>,
    state: RwLock<InnerAppState>,
}

impl LocalStore {
    /// Opens the history file, creating it empty when missing.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        let state = get_saved_data(path)?;
        info!(entries = state.drink_history.len(), "loaded drink history");

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: RwLock::new(state),
        })
    }

    pub fn in_memory(drink_history: Vec<DrinkEntry>) -> Self {
        Self {
            path: None,
            state: RwLock::new(InnerAppState { drink_history }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InnerAppState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InnerAppState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &InnerAppState) -> Result<()> {
        match &self.path {
            Some(path) => save_app_state(path, state),
            None => Ok(()),
        }
    }
}

pub fn get_saved_data(path: &Path) -> Result<InnerAppState> {
    debug!(?path, "data path");

    if let Some(dir) = path.parent() {
        if !dir.try_exists()? {
            std::fs::create_dir_all(dir)?;
        }
    }

    if path.exists() {
        let data = std::fs::read(path)?;
        return Ok(serde_json::from_slice(&data)?);
    }

    // First run: write an empty history so later saves have a file to replace
    let initial = InnerAppState::default();
    save_app_state(path, &initial)?;
    Ok(initial)
}

/// Writes to a sibling temp file first so a crash never leaves half a history.
pub fn save_app_state(path: &Path, state: &InnerAppState) -> Result<()> {
    let data = serde_json::to_vec_pretty(state)?;
    let tmp = path.with_extension("json.tmp");

    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl EntryStore for LocalStore {
    async fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DrinkEntry>> {
        let window = ListQuery::between(start, end);

        Ok(self
            .read()
            .drink_history
            .iter()
            .filter(|entry| window.contains(entry.logged_at))
            .cloned()
            .collect())
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<DrinkEntry>> {
        let mut page: Vec<DrinkEntry> = self
            .read()
            .drink_history
            .iter()
            .filter(|entry| query.contains(entry.logged_at))
            .cloned()
            .collect();

        page.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        Ok(page
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    #[instrument(skip(self, entry), fields(id = %entry.id))]
    async fn insert(&self, entry: DrinkEntry) -> Result<DrinkEntry> {
        let mut state = self.write();
        let mut next = state.clone();
        next.drink_history.push(entry.clone());
        self.persist(&next)?;
        *state = next;

        debug!("drink logged");
        Ok(entry)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: &DrinkPatch) -> Result<DrinkEntry> {
        let mut state = self.write();
        let mut next = state.clone();
        let entry = next
            .drink_history
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        entry.apply(patch);
        let updated = entry.clone();
        self.persist(&next)?;
        *state = next;

        debug!(standard_drinks = updated.standard_drinks, "drink updated");
        Ok(updated)
    }
}
