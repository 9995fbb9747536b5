//! Extension-wide state
//!
//! [`ExtensionContext`] owns the single [`ExtensionState`] of the background process. It
//! is loaded from storage on first access and written back after every mutation; each
//! mutation is a read-modify-write of the whole record under one lock.

use crate::error::Result;
use crate::messaging::ErrorInfo;
use crate::model::{PropertyRecord, Settings, Theme};
use crate::storage::{self, Storage, keys};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Progress of the last CRM sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading,
    Error,
    Success,
}

impl SyncStatus {
    /// `error` and `success` are only reachable from `loading`
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        match next {
            SyncStatus::Error | SyncStatus::Success => self == SyncStatus::Loading,
            SyncStatus::Idle | SyncStatus::Loading => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionState {
    pub theme: Option<Theme>,
    /// Properties by id, in CRM order
    pub properties: IndexMap<String, PropertyRecord>,
    pub selected_property_id: Option<String>,
    pub settings: Settings,
    pub sync_status: SyncStatus,
    pub last_error: Option<ErrorInfo>,
    /// Unix seconds of the last successful sync
    pub last_sync: Option<u64>,
}

impl ExtensionState {
    pub fn selected_property(&self) -> Option<&PropertyRecord> {
        self.selected_property_id.as_ref().and_then(|id| self.properties.get(id))
    }

    /// Select `id` if it names a known property; `None` clears the selection.
    /// Returns false and leaves the selection alone for an unknown id.
    pub fn select(&mut self, id: Option<String>) -> bool {
        if id.as_ref().is_some_and(|id| !self.properties.contains_key(id)) {
            return false;
        }
        self.selected_property_id = id;
        true
    }

    /// Replace the property snapshot, dropping a selection that no longer exists
    pub fn replace_properties(&mut self, records: Vec<PropertyRecord>) {
        self.properties = records.into_iter().map(|p| (p.id.clone(), p)).collect();
        let stale = self
            .selected_property_id
            .as_ref()
            .is_some_and(|id| !self.properties.contains_key(id));
        if stale {
            log::info!("Selected property {:?} no longer exists", self.selected_property_id);
            self.selected_property_id = None;
        }
    }

    /// Move the sync state machine, ignoring transitions it does not allow
    pub fn set_sync_status(&mut self, next: SyncStatus) {
        if self.sync_status.can_transition_to(next) {
            log::debug!("Sync status {:?} -> {:?}", self.sync_status, next);
            self.sync_status = next;
        } else {
            log::warn!("Ignoring sync status transition {:?} -> {:?}", self.sync_status, next);
        }
    }
}

/// Owner of the process-wide state
pub struct ExtensionContext {
    storage: Arc<dyn Storage>,
    state: Mutex<Option<ExtensionState>>,
}

impl ExtensionContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            state: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn bootstrap(&self) -> Result<ExtensionState> {
        let store = self.storage.as_ref();
        let properties: Vec<PropertyRecord> = storage::load(store, keys::PROPERTIES).await?.unwrap_or_default();
        let mut state = ExtensionState {
            theme: storage::load(store, keys::THEME).await?,
            settings: storage::load(store, keys::SETTINGS).await?.unwrap_or_default(),
            selected_property_id: storage::load(store, keys::SELECTED_PROPERTY_ID).await?,
            last_sync: storage::load(store, keys::LAST_SYNC).await?,
            ..Default::default()
        };
        state.replace_properties(properties);
        log::debug!("Loaded state with {} properties", state.properties.len());
        Ok(state)
    }

    async fn persist(&self, state: &ExtensionState) -> Result<()> {
        let properties: Vec<&PropertyRecord> = state.properties.values().collect();
        self.storage
            .set_many(vec![
                (keys::PROPERTIES.to_string(), serde_json::to_value(properties)?),
                (keys::THEME.to_string(), serde_json::to_value(&state.theme)?),
                (keys::SETTINGS.to_string(), serde_json::to_value(&state.settings)?),
                (
                    keys::SELECTED_PROPERTY_ID.to_string(),
                    serde_json::to_value(&state.selected_property_id)?,
                ),
                (keys::LAST_SYNC.to_string(), serde_json::to_value(state.last_sync)?),
            ])
            .await
    }

    /// Current state, loading it on first access
    pub async fn snapshot(&self) -> Result<ExtensionState> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.bootstrap().await?);
        }
        Ok(guard.clone().unwrap_or_default())
    }

    /// Apply `f` to the state and persist the result
    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ExtensionState) -> R,
    {
        let mut guard = self.state.lock().await;
        let mut state = match guard.take() {
            Some(state) => state,
            None => self.bootstrap().await?,
        };
        let out = f(&mut state);
        let persisted = self.persist(&state).await;
        *guard = Some(state);
        persisted.map(|_| out)
    }

    /// Forget everything: storage is cleared and the state returns to defaults
    pub async fn reset(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        self.storage.remove(&keys::ALL).await?;
        *guard = Some(ExtensionState::default());
        log::info!("Extension state reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn record(id: &str) -> PropertyRecord {
        PropertyRecord::new(id, format!("Listing {}", id))
    }

    #[test]
    fn test_sync_status_transitions() {
        use SyncStatus::*;
        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Success));
        assert!(Loading.can_transition_to(Error));
        assert!(!Idle.can_transition_to(Success));
        assert!(!Success.can_transition_to(Error));

        let mut state = ExtensionState::default();
        state.set_sync_status(Success);
        assert_eq!(state.sync_status, Idle);
    }

    #[test]
    fn test_replace_properties_keeps_order_and_drops_stale_selection() {
        let mut state = ExtensionState {
            selected_property_id: Some("9".into()),
            ..Default::default()
        };
        state.replace_properties(vec![record("3"), record("1"), record("2")]);
        assert_eq!(state.properties.keys().collect::<Vec<_>>(), vec!["3", "1", "2"]);
        assert_eq!(state.selected_property_id, None);
    }

    #[test]
    fn test_select_checks_current_snapshot() {
        let mut state = ExtensionState::default();
        state.replace_properties(vec![record("7"), record("8")]);
        assert!(state.select(Some("7".into())));

        // A sync that drops "7" lands before the next selection
        state.replace_properties(vec![record("8")]);
        assert_eq!(state.selected_property_id, None);
        assert!(!state.select(Some("7".into())));
        assert_eq!(state.selected_property_id, None);

        assert!(state.select(Some("8".into())));
        assert!(state.select(None));
        assert_eq!(state.selected_property_id, None);
    }

    #[tokio::test]
    async fn test_bootstrap_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_many(vec![
                (keys::PROPERTIES.to_string(), json!([{ "id": 5, "title": "Loft" }])),
                (keys::SELECTED_PROPERTY_ID.to_string(), json!("5")),
                (keys::SETTINGS.to_string(), json!({ "base_url": "https://crm.example.com" })),
            ])
            .await
            .unwrap();

        let ctx = ExtensionContext::new(storage);
        let state = ctx.snapshot().await.unwrap();

        assert_eq!(state.selected_property().map(|p| p.title.as_str()), Some("Loft"));
        assert_eq!(state.settings.base_url, "https://crm.example.com");
        assert!(state.settings.auto_sync);
        assert_eq!(state.sync_status, SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_update_persists_and_reset_clears() {
        let storage = Arc::new(MemoryStorage::new());
        let ctx = ExtensionContext::new(storage.clone());

        ctx.update(|s| {
            s.replace_properties(vec![record("1"), record("2")]);
            s.selected_property_id = Some("2".into());
        })
        .await
        .unwrap();

        let reloaded = ExtensionContext::new(storage.clone()).snapshot().await.unwrap();
        assert_eq!(reloaded.properties.len(), 2);
        assert_eq!(reloaded.selected_property_id.as_deref(), Some("2"));

        ctx.reset().await.unwrap();
        assert_eq!(ctx.snapshot().await.unwrap(), ExtensionState::default());
        assert_eq!(storage.get(keys::PROPERTIES).await.unwrap(), None);
    }
}
