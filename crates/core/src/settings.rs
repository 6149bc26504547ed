//! The automation settings record.
//!
//! Three boolean flags stored under one slot. Reads merge the stored record
//! over the defaults: missing flags take their default, explicit values win,
//! and keys this version does not know about are carried through untouched.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::storage::KeyValueStore;
use crate::{OvexError, Result};

/// Storage slot holding the settings record.
pub const SETTINGS_KEY: &str = "ai-overview-settings";

pub const AUTO_EXPAND_OVERVIEWS: &str = "autoExpandOverviews";
pub const AUTO_EXPAND_SOURCES: &str = "autoExpandSources";
pub const AUTO_SEND_WEBHOOK: &str = "autoSendWebhook";

const FLAGS: [&str; 3] = [AUTO_EXPAND_OVERVIEWS, AUTO_EXPAND_SOURCES, AUTO_SEND_WEBHOOK];

/// User-facing automation toggles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub auto_expand_overviews: bool,
    pub auto_expand_sources: bool,
    pub auto_send_webhook: bool,
    /// Keys written by other versions, preserved on write. A flag stored
    /// with a non-boolean value stays here and is written back as found.
    pub extra: Map<String, Value>,
}

impl Settings {
    /// Overlays a stored record on the defaults.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let mut flag = |key: &str| match map.get(key).cloned() {
            Some(Value::Bool(value)) => {
                map.remove(key);
                value
            }
            Some(other) => {
                warn!(key, value = %other, "non-boolean setting treated as false");
                false
            }
            None => false,
        };

        Self {
            auto_expand_overviews: flag(AUTO_EXPAND_OVERVIEWS),
            auto_expand_sources: flag(AUTO_EXPAND_SOURCES),
            auto_send_webhook: flag(AUTO_SEND_WEBHOOK),
            extra: map,
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        let flags = [self.auto_expand_overviews, self.auto_expand_sources, self.auto_send_webhook];
        for (key, value) in FLAGS.into_iter().zip(flags) {
            map.entry(key).or_insert(Value::Bool(value));
        }
        map
    }

    fn default_value(key: &str) -> Option<Value> {
        FLAGS.contains(&key).then_some(Value::Bool(false))
    }
}

/// Reads and writes the settings record.
pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
    changes: watch::Sender<Settings>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = watch::channel(Settings::default());
        Self { store, changes }
    }

    /// Current settings merged over the defaults.
    ///
    /// A missing record is initialised with the defaults. Storage failures
    /// degrade to the defaults.
    pub fn get_settings(&self) -> Settings {
        match self.store.get(SETTINGS_KEY) {
            Ok(Some(Value::Object(map))) => Settings::from_map(map),
            Ok(Some(other)) => {
                warn!(found = %other, "settings slot does not hold an object, using defaults");
                Settings::default()
            }
            Ok(None) => {
                let defaults = Settings::default();
                if let Err(e) = self.save_settings(&defaults) {
                    warn!(error = %e, "could not initialise settings");
                }
                defaults
            }
            Err(e) => {
                warn!(error = %e, "could not read settings, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store.set(SETTINGS_KEY, Value::Object(settings.to_map()))?;
        debug!(?settings, "settings saved");
        self.changes.send_replace(settings.clone());
        Ok(())
    }

    /// Writes one key, keeping every other stored key.
    pub fn save_setting(&self, key: &str, value: Value) -> Result<()> {
        if FLAGS.contains(&key) && !value.is_boolean() {
            return Err(OvexError::StorageError(format!("{} must be a boolean", key)));
        }

        let mut map = self.get_settings().to_map();
        map.insert(key.to_string(), value);
        self.save_settings(&Settings::from_map(map))
    }

    /// One key of the merged record, or its default.
    pub fn get_setting(&self, key: &str) -> Value {
        self.get_settings()
            .to_map()
            .remove(key)
            .or_else(|| Settings::default_value(key))
            .unwrap_or(Value::Null)
    }

    pub fn reset_to_defaults(&self) -> Result<()> {
        info!("settings reset to defaults");
        self.save_settings(&Settings::default())
    }

    /// Removes the record; the next read recreates the defaults.
    pub fn clear_settings(&self) -> Result<()> {
        self.store.remove(SETTINGS_KEY)?;
        info!("settings cleared");
        Ok(())
    }

    /// Whether `value` is an object holding every flag as a boolean.
    pub fn validate_settings(value: &Value) -> bool {
        match value {
            Value::Object(map) => FLAGS.iter().all(|key| map.get(*key).is_some_and(Value::is_boolean)),
            _ => false,
        }
    }

    pub fn export_settings(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Value::Object(self.get_settings().to_map()))?)
    }

    pub fn import_settings(&self, json: &str) -> Result<()> {
        let value: Value = serde_json::from_str(json)?;
        if !Self::validate_settings(&value) {
            return Err(OvexError::StorageError("settings to import are incomplete or mistyped".to_string()));
        }

        match value {
            Value::Object(map) => self.save_settings(&Settings::from_map(map)),
            _ => Err(OvexError::StorageError("settings must be a JSON object".to_string())),
        }
    }

    /// Receives every record written through this manager.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn manager() -> (Arc<MemoryStore>, SettingsManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn test_missing_record_initialises_defaults() {
        let (store, manager) = manager();
        assert_eq!(manager.get_settings(), Settings::default());
        assert!(store.get(SETTINGS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_partial_record_merges_defaults_and_keeps_unknown_keys() {
        let (store, manager) = manager();
        store
            .set(SETTINGS_KEY, json!({ "autoExpandSources": true, "theme": "dark" }))
            .unwrap();

        let settings = manager.get_settings();
        assert!(!settings.auto_expand_overviews);
        assert!(settings.auto_expand_sources);
        assert!(!settings.auto_send_webhook);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn test_save_setting_keeps_unknown_keys() {
        let (store, manager) = manager();
        store.set(SETTINGS_KEY, json!({ "theme": "dark" })).unwrap();

        manager.save_setting(AUTO_SEND_WEBHOOK, json!(true)).unwrap();

        let stored = store.get(SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(stored["theme"], json!("dark"));
        assert_eq!(stored[AUTO_SEND_WEBHOOK], json!(true));
        assert_eq!(stored[AUTO_EXPAND_OVERVIEWS], json!(false));
    }

    #[test]
    fn test_save_setting_keeps_mistyped_stored_flag() {
        let (store, manager) = manager();
        store
            .set(SETTINGS_KEY, json!({ "autoSendWebhook": "true", "theme": "dark" }))
            .unwrap();

        assert!(!manager.get_settings().auto_send_webhook);
        manager.save_setting(AUTO_EXPAND_SOURCES, json!(true)).unwrap();

        let stored = store.get(SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(stored[AUTO_SEND_WEBHOOK], json!("true"));
        assert_eq!(stored[AUTO_EXPAND_SOURCES], json!(true));
        assert_eq!(stored["theme"], json!("dark"));

        manager.save_setting(AUTO_SEND_WEBHOOK, json!(true)).unwrap();
        assert!(manager.get_settings().auto_send_webhook);
        assert_eq!(store.get(SETTINGS_KEY).unwrap().unwrap()[AUTO_SEND_WEBHOOK], json!(true));
    }

    #[test]
    fn test_save_setting_rejects_non_boolean_flag() {
        let (_, manager) = manager();
        let result = manager.save_setting(AUTO_EXPAND_OVERVIEWS, json!("yes"));
        assert!(matches!(result, Err(OvexError::StorageError(_))));
    }

    #[test]
    fn test_get_setting_falls_back_to_default() {
        let (store, manager) = manager();
        store.set(SETTINGS_KEY, json!({})).unwrap();
        assert_eq!(manager.get_setting(AUTO_EXPAND_SOURCES), json!(false));
        assert_eq!(manager.get_setting("unknown"), Value::Null);
    }

    #[test]
    fn test_reset_to_defaults() {
        let (_, manager) = manager();
        manager.save_setting(AUTO_EXPAND_OVERVIEWS, json!(true)).unwrap();
        manager.reset_to_defaults().unwrap();
        assert!(!manager.get_settings().auto_expand_overviews);
    }

    #[test]
    fn test_validate_settings() {
        assert!(SettingsManager::validate_settings(
            &json!({ "autoExpandOverviews": true, "autoExpandSources": false, "autoSendWebhook": false })
        ));
        assert!(!SettingsManager::validate_settings(&json!({ "autoExpandOverviews": true })));
        assert!(!SettingsManager::validate_settings(
            &json!({ "autoExpandOverviews": 1, "autoExpandSources": false, "autoSendWebhook": false })
        ));
        assert!(!SettingsManager::validate_settings(&json!("nope")));
    }

    #[test]
    fn test_export_then_import() {
        let (_, source) = manager();
        source.save_setting(AUTO_EXPAND_SOURCES, json!(true)).unwrap();
        let exported = source.export_settings().unwrap();

        let (_, target) = manager();
        target.import_settings(&exported).unwrap();
        assert!(target.get_settings().auto_expand_sources);
    }

    #[test]
    fn test_import_rejects_invalid_json_shape() {
        let (_, manager) = manager();
        assert!(manager.import_settings(r#"{"autoExpandSources": true}"#).is_err());
        assert!(manager.import_settings("not json").is_err());
    }

    #[test]
    fn test_subscribe_sees_saves() {
        let (_, manager) = manager();
        let rx = manager.subscribe();
        manager.save_setting(AUTO_SEND_WEBHOOK, json!(true)).unwrap();
        assert!(rx.borrow().auto_send_webhook);
    }
}
