//! Backup export/import.
//!
//! A backup bundle is a single JSON object: one entry per local storage key
//! plus a `_meta` header identifying the producing app. The write queue is
//! device-local and never included. Import is key-by-key and tolerant of
//! partial bundles; unknown keys are counted and skipped, never an error.

use crate::errors::{Error, Result};
use crate::storage::{LocalStore, keys};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

const META_KEY: &str = "_meta";
const APP_TAG: &str = "MetaFlow";

/// Outcome of an import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub restored: usize,
    pub skipped: usize,
}

/// Serializes every backed-up local key into a bundle.
#[must_use]
pub fn export_bundle(store: &LocalStore) -> Value {
    let mut bundle = serde_json::Map::new();
    bundle.insert(
        META_KEY.to_string(),
        json!({
            "app": APP_TAG,
            "version": env!("CARGO_PKG_VERSION"),
            "exportedAt": Utc::now().to_rfc3339(),
        }),
    );
    for key in keys::BACKUP_KEYS {
        if let Some(value) = store.get_raw(key) {
            bundle.insert(key.to_string(), value);
        }
    }
    Value::Object(bundle)
}

/// Restores a bundle into the local store, one key at a time.
///
/// # Errors
/// Returns [`Error::InvalidBackup`] if the bundle is not an object or its
/// `_meta.app` tag does not identify this app. Individual keys never fail
/// the import; unrecognized ones are skipped and counted.
pub fn import_bundle(store: &LocalStore, bundle: &Value) -> Result<ImportStats> {
    let Some(entries) = bundle.as_object() else {
        return Err(Error::InvalidBackup {
            message: "bundle is not a JSON object".to_string(),
        });
    };

    let app = entries
        .get(META_KEY)
        .and_then(|meta| meta.get("app"))
        .and_then(Value::as_str);
    if app != Some(APP_TAG) {
        return Err(Error::InvalidBackup {
            message: format!("unexpected app tag {app:?}"),
        });
    }

    let mut stats = ImportStats::default();
    for (key, value) in entries {
        if key == META_KEY {
            continue;
        }
        if keys::BACKUP_KEYS.contains(&key.as_str()) {
            if store.set(key, value) {
                stats.restored += 1;
            } else {
                warn!(key, "failed to restore backup key");
                stats.skipped += 1;
            }
        } else {
            warn!(key, "skipping unrecognized backup key");
            stats.skipped += 1;
        }
    }
    info!(
        restored = stats.restored,
        skipped = stats.skipped,
        "backup import complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_goal;

    #[test]
    fn export_then_import_round_trips() {
        let source = LocalStore::in_memory();
        source.set(keys::GOALS, &vec![sample_goal("g1", "Moto")]);
        source.set(
            keys::GAMIFICATION,
            &json!({ "totalXp": 120, "xpLog": [], "earnedBadgeIds": [] }),
        );

        let bundle = export_bundle(&source);
        assert_eq!(bundle[META_KEY]["app"], APP_TAG);

        let target = LocalStore::in_memory();
        let stats = import_bundle(&target, &bundle).unwrap();
        assert_eq!(stats.restored, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(target.goals()[0].id, "g1");
        assert_eq!(target.gamification().total_xp, 120);
    }

    #[test]
    fn foreign_app_tag_is_rejected() {
        let store = LocalStore::in_memory();
        let bundle = json!({ "_meta": { "app": "SomethingElse" } });
        assert!(matches!(
            import_bundle(&store, &bundle),
            Err(Error::InvalidBackup { .. })
        ));
    }

    #[test]
    fn missing_meta_is_rejected() {
        let store = LocalStore::in_memory();
        assert!(import_bundle(&store, &json!({})).is_err());
        assert!(import_bundle(&store, &json!("not an object")).is_err());
    }

    #[test]
    fn unknown_keys_are_skipped_not_fatal() {
        let store = LocalStore::in_memory();
        let bundle = json!({
            "_meta": { "app": APP_TAG },
            "metaflow_goals": [],
            "metaflow_write_queue": [],
            "someone_elses_key": { "x": 1 },
        });
        let stats = import_bundle(&store, &bundle).unwrap();
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.skipped, 2);
    }
}
