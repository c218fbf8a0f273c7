//! Persistent key-value state for the alerting pipeline.
//!
//! The baseline snapshot and the alert dedup ledger survive restarts in the
//! `engine_state` table, keyed by well-known names. The trait exists so the
//! monitor can be tested against an in-memory store.

use crate::db::Database;
use crate::error::Result;
use crate::types::{AlertLedger, BaselineSnapshot};

const BASELINE_KEY: &str = "baseline";
const LEDGER_KEY: &str = "alert_ledger";

/// JSON key-value storage by well-known key.
pub trait StateStore {
    fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Loads the persisted baseline snapshot, if one has been computed.
    fn load_baseline(&self) -> Result<Option<BaselineSnapshot>> {
        match self.get_state(BASELINE_KEY)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn store_baseline(&self, baseline: &BaselineSnapshot) -> Result<()> {
        self.set_state(BASELINE_KEY, &serde_json::to_value(baseline)?)
    }

    /// Loads the alert dedup ledger; an empty ledger when never written.
    fn load_ledger(&self) -> Result<AlertLedger> {
        match self.get_state(LEDGER_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(AlertLedger::default()),
        }
    }

    /// Replaces the ledger in a single write.
    fn store_ledger(&self, ledger: &AlertLedger) -> Result<()> {
        self.set_state(LEDGER_KEY, &serde_json::to_value(ledger)?)
    }
}

impl StateStore for Database {
    fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.state_get(key)
    }

    fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.state_set(key, value)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory store for monitor tests.
    #[derive(Default)]
    pub struct MemoryStore {
        values: RefCell<HashMap<String, serde_json::Value>>,
    }

    impl StateStore for MemoryStore {
        fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
            Ok(self.values.borrow().get(key).cloned())
        }

        fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
            self.values
                .borrow_mut()
                .insert(key.to_string(), value.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_baseline_roundtrip_through_database() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        assert!(db.load_baseline().unwrap().is_none());

        let mut values = BTreeMap::new();
        values.insert(Metric::SleepScore, 78.5);
        values.insert(Metric::AverageHrv, 42.0);
        let baseline = BaselineSnapshot {
            values,
            updated_at: Utc::now(),
        };
        db.store_baseline(&baseline).unwrap();

        let loaded = db.load_baseline().unwrap().unwrap();
        assert_eq!(loaded.get(Metric::SleepScore), Some(78.5));
        assert_eq!(loaded.get(Metric::AverageHrv), Some(42.0));
        assert_eq!(loaded.get(Metric::Steps), None);
    }

    #[test]
    fn test_ledger_defaults_to_empty() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let ledger = db.load_ledger().unwrap();
        assert!(ledger.last_sent.is_empty());

        let mut updated = ledger;
        updated.last_sent.insert(Metric::SleepScore, Utc::now());
        db.store_ledger(&updated).unwrap();

        let reloaded = db.load_ledger().unwrap();
        assert_eq!(reloaded.last_sent.len(), 1);
    }
}
