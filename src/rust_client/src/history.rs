use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use token_vesting::{error::VestingError, ledger::PreferenceStore, workflow::LockPlan};

const LOCK_PREFIX: &str = "lock.";

/// Preferences kept as a flat JSON object on disk
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty if it does not exist yet
    pub fn open(path: &Path) -> Result<Self, VestingError> {
        let entries = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                VestingError::PreferenceStoreFailed(format!(
                    "unable to parse {}: {}",
                    path.display(),
                    err
                ))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(VestingError::PreferenceStoreFailed(format!(
                    "unable to read {}: {}",
                    path.display(),
                    err
                )))
            }
        };

        Ok(JsonFileStore {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn flush(&self) -> Result<(), VestingError> {
        let contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| VestingError::PreferenceStoreFailed(err.to_string()))?;
        fs::write(&self.path, contents).map_err(|err| {
            VestingError::PreferenceStoreFailed(format!(
                "unable to write {}: {}",
                self.path.display(),
                err
            ))
        })
    }

    pub fn record_lock(&mut self, record: &LockRecord) -> Result<(), VestingError> {
        let value = serde_json::to_string(record)
            .map_err(|err| VestingError::PreferenceStoreFailed(err.to_string()))?;
        self.set(&format!("{}{}", LOCK_PREFIX, record.vesting_account), &value)
    }

    /// Recorded locks, oldest first; unreadable entries are skipped
    pub fn locks(&self) -> Vec<LockRecord> {
        let mut locks: Vec<LockRecord> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(LOCK_PREFIX))
            .filter_map(|(_, value)| serde_json::from_str(value).ok())
            .collect();
        locks.sort_by_key(|record| record.created_at);
        locks
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, VestingError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), VestingError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// A submitted lock, as shown by `vesting history`
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LockRecord {
    pub seed: String,
    pub vesting_account: String,
    pub vesting_token_account: String,
    pub source_token_account: String,
    pub destination_token_account: String,
    pub mint: String,
    pub signature: String,
    pub created_at: i64,
}

impl LockRecord {
    pub fn new(plan: &LockPlan, mint: &str, signature: &str, created_at: i64) -> Self {
        LockRecord {
            seed: plan.seed.clone(),
            vesting_account: plan.vesting_account.to_string(),
            vesting_token_account: plan.vesting_token_account.to_string(),
            source_token_account: plan.source_token_account.to_string(),
            destination_token_account: plan.destination_token_account.to_string(),
            mint: mint.to_string(),
            signature: signature.to_string(),
            created_at,
        }
    }
}
