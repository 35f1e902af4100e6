//! Blob stores for failure tests

use super::blob::BlobStore;
use super::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Every operation fails
#[derive(Default)]
pub struct FailingBlobStore;

impl BlobStore for FailingBlobStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable("storage offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("storage offline".to_string()))
    }

    fn remove(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("storage offline".to_string()))
    }
}

/// Reads work, writes fail while the failure switch is on
#[derive(Default)]
pub struct FlakyBlobStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyBlobStore {
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Handle that turns write failures on and off after the store is boxed
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_writes)
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        } else {
            Ok(())
        }
    }
}

impl BlobStore for FlakyBlobStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}
