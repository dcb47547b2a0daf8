//! In-memory [`Table`] for handler tests.
//!
//! Mirrors the DynamoDB semantics the handlers rely on: conditional update and
//! delete, and newest-first partition queries over `created_at`. Every call is
//! counted so tests can assert that an operation never reached storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::error::StoreError;
use crate::store::{Record, Table, CREATED_AT_ATTR, ID_ATTR, PARTITION_ATTR};

#[derive(Default)]
pub struct MemoryTable {
    // id -> (insertion sequence, record)
    records: Mutex<HashMap<String, (u64, Record)>>,
    sequence: AtomicU64,
    accesses: AtomicUsize,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a storage error.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Number of calls that reached the table.
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Number of successful mutating calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw record, bypassing the access counters.
    pub fn peek(&self, id: &str) -> Option<Record> {
        self.lock().get(id).map(|(_, record)| record.clone())
    }

    /// Store a record without counting it as a handler write.
    pub fn seed(&self, record: Record) {
        if let Some(id) = string_attr(&record, ID_ATTR) {
            let seq = self.next_sequence();
            self.lock().insert(id, (seq, record));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (u64, Record)>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Sdk("ServiceUnavailable: injected failure".to_string()));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn string_attr(record: &Record, attr: &str) -> Option<String> {
    match record.get(attr) {
        Some(AttributeValue::S(s)) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl Table for MemoryTable {
    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        self.enter()?;
        Ok(self.lock().get(id).map(|(_, record)| record.clone()))
    }

    async fn put(&self, record: Record) -> Result<(), StoreError> {
        self.enter()?;
        let id = string_attr(&record, ID_ATTR)
            .ok_or_else(|| StoreError::Sdk("ValidationException: missing key id".to_string()))?;
        let seq = self.next_sequence();
        self.lock().insert(id, (seq, record));
        self.wrote();
        Ok(())
    }

    async fn update(&self, id: &str, changes: Record) -> Result<Option<Record>, StoreError> {
        self.enter()?;
        let mut records = self.lock();
        let Some((_, record)) = records.get_mut(id) else {
            return Ok(None);
        };
        record.extend(changes);
        let updated = record.clone();
        drop(records);
        self.wrote();
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.enter()?;
        let removed = self.lock().remove(id).is_some();
        if removed {
            self.wrote();
        }
        Ok(removed)
    }

    async fn query_partition(
        &self,
        partition: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        self.enter()?;
        let records = self.lock();
        let mut matching: Vec<(String, u64, Record)> = records
            .values()
            .filter(|(_, record)| string_attr(record, PARTITION_ATTR).as_deref() == Some(partition))
            .map(|(seq, record)| {
                let created = string_attr(record, CREATED_AT_ATTR).unwrap_or_default();
                (created, *seq, record.clone())
            })
            .collect();
        drop(records);

        // Newest first; later writes win ties on identical timestamps.
        matching.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut result: Vec<Record> = matching.into_iter().map(|(_, _, record)| record).collect();
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn status(&self) -> Result<String, StoreError> {
        self.enter()?;
        Ok("ACTIVE".to_string())
    }
}
