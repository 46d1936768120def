//! In-memory backend

use super::{Column, KvStore, WriteOp, WriteSet};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile store; readers never observe half of a write set
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Column, Table>>,
}

impl MemoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(&column)
            .and_then(|table| table.get(key).cloned()))
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&column) else {
            return Ok(Vec::new());
        };

        Ok(table
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn last_key(&self, column: Column) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(&column)
            .and_then(|table| table.keys().next_back().cloned()))
    }

    fn write(&self, batch: WriteSet) -> Result<()> {
        let mut tables = self.tables.write();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { column, key, value } => {
                    tables.entry(column).or_default().insert(key, value);
                }
                WriteOp::Delete { column, key } => {
                    if let Some(table) = tables.get_mut(&column) {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
