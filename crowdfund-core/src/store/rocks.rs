//! RocksDB backend
//!
//! One column family per [`Column`]. Write sets map onto a RocksDB
//! `WriteBatch`, which the database applies atomically.

use super::{Column, KvStore, WriteOp, WriteSet};
use crate::{
    config::RocksDBConfig,
    error::{Error, Result},
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, Options,
    SingleThreaded, WriteBatch,
};
use std::path::Path;

type Db = DBWithThreadMode<SingleThreaded>;

/// Durable store
pub struct RocksStore {
    db: Db,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStore {
    /// Open or create database at `path`
    pub fn open(path: impl AsRef<Path>, config: &RocksDBConfig) -> Result<Self> {
        let path = path.as_ref();

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.max_background_jobs);

        if config.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = Column::ALL
            .iter()
            .map(|column| ColumnFamilyDescriptor::new(column.name(), Self::cf_options(*column)))
            .collect::<Vec<_>>();

        let db = Db::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_families = Column::ALL.len(),
            "Opened RocksDB"
        );

        Ok(Self { db })
    }

    fn cf_options(column: Column) -> Options {
        let mut opts = Options::default();
        match column {
            // Journal is write-once, read rarely
            Column::Events => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            // Composite-key lookups benefit from bloom filters
            Column::Contributions => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            _ => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, column: Column) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(column.name())
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", column.name())))
    }

    /// Flush memtables and close (graceful shutdown)
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl KvStore for RocksStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(column)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf_handle(column)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn last_key(&self, column: Column) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(column)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(Some(key.to_vec()))
            }
            None => Ok(None),
        }
    }

    fn write(&self, batch: WriteSet) -> Result<()> {
        let mut wb = WriteBatch::default();
        for op in batch.ops() {
            match op {
                WriteOp::Put { column, key, value } => {
                    wb.put_cf(self.cf_handle(*column)?, key, value);
                }
                WriteOp::Delete { column, key } => {
                    wb.delete_cf(self.cf_handle(*column)?, key);
                }
            }
        }

        // Atomic commit
        self.db.write(wb)?;

        tracing::debug!(ops = batch.len(), "Write set committed");
        Ok(())
    }
}
