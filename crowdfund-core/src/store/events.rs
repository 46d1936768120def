//! Append-only event journal

use super::{id_key, Column, KvStore, WriteSet};
use crate::error::{Error, Result};
use crate::types::{BlockHeight, EngineEvent, EventKind};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Journal of every successful mutation
///
/// Sequence numbers are assigned and written under one writer lock, so
/// the stored journal is always a dense prefix `0..committed` and a reader
/// following it with a cursor never skips an event.
pub struct EventJournal {
    kv: Arc<dyn KvStore>,
    /// Next sequence number; held while the batch is written
    writer: Mutex<u64>,
    /// Every sequence number below this is durable
    committed: AtomicU64,
}

impl std::fmt::Debug for EventJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventJournal")
            .field("committed", &self.committed.load(Ordering::Acquire))
            .finish()
    }
}

impl EventJournal {
    /// Open journal over `kv`
    pub fn open(kv: Arc<dyn KvStore>) -> Result<Self> {
        let next_seq = match kv.last_key(Column::Events)? {
            Some(key) => {
                let bytes: [u8; 8] = key
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed event key".to_string()))?;
                u64::from_be_bytes(bytes) + 1
            }
            None => 0,
        };

        Ok(Self {
            kv,
            writer: Mutex::new(next_seq),
            committed: AtomicU64::new(next_seq),
        })
    }

    /// Append the event for `kind` to `batch` and write it atomically
    ///
    /// The sequence number is only consumed when the write succeeds.
    pub fn commit(&self, mut batch: WriteSet, height: BlockHeight, kind: EventKind) -> Result<EngineEvent> {
        let mut next_seq = self.writer.lock();

        let event = EngineEvent {
            seq: *next_seq,
            event_id: Uuid::now_v7(),
            height,
            recorded_at: Utc::now(),
            kind,
        };
        batch.put(Column::Events, id_key(event.seq), &event)?;
        self.kv.write(batch)?;

        *next_seq += 1;
        self.committed.store(*next_seq, Ordering::Release);
        Ok(event)
    }

    /// Events with `seq >= from`, at most `limit`
    pub fn since(&self, from: u64, limit: usize) -> Result<Vec<EngineEvent>> {
        let end = self.committed.load(Ordering::Acquire);
        let mut events = Vec::new();

        for seq in from..end {
            if events.len() >= limit {
                break;
            }
            let bytes = self.kv.get(Column::Events, &id_key(seq))?.ok_or_else(|| {
                Error::Storage(format!("Event {} missing below watermark {}", seq, end))
            })?;
            events.push(bincode::deserialize(&bytes)?);
        }

        Ok(events)
    }

    /// Next sequence number to be assigned
    pub fn next_seq(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::AccountId;

    fn created(id: u64) -> EventKind {
        EventKind::CampaignCreated {
            campaign_id: id,
            owner: AccountId::new("owner"),
            goal: 10,
            deadline: 5,
        }
    }

    struct FailingStore {
        inner: MemoryStore,
    }

    impl KvStore for FailingStore {
        fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.inner.get(column, key)
        }

        fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
            self.inner.scan_prefix(column, prefix)
        }

        fn last_key(&self, column: Column) -> Result<Option<Vec<u8>>> {
            self.inner.last_key(column)
        }

        fn write(&self, _batch: WriteSet) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[test]
    fn test_failed_write_does_not_consume_sequence() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let journal = EventJournal::open(kv).unwrap();
        journal.commit(WriteSet::new(), 1, created(0)).unwrap();

        let failing = EventJournal::open(Arc::new(FailingStore {
            inner: MemoryStore::new(),
        }))
        .unwrap();
        assert!(failing.commit(WriteSet::new(), 1, created(0)).is_err());
        assert_eq!(failing.next_seq(), 0);
        assert!(failing.since(0, 10).unwrap().is_empty());

        let event = journal.commit(WriteSet::new(), 2, created(1)).unwrap();
        assert_eq!(event.seq, 1);
        let seqs: Vec<u64> = journal.since(0, 10).unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(journal.since(1, 1).unwrap()[0].seq, 1);
    }

    #[test]
    fn test_cursor_reader_sees_every_concurrent_event() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let journal = Arc::new(EventJournal::open(kv).unwrap());
        const WRITERS: u64 = 4;
        const PER_WRITER: u64 = 50;

        let seen = std::thread::scope(|s| {
            for w in 0..WRITERS {
                let journal = journal.clone();
                s.spawn(move || {
                    for i in 0..PER_WRITER {
                        journal
                            .commit(WriteSet::new(), 1, created(w * PER_WRITER + i))
                            .unwrap();
                    }
                });
            }

            let reader = s.spawn(|| {
                let mut cursor = 0;
                let mut seen = Vec::new();
                while cursor < WRITERS * PER_WRITER {
                    for event in journal.since(cursor, 16).unwrap() {
                        assert_eq!(event.seq, cursor);
                        seen.push(event.seq);
                        cursor += 1;
                    }
                    std::thread::yield_now();
                }
                seen
            });
            reader.join().unwrap()
        });

        assert_eq!(seen, (0..WRITERS * PER_WRITER).collect::<Vec<_>>());
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        {
            let journal = EventJournal::open(kv.clone()).unwrap();
            journal.commit(WriteSet::new(), 1, created(0)).unwrap();
            journal.commit(WriteSet::new(), 1, created(1)).unwrap();
        }

        let journal = EventJournal::open(kv).unwrap();
        assert_eq!(journal.next_seq(), 2);
        assert_eq!(journal.commit(WriteSet::new(), 2, created(2)).unwrap().seq, 2);
    }
}
