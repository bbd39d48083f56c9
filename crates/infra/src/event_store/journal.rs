//! File-backed event store: one JSON object per line, append-only.
//!
//! On open the whole file is replayed into an [`InMemoryEventStore`] index. A
//! final line without its newline (or that does not parse) is a write torn by a
//! crash and is cut off; a bad line anywhere else is corruption and fails the open.
//! Appends are synced before they are acknowledged. A failed append is cut back
//! off the file, so an unacknowledged batch never sits in front of the next one.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{error, info, warn};

use tillpoint_core::{AggregateId, ExpectedVersion, TenantId};

use super::in_memory::InMemoryEventStore;
use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub struct JournalEventStore {
    path: PathBuf,
    index: InMemoryEventStore,
    writer: Mutex<Writer>,
}

#[derive(Debug)]
struct Writer {
    file: File,
    /// Set when a failed append could not be rolled back; the file tail is unknown.
    broken: bool,
}

/// What an append needs from the journal file.
trait JournalSink: Write {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&self) -> io::Result<()>;
}

impl JournalSink for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write one encoded batch durably, or leave the sink at its old length.
///
/// `Ok(Err(e))` means the write failed and was undone; `Err(e)` means the
/// rollback failed too.
fn write_batch<W: JournalSink>(sink: &mut W, batch: &[u8]) -> io::Result<io::Result<()>> {
    let len = sink.size()?;
    let written = sink
        .write_all(batch)
        .and_then(|()| sink.flush())
        .and_then(|()| sink.sync());
    match written {
        Ok(()) => Ok(Ok(())),
        Err(err) => {
            sink.truncate(len)?;
            sink.sync()?;
            Ok(Err(err))
        }
    }
}

impl JournalEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let index = InMemoryEventStore::new();
        let replayed = replay(&mut file, &index)?;
        file.seek(SeekFrom::End(0))?;

        info!(path = %path.display(), events = replayed, "event journal opened");

        Ok(Self {
            path,
            index,
            writer: Mutex::new(Writer { file, broken: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn event_count(&self) -> usize {
        self.index.event_count()
    }
}

/// Load every complete line into `index`, truncating a torn tail. Returns the event count.
fn replay(file: &mut File, index: &InMemoryEventStore) -> Result<usize, EventStoreError> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let mut valid_len = 0usize;
    let mut count = 0usize;
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let Some(nl) = rest.iter().position(|b| *b == b'\n') else {
            // No newline: the last write never finished.
            break;
        };
        let line = &rest[..nl];
        let next = offset + nl + 1;
        let is_last = next >= bytes.len();

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            valid_len = next;
            continue;
        }

        match serde_json::from_slice::<StoredEvent>(line) {
            Ok(event) => {
                index.commit(std::slice::from_ref(&event)).map_err(|e| {
                    EventStoreError::Corrupt {
                        line: line_no,
                        reason: e.to_string(),
                    }
                })?;
                count += 1;
                offset = next;
                valid_len = next;
            }
            Err(_) if is_last => break,
            Err(e) => {
                return Err(EventStoreError::Corrupt {
                    line: line_no,
                    reason: e.to_string(),
                });
            }
        }
    }

    if valid_len < bytes.len() {
        warn!(
            dropped_bytes = bytes.len() - valid_len,
            "truncating torn tail of event journal"
        );
        file.set_len(valid_len as u64)?;
        file.sync_data()?;
    }

    Ok(count)
}

impl EventStore for JournalEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        // The writer lock serializes appends, so the head seen by `stage` is still
        // the head at `commit`.
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| EventStoreError::InvalidAppend("journal lock poisoned".to_string()))?;

        if writer.broken {
            return Err(EventStoreError::InvalidAppend(
                "journal tail is unknown after a failed write; reopen the store".to_string(),
            ));
        }

        let staged = self.index.stage(events, expected_version)?;
        if staged.is_empty() {
            return Ok(staged);
        }

        let mut buf = Vec::new();
        for e in &staged {
            serde_json::to_writer(&mut buf, e)
                .map_err(|err| EventStoreError::InvalidAppend(format!("encode failed: {err}")))?;
            buf.push(b'\n');
        }
        match write_batch(&mut writer.file, &buf) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "could not roll back failed journal write");
                writer.broken = true;
                return Err(err.into());
            }
        }

        self.index.commit(&staged)?;
        Ok(staged)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.index.load_stream(tenant_id, aggregate_id)
    }

    fn load_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.index.load_tenant(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, n: u32) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "test.thing".into(),
            event_type: "test.thing.happened".into(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": n }),
        }
    }

    #[test]
    fn reopen_replays_appended_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (t, a) = (TenantId::new(), AggregateId::new());

        {
            let store = JournalEventStore::open(&path).unwrap();
            store
                .append(vec![event(t, a, 1), event(t, a, 2)], ExpectedVersion::Exact(0))
                .unwrap();
        }

        let store = JournalEventStore::open(&path).unwrap();
        assert_eq!(store.event_count(), 2);
        let next = store.append(vec![event(t, a, 3)], ExpectedVersion::Exact(2)).unwrap();
        assert_eq!(next[0].sequence_number, 3);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (t, a) = (TenantId::new(), AggregateId::new());

        {
            let store = JournalEventStore::open(&path).unwrap();
            store.append(vec![event(t, a, 1)], ExpectedVersion::Any).unwrap();
        }
        let valid_len = std::fs::metadata(&path).unwrap().len();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(br#"{"event_id":"0190"#).unwrap();
        }

        let store = JournalEventStore::open(&path).unwrap();
        assert_eq!(store.event_count(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);

        store.append(vec![event(t, a, 2)], ExpectedVersion::Exact(1)).unwrap();
        drop(store);
        assert_eq!(JournalEventStore::open(&path).unwrap().event_count(), 2);
    }

    #[test]
    fn garbage_in_the_middle_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (t, a) = (TenantId::new(), AggregateId::new());

        {
            let store = JournalEventStore::open(&path).unwrap();
            store.append(vec![event(t, a, 1)], ExpectedVersion::Any).unwrap();
        }
        let good = std::fs::read(&path).unwrap();
        let mut content = b"not json\n".to_vec();
        content.extend_from_slice(&good);
        std::fs::write(&path, content).unwrap();

        let err = JournalEventStore::open(&path).unwrap_err();
        assert!(matches!(err, EventStoreError::Corrupt { line: 1, .. }));
    }

    #[test]
    fn rejected_append_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (t, a) = (TenantId::new(), AggregateId::new());

        let store = JournalEventStore::open(&path).unwrap();
        store.append(vec![event(t, a, 1)], ExpectedVersion::Exact(0)).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        assert!(store.append(vec![event(t, a, 2)], ExpectedVersion::Exact(0)).is_err());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    /// In-memory file that accepts `room` bytes and then fails.
    struct ShortFile {
        bytes: Vec<u8>,
        room: usize,
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let free = self.room.saturating_sub(self.bytes.len());
            if free == 0 {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            let n = free.min(buf.len());
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl JournalSink for ShortFile {
        fn size(&self) -> io::Result<u64> {
            Ok(self.bytes.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.bytes.truncate(len as usize);
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn partial_write_is_cut_back_to_the_previous_end() {
        let mut file = ShortFile {
            bytes: b"{\"seq\":1}\n".to_vec(),
            room: 16,
        };
        let before = file.bytes.clone();

        let outcome = write_batch(&mut file, b"{\"seq\":2}\n{\"seq\":3}\n").unwrap();
        assert_eq!(outcome.unwrap_err().kind(), io::ErrorKind::StorageFull);
        assert_eq!(file.bytes, before);

        file.room = 64;
        write_batch(&mut file, b"{\"seq\":2}\n").unwrap().unwrap();
        assert_eq!(file.bytes, b"{\"seq\":1}\n{\"seq\":2}\n");
    }

    #[test]
    fn reopen_after_many_appends_sees_no_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (t, a) = (TenantId::new(), AggregateId::new());

        {
            let store = JournalEventStore::open(&path).unwrap();
            for n in 0..5u32 {
                store.append(vec![event(t, a, n)], ExpectedVersion::Exact(u64::from(n))).unwrap();
            }
        }
        let store = JournalEventStore::open(&path).unwrap();
        let seqs: Vec<u64> = store.load_stream(t, a).unwrap().iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }
}
