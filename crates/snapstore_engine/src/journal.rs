//! Append-only journal and the byte devices it writes to.

use crate::error::{EngineError, EngineResult};
use crate::record::{FrameRead, JournalRecord};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A byte store the journal appends frames to.
///
/// Devices do not interpret their contents; [`Journal`] owns the framing.
pub trait JournalDevice: Send {
    /// Reads the whole device.
    fn read_all(&mut self) -> EngineResult<Vec<u8>>;

    /// Appends bytes at the end.
    fn append(&mut self, data: &[u8]) -> EngineResult<()>;

    /// Makes all appended bytes durable.
    fn sync(&mut self) -> EngineResult<()>;

    /// Cuts the device down to `len` bytes.
    fn truncate(&mut self, len: u64) -> EngineResult<()>;

    /// Current size in bytes.
    fn size(&self) -> u64;
}

/// Journal device backed by a single file.
#[derive(Debug)]
pub struct FileDevice {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileDevice {
    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JournalDevice for FileDevice {
    fn read_all(&mut self) -> EngineResult<Vec<u8>> {
        let mut data = Vec::with_capacity(self.size as usize);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<()> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    fn sync(&mut self) -> EngineResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> EngineResult<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.size = len;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// In-memory journal device for ephemeral engines and tests.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    data: Vec<u8>,
}

impl MemoryDevice {
    /// Creates an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device with pre-existing contents, for recovery tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns a copy of the device contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}

impl JournalDevice for MemoryDevice {
    fn read_all(&mut self) -> EngineResult<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> EngineResult<()> {
        self.data.truncate(len as usize);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Frames committed writes onto a [`JournalDevice`].
pub struct Journal {
    device: Box<dyn JournalDevice>,
    sync_on_write: bool,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl Journal {
    /// Wraps a device.
    pub fn new(device: Box<dyn JournalDevice>, sync_on_write: bool) -> Self {
        Self {
            device,
            sync_on_write,
            poisoned: false,
        }
    }

    /// Appends one record, syncing if configured.
    ///
    /// A failed append or sync cuts the device back to its previous size,
    /// so a record reported as failed is never replayed. If that rollback
    /// fails too, every later append is refused.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails, the device write or sync fails,
    /// or the journal was poisoned by an earlier failed rollback.
    pub fn append(&mut self, record: &JournalRecord) -> EngineResult<()> {
        if self.poisoned {
            return Err(EngineError::corrupted(
                "journal refuses writes after a failed rollback",
            ));
        }
        let frame = record.encode()?;
        let start = self.device.size();

        let mut result = self.device.append(&frame);
        if result.is_ok() && self.sync_on_write {
            result = self.device.sync();
        }

        if let Err(e) = result {
            match self.device.truncate(start) {
                Ok(()) => {
                    debug!(sequence = %record.sequence, len = start, "rolled back failed journal append");
                }
                Err(rollback) => {
                    warn!(sequence = %record.sequence, error = %rollback, "failed to roll back journal append");
                    self.poisoned = true;
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Reads every intact record in order.
    ///
    /// Replay stops at the first torn or corrupt frame and the device is
    /// truncated to the end of the last good record, so later appends never
    /// follow garbage.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be read or truncated.
    pub fn replay(&mut self) -> EngineResult<Vec<JournalRecord>> {
        let data = self.device.read_all()?;
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < data.len() {
            match JournalRecord::read_frame(&data[offset..]) {
                FrameRead::Record(record, used) => {
                    records.push(record);
                    offset += used;
                }
                FrameRead::Incomplete => {
                    warn!(offset, len = data.len(), "journal ends with a torn record");
                    break;
                }
                FrameRead::Corrupt(reason) => {
                    warn!(offset, %reason, "journal record failed verification");
                    break;
                }
            }
        }

        if offset < data.len() {
            warn!(
                dropped = data.len() - offset,
                "truncating journal to last intact record"
            );
            self.device.truncate(offset as u64)?;
        }

        debug!(records = records.len(), bytes = offset, "journal replayed");
        Ok(records)
    }

    /// Syncs the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.device.sync()
    }

    /// Size of the journal in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.device.size()
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("size", &self.device.size())
            .field("sync_on_write", &self.sync_on_write)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchOp;
    use crate::types::SequenceNumber;
    use tempfile::tempdir;

    fn put(seq: u64, key: &[u8], value: &[u8]) -> JournalRecord {
        JournalRecord {
            sequence: SequenceNumber::new(seq),
            ops: vec![BatchOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
        }
    }

    /// Memory device whose sync and truncate can be made to fail.
    #[derive(Default)]
    struct FlakyDevice {
        inner: MemoryDevice,
        fail_sync: bool,
        fail_truncate: bool,
    }

    impl JournalDevice for FlakyDevice {
        fn read_all(&mut self) -> EngineResult<Vec<u8>> {
            self.inner.read_all()
        }

        fn append(&mut self, data: &[u8]) -> EngineResult<()> {
            self.inner.append(data)
        }

        fn sync(&mut self) -> EngineResult<()> {
            if self.fail_sync {
                return Err(std::io::Error::other("sync failed").into());
            }
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> EngineResult<()> {
            if self.fail_truncate {
                return Err(std::io::Error::other("truncate failed").into());
            }
            self.inner.truncate(len)
        }

        fn size(&self) -> u64 {
            self.inner.size()
        }
    }

    #[test]
    fn failed_sync_rolls_back_frame() {
        let device = FlakyDevice {
            fail_sync: true,
            ..FlakyDevice::default()
        };
        let mut journal = Journal::new(Box::new(device), true);

        assert!(matches!(
            journal.append(&put(1, b"a", b"1")),
            Err(EngineError::Io(_))
        ));
        assert_eq!(journal.size(), 0);
        assert!(journal.replay().unwrap().is_empty());
    }

    #[test]
    fn failed_rollback_poisons_journal() {
        let device = FlakyDevice {
            fail_sync: true,
            fail_truncate: true,
            ..FlakyDevice::default()
        };
        let mut journal = Journal::new(Box::new(device), true);

        assert!(matches!(
            journal.append(&put(1, b"a", b"1")),
            Err(EngineError::Io(_))
        ));
        assert!(matches!(
            journal.append(&put(1, b"a", b"1")),
            Err(EngineError::Corrupted(_))
        ));
    }

    #[test]
    fn memory_replay_returns_appended_records() {
        let mut journal = Journal::new(Box::new(MemoryDevice::new()), false);
        journal.append(&put(1, b"a", b"1")).unwrap();
        journal.append(&put(2, b"b", b"2")).unwrap();

        let records = journal.replay().unwrap();
        assert_eq!(records, vec![put(1, b"a", b"1"), put(2, b"b", b"2")]);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let mut data = put(1, b"a", b"1").encode().unwrap();
        let good_len = data.len() as u64;
        let second = put(2, b"b", b"2").encode().unwrap();
        data.extend_from_slice(&second[..second.len() - 3]);

        let mut journal = Journal::new(Box::new(MemoryDevice::with_data(data)), false);
        let records = journal.replay().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(journal.size(), good_len);
    }

    #[test]
    fn corrupt_record_stops_replay() {
        let mut data = put(1, b"a", b"1").encode().unwrap();
        let first_len = data.len();
        data.extend(put(2, b"b", b"2").encode().unwrap());
        data.extend(put(3, b"c", b"3").encode().unwrap());
        data[first_len + 12] ^= 0x55;

        let mut journal = Journal::new(Box::new(MemoryDevice::with_data(data)), false);
        let records = journal.replay().unwrap();
        assert_eq!(records, vec![put(1, b"a", b"1")]);
        assert_eq!(journal.size(), first_len as u64);
    }

    #[test]
    fn file_device_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");

        {
            let device = FileDevice::open(&path).unwrap();
            let mut journal = Journal::new(Box::new(device), true);
            journal.append(&put(1, b"k", b"v")).unwrap();
        }

        let device = FileDevice::open(&path).unwrap();
        assert_eq!(device.path(), path);
        let mut journal = Journal::new(Box::new(device), true);
        assert_eq!(journal.replay().unwrap(), vec![put(1, b"k", b"v")]);
    }

    #[test]
    fn file_device_truncate_then_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");

        let mut device = FileDevice::open(&path).unwrap();
        device.append(b"hello world").unwrap();
        device.truncate(5).unwrap();
        device.append(b"!").unwrap();

        assert_eq!(device.size(), 6);
        assert_eq!(device.read_all().unwrap(), b"hello!");
    }
}
