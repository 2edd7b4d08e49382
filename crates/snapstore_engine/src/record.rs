//! Journal record framing.
//!
//! Each committed write is one frame:
//!
//! ```text
//! | magic "SSJ1" (4) | version u16 (2) | payload len u32 (4) | payload | crc32 (4) |
//! ```
//!
//! The payload is the commit sequence (`u64`), the operation count (`u32`)
//! and then each operation: a tag byte, a length-prefixed key and, for puts,
//! a length-prefixed value. All integers are little-endian. The CRC covers
//! every byte before it.

use crate::batch::BatchOp;
use crate::error::{EngineError, EngineResult};
use crate::types::SequenceNumber;

/// Magic bytes opening every journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"SSJ1";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
pub const HEADER_SIZE: usize = 10;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// One committed write as stored in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Sequence assigned at commit.
    pub sequence: SequenceNumber,
    /// Operations in application order.
    pub ops: Vec<BatchOp>,
}

/// Outcome of reading one frame from the front of a buffer.
#[derive(Debug)]
pub enum FrameRead {
    /// A complete, checksummed record and the number of bytes it occupied.
    Record(JournalRecord, usize),
    /// The buffer ends in the middle of a frame (torn write).
    Incomplete,
    /// The frame is complete but does not verify.
    Corrupt(String),
}

fn len_u32(len: usize) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| EngineError::RecordTooLarge { len })
}

impl JournalRecord {
    /// Encodes the record into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RecordTooLarge`] if a key, a value or the whole
    /// payload does not fit a 4-byte length field.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        payload.extend_from_slice(&len_u32(self.ops.len())?.to_le_bytes());

        for op in &self.ops {
            match op {
                BatchOp::Put { key, value } => {
                    payload.push(TAG_PUT);
                    payload.extend_from_slice(&len_u32(key.len())?.to_le_bytes());
                    payload.extend_from_slice(key);
                    payload.extend_from_slice(&len_u32(value.len())?.to_le_bytes());
                    payload.extend_from_slice(value);
                }
                BatchOp::Delete { key } => {
                    payload.push(TAG_DELETE);
                    payload.extend_from_slice(&len_u32(key.len())?.to_le_bytes());
                    payload.extend_from_slice(key);
                }
            }
        }

        let payload_len = len_u32(payload.len())?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&JOURNAL_MAGIC);
        frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        frame.extend_from_slice(&payload_len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Reads the frame at the front of `data`.
    #[must_use]
    pub fn read_frame(data: &[u8]) -> FrameRead {
        if data.len() < HEADER_SIZE {
            return FrameRead::Incomplete;
        }
        if data[0..4] != JOURNAL_MAGIC {
            return FrameRead::Corrupt("bad frame magic".into());
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != JOURNAL_VERSION {
            return FrameRead::Corrupt(format!("unsupported journal version {version}"));
        }
        let payload_len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if data.len() < total {
            return FrameRead::Incomplete;
        }

        let body_end = HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let computed = crc32fast::hash(&data[..body_end]);
        if stored != computed {
            return FrameRead::Corrupt(format!(
                "checksum mismatch: expected {stored:08x}, got {computed:08x}"
            ));
        }

        match Self::decode_payload(&data[HEADER_SIZE..body_end]) {
            Ok(record) => FrameRead::Record(record, total),
            Err(e) => FrameRead::Corrupt(e.to_string()),
        }
    }

    fn decode_payload(payload: &[u8]) -> EngineResult<Self> {
        let mut cursor = Cursor { data: payload, pos: 0 };
        let sequence = SequenceNumber::new(cursor.u64()?);
        let count = cursor.u32()? as usize;

        // Each op needs at least a tag and a key length.
        if count > payload.len() / 5 {
            return Err(EngineError::corrupted(format!("implausible op count {count}")));
        }

        let mut ops = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = cursor.u8()?;
            let key = cursor.bytes()?;
            let op = match tag {
                TAG_PUT => BatchOp::Put {
                    key,
                    value: cursor.bytes()?,
                },
                TAG_DELETE => BatchOp::Delete { key },
                other => {
                    return Err(EngineError::corrupted(format!("unknown op tag {other}")));
                }
            };
            ops.push(op);
        }

        if cursor.pos != payload.len() {
            return Err(EngineError::corrupted("trailing bytes in record payload"));
        }
        Ok(Self { sequence, ops })
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> EngineResult<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| EngineError::corrupted("record payload truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> EngineResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> EngineResult<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    fn bytes(&mut self) -> EngineResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}
