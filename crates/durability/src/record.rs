//! WAL record format.
//!
//! ```text
//! ┌──────────────┬──────────────┬───────────────────┬───────────┐
//! │ length (4 LE)│ generation(8)│ payload (variable) │ crc32 (4) │
//! └──────────────┴──────────────┴───────────────────┴───────────┘
//! ```
//!
//! `length` covers `generation` + `payload`. Carries the one field this
//! crate's records need beyond the raw payload: the generation the batch
//! was committed under.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

/// One durable WAL entry: an opaque, already-encoded write batch plus the
/// generation it was committed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// The generation assigned to this batch (spec §4.4 step 3).
    pub generation: u64,
    /// Opaque, caller-encoded payload (the substrate's own batch encoding).
    pub payload: Vec<u8>,
}

impl WalRecord {
    /// Encode this record to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let body_len = 8 + self.payload.len();
        w.write_u32::<LittleEndian>(body_len as u32)?;
        w.write_u64::<LittleEndian>(self.generation)?;
        w.write_all(&self.payload)?;

        let mut hasher = Hasher::new();
        hasher.update(&self.generation.to_le_bytes());
        hasher.update(&self.payload);
        w.write_u32::<LittleEndian>(hasher.finalize())?;
        Ok(())
    }

    /// Decode one record from `r`, or `Ok(None)` at a clean EOF (no partial
    /// trailing record). Returns an error on truncation or a CRC mismatch —
    /// both indicate the tail of the log was torn by a crash mid-write.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let body_len = match r.read_u32::<LittleEndian>() {
            Ok(n) => n as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        if body_len < 8 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated WAL record header"));
        }
        let generation = r.read_u64::<LittleEndian>()?;
        let mut payload = vec![0u8; body_len - 8];
        r.read_exact(&mut payload)?;
        let stored_crc = r.read_u32::<LittleEndian>()?;

        let mut hasher = Hasher::new();
        hasher.update(&generation.to_le_bytes());
        hasher.update(&payload);
        if hasher.finalize() != stored_crc {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "WAL record CRC mismatch"));
        }
        Ok(Some(WalRecord { generation, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let rec = WalRecord { generation: 42, payload: vec![1, 2, 3, 4] };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let decoded = WalRecord::read_from(&mut cur).unwrap().unwrap();
        assert_eq!(decoded, rec);
        assert!(WalRecord::read_from(&mut cur).unwrap().is_none());
    }

    #[test]
    fn detects_corruption() {
        let rec = WalRecord { generation: 1, payload: vec![9, 9] };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let mut cur = Cursor::new(buf);
        assert!(WalRecord::read_from(&mut cur).is_err());
    }
}
