use byteorder::{ByteOrder, LittleEndian};

use crate::{PadError, Result};

/// Sequential little-endian reader over a borrowed byte slice. Every read
/// checks the remaining length first and fails with
/// [`PadError::UnexpectedEof`] instead of reading past the end.
#[derive(Debug, Clone, Copy)]
pub struct StateReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take(4).map(LittleEndian::read_i32)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.take(4).map(LittleEndian::read_f32)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take(8).map(LittleEndian::read_f64)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.take(1).map(|bytes| bytes[0] != 0)
    }

    /// Reads a NUL-terminated UTF-8 string. Invalid sequences are replaced;
    /// a missing terminator counts as running out of input.
    pub fn read_string(&mut self) -> Result<String> {
        let rest = &self.data[self.position..];
        let Some(end) = rest.iter().position(|&byte| byte == 0) else {
            return Err(PadError::UnexpectedEof {
                needed: rest.len() + 1,
                remaining: rest.len(),
            });
        };
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.position += end + 1;
        Ok(text)
    }

    /// Looks at the next int without consuming it.
    pub fn peek_i32(&self) -> Option<i32> {
        self.peek_i32_at(0)
    }

    pub fn peek_i32_at(&self, offset: usize) -> Option<i32> {
        let start = self.position.checked_add(offset)?;
        let end = start.checked_add(4)?;
        self.data.get(start..end).map(LittleEndian::read_i32)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Splits off the next `len` bytes (fewer if the stream is shorter) as
    /// an independent reader and moves past them.
    pub fn split_off(&mut self, len: usize) -> StateReader<'a> {
        let end = self.position + len.min(self.remaining());
        let section = StateReader::new(&self.data[self.position..end]);
        self.position = end;
        section
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(PadError::UnexpectedEof {
                needed: count,
                remaining,
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }
}

/// Reads an optional field: `None` when the stream is already exhausted or
/// the read fails, so the caller can fall back to a default.
pub fn attempt<'a, T>(
    reader: &mut StateReader<'a>,
    what: &'static str,
    read: impl FnOnce(&mut StateReader<'a>) -> Result<T>,
) -> Option<T> {
    if reader.is_exhausted() {
        return None;
    }
    match read(reader) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(field = what, %err, "optional field unreadable, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_primitives() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-2_i32).to_le_bytes());
        bytes.extend_from_slice(&1.5_f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25_f64).to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(b"hi\0");

        let mut reader = StateReader::new(&bytes);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -0.25);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "hi");
        assert!(reader.is_exhausted());
    }

    #[test]
    fn short_reads_do_not_advance() {
        let bytes = [1_u8, 2, 3];
        let mut reader = StateReader::new(&bytes);

        let err = reader.read_i32().unwrap_err();
        assert!(err.is_eof());
        assert_eq!(reader.position(), 0);
        assert!(reader.read_string().unwrap_err().is_eof());
    }

    #[test]
    fn peek_leaves_position_alone() {
        let bytes = 7_i32.to_le_bytes();
        let mut reader = StateReader::new(&bytes);

        assert_eq!(reader.peek_i32(), Some(7));
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.peek_i32_at(1), None);
        assert_eq!(reader.read_i32().unwrap(), 7);
    }

    #[test]
    fn split_off_clamps_to_available_bytes() {
        let bytes = [0_u8; 6];
        let mut reader = StateReader::new(&bytes);
        reader.skip(2).unwrap();

        let section = reader.split_off(10);
        assert_eq!(section.remaining(), 4);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn attempt_falls_back_on_exhaustion() {
        let bytes = [5_u8, 0];
        let mut reader = StateReader::new(&bytes);

        assert_eq!(attempt(&mut reader, "int", StateReader::read_i32), None);
        assert_eq!(attempt(&mut reader, "flag", StateReader::read_bool), Some(true));
        assert_eq!(attempt(&mut reader, "flag", StateReader::read_bool), Some(false));
        assert_eq!(attempt(&mut reader, "flag", StateReader::read_bool), None);
    }
}
