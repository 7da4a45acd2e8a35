use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::Result;

/// Append-only little-endian writer matching [`super::StateReader`].
#[derive(Debug)]
pub struct StateWriter<W: Write> {
    sink: W,
}

impl<W: Write> StateWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.sink.write_i32::<LittleEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.sink.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.sink.write_f32::<LittleEndian>(value)?)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        Ok(self.sink.write_f64::<LittleEndian>(value)?)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        Ok(self.sink.write_u8(u8::from(value))?)
    }

    /// Writes UTF-8 followed by a NUL terminator. Interior NULs are dropped
    /// since they would end the string early on read.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes: Vec<u8> = value.bytes().filter(|&byte| byte != 0).collect();
        self.sink.write_all(&bytes)?;
        Ok(self.sink.write_u8(0)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.sink.write_all(bytes)?)
    }
}
