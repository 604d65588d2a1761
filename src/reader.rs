//! Byte-range reader: endian-aware integer reads over any `Read`/`Seek`.
//!
//! Trait-based extension methods on any reader, generalised to the exact
//! word-size dispatch and seek/whence contract called for here.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Database word size: 4 bytes (pre-IDA2) or 8 bytes (IDA2 / 64-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    W4,
    W8,
}

impl WordSize {
    pub fn bytes(self) -> usize {
        match self {
            WordSize::W4 => 4,
            WordSize::W8 => 8,
        }
    }

    /// `0xFF << ((wordsize-1)*8)` -- the node base constant.
    pub fn node_base(self) -> u64 {
        0xFFu64 << ((self.bytes() - 1) * 8)
    }
}

/// Endian-aware fixed-width reads over any [`Read`] implementor. Blanket
/// implemented for every reader; callers never implement this by hand.
pub trait ByteRead: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf).map_err(eof_or_io(1))?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf).map_err(eof_or_io(2))?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u16_be(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf).map_err(eof_or_io(2))?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf).map_err(eof_or_io(4))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf).map_err(eof_or_io(4))?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf).map_err(eof_or_io(8))?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_u64_be(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf).map_err(eof_or_io(8))?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Little-endian, width dictated by the database word size.
    fn read_word(&mut self, word_size: WordSize) -> Result<u64> {
        match word_size {
            WordSize::W4 => self.read_u32_le().map(u64::from),
            WordSize::W8 => self.read_u64_le(),
        }
    }

    /// Big-endian, width dictated by the database word size (node ids in keys).
    fn read_word_be(&mut self, word_size: WordSize) -> Result<u64> {
        match word_size {
            WordSize::W4 => self.read_u32_be().map(u64::from),
            WordSize::W8 => self.read_u64_be(),
        }
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf).map_err(eof_or_io(n))?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ByteRead for R {}

fn eof_or_io(needed: usize) -> impl Fn(std::io::Error) -> Error {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated {
                needed,
                available: 0,
            }
        } else {
            Error::Io(e)
        }
    }
}

/// Whence argument for [`ByteSeek::seek_to`], mirroring `std::io::SeekFrom`.
#[derive(Debug, Clone, Copy)]
pub enum Whence {
    Begin(u64),
    Current(i64),
    End(i64),
}

impl From<Whence> for SeekFrom {
    fn from(w: Whence) -> SeekFrom {
        match w {
            Whence::Begin(n) => SeekFrom::Start(n),
            Whence::Current(n) => SeekFrom::Current(n),
            Whence::End(n) => SeekFrom::End(n),
        }
    }
}

/// Seekable extension; a seek past the logical end must fail.
pub trait ByteSeek: Seek {
    fn seek_to(&mut self, whence: Whence) -> Result<u64> {
        self.seek(whence.into()).map_err(Error::Io)
    }
}

impl<S: Seek + ?Sized> ByteSeek for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn s3_byte_reader() {
        let mut c = Cursor::new(b"3456789a".to_vec());
        assert_eq!(c.read_bytes(3).unwrap(), b"345");
        assert_eq!(c.read_bytes(5).unwrap(), b"6789a");

        let mut c = Cursor::new(b"3456789a".to_vec());
        c.seek_to(Whence::End(-1)).unwrap();
        assert_eq!(c.read_bytes(1).unwrap(), b"a");

        let mut c = Cursor::new(b"3456789a".to_vec());
        assert_eq!(c.read_u32_le().unwrap(), 0x3635_3433);

        let mut c = Cursor::new(b"3456789a".to_vec());
        assert_eq!(c.read_u32_be().unwrap(), 0x3738_3961);

        let mut c = Cursor::new(b"3456789a".to_vec());
        assert!(c.seek_to(Whence::Begin(9)).is_ok());
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn word_size_node_base() {
        assert_eq!(WordSize::W4.node_base(), 0xFF00_0000);
        assert_eq!(WordSize::W8.node_base(), 0xFF00_0000_0000_0000);
    }
}
