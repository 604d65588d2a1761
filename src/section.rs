//! Section stream: a bounded, seekable view over a shared parent reader.
//!
//! Multiple sections alias one underlying file handle, so this crate
//! follows a "lock + absolute position per section" discipline: the
//! parent is wrapped in `Rc<RefCell<_>>` and every section stores its own
//! absolute cursor, seeking the parent immediately before each read so that
//! interleaved use of two sections never corrupts the other's position.

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use crate::error::{Error, Result};

/// A logical byte range `[first, last)` of some shared parent stream.
#[derive(Clone)]
pub struct SectionStream<R> {
    parent: Rc<RefCell<R>>,
    first: u64,
    last: u64,
    pos: u64,
}

impl<R: Read + Seek> SectionStream<R> {
    pub fn new(parent: Rc<RefCell<R>>, first: u64, last: u64) -> Self {
        assert!(last >= first);
        SectionStream {
            parent,
            first,
            last,
            pos: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Seek within the logical range. A seek beyond the end fails; a seek
    /// exactly to the end is valid (reads from there just yield nothing).
    pub fn seek_checked(&mut self, from: SeekFrom) -> Result<u64> {
        let len = self.len() as i64;
        let new_pos = match from {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.pos as i64 + n,
            SeekFrom::End(n) => len + n,
        };
        if new_pos < 0 || new_pos > len {
            return Err(Error::OutOfBounds(format!(
                "seek to {new_pos} outside section of length {len}"
            )));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }

    pub fn read_exact_checked(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(Error::UnexpectedEof {
                offset: self.first + self.pos,
            });
        }
        Ok(())
    }
}

impl<R: Read + Seek> Read for SectionStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.len().saturating_sub(self.pos);
        let to_read = (buf.len() as u64).min(available) as usize;
        if to_read == 0 {
            return Ok(0);
        }
        let mut parent = self.parent.borrow_mut();
        parent.seek(SeekFrom::Start(self.first + self.pos))?;
        let read = parent.read(&mut buf[..to_read])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<R: Read + Seek> Seek for SectionStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_checked(pos)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn section() -> SectionStream<Cursor<Vec<u8>>> {
        let parent = Rc::new(RefCell::new(Cursor::new(b"0123456789abcdef".to_vec())));
        SectionStream::new(parent, 3, 11)
    }

    #[test]
    fn s4_section_stream() {
        let mut s = section();
        let mut buf = [0u8; 3];
        s.read_exact_checked(&mut buf).unwrap();
        assert_eq!(&buf, b"345");

        let mut buf = [0u8; 5];
        s.read_exact_checked(&mut buf).unwrap();
        assert_eq!(&buf, b"6789a");

        let mut s = section();
        s.seek_checked(SeekFrom::End(-1)).unwrap();
        let mut buf = [0u8; 1];
        s.read_exact_checked(&mut buf).unwrap();
        assert_eq!(&buf, b"a");

        let mut s = section();
        s.seek_checked(SeekFrom::Start(8)).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(s.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let mut s = section();
        assert!(s.seek_checked(SeekFrom::Start(9)).is_err());
    }
}
