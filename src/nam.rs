//! The "NAM" name index: a sorted array of addresses that have a name.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::reader::{ByteRead, WordSize};
use crate::section::SectionStream;

pub struct Nam<R> {
    stream: SectionStream<R>,
    word_size: WordSize,
    n_names: u64,
    list_ofs: u64,
    offsets: Option<Vec<u64>>,
}

const MAGIC_VA_MASK: u32 = 0xFFF0_FFFF;
const MAGIC_VA_PREFIX: u32 = 0x0030_6156;
const MAGIC_VSTAR_A: u32 = 0x002A_4156;

impl<R: Read + Seek> Nam<R> {
    pub fn open(mut stream: SectionStream<R>, word_size: WordSize) -> Result<Self> {
        stream.seek_checked(SeekFrom::Start(0))?;
        let magic = stream.read_u32_le()?;

        let (mut n_names, list_ofs) = if magic & MAGIC_VA_MASK == MAGIC_VA_PREFIX {
            let _n_pages = stream.read_u16_le()?;
            let _eof = stream.read_u16_le()?;
            let _unknown = stream.read_word(word_size)?;
            let n_names = stream.read_word(word_size)?;
            let list_ofs = stream.read_word(word_size)?;
            (n_names, list_ofs)
        } else if magic == MAGIC_VSTAR_A {
            let _unk1 = stream.read_u32_le()?;
            let _n_pages = stream.read_u32_le()?;
            let _unk2 = stream.read_u32_le()?;
            let _eof = stream.read_u32_le()?;
            let _unknown = stream.read_word(word_size)?;
            let n_names = stream.read_word(word_size)?;
            (n_names, 0x2000u64)
        } else {
            return Err(crate::error::Error::UnknownVersion(format!(
                "nam: unrecognised magic {magic:#010x}"
            )));
        };

        if matches!(word_size, WordSize::W8) {
            n_names /= 2;
        }

        Ok(Nam {
            stream,
            word_size,
            n_names,
            list_ofs,
            offsets: None,
        })
    }

    fn load_offsets(&mut self) -> Result<&[u64]> {
        if self.offsets.is_none() {
            self.stream.seek_checked(SeekFrom::Start(self.list_ofs))?;
            let mut offsets = Vec::with_capacity(self.n_names as usize);
            for _ in 0..self.n_names {
                offsets.push(self.stream.read_word(self.word_size)?);
            }
            self.offsets = Some(offsets);
        }
        Ok(self.offsets.as_deref().unwrap())
    }

    pub fn num_names(&mut self) -> Result<usize> {
        Ok(self.load_offsets()?.len())
    }

    pub fn enumerate(&mut self) -> Result<Vec<u64>> {
        Ok(self.load_offsets()?.to_vec())
    }

    /// Largest stored address `<= ea`, or the first stored address if `ea`
    /// is below all of them. `None` when no names are stored at all.
    pub fn findname(&mut self, ea: u64) -> Result<Option<u64>> {
        let offsets = self.load_offsets()?;
        if offsets.is_empty() {
            return Ok(None);
        }
        let idx = offsets.partition_point(|&addr| addr <= ea);
        if idx == 0 {
            return Ok(Some(offsets[0]));
        }
        Ok(Some(offsets[idx - 1]))
    }

    pub fn firstnamed(&mut self) -> Result<Option<u64>> {
        Ok(self.load_offsets()?.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor as IoCursor;
    use std::rc::Rc;

    fn open(buf: Vec<u8>) -> Nam<IoCursor<Vec<u8>>> {
        let len = buf.len() as u64;
        let parent = Rc::new(RefCell::new(IoCursor::new(buf)));
        let stream = SectionStream::new(parent, 0, len);
        Nam::open(stream, WordSize::W4).unwrap()
    }

    const NAMES: [u32; 3] = [0x1000, 0x2000, 0x3000];

    /// Same three stored addresses in the `"Va0".."Va4"` layout.
    fn va_layout() -> Nam<IoCursor<Vec<u8>>> {
        let mut buf = vec![0u8; 0x60];
        buf[0..4].copy_from_slice(&0x0030_6156u32.to_le_bytes()); // magic
        buf[4..6].copy_from_slice(&0u16.to_le_bytes()); // n_pages
        buf[6..8].copy_from_slice(&0u16.to_le_bytes()); // eof
        buf[8..12].copy_from_slice(&0u32.to_le_bytes()); // unknown
        buf[12..16].copy_from_slice(&3u32.to_le_bytes()); // n_names
        buf[16..20].copy_from_slice(&0x40u32.to_le_bytes()); // list_ofs

        for (i, addr) in NAMES.iter().enumerate() {
            let ofs = 0x40 + i * 4;
            buf[ofs..ofs + 4].copy_from_slice(&addr.to_le_bytes());
        }

        open(buf)
    }

    /// The same three addresses in the `"V*A"` layout, whose name list lives
    /// at a fixed offset rather than a stored one.
    fn vstar_layout() -> Nam<IoCursor<Vec<u8>>> {
        let mut buf = vec![0u8; 0x2020];
        buf[0..4].copy_from_slice(&MAGIC_VSTAR_A.to_le_bytes());
        buf[4..8].copy_from_slice(&0u32.to_le_bytes()); // unk1
        buf[8..12].copy_from_slice(&0u32.to_le_bytes()); // n_pages
        buf[12..16].copy_from_slice(&0u32.to_le_bytes()); // unk2
        buf[16..20].copy_from_slice(&0u32.to_le_bytes()); // eof
        buf[20..24].copy_from_slice(&0u32.to_le_bytes()); // unknown
        buf[24..28].copy_from_slice(&3u32.to_le_bytes()); // n_names

        for (i, addr) in NAMES.iter().enumerate() {
            let ofs = 0x2000 + i * 4;
            buf[ofs..ofs + 4].copy_from_slice(&addr.to_le_bytes());
        }

        open(buf)
    }

    #[test]
    fn s8_nam_two_layout_parity() {
        let mut va = va_layout();
        let mut vstar = vstar_layout();

        assert_eq!(va.num_names().unwrap(), 3);
        assert_eq!(va.num_names().unwrap(), vstar.num_names().unwrap());
        assert_eq!(va.enumerate().unwrap(), vstar.enumerate().unwrap());

        for ea in [0x50u64, 0x1500, 0x2500, 0x3500] {
            assert_eq!(
                va.findname(ea).unwrap(),
                vstar.findname(ea).unwrap(),
                "mismatch at ea={ea:#x}"
            );
        }

        assert_eq!(va.findname(0x1500).unwrap(), Some(0x1000));
        assert_eq!(va.findname(0x50).unwrap(), Some(0x1000));
        assert_eq!(va.findname(0x2500).unwrap(), Some(0x2000));
        assert_eq!(va.firstnamed().unwrap(), Some(0x1000));
    }
}
