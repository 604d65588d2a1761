//! Container parser: header generation detection and section enumeration.

use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::reader::{ByteRead, WordSize};
use crate::section::SectionStream;

const MAGIC_IDA0: u32 = 0x3041_4449;
const MAGIC_IDA1: u32 = 0x3141_4449;
const MAGIC_IDA2: u32 = 0x3241_4449;
const SENTINEL: u32 = 0xAABB_CCDD;

/// One of the three historical container generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Ida0,
    Ida1,
    Ida2,
}

impl Generation {
    pub fn word_size(self) -> WordSize {
        match self {
            Generation::Ida2 => WordSize::W8,
            Generation::Ida0 | Generation::Ida1 => WordSize::W4,
        }
    }

    fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            MAGIC_IDA0 => Ok(Generation::Ida0),
            MAGIC_IDA1 => Ok(Generation::Ida1),
            MAGIC_IDA2 => Ok(Generation::Ida2),
            _ => Err(Error::InvalidMagic(magic.to_le_bytes().to_vec())),
        }
    }
}

/// A parsed container header: generation, section offsets, and enough state
/// to hand out a bounded [`SectionStream`] for any section index.
pub struct Container<R> {
    reader: Rc<RefCell<R>>,
    generation: Generation,
    file_version: u16,
    offsets: Vec<u64>,
}

impl<R: Read + Seek> Container<R> {
    #[instrument(skip(reader), fields(generation = tracing::field::Empty, word_size = tracing::field::Empty))]
    pub fn open(reader: R) -> Result<Self> {
        let shared = Rc::new(RefCell::new(reader));
        let (generation, file_version, offsets) = {
            let mut r = shared.borrow_mut();
            r.seek(SeekFrom::Start(0))?;
            read_header(&mut *r)?
        };
        tracing::Span::current().record("generation", tracing::field::debug(&generation));
        tracing::Span::current().record(
            "word_size",
            tracing::field::debug(&generation.word_size()),
        );
        info!(file_version, sections = offsets.len(), "container opened");
        Ok(Container {
            reader: shared,
            generation,
            file_version,
            offsets,
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn word_size(&self) -> WordSize {
        self.generation.word_size()
    }

    pub fn section_count(&self) -> usize {
        self.offsets.len()
    }

    /// Seek to `offsets[i]`, read `(compression, length)`, and hand out a
    /// bounded stream over the section payload. Fails with `Unsupported`
    /// if the section is compressed.
    #[instrument(skip(self))]
    pub fn get_section(&self, i: usize) -> Result<SectionStream<R>> {
        let offset = *self
            .offsets
            .get(i)
            .ok_or_else(|| Error::OutOfBounds(format!("section index {i} out of range")))?;
        if offset == 0 {
            return Err(Error::OutOfBounds(format!("section {i} has no offset")));
        }
        let (compression, length, payload_start) = {
            let mut r = self.reader.borrow_mut();
            r.seek(SeekFrom::Start(offset))?;
            let compression = r.read_u8()?;
            let length = if self.file_version < 5 {
                u64::from(r.read_u32_le()?)
            } else {
                r.read_u64_le()?
            };
            let header_len = if self.file_version < 5 { 5 } else { 9 };
            (compression, length, offset + header_len)
        };
        if compression != 0 {
            warn!(section = i, compression, "refusing compressed section");
            return Err(Error::Unsupported(format!(
                "section {i} is compressed (code {compression}); decompression is out of scope"
            )));
        }
        Ok(SectionStream::new(
            self.reader.clone(),
            payload_start,
            payload_start + length,
        ))
    }
}

/// Parses the fixed-position header at the start of the file, including
/// the three-way branch on the generation-dependent section offset table.
fn read_header<R: Read>(r: &mut R) -> Result<(Generation, u16, Vec<u64>)> {
    let magic = r.read_u32_le()?;
    let generation = Generation::from_magic(magic)?;
    let _zero = r.read_u16_le()?;
    let mut values = [0u32; 6];
    for v in values.iter_mut() {
        *v = r.read_u32_le()?;
    }

    if values[5] != SENTINEL {
        let mut offsets: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
        offsets[5] = 0;
        return Ok((generation, 0, offsets));
    }

    let file_version = r.read_u16_le()?;
    if file_version < 5 {
        let _filler = r.read_u32_le()?;
        let mut offsets: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
        offsets.pop();
        for _ in 0..5 {
            let _checksum = r.read_u32_le()?;
        }
        let ids_offset = r.read_u32_le()?;
        let _ids_checksum = if file_version == 1 {
            u32::from(r.read_u16_le()?)
        } else {
            r.read_u32_le()?
        };
        offsets.push(u64::from(ids_offset));
        Ok((generation, file_version, offsets))
    } else {
        let mut offsets = Vec::with_capacity(6);
        offsets.push((u64::from(values[1]) << 32) | u64::from(values[0]));
        offsets.push((u64::from(values[3]) << 32) | u64::from(values[2]));
        offsets.push(r.read_u64_le()?);
        offsets.push(r.read_u64_le()?);
        offsets.push(r.read_u64_le()?);
        for _ in 0..5 {
            let _checksum = r.read_u32_le()?;
        }
        offsets.push(r.read_u64_le()?);
        let _checksum = r.read_u32_le()?;
        Ok((generation, file_version, offsets))
    }
}
