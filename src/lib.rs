#![forbid(unsafe_code)]
//! Read-only parser for a proprietary interactive-disassembler database
//! container: section framing, the B-tree node store, and the typed entity
//! layer built on top of it (structs, enums, bitfields, scripts), plus the
//! flag map and name index that live in separate sections.

pub mod btree;
pub mod container;
pub mod entity;
pub mod error;
pub mod id0;
pub mod id1;
pub mod nam;
pub mod nodekey;
pub mod packed;
pub mod reader;
pub mod section;

use std::io::{Read, Seek};

use tracing::instrument;

use container::{Container, Generation};
use error::Result;
use id0::Id0;
use id1::Id1;
use nam::Nam;
use reader::WordSize;

const SECTION_ID0: usize = 0;
const SECTION_ID1: usize = 1;
const SECTION_NAM: usize = 2;

/// A fully opened database: the container plus whichever of the ID0/ID1/NAM
/// sections are present and uncompressed. Section 0 (ID0) is required; the
/// flag map and name index are optional (some stripped databases omit them).
pub struct Database<R> {
    container: Container<R>,
    word_size: WordSize,
}

impl<R: Read + Seek> Database<R> {
    #[instrument(skip(reader))]
    pub fn open(reader: R) -> Result<Self> {
        let container = Container::open(reader)?;
        let word_size = container.word_size();
        Ok(Database {
            container,
            word_size,
        })
    }

    pub fn generation(&self) -> Generation {
        self.container.generation()
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// Open the node store (ID0). Fails if the section is absent or
    /// compressed.
    pub fn id0(&self) -> Result<Id0<R>> {
        let section = self.container.get_section(SECTION_ID0)?;
        Id0::open(section, self.word_size)
    }

    /// Open the flag map (ID1), if present.
    pub fn id1(&self) -> Result<Option<Id1<R>>> {
        if self.container.section_count() <= SECTION_ID1 {
            return Ok(None);
        }
        match self.container.get_section(SECTION_ID1) {
            Ok(section) => Ok(Some(Id1::open(section, self.word_size)?)),
            Err(error::Error::OutOfBounds(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Open the name index (NAM), if present.
    pub fn nam(&self) -> Result<Option<Nam<R>>> {
        if self.container.section_count() <= SECTION_NAM {
            return Ok(None);
        }
        match self.container.get_section(SECTION_NAM) {
            Ok(section) => Ok(Some(Nam::open(section, self.word_size)?)),
            Err(error::Error::OutOfBounds(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
