//! Structure types: `StructMember` and `Struct` (the `$ structs` node family).

use std::io::{Read, Seek};

use crate::error::Result;
use crate::id0::Id0;
use crate::packed::PackedDecoder;
use crate::reader::WordSize;

use super::minusone;

/// One field of a [`Struct`].
pub struct StructMember {
    raw_nodeid: u64,
    skip: u64,
    ofs: u64,
    size: u64,
    flags: u32,
    props: u32,
}

impl StructMember {
    /// Resolved node id (raw stored id plus the database's node base).
    pub fn nodeid<R: Read + Seek>(&self, id0: &Id0<R>) -> u64 {
        self.raw_nodeid + id0.node_base()
    }

    /// Bytes skipped (padding) before this member.
    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn ofs(&self) -> u64 {
        self.ofs
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn props(&self) -> u32 {
        self.props
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid(id0))
    }

    pub fn enumid<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u64> {
        Ok(minusone(id0.getuint(self.nodeid(id0), b'A', 11)?))
    }

    pub fn structid<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u64> {
        Ok(minusone(id0.getuint(self.nodeid(id0), b'A', 3)?))
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid(id0), b'S', if repeatable { 1 } else { 0 })
    }

    pub fn ptrinfo<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getdata(self.nodeid(id0), b'S', 9)
    }

    pub fn typeinfo<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getdata(self.nodeid(id0), b'S', 0x3000)
    }
}

/// A structure type: an ordered list of [`StructMember`]s decoded from one
/// packed-integer blob.
pub struct Struct {
    nodeid: u64,
    flags: u32,
    members: Vec<StructMember>,
    seqnr: u32,
}

impl Struct {
    pub fn open<R: Read + Seek>(id0: &Id0<R>, nodeid: u64) -> Result<Self> {
        let blob = id0.blob_all(nodeid, b'M')?;
        let is64 = matches!(id0.word_size(), WordSize::W8);
        let mut dec = PackedDecoder::new(&blob);

        let flags = dec.next32()?;
        let nmember = dec.next32()?;

        let mut members = Vec::with_capacity(nmember as usize);
        let mut ofs = 0u64;
        for _ in 0..nmember {
            let member_nodeid = dec.nextword(is64)?;
            let skip = dec.nextword(is64)?;
            let size = dec.nextword(is64)?;
            let member_flags = dec.next32()?;
            let props = dec.next32()?;
            ofs += skip;
            members.push(StructMember {
                raw_nodeid: member_nodeid,
                skip,
                ofs,
                size,
                flags: member_flags,
                props,
            });
            ofs += size;
        }

        let seqnr = if !dec.eof() { dec.next32()? } else { 0 };

        Ok(Struct {
            nodeid,
            flags,
            members,
            seqnr,
        })
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn seqnr(&self) -> u32 {
        self.seqnr
    }

    pub fn members(&self) -> &[StructMember] {
        &self.members
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }
}
