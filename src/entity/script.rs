//! IDC/Python scripts stored in the database (`$ scripts` node family).

use std::io::{Read, Seek};

use crate::error::Result;
use crate::id0::Id0;
use crate::nodekey::getstr;

pub struct Script {
    nodeid: u64,
}

impl Script {
    pub fn new(nodeid: u64) -> Self {
        Script { nodeid }
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', 0)
    }

    pub fn language<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', 1)
    }

    pub fn body<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        let blob = id0.blob_all(self.nodeid, b'X')?;
        Ok(getstr(&blob).to_vec())
    }
}
