//! B-tree engine (root-to-leaf descent) and bidirectional cursor.

use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use tracing::instrument;

use crate::btree::page::{Action, BtreeHeader, BtreeVersion, Page};
use crate::error::{Error, Result};
use crate::section::SectionStream;

/// Query relation for [`BtreeEngine::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
}

/// How a cursor, landed by descent on `act`, must move to satisfy `rel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Unchanged,
    Cleared,
    Next,
    Prev,
}

/// The relation-adjustment table: what a cursor that landed on `act` during
/// descent must do to satisfy the caller's requested `rel`.
fn adjustment(rel: Rel, act: Action) -> Adjustment {
    let act_eq_rel = matches!(
        (rel, act),
        (Rel::Less, Action::Less) | (Rel::Equal, Action::Equal) | (Rel::Greater, Action::Greater)
    );

    if act_eq_rel {
        Adjustment::Unchanged
    } else if rel == Rel::Equal && act != Action::Equal {
        Adjustment::Cleared
    } else if matches!(rel, Rel::LessEqual | Rel::GreaterEqual) && act == Action::Equal {
        Adjustment::Unchanged
    } else if matches!(rel, Rel::Greater | Rel::GreaterEqual) && act == Action::Less {
        Adjustment::Next
    } else if rel == Rel::Greater && act == Action::Equal {
        Adjustment::Next
    } else if matches!(rel, Rel::Less | Rel::LessEqual) && act == Action::Greater {
        Adjustment::Prev
    } else if rel == Rel::Less && act == Action::Equal {
        Adjustment::Prev
    } else {
        Adjustment::Unchanged
    }
}

/// Root-to-leaf descent plus page I/O over a shared `SectionStream`.
pub struct BtreeEngine<R> {
    stream: SectionStream<R>,
    header: BtreeHeader,
}

impl<R: Read + Seek> BtreeEngine<R> {
    #[instrument(skip(stream))]
    pub fn open(mut stream: SectionStream<R>) -> Result<Self> {
        stream.seek_checked(SeekFrom::Start(0))?;
        let probe_len = stream.len().min(64) as usize;
        let mut probe = vec![0u8; probe_len];
        stream.read_exact_checked(&mut probe)?;
        let version = BtreeVersion::detect(&probe)?;

        stream.seek_checked(SeekFrom::Start(0))?;
        // the header fields all live within the first 32 bytes of page 0
        let header_probe_len = stream.len().min(32) as usize;
        let mut header_probe = vec![0u8; header_probe_len];
        stream.read_exact_checked(&mut header_probe)?;
        let header = BtreeHeader::decode(version, &header_probe)?;

        Ok(BtreeEngine { stream, header })
    }

    pub fn header(&self) -> BtreeHeader {
        self.header
    }

    pub fn read_page(&self, nr: u64) -> Result<Rc<Page>> {
        let page_size = self.header.page_size;
        let start = nr
            .checked_mul(page_size)
            .ok_or_else(|| Error::OutOfBounds(format!("page number {nr} overflows")))?;
        let mut stream = self.stream.clone();
        stream.seek_checked(SeekFrom::Start(start))?;
        let available = stream.len().saturating_sub(start).min(page_size);
        let mut raw = vec![0u8; available as usize];
        stream.read_exact_checked(&mut raw)?;
        Ok(Rc::new(Page::decode(self.header.version, raw)?))
    }

    /// Root-to-leaf descent plus relation adjustment.
    #[instrument(skip(self, key), fields(key_len = key.len()))]
    pub fn find(&self, rel: Rel, key: &[u8]) -> Result<Cursor<'_, R>> {
        let mut page = self.read_page(self.header.first_index_page)?;
        let mut stack = Vec::new();
        let act;
        loop {
            let (a, index) = page.find(key)?;
            stack.push((page.clone(), index));
            if a != Action::Recurse {
                act = a;
                break;
            }
            let child = page.getpage(index)?;
            page = self.read_page(child)?;
        }

        let mut cursor = Cursor {
            engine: self,
            stack,
        };

        match adjustment(rel, act) {
            Adjustment::Unchanged => {}
            Adjustment::Cleared => cursor.stack.clear(),
            Adjustment::Next => cursor.next()?,
            Adjustment::Prev => cursor.prev()?,
        }

        Ok(cursor)
    }
}

/// A stack of `(page, index)` pairs; the top designates the current record.
pub struct Cursor<'e, R> {
    engine: &'e BtreeEngine<R>,
    stack: Vec<(Rc<Page>, i64)>,
}

impl<'e, R: Read + Seek> Cursor<'e, R> {
    pub fn eof(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn add(&mut self, page: Rc<Page>, index: i64) {
        self.stack.push((page, index));
    }

    pub fn getkey(&self) -> Result<Vec<u8>> {
        let (page, index) = self
            .stack
            .last()
            .ok_or_else(|| Error::OutOfBounds("cursor: getkey() at eof".into()))?;
        page.getkey(*index as usize)
    }

    pub fn getval(&self) -> Result<Vec<u8>> {
        let (page, index) = self
            .stack
            .last()
            .ok_or_else(|| Error::OutOfBounds("cursor: getval() at eof".into()))?;
        page.getval(*index as usize)
    }

    /// Advance towards the next key in ascending order.
    pub fn next(&mut self) -> Result<()> {
        let (mut page, mut index) = self
            .stack
            .pop()
            .ok_or_else(|| Error::OutOfBounds("cursor: next() at eof".into()))?;
        if page.is_leaf() {
            index += 1;
            while !self.stack.is_empty() && index as usize == page.len() {
                let (p, i) = self.stack.pop().unwrap();
                page = p;
                index = i + 1;
            }
            if (index as usize) < page.len() {
                self.stack.push((page, index));
            }
        } else {
            self.stack.push((page.clone(), index));
            let mut child = self.engine.read_page(page.getpage(index)?)?;
            while child.is_index() {
                index = -1;
                self.stack.push((child.clone(), index));
                child = self.engine.read_page(child.getpage(index)?)?;
            }
            self.stack.push((child, 0));
        }
        Ok(())
    }

    /// Retreat towards the previous key in ascending order.
    pub fn prev(&mut self) -> Result<()> {
        let (mut page, mut index) = self
            .stack
            .pop()
            .ok_or_else(|| Error::OutOfBounds("cursor: prev() at eof".into()))?;
        index -= 1;
        if page.is_leaf() {
            while !self.stack.is_empty() && index < 0 {
                let (p, i) = self.stack.pop().unwrap();
                page = p;
                index = i;
            }
            if index >= 0 {
                self.stack.push((page, index));
            }
        } else {
            self.stack.push((page.clone(), index));
            while page.is_index() {
                let child = self.engine.read_page(page.getpage(index)?)?;
                index = child.len() as i64 - 1;
                self.stack.push((child.clone(), index));
                page = child;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Rel::Less, Action::Less, Adjustment::Unchanged)]
    #[case(Rel::Less, Action::Equal, Adjustment::Prev)]
    #[case(Rel::Less, Action::Greater, Adjustment::Prev)]
    #[case(Rel::Less, Action::Recurse, Adjustment::Unchanged)]
    #[case(Rel::LessEqual, Action::Less, Adjustment::Unchanged)]
    #[case(Rel::LessEqual, Action::Equal, Adjustment::Unchanged)]
    #[case(Rel::LessEqual, Action::Greater, Adjustment::Prev)]
    #[case(Rel::LessEqual, Action::Recurse, Adjustment::Unchanged)]
    #[case(Rel::Equal, Action::Less, Adjustment::Cleared)]
    #[case(Rel::Equal, Action::Equal, Adjustment::Unchanged)]
    #[case(Rel::Equal, Action::Greater, Adjustment::Cleared)]
    #[case(Rel::Equal, Action::Recurse, Adjustment::Cleared)]
    #[case(Rel::GreaterEqual, Action::Less, Adjustment::Next)]
    #[case(Rel::GreaterEqual, Action::Equal, Adjustment::Unchanged)]
    #[case(Rel::GreaterEqual, Action::Greater, Adjustment::Unchanged)]
    #[case(Rel::GreaterEqual, Action::Recurse, Adjustment::Unchanged)]
    #[case(Rel::Greater, Action::Less, Adjustment::Next)]
    #[case(Rel::Greater, Action::Equal, Adjustment::Next)]
    #[case(Rel::Greater, Action::Greater, Adjustment::Unchanged)]
    #[case(Rel::Greater, Action::Recurse, Adjustment::Unchanged)]
    fn s7_relation_adjustment_table(#[case] rel: Rel, #[case] act: Action, #[case] expected: Adjustment) {
        assert_eq!(adjustment(rel, act), expected);
    }
}
