//! The B-tree page layer and engine: page decoding plus the root-to-leaf
//! descent and cursor built on top of it.

pub mod cursor;
pub mod page;

pub use cursor::{BtreeEngine, Cursor, Rel};
pub use page::{Action, BtreeHeader, BtreeVersion, Page};
