//! Typed entity layer built on the raw node store: structs, enums,
//! bitfields, scripts and the generic `$`-list iteration they share.

pub mod bitfield;
pub mod enum_;
pub mod list;
pub mod script;
pub mod struct_;

pub use bitfield::{Bitfield, BitfieldMask, BitfieldValue};
pub use enum_::{Enum, EnumMember};
pub use list::List;
pub use script::Script;
pub use struct_::{Struct, StructMember};

/// Used throughout the `$`-prefixed lists (structs, enums, scripts, enum and
/// bitmask values, bitfield backrefs), where the stored value is one greater
/// than the id actually referenced.
pub(crate) fn minusone(id: u64) -> u64 {
    if id != 0 {
        id - 1
    } else {
        0
    }
}
