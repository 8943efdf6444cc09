pub mod entry;
pub mod graph;
pub mod ident;
pub mod source;
pub mod vname;

pub use entry::Entry;
pub use graph::{
    AccessSpecifier, Claimability, Completeness, EdgeKind, EnumKind, NodeKind, Property,
    RecordKind, Specificity,
};
pub use ident::{ClaimToken, NameId, NodeId};
pub use source::{EntryId, FileEntry, FileId, FileUid, Loc, Range, SourceMap};
pub use vname::VName;
