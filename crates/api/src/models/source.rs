use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ident::NodeId;
use super::vname::VName;

/// One *inclusion* of a file. Many `FileId`s may share a `FileEntry` when
/// the same header is entered repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Filesystem identity of a file, shared by all of its inclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileUid(pub u64);

/// Index of a registered `FileEntry` in a `SourceMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub u32);

/// A registered source file: path, filesystem identity, and the VName the
/// driver's vname generator assigned to it.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub uid: FileUid,
    pub vname: VName,
}

/// A source location, possibly inside a macro expansion.
///
/// Macro locations form a chain: both sides eventually terminate in a file
/// location or an invalid one. The expansion side points at the text that
/// triggered the substitution; the spelling side at the text that was
/// substituted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Loc {
    Invalid,
    File { file: FileId, offset: u32 },
    Macro { expansion: Box<Loc>, spelling: Box<Loc> },
}

impl Loc {
    pub fn file(file: FileId, offset: u32) -> Self {
        Loc::File { file, offset }
    }

    pub fn in_macro(expansion: Loc, spelling: Loc) -> Self {
        Loc::Macro {
            expansion: Box::new(expansion),
            spelling: Box::new(spelling),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Loc::Invalid)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Loc::File { .. })
    }

    /// The outermost file location reached by following expansion links.
    pub fn expansion(&self) -> &Loc {
        match self {
            Loc::Macro { expansion, .. } => expansion.expansion(),
            other => other,
        }
    }

    /// The file location reached by following spelling links.
    pub fn spelling(&self) -> &Loc {
        match self {
            Loc::Macro { spelling, .. } => spelling.spelling(),
            other => other,
        }
    }

    /// Byte offset within the containing file; macro locations report the
    /// offset of their expansion.
    pub fn file_offset(&self) -> u32 {
        match self.expansion() {
            Loc::File { offset, .. } => *offset,
            _ => 0,
        }
    }

    /// The `FileId` of the expansion-side file, if any.
    pub fn file_id(&self) -> Option<FileId> {
        match self.expansion() {
            Loc::File { file, .. } => Some(*file),
            _ => None,
        }
    }
}

/// A range of source text, potentially re-interpreted under a surrounding
/// declaration.
///
/// A `Wraith` range has a physical span shared with other semantic
/// occurrences (an implicit template instantiation shares text with its
/// primary template) and is distinguished by the context `NodeId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Range {
    Physical { begin: Loc, end: Loc },
    Wraith { begin: Loc, end: Loc, context: NodeId },
}

impl Range {
    pub fn physical(begin: Loc, end: Loc) -> Self {
        Range::Physical { begin, end }
    }

    pub fn wraith(begin: Loc, end: Loc, context: NodeId) -> Self {
        Range::Wraith {
            begin,
            end,
            context,
        }
    }

    pub fn begin(&self) -> &Loc {
        match self {
            Range::Physical { begin, .. } | Range::Wraith { begin, .. } => begin,
        }
    }

    pub fn end(&self) -> &Loc {
        match self {
            Range::Physical { end, .. } | Range::Wraith { end, .. } => end,
        }
    }

    pub fn context(&self) -> Option<&NodeId> {
        match self {
            Range::Physical { .. } => None,
            Range::Wraith { context, .. } => Some(context),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.begin().is_valid() && self.end().is_valid()
    }
}

#[derive(Debug, Default)]
struct SourceFile {
    entry: Option<EntryId>,
    scratch: Option<Arc<str>>,
}

/// The driver's view of the translation unit's files and buffers.
///
/// Built before observation begins and read-only during a run. Entries are
/// registered once per file; inclusions mint a fresh `FileId` per entry into
/// the file, and scratch buffers (macro argument spellings and the like)
/// get ids with content but no entry.
#[derive(Debug, Default)]
pub struct SourceMap {
    entries: Vec<FileEntry>,
    texts: Vec<Arc<str>>,
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file and its content, returning its entry id.
    pub fn add_file(
        &mut self,
        path: impl Into<PathBuf>,
        uid: FileUid,
        vname: VName,
        text: impl Into<Arc<str>>,
    ) -> EntryId {
        let id = EntryId(self.entries.len() as u32);
        self.entries.push(FileEntry {
            path: path.into(),
            uid,
            vname,
        });
        self.texts.push(text.into());
        id
    }

    /// Mints a `FileId` for one inclusion of a registered file.
    pub fn push_inclusion(&mut self, entry: EntryId) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            entry: Some(entry),
            scratch: None,
        });
        id
    }

    /// Mints a `FileId` for a buffer with no backing file.
    pub fn add_scratch(&mut self, text: impl Into<Arc<str>>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            entry: None,
            scratch: Some(text.into()),
        });
        id
    }

    pub fn entry(&self, id: EntryId) -> &FileEntry {
        &self.entries[id.0 as usize]
    }

    pub fn entry_text(&self, id: EntryId) -> &str {
        &self.texts[id.0 as usize]
    }

    /// The `FileEntry` backing an inclusion, `None` for scratch buffers.
    pub fn entry_for(&self, file: FileId) -> Option<&FileEntry> {
        self.files
            .get(file.0 as usize)
            .and_then(|f| f.entry)
            .map(|e| self.entry(e))
    }

    /// The character buffer for an inclusion or scratch file.
    pub fn text_for(&self, file: FileId) -> Option<&str> {
        let source = self.files.get(file.0 as usize)?;
        if let Some(entry) = source.entry {
            Some(self.entry_text(entry))
        } else {
            source.scratch.as_deref()
        }
    }

    /// Maps a lookup path to its filesystem identity, used by the
    /// preprocessor-context loader.
    pub fn status(&self, path: &Path) -> Option<(FileUid, bool)> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| (e.uid, true))
    }

    /// Associates a location with a `FileEntry` by searching through its
    /// macro expansion history: the location itself, then the expansion
    /// side, then the spelling side.
    pub fn search_file_entry(&self, loc: &Loc) -> Option<&FileEntry> {
        match loc {
            Loc::Invalid => None,
            Loc::File { file, .. } => self.entry_for(*file),
            Loc::Macro {
                expansion,
                spelling,
            } => self
                .search_file_entry(expansion)
                .or_else(|| self.search_file_entry(spelling)),
        }
    }
}
