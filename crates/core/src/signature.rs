//! Deterministic encodings of source locations and ranges into identity
//! signatures, including the anchor VName construction.

use xrefscope_api::models::{FileId, Loc, Range, SourceMap, VName};
use xxhash_rust::xxh3::xxh3_64;

// 64 characters that can appear in identifiers (plus $ from Java).
const SAFE_ENCODING_CHARACTERS: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyz0123456789_$ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BITS_PER_CHARACTER: u32 = 6;

/// Returns a compact string representation of `hash` over a 64-character
/// identifier-safe alphabet.
pub fn hash_to_string(hash: u64) -> String {
    if hash == 0 {
        return String::new();
    }
    let set_bit = u64::BITS - hash.leading_zeros();
    let mut pos = set_bit.div_ceil(BITS_PER_CHARACTER) as usize;
    let mut out = vec![SAFE_ENCODING_CHARACTERS[0]; pos];
    let mut rest = hash;
    while rest != 0 {
        pos -= 1;
        out[pos] = SAFE_ENCODING_CHARACTERS[(rest & ((1 << BITS_PER_CHARACTER) - 1)) as usize];
        rest >>= BITS_PER_CHARACTER;
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Encodes locations into signature buffers.
///
/// The encoder remembers which file ids it has already spelled out within
/// one encoding and refers back to them as `@.<index>` so that deep macro
/// chains through the same file stay compact.
pub struct LocationEncoder<'a> {
    sources: &'a SourceMap,
    posted_files: Vec<FileId>,
}

impl<'a> LocationEncoder<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        LocationEncoder {
            sources,
            posted_files: Vec::new(),
        }
    }

    /// Appends a full serialization of `loc`, recurring through macro
    /// expansion structure.
    pub fn append_location(&mut self, loc: &Loc, out: &mut String) {
        match loc {
            Loc::Invalid => out.push_str("invalid"),
            Loc::File { file, offset } => {
                let entry = self.sources.entry_for(*file);
                if entry.is_some() {
                    out.push_str(&offset.to_string());
                } else {
                    self.append_buffer_slice_hash(*file, *offset, out);
                }
                // Don't inline the same file id multiple times. File ids for
                // the same entry stay distinct: they represent separate
                // inclusions.
                for (index, posted) in self.posted_files.iter().enumerate() {
                    if posted == file {
                        out.push_str("@.");
                        out.push_str(&index.to_string());
                        return;
                    }
                }
                self.posted_files.push(*file);
                if let Some(entry) = entry {
                    if !entry.vname.corpus.is_empty() {
                        out.push_str(&entry.vname.corpus);
                        out.push('/');
                    }
                    if !entry.vname.root.is_empty() {
                        out.push_str(&entry.vname.root);
                        out.push('/');
                    }
                    out.push_str(&entry.vname.path);
                }
            }
            Loc::Macro {
                expansion,
                spelling,
            } => {
                self.append_location(expansion, out);
                out.push('@');
                self.append_location(spelling, out);
            }
        }
    }

    /// Appends a stable representation of a position in an entry-less
    /// buffer: the hash of the token text at the offset, or an explicit
    /// invalid marker when the offset is out of range.
    fn append_buffer_slice_hash(&self, file: FileId, offset: u32, out: &mut String) {
        let offset = offset as usize;
        match self.sources.text_for(file) {
            Some(text) if offset < text.len() => {
                let token = token_slice_at(text, offset);
                out.push_str(&hash_to_string(xxh3_64(token.as_bytes())));
            }
            _ => {
                out.push_str("!invalid[");
                out.push_str(&offset.to_string());
                out.push(']');
            }
        }
    }
}

/// The token-ish slice starting at `offset`: the maximal identifier run,
/// or a single character when the offset points at punctuation.
fn token_slice_at(text: &str, offset: usize) -> &str {
    let rest = &text[offset..];
    let end = rest
        .char_indices()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, c)| i + c.len_utf8());
    match end {
        Some(end) => &rest[..end],
        None => {
            let first = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(0);
            &rest[..first]
        }
    }
}

/// Appends a string representation of `range` to `out`. Returns false if
/// the range was invalid.
///
/// When the end location equals the begin location its encoding is elided;
/// the anchor VName signature built by [`anchor_vname`] never elides it.
/// That asymmetry is part of the cross-unit identity contract.
pub fn append_range(sources: &SourceMap, range: &Range, out: &mut String) -> bool {
    if !range.is_valid() {
        return false;
    }
    let mut encoder = LocationEncoder::new(sources);
    encoder.append_location(range.begin(), out);
    if range.end() != range.begin() {
        encoder.append_location(range.end(), out);
    }
    if let Some(context) = range.context() {
        out.push_str(&context.claimed_string());
    }
    true
}

/// Constructs the VName addressing the anchor for `range`.
///
/// The base identity comes from the begin location's file entry (searching
/// through macro expansion history), falling back to the Wraith context's
/// VName and finally to a language-only VName. The signature then gains
/// `@<begin>:<end>` in expansion offsets, plus the claimed context string
/// for Wraith ranges.
pub fn anchor_vname(sources: &SourceMap, range: &Range, language: &str) -> VName {
    let begin = range.begin().expansion();
    let end = range.end().expansion();
    let mut vname = if let Some(entry) = sources.search_file_entry(begin) {
        entry.vname.clone()
    } else if let Some(context) = range.context() {
        context.to_vname(language)
    } else {
        VName::for_language(language)
    };
    vname.signature.push('@');
    vname.signature.push_str(&begin.file_offset().to_string());
    vname.signature.push(':');
    vname.signature.push_str(&end.file_offset().to_string());
    if let Some(context) = range.context() {
        vname.signature.push('@');
        vname.signature.push_str(&context.claimed_string());
    }
    vname
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xrefscope_api::models::{ClaimToken, FileUid, NodeId};

    fn sources() -> (SourceMap, FileId, FileId) {
        let mut map = SourceMap::new();
        let entry = map.add_file(
            "dir/a.cc",
            FileUid(7),
            VName::for_file("corpus", "", "dir/a.cc", "c++"),
            "int main() {}",
        );
        let file = map.push_inclusion(entry);
        let scratch = map.add_scratch("TOKEN rest");
        (map, file, scratch)
    }

    #[test]
    fn hash_encoding_is_compact_and_stable() {
        assert_eq!(hash_to_string(0), "");
        assert_eq!(hash_to_string(1), "b");
        let h = hash_to_string(0x0123_4567_89ab_cdef);
        assert_eq!(h, hash_to_string(0x0123_4567_89ab_cdef));
        assert!(h.len() <= 11);
    }

    #[test]
    fn file_location_spells_offset_and_path() {
        let (map, file, _) = sources();
        let mut out = String::new();
        LocationEncoder::new(&map).append_location(&Loc::file(file, 4), &mut out);
        assert_eq!(out, "4corpus/dir/a.cc");
    }

    #[test]
    fn repeated_file_ids_backreference() {
        let (map, file, _) = sources();
        let loc = Loc::in_macro(Loc::file(file, 0), Loc::file(file, 4));
        let mut out = String::new();
        LocationEncoder::new(&map).append_location(&loc, &mut out);
        assert_eq!(out, "0corpus/dir/a.cc@4@.0");
    }

    #[test]
    fn scratch_buffers_hash_their_token() {
        let (map, _, scratch) = sources();
        let mut out = String::new();
        LocationEncoder::new(&map).append_location(&Loc::file(scratch, 0), &mut out);
        assert_eq!(out, hash_to_string(xxh3_64(b"TOKEN")));

        let mut bad = String::new();
        LocationEncoder::new(&map).append_location(&Loc::file(scratch, 999), &mut bad);
        assert_eq!(bad, "!invalid[999]");
    }

    #[test]
    fn range_encoding_elides_equal_end() {
        let (map, file, _) = sources();
        let begin = Loc::file(file, 3);
        let mut collapsed = String::new();
        assert!(append_range(
            &map,
            &Range::physical(begin.clone(), begin.clone()),
            &mut collapsed
        ));
        let mut spread = String::new();
        assert!(append_range(
            &map,
            &Range::physical(begin.clone(), Loc::file(file, 5)),
            &mut spread
        ));
        assert!(spread.len() > collapsed.len());
        let mut invalid = String::new();
        assert!(!append_range(
            &map,
            &Range::physical(Loc::Invalid, begin),
            &mut invalid
        ));
    }

    #[test]
    fn anchor_vname_always_keeps_end_offset() {
        let (map, file, _) = sources();
        let begin = Loc::file(file, 3);
        let vname = anchor_vname(&map, &Range::physical(begin.clone(), begin), "c++");
        assert_eq!(vname.signature, "@3:3");
        assert_eq!(vname.path, "dir/a.cc");
    }

    #[test]
    fn wraith_anchor_falls_back_to_context() {
        let (mut map, _, _) = sources();
        let scratch = map.add_scratch("x");
        let context = NodeId::new(Arc::new(ClaimToken::claimed_default()), "ctx");
        let vname = anchor_vname(
            &map,
            &Range::wraith(Loc::file(scratch, 0), Loc::file(scratch, 1), context),
            "c++",
        );
        assert_eq!(vname.signature, "ctx@0:1@ctx");
    }
}
