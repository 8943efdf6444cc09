use std::io::Write;

use tracing::error;

use xrefscope_api::models::entry::{NODE_KIND_FACT, ORDINAL_FACT};
use xrefscope_api::models::{Entry, NodeKind, Property, VName};
use xrefscope_api::{FactSink, SinkError};

/// Layers the node/edge record shapes over a raw fact sink.
///
/// Node facts are emitted one property per record while a [`NodeRecord`] is
/// live; edges are refused while a node is open by construction, since the
/// builder holds the only mutable borrow of the recorder.
pub struct FactRecorder {
    sink: Box<dyn FactSink>,
    failed: bool,
}

impl FactRecorder {
    pub fn new(sink: Box<dyn FactSink>) -> Self {
        FactRecorder {
            sink,
            failed: false,
        }
    }

    /// Begins recording a node with a known kind.
    pub fn node(&mut self, vname: &VName, kind: NodeKind) -> NodeRecord<'_> {
        self.node_with_kind(vname, kind.spelling())
    }

    /// Begins recording a node with a caller-provided kind.
    pub fn node_with_kind(&mut self, vname: &VName, kind: &str) -> NodeRecord<'_> {
        self.send(Entry::node_fact(vname.clone(), NODE_KIND_FACT, kind));
        NodeRecord {
            recorder: self,
            vname: vname.clone(),
        }
    }

    pub fn add_edge(&mut self, from: &VName, kind: &str, to: &VName) {
        self.send(Entry::edge(from.clone(), kind, to.clone()));
    }

    pub fn add_edge_with_ordinal(&mut self, from: &VName, kind: &str, to: &VName, ordinal: u32) {
        self.send(Entry::edge_with_ordinal(from.clone(), kind, to.clone(), ordinal));
    }

    /// Records the content of a file visited during extraction.
    pub fn add_file_content(&mut self, file_vname: &VName, content: &str) {
        self.node(file_vname, NodeKind::File)
            .property(Property::Text, content);
    }

    /// Whether any sink append has failed so far.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn send(&mut self, entry: Entry) {
        if let Err(err) = self.sink.emit(entry) {
            error!("fact sink append failed: {err}");
            self.failed = true;
        }
    }
}

/// An open node record. Properties are appended as they are added; the
/// node closes when the record is dropped.
pub struct NodeRecord<'a> {
    recorder: &'a mut FactRecorder,
    vname: VName,
}

impl NodeRecord<'_> {
    pub fn property(self, property: Property, value: &str) -> Self {
        self.recorder
            .send(Entry::node_fact(self.vname.clone(), property.spelling(), value));
        self
    }

    pub fn property_offset(self, property: Property, offset: u32) -> Self {
        let value = offset.to_string();
        self.property(property, &value)
    }
}

/// Writes each record as one JSON object per line.
pub struct JsonWriterSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriterSink<W> {
    pub fn new(writer: W) -> Self {
        JsonWriterSink { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FactSink for JsonWriterSink<W> {
    fn emit(&mut self, entry: Entry) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrefscope_api::VecSink;

    #[test]
    fn node_record_emits_kind_then_properties() {
        let sink = VecSink::new();
        let mut recorder = FactRecorder::new(Box::new(sink.clone()));
        let vname = VName::for_language("c++");
        recorder
            .node(&vname, NodeKind::Record)
            .property(Property::Subkind, "class")
            .property(Property::Complete, "definition");
        let entries = sink.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].fact_name, NODE_KIND_FACT);
        assert_eq!(entries[0].fact_value, "record");
        assert_eq!(entries[1].fact_name, "/kythe/subkind");
        assert_eq!(entries[2].fact_value, "definition");
    }

    #[test]
    fn ordinal_edges_use_the_ordinal_fact() {
        let sink = VecSink::new();
        let mut recorder = FactRecorder::new(Box::new(sink.clone()));
        let a = VName::for_language("c++");
        recorder.add_edge_with_ordinal(&a, "/kythe/edge/param", &a, 0);
        let entries = sink.entries();
        assert_eq!(entries[0].fact_name, ORDINAL_FACT);
        assert_eq!(entries[0].fact_value, "0");
    }

    #[test]
    fn json_writer_emits_one_line_per_record() {
        let mut sink = JsonWriterSink::new(Vec::new());
        sink.emit(Entry::node_fact(
            VName::for_language("c++"),
            NODE_KIND_FACT,
            "file",
        ))
        .unwrap();
        sink.emit(Entry::edge(
            VName::for_language("c++"),
            "/kythe/edge/ref",
            VName::for_language("c++"),
        ))
        .unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
