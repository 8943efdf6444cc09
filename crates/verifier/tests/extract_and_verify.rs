//! End-to-end: drive the graph emitter over a small annotated source file,
//! then prove the embedded assertions against the emitted facts.

use std::sync::Arc;

use xrefscope_api::models::{
    Completeness, FileUid, Loc, NameId, NodeId, Range, RecordKind, SourceMap, VName,
};
use xrefscope_api::{GraphObserver, VecSink};
use xrefscope_core::{AcceptAllClient, GraphEmitter, JsonWriterSink};
use xrefscope_verifier::Verifier;

const SOURCE: &str = "\
//- @decl defines SomeRecord
//- SomeRecord.node/kind record
//- SomeRecord.subkind class
//- SomeRecord named SomeName
//- !{ SomeRecord undefines SomeName }
struct decl here
";

fn drive(sink: Box<dyn xrefscope_api::FactSink>) {
    let mut map = SourceMap::new();
    let entry = map.add_file(
        "p.cc",
        FileUid(1),
        VName::for_file("", "", "p.cc", "c++"),
        SOURCE,
    );
    let file = map.push_inclusion(entry);
    let sources = Arc::new(map);

    let mut emitter = GraphEmitter::new(sources, sink, Box::new(AcceptAllClient), "c++");
    emitter.push_file(Loc::Invalid, Loc::file(file, 0));

    let begin = SOURCE.find("decl here").unwrap() as u32;
    let token = emitter.claim_token_for_location(&Loc::file(file, begin));
    let record = NodeId::new(token, "record#decl");
    emitter.record_definition_range(
        &Range::physical(Loc::file(file, begin), Loc::file(file, begin + 4)),
        &record,
    );
    emitter.record_record_node(&record, RecordKind::Class, Completeness::Definition);
    emitter.record_named_edge(&record, &NameId::new("decl#c"));
    emitter.pop_file();
    assert!(!emitter.is_failed());
}

#[test]
fn emitted_facts_satisfy_the_embedded_assertions() {
    let sink = VecSink::new();
    drive(Box::new(sink.clone()));

    let mut verifier = Verifier::new();
    for entry in sink.entries() {
        verifier.assert_fact(&entry);
    }
    assert!(verifier.parse_inline_rules_string(SOURCE, "p.cc", "//-"));
    assert!(verifier.prepare_database(), "{:?}", verifier.diagnostics());
    assert!(verifier.verify_all_goals());
}

#[test]
fn a_wrong_assertion_is_refuted() {
    let sink = VecSink::new();
    drive(Box::new(sink.clone()));

    let mut verifier = Verifier::new();
    for entry in sink.entries() {
        verifier.assert_fact(&entry);
    }
    assert!(verifier.parse_inline_rules_string(
        "#- SomeRecord.node/kind sum\n",
        "-",
        "#-",
    ));
    assert!(!verifier.verify_all_goals());
}

#[test]
fn json_stream_round_trips_into_the_verifier() {
    let writer = JsonWriterSink::new(Vec::new());
    // Drive through the JSON sink, then reload the lines.
    let buffer = Arc::new(std::sync::Mutex::new(writer));

    struct SharedJson(Arc<std::sync::Mutex<JsonWriterSink<Vec<u8>>>>);
    impl xrefscope_api::FactSink for SharedJson {
        fn emit(&mut self, entry: xrefscope_api::models::Entry) -> Result<(), xrefscope_api::SinkError> {
            self.0.lock().expect("sink poisoned").emit(entry)
        }
    }

    drive(Box::new(SharedJson(buffer.clone())));
    let guard = buffer.lock().unwrap();
    let lines = String::from_utf8(guard.get_ref().clone()).unwrap();
    drop(guard);

    let mut verifier = Verifier::new();
    let count = verifier.load_json_entries(&lines).unwrap();
    assert!(count > 0);
    assert!(verifier.parse_inline_rules_string(SOURCE, "p.cc", "//-"));
    assert!(verifier.verify_all_goals());
}
