use std::path::Path;
use std::sync::{Arc, Mutex};

use xrefscope_api::models::entry::NODE_KIND_FACT;
use xrefscope_api::models::{
    AccessSpecifier, Entry, FileId, FileUid, Loc, NameId, NodeId, Range, SourceMap, VName,
};
use xrefscope_api::{ClaimClient, GraphObserver, VecSink};
use xrefscope_core::{AcceptAllClient, GraphEmitter, StaticClaimClient};

fn file_sources(path: &str, text: &str) -> (Arc<SourceMap>, FileId, VName) {
    let mut map = SourceMap::new();
    let vname = VName::for_file("", "", path, "c++");
    let entry = map.add_file(path, FileUid(1), vname.clone(), text);
    let file = map.push_inclusion(entry);
    (Arc::new(map), file, vname)
}

fn emitter_for(sources: Arc<SourceMap>) -> (GraphEmitter, VecSink) {
    let sink = VecSink::new();
    let emitter = GraphEmitter::new(
        sources,
        Box::new(sink.clone()),
        Box::new(AcceptAllClient),
        "c++",
    );
    (emitter, sink)
}

fn node_kind_facts<'a>(entries: &'a [Entry], kind: &str) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|e| e.fact_name == NODE_KIND_FACT && e.fact_value == kind)
        .collect()
}

fn edges<'a>(entries: &'a [Entry], kind: &str) -> Vec<&'a Entry> {
    entries.iter().filter(|e| e.edge_kind == kind).collect()
}

#[test]
fn nominal_type_recorded_twice_emits_once() {
    let (sources, _, _) = file_sources("p.cc", "");
    let (mut emitter, sink) = emitter_for(sources);

    let name = NameId::new("kythe::X");
    let first = emitter.record_nominal_type_node(&name);
    let second = emitter.record_nominal_type_node(&name);
    assert_eq!(first, second);
    assert_eq!(first.identity(), "kythe::X#t");

    let entries = sink.entries();
    let tnominals = node_kind_facts(&entries, "tnominal");
    assert_eq!(tnominals.len(), 1);
    assert_eq!(tnominals[0].source.signature, "kythe::X#t");

    let named = edges(&entries, "/kythe/edge/named");
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].target.as_ref().unwrap().signature, "kythe::X");
    assert_eq!(node_kind_facts(&entries, "name").len(), 1);
}

#[test]
fn tapp_orders_constructor_before_arguments() {
    let (sources, _, _) = file_sources("p.cc", "");
    let (mut emitter, sink) = emitter_for(sources);

    let token = emitter.default_claim_token();
    let f = NodeId::new(token.clone(), "F");
    let a = NodeId::new(token.clone(), "A");
    let b = NodeId::new(token, "B");
    let tapp = emitter.record_tapp_node(&f, &[a, b]);
    assert_eq!(tapp.identity(), "F(A,B)");

    let entries = sink.entries();
    assert_eq!(node_kind_facts(&entries, "tapp").len(), 1);
    let params = edges(&entries, "/kythe/edge/param");
    assert_eq!(params.len(), 3);
    let expected = [("F", "0"), ("A", "1"), ("B", "2")];
    for (edge, (target, ordinal)) in params.iter().zip(expected) {
        assert_eq!(edge.source.signature, "F(A,B)");
        assert_eq!(edge.target.as_ref().unwrap().signature, target);
        assert_eq!(edge.fact_name, "/kythe/ordinal");
        assert_eq!(edge.fact_value, ordinal);
    }
}

#[test]
fn physical_anchor_flushes_with_offsets_and_parentage() {
    let (sources, file, file_vname) = file_sources("p.cc", "0123456789abcdefgh");
    let (mut emitter, sink) = emitter_for(sources);

    let defn = NodeId::new(emitter.default_claim_token(), "N");
    emitter.push_file(Loc::Invalid, Loc::file(file, 0));
    let range = Range::physical(Loc::file(file, 10), Loc::file(file, 14));
    emitter.record_definition_range(&range, &defn);

    // The anchor node is deferred until the outermost pop.
    assert!(node_kind_facts(&sink.entries(), "anchor").is_empty());
    emitter.pop_file();
    assert!(!emitter.is_failed());

    let entries = sink.entries();
    let anchors = node_kind_facts(&entries, "anchor");
    assert_eq!(anchors.len(), 1);
    let anchor_vname = &anchors[0].source;
    assert_eq!(anchor_vname.signature, "@10:14");
    assert_eq!(anchor_vname.path, "p.cc");

    let starts: Vec<_> = entries
        .iter()
        .filter(|e| e.fact_name == "/kythe/loc/start")
        .collect();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].fact_value, "10");
    let ends: Vec<_> = entries
        .iter()
        .filter(|e| e.fact_name == "/kythe/loc/end")
        .collect();
    assert_eq!(ends[0].fact_value, "14");

    let child_of = edges(&entries, "/kythe/edge/childof");
    assert_eq!(child_of.len(), 1);
    assert_eq!(child_of[0].target.as_ref().unwrap(), &file_vname);

    let defines = edges(&entries, "/kythe/edge/defines");
    assert_eq!(defines.len(), 1);
    assert_eq!(defines[0].source, *anchor_vname);
    assert_eq!(defines[0].target.as_ref().unwrap().signature, "N");
}

#[test]
fn wraith_anchor_gains_context_signature_and_parent() {
    let (sources, file, file_vname) = file_sources("p.cc", "0123456789abcdefgh");
    let (mut emitter, sink) = emitter_for(sources);

    let token = emitter.default_claim_token();
    let context = NodeId::new(token.clone(), "C");
    let defn = NodeId::new(token, "N");
    emitter.push_file(Loc::Invalid, Loc::file(file, 0));
    let range = Range::wraith(Loc::file(file, 10), Loc::file(file, 14), context);
    emitter.record_definition_range(&range, &defn);
    emitter.pop_file();

    let entries = sink.entries();
    let anchors = node_kind_facts(&entries, "anchor");
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0].source.signature, "@10:14@C");

    let child_of = edges(&entries, "/kythe/edge/childof");
    assert_eq!(child_of.len(), 2);
    let targets: Vec<_> = child_of
        .iter()
        .map(|e| e.target.as_ref().unwrap().clone())
        .collect();
    assert!(targets.contains(&file_vname));
    assert!(targets.iter().any(|t| t.signature == "C"));
}

#[test]
fn extends_edges_project_access_and_virtuality() {
    let (sources, _, _) = file_sources("p.cc", "");
    let (mut emitter, sink) = emitter_for(sources);

    let token = emitter.default_claim_token();
    let derived = NodeId::new(token.clone(), "D");
    let base = NodeId::new(token, "B");
    emitter.record_extends_edge(&derived, &base, true, AccessSpecifier::Protected);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].edge_kind, "/kythe/edge/extends/protected/virtual");
}

#[test]
fn file_stack_exposes_the_current_inclusion() {
    let (sources, file, file_vname) = file_sources("p.cc", "int x;");
    let (mut emitter, _) = emitter_for(sources);
    assert!(emitter.current_file_vname().is_none());
    emitter.push_file(Loc::Invalid, Loc::file(file, 0));
    assert_eq!(emitter.current_file_vname().unwrap(), &file_vname);
    let token = emitter.current_claim_token().unwrap();
    assert!(token.claimed);
    assert_eq!(token.path, "p.cc");
    emitter.pop_file();
    assert!(emitter.current_file_vname().is_none());
}

#[test]
fn pop_without_push_marks_the_run_failed() {
    let (sources, _, _) = file_sources("p.cc", "");
    let (mut emitter, _) = emitter_for(sources);
    emitter.pop_file();
    assert!(emitter.is_failed());
}

#[test]
fn anchors_flush_only_at_outermost_pop() {
    let mut map = SourceMap::new();
    let main_vname = VName::for_file("", "", "main.cc", "c++");
    let main_entry = map.add_file("main.cc", FileUid(1), main_vname, "#include \"p.h\"\n");
    let header_vname = VName::for_file("", "", "p.h", "c++");
    let header_entry = map.add_file("p.h", FileUid(2), header_vname, "struct S;");
    let main_file = map.push_inclusion(main_entry);
    let header_file = map.push_inclusion(header_entry);
    let sources = Arc::new(map);
    let (mut emitter, sink) = emitter_for(sources);

    let defn = NodeId::new(emitter.default_claim_token(), "S");
    emitter.push_file(Loc::Invalid, Loc::file(main_file, 0));
    emitter.push_file(Loc::file(main_file, 0), Loc::file(header_file, 0));
    emitter.record_definition_range(
        &Range::physical(Loc::file(header_file, 7), Loc::file(header_file, 8)),
        &defn,
    );
    emitter.pop_file();
    assert!(node_kind_facts(&sink.entries(), "anchor").is_empty());
    emitter.pop_file();
    assert_eq!(node_kind_facts(&sink.entries(), "anchor").len(), 1);
}

#[test]
fn repeated_runs_emit_identical_multisets() {
    let run = || {
        let (sources, file, _) = file_sources("p.cc", "0123456789abcdefgh");
        let (mut emitter, sink) = emitter_for(sources);
        let token = emitter.default_claim_token();
        let defn = NodeId::new(token.clone(), "N");
        let other = NodeId::new(token, "M");
        emitter.push_file(Loc::Invalid, Loc::file(file, 0));
        emitter.record_definition_range(
            &Range::physical(Loc::file(file, 0), Loc::file(file, 4)),
            &defn,
        );
        emitter.record_definition_range(
            &Range::physical(Loc::file(file, 5), Loc::file(file, 9)),
            &other,
        );
        emitter.record_nominal_type_node(&NameId::new("a::b"));
        emitter.pop_file();
        let mut entries = sink.entries();
        entries.sort();
        entries
    };
    assert_eq!(run(), run());
}

#[test]
fn losing_claimant_emits_no_node_facts_for_shared_header() {
    let header_vname = VName::for_file("", "", "p.h", "c++");
    let run_tu = |claimant: &str| {
        let mut map = SourceMap::new();
        let entry = map.add_file("p.h", FileUid(9), header_vname.clone(), "struct S;");
        let file = map.push_inclusion(entry);
        let sources = Arc::new(map);

        let mut client = StaticClaimClient::new();
        client.assign_claim(
            header_vname.clone(),
            VName {
                signature: "tu1".to_string(),
                ..Default::default()
            },
        );
        let sink = VecSink::new();
        let mut emitter = GraphEmitter::new(
            sources,
            Box::new(sink.clone()),
            Box::new(client),
            "c++",
        );
        emitter.set_claimant(VName {
            signature: claimant.to_string(),
            ..Default::default()
        });
        emitter.push_file(Loc::Invalid, Loc::file(file, 0));
        // Declarations in the header carry the header inclusion's token, so
        // their claim verdict follows the file's.
        let defn = NodeId::new(emitter.claim_token_for_location(&Loc::file(file, 7)), "S");
        emitter.record_definition_range(
            &Range::physical(Loc::file(file, 7), Loc::file(file, 8)),
            &defn,
        );
        emitter.pop_file();
        sink.entries()
    };

    let winner = run_tu("tu1");
    let loser = run_tu("tu2");

    let node_facts = |entries: &[Entry]| {
        let mut facts: Vec<Entry> = entries.iter().filter(|e| !e.is_edge()).cloned().collect();
        facts.sort();
        facts
    };
    // The losing unit contributes no node facts; merging both streams
    // yields exactly the winner's node facts.
    assert!(node_facts(&loser).is_empty());
    let mut merged = winner.clone();
    merged.extend(loser);
    assert_eq!(node_facts(&merged), node_facts(&winner));
}

#[derive(Default, Clone)]
struct RecordingClient {
    claims: Arc<Mutex<Vec<VName>>>,
}

impl ClaimClient for RecordingClient {
    fn claim(&mut self, _claimant: &VName, vname: &VName) -> bool {
        self.claims.lock().unwrap().push(vname.clone());
        true
    }
}

#[test]
fn include_context_amends_the_claimed_file_vname() {
    let mut map = SourceMap::new();
    let main_entry = map.add_file(
        "main.cc",
        FileUid(1),
        VName::for_file("", "", "main.cc", "c++"),
        "#include \"p.h\"\n",
    );
    let header_entry = map.add_file(
        "p.h",
        FileUid(2),
        VName::for_file("", "", "p.h", "c++"),
        "struct S;",
    );
    let main_file = map.push_inclusion(main_entry);
    let header_file = map.push_inclusion(header_entry);
    let sources = Arc::new(map);

    let client = RecordingClient::default();
    let sink = VecSink::new();
    let mut emitter = GraphEmitter::new(
        sources,
        Box::new(sink.clone()),
        Box::new(client.clone()),
        "c++",
    );
    emitter.set_starting_context("ctx0".to_string());
    emitter.add_context_information(
        Path::new("main.cc"),
        &"ctx0".to_string(),
        5,
        &"ctx1".to_string(),
    );

    emitter.push_file(Loc::Invalid, Loc::file(main_file, 0));
    emitter.push_file(Loc::file(main_file, 5), Loc::file(header_file, 0));
    emitter.pop_file();
    // Re-entering at an unmapped offset keeps the enclosing context.
    emitter.push_file(Loc::file(main_file, 9), Loc::file(header_file, 0));
    emitter.pop_file();
    emitter.pop_file();

    let claims = client.claims.lock().unwrap().clone();
    assert_eq!(claims.len(), 3);
    assert_eq!(claims[0].signature, "ctx0");
    assert_eq!(claims[0].path, "main.cc");
    assert_eq!(claims[1].signature, "ctx1");
    assert_eq!(claims[1].path, "p.h");
    assert_eq!(claims[2].signature, "ctx0");
}

#[test]
fn unbound_query_ranges_anchor_to_the_name_node() {
    let (sources, file, _) = file_sources("p.cc", "#ifdef FOO\n#endif\n");
    let (mut emitter, sink) = emitter_for(sources);
    emitter.push_file(Loc::Invalid, Loc::file(file, 0));
    emitter.record_unbound_query_range(
        &Range::physical(Loc::file(file, 7), Loc::file(file, 10)),
        &NameId::new("FOO#m"),
    );
    emitter.pop_file();

    let entries = sink.entries();
    assert_eq!(node_kind_facts(&entries, "name").len(), 1);
    let queries = edges(&entries, "/kythe/edge/ref/queries");
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].target.as_ref().unwrap().signature, "FOO#m");
}
