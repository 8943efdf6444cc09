//! The fact-emitting graph observer: identity minting and interning, claim
//! arbitration, the file/context stack, and deferred anchor bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, warn};

use xrefscope_api::models::{
    AccessSpecifier, Claimability, ClaimToken, Completeness, EdgeKind, EnumKind, FileEntry,
    FileId, FileUid, Loc, NameId, NodeId, NodeKind, Property, Range, RecordKind, SourceMap,
    Specificity, VName,
};
use xrefscope_api::{ClaimClient, FactSink, GraphObserver};

use crate::recorder::FactRecorder;
use crate::signature::anchor_vname;

/// A representation of the state of the preprocessor at an inclusion.
pub type PreprocessorContext = String;

/// A file we have entered but not left.
#[derive(Debug, Default)]
struct FileState {
    /// The context for this inclusion.
    context: PreprocessorContext,
    /// The context-amended file VName.
    vname: Option<VName>,
    /// The file's VName without context.
    base_vname: Option<VName>,
    /// Filesystem identity, shared across inclusions.
    uid: Option<FileUid>,
    /// Whether we have claimed this inclusion.
    claimed: bool,
    /// The claim token minted for this inclusion.
    token: Option<Arc<ClaimToken>>,
}

type OffsetToContext = HashMap<u32, PreprocessorContext>;
type ContextToOffsets = HashMap<PreprocessorContext, OffsetToContext>;

/// Records facts about elements discovered during indexing.
///
/// One emitter serves one translation unit. It owns every piece of mutable
/// state it touches: the interning tables are append-only for its lifetime,
/// and the claim cache maps each pushed `FileId` to the token minted when
/// the inclusion was entered.
pub struct GraphEmitter {
    sources: Arc<SourceMap>,
    recorder: FactRecorder,
    client: Box<dyn ClaimClient>,
    /// The VName representing this emitter's claiming authority.
    claimant: VName,
    language: String,
    starting_context: PreprocessorContext,
    file_stack: Vec<FileState>,
    claim_checked_files: HashMap<FileId, Arc<ClaimToken>>,
    /// uid -> context -> include offset -> destination context.
    context_data: HashMap<FileUid, ContextToOffsets>,
    /// Entries whose content has already been emitted.
    recorded_files: HashSet<FileUid>,
    /// Anchor nodes referenced but not yet declared.
    deferred_anchors: HashSet<Range>,
    /// Canonical name spellings already written.
    written_name_ids: HashSet<String>,
    /// Claimed identity strings of type nodes already written.
    written_types: HashSet<String>,
    default_token: Arc<ClaimToken>,
    /// The claim token for structural types.
    type_token: Arc<ClaimToken>,
    failed: bool,
}

impl GraphEmitter {
    pub fn new(
        sources: Arc<SourceMap>,
        sink: Box<dyn FactSink>,
        client: Box<dyn ClaimClient>,
        language: impl Into<String>,
    ) -> Self {
        GraphEmitter {
            sources,
            recorder: FactRecorder::new(sink),
            client,
            claimant: VName::default(),
            language: language.into(),
            starting_context: PreprocessorContext::new(),
            file_stack: Vec::new(),
            claim_checked_files: HashMap::new(),
            context_data: HashMap::new(),
            recorded_files: HashSet::new(),
            deferred_anchors: HashSet::new(),
            written_name_ids: HashSet::new(),
            written_types: HashSet::new(),
            default_token: Arc::new(ClaimToken::claimed_default()),
            type_token: Arc::new(ClaimToken::claimed_default()),
            failed: false,
        }
    }

    /// Configures the claimant used for claim requests.
    pub fn set_claimant(&mut self, claimant: VName) {
        self.claimant = claimant;
    }

    /// Configures the context to use when the main source file is entered.
    pub fn set_starting_context(&mut self, context: PreprocessorContext) {
        self.starting_context = context;
    }

    /// Adds one fact about preprocessor contexts: entering the inclusion at
    /// `offset` of `path` while in `context` transitions into
    /// `dest_context`.
    pub fn add_context_information(
        &mut self,
        path: &std::path::Path,
        context: &PreprocessorContext,
        offset: u32,
        dest_context: &PreprocessorContext,
    ) {
        match self.sources.status(path) {
            Some((uid, _exists)) => {
                self.context_data
                    .entry(uid)
                    .or_default()
                    .entry(context.clone())
                    .or_default()
                    .insert(offset, dest_context.clone());
            }
            None => {
                warn!("path {} could not be mapped to a file record", path.display());
            }
        }
    }

    /// True when a builder invariant was violated or the sink failed; the
    /// translation unit's output must be discarded.
    pub fn is_failed(&self) -> bool {
        self.failed || self.recorder.is_failed()
    }

    /// The context-amended VName of the innermost file on the stack, if it
    /// is backed by a real file.
    pub fn current_file_vname(&self) -> Option<&VName> {
        self.file_stack.last().and_then(|state| state.vname.as_ref())
    }

    /// The claim token minted for the innermost inclusion. Drivers use this
    /// when building ids for declarations in the file being walked.
    pub fn current_claim_token(&self) -> Option<Arc<ClaimToken>> {
        self.file_stack.last().and_then(|state| state.token.clone())
    }

    fn vname_from_node_id(&self, node_id: &NodeId) -> VName {
        node_id.to_vname(&self.language)
    }

    /// Writes the `name` node for `name_id` at most once per run and
    /// returns its VName.
    fn record_name(&mut self, name_id: &NameId) -> VName {
        let vname = name_id.to_vname(&self.language);
        if self.written_name_ids.insert(name_id.spelling().to_string()) {
            self.recorder.node(&vname, NodeKind::Name);
        }
        vname
    }

    fn anchor_vname(&self, range: &Range) -> VName {
        anchor_vname(&self.sources, range, &self.language)
    }

    fn location_offset(loc: &Loc) -> u32 {
        loc.file_offset()
    }

    /// Computes the anchor VName for `range`, arbitrates its claim, and
    /// emits the primary edge when the final claimability requires it.
    fn record_anchor(
        &mut self,
        range: &Range,
        target: &VName,
        also_claim_node: Option<&NodeId>,
        edge_kind: EdgeKind,
        mut claimability: Claimability,
    ) -> VName {
        if self.file_stack.is_empty() {
            error!("anchor recorded outside of any file");
            self.failed = true;
            return self.anchor_vname(range);
        }
        let anchor = self.anchor_vname(range);
        let claimed = self.claim_range(range)
            || also_claim_node.map_or(false, |node| self.claim_node(node));
        if claimed {
            self.deferred_anchors.insert(range.clone());
            claimability = Claimability::Unclaimable;
        }
        if claimability == Claimability::Unclaimable {
            self.recorder.add_edge(&anchor, edge_kind.spelling(), target);
        }
        anchor
    }

    fn record_anchor_to_node(
        &mut self,
        range: &Range,
        node: &NodeId,
        edge_kind: EdgeKind,
        claimability: Claimability,
    ) -> VName {
        let target = self.vname_from_node_id(node);
        self.record_anchor(range, &target, Some(node), edge_kind, claimability)
    }

    /// Flushes the deferred anchors, emitting one `anchor` node per range
    /// with its file (and context) parentage.
    fn record_deferred_nodes(&mut self) {
        let deferred: Vec<Range> = self.deferred_anchors.drain().collect();
        for range in deferred {
            let anchor = self.anchor_vname(&range);
            self.recorder
                .node(&anchor, NodeKind::Anchor)
                .property_offset(Property::LocStart, Self::location_offset(range.begin()))
                .property_offset(Property::LocEnd, Self::location_offset(range.end()));
            if let Some(entry) = self.sources.search_file_entry(range.begin().expansion()) {
                let file_vname = entry.vname.clone();
                self.recorder
                    .add_edge(&anchor, EdgeKind::ChildOf.spelling(), &file_vname);
            }
            if let Some(context) = range.context() {
                let context_vname = self.vname_from_node_id(context);
                self.recorder
                    .add_edge(&anchor, EdgeKind::ChildOf.spelling(), &context_vname);
            }
        }
    }

    /// Looks up the destination context for entering an inclusion, warning
    /// at the first missing level and keeping the enclosing context.
    fn destination_context(
        &self,
        previous_uid: FileUid,
        previous_context: &PreprocessorContext,
        offset: u32,
    ) -> Option<PreprocessorContext> {
        let Some(contexts) = self.context_data.get(&previous_uid) else {
            warn!(
                "when looking for uid {}[{}]:{}: missing source path",
                previous_uid.0, previous_context, offset
            );
            return None;
        };
        let Some(offsets) = contexts.get(previous_context) else {
            warn!(
                "when looking for uid {}[{}]:{}: missing source context",
                previous_uid.0, previous_context, offset
            );
            return None;
        };
        let Some(dest) = offsets.get(&offset) else {
            warn!(
                "when looking for uid {}[{}]:{}: missing source offset",
                previous_uid.0, previous_context, offset
            );
            return None;
        };
        Some(dest.clone())
    }
}

impl GraphObserver for GraphEmitter {
    fn default_claim_token(&self) -> Arc<ClaimToken> {
        self.default_token.clone()
    }

    fn claim_token_for_location(&self, loc: &Loc) -> Arc<ClaimToken> {
        if !loc.is_valid() {
            return self.default_token.clone();
        }
        match loc.file_id() {
            Some(file) => self
                .claim_checked_files
                .get(&file)
                .cloned()
                .unwrap_or_else(|| self.default_token.clone()),
            None => self.default_token.clone(),
        }
    }

    fn node_id_for_builtin_type(&self, spelling: &str) -> NodeId {
        NodeId::new(self.default_token.clone(), format!("{spelling}#builtin"))
    }

    fn node_id_for_nominal_type(&self, name: &NameId) -> NodeId {
        // Appending #t to a name produces the signature of the nominal type
        // node referring to that name.
        NodeId::new(self.type_token.clone(), format!("{name}#t"))
    }

    fn node_id_for_type_alias(&self, alias: &NameId, aliased: &NodeId) -> NodeId {
        NodeId::new(
            self.type_token.clone(),
            format!("talias({},{})", alias, aliased.claimed_string()),
        )
    }

    fn record_nominal_type_node(&mut self, name: &NameId) -> NodeId {
        let id = self.node_id_for_nominal_type(name);
        if self.written_types.insert(id.claimed_string()) {
            let type_vname = self.vname_from_node_id(&id);
            self.recorder.node(&type_vname, NodeKind::TNominal);
            let name_vname = self.record_name(name);
            self.recorder
                .add_edge(&type_vname, EdgeKind::Named.spelling(), &name_vname);
        }
        id
    }

    fn record_type_alias_node(&mut self, alias: &NameId, aliased: &NodeId) -> NodeId {
        let id = self.node_id_for_type_alias(alias, aliased);
        if self.written_types.insert(id.claimed_string()) {
            let type_vname = self.vname_from_node_id(&id);
            self.recorder.node(&type_vname, NodeKind::TAlias);
            let name_vname = self.record_name(alias);
            self.recorder
                .add_edge(&type_vname, EdgeKind::Named.spelling(), &name_vname);
            let aliased_vname = self.vname_from_node_id(aliased);
            self.recorder
                .add_edge(&type_vname, EdgeKind::Aliases.spelling(), &aliased_vname);
        }
        id
    }

    fn record_tapp_node(&mut self, tycon: &NodeId, params: &[NodeId]) -> NodeId {
        // Juxtaposition would be ambiguous without kind information, so the
        // identity is a C-style application: tycon(p0,p1,...).
        let mut identity = tycon.claimed_string();
        identity.push('(');
        for (index, param) in params.iter().enumerate() {
            if index > 0 {
                identity.push(',');
            }
            identity.push_str(&param.claimed_string());
        }
        identity.push(')');
        let id = NodeId::new(self.type_token.clone(), identity);
        if self.written_types.insert(id.claimed_string()) {
            let tapp_vname = self.vname_from_node_id(&id);
            self.recorder.node(&tapp_vname, NodeKind::TApp);
            let tycon_vname = self.vname_from_node_id(tycon);
            self.recorder.add_edge_with_ordinal(
                &tapp_vname,
                EdgeKind::Param.spelling(),
                &tycon_vname,
                0,
            );
            for (index, param) in params.iter().enumerate() {
                let param_vname = self.vname_from_node_id(param);
                self.recorder.add_edge_with_ordinal(
                    &tapp_vname,
                    EdgeKind::Param.spelling(),
                    &param_vname,
                    index as u32 + 1,
                );
            }
        }
        id
    }

    fn record_record_node(
        &mut self,
        node: &NodeId,
        kind: RecordKind,
        completeness: Completeness,
    ) {
        let vname = self.vname_from_node_id(node);
        self.recorder
            .node(&vname, NodeKind::Record)
            .property(Property::Subkind, kind.subkind())
            .property(Property::Complete, completeness.spelling());
    }

    fn record_function_node(&mut self, node: &NodeId, completeness: Completeness) {
        let vname = self.vname_from_node_id(node);
        self.recorder
            .node(&vname, NodeKind::Function)
            .property(Property::Complete, completeness.spelling());
    }

    fn record_callable_node(&mut self, node: &NodeId) {
        let vname = self.vname_from_node_id(node);
        self.recorder.node(&vname, NodeKind::Callable);
    }

    fn record_abs_node(&mut self, node: &NodeId) {
        let vname = self.vname_from_node_id(node);
        self.recorder.node(&vname, NodeKind::Abs);
    }

    fn record_abs_var_node(&mut self, node: &NodeId) {
        let vname = self.vname_from_node_id(node);
        self.recorder.node(&vname, NodeKind::AbsVar);
    }

    fn record_lookup_node(&mut self, node: &NodeId, text: &str) {
        let vname = self.vname_from_node_id(node);
        self.recorder
            .node(&vname, NodeKind::Lookup)
            .property(Property::Text, text);
    }

    fn record_enum_node(&mut self, node: &NodeId, completeness: Completeness, kind: EnumKind) {
        let vname = self.vname_from_node_id(node);
        self.recorder
            .node(&vname, NodeKind::Sum)
            .property(Property::Complete, completeness.spelling())
            .property(Property::Subkind, kind.subkind());
    }

    fn record_integer_constant_node(&mut self, node: &NodeId, value: i64) {
        let vname = self.vname_from_node_id(node);
        self.recorder
            .node(&vname, NodeKind::Constant)
            .property(Property::Text, &value.to_string());
    }

    fn record_variable_node(&mut self, name: &NameId, node: &NodeId, completeness: Completeness) {
        let name_vname = self.record_name(name);
        let node_vname = self.vname_from_node_id(node);
        self.recorder
            .node(&node_vname, NodeKind::Variable)
            .property(Property::Complete, completeness.spelling());
        self.recorder
            .add_edge(&node_vname, EdgeKind::Named.spelling(), &name_vname);
    }

    fn record_user_defined_node(
        &mut self,
        name: &NameId,
        node: &NodeId,
        kind: &str,
        completeness: Completeness,
    ) {
        let name_vname = self.record_name(name);
        let node_vname = self.vname_from_node_id(node);
        self.recorder
            .node_with_kind(&node_vname, kind)
            .property(Property::Complete, completeness.spelling());
        self.recorder
            .add_edge(&node_vname, EdgeKind::Named.spelling(), &name_vname);
    }

    fn record_macro_node(&mut self, node: &NodeId) {
        let vname = self.vname_from_node_id(node);
        self.recorder.node(&vname, NodeKind::Macro);
    }

    fn record_param_edge(&mut self, param_of: &NodeId, ordinal: u32, param: &NodeId) {
        let from = self.vname_from_node_id(param_of);
        let to = self.vname_from_node_id(param);
        self.recorder
            .add_edge_with_ordinal(&from, EdgeKind::Param.spelling(), &to, ordinal);
    }

    fn record_child_of_edge(&mut self, child: &NodeId, parent: &NodeId) {
        let from = self.vname_from_node_id(child);
        let to = self.vname_from_node_id(parent);
        self.recorder.add_edge(&from, EdgeKind::ChildOf.spelling(), &to);
    }

    fn record_type_edge(&mut self, term: &NodeId, type_node: &NodeId) {
        let from = self.vname_from_node_id(term);
        let to = self.vname_from_node_id(type_node);
        self.recorder.add_edge(&from, EdgeKind::HasType.spelling(), &to);
    }

    fn record_spec_edge(&mut self, term: &NodeId, abs: &NodeId) {
        let from = self.vname_from_node_id(term);
        let to = self.vname_from_node_id(abs);
        self.recorder
            .add_edge(&from, EdgeKind::Specializes.spelling(), &to);
    }

    fn record_inst_edge(&mut self, term: &NodeId, abs: &NodeId) {
        let from = self.vname_from_node_id(term);
        let to = self.vname_from_node_id(abs);
        self.recorder
            .add_edge(&from, EdgeKind::Instantiates.spelling(), &to);
    }

    fn record_callable_as_edge(&mut self, to_call: &NodeId, callable: &NodeId) {
        let from = self.vname_from_node_id(to_call);
        let to = self.vname_from_node_id(callable);
        self.recorder
            .add_edge(&from, EdgeKind::CallableAs.spelling(), &to);
    }

    fn record_extends_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        is_virtual: bool,
        access: AccessSpecifier,
    ) {
        let from_vname = self.vname_from_node_id(from);
        let to_vname = self.vname_from_node_id(to);
        let kind = EdgeKind::extends(access, is_virtual);
        self.recorder.add_edge(&from_vname, kind.spelling(), &to_vname);
    }

    fn record_named_edge(&mut self, node: &NodeId, name: &NameId) {
        let node_vname = self.vname_from_node_id(node);
        let name_vname = self.record_name(name);
        self.recorder
            .add_edge(&node_vname, EdgeKind::Named.spelling(), &name_vname);
    }

    fn record_definition_range(&mut self, range: &Range, defn: &NodeId) {
        self.record_anchor_to_node(range, defn, EdgeKind::Defines, Claimability::Claimable);
    }

    fn record_completion_range(&mut self, range: &Range, defn: &NodeId, spec: Specificity) {
        let kind = match spec {
            Specificity::UniquelyCompletes => EdgeKind::UniquelyCompletes,
            Specificity::Completes => EdgeKind::Completes,
        };
        self.record_anchor_to_node(range, defn, kind, Claimability::Unclaimable);
    }

    fn record_decl_use_location(&mut self, range: &Range, decl: &NodeId, cl: Claimability) {
        self.record_anchor_to_node(range, decl, EdgeKind::Ref, cl);
    }

    fn record_type_spelling_location(
        &mut self,
        range: &Range,
        type_node: &NodeId,
        cl: Claimability,
    ) {
        self.record_anchor_to_node(range, type_node, EdgeKind::Ref, cl);
    }

    fn record_call_edge(&mut self, range: &Range, caller: &NodeId, callee: &NodeId) {
        let anchor = self.record_anchor_to_node(
            range,
            caller,
            EdgeKind::ChildOf,
            Claimability::Claimable,
        );
        let callee_vname = self.vname_from_node_id(callee);
        self.recorder
            .add_edge(&anchor, EdgeKind::RefCall.spelling(), &callee_vname);
    }

    fn record_expands_range(&mut self, range: &Range, macro_node: &NodeId) {
        self.record_anchor_to_node(
            range,
            macro_node,
            EdgeKind::RefExpands,
            Claimability::Claimable,
        );
    }

    fn record_indirectly_expands_range(&mut self, range: &Range, macro_node: &NodeId) {
        self.record_anchor_to_node(
            range,
            macro_node,
            EdgeKind::RefExpandsTransitive,
            Claimability::Claimable,
        );
    }

    fn record_undefines_range(&mut self, range: &Range, macro_node: &NodeId) {
        self.record_anchor_to_node(
            range,
            macro_node,
            EdgeKind::Undefines,
            Claimability::Claimable,
        );
    }

    fn record_bound_query_range(&mut self, range: &Range, macro_node: &NodeId) {
        self.record_anchor_to_node(
            range,
            macro_node,
            EdgeKind::RefQueries,
            Claimability::Claimable,
        );
    }

    fn record_unbound_query_range(&mut self, range: &Range, name: &NameId) {
        let name_vname = self.record_name(name);
        self.record_anchor(
            range,
            &name_vname,
            None,
            EdgeKind::RefQueries,
            Claimability::Claimable,
        );
    }

    fn record_includes_range(&mut self, range: &Range, file: &FileEntry) {
        let file_vname = file.vname.clone();
        self.record_anchor(
            range,
            &file_vname,
            None,
            EdgeKind::RefIncludes,
            Claimability::Claimable,
        );
    }

    fn push_file(&mut self, blame: Loc, loc: Loc) {
        let previous_context = self
            .file_stack
            .last()
            .map(|state| state.context.clone())
            .unwrap_or_else(|| self.starting_context.clone());
        let previous_uid = self.file_stack.last().and_then(|state| state.uid);
        let outermost = self.file_stack.is_empty();

        let mut state = FileState {
            claimed: true,
            ..Default::default()
        };
        if loc.is_valid() {
            let loc = loc.expansion().clone();
            if let Some(file) = loc.file_id() {
                if let Some(entry) = self.sources.entry_for(file) {
                    let entry = entry.clone();
                    state.base_vname = Some(entry.vname.clone());
                    state.uid = Some(entry.uid);
                    state.context = if outermost {
                        self.starting_context.clone()
                    } else {
                        previous_context.clone()
                    };
                    if !outermost {
                        if let Some(previous_uid) = previous_uid {
                            if !previous_context.is_empty() && blame.is_valid() && blame.is_file() {
                                let offset = blame.file_offset();
                                if let Some(dest) = self.destination_context(
                                    previous_uid,
                                    &previous_context,
                                    offset,
                                ) {
                                    state.context = dest;
                                }
                            }
                        }
                    }
                    let mut vname = entry.vname.clone();
                    vname.signature = format!("{}{}", state.context, vname.signature);
                    state.claimed = self.client.claim(&self.claimant, &vname);
                    if state.claimed && self.recorded_files.insert(entry.uid) {
                        let text = self
                            .sources
                            .text_for(file)
                            .map(str::to_string)
                            .unwrap_or_default();
                        let base = state.base_vname.clone().unwrap_or_default();
                        self.recorder.add_file_content(&base, &text);
                    }
                    let token = Arc::new(ClaimToken {
                        corpus: vname.corpus.clone(),
                        root: vname.root.clone(),
                        path: vname.path.clone(),
                        claimed: state.claimed,
                    });
                    state.vname = Some(vname);
                    state.token = Some(token.clone());
                    self.claim_checked_files.insert(file, token);
                }
                // A scratch buffer or builtin location pushes a bare frame.
            }
        }
        self.file_stack.push(state);
    }

    fn pop_file(&mut self) {
        if self.file_stack.pop().is_none() {
            error!("pop_file on an empty file stack");
            self.failed = true;
            return;
        }
        if self.file_stack.is_empty() {
            self.record_deferred_nodes();
        }
    }

    fn claim_node(&self, node: &NodeId) -> bool {
        node.token.claimed
    }

    fn claim_range(&self, range: &Range) -> bool {
        if let Some(context) = range.context() {
            if self.claim_node(context) {
                return true;
            }
        }
        self.claim_location(range.begin())
    }

    fn claim_location(&self, loc: &Loc) -> bool {
        if !loc.is_valid() {
            return true;
        }
        match loc.file_id() {
            Some(file) => self
                .claim_checked_files
                .get(&file)
                .map(|token| token.claimed)
                .unwrap_or(false),
            None => true,
        }
    }
}
