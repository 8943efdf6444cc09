//! The graph observer protocol: the typed event interface between the
//! AST/preprocessor traversal and the fact emitter.

use std::sync::Arc;

use crate::models::{
    AccessSpecifier, Claimability, ClaimToken, Completeness, EnumKind, FileEntry, Loc, NameId,
    NodeId, Range, RecordKind, Specificity,
};

/// An interface for processing elements discovered while walking a parsed
/// translation unit.
///
/// The traversal calls these entry points serially; implementations own all
/// of their state and never block except on their fact sink. Methods with
/// default bodies are optional events; the identity-minting methods must be
/// provided because they define the implementation's naming scheme.
pub trait GraphObserver {
    /// A claim token providing no additional information.
    fn default_claim_token(&self) -> Arc<ClaimToken>;

    /// The token to use for intrinsics. Does not tie the builtin to any
    /// location, so information about it is emitted wherever it is used.
    fn claim_token_for_builtins(&self) -> Arc<ClaimToken> {
        self.default_claim_token()
    }

    /// The token covering `loc`'s file inclusion.
    fn claim_token_for_location(&self, _loc: &Loc) -> Arc<ClaimToken> {
        self.default_claim_token()
    }

    /// The token covering a range, determined by its begin location.
    fn claim_token_for_range(&self, range: &Range) -> Arc<ClaimToken> {
        self.claim_token_for_location(range.begin())
    }

    /// The `NodeId` for the builtin type or type constructor named by
    /// `spelling`.
    fn node_id_for_builtin_type(&self, spelling: &str) -> NodeId;

    /// The `NodeId` for the nominal type node corresponding to `name`.
    fn node_id_for_nominal_type(&self, name: &NameId) -> NodeId;

    /// The `NodeId` for a type node aliasing another type node.
    fn node_id_for_type_alias(&self, alias: &NameId, aliased: &NodeId) -> NodeId;

    /// Records a nominal type node (struct, typedef, enum), returning its id.
    fn record_nominal_type_node(&mut self, name: &NameId) -> NodeId;

    /// Records a type alias node (`typedef`, `using Alias = ty`), returning
    /// the id of the alias node.
    fn record_type_alias_node(&mut self, alias: &NameId, aliased: &NodeId) -> NodeId;

    /// Records a type application node, returning its id. This is the
    /// elimination form for the `abs` node.
    fn record_tapp_node(&mut self, tycon: &NodeId, params: &[NodeId]) -> NodeId;

    /// Records a node representing a record type (class, struct, union).
    fn record_record_node(
        &mut self,
        _node: &NodeId,
        _kind: RecordKind,
        _completeness: Completeness,
    ) {
    }

    /// Records a node representing a function.
    fn record_function_node(&mut self, _node: &NodeId, _completeness: Completeness) {}

    /// Records a node representing a callable, an object that can appear as
    /// the target of a call expression.
    fn record_callable_node(&mut self, _node: &NodeId) {}

    /// Records a node representing a dependent type abstraction, like a
    /// template. Its compile-time variables are recorded with
    /// [`GraphObserver::record_abs_var_node`] and bound via `param` edges.
    fn record_abs_node(&mut self, _node: &NodeId) {}

    /// Records a variable bound by a dependent type abstraction.
    fn record_abs_var_node(&mut self, _node: &NodeId) {}

    /// Records a deferred name lookup for `text`.
    fn record_lookup_node(&mut self, _node: &NodeId, _text: &str) {}

    /// Records an enumerated type node.
    fn record_enum_node(&mut self, _node: &NodeId, _completeness: Completeness, _kind: EnumKind) {}

    /// Records a constant with an integer-representable value, e.g. an
    /// enumerator.
    fn record_integer_constant_node(&mut self, _node: &NodeId, _value: i64) {}

    /// Records that a variable was declared under `name`.
    fn record_variable_node(
        &mut self,
        _name: &NameId,
        _node: &NodeId,
        _completeness: Completeness,
    ) {
    }

    /// Records a node with a caller-provided kind string, plus a `named`
    /// edge to `name`.
    fn record_user_defined_node(
        &mut self,
        _name: &NameId,
        _node: &NodeId,
        _kind: &str,
        _completeness: Completeness,
    ) {
    }

    /// Records that a macro was defined.
    fn record_macro_node(&mut self, _node: &NodeId) {}

    /// Records a parameter relationship; ordinal 0 is the first parameter.
    fn record_param_edge(&mut self, _param_of: &NodeId, _ordinal: u32, _param: &NodeId) {}

    /// Records a child-to-parent relationship.
    fn record_child_of_edge(&mut self, _child: &NodeId, _parent: &NodeId) {}

    /// Records the type of a node.
    fn record_type_edge(&mut self, _term: &NodeId, _type_node: &NodeId) {}

    /// Records that a term specializes an abstraction.
    fn record_spec_edge(&mut self, _term: &NodeId, _abs: &NodeId) {}

    /// Records that a term instantiates an abstraction.
    fn record_inst_edge(&mut self, _term: &NodeId, _abs: &NodeId) {}

    /// Records that `to_call` participates in the call graph as `callable`.
    fn record_callable_as_edge(&mut self, _to_call: &NodeId, _callable: &NodeId) {}

    /// Records that a record directly inherits from another record.
    fn record_extends_edge(
        &mut self,
        _from: &NodeId,
        _to: &NodeId,
        _is_virtual: bool,
        _access: AccessSpecifier,
    ) {
    }

    /// Records that a node has been given a name distinct from its id.
    fn record_named_edge(&mut self, _node: &NodeId, _name: &NameId) {}

    /// Records that a range contains the definition of `defn`. The range is
    /// generally limited to the name-binding part of the declaration.
    fn record_definition_range(&mut self, _range: &Range, _defn: &NodeId) {}

    /// Records that a range contains a completion for `defn`.
    fn record_completion_range(&mut self, _range: &Range, _defn: &NodeId, _spec: Specificity) {}

    /// Records a use site for a declaration.
    fn record_decl_use_location(&mut self, _range: &Range, _decl: &NodeId, _cl: Claimability) {}

    /// Records that a type was spelled out at a location.
    fn record_type_spelling_location(
        &mut self,
        _range: &Range,
        _type_node: &NodeId,
        _cl: Claimability,
    ) {
    }

    /// Records that `callee` is called at a location, blamed on `caller`.
    fn record_call_edge(&mut self, _range: &Range, _caller: &NodeId, _callee: &NodeId) {}

    /// Records that a macro was expanded at a location. Distinct from the
    /// query events, which fire when a macro's definedness is tested
    /// without expanding it.
    fn record_expands_range(&mut self, _range: &Range, _macro_node: &NodeId) {}

    /// Records that a macro was expanded because an enclosing expansion was
    /// made at the given location.
    fn record_indirectly_expands_range(&mut self, _range: &Range, _macro_node: &NodeId) {}

    /// Records that a macro was undefined at a location.
    fn record_undefines_range(&mut self, _range: &Range, _macro_node: &NodeId) {}

    /// Records that a defined macro was queried at a location.
    fn record_bound_query_range(&mut self, _range: &Range, _macro_node: &NodeId) {}

    /// Records that an undefined macro was queried at a location.
    fn record_unbound_query_range(&mut self, _range: &Range, _name: &NameId) {}

    /// Records that another resource was included at a location.
    fn record_includes_range(&mut self, _range: &Range, _file: &FileEntry) {}

    /// Called when a new input file is entered. The file entered by the
    /// first push is the translation unit being indexed. `blame` is the
    /// location that caused the file to be pushed (an include directive),
    /// if any.
    fn push_file(&mut self, _blame: Loc, _loc: Loc) {}

    /// Called when the most recently entered file is left.
    fn pop_file(&mut self) {}

    /// Whether data for `node` and its descendants should be emitted.
    fn claim_node(&self, _node: &NodeId) -> bool {
        true
    }

    /// Whether data for nodes within `range` should be emitted.
    fn claim_range(&self, _range: &Range) -> bool {
        true
    }

    /// Whether data for nodes at `loc` should be emitted.
    fn claim_location(&self, _loc: &Loc) -> bool {
        true
    }
}

/// A `GraphObserver` that does nothing, for exercising drivers.
pub struct NullObserver {
    default_token: Arc<ClaimToken>,
}

impl NullObserver {
    pub fn new() -> Self {
        NullObserver {
            default_token: Arc::new(ClaimToken::claimed_default()),
        }
    }
}

impl Default for NullObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphObserver for NullObserver {
    fn default_claim_token(&self) -> Arc<ClaimToken> {
        self.default_token.clone()
    }

    fn node_id_for_builtin_type(&self, _spelling: &str) -> NodeId {
        NodeId::new(self.default_token.clone(), "")
    }

    fn node_id_for_nominal_type(&self, _name: &NameId) -> NodeId {
        NodeId::new(self.default_token.clone(), "")
    }

    fn node_id_for_type_alias(&self, _alias: &NameId, _aliased: &NodeId) -> NodeId {
        NodeId::new(self.default_token.clone(), "")
    }

    fn record_nominal_type_node(&mut self, name: &NameId) -> NodeId {
        self.node_id_for_nominal_type(name)
    }

    fn record_type_alias_node(&mut self, alias: &NameId, aliased: &NodeId) -> NodeId {
        self.node_id_for_type_alias(alias, aliased)
    }

    fn record_tapp_node(&mut self, _tycon: &NodeId, _params: &[NodeId]) -> NodeId {
        NodeId::new(self.default_token.clone(), "")
    }
}
