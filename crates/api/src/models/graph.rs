//! Closed vocabularies for the emitted graph. The spellings here are the
//! wire ABI; see the schema notes in the repository documentation.

/// Known node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Anchor,
    File,
    Variable,
    TAlias,
    TApp,
    TNominal,
    Record,
    Sum,
    Constant,
    Abs,
    AbsVar,
    Name,
    Function,
    Callable,
    Lookup,
    Macro,
}

impl NodeKind {
    pub fn spelling(self) -> &'static str {
        match self {
            NodeKind::Anchor => "anchor",
            NodeKind::File => "file",
            NodeKind::Variable => "variable",
            NodeKind::TAlias => "talias",
            NodeKind::TApp => "tapp",
            NodeKind::TNominal => "tnominal",
            NodeKind::Record => "record",
            NodeKind::Sum => "sum",
            NodeKind::Constant => "constant",
            NodeKind::Abs => "abs",
            NodeKind::AbsVar => "absvar",
            NodeKind::Name => "name",
            NodeKind::Function => "function",
            NodeKind::Callable => "callable",
            NodeKind::Lookup => "lookup",
            NodeKind::Macro => "macro",
        }
    }
}

/// Known edge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Defines,
    Named,
    HasType,
    Ref,
    Param,
    Aliases,
    UniquelyCompletes,
    Completes,
    ChildOf,
    Specializes,
    RefCall,
    CallableAs,
    RefExpands,
    Undefines,
    RefIncludes,
    RefQueries,
    Instantiates,
    RefExpandsTransitive,
    ExtendsPublic,
    ExtendsProtected,
    ExtendsPrivate,
    Extends,
    ExtendsPublicVirtual,
    ExtendsProtectedVirtual,
    ExtendsPrivateVirtual,
    ExtendsVirtual,
}

impl EdgeKind {
    pub fn spelling(self) -> &'static str {
        match self {
            EdgeKind::Defines => "/kythe/edge/defines",
            EdgeKind::Named => "/kythe/edge/named",
            EdgeKind::HasType => "/kythe/edge/typed",
            EdgeKind::Ref => "/kythe/edge/ref",
            EdgeKind::Param => "/kythe/edge/param",
            EdgeKind::Aliases => "/kythe/edge/aliases",
            EdgeKind::UniquelyCompletes => "/kythe/edge/completes/uniquely",
            EdgeKind::Completes => "/kythe/edge/completes",
            EdgeKind::ChildOf => "/kythe/edge/childof",
            EdgeKind::Specializes => "/kythe/edge/specializes",
            EdgeKind::RefCall => "/kythe/edge/ref/call",
            EdgeKind::CallableAs => "/kythe/edge/callableas",
            EdgeKind::RefExpands => "/kythe/edge/ref/expands",
            EdgeKind::Undefines => "/kythe/edge/undefines",
            EdgeKind::RefIncludes => "/kythe/edge/ref/includes",
            EdgeKind::RefQueries => "/kythe/edge/ref/queries",
            EdgeKind::Instantiates => "/kythe/edge/instantiates",
            EdgeKind::RefExpandsTransitive => "/kythe/edge/ref/expands/transitive",
            EdgeKind::ExtendsPublic => "/kythe/edge/extends/public",
            EdgeKind::ExtendsProtected => "/kythe/edge/extends/protected",
            EdgeKind::ExtendsPrivate => "/kythe/edge/extends/private",
            EdgeKind::Extends => "/kythe/edge/extends",
            EdgeKind::ExtendsPublicVirtual => "/kythe/edge/extends/public/virtual",
            EdgeKind::ExtendsProtectedVirtual => "/kythe/edge/extends/protected/virtual",
            EdgeKind::ExtendsPrivateVirtual => "/kythe/edge/extends/private/virtual",
            EdgeKind::ExtendsVirtual => "/kythe/edge/extends/virtual",
        }
    }

    /// Projects an access specifier and virtuality onto the eight
    /// `extends*` kinds.
    pub fn extends(access: AccessSpecifier, is_virtual: bool) -> EdgeKind {
        match (access, is_virtual) {
            (AccessSpecifier::Public, false) => EdgeKind::ExtendsPublic,
            (AccessSpecifier::Public, true) => EdgeKind::ExtendsPublicVirtual,
            (AccessSpecifier::Protected, false) => EdgeKind::ExtendsProtected,
            (AccessSpecifier::Protected, true) => EdgeKind::ExtendsProtectedVirtual,
            (AccessSpecifier::Private, false) => EdgeKind::ExtendsPrivate,
            (AccessSpecifier::Private, true) => EdgeKind::ExtendsPrivateVirtual,
            (AccessSpecifier::None, false) => EdgeKind::Extends,
            (AccessSpecifier::None, true) => EdgeKind::ExtendsVirtual,
        }
    }

    /// The inverse of [`EdgeKind::extends`], for kinds in its image.
    pub fn extends_parts(self) -> Option<(AccessSpecifier, bool)> {
        match self {
            EdgeKind::ExtendsPublic => Some((AccessSpecifier::Public, false)),
            EdgeKind::ExtendsPublicVirtual => Some((AccessSpecifier::Public, true)),
            EdgeKind::ExtendsProtected => Some((AccessSpecifier::Protected, false)),
            EdgeKind::ExtendsProtectedVirtual => Some((AccessSpecifier::Protected, true)),
            EdgeKind::ExtendsPrivate => Some((AccessSpecifier::Private, false)),
            EdgeKind::ExtendsPrivateVirtual => Some((AccessSpecifier::Private, true)),
            EdgeKind::Extends => Some((AccessSpecifier::None, false)),
            EdgeKind::ExtendsVirtual => Some((AccessSpecifier::None, true)),
            _ => None,
        }
    }
}

/// Known node properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    LocStart,
    LocEnd,
    Text,
    Complete,
    Subkind,
}

impl Property {
    pub fn spelling(self) -> &'static str {
        match self {
            Property::LocStart => "/kythe/loc/start",
            Property::LocEnd => "/kythe/loc/end",
            Property::Text => "/kythe/text",
            Property::Complete => "/kythe/complete",
            Property::Subkind => "/kythe/subkind",
        }
    }
}

/// How autological a declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// A definition, hence necessarily complete.
    Definition,
    /// Complete but not necessarily a definition (`enum class E : short;`).
    Complete,
    /// Incomplete (`class C;`).
    Incomplete,
}

impl Completeness {
    pub fn spelling(self) -> &'static str {
        match self {
            Completeness::Definition => "definition",
            Completeness::Complete => "complete",
            Completeness::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Class,
    Union,
}

impl RecordKind {
    pub fn subkind(self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Class => "class",
            RecordKind::Union => "union",
        }
    }
}

/// Whether an enum is scoped (`enum class`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Scoped,
    Unscoped,
}

impl EnumKind {
    pub fn subkind(self) -> &'static str {
        match self {
            EnumKind::Scoped => "enumClass",
            EnumKind::Unscoped => "enum",
        }
    }
}

/// How specific a completion relationship is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specificity {
    /// The only possible relationship in context, e.g. a definition
    /// completing a forward declaration in the same source file.
    UniquelyCompletes,
    /// One of many possible relationships.
    Completes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSpecifier {
    Public,
    Protected,
    Private,
    /// No access specifier applies (non-class contexts).
    None,
}

/// Whether an edge may opt out of claiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claimability {
    /// May be dropped by claiming.
    Claimable,
    /// Must always be emitted.
    Unclaimable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_projection_round_trips() {
        let accesses = [
            AccessSpecifier::Public,
            AccessSpecifier::Protected,
            AccessSpecifier::Private,
            AccessSpecifier::None,
        ];
        for access in accesses {
            for is_virtual in [false, true] {
                let kind = EdgeKind::extends(access, is_virtual);
                assert_eq!(kind.extends_parts(), Some((access, is_virtual)));
            }
        }
    }

    #[test]
    fn non_extends_kinds_have_no_parts() {
        assert_eq!(EdgeKind::Defines.extends_parts(), None);
        assert_eq!(EdgeKind::ChildOf.extends_parts(), None);
    }
}
