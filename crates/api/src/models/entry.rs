use serde::{Deserialize, Serialize};

use super::vname::VName;

/// Fact name carrying a node's kind.
pub const NODE_KIND_FACT: &str = "/kythe/node/kind";
/// Fact name for an ordinary (ordinal-free) edge.
pub const ROOT_FACT: &str = "/";
/// Fact name carrying an edge's ordinal.
pub const ORDINAL_FACT: &str = "/kythe/ordinal";

/// One record of the append-only fact stream.
///
/// Node facts have an empty edge kind and no target and encode one property
/// per record. Edges have both and carry either the root fact with an empty
/// value or the ordinal fact with a base-10 value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    pub source: VName,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edge_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<VName>,
    pub fact_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fact_value: String,
}

impl Entry {
    /// A node fact: one property of `source`.
    pub fn node_fact(
        source: VName,
        fact_name: impl Into<String>,
        fact_value: impl Into<String>,
    ) -> Self {
        Entry {
            source,
            edge_kind: String::new(),
            target: None,
            fact_name: fact_name.into(),
            fact_value: fact_value.into(),
        }
    }

    /// An ordinary edge from `source` to `target`.
    pub fn edge(source: VName, edge_kind: impl Into<String>, target: VName) -> Self {
        Entry {
            source,
            edge_kind: edge_kind.into(),
            target: Some(target),
            fact_name: ROOT_FACT.to_string(),
            fact_value: String::new(),
        }
    }

    /// An edge carrying a positional ordinal.
    pub fn edge_with_ordinal(
        source: VName,
        edge_kind: impl Into<String>,
        target: VName,
        ordinal: u32,
    ) -> Self {
        Entry {
            source,
            edge_kind: edge_kind.into(),
            target: Some(target),
            fact_name: ORDINAL_FACT.to_string(),
            fact_value: ordinal.to_string(),
        }
    }

    pub fn is_edge(&self) -> bool {
        !self.edge_kind.is_empty()
    }
}
