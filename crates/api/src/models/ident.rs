use std::fmt;
use std::sync::Arc;

use super::vname::VName;

/// Provides provenance and claim status for a group of node identities.
///
/// Tokens are handed out by the observer implementation (one per file
/// inclusion, plus a default token and a token for structural types) and
/// shared by reference. Equality is field-wise, so tokens minted for the
/// same inclusion under the same claim verdict compare equal even across
/// observer instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClaimToken {
    pub corpus: String,
    pub root: String,
    pub path: String,
    /// If true, it is reasonable to assume this token is claimed by the
    /// current analysis.
    pub claimed: bool,
}

impl ClaimToken {
    /// A neutral token that claims everything and adds no provenance.
    pub fn claimed_default() -> Self {
        ClaimToken {
            claimed: true,
            ..Default::default()
        }
    }

    /// Stamps `identity` with this token's discriminator.
    pub fn stamp_identity(&self, identity: &str) -> String {
        let mut stamped = identity.to_string();
        if !self.corpus.is_empty() {
            stamped.push('#');
            stamped.push_str(&self.corpus);
        }
        if !self.root.is_empty() {
            stamped.push('#');
            stamped.push_str(&self.root);
        }
        if !self.path.is_empty() {
            stamped.push('#');
            stamped.push_str(&self.path);
        }
        stamped
    }

    /// Copies this token's provenance onto `target`.
    pub fn decorate(&self, target: &mut VName) {
        target.corpus = self.corpus.clone();
        target.root = self.root.clone();
        target.path = self.path.clone();
    }
}

/// The identifier for an object in the graph being observed.
///
/// A node is identified uniquely by its claim token (evidence of provenance)
/// and its identity string. Within one run, two `NodeId`s are equal iff both
/// components are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub token: Arc<ClaimToken>,
    pub identity: String,
}

impl NodeId {
    pub fn new(token: Arc<ClaimToken>, identity: impl Into<String>) -> Self {
        NodeId {
            token,
            identity: identity.into(),
        }
    }

    /// The identity body alone.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The identity annotated by the claim token's discriminator.
    pub fn claimed_string(&self) -> String {
        self.token.stamp_identity(&self.identity)
    }

    /// The VName addressing this node in the global graph. Pure: depends
    /// only on the id itself and the target language.
    pub fn to_vname(&self, language: &str) -> VName {
        let mut vname = VName::for_language(language);
        self.token.decorate(&mut vname);
        vname.signature = self.identity.clone();
        vname
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.claimed_string())
    }
}

/// A logical name independent of any file: no corpus, root, or path.
///
/// The canonical spelling doubles as the signature of the corresponding
/// `name` node. Drivers that distinguish name equivalence classes encode
/// them into the spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameId(pub String);

impl NameId {
    pub fn new(path: impl Into<String>) -> Self {
        NameId(path.into())
    }

    pub fn spelling(&self) -> &str {
        &self.0
    }

    /// The VName of the `name` node for this id: empty corpus/root/path,
    /// signature set to the canonical spelling.
    pub fn to_vname(&self, language: &str) -> VName {
        VName {
            signature: self.0.clone(),
            language: language.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_skips_empty_fields() {
        let token = ClaimToken {
            corpus: "corpus".to_string(),
            root: String::new(),
            path: "a/b.h".to_string(),
            claimed: true,
        };
        assert_eq!(token.stamp_identity("id"), "id#corpus#a/b.h");
        assert_eq!(
            ClaimToken::claimed_default().stamp_identity("id"),
            "id"
        );
    }

    #[test]
    fn node_id_equality_needs_both_components() {
        let t1 = Arc::new(ClaimToken::claimed_default());
        let t2 = Arc::new(ClaimToken {
            path: "p".to_string(),
            claimed: true,
            ..Default::default()
        });
        let a = NodeId::new(t1.clone(), "x");
        assert_eq!(a, NodeId::new(t1.clone(), "x"));
        assert_ne!(a, NodeId::new(t1, "y"));
        assert_ne!(a, NodeId::new(t2, "x"));
    }

    #[test]
    fn node_vname_carries_token_provenance() {
        let token = Arc::new(ClaimToken {
            corpus: "c".to_string(),
            root: "r".to_string(),
            path: "p.h".to_string(),
            claimed: true,
        });
        let vname = NodeId::new(token, "sig").to_vname("c++");
        assert_eq!(vname.signature, "sig");
        assert_eq!(vname.corpus, "c");
        assert_eq!(vname.path, "p.h");
        assert_eq!(vname.language, "c++");
    }
}
