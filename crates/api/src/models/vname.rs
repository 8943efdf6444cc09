use serde::{Deserialize, Serialize};

/// A five-field signature identifying an object in the global graph.
///
/// Two VNames are equal iff all five fields are equal. Empty fields are
/// omitted when serialized so that entry streams stay compact.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub corpus: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
}

impl VName {
    /// A VName carrying only a language, the weakest identity we ever emit.
    pub fn for_language(language: impl Into<String>) -> Self {
        VName {
            language: language.into(),
            ..Default::default()
        }
    }

    /// A file VName: corpus/root/path identify the file, no signature.
    pub fn for_file(
        corpus: impl Into<String>,
        root: impl Into<String>,
        path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        VName {
            signature: String::new(),
            corpus: corpus.into(),
            root: root.into(),
            path: path.into(),
            language: language.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
            && self.corpus.is_empty()
            && self.root.is_empty()
            && self.path.is_empty()
            && self.language.is_empty()
    }
}
