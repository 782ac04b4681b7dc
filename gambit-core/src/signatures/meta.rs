use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Descriptive metadata attached to a set of signatures
///
/// Carried through loading, querying and export without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignaturesMeta {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// Name of the genome attribute the signature ids correspond to
    #[serde(default)]
    pub id_attr: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl SignaturesMeta {
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_missing_fields_default() {
        let meta: SignaturesMeta = serde_json::from_str(r#"{"name": "refs"}"#).unwrap();
        assert_eq!(meta, SignaturesMeta::with_name("refs"));
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_meta_extra_passthrough() {
        let json = r#"{"id":"gambit/refseq","name":null,"version":"1.0","id_attr":"key","description":null,"extra":{"source":"ncbi","n":3}}"#;
        let meta: SignaturesMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.id_attr.as_deref(), Some("key"));
        assert_eq!(meta.extra["n"], 3);

        let back = serde_json::to_string(&meta).unwrap();
        assert_eq!(serde_json::from_str::<SignaturesMeta>(&back).unwrap(), meta);
    }
}
