//! JSON shapes exchanged with the server.

use serde::{Deserialize, Serialize};

use skel_core::{parse_server_timestamp, Address, Annotation, AnnotationKind, ProposedName};

#[derive(Debug, Serialize)]
pub(crate) struct CommentPush<'a> {
    pub address: u64,
    pub comment: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NamePush<'a> {
    pub address: u64,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TypePush<'a> {
    pub address: u64,
    #[serde(rename = "type")]
    pub type_string: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AbstractPush<'a> {
    #[serde(rename = "abstract")]
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StructCreate<'a> {
    pub name: &'a str,
}

/// `{"result": bool}` acknowledgement.
#[derive(Debug, Deserialize)]
pub(crate) struct Ack {
    pub result: bool,
}

/// One comment or name as returned by the time-windowed GETs.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteRecord {
    pub address: u64,
    pub data: String,
    pub timestamp: String,
}

impl RemoteRecord {
    /// `None` when the timestamp does not parse.
    pub fn into_annotation(self, kind: AnnotationKind) -> Option<Annotation> {
        let ts = parse_server_timestamp(&self.timestamp)?;
        Some(Annotation::remote(self.address, kind, self.data, ts))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentsPage {
    pub comments: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamesPage {
    pub names: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AbstractPage {
    #[serde(rename = "abstract", default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SampleLookup {
    #[serde(default)]
    pub sample_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StructCreated {
    pub result: bool,
    #[serde(default)]
    pub structs: Vec<StructRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StructRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposedFunctions {
    pub functions: Vec<ProposedFunction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposedFunction {
    pub address: u64,
    pub machoc_hash: u64,
    #[serde(default)]
    pub proposed_names: Vec<String>,
}

impl ProposedFunction {
    /// One display row per proposal.
    pub fn into_rows(self) -> impl Iterator<Item = ProposedName> {
        let address = Address(self.address);
        let hash = self.machoc_hash;
        self.proposed_names
            .into_iter()
            .map(move |proposed_name| ProposedName {
                address,
                current_name: None,
                content_hash: hash,
                proposed_name,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_push_uses_type_key() {
        let json = serde_json::to_value(TypePush {
            address: 16,
            type_string: "int __cdecl f(int)",
        })
        .unwrap();
        assert_eq!(json["type"], "int __cdecl f(int)");
    }

    #[test]
    fn record_with_bad_timestamp_is_dropped() {
        let record = RemoteRecord {
            address: 1,
            data: "x".to_string(),
            timestamp: "garbage".to_string(),
        };
        assert!(record.into_annotation(AnnotationKind::Name).is_none());
    }

    #[test]
    fn proposed_function_flattens_per_name() {
        let func = ProposedFunction {
            address: 0x401000,
            machoc_hash: 0xdeadbeef,
            proposed_names: vec!["a".to_string(), "b".to_string()],
        };
        let rows: Vec<_> = func.into_rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].proposed_name, "b");
        assert_eq!(rows[0].content_hash, 0xdeadbeef);
    }
}
