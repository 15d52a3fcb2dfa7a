use crate::reassembly::Outcome;
use serde::{Deserialize, Serialize};

/// Inbound fragment, JSON-encoded in the body of `POST /`.
///
/// Fields are optional at the serde level so that a missing field is reported as an
/// invalid fragment rather than a generic deserialization failure. The capitalised names
/// used by older senders are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentRequest {
    #[serde(default, alias = "Id")]
    pub id: Option<String>,
    #[serde(default, rename = "partIndex", alias = "PartNumber")]
    pub part_index: Option<i64>,
    #[serde(default, alias = "Data")]
    pub data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub outcome: Option<Outcome>,
    pub error: Option<String>,
}
