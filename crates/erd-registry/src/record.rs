use crate::descriptor::FieldDescriptor;
use crate::format::FieldValue;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A decoded field value as observed at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub erd: String,
    pub name: String,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl FieldRecord {
    pub fn new(desc: &FieldDescriptor, value: FieldValue, ts: Option<OffsetDateTime>) -> Self {
        Self {
            erd: desc.erd().to_string(),
            name: desc.name().to_string(),
            value,
            ts: ts.and_then(|t| {
                t.format(&time::format_description::well_known::Rfc3339)
                    .ok()
            }),
        }
    }
}
