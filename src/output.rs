//! Output types for a pipeline invocation.
//!
//! [`ExtractionResult`] is the wire contract toward the caller: it always
//! carries `confidence` and `processingTime`, even when most of
//! [`ExtractedFields`] is absent, so a UI can render partial results.

use crate::document::StorageReference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How urgently the matter needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            other => Err(format!("unknown urgency '{other}'")),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        })
    }
}

/// A raw entity the model tagged in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: f64,
}

/// Structured fields pulled out of a legal document.
///
/// Every field is optional. `None` means "not found"; an empty string is
/// never used to stand in for absence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_firm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_incident: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadlines: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<ExtractedEntity>>,
}

impl ExtractedFields {
    /// True when no field at all was found.
    pub fn is_empty(&self) -> bool {
        self == &ExtractedFields::default()
    }
}

/// Result of a successful pipeline run. Not retained by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub file_url: StorageReference,
    pub extracted_text: String,
    pub extracted_data: ExtractedFields,
    /// 0–100.
    pub confidence: u8,
    /// Wall-clock milliseconds from invocation to result.
    pub processing_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Urgency>(), Ok(Urgency::High));
        assert_eq!(" medium ".parse::<Urgency>(), Ok(Urgency::Medium));
        assert!("critical".parse::<Urgency>().is_err());
    }

    #[test]
    fn absent_fields_are_not_serialised() {
        let fields = ExtractedFields {
            client_name: Some("Jane Doe".into()),
            urgency: Some(Urgency::High),
            ..Default::default()
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"clientName": "Jane Doe", "urgency": "high"})
        );
    }

    #[test]
    fn result_always_carries_confidence_and_time() {
        let result = ExtractionResult {
            file_url: StorageReference::new("https://b.s3.us-east-1.amazonaws.com/k"),
            extracted_text: String::new(),
            extracted_data: ExtractedFields::default(),
            confidence: 0,
            processing_time: 12,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["confidence"], 0);
        assert_eq!(json["processingTime"], 12);
        assert_eq!(json["fileUrl"], "https://b.s3.us-east-1.amazonaws.com/k");
        assert_eq!(json["extractedData"], serde_json::json!({}));
    }

    #[test]
    fn default_is_empty() {
        assert!(ExtractedFields::default().is_empty());
        let f = ExtractedFields {
            parties: Some(vec!["A".into()]),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }
}
