//! The instruction template sent with every document.
//!
//! Callers can override it via
//! [`crate::config::IntakeConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The field names must stay in sync with
//! the camelCase names of [`crate::output::ExtractedFields`], which is what
//! [`crate::pipeline::parse`] reads back.

/// Default extraction instruction.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are a legal intake assistant. The attached document is a legal document (an attorney's brief, correspondence, or a court filing). Extract the details needed to open a new matter.

Respond with a single JSON object and nothing else, using exactly these keys. Each value below describes the expected type:

{
  "clientName": "string or null",
  "clientEmail": "string or null",
  "clientPhone": "string or null",
  "clientAddress": "string or null",
  "lawFirm": "string or null",
  "caseTitle": "string or null",
  "caseNumber": "string or null",
  "dateOfIncident": "string or null",
  "description": "string or null",
  "urgency": "low, medium or high",
  "estimatedAmount": "number or null",
  "deadlines": ["string"],
  "parties": ["string"],
  "extractedText": "string"
}

Rules:
- Use null when a value is not present in the document. Never guess.
- clientName is the client or instructing attorney; lawFirm is the instructing firm.
- caseTitle reads like "Smith v Jones"; caseNumber is the court case or matter reference.
- description is two to four sentences describing the matter.
- estimatedAmount is the claim value as a plain JSON number, with no currency symbol.
- deadlines lists each deadline as written in the document; parties lists every named party.
- extractedText is the document's text, in reading order.
- Do not wrap the JSON in markdown fences.
- Do not add commentary before or after the JSON."#;

/// Field keys the template asks for, in template order.
pub const REQUESTED_FIELDS: &[&str] = &[
    "clientName",
    "clientEmail",
    "clientPhone",
    "clientAddress",
    "lawFirm",
    "caseTitle",
    "caseNumber",
    "dateOfIncident",
    "description",
    "urgency",
    "estimatedAmount",
    "deadlines",
    "parties",
    "extractedText",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn prompt_mentions_every_requested_field() {
        for field in REQUESTED_FIELDS {
            assert!(
                DEFAULT_EXTRACTION_PROMPT.contains(&format!("\"{field}\"")),
                "prompt is missing {field}"
            );
        }
    }

    #[test]
    fn schema_block_is_valid_json_with_the_requested_keys() {
        let start = DEFAULT_EXTRACTION_PROMPT.find("{\n").unwrap();
        let end = DEFAULT_EXTRACTION_PROMPT.find("\n}").unwrap() + 2;
        let schema: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&DEFAULT_EXTRACTION_PROMPT[start..end]).unwrap();

        let keys: BTreeSet<&str> = schema.keys().map(String::as_str).collect();
        let requested: BTreeSet<&str> = REQUESTED_FIELDS.iter().copied().collect();
        assert_eq!(keys, requested);
        assert!(!DEFAULT_EXTRACTION_PROMPT.contains("//"));
    }

    #[test]
    fn prompt_asks_for_json_only() {
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("single JSON object"));
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("null"));
    }
}
