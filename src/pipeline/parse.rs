//! Response parsing: recover one JSON object from free-form model text.
//!
//! Models frequently wrap the requested JSON in prose ("Here is the
//! result: … Thanks.") or markdown fences. The parser therefore scans the
//! whole response for the first balanced `{…}` span that decodes as a JSON
//! object instead of anchoring to the start or end of the text.
//!
//! A response with no such span is a [`StageError::Parse`]. An object whose
//! fields are all `null` is a valid, empty extraction; the two cases must
//! stay distinguishable for the caller.

use crate::error::StageError;
use crate::output::{ExtractedEntity, ExtractedFields, Urgency};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Fields plus the text the model read.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub fields: ExtractedFields,
    /// The payload's `extractedText`, or the full raw response when absent.
    pub extracted_text: String,
}

/// Locate and decode the structured payload in `raw`.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, StageError> {
    let object = find_json_object(raw).ok_or_else(|| StageError::Parse {
        detail: format!(
            "no JSON object found in model response ({} chars)",
            raw.chars().count()
        ),
    })?;
    debug!("Decoded JSON payload with {} keys", object.len());

    let extracted_text = string_field(&object, "extractedText").unwrap_or_else(|| raw.to_string());
    Ok(ParsedResponse {
        fields: fields_from_object(&object),
        extracted_text,
    })
}

/// First balanced `{…}` span in `text` that decodes as a JSON object.
pub fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let end = balanced_end(&text[start..])?;
        match serde_json::from_str::<Value>(&text[start..start + end]) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

/// Byte length of the balanced span starting at `s[0] == '{'`.
///
/// Braces inside JSON string literals are ignored.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Map a decoded object onto [`ExtractedFields`].
///
/// Missing keys, `null`, and empty strings all map to `None`. `urgency`
/// defaults to [`Urgency::Low`] when absent or unrecognised.
pub fn fields_from_object(object: &Map<String, Value>) -> ExtractedFields {
    ExtractedFields {
        client_name: string_field(object, "clientName"),
        client_email: string_field(object, "clientEmail"),
        client_phone: string_field(object, "clientPhone"),
        client_address: string_field(object, "clientAddress"),
        law_firm: string_field(object, "lawFirm"),
        case_title: string_field(object, "caseTitle"),
        case_number: string_field(object, "caseNumber"),
        date_of_incident: string_field(object, "dateOfIncident"),
        description: string_field(object, "description"),
        urgency: Some(urgency_field(object)),
        estimated_amount: amount_field(object, "estimatedAmount"),
        deadlines: list_field(object, "deadlines"),
        parties: list_field(object, "parties"),
        entities: entities_field(object),
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => {
            warn!("Ignoring non-scalar value for '{}': {}", key, other);
            None
        }
    }
}

fn urgency_field(object: &Map<String, Value>) -> Urgency {
    match string_field(object, "urgency") {
        None => Urgency::default(),
        Some(s) => s.parse().unwrap_or_else(|e| {
            warn!("{}; defaulting to low", e);
            Urgency::default()
        }),
    }
}

fn amount_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            let parsed = cleaned.parse::<f64>().ok();
            if parsed.is_none() && !s.trim().is_empty() {
                warn!("Ignoring unparseable amount '{}'", s);
            }
            parsed
        }
        _ => None,
    }
}

fn list_field(object: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = match object.get(key)? {
        Value::Array(values) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => return None,
    };
    Some(items).filter(|items| !items.is_empty())
}

fn entities_field(object: &Map<String, Value>) -> Option<Vec<ExtractedEntity>> {
    let values = object.get("entities")?.as_array()?;
    let entities: Vec<ExtractedEntity> = values
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();
    Some(entities).filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_object_from_surrounding_prose() {
        let raw = r#"noise {"clientName":"Jane Doe","clientEmail":"jane@example.com","urgency":"high"} more noise"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.fields.client_name.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.fields.client_email.as_deref(), Some("jane@example.com"));
        assert_eq!(parsed.fields.urgency, Some(Urgency::High));
        assert_eq!(parsed.extracted_text, raw);
    }

    #[test]
    fn round_trips_serialised_fields() {
        let fields = ExtractedFields {
            client_name: Some("Thandi Nkosi".into()),
            client_phone: Some("+27 11 123 4567".into()),
            law_firm: Some("Smith & Associates".into()),
            case_number: Some("SM-2025-001".into()),
            description: Some("Breach of contract {supplier} dispute.".into()),
            urgency: Some(Urgency::Medium),
            estimated_amount: Some(250000.5),
            deadlines: Some(vec!["Response within 14 days".into()]),
            parties: Some(vec!["Thandi Nkosi".into(), "Acme (Pty) Ltd".into()]),
            entities: Some(vec![ExtractedEntity {
                text: "Acme (Pty) Ltd".into(),
                kind: "organization".into(),
                confidence: 0.9,
            }]),
            ..Default::default()
        };
        let raw = format!(
            "Here is the result: {} Thanks.",
            serde_json::to_string(&fields).unwrap()
        );
        assert_eq!(parse_response(&raw).unwrap().fields, fields);
    }

    #[test]
    fn no_object_is_a_parse_error() {
        for raw in ["", "I could not read this document.", "} backwards {", "{ unterminated"] {
            assert!(
                matches!(parse_response(raw), Err(StageError::Parse { .. })),
                "expected parse error for {raw:?}"
            );
        }
    }

    #[test]
    fn all_null_object_is_an_empty_extraction() {
        let parsed = parse_response(r#"{"clientName": null, "urgency": null}"#).unwrap();
        assert_eq!(
            parsed.fields,
            ExtractedFields {
                urgency: Some(Urgency::Low),
                ..Default::default()
            }
        );
    }

    #[test]
    fn skips_non_json_braces_before_payload() {
        let raw = "Fields {listed below}:\n```json\n{\"caseNumber\": \"A1/2025\"}\n```";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.fields.case_number.as_deref(), Some("A1/2025"));
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_span() {
        let raw = r#"{"description": "clause } and { here", "lawFirm": "Bowman"} trailing }"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.fields.description.as_deref(), Some("clause } and { here"));
        assert_eq!(parsed.fields.law_firm.as_deref(), Some("Bowman"));
    }

    #[test]
    fn empty_strings_map_to_absent() {
        let parsed = parse_response(r#"{"clientName": "  ", "parties": [], "deadlines": [""]}"#).unwrap();
        assert_eq!(parsed.fields.client_name, None);
        assert_eq!(parsed.fields.parties, None);
        assert_eq!(parsed.fields.deadlines, None);
    }

    #[test]
    fn urgency_defaults_to_low() {
        let missing = parse_response("{}").unwrap();
        assert_eq!(missing.fields.urgency, Some(Urgency::Low));
        let unknown = parse_response(r#"{"urgency": "critical"}"#).unwrap();
        assert_eq!(unknown.fields.urgency, Some(Urgency::Low));
        let shouted = parse_response(r#"{"urgency": "MEDIUM"}"#).unwrap();
        assert_eq!(shouted.fields.urgency, Some(Urgency::Medium));
    }

    #[test]
    fn lenient_amounts() {
        let parsed = parse_response(r#"{"estimatedAmount": "R 250,000.00"}"#).unwrap();
        assert_eq!(parsed.fields.estimated_amount, Some(250000.0));
        let parsed = parse_response(r#"{"estimatedAmount": 1200}"#).unwrap();
        assert_eq!(parsed.fields.estimated_amount, Some(1200.0));
        let parsed = parse_response(r#"{"estimatedAmount": "unknown"}"#).unwrap();
        assert_eq!(parsed.fields.estimated_amount, None);
    }

    #[test]
    fn extracted_text_prefers_payload() {
        let parsed = parse_response(r#"{"extractedText": "LEGAL MATTER BRIEF"}"#).unwrap();
        assert_eq!(parsed.extracted_text, "LEGAL MATTER BRIEF");
    }

    #[test]
    fn single_string_list_is_accepted() {
        let parsed = parse_response(r#"{"parties": "Acme (Pty) Ltd"}"#).unwrap();
        assert_eq!(parsed.fields.parties, Some(vec!["Acme (Pty) Ltd".to_string()]));
    }
}
