//! Confidence scoring: how complete is an extraction?
//!
//! A pure function over a fixed weight table. The weights sum to 100, so the
//! score is the sum of the weights of present fields, normalised by the total
//! and rounded.

use crate::output::ExtractedFields;

/// Scored fields and their weights. Sums to 100.
pub const FIELD_WEIGHTS: &[(&str, u32)] = &[
    ("clientName", 15),
    ("clientEmail", 20),
    ("clientPhone", 15),
    ("description", 25),
    ("caseNumber", 10),
    ("estimatedAmount", 10),
    ("urgency", 5),
];

/// Completeness score in `0..=100`. Zero present fields score 0.
pub fn score(fields: &ExtractedFields) -> u8 {
    let total: u32 = FIELD_WEIGHTS.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return 0;
    }
    let earned: u32 = FIELD_WEIGHTS
        .iter()
        .filter(|(name, _)| is_present(fields, name))
        .map(|(_, w)| w)
        .sum();
    ((earned as f64 / total as f64) * 100.0).round() as u8
}

fn is_present(fields: &ExtractedFields, name: &str) -> bool {
    match name {
        "clientName" => non_empty(&fields.client_name),
        "clientEmail" => non_empty(&fields.client_email),
        "clientPhone" => non_empty(&fields.client_phone),
        "description" => non_empty(&fields.description),
        "caseNumber" => non_empty(&fields.case_number),
        "estimatedAmount" => fields.estimated_amount.is_some_and(|a| a != 0.0),
        "urgency" => fields.urgency.is_some(),
        _ => false,
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
