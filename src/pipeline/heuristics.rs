//! Pattern-based field scan over plain text.
//!
//! A degraded mode for callers that already hold a document's text and want a
//! rough first pass without an inference service. It is never used by
//! [`crate::process::DocumentPipeline`]: an inference or parse failure stays a
//! failure. The CLI exposes it behind `--heuristic-only`.
//!
//! Rules, each taking the first match in the text:
//!
//! | Field | Rule |
//! |-------|------|
//! | `clientEmail` | RFC-5322-ish address |
//! | `clientPhone` | South African number (`+27` or `0` prefix) |
//! | `clientName` | two adjacent capitalised words |
//! | `dateOfIncident` | `d/m/yy`, `dd-mm-yyyy` … |
//! | `estimatedAmount` | Rand amount, `R 250,000.00` |
//! | `caseNumber` | reference after "case", "matter" or "file" (+ "no"/"number"/"#") |
//! | `urgency` | keyword lists, high before medium, else low |
//! | `description` | first sentence or line longer than 50 characters that is not a bare name |

use crate::output::{ExtractedFields, Urgency};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+27\s?|\b0)\d{2}\s?\d{3}\s?\d{4}\b").unwrap());

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());

static BARE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[A-Z][a-z]+\s+[A-Z][a-z]+\s*$").unwrap());

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}\b").unwrap());

static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bR\s?\d[\d,]*(?:\.\d{2})?").unwrap());

// Keyword is case-insensitive; the reference itself must be upper-case and
// contain a digit, so prose such as "the case involves" does not match.
static CASE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:\b(?:case|matter|file))\s?(?i:no\.?|number|#)?\s?:?\s?([A-Z0-9][A-Z0-9\-/]*)")
        .unwrap()
});

// Punctuation only ends a sentence when followed by whitespace, so e-mail
// addresses and decimals stay intact. Line breaks also separate.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n").unwrap());

const HIGH_URGENCY: &[&str] = &["urgent", "emergency", "immediate", "asap", "rush"];
const MEDIUM_URGENCY: &[&str] = &["soon", "priority", "important"];

/// Minimum length for a sentence to count as a description.
const MIN_DESCRIPTION_CHARS: usize = 50;

/// Scan `text` for matter-intake fields.
pub fn scan_text(text: &str) -> ExtractedFields {
    ExtractedFields {
        client_email: first_match(&EMAIL, text),
        client_phone: first_match(&PHONE, text),
        client_name: first_match(&NAME, text),
        date_of_incident: first_match(&DATE, text),
        estimated_amount: first_match(&AMOUNT, text).and_then(|a| parse_rand(&a)),
        case_number: case_number(text),
        urgency: Some(urgency(text)),
        description: description(text),
        ..Default::default()
    }
}

fn first_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().trim().to_string())
}

fn parse_rand(amount: &str) -> Option<f64> {
    let digits: String = amount
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse().ok()
}

fn case_number(text: &str) -> Option<String> {
    CASE_NUMBER
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|s| s.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn urgency(text: &str) -> Urgency {
    let lower = text.to_lowercase();
    if HIGH_URGENCY.iter().any(|k| lower.contains(k)) {
        Urgency::High
    } else if MEDIUM_URGENCY.iter().any(|k| lower.contains(k)) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

fn description(text: &str) -> Option<String> {
    SENTENCE_END
        .split(text)
        .find(|s| s.chars().count() > MIN_DESCRIPTION_CHARS && !BARE_NAME.is_match(s))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
}
