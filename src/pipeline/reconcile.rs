//! Field reconciliation: merge extracted fields into a matter form.
//!
//! [`MatterForm`] keeps one value per logical field. External systems name
//! those fields differently (the form UI uses camelCase, the matters table
//! snake_case), so naming is handled only at the edges:
//!
//! * [`MatterForm::from_record`] reads a JSON record in either spelling.
//! * [`MatterForm::to_record`] writes one spelling.
//! * [`MatterForm::to_dual_record`] writes both, for consumers that still
//!   expect each field under two keys.
//!
//! [`reconcile`] is non-destructive: a present extracted value wins, an absent
//! one leaves the form untouched.

use crate::output::ExtractedFields;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Logical matter fields that extraction can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    ClientName,
    ClientEmail,
    ClientPhone,
    LawFirm,
    Description,
    CaseNumber,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::ClientName,
        FormField::ClientEmail,
        FormField::ClientPhone,
        FormField::LawFirm,
        FormField::Description,
        FormField::CaseNumber,
    ];

    /// Name used by the intake form.
    pub fn ui_key(self) -> &'static str {
        match self {
            FormField::ClientName => "clientName",
            FormField::ClientEmail => "clientEmail",
            FormField::ClientPhone => "clientPhone",
            FormField::LawFirm => "lawFirm",
            FormField::Description => "description",
            FormField::CaseNumber => "caseNumber",
        }
    }

    /// Column name in the matters table.
    pub fn persistence_key(self) -> &'static str {
        match self {
            FormField::ClientName => "client_name",
            FormField::ClientEmail => "client_email",
            FormField::ClientPhone => "client_phone",
            FormField::LawFirm => "instructing_firm",
            FormField::Description => "description",
            FormField::CaseNumber => "court_case_number",
        }
    }

    pub fn key(self, convention: KeyConvention) -> &'static str {
        match convention {
            KeyConvention::Ui => self.ui_key(),
            KeyConvention::Persistence => self.persistence_key(),
        }
    }

    fn extracted(self, fields: &ExtractedFields) -> Option<&str> {
        let value = match self {
            FormField::ClientName => &fields.client_name,
            FormField::ClientEmail => &fields.client_email,
            FormField::ClientPhone => &fields.client_phone,
            FormField::LawFirm => &fields.law_firm,
            FormField::Description => &fields.description,
            FormField::CaseNumber => &fields.case_number,
        };
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui_key())
    }
}

/// Key spelling for a serialised form record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyConvention {
    #[default]
    Ui,
    Persistence,
}

/// Canonical form state, one slot per [`FormField`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterForm {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub law_firm: Option<String>,
    pub description: Option<String>,
    pub case_number: Option<String>,
}

impl MatterForm {
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    fn slot(&self, field: FormField) -> &Option<String> {
        match field {
            FormField::ClientName => &self.client_name,
            FormField::ClientEmail => &self.client_email,
            FormField::ClientPhone => &self.client_phone,
            FormField::LawFirm => &self.law_firm,
            FormField::Description => &self.description,
            FormField::CaseNumber => &self.case_number,
        }
    }

    fn slot_mut(&mut self, field: FormField) -> &mut Option<String> {
        match field {
            FormField::ClientName => &mut self.client_name,
            FormField::ClientEmail => &mut self.client_email,
            FormField::ClientPhone => &mut self.client_phone,
            FormField::LawFirm => &mut self.law_firm,
            FormField::Description => &mut self.description,
            FormField::CaseNumber => &mut self.case_number,
        }
    }

    /// Read a record keyed in either convention.
    ///
    /// When both spellings carry a non-empty string, the UI key wins. Keys
    /// that are not form fields are ignored, as are non-string values.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let mut form = Self::default();
        for field in FormField::ALL {
            let value = [field.ui_key(), field.persistence_key()]
                .into_iter()
                .filter_map(|key| record.get(key)?.as_str())
                .map(str::trim)
                .find(|s| !s.is_empty());
            if let Some(value) = value {
                form.set(field, value);
            }
        }
        form
    }

    /// Populated fields under one key convention.
    pub fn to_record(&self, convention: KeyConvention) -> Map<String, Value> {
        FormField::ALL
            .into_iter()
            .filter_map(|field| {
                let value = self.get(field)?;
                Some((field.key(convention).to_string(), Value::String(value.to_string())))
            })
            .collect()
    }

    /// Populated fields under both key conventions.
    pub fn to_dual_record(&self) -> Map<String, Value> {
        let mut record = self.to_record(KeyConvention::Persistence);
        record.extend(self.to_record(KeyConvention::Ui));
        record
    }
}

/// Merge `extracted` into a copy of `destination`.
///
/// Every non-empty extracted value overwrites its slot; absent or blank
/// values never clear one.
pub fn reconcile(extracted: &ExtractedFields, destination: &MatterForm) -> MatterForm {
    let mut merged = destination.clone();
    for field in FormField::ALL {
        if let Some(value) = field.extracted(extracted) {
            merged.set(field, value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn absent_fields_leave_destination_untouched() {
        let mut destination = MatterForm::default();
        destination.set(FormField::CaseNumber, "JHB/1234/2024");
        destination.set(FormField::ClientName, "Existing Client");

        let extracted = ExtractedFields {
            client_email: Some("jane@example.com".into()),
            client_name: Some("   ".into()),
            ..Default::default()
        };
        let merged = reconcile(&extracted, &destination);

        assert_eq!(merged.get(FormField::CaseNumber), Some("JHB/1234/2024"));
        assert_eq!(merged.get(FormField::ClientName), Some("Existing Client"));
        assert_eq!(merged.get(FormField::ClientEmail), Some("jane@example.com"));
    }

    #[test]
    fn present_value_wins() {
        let mut destination = MatterForm::default();
        destination.set(FormField::LawFirm, "Old Firm Inc");
        let extracted = ExtractedFields {
            law_firm: Some("Bowman Gilfillan".into()),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&extracted, &destination).get(FormField::LawFirm),
            Some("Bowman Gilfillan")
        );
    }

    #[test]
    fn dual_record_writes_both_spellings() {
        let extracted = ExtractedFields {
            client_name: Some("Jane Doe".into()),
            case_number: Some("SM-2025-001".into()),
            ..Default::default()
        };
        let dual = reconcile(&extracted, &MatterForm::default()).to_dual_record();

        assert_eq!(dual["clientName"], "Jane Doe");
        assert_eq!(dual["client_name"], "Jane Doe");
        assert_eq!(dual["caseNumber"], "SM-2025-001");
        assert_eq!(dual["court_case_number"], "SM-2025-001");
        assert!(!dual.contains_key("clientEmail"));
    }

    #[test]
    fn shared_key_appears_once() {
        let mut form = MatterForm::default();
        form.set(FormField::Description, "Lease dispute");
        let dual = form.to_dual_record();
        assert_eq!(dual.len(), 1);
        assert_eq!(dual["description"], "Lease dispute");
    }

    #[test]
    fn reads_either_convention() {
        let ui = MatterForm::from_record(&record(json!({
            "clientName": "Jane Doe",
            "lawFirm": "Smith & Associates",
            "unrelated": 42
        })));
        let persisted = MatterForm::from_record(&record(json!({
            "client_name": "Jane Doe",
            "instructing_firm": "Smith & Associates"
        })));
        assert_eq!(ui, persisted);
        assert_eq!(ui.get(FormField::LawFirm), Some("Smith & Associates"));
    }

    #[test]
    fn ui_spelling_wins_when_both_present() {
        let form = MatterForm::from_record(&record(json!({
            "client_name": "Stale Name",
            "clientName": "Jane Doe",
            "client_email": "jane@example.com",
            "clientEmail": ""
        })));
        assert_eq!(form.get(FormField::ClientName), Some("Jane Doe"));
        assert_eq!(form.get(FormField::ClientEmail), Some("jane@example.com"));
    }

    #[test]
    fn persistence_record_round_trips() {
        let mut form = MatterForm::default();
        form.set(FormField::ClientPhone, "+27 11 123 4567");
        form.set(FormField::CaseNumber, "A1/2025");
        let back = MatterForm::from_record(&form.to_record(KeyConvention::Persistence));
        assert_eq!(back, form);
    }
}
