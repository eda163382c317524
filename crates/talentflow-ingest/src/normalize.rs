//! Pure row normalization
//!
//! Turns one raw spreadsheet row plus a header mapping into canonical
//! candidate fields. No I/O and no clock: the same row and mapping always
//! produce the same output, which is what makes the normalizer unit
//! testable row-by-row.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mapping::CanonicalField;

/// Normalized candidate fields extracted from one row.
///
/// Absent means absent: an empty cell, an "n/a" marker or a value that
/// fails validation all leave the field `None` rather than carrying a
/// sentinel string into storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[^\s@]+@[^\s@]+$").unwrap()
    })
}

fn experience_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(\d+(?:\.\d+)?)").unwrap()
    })
}

/// A trimmed string cell, or `None` if the cell is empty, null or a
/// placeholder like "na" / "n/a".
fn text_cell(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    if lowered == "na" || lowered == "n/a" || lowered == "n.a." || lowered == "none" {
        return None;
    }
    Some(text)
}

fn normalize_email(value: &Value) -> Option<String> {
    let text = text_cell(value)?.to_lowercase();
    email_regex().is_match(&text).then_some(text)
}

/// Phone numbers are reduced to their digits; fewer than seven digits is
/// treated as not a phone number at all.
fn normalize_phone(value: &Value) -> Option<String> {
    let text = text_cell(value)?;
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= 7).then_some(digits)
}

/// Pull the first decimal out of free text, so "5 yrs exp" and "5.5" both
/// parse. Numeric cells pass straight through.
fn normalize_experience(value: &Value) -> Option<f64> {
    if let Value::Number(n) = value {
        return n.as_f64();
    }
    let text = text_cell(value)?;
    let captures = experience_regex().captures(&text)?;
    captures.get(1)?.as_str().parse().ok()
}

fn normalize_skills(value: &Value) -> Vec<String> {
    let Some(text) = text_cell(value) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    for part in text.split([',', '|', ';']) {
        let skill = part.trim();
        if skill.is_empty() {
            continue;
        }
        if !seen
            .iter()
            .any(|s: &String| s.eq_ignore_ascii_case(skill))
        {
            seen.push(skill.to_string());
        }
    }
    seen
}

/// Normalize one raw row into candidate fields.
///
/// `mapping` is header → canonical field as produced by resolution or
/// manual confirmation; unmapped headers (`None`) are ignored here and stay
/// only in the raw-row payload. When a full name is present but neither
/// first nor last name mapped, the first whitespace token becomes the first
/// name and the remaining tokens the last name; a single-token name keeps
/// an empty (not absent) last name.
pub fn normalize_row(
    row: &Map<String, Value>,
    mapping: &BTreeMap<String, Option<CanonicalField>>,
) -> CandidateFields {
    let mut fields = CandidateFields::default();

    for (header, value) in row {
        let Some(Some(field)) = mapping.get(header) else {
            continue;
        };
        match field {
            CanonicalField::FirstName => fields.first_name = text_cell(value),
            CanonicalField::LastName => fields.last_name = text_cell(value),
            CanonicalField::FullName => fields.full_name = text_cell(value),
            CanonicalField::Email => fields.email = normalize_email(value),
            CanonicalField::Phone => fields.phone = normalize_phone(value),
            CanonicalField::ExperienceYears => {
                fields.experience_years = normalize_experience(value)
            }
            CanonicalField::Skills => fields.skills = normalize_skills(value),
            CanonicalField::Location => fields.location = text_cell(value),
            CanonicalField::CurrentCompany => fields.current_company = text_cell(value),
            CanonicalField::Designation => fields.designation = text_cell(value),
        }
    }

    if fields.first_name.is_none() && fields.last_name.is_none() {
        if let Some(full) = &fields.full_name {
            let mut tokens = full.split_whitespace();
            match tokens.next() {
                Some(first) => {
                    fields.first_name = Some(first.to_string());
                    fields.last_name = Some(tokens.collect::<Vec<_>>().join(" "));
                }
                None => {
                    fields.first_name = Some(full.clone());
                    fields.last_name = Some(String::new());
                }
            }
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(pairs: &[(&str, CanonicalField)]) -> BTreeMap<String, Option<CanonicalField>> {
        pairs
            .iter()
            .map(|(h, f)| (h.to_string(), Some(*f)))
            .collect()
    }

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_email_lowercased_and_validated() {
        let m = mapping(&[("Email", CanonicalField::Email)]);

        let ok = normalize_row(&row(&[("Email", json!("  Asha.Rao@Example.COM "))]), &m);
        assert_eq!(ok.email.as_deref(), Some("asha.rao@example.com"));

        let bad = normalize_row(&row(&[("Email", json!("not-an-email"))]), &m);
        assert_eq!(bad.email, None);

        let spaced = normalize_row(&row(&[("Email", json!("a b@x.com"))]), &m);
        assert_eq!(spaced.email, None);

        let short_domain = normalize_row(&row(&[("Email", json!("x@y"))]), &m);
        assert_eq!(short_domain.email.as_deref(), Some("x@y"));
    }

    #[test]
    fn test_phone_digits_only_with_minimum() {
        let m = mapping(&[("Phone", CanonicalField::Phone)]);

        let ok = normalize_row(&row(&[("Phone", json!("(555) 123-4567"))]), &m);
        assert_eq!(ok.phone.as_deref(), Some("5551234567"));

        let short = normalize_row(&row(&[("Phone", json!("12345"))]), &m);
        assert_eq!(short.phone, None);
    }

    #[test]
    fn test_experience_from_free_text() {
        let m = mapping(&[("Exp", CanonicalField::ExperienceYears)]);

        assert_eq!(
            normalize_row(&row(&[("Exp", json!("5 yrs exp"))]), &m).experience_years,
            Some(5.0)
        );
        assert_eq!(
            normalize_row(&row(&[("Exp", json!("3.5"))]), &m).experience_years,
            Some(3.5)
        );
        assert_eq!(
            normalize_row(&row(&[("Exp", json!(7))]), &m).experience_years,
            Some(7.0)
        );
        assert_eq!(
            normalize_row(&row(&[("Exp", json!("fresher"))]), &m).experience_years,
            None
        );
    }

    #[test]
    fn test_placeholders_mean_absent() {
        let m = mapping(&[
            ("Email", CanonicalField::Email),
            ("Location", CanonicalField::Location),
        ]);
        let fields = normalize_row(
            &row(&[("Email", json!("na")), ("Location", json!("N/A"))]),
            &m,
        );
        assert_eq!(fields.email, None);
        assert_eq!(fields.location, None);
    }

    #[test]
    fn test_skills_split_and_deduped() {
        let m = mapping(&[("Skills", CanonicalField::Skills)]);
        let fields = normalize_row(
            &row(&[("Skills", json!("Rust, SQL | rust ,, Docker"))]),
            &m,
        );
        assert_eq!(fields.skills, vec!["Rust", "SQL", "Docker"]);
    }

    #[test]
    fn test_full_name_split() {
        let m = mapping(&[("Name", CanonicalField::FullName)]);

        let two = normalize_row(&row(&[("Name", json!("Asha Rao"))]), &m);
        assert_eq!(two.first_name.as_deref(), Some("Asha"));
        assert_eq!(two.last_name.as_deref(), Some("Rao"));
        assert_eq!(two.full_name.as_deref(), Some("Asha Rao"));

        let three = normalize_row(&row(&[("Name", json!("Mary Jane Watson"))]), &m);
        assert_eq!(three.first_name.as_deref(), Some("Mary"));
        assert_eq!(three.last_name.as_deref(), Some("Jane Watson"));

        let single = normalize_row(&row(&[("Name", json!("Asha"))]), &m);
        assert_eq!(single.first_name.as_deref(), Some("Asha"));
        assert_eq!(single.last_name.as_deref(), Some(""));
    }

    #[test]
    fn test_explicit_names_win_over_split() {
        let m = mapping(&[
            ("First", CanonicalField::FirstName),
            ("Name", CanonicalField::FullName),
        ]);
        let fields = normalize_row(
            &row(&[("First", json!("Asha")), ("Name", json!("Someone Else"))]),
            &m,
        );
        assert_eq!(fields.first_name.as_deref(), Some("Asha"));
        assert_eq!(fields.last_name, None);
    }

    #[test]
    fn test_unmapped_headers_ignored() {
        let mut m = mapping(&[("Email", CanonicalField::Email)]);
        m.insert("Notes".to_string(), None);
        let fields = normalize_row(
            &row(&[("Email", json!("a@x.com")), ("Notes", json!("whatever"))]),
            &m,
        );
        assert_eq!(fields.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_numeric_cells_coerced_to_text() {
        let m = mapping(&[("Phone", CanonicalField::Phone)]);
        let fields = normalize_row(&row(&[("Phone", json!(5551234567u64))]), &m);
        assert_eq!(fields.phone.as_deref(), Some("5551234567"));
    }
}
