//! Canonical candidate fields and heuristic header mapping
//!
//! Spreadsheets arrive with every imaginable header spelling. This module
//! defines the canonical field set a candidate record is built from and
//! resolves raw column headers against a synonym table, first by exact
//! alias match and then by substring, so "Email Address" and "Candidate
//! Email" both land on [`CanonicalField::Email`] without an oracle call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The canonical fields a candidate record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    ExperienceYears,
    Skills,
    Location,
    CurrentCompany,
    Designation,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::FirstName,
        CanonicalField::LastName,
        CanonicalField::FullName,
        CanonicalField::Email,
        CanonicalField::Phone,
        CanonicalField::ExperienceYears,
        CanonicalField::Skills,
        CanonicalField::Location,
        CanonicalField::CurrentCompany,
        CanonicalField::Designation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::FirstName => "firstName",
            CanonicalField::LastName => "lastName",
            CanonicalField::FullName => "fullName",
            CanonicalField::Email => "email",
            CanonicalField::Phone => "phone",
            CanonicalField::ExperienceYears => "experienceYears",
            CanonicalField::Skills => "skills",
            CanonicalField::Location => "location",
            CanonicalField::CurrentCompany => "currentCompany",
            CanonicalField::Designation => "designation",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::ALL
            .iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownFieldError(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown canonical field '{0}'")]
pub struct UnknownFieldError(pub String);

/// Synonym table, ordered so more specific fields are tried first.
///
/// FirstName and LastName come before FullName so "first name" never falls
/// through to the full-name substring "name". The order of entries decides
/// ties within each matching pass.
const SYNONYMS: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::FirstName,
        &["first name", "firstname", "fname", "given name", "forename"],
    ),
    (
        CanonicalField::LastName,
        &["last name", "lastname", "lname", "surname", "family name"],
    ),
    (
        CanonicalField::FullName,
        &["full name", "fullname", "name", "candidate name", "applicant name"],
    ),
    (
        CanonicalField::Email,
        &["email", "e mail", "email address", "mail", "email id", "emailid"],
    ),
    (
        CanonicalField::Phone,
        &[
            "phone",
            "phone number",
            "mobile",
            "mobile number",
            "contact",
            "contact number",
            "cell",
            "telephone",
        ],
    ),
    (
        CanonicalField::ExperienceYears,
        &[
            "experience",
            "years of experience",
            "total experience",
            "exp",
            "work experience",
            "yoe",
        ],
    ),
    (
        CanonicalField::Skills,
        &["skills", "skill set", "skillset", "key skills", "technologies", "tech stack"],
    ),
    (
        CanonicalField::Location,
        &["location", "city", "current location", "place", "address"],
    ),
    (
        CanonicalField::CurrentCompany,
        &["current company", "company", "employer", "organization", "current employer"],
    ),
    (
        CanonicalField::Designation,
        &["designation", "title", "job title", "role", "position", "current role"],
    ),
];

/// Normalize a raw header for comparison: trim, lowercase, fold `_` and `-`
/// to spaces and collapse runs of whitespace.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The outcome of resolving a header set against the synonym table.
///
/// Every input header appears as a key; headers with no match carry `None`
/// and flow through to the raw-row payload untouched downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderResolution {
    pub per_header: BTreeMap<String, Option<CanonicalField>>,
}

impl HeaderResolution {
    /// True when not a single header could be matched. This is the trigger
    /// for escalating to the mapping oracle or manual mapping.
    pub fn is_fully_unmapped(&self) -> bool {
        self.per_header.values().all(|f| f.is_none())
    }

    pub fn mapped_count(&self) -> usize {
        self.per_header.values().filter(|f| f.is_some()).count()
    }
}

/// Resolve raw headers to canonical fields.
///
/// Two passes over the whole synonym table: exact alias equality first,
/// then substring containment for whatever is still unmapped. The exact
/// pass running to completion first means "Email" on one column always
/// beats "Email Notes" matching by substring elsewhere only if nothing
/// claimed it exactly.
pub fn resolve_headers(headers: &[String]) -> HeaderResolution {
    let mut per_header: BTreeMap<String, Option<CanonicalField>> = headers
        .iter()
        .map(|h| (h.clone(), None))
        .collect();

    // Exact pass.
    for header in headers {
        let normalized = normalize_header(header);
        for (field, aliases) in SYNONYMS {
            if aliases.iter().any(|a| *a == normalized) {
                per_header.insert(header.clone(), Some(*field));
                break;
            }
        }
    }

    // Substring pass over the remainder.
    for header in headers {
        if per_header.get(header).map(|f| f.is_some()).unwrap_or(false) {
            continue;
        }
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            continue;
        }
        for (field, aliases) in SYNONYMS {
            if aliases.iter().any(|a| normalized.contains(a)) {
                per_header.insert(header.clone(), Some(*field));
                break;
            }
        }
    }

    HeaderResolution { per_header }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  First_Name "), "first name");
        assert_eq!(normalize_header("E-Mail   Address"), "e mail address");
        assert_eq!(normalize_header("PHONE"), "phone");
    }

    #[test]
    fn test_exact_matches() {
        let resolved = resolve_headers(&headers(&["First Name", "Email", "Phone"]));
        assert_eq!(
            resolved.per_header["First Name"],
            Some(CanonicalField::FirstName)
        );
        assert_eq!(resolved.per_header["Email"], Some(CanonicalField::Email));
        assert_eq!(resolved.per_header["Phone"], Some(CanonicalField::Phone));
    }

    #[test]
    fn test_substring_matches() {
        let resolved = resolve_headers(&headers(&["Candidate Email Address", "Total Exp (Yrs)"]));
        assert_eq!(
            resolved.per_header["Candidate Email Address"],
            Some(CanonicalField::Email)
        );
        assert_eq!(
            resolved.per_header["Total Exp (Yrs)"],
            Some(CanonicalField::ExperienceYears)
        );
    }

    #[test]
    fn test_first_name_beats_full_name_substring() {
        let resolved = resolve_headers(&headers(&["First Name", "Name"]));
        assert_eq!(
            resolved.per_header["First Name"],
            Some(CanonicalField::FirstName)
        );
        assert_eq!(resolved.per_header["Name"], Some(CanonicalField::FullName));
    }

    #[test]
    fn test_email_notes_still_maps_by_substring() {
        let resolved = resolve_headers(&headers(&["Email Notes"]));
        assert_eq!(
            resolved.per_header["Email Notes"],
            Some(CanonicalField::Email)
        );
    }

    #[test]
    fn test_unmatched_headers_carry_none() {
        let resolved = resolve_headers(&headers(&["Favourite Colour", "Email"]));
        assert_eq!(resolved.per_header["Favourite Colour"], None);
        assert!(!resolved.is_fully_unmapped());
        assert_eq!(resolved.mapped_count(), 1);
    }

    #[test]
    fn test_fully_unmapped() {
        let resolved = resolve_headers(&headers(&["Col A", "Col B"]));
        assert!(resolved.is_fully_unmapped());
    }

    #[test]
    fn test_field_string_round_trip() {
        for field in CanonicalField::ALL {
            assert_eq!(field.as_str().parse::<CanonicalField>().unwrap(), field);
        }
        assert!("nonsense".parse::<CanonicalField>().is_err());
    }
}
