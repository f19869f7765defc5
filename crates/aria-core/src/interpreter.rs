//! Turns finalized agent utterances into structured records.
//!
//! Each strategy is a pure function from the utterance text to an optional
//! [`Extraction`]. [`interpret`] runs them in a fixed order and stops at the
//! first hit, so a later strategy never sees text an earlier one claimed.

use crate::{value_text, Claim, Contract, CustomerRecord};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

pub const CONTRACT_LIST_MARKER: &str = "here are the contracts";
pub const CLAIM_LIST_MARKER: &str = "here are the claims";
pub const CLAIM_CREATED_MARKER: &str = "claim created successfully";
pub const CLAIM_ERROR_MARKER: &str = "error creating claim";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Created,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A JSON lookup result. Lists are taken as-is, without field checks.
    Record {
        customer: CustomerRecord,
        contracts: Vec<Contract>,
        claims: Vec<Claim>,
    },
    /// Marker reply. Empty when no line carried all four fields; the marker
    /// still claims the text so later strategies never see it.
    Contracts(Vec<Contract>),
    Claims(Vec<Claim>),
    ClaimOutcome {
        outcome: ClaimOutcome,
        notice: String,
    },
    /// Identity scraped from `ID:` / `Name:` lines.
    LineRecord(CustomerRecord),
}

impl Extraction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Record { .. } => "json_record",
            Self::Contracts(_) => "contract_list",
            Self::Claims(_) => "claim_list",
            Self::ClaimOutcome { .. } => "claim_outcome",
            Self::LineRecord(_) => "line_record",
        }
    }
}

pub type Extractor = fn(&str) -> Option<Extraction>;

pub const CASCADE: [Extractor; 5] = [
    extract_json_record,
    extract_contract_list,
    extract_claim_list,
    extract_claim_outcome,
    extract_line_record,
];

pub fn interpret(text: &str) -> Option<Extraction> {
    let hit = CASCADE.iter().find_map(|extractor| extractor(text));
    match &hit {
        Some(extraction) => debug!(event = "agent_output_matched", kind = extraction.kind()),
        None => debug!(event = "agent_output_unmatched", len = text.len()),
    }
    hit
}

pub fn extract_json_record(text: &str) -> Option<Extraction> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let object = value.as_object()?;
    let id = object.get("id").and_then(value_text)?;
    if !["firstName", "lastName", "name"]
        .iter()
        .any(|key| object.contains_key(*key))
    {
        return None;
    }

    let field = |key: &str| object.get(key).and_then(value_text);
    let customer = CustomerRecord {
        id,
        first_name: field("firstName").unwrap_or_default(),
        last_name: field("lastName").or_else(|| field("name")).unwrap_or_default(),
        email: field("email").unwrap_or_default(),
        phone: field("phone").unwrap_or_default(),
    };

    Some(Extraction::Record {
        customer,
        contracts: object_list(object, "contracts"),
        claims: object_list(object, "claims"),
    })
}

fn object_list<T: serde::de::DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Vec<T> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn extract_contract_list(text: &str) -> Option<Extraction> {
    if !contains_marker(text, CONTRACT_LIST_MARKER) {
        return None;
    }
    let [id, number, status, kind] = contract_patterns();
    let contracts: Vec<Contract> = item_lines(text)
        .filter_map(|line| {
            Some(Contract {
                id: capture(id, line)?,
                number: capture(number, line)?,
                status: capture(status, line)?,
                contract_type: capture(kind, line)?,
            })
        })
        .collect();
    Some(Extraction::Contracts(contracts))
}

pub fn extract_claim_list(text: &str) -> Option<Extraction> {
    if !contains_marker(text, CLAIM_LIST_MARKER) {
        return None;
    }
    let [id, kind, status, date] = claim_patterns();
    let claims: Vec<Claim> = item_lines(text)
        .filter_map(|line| {
            Some(Claim {
                id: capture(id, line)?,
                claim_type: capture(kind, line)?,
                status: capture(status, line)?,
                date: capture(date, line)?,
            })
        })
        .collect();
    Some(Extraction::Claims(claims))
}

pub fn extract_claim_outcome(text: &str) -> Option<Extraction> {
    let outcome = if contains_marker(text, CLAIM_CREATED_MARKER) {
        ClaimOutcome::Created
    } else if contains_marker(text, CLAIM_ERROR_MARKER) {
        ClaimOutcome::Failed
    } else {
        return None;
    };
    Some(Extraction::ClaimOutcome {
        outcome,
        notice: text.to_string(),
    })
}

pub fn extract_line_record(text: &str) -> Option<Extraction> {
    let mut customer = CustomerRecord::default();
    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("ID:") {
            customer.id = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Name:") {
            let name = rest.trim();
            match name.split_once(' ') {
                Some((first, last)) => {
                    customer.first_name = first.to_string();
                    customer.last_name = last.trim().to_string();
                }
                None => {
                    customer.first_name = name.to_string();
                    customer.last_name.clear();
                }
            }
        } else if let Some(rest) = line.strip_prefix("Email:") {
            customer.email = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Phone:") {
            customer.phone = rest.trim().to_string();
        }
    }

    let has_name = !customer.first_name.is_empty() || !customer.last_name.is_empty();
    (customer.has_id() && has_name).then_some(Extraction::LineRecord(customer))
}

fn contains_marker(text: &str, marker: &str) -> bool {
    text.to_lowercase().contains(marker)
}

fn item_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter_map(|line| {
        let line = line.trim_start();
        line.strip_prefix('-')
            .or_else(|| line.strip_prefix('*'))
            .or_else(|| line.strip_prefix('•'))
    })
}

fn capture(pattern: &Regex, line: &str) -> Option<String> {
    let value = pattern.captures(line)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn field_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{label}\s*:\s*([^,\n]+)")).expect("valid regex")
}

fn contract_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            field_pattern(r"contract\s+id"),
            field_pattern("number"),
            field_pattern("status"),
            field_pattern("type"),
        ]
    })
}

fn claim_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            field_pattern(r"claim\s+id"),
            field_pattern("type"),
            field_pattern("status"),
            field_pattern("date"),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_record_takes_precedence_and_skips_field_checks() {
        let text = r#"{"id":"42","firstName":"Jean","lastName":"Dupont","email":"j@x.com","contracts":[{"id":"C1"}]}"#;
        let Some(Extraction::Record {
            customer,
            contracts,
            claims,
        }) = interpret(text)
        else {
            panic!("expected json record")
        };
        assert_eq!(customer.id, "42");
        assert_eq!(customer.first_name, "Jean");
        assert_eq!(customer.last_name, "Dupont");
        assert_eq!(customer.email, "j@x.com");
        assert_eq!(
            contracts,
            vec![Contract {
                id: "C1".to_string(),
                ..Contract::default()
            }]
        );
        assert!(claims.is_empty());
    }

    #[test]
    fn json_record_falls_back_to_name_field() {
        let text = r#"{"id": 7, "name": "Martin", "claims": [{"id": "S1", "type": "Vol"}, "junk"]}"#;
        let Some(Extraction::Record {
            customer, claims, ..
        }) = extract_json_record(text)
        else {
            panic!("expected json record")
        };
        assert_eq!(customer.id, "7");
        assert_eq!(customer.last_name, "Martin");
        assert!(customer.first_name.is_empty());
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].claim_type, "Vol");
    }

    #[test]
    fn json_without_name_fields_is_not_a_record() {
        assert!(extract_json_record(r#"{"id": "42", "email": "j@x.com"}"#).is_none());
        assert!(extract_json_record(r#"["id", "firstName"]"#).is_none());
        assert!(extract_json_record("not json at all").is_none());
    }

    #[test]
    fn contract_marker_extracts_complete_lines() {
        let text = "Here are the contracts for Adherent ID 123:\n  - Contract ID: C1, Number: N1, Status: Active, Type: Health";
        assert_eq!(
            interpret(text),
            Some(Extraction::Contracts(vec![Contract {
                id: "C1".to_string(),
                number: "N1".to_string(),
                status: "Active".to_string(),
                contract_type: "Health".to_string(),
            }]))
        );
    }

    #[test]
    fn contract_lines_missing_a_field_are_dropped() {
        let text = "HERE ARE THE CONTRACTS:\n- Contract ID: C1, Number: N1, Status: Active\n* Contract ID: C2, Number: N2, Status: Closed, Type: Auto";
        let Some(Extraction::Contracts(contracts)) = extract_contract_list(text) else {
            panic!("expected contracts")
        };
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].id, "C2");
        assert_eq!(contracts[0].contract_type, "Auto");
    }

    #[test]
    fn marker_without_complete_lines_still_matches() {
        let text = "Here are the contracts:\nnone on file";
        assert_eq!(interpret(text), Some(Extraction::Contracts(Vec::new())));
    }

    #[test]
    fn claim_marker_preempts_line_scan() {
        let text = "Here are the claims for this adherent\nID: 42\nName: Jean Dupont\n- Claim ID: S1, Type: Vol, Status: Open";
        assert_eq!(interpret(text), Some(Extraction::Claims(Vec::new())));
    }

    #[test]
    fn claim_marker_extracts_claims() {
        let text = "Here are the claims:\n- Claim ID: S1, Type: Water damage, Status: Open, Date: 2024-03-01\n- Claim ID: S2, Type: Theft, Status: Closed";
        assert_eq!(
            interpret(text),
            Some(Extraction::Claims(vec![Claim {
                id: "S1".to_string(),
                claim_type: "Water damage".to_string(),
                status: "Open".to_string(),
                date: "2024-03-01".to_string(),
            }]))
        );
    }

    #[test]
    fn claim_outcomes_are_recognized() {
        assert_eq!(
            interpret("Claim created successfully. ID: CLM1"),
            Some(Extraction::ClaimOutcome {
                outcome: ClaimOutcome::Created,
                notice: "Claim created successfully. ID: CLM1".to_string(),
            })
        );
        assert!(matches!(
            interpret("There was an Error creating claim: contract not found"),
            Some(Extraction::ClaimOutcome {
                outcome: ClaimOutcome::Failed,
                ..
            })
        ));
    }

    #[test]
    fn claim_outcome_preempts_line_scan() {
        let text = "Claim created successfully.\nID: CLM1\nName: Jean Dupont";
        assert!(matches!(
            interpret(text),
            Some(Extraction::ClaimOutcome { .. })
        ));
    }

    #[test]
    fn line_scan_splits_name_on_first_space() {
        let text = "Adherent found.\nID: 99\nName: Marie Claire Martin\nEmail: m@x.com\nPhone: 0601020304";
        assert_eq!(
            interpret(text),
            Some(Extraction::LineRecord(CustomerRecord {
                id: "99".to_string(),
                first_name: "Marie".to_string(),
                last_name: "Claire Martin".to_string(),
                email: "m@x.com".to_string(),
                phone: "0601020304".to_string(),
            }))
        );
    }

    #[test]
    fn line_scan_requires_id_and_name() {
        assert!(extract_line_record("ID: 99\nEmail: m@x.com").is_none());
        assert!(extract_line_record("Name: Jean Dupont").is_none());
        assert!(interpret("Bonjour, comment puis-je vous aider ?").is_none());
    }

    #[test]
    fn interpretation_is_deterministic() {
        let text = "Here are the claims:\n- Claim ID: S1, Type: Theft, Status: Open, Date: 2024-01-02";
        assert_eq!(interpret(text), interpret(text));
    }
}
