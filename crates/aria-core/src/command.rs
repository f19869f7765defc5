use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outbound instruction for the voice agent. `Display` renders the exact
/// wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LookupByEmail { email: String },
    LookupByPhone { phone: String },
    LookupByName { first_name: String, last_name: String },
    LookupByLastName { last_name: String },
    ListContracts,
    ListClaims,
    CreateClaim {
        contract_id: String,
        claim_type: String,
        description: String,
        incident_date: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LookupByEmail { .. } => "lookup_adherent_by_email",
            Self::LookupByPhone { .. } => "lookup_adherent_by_phone",
            Self::LookupByName { .. } => "lookup_adherent_by_name",
            Self::LookupByLastName { .. } => "lookup_adherent_by_last_name",
            Self::ListContracts => "list_adherent_contracts",
            Self::ListClaims => "list_adherent_claims",
            Self::CreateClaim { .. } => "create_claim",
        }
    }

    pub fn list_contracts(has_customer_id: bool) -> Result<Self, CommandError> {
        if !has_customer_id {
            return Err(CommandError::NoCustomer);
        }
        Ok(Self::ListContracts)
    }

    pub fn list_claims(has_customer_id: bool) -> Result<Self, CommandError> {
        if !has_customer_id {
            return Err(CommandError::NoCustomer);
        }
        Ok(Self::ListClaims)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Self::LookupByEmail { email } => write!(f, "{name} {email}"),
            Self::LookupByPhone { phone } => write!(f, "{name} {phone}"),
            Self::LookupByName {
                first_name,
                last_name,
            } => write!(f, "{name} {first_name} {last_name}"),
            Self::LookupByLastName { last_name } => write!(f, "{name} {last_name}"),
            Self::ListContracts | Self::ListClaims => f.write_str(name),
            Self::CreateClaim {
                contract_id,
                claim_type,
                description,
                incident_date,
            } => write!(
                f,
                "{name} --contract_id {contract_id} --type {} --description {} --incident_date {incident_date}",
                quoted(claim_type),
                quoted(description),
            ),
        }
    }
}

fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Fill in an email, a phone number or a last name to search.")]
    EmptyLookup,
    #[error("Look up an adherent before requesting their records.")]
    NoCustomer,
    #[error("Missing claim fields: {}", .0.join(", "))]
    IncompleteClaim(Vec<&'static str>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl LookupForm {
    /// Picks the first satisfied criterion: email, phone, full name, then
    /// last name alone.
    pub fn to_command(&self) -> Result<Command, CommandError> {
        let email = self.email.trim();
        let phone = self.phone.trim();
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();

        if !email.is_empty() {
            Ok(Command::LookupByEmail {
                email: email.to_string(),
            })
        } else if !phone.is_empty() {
            Ok(Command::LookupByPhone {
                phone: phone.to_string(),
            })
        } else if !first_name.is_empty() && !last_name.is_empty() {
            Ok(Command::LookupByName {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            })
        } else if !last_name.is_empty() {
            Ok(Command::LookupByLastName {
                last_name: last_name.to_string(),
            })
        } else {
            Err(CommandError::EmptyLookup)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    ContractId,
    ClaimType,
    Description,
    IncidentDate,
}

impl DraftField {
    pub const ALL: [DraftField; 4] = [
        DraftField::ContractId,
        DraftField::ClaimType,
        DraftField::Description,
        DraftField::IncidentDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContractId => "contract_id",
            Self::ClaimType => "claim_type",
            Self::Description => "description",
            Self::IncidentDate => "incident_date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDraft {
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub claim_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub incident_date: String,
}

impl ClaimDraft {
    pub fn field(&self, field: DraftField) -> &str {
        match field {
            DraftField::ContractId => &self.contract_id,
            DraftField::ClaimType => &self.claim_type,
            DraftField::Description => &self.description,
            DraftField::IncidentDate => &self.incident_date,
        }
    }

    pub fn set(&mut self, field: DraftField, value: impl Into<String>) {
        let slot = match field {
            DraftField::ContractId => &mut self.contract_id,
            DraftField::ClaimType => &mut self.claim_type,
            DraftField::Description => &mut self.description,
            DraftField::IncidentDate => &mut self.incident_date,
        };
        *slot = value.into();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        DraftField::ALL
            .into_iter()
            .filter(|field| self.field(*field).trim().is_empty())
            .map(DraftField::as_str)
            .collect()
    }

    pub fn to_command(&self) -> Result<Command, CommandError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(CommandError::IncompleteClaim(missing));
        }
        Ok(Command::CreateClaim {
            contract_id: self.contract_id.trim().to_string(),
            claim_type: self.claim_type.trim().to_string(),
            description: self.description.trim().to_string(),
            incident_date: self.incident_date.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, phone: &str, first: &str, last: &str) -> LookupForm {
        LookupForm {
            email: email.to_string(),
            phone: phone.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn email_wins_over_phone() {
        let command = form("j@x.com", "0601020304", "Jean", "Dupont")
            .to_command()
            .expect("lookup command");
        assert_eq!(command.to_string(), "lookup_adherent_by_email j@x.com");
    }

    #[test]
    fn lookup_branches_follow_priority() {
        let phone = form("", " 0601020304 ", "Jean", "Dupont")
            .to_command()
            .expect("phone");
        assert_eq!(phone.to_string(), "lookup_adherent_by_phone 0601020304");

        let name = form("", "", "Jean", "Dupont").to_command().expect("name");
        assert_eq!(name.to_string(), "lookup_adherent_by_name Jean Dupont");

        let last = form("", "", "", "Dupont").to_command().expect("last name");
        assert_eq!(last.to_string(), "lookup_adherent_by_last_name Dupont");
    }

    #[test]
    fn first_name_alone_is_not_a_lookup() {
        assert_eq!(
            form("  ", "", "Jean", "").to_command(),
            Err(CommandError::EmptyLookup)
        );
    }

    #[test]
    fn list_commands_need_a_customer() {
        assert_eq!(Command::list_contracts(false), Err(CommandError::NoCustomer));
        assert_eq!(
            Command::list_claims(true).expect("claims").to_string(),
            "list_adherent_claims"
        );
        assert_eq!(
            Command::list_contracts(true).expect("contracts").to_string(),
            "list_adherent_contracts"
        );
    }

    #[test]
    fn create_claim_quotes_free_text() {
        let draft = ClaimDraft {
            contract_id: "CONTR00024".to_string(),
            claim_type: "Bris de glace".to_string(),
            description: "Pare-brise \"fissuré\"".to_string(),
            incident_date: "2024-05-28".to_string(),
        };
        assert_eq!(
            draft.to_command().expect("claim").to_string(),
            r#"create_claim --contract_id CONTR00024 --type "Bris de glace" --description "Pare-brise \"fissuré\"" --incident_date 2024-05-28"#
        );
    }

    #[test]
    fn incomplete_draft_lists_missing_fields() {
        let mut draft = ClaimDraft::default();
        draft.set(DraftField::ContractId, "C1");
        draft.set(DraftField::Description, "   ");
        let err = draft.to_command().expect_err("incomplete");
        assert_eq!(
            err,
            CommandError::IncompleteClaim(vec!["claim_type", "description", "incident_date"])
        );
        assert_eq!(
            err.to_string(),
            "Missing claim fields: claim_type, description, incident_date"
        );
    }
}
