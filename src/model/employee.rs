use derive_more::{Display, Into};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::model::role::Role;

const MAX_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, Into)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    /// Trims surrounding whitespace; rejects empty or overlong identifiers.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let id = raw.trim();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(LedgerError::InvalidInput(format!(
                "employee id must be 1-{MAX_ID_LEN} characters"
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub username: String,
    /// Argon2 PHC string; never serialized.
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

/// Everything the Directory needs to create an employee record.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub id: EmployeeId,
    pub username: String,
    pub credential_hash: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
}

impl NewEmployee {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.username.trim().is_empty() {
            return Err(LedgerError::InvalidInput("username must not be empty".into()));
        }
        if self.credential_hash.is_empty() {
            return Err(LedgerError::InvalidInput("credential hash must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(LedgerError::InvalidInput(format!("invalid email `{}`", self.email)));
        }
        Ok(())
    }

    pub fn into_employee(self) -> Employee {
        Employee {
            id: self.id,
            username: self.username,
            credential_hash: self.credential_hash,
            name: self.name,
            email: self.email,
            department: self.department,
            role: self.role,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_id_is_trimmed_and_bounded() {
        assert_eq!(EmployeeId::parse("  E-1 ").unwrap().as_str(), "E-1");
        assert!(EmployeeId::parse("   ").is_err());
        assert!(EmployeeId::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn credential_hash_is_not_serialized() {
        let employee = NewEmployee {
            id: EmployeeId::parse("E-1").unwrap(),
            username: "jdoe".into(),
            credential_hash: "$argon2id$secret".into(),
            name: "John Doe".into(),
            email: "john@company.com".into(),
            department: None,
            role: Role::Employee,
        }
        .into_employee();

        let json = serde_json::to_value(&employee).unwrap();
        assert!(json.get("credential_hash").is_none());
        assert_eq!(json["id"], "E-1");
        assert_eq!(json["role"], "employee");
    }
}
