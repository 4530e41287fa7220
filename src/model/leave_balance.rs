use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::model::employee::EmployeeId;

const MAX_LEAVE_TYPE_LEN: usize = 32;

/// A provisioned leave category such as `casual` or `medical`.
///
/// Leave types are configuration, not code: any lowercase `[a-z0-9_]` name of up
/// to 32 characters is accepted, but a balance row must exist before it can be used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
pub struct LeaveType(String);

impl LeaveType {
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let name = raw.trim().to_ascii_lowercase();
        let well_formed = !name.is_empty()
            && name.len() <= MAX_LEAVE_TYPE_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !well_formed {
            return Err(LedgerError::InvalidInput(format!(
                "invalid leave type `{}`",
                raw.trim()
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LeaveType {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LeaveType::parse(&value)
    }
}

impl From<LeaveType> for String {
    fn from(value: LeaveType) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = "E-1001", value_type = String)]
    pub employee_id: EmployeeId,
    #[schema(example = "casual", value_type = String)]
    pub leave_type: LeaveType,
    #[schema(example = 10)]
    pub remaining_days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn leave_type_is_normalized() {
        assert_eq!(LeaveType::parse(" Casual ").unwrap().as_str(), "casual");
        assert_eq!(LeaveType::parse("comp_off2").unwrap().as_str(), "comp_off2");
    }

    #[test]
    fn malformed_leave_types_are_rejected() {
        for raw in ["", "   ", "sick leave", "annual!", &"a".repeat(33)] {
            assert!(
                matches!(LeaveType::parse(raw), Err(LedgerError::InvalidInput(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn leave_type_map_keys_deserialize_through_validation() {
        let map: BTreeMap<LeaveType, u32> =
            serde_json::from_str(r#"{"Annual": 10, "medical": 90}"#).unwrap();
        assert_eq!(map[&LeaveType::parse("annual").unwrap()], 10);

        let bad: Result<BTreeMap<LeaveType, u32>, _> = serde_json::from_str(r#"{"no way": 1}"#);
        assert!(bad.is_err());
    }
}
