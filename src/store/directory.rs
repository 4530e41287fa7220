use async_trait::async_trait;

use crate::error::LedgerError;
use crate::model::employee::{Employee, EmployeeId, NewEmployee};
use crate::model::role::Role;

/// Employee identity and role. Sole writer of employee identity fields.
#[async_trait]
pub trait EmployeeDirectory: Send {
    /// Fails with `DuplicateEmployee` if the id or the username is taken.
    async fn create_employee(&mut self, employee: NewEmployee) -> Result<Employee, LedgerError>;

    async fn get_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError>;

    /// Same as `get_employee`, but holds the employee row for the rest of the
    /// unit of work so that concurrent writers for this employee are serialized.
    async fn lock_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError>;

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Employee>, LedgerError>;

    /// Active employees ordered by id.
    async fn list_employees(&mut self) -> Result<Vec<Employee>, LedgerError>;

    async fn count_employees(&mut self) -> Result<u64, LedgerError>;

    async fn set_active(&mut self, id: &EmployeeId, active: bool) -> Result<Employee, LedgerError>;

    async fn set_credential(
        &mut self,
        id: &EmployeeId,
        credential_hash: &str,
    ) -> Result<(), LedgerError>;
}

/// Fails with `Forbidden` unless `employee` is active and its role satisfies `required`.
pub fn authorize(employee: &Employee, required: Role) -> Result<(), LedgerError> {
    if !employee.is_active {
        return Err(LedgerError::Forbidden(format!(
            "employee `{}` is deactivated",
            employee.id
        )));
    }
    if !employee.role.satisfies(required) {
        return Err(LedgerError::Forbidden(format!("{required} role required")));
    }
    Ok(())
}
