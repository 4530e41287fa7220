use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::model::employee::EmployeeId;
use crate::model::leave_balance::{LeaveBalance, LeaveType};

/// Per-(employee, leave type) remaining day counters.
#[async_trait]
pub trait BalanceStore: Send {
    /// Creates one row per entry; `DuplicateBalance` if any pair already exists.
    async fn initialize_balances(
        &mut self,
        employee_id: &EmployeeId,
        defaults: &BTreeMap<LeaveType, u32>,
    ) -> Result<Vec<LeaveBalance>, LedgerError>;

    /// `NotFound` if the leave type was never provisioned for this employee.
    async fn get_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<u32, LedgerError>;

    /// All rows for the employee ordered by leave type.
    async fn list_balances(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveBalance>, LedgerError>;

    /// Atomic `remaining += delta`, returning the new value. Never clamps:
    /// fails with `InsufficientBalance` when the result would be negative.
    async fn adjust_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
        delta: i64,
    ) -> Result<u32, LedgerError>;
}

/// Rejects adjustments whose magnitude alone exceeds the `u32` day counter.
pub(crate) fn check_delta(delta: i64) -> Result<(), LedgerError> {
    if delta.unsigned_abs() > u64::from(u32::MAX) {
        return Err(LedgerError::InvalidAmount(delta));
    }
    Ok(())
}
