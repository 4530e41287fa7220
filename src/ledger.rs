//! The Leave Ledger.
//!
//! Owns balances and request history and is the only writer of both. Every
//! operation receives the invoking identity as an explicit [`Caller`]; mutations
//! run inside one unit of work that is committed only after every check passed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::model::employee::{Employee, EmployeeId, NewEmployee};
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::leave_request::{DateRange, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::role::Role;
use crate::model::session::Session;
use crate::store::{LedgerStore, LedgerTx, authorize};

/// The already-authenticated identity invoking a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub employee_id: EmployeeId,
    pub role: Role,
}

impl Caller {
    pub fn new(employee_id: EmployeeId, role: Role) -> Self {
        Self { employee_id, role }
    }

    /// Employees may act on themselves; admins on anyone.
    fn authorize_subject(&self, subject: &EmployeeId) -> Result<(), LedgerError> {
        if &self.employee_id == subject || self.role.satisfies(Role::Admin) {
            Ok(())
        } else {
            Err(LedgerError::Forbidden(format!(
                "`{}` may not act on behalf of `{subject}`",
                self.employee_id
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyLeave {
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedLeave {
    pub request: LeaveRequest,
    #[schema(example = 5)]
    pub remaining_days: u32,
}

#[derive(Debug, Clone)]
pub struct OnboardEmployee {
    pub employee: NewEmployee,
    pub default_balances: BTreeMap<LeaveType, u32>,
}

#[derive(Debug, Clone)]
pub struct Onboarded {
    pub employee: Employee,
    pub balances: Vec<LeaveBalance>,
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        self.store.begin().await
    }

    async fn begin_read(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        self.store.begin_read().await
    }

    /// Re-reads the caller inside `tx` and authorizes against the stored role.
    async fn require_admin(
        tx: &mut Box<dyn LedgerTx>,
        caller: &Caller,
    ) -> Result<Employee, LedgerError> {
        if !caller.role.satisfies(Role::Admin) {
            return Err(LedgerError::Forbidden("admin role required".into()));
        }
        let invoker = match tx.get_employee(&caller.employee_id).await {
            Ok(employee) => employee,
            Err(LedgerError::NotFound(_)) => {
                return Err(LedgerError::Forbidden(format!(
                    "unknown caller `{}`",
                    caller.employee_id
                )));
            }
            Err(e) => return Err(e),
        };
        authorize(&invoker, Role::Admin)?;
        Ok(invoker)
    }

    #[instrument(skip(self, caller), fields(caller = %caller.employee_id))]
    pub async fn get_balance(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<u32, LedgerError> {
        caller.authorize_subject(employee_id)?;

        let mut tx = self.begin_read().await?;
        tx.get_employee(employee_id).await?;
        tx.get_balance(employee_id, leave_type).await
    }

    pub async fn list_balances(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveBalance>, LedgerError> {
        caller.authorize_subject(employee_id)?;

        let mut tx = self.begin_read().await?;
        tx.get_employee(employee_id).await?;
        tx.list_balances(employee_id).await
    }

    pub async fn list_history(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveRequest>, LedgerError> {
        caller.authorize_subject(employee_id)?;

        let mut tx = self.begin_read().await?;
        tx.get_employee(employee_id).await?;
        tx.list_for_employee(employee_id).await
    }

    /// Checks run in a fixed order: date range, overlap, then balance. The first
    /// failing check is reported and nothing is written.
    #[instrument(
        skip(self, caller, command),
        fields(
            caller = %caller.employee_id,
            employee_id = %command.employee_id,
            leave_type = %command.leave_type
        )
    )]
    pub async fn apply_leave(
        &self,
        caller: &Caller,
        command: ApplyLeave,
    ) -> Result<AppliedLeave, LedgerError> {
        caller.authorize_subject(&command.employee_id)?;

        let range = DateRange::new(command.start_date, command.end_date)?;
        let requested_days = range.days();

        let mut tx = self.begin().await?;

        // serializes overlap check and insert for this employee
        let employee = tx.lock_employee(&command.employee_id).await?;
        if !employee.is_active {
            return Err(LedgerError::Forbidden(format!(
                "employee `{}` is deactivated",
                employee.id
            )));
        }

        let overlapping = tx
            .find_overlapping(&command.employee_id, range, LeaveStatus::BLOCKING)
            .await?;
        if let Some(existing) = overlapping.first() {
            debug!(existing_id = existing.id, "Leave request overlaps");
            return Err(LedgerError::OverlappingRequest {
                existing_id: existing.id,
                existing_start: existing.start_date,
                existing_end: existing.end_date,
            });
        }

        let available = tx
            .get_balance(&command.employee_id, &command.leave_type)
            .await?;
        if requested_days > available {
            debug!(requested_days, available, "Insufficient leave balance");
            return Err(LedgerError::InsufficientBalance {
                leave_type: command.leave_type.to_string(),
                requested: u64::from(requested_days),
                remaining: available,
            });
        }

        let remaining_days = tx
            .adjust_balance(
                &command.employee_id,
                &command.leave_type,
                -i64::from(requested_days),
            )
            .await?;
        let request = tx
            .insert_request(NewLeaveRequest {
                employee_id: command.employee_id,
                leave_type: command.leave_type,
                range,
                reason: command.reason,
                status: LeaveStatus::Approved,
            })
            .await?;
        tx.commit().await?;

        info!(
            request_id = request.id,
            requested_days,
            remaining_days,
            "Leave approved"
        );

        Ok(AppliedLeave {
            request,
            remaining_days,
        })
    }

    /// Admin only. Returns the updated remaining days.
    #[instrument(skip(self, caller), fields(caller = %caller.employee_id))]
    pub async fn credit_leave(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
        days: i64,
    ) -> Result<u32, LedgerError> {
        if days <= 0 || days > i64::from(u32::MAX) {
            return Err(LedgerError::InvalidAmount(days));
        }

        let mut tx = self.begin().await?;
        Self::require_admin(&mut tx, caller).await?;
        tx.lock_employee(employee_id).await?;

        let remaining_days = tx.adjust_balance(employee_id, leave_type, days).await?;
        tx.commit().await?;

        info!(days, remaining_days, "Leave credited");
        Ok(remaining_days)
    }

    /// Admin only. Creates the employee and its balance rows together or not at all.
    #[instrument(
        skip(self, caller, command),
        fields(caller = %caller.employee_id, employee_id = %command.employee.id)
    )]
    pub async fn onboard_employee(
        &self,
        caller: &Caller,
        command: OnboardEmployee,
    ) -> Result<Onboarded, LedgerError> {
        let mut tx = self.begin().await?;
        Self::require_admin(&mut tx, caller).await?;

        let onboarded = Self::create_with_balances(&mut tx, command).await?;
        tx.commit().await?;

        info!(
            balances = onboarded.balances.len(),
            role = %onboarded.employee.role,
            "Employee onboarded"
        );
        Ok(onboarded)
    }

    async fn create_with_balances(
        tx: &mut Box<dyn LedgerTx>,
        command: OnboardEmployee,
    ) -> Result<Onboarded, LedgerError> {
        if command.default_balances.is_empty() {
            return Err(LedgerError::InvalidInput(
                "at least one leave balance must be provisioned".into(),
            ));
        }
        command.employee.validate()?;

        let employee = tx.create_employee(command.employee).await?;
        let balances = tx
            .initialize_balances(&employee.id, &command.default_balances)
            .await?;
        if balances.len() != command.default_balances.len() {
            return Err(LedgerError::Inconsistent(format!(
                "employee `{}` onboarded with {} of {} balances",
                employee.id,
                balances.len(),
                command.default_balances.len()
            )));
        }
        Ok(Onboarded { employee, balances })
    }

    /// Creates the first admin when the directory is empty. Start-up only.
    pub async fn bootstrap_admin(
        &self,
        mut command: OnboardEmployee,
    ) -> Result<Option<Employee>, LedgerError> {
        let mut tx = self.begin().await?;
        if tx.count_employees().await? > 0 {
            return Ok(None);
        }

        command.employee.role = Role::Admin;
        let onboarded = Self::create_with_balances(&mut tx, command).await?;
        tx.commit().await?;

        info!(employee_id = %onboarded.employee.id, "Bootstrap admin created");
        Ok(Some(onboarded.employee))
    }

    pub async fn get_employee(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
    ) -> Result<Employee, LedgerError> {
        caller.authorize_subject(employee_id)?;

        let mut tx = self.begin_read().await?;
        tx.get_employee(employee_id).await
    }

    pub async fn list_employees(&self, caller: &Caller) -> Result<Vec<Employee>, LedgerError> {
        let mut tx = self.begin_read().await?;
        Self::require_admin(&mut tx, caller).await?;
        tx.list_employees().await
    }

    /// Admin only soft-disable. Records are never deleted.
    #[instrument(skip(self, caller), fields(caller = %caller.employee_id))]
    pub async fn deactivate_employee(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
    ) -> Result<Employee, LedgerError> {
        if &caller.employee_id == employee_id {
            return Err(LedgerError::Forbidden("cannot deactivate yourself".into()));
        }

        let mut tx = self.begin().await?;
        Self::require_admin(&mut tx, caller).await?;
        tx.lock_employee(employee_id).await?;

        let employee = tx.set_active(employee_id, false).await?;
        let revoked = tx.revoke_sessions_for(employee_id).await?;
        tx.commit().await?;

        info!(revoked_sessions = revoked, "Employee deactivated");
        Ok(employee)
    }

    /// Self only. `credential_hash` is produced by the caller.
    pub async fn change_credential(
        &self,
        caller: &Caller,
        employee_id: &EmployeeId,
        credential_hash: &str,
    ) -> Result<(), LedgerError> {
        if &caller.employee_id != employee_id {
            return Err(LedgerError::Forbidden(
                "credentials can only be changed by their owner".into(),
            ));
        }
        if credential_hash.is_empty() {
            return Err(LedgerError::InvalidInput("credential hash must not be empty".into()));
        }

        let mut tx = self.begin().await?;
        tx.set_credential(employee_id, credential_hash).await?;
        tx.commit().await?;

        info!(employee_id = %employee_id, "Credential changed");
        Ok(())
    }

    /// Active employee by username, for the login adapter.
    pub async fn credentials_for(&self, username: &str) -> Result<Employee, LedgerError> {
        let mut tx = self.begin_read().await?;
        match tx.find_by_username(username.trim()).await? {
            Some(employee) if employee.is_active => Ok(employee),
            _ => Err(LedgerError::NotFound(format!("active employee `{username}`"))),
        }
    }

    /// Records a freshly issued access token so it can be checked and revoked.
    pub async fn open_session(
        &self,
        employee_id: &EmployeeId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut tx = self.begin().await?;
        tx.lock_employee(employee_id).await?;
        tx.purge_expired_sessions(employee_id, Utc::now()).await?;
        tx.record_session(Session::new(jti.to_string(), employee_id.clone(), expires_at))
            .await?;
        tx.commit().await?;

        debug!(employee_id = %employee_id, "Session opened");
        Ok(())
    }

    /// The active employee behind a live session, or `Forbidden`.
    pub async fn authenticate(
        &self,
        employee_id: &EmployeeId,
        jti: &str,
    ) -> Result<Employee, LedgerError> {
        let mut tx = self.begin_read().await?;
        let live = tx
            .find_session(jti)
            .await?
            .filter(|s| &s.employee_id == employee_id && s.is_live(Utc::now()));
        if live.is_none() {
            return Err(LedgerError::Forbidden("session revoked or expired".into()));
        }

        let employee = match tx.get_employee(employee_id).await {
            Err(LedgerError::NotFound(_)) => {
                return Err(LedgerError::Forbidden(format!("unknown employee `{employee_id}`")));
            }
            other => other?,
        };
        authorize(&employee, Role::Employee)?;
        Ok(employee)
    }

    /// Revokes the caller's own session. Unknown sessions are ignored.
    pub async fn logout(&self, caller: &Caller, jti: &str) -> Result<(), LedgerError> {
        let mut tx = self.begin().await?;
        match tx.find_session(jti).await? {
            Some(session) if session.employee_id != caller.employee_id => {
                return Err(LedgerError::Forbidden(
                    "sessions can only be closed by their owner".into(),
                ));
            }
            Some(_) => tx.revoke_session(jti).await?,
            None => {}
        }
        tx.commit().await?;

        info!(employee_id = %caller.employee_id, "Logged out");
        Ok(())
    }
}
