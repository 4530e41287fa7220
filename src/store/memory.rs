//! In-process backend.
//!
//! One async `RwLock` guards the whole state. A write unit owns the write guard
//! and a staged copy; `commit` swaps the copy in, dropping the unit discards it.
//! Read units share the read guard and never copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::balance::check_delta;
use super::request::sort_history;
use super::{BalanceStore, EmployeeDirectory, LedgerStore, LedgerTx, RequestStore, SessionStore};
use crate::error::LedgerError;
use crate::model::employee::{Employee, EmployeeId, NewEmployee};
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::leave_request::{
    DateRange, LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest,
};
use crate::model::session::Session;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    employees: BTreeMap<EmployeeId, Employee>,
    balances: BTreeMap<(EmployeeId, LeaveType), u32>,
    requests: Vec<LeaveRequest>,
    last_request_id: LeaveRequestId,
    sessions: BTreeMap<String, Session>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let guard = self.state.clone().write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            access: Access::Write { guard, staged },
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let guard = self.state.clone().read_owned().await;
        Ok(Box::new(MemoryTx {
            access: Access::Read(guard),
        }))
    }
}

enum Access {
    Read(OwnedRwLockReadGuard<MemoryState>),
    Write {
        guard: OwnedRwLockWriteGuard<MemoryState>,
        staged: MemoryState,
    },
}

pub struct MemoryTx {
    access: Access,
}

impl MemoryTx {
    fn state(&self) -> &MemoryState {
        match &self.access {
            Access::Read(guard) => &**guard,
            Access::Write { staged, .. } => staged,
        }
    }

    fn state_mut(&mut self) -> Result<&mut MemoryState, LedgerError> {
        match &mut self.access {
            Access::Read(_) => Err(LedgerError::Inconsistent(
                "write attempted in a read-only unit of work".into(),
            )),
            Access::Write { staged, .. } => Ok(staged),
        }
    }

    fn employee(&self, id: &EmployeeId) -> Result<&Employee, LedgerError> {
        self.state()
            .employees
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("employee `{id}`")))
    }

    fn employee_mut(&mut self, id: &EmployeeId) -> Result<&mut Employee, LedgerError> {
        self.state_mut()?
            .employees
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(format!("employee `{id}`")))
    }

    fn balance_slot(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<&mut u32, LedgerError> {
        self.state_mut()?
            .balances
            .get_mut(&(employee_id.clone(), leave_type.clone()))
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "`{leave_type}` balance for employee `{employee_id}`"
                ))
            })
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryTx {
    async fn create_employee(&mut self, employee: NewEmployee) -> Result<Employee, LedgerError> {
        let state = self.state_mut()?;
        if state.employees.contains_key(&employee.id) {
            return Err(LedgerError::DuplicateEmployee(format!("id `{}`", employee.id)));
        }
        if state
            .employees
            .values()
            .any(|e| e.username == employee.username)
        {
            return Err(LedgerError::DuplicateEmployee(format!(
                "username `{}`",
                employee.username
            )));
        }

        let employee = employee.into_employee();
        state.employees.insert(employee.id.clone(), employee.clone());
        Ok(employee)
    }

    async fn get_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError> {
        self.employee(id).cloned()
    }

    async fn lock_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError> {
        // write units already hold the exclusive lock
        self.state_mut()?;
        self.employee(id).cloned()
    }

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Employee>, LedgerError> {
        Ok(self
            .state()
            .employees
            .values()
            .find(|e| e.username == username)
            .cloned())
    }

    async fn list_employees(&mut self) -> Result<Vec<Employee>, LedgerError> {
        Ok(self
            .state()
            .employees
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }

    async fn count_employees(&mut self) -> Result<u64, LedgerError> {
        Ok(self.state().employees.len() as u64)
    }

    async fn set_active(&mut self, id: &EmployeeId, active: bool) -> Result<Employee, LedgerError> {
        let employee = self.employee_mut(id)?;
        employee.is_active = active;
        Ok(employee.clone())
    }

    async fn set_credential(
        &mut self,
        id: &EmployeeId,
        credential_hash: &str,
    ) -> Result<(), LedgerError> {
        self.employee_mut(id)?.credential_hash = credential_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for MemoryTx {
    async fn initialize_balances(
        &mut self,
        employee_id: &EmployeeId,
        defaults: &BTreeMap<LeaveType, u32>,
    ) -> Result<Vec<LeaveBalance>, LedgerError> {
        self.employee(employee_id)?;
        let state = self.state_mut()?;

        let mut created = Vec::with_capacity(defaults.len());
        for (leave_type, days) in defaults {
            let key = (employee_id.clone(), leave_type.clone());
            if state.balances.contains_key(&key) {
                return Err(LedgerError::DuplicateBalance {
                    employee_id: employee_id.to_string(),
                    leave_type: leave_type.to_string(),
                });
            }
            state.balances.insert(key, *days);
            created.push(LeaveBalance {
                employee_id: employee_id.clone(),
                leave_type: leave_type.clone(),
                remaining_days: *days,
            });
        }
        Ok(created)
    }

    async fn get_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<u32, LedgerError> {
        self.state()
            .balances
            .get(&(employee_id.clone(), leave_type.clone()))
            .copied()
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "`{leave_type}` balance for employee `{employee_id}`"
                ))
            })
    }

    async fn list_balances(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveBalance>, LedgerError> {
        Ok(self
            .state()
            .balances
            .iter()
            .filter(|((owner, _), _)| owner == employee_id)
            .map(|((owner, leave_type), days)| LeaveBalance {
                employee_id: owner.clone(),
                leave_type: leave_type.clone(),
                remaining_days: *days,
            })
            .collect())
    }

    async fn adjust_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
        delta: i64,
    ) -> Result<u32, LedgerError> {
        check_delta(delta)?;
        let slot = self.balance_slot(employee_id, leave_type)?;
        let updated = i64::from(*slot)
            .checked_add(delta)
            .ok_or(LedgerError::InvalidAmount(delta))?;
        if updated < 0 {
            return Err(LedgerError::InsufficientBalance {
                leave_type: leave_type.to_string(),
                requested: delta.unsigned_abs(),
                remaining: *slot,
            });
        }
        *slot = u32::try_from(updated).map_err(|_| LedgerError::InvalidAmount(delta))?;
        Ok(*slot)
    }
}

#[async_trait]
impl RequestStore for MemoryTx {
    async fn list_for_employee(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveRequest>, LedgerError> {
        let mut requests: Vec<LeaveRequest> = self
            .state()
            .requests
            .iter()
            .filter(|r| &r.employee_id == employee_id)
            .cloned()
            .collect();
        sort_history(&mut requests);
        Ok(requests)
    }

    async fn insert_request(
        &mut self,
        request: NewLeaveRequest,
    ) -> Result<LeaveRequest, LedgerError> {
        let state = self.state_mut()?;
        state.last_request_id += 1;
        let created = LeaveRequest {
            id: state.last_request_id,
            employee_id: request.employee_id,
            leave_type: request.leave_type,
            start_date: request.range.start(),
            end_date: request.range.end(),
            requested_days: request.range.days(),
            reason: request.reason,
            status: request.status,
            created_at: Utc::now(),
        };
        state.requests.push(created.clone());
        Ok(created)
    }

    async fn find_overlapping(
        &mut self,
        employee_id: &EmployeeId,
        range: DateRange,
        statuses: &[LeaveStatus],
    ) -> Result<Vec<LeaveRequest>, LedgerError> {
        let mut overlapping: Vec<LeaveRequest> = self
            .state()
            .requests
            .iter()
            .filter(|r| {
                &r.employee_id == employee_id && statuses.contains(&r.status) && r.overlaps(&range)
            })
            .cloned()
            .collect();
        sort_history(&mut overlapping);
        Ok(overlapping)
    }
}

#[async_trait]
impl SessionStore for MemoryTx {
    async fn record_session(&mut self, session: Session) -> Result<(), LedgerError> {
        let state = self.state_mut()?;
        if state.sessions.contains_key(&session.jti) {
            return Err(LedgerError::Inconsistent(format!(
                "session `{}` recorded twice",
                session.jti
            )));
        }
        state.sessions.insert(session.jti.clone(), session);
        Ok(())
    }

    async fn find_session(&mut self, jti: &str) -> Result<Option<Session>, LedgerError> {
        Ok(self.state().sessions.get(jti).cloned())
    }

    async fn revoke_session(&mut self, jti: &str) -> Result<(), LedgerError> {
        if let Some(session) = self.state_mut()?.sessions.get_mut(jti) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn revoke_sessions_for(&mut self, employee_id: &EmployeeId) -> Result<u64, LedgerError> {
        let mut revoked = 0;
        for session in self
            .state_mut()?
            .sessions
            .values_mut()
            .filter(|s| &s.employee_id == employee_id && !s.revoked)
        {
            session.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn purge_expired_sessions(
        &mut self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.state_mut()?
            .sessions
            .retain(|_, s| &s.employee_id != employee_id || s.expires_at > now);
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        match self.access {
            Access::Read(_) => Ok(()),
            Access::Write { mut guard, staged } => {
                *guard = staged;
                Ok(())
            }
        }
    }
}
