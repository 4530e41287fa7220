//! MySQL backend.
//!
//! A unit of work is a database transaction. Per-employee serialization is a
//! `SELECT ... FOR UPDATE` on the employee row; balance adjustments are a single
//! conditional `UPDATE`, so a stale read can never overdraw a balance.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use super::balance::check_delta;
use super::request::sort_history;
use super::{BalanceStore, EmployeeDirectory, LedgerStore, LedgerTx, RequestStore, SessionStore};
use crate::error::LedgerError;
use crate::model::employee::{Employee, EmployeeId, NewEmployee};
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::leave_request::{DateRange, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::role::Role;
use crate::model::session::Session;

const EMPLOYEE_COLUMNS: &str =
    "id, username, credential_hash, name, email, department, role_id, is_active";

const REQUEST_COLUMNS: &str =
    "id, employee_id, leave_type, start_date, end_date, requested_days, reason, status, created_at";

#[derive(FromRow)]
struct EmployeeRow {
    id: String,
    username: String,
    credential_hash: String,
    name: String,
    email: String,
    department: Option<String>,
    role_id: u8,
    is_active: bool,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = LedgerError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role_id).ok_or_else(|| {
            LedgerError::Inconsistent(format!("employee `{}` has unknown role {}", row.id, row.role_id))
        })?;
        Ok(Employee {
            id: EmployeeId::parse(&row.id)?,
            username: row.username,
            credential_hash: row.credential_hash,
            name: row.name,
            email: row.email,
            department: row.department,
            role,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct BalanceRow {
    employee_id: String,
    leave_type: String,
    remaining_days: i64,
}

impl TryFrom<BalanceRow> for LeaveBalance {
    type Error = LedgerError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        Ok(LeaveBalance {
            remaining_days: remaining(&row.employee_id, &row.leave_type, row.remaining_days)?,
            employee_id: EmployeeId::parse(&row.employee_id)?,
            leave_type: LeaveType::parse(&row.leave_type)?,
        })
    }
}

#[derive(FromRow)]
struct RequestRow {
    id: u64,
    employee_id: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    requested_days: u32,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for LeaveRequest {
    type Error = LedgerError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<LeaveStatus>().map_err(|_| {
            LedgerError::Inconsistent(format!(
                "leave request #{} has unknown status `{}`",
                row.id, row.status
            ))
        })?;
        Ok(LeaveRequest {
            id: row.id,
            employee_id: EmployeeId::parse(&row.employee_id)?,
            leave_type: LeaveType::parse(&row.leave_type)?,
            start_date: row.start_date,
            end_date: row.end_date,
            requested_days: row.requested_days,
            reason: row.reason,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    jti: String,
    employee_id: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl TryFrom<SessionRow> for Session {
    type Error = LedgerError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            jti: row.jti,
            employee_id: EmployeeId::parse(&row.employee_id)?,
            expires_at: row.expires_at,
            revoked: row.revoked,
        })
    }
}

fn remaining(employee_id: &str, leave_type: &str, days: i64) -> Result<u32, LedgerError> {
    u32::try_from(days).map_err(|_| {
        LedgerError::Inconsistent(format!(
            "`{leave_type}` balance of employee `{employee_id}` is {days}"
        ))
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for MySqlStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTx { tx }))
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

impl MySqlTx {
    async fn fetch_employee(
        &mut self,
        id: &EmployeeId,
        for_update: bool,
    ) -> Result<Employee, LedgerError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?{}",
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(LedgerError::NotFound(format!("employee `{id}`"))),
        }
    }

    async fn fetch_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<Option<i64>, LedgerError> {
        let days = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT remaining_days
            FROM leave_balances
            WHERE employee_id = ? AND leave_type = ?
            "#,
        )
        .bind(employee_id.as_str())
        .bind(leave_type.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(days)
    }
}

#[async_trait]
impl EmployeeDirectory for MySqlTx {
    async fn create_employee(&mut self, employee: NewEmployee) -> Result<Employee, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees
                (id, username, credential_hash, name, email, department, role_id, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(employee.id.as_str())
        .bind(&employee.username)
        .bind(&employee.credential_hash)
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(employee.role.id())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(employee.into_employee()),
            Err(e) if is_unique_violation(&e) => Err(LedgerError::DuplicateEmployee(format!(
                "id `{}` or username `{}`",
                employee.id, employee.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError> {
        self.fetch_employee(id, false).await
    }

    async fn lock_employee(&mut self, id: &EmployeeId) -> Result<Employee, LedgerError> {
        self.fetch_employee(id, true).await
    }

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Employee>, LedgerError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE username = ?");
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Employee::try_from).transpose()
    }

    async fn list_employees(&mut self) -> Result<Vec<Employee>, LedgerError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE is_active = TRUE ORDER BY id"
        );
        let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(Employee::try_from).collect()
    }

    async fn count_employees(&mut self) -> Result<u64, LedgerError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn set_active(&mut self, id: &EmployeeId, active: bool) -> Result<Employee, LedgerError> {
        sqlx::query("UPDATE employees SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        // MySQL reports 0 affected rows when the value is unchanged, so re-read instead
        self.fetch_employee(id, false).await
    }

    async fn set_credential(
        &mut self,
        id: &EmployeeId,
        credential_hash: &str,
    ) -> Result<(), LedgerError> {
        self.fetch_employee(id, true).await?;
        sqlx::query("UPDATE employees SET credential_hash = ? WHERE id = ?")
            .bind(credential_hash)
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for MySqlTx {
    async fn initialize_balances(
        &mut self,
        employee_id: &EmployeeId,
        defaults: &BTreeMap<LeaveType, u32>,
    ) -> Result<Vec<LeaveBalance>, LedgerError> {
        let mut created = Vec::with_capacity(defaults.len());
        for (leave_type, days) in defaults {
            let result = sqlx::query(
                r#"
                INSERT INTO leave_balances (employee_id, leave_type, remaining_days)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(employee_id.as_str())
            .bind(leave_type.as_str())
            .bind(i64::from(*days))
            .execute(&mut *self.tx)
            .await;

            match result {
                Ok(_) => created.push(LeaveBalance {
                    employee_id: employee_id.clone(),
                    leave_type: leave_type.clone(),
                    remaining_days: *days,
                }),
                Err(e) if is_unique_violation(&e) => {
                    return Err(LedgerError::DuplicateBalance {
                        employee_id: employee_id.to_string(),
                        leave_type: leave_type.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }

    async fn get_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
    ) -> Result<u32, LedgerError> {
        match self.fetch_balance(employee_id, leave_type).await? {
            Some(days) => remaining(employee_id.as_str(), leave_type.as_str(), days),
            None => Err(LedgerError::NotFound(format!(
                "`{leave_type}` balance for employee `{employee_id}`"
            ))),
        }
    }

    async fn list_balances(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveBalance>, LedgerError> {
        let rows = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT employee_id, leave_type, remaining_days
            FROM leave_balances
            WHERE employee_id = ?
            ORDER BY leave_type
            "#,
        )
        .bind(employee_id.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(LeaveBalance::try_from).collect()
    }

    async fn adjust_balance(
        &mut self,
        employee_id: &EmployeeId,
        leave_type: &LeaveType,
        delta: i64,
    ) -> Result<u32, LedgerError> {
        check_delta(delta)?;

        let result = sqlx::query(
            r#"
            UPDATE leave_balances
            SET remaining_days = remaining_days + ?
            WHERE employee_id = ?
            AND leave_type = ?
            AND remaining_days + ? BETWEEN 0 AND ?
            "#,
        )
        .bind(delta)
        .bind(employee_id.as_str())
        .bind(leave_type.as_str())
        .bind(delta)
        .bind(i64::from(u32::MAX))
        .execute(&mut *self.tx)
        .await?;

        // the UPDATE holds the row lock, so this read sees our own write
        let current = self.fetch_balance(employee_id, leave_type).await?;
        match (result.rows_affected(), current) {
            (_, None) => Err(LedgerError::NotFound(format!(
                "`{leave_type}` balance for employee `{employee_id}`"
            ))),
            (0, Some(_)) if delta > 0 => Err(LedgerError::InvalidAmount(delta)),
            (0, Some(days)) if delta < 0 => Err(LedgerError::InsufficientBalance {
                leave_type: leave_type.to_string(),
                requested: delta.unsigned_abs(),
                remaining: remaining(employee_id.as_str(), leave_type.as_str(), days)?,
            }),
            (_, Some(days)) => remaining(employee_id.as_str(), leave_type.as_str(), days),
        }
    }
}

#[async_trait]
impl RequestStore for MySqlTx {
    async fn list_for_employee(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveRequest>, LedgerError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests \
             WHERE employee_id = ? ORDER BY start_date, created_at, id"
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(employee_id.as_str())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn insert_request(
        &mut self,
        request: NewLeaveRequest,
    ) -> Result<LeaveRequest, LedgerError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, leave_type, start_date, end_date, requested_days, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.employee_id.as_str())
        .bind(request.leave_type.as_str())
        .bind(request.range.start())
        .bind(request.range.end())
        .bind(request.range.days())
        .bind(&request.reason)
        .bind(request.status.as_ref())
        .bind(created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(LeaveRequest {
            id: result.last_insert_id(),
            employee_id: request.employee_id,
            leave_type: request.leave_type,
            start_date: request.range.start(),
            end_date: request.range.end(),
            requested_days: request.range.days(),
            reason: request.reason,
            status: request.status,
            created_at,
        })
    }

    async fn find_overlapping(
        &mut self,
        employee_id: &EmployeeId,
        range: DateRange,
        statuses: &[LeaveStatus],
    ) -> Result<Vec<LeaveRequest>, LedgerError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests \
             WHERE employee_id = ? AND start_date <= ? AND end_date >= ? \
             AND status IN ({placeholders})"
        );

        let mut query = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(employee_id.as_str())
            .bind(range.end())
            .bind(range.start());
        for status in statuses {
            query = query.bind(status.as_ref());
        }

        let rows = query.fetch_all(&mut *self.tx).await?;
        let mut requests = rows
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        sort_history(&mut requests);
        Ok(requests)
    }
}

#[async_trait]
impl SessionStore for MySqlTx {
    async fn record_session(&mut self, session: Session) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (jti, employee_id, expires_at, revoked)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.jti)
        .bind(session.employee_id.as_str())
        .bind(session.expires_at)
        .bind(session.revoked)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_session(&mut self, jti: &str) -> Result<Option<Session>, LedgerError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT jti, employee_id, expires_at, revoked FROM sessions WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Session::try_from).transpose()
    }

    async fn revoke_session(&mut self, jti: &str) -> Result<(), LedgerError> {
        sqlx::query("UPDATE sessions SET revoked = TRUE WHERE jti = ?")
            .bind(jti)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn revoke_sessions_for(&mut self, employee_id: &EmployeeId) -> Result<u64, LedgerError> {
        let result =
            sqlx::query("UPDATE sessions SET revoked = TRUE WHERE employee_id = ? AND revoked = FALSE")
                .bind(employee_id.as_str())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_sessions(
        &mut self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM sessions WHERE employee_id = ? AND expires_at <= ?")
            .bind(employee_id.as_str())
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MySqlTx {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }
}
