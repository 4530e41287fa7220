use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::model::employee::EmployeeId;
use crate::model::session::Session;

/// Issued access tokens, so that they can be revoked before they expire.
#[async_trait]
pub trait SessionStore: Send {
    async fn record_session(&mut self, session: Session) -> Result<(), LedgerError>;

    async fn find_session(&mut self, jti: &str) -> Result<Option<Session>, LedgerError>;

    /// Idempotent; unknown ids are ignored.
    async fn revoke_session(&mut self, jti: &str) -> Result<(), LedgerError>;

    /// Revokes every session of the employee, returning how many were still unrevoked.
    async fn revoke_sessions_for(&mut self, employee_id: &EmployeeId) -> Result<u64, LedgerError>;

    /// Drops the employee's sessions that expired before `now`.
    async fn purge_expired_sessions(
        &mut self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;
}
