use async_trait::async_trait;

use crate::error::LedgerError;
use crate::model::employee::EmployeeId;
use crate::model::leave_request::{DateRange, LeaveRequest, LeaveStatus, NewLeaveRequest};

/// Append-only leave request history.
#[async_trait]
pub trait RequestStore: Send {
    /// Ordered by start date, then creation time, then id.
    async fn list_for_employee(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<LeaveRequest>, LedgerError>;

    async fn insert_request(&mut self, request: NewLeaveRequest)
        -> Result<LeaveRequest, LedgerError>;

    /// Requests in one of `statuses` whose inclusive range intersects `range`.
    async fn find_overlapping(
        &mut self,
        employee_id: &EmployeeId,
        range: DateRange,
        statuses: &[LeaveStatus],
    ) -> Result<Vec<LeaveRequest>, LedgerError>;
}

/// Shared ordering for request history.
pub(crate) fn sort_history(requests: &mut [LeaveRequest]) {
    requests.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}
