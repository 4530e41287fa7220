use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::model::employee::EmployeeId;
use crate::model::leave_balance::LeaveType;

pub type LeaveRequestId = u64;

/// Applying is accept-or-reject, so there is no pending state.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// Statuses that occupy the calendar for overlap detection.
    pub const BLOCKING: &'static [LeaveStatus] = &[LeaveStatus::Approved];
}

/// Inclusive `[start, end]` date range, `start <= end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, LedgerError> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive day count; a single-day range is one day.
    pub fn days(&self) -> u32 {
        // start <= end, so the difference is non-negative
        (self.end - self.start).num_days() as u32 + 1
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": "E-1001",
    "leave_type": "casual",
    "start_date": "2026-03-01",
    "end_date": "2026-03-05",
    "requested_days": 5,
    "reason": "family trip",
    "status": "approved",
    "created_at": "2026-02-20T09:30:00Z"
}))]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: LeaveRequestId,
    #[schema(example = "E-1001", value_type = String)]
    pub employee_id: EmployeeId,
    #[schema(example = "casual", value_type = String)]
    pub leave_type: LeaveType,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 5)]
    pub requested_days: u32,
    #[schema(example = "family trip")]
    pub reason: String,
    pub status: LeaveStatus,
    #[schema(example = "2026-02-20T09:30:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start_date, self.end_date)
    }
}

/// A request about to be appended; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub range: DateRange,
    pub reason: String,
    pub status: LeaveStatus,
}
