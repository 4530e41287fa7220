use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::model::leave_request::LeaveRequestId;

pub const BUSINESS_RULE_VIOLATION: &str = "BUSINESS_RULE_VIOLATION";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("employee already exists: {0}")]
    DuplicateEmployee(String),

    #[error("leave balance `{leave_type}` already exists for employee `{employee_id}`")]
    DuplicateBalance {
        employee_id: String,
        leave_type: String,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("amount must be a positive number of days, got {0}")]
    InvalidAmount(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "leave request overlaps existing request #{existing_id} ({existing_start} to {existing_end})"
    )]
    OverlappingRequest {
        existing_id: LeaveRequestId,
        existing_start: NaiveDate,
        existing_end: NaiveDate,
    },

    #[error("insufficient `{leave_type}` balance: requested {requested} day(s), {remaining} remaining")]
    InsufficientBalance {
        leave_type: String,
        requested: u64,
        remaining: u32,
    },

    #[error("inconsistent ledger state: {0}")]
    Inconsistent(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl LedgerError {
    /// Stable machine-readable code relayed to the adapter layer.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::DuplicateEmployee(_) => "DUPLICATE_EMPLOYEE",
            LedgerError::DuplicateBalance { .. } => "DUPLICATE_BALANCE",
            LedgerError::Forbidden(_) => "FORBIDDEN",
            LedgerError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::OverlappingRequest { .. } | LedgerError::InsufficientBalance { .. } => {
                BUSINESS_RULE_VIOLATION
            }
            LedgerError::Inconsistent(_) => "INCONSISTENT",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }

    /// The violated rule, for business-rule rejections only.
    pub fn rule(&self) -> Option<&'static str> {
        match self {
            LedgerError::OverlappingRequest { .. } => Some("OverlappingRequest"),
            LedgerError::InsufficientBalance { .. } => Some("InsufficientBalance"),
            _ => None,
        }
    }

    /// Store failures may be retried by the caller with full re-validation.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Store(_))
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::DuplicateEmployee(_) | LedgerError::DuplicateBalance { .. } => {
                StatusCode::CONFLICT
            }
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::InvalidDateRange { .. }
            | LedgerError::InvalidAmount(_)
            | LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::OverlappingRequest { .. } | LedgerError::InsufficientBalance { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::Inconsistent(_) | LedgerError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LedgerError::Store(e) => {
                tracing::error!(error = %e, "Ledger store failure");
                "Something went wrong, Contact with system admin".to_string()
            }
            LedgerError::Inconsistent(detail) => {
                tracing::error!(detail = %detail, "Ledger state inconsistent");
                self.to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": self.kind(),
            "message": message,
        });
        if let Some(rule) = self.rule() {
            body["rule"] = json!(rule);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
