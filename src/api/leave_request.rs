use crate::{
    auth::auth::AuthUser,
    ledger::{ApplyLeave, Ledger},
    model::{employee::EmployeeId, leave_balance::LeaveType, leave_request::LeaveRequest},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub start_date: chrono::NaiveDate,
    #[schema(example = "2026-03-05", format = "date", value_type = String)]
    pub end_date: chrono::NaiveDate,
    #[schema(example = "family trip")]
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    #[schema(example = "E-1001")]
    pub employee_id: String,
    #[schema(example = 1)]
    pub count: usize,
    pub data: Vec<LeaveRequest>,
}

/* =========================
Apply for leave
========================= */
/// Apply for leave. Approved immediately when the dates are free and the balance covers them.
#[utoipa::path(
    post,
    path = "/api/v1/employees/{employee_id}/leave",
    params(
        ("employee_id" = String, Path, description = "Employee id")
    ),
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave approved", body = crate::ledger::AppliedLeave),
        (status = 400, description = "Invalid date range or leave type"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee or balance not found"),
        (status = 422, description = "Business rule violation", body = Object, example = json!({
            "error": "BUSINESS_RULE_VIOLATION",
            "rule": "OverlappingRequest",
            "message": "leave request overlaps existing request #1 (2026-03-01 to 2026-03-05)"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(skip(auth, ledger, payload), fields(caller = %auth.employee_id))]
pub async fn apply_leave(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<HttpResponse> {
    let payload = payload.into_inner();

    let command = ApplyLeave {
        employee_id: EmployeeId::parse(&path.into_inner())?,
        leave_type: LeaveType::parse(&payload.leave_type)?,
        start_date: payload.start_date,
        end_date: payload.end_date,
        reason: payload.reason.trim().to_string(),
    };

    let applied = ledger.apply_leave(&auth.caller(), command).await?;

    Ok(HttpResponse::Created().json(applied))
}

/// Leave history of an employee, oldest start date first
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/leave",
    params(
        ("employee_id" = String, Path, description = "Employee id")
    ),
    responses(
        (status = 200, description = "Leave history", body = LeaveListResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_history(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = EmployeeId::parse(&path.into_inner())?;
    let requests = ledger.list_history(&auth.caller(), &employee_id).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        employee_id: employee_id.into(),
        count: requests.len(),
        data: requests,
    }))
}
