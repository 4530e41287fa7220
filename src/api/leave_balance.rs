use crate::{
    auth::auth::AuthUser,
    ledger::Ledger,
    model::{
        employee::EmployeeId,
        leave_balance::{LeaveBalance, LeaveType},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct BalanceSheet {
    #[schema(example = "E-1001")]
    pub employee_id: String,
    pub balances: Vec<LeaveBalance>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreditLeave {
    /// Whole days to add; must be positive
    #[schema(example = 2)]
    pub days: i64,
    #[schema(example = "annual grant")]
    pub note: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct Adjustment {
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = 2)]
    pub days: i64,
    #[schema(example = "annual grant")]
    pub note: String,
    #[schema(example = "CREDIT")]
    pub kind: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreditResponse {
    #[schema(example = "E-1001")]
    pub employee_id: String,
    pub adjustment: Adjustment,
    #[schema(example = 12)]
    pub remaining_days: u32,
}

fn parse_path(path: (String, String)) -> actix_web::Result<(EmployeeId, LeaveType)> {
    Ok((EmployeeId::parse(&path.0)?, LeaveType::parse(&path.1)?))
}

/// All leave balances of an employee
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/balances",
    params(
        ("employee_id" = String, Path, description = "Employee id")
    ),
    responses(
        (status = 200, description = "Balance sheet", body = BalanceSheet),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn list_balances(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = EmployeeId::parse(&path.into_inner())?;
    let balances = ledger.list_balances(&auth.caller(), &employee_id).await?;

    Ok(HttpResponse::Ok().json(BalanceSheet {
        employee_id: employee_id.into(),
        balances,
    }))
}

/// Remaining days of one leave type
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/balances/{leave_type}",
    params(
        ("employee_id" = String, Path, description = "Employee id"),
        ("leave_type" = String, Path, description = "Provisioned leave type")
    ),
    responses(
        (status = 200, description = "Balance found", body = LeaveBalance),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee or balance not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_balance(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<HttpResponse> {
    let (employee_id, leave_type) = parse_path(path.into_inner())?;
    let remaining_days = ledger
        .get_balance(&auth.caller(), &employee_id, &leave_type)
        .await?;

    Ok(HttpResponse::Ok().json(LeaveBalance {
        employee_id,
        leave_type,
        remaining_days,
    }))
}

/// Credit leave days (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/employees/{employee_id}/balances/{leave_type}/credit",
    params(
        ("employee_id" = String, Path, description = "Employee id"),
        ("leave_type" = String, Path, description = "Provisioned leave type")
    ),
    request_body = CreditLeave,
    responses(
        (status = 200, description = "Leave credited", body = CreditResponse),
        (status = 400, description = "Non-positive amount"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee or balance not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(skip(auth, ledger, payload), fields(caller = %auth.employee_id))]
pub async fn credit_leave(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<(String, String)>,
    payload: web::Json<CreditLeave>,
) -> actix_web::Result<HttpResponse> {
    let (employee_id, leave_type) = parse_path(path.into_inner())?;
    let payload = payload.into_inner();

    let remaining_days = ledger
        .credit_leave(&auth.caller(), &employee_id, &leave_type, payload.days)
        .await?;

    Ok(HttpResponse::Ok().json(CreditResponse {
        employee_id: employee_id.into(),
        adjustment: Adjustment {
            leave_type: leave_type.into(),
            days: payload.days,
            note: payload.note.unwrap_or_else(|| "manual credit".to_string()),
            kind: "CREDIT".to_string(),
        },
        remaining_days,
    }))
}
