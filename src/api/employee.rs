use std::collections::BTreeMap;

use crate::{
    auth::{auth::AuthUser, password::hash_password},
    config::Config,
    ledger::{Ledger, OnboardEmployee},
    model::{
        employee::{Employee, EmployeeId, NewEmployee},
        leave_balance::{LeaveBalance, LeaveType},
        role::Role,
    },
};
use actix_web::{HttpResponse, error::ErrorInternalServerError, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "E-1001")]
    pub id: String,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "s3cret")]
    pub password: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "engineering", nullable = true)]
    pub department: Option<String>,
    /// Defaults to `employee`
    #[serde(default)]
    pub role: Role,
    /// Leave type → days. Configured defaults apply when omitted.
    #[schema(value_type = Object, example = json!({"casual": 10, "medical": 90}))]
    pub default_balances: Option<BTreeMap<LeaveType, u32>>,
}

#[derive(Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": "E-1001",
        "username": "jdoe",
        "name": "John Doe",
        "email": "john.doe@company.com",
        "department": "engineering",
        "role": "employee",
        "is_active": true
    })
)]
pub struct EmployeeResponse {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id.into(),
            username: employee.username,
            name: employee.name,
            email: employee.email,
            department: employee.department,
            role: employee.role,
            is_active: employee.is_active,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OnboardResponse {
    pub employee: EmployeeResponse,
    pub balances: Vec<LeaveBalance>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<EmployeeResponse>,
    #[schema(example = 10)]
    pub total: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetBody {
    #[schema(example = "n3w-s3cret")]
    pub new_password: String,
}

fn hash_credential(password: &str) -> actix_web::Result<String> {
    if password.is_empty() {
        return Err(actix_web::error::ErrorBadRequest(json!({
            "error": "INVALID_INPUT",
            "message": "password must not be empty"
        })));
    }
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ErrorInternalServerError("Internal Server Error")
    })
}

/// Onboard Employee (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee onboarded with leave balances", body = OnboardResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Employee id or username already exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<HttpResponse> {
    let payload = payload.into_inner();

    let command = OnboardEmployee {
        employee: NewEmployee {
            id: EmployeeId::parse(&payload.id)?,
            username: payload.username.trim().to_string(),
            credential_hash: hash_credential(&payload.password)?,
            name: payload.name,
            email: payload.email,
            department: payload.department,
            role: payload.role,
        },
        default_balances: payload
            .default_balances
            .unwrap_or_else(|| config.default_allotments.clone()),
    };

    let onboarded = ledger.onboard_employee(&auth.caller(), command).await?;

    Ok(HttpResponse::Created().json(OnboardResponse {
        employee: onboarded.employee.into(),
        balances: onboarded.balances,
    }))
}

/// List active employees (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    responses(
        (status = 200, description = "Active employees", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
) -> actix_web::Result<HttpResponse> {
    let employees = ledger.list_employees(&auth.caller()).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        total: employees.len(),
        data: employees.into_iter().map(EmployeeResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee id")
    ),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = EmployeeId::parse(&path.into_inner())?;
    let employee = ledger.get_employee(&auth.caller(), &employee_id).await?;

    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/// Soft-disable an employee (admin only)
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}/deactivate",
    params(
        ("employee_id" = String, Path, description = "Employee id")
    ),
    responses(
        (status = 200, description = "Employee deactivated", body = EmployeeResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_employee(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = EmployeeId::parse(&path.into_inner())?;
    let employee = ledger
        .deactivate_employee(&auth.caller(), &employee_id)
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/// Reset your own password
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}/password",
    params(
        ("employee_id" = String, Path, description = "Employee id; must be the caller")
    ),
    request_body = PasswordResetBody,
    responses(
        (status = 200, description = "Password updated", body = Object, example = json!({
            "message": "Password updated successfully"
        })),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reset_password(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
    path: web::Path<String>,
    payload: web::Json<PasswordResetBody>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = EmployeeId::parse(&path.into_inner())?;
    let credential_hash = hash_credential(&payload.new_password)?;

    ledger
        .change_credential(&auth.caller(), &employee_id, &credential_hash)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password updated successfully"
    })))
}
