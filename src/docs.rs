use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, EmployeeResponse, OnboardResponse, PasswordResetBody,
};
use crate::api::leave_balance::{Adjustment, BalanceSheet, CreditLeave, CreditResponse};
use crate::api::leave_request::{CreateLeave, LeaveListResponse};
use crate::ledger::AppliedLeave;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::role::Role;
use crate::models::{LoginReqDto, LoginResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Ledger API",
        version = "1.0.0",
        description = r#"
## Leave Ledger

Tracks employee leave entitlement and requests.

### 🔹 Business rules
- A request can never consume more days than the remaining balance of its leave type
- Approved requests of one employee never overlap (inclusive date ranges)
- Overlap is checked before balance; the first failing rule is reported
- Applying is accept-or-reject: a successful request is approved immediately

### 🔐 Security
Endpoints under `/api/v1` require a **JWT Bearer** token from `/auth/login`.
Onboarding, crediting and deactivation are **admin** only. Employees can only
see and act on their own leave.

### 📦 Errors
`{"error": "<KIND>", "rule": "<rule, business rule violations only>", "message": "..."}`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::me,
        crate::auth::handlers::logout,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::deactivate_employee,
        crate::api::employee::reset_password,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::get_balance,
        crate::api::leave_balance::credit_leave,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::leave_history
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            CreateEmployee,
            EmployeeResponse,
            EmployeeListResponse,
            OnboardResponse,
            PasswordResetBody,
            Role,
            LeaveBalance,
            BalanceSheet,
            CreditLeave,
            CreditResponse,
            Adjustment,
            CreateLeave,
            LeaveRequest,
            LeaveStatus,
            LeaveListResponse,
            AppliedLeave
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and identity"),
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Leave", description = "Leave balance and request APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
