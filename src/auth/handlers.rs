use crate::{
    auth::{auth::AuthUser, jwt::generate_access_token, password::verify_password},
    config::Config,
    error::LedgerError,
    ledger::Ledger,
    models::{LoginReqDto, LoginResponse},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

/// Login handler
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access token issued", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(ledger, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    ledger: web::Data<Ledger>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    // 2️⃣ Fetch active employee
    let employee = match ledger.credentials_for(&user.username).await {
        Ok(employee) => {
            debug!(employee_id = %employee.id, "Employee found");
            employee
        }
        Err(LedgerError::NotFound(_)) => {
            info!("Invalid credentials: unknown or inactive user");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Store error while fetching employee");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &employee.credential_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    // 4️⃣ Generate access token
    let (access_token, claims) =
        match generate_access_token(&employee, &config.jwt_secret, config.access_token_ttl) {
            Ok(issued) => issued,
            Err(e) => {
                error!(error = %e, "Failed to sign access token");
                return HttpResponse::InternalServerError().finish();
            }
        };

    // 5️⃣ Record the session so the token can be revoked
    let Some(expires_at) = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0) else {
        error!(exp = claims.exp, "Token expiry out of range");
        return HttpResponse::InternalServerError().finish();
    };
    if let Err(e) = ledger.open_session(&employee.id, &claims.jti, expires_at).await {
        error!(error = %e, "Failed to record session");
        return HttpResponse::InternalServerError().finish();
    }

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl,
    })
}

/// Profile of the authenticated employee
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Authenticated employee", body = crate::api::employee::EmployeeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, ledger: web::Data<Ledger>) -> Result<HttpResponse, LedgerError> {
    let employee = ledger.get_employee(&auth.caller(), &auth.employee_id).await?;
    Ok(HttpResponse::Ok().json(crate::api::employee::EmployeeResponse::from(employee)))
}

/// Revokes the presented access token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_logout", skip(auth, ledger), fields(employee_id = %auth.employee_id))]
pub async fn logout(
    auth: AuthUser,
    ledger: web::Data<Ledger>,
) -> Result<HttpResponse, LedgerError> {
    ledger.logout(&auth.caller(), &auth.jti).await?;
    Ok(HttpResponse::NoContent().finish())
}
