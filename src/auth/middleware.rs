use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::model::{employee::EmployeeId, role::Role};
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::{Value, json};
use tracing::debug;

fn reject(req: ServiceRequest, body: Value) -> ServiceResponse<BoxBody> {
    debug!(path = %req.path(), reason = %body["error"], "Request rejected by auth");
    req.into_response(HttpResponse::Unauthorized().json(body).map_into_boxed_body())
}

/// Bearer token -> verified identity, or the 401 body describing why not.
fn identify(header: Option<&str>, secret: &str) -> Result<AuthUser, Value> {
    let header = header.ok_or_else(|| json!({"error": "Missing Authorization header"}))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| json!({"error": "Authorization header must start with Bearer"}))?;

    let claims = verify_token(token, secret)
        .map_err(|e| json!({"error": "Invalid or expired token", "details": e}))?;

    match (Role::from_id(claims.role), EmployeeId::parse(&claims.sub)) {
        (Some(role), Ok(employee_id)) => Ok(AuthUser {
            employee_id,
            username: claims.username,
            role,
            jti: claims.jti,
        }),
        _ => Err(json!({"error": "Invalid token subject"})),
    }
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;
    let ledger = req
        .app_data::<Data<Ledger>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Ledger missing"))?;

    let header = match req.headers().get("Authorization") {
        Some(h) => Some(h.to_str().map_err(|_| {
            actix_web::error::ErrorUnauthorized(
                json!({"error": "Invalid Authorization header encoding"}),
            )
        })?),
        None => None,
    };

    let mut auth_user = match identify(header, &config.jwt_secret) {
        Ok(auth_user) => auth_user,
        Err(body) => return Ok(reject(req, body)),
    };

    // signature is not enough: the session must be live and the employee active
    match ledger.authenticate(&auth_user.employee_id, &auth_user.jti).await {
        Ok(employee) => auth_user.role = employee.role,
        Err(LedgerError::Forbidden(_)) => {
            return Ok(reject(req, json!({"error": "Session revoked or expired"})));
        }
        Err(e) => return Err(e.into()),
    }

    req.extensions_mut().insert(auth_user);
    next.call(req).await
}
