use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

use crate::ledger::Caller;
use crate::model::{employee::EmployeeId, role::Role};

/// Identity verified by `auth_middleware` for the current request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub employee_id: EmployeeId,
    pub username: String,
    pub role: Role,
    /// Session id of the presented token.
    pub jti: String,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Missing token")),
        )
    }
}

impl AuthUser {
    /// Explicit identity context handed to every ledger call.
    pub fn caller(&self) -> Caller {
        Caller::new(self.employee_id.clone(), self.role)
    }
}
