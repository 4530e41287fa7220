use crate::{
    api::{employee, leave_balance, leave_request},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .map(|cfg| Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    // Auth routes: login is public, logout needs the token it revokes
    let login = web::resource("/login").route(web::post().to(handlers::login));
    let logout = web::resource("/logout")
        .wrap(from_fn(auth_middleware))
        .route(web::post().to(handlers::logout));
    let auth = match build_limiter(config.rate_login_per_min) {
        Some(limiter) => web::scope("/auth").service(login.wrap(limiter)),
        None => web::scope("/auth").service(login),
    };
    cfg.service(auth.service(logout));

    // Protected routes
    let protected = web::scope(&config.api_prefix)
        .wrap(from_fn(auth_middleware))
        .service(web::resource("/me").route(web::get().to(handlers::me)))
        .service(
            web::scope("/employees")
                // /employees
                .service(
                    web::resource("")
                        .route(web::post().to(employee::create_employee))
                        .route(web::get().to(employee::list_employees)),
                )
                // /employees/{id}
                .service(web::resource("/{id}").route(web::get().to(employee::get_employee)))
                .service(
                    web::resource("/{id}/deactivate")
                        .route(web::put().to(employee::deactivate_employee)),
                )
                .service(
                    web::resource("/{id}/password").route(web::put().to(employee::reset_password)),
                )
                // /employees/{id}/balances
                .service(
                    web::resource("/{id}/balances")
                        .route(web::get().to(leave_balance::list_balances)),
                )
                .service(
                    web::resource("/{id}/balances/{leave_type}")
                        .route(web::get().to(leave_balance::get_balance)),
                )
                .service(
                    web::resource("/{id}/balances/{leave_type}/credit")
                        .route(web::post().to(leave_balance::credit_leave)),
                )
                // /employees/{id}/leave
                .service(
                    web::resource("/{id}/leave")
                        .route(web::get().to(leave_request::leave_history))
                        .route(web::post().to(leave_request::apply_leave)),
                ),
        );

    match build_limiter(config.rate_protected_per_min) {
        Some(limiter) => cfg.service(protected.wrap(limiter)), // rate limiting
        None => cfg.service(protected),
    };
}
