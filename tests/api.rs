use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, test};
use serde_json::{Value, json};

use leave_ledger::auth::password::hash_password;
use leave_ledger::config::Config;
use leave_ledger::ledger::{Ledger, OnboardEmployee};
use leave_ledger::model::employee::{EmployeeId, NewEmployee};
use leave_ledger::model::role::Role;
use leave_ledger::routes;
use leave_ledger::store::MemoryStore;

const ADMIN_PASSWORD: &str = "admin-pass";

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SERVER_ADDR", "127.0.0.1:0"),
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", "integration-secret"),
        ("DEFAULT_LEAVE_ALLOTMENTS", "annual=10,sick=5"),
    ]);
    Config::from_lookup(|key: &str| vars.get(key).map(|v| v.to_string())).unwrap()
}

async fn ledger_with_admin(config: &Config) -> Ledger {
    let ledger = Ledger::new(Arc::new(MemoryStore::new()));
    ledger
        .bootstrap_admin(OnboardEmployee {
            employee: NewEmployee {
                id: EmployeeId::parse("admin").unwrap(),
                username: "admin".into(),
                credential_hash: hash_password(ADMIN_PASSWORD).unwrap(),
                name: "Administrator".into(),
                email: "admin@localhost".into(),
                department: None,
                role: Role::Admin,
            },
            default_balances: config.default_allotments.clone(),
        })
        .await
        .unwrap()
        .expect("directory starts empty");
    ledger
}

macro_rules! app {
    () => {{
        let config = config();
        let ledger = ledger_with_admin(&config).await;
        let routes_config = config.clone();
        test::init_service(
            App::new()
                .app_data(Data::new(ledger))
                .app_data(Data::new(config))
                .configure(move |cfg| routes::configure(cfg, &routes_config)),
        )
        .await
    }};
}

macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.peer_addr(peer()).to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }};
}

macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let (status, body) = call!(
            $app,
            test::TestRequest::post()
                .uri("/auth/login")
                .set_json(json!({"username": $username, "password": $password}))
        );
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        format!("Bearer {}", body["access_token"].as_str().unwrap())
    }};
}

macro_rules! onboard {
    ($app:expr, $token:expr, $id:expr, $balances:expr) => {{
        let (status, body) = call!(
            $app,
            test::TestRequest::post()
                .uri("/api/v1/employees")
                .insert_header(("Authorization", $token.as_str()))
                .set_json(json!({
                    "id": $id,
                    "username": $id.to_lowercase(),
                    "password": "emp-pass",
                    "name": "Jane Roe",
                    "email": "jane@company.com",
                    "department": "engineering",
                    "default_balances": $balances
                }))
        );
        assert_eq!(status, StatusCode::CREATED, "onboarding failed: {body}");
        body
    }};
}

#[actix_web::test]
async fn protected_routes_require_a_bearer_token() {
    let app = app!();

    let (status, _) = call!(app, test::TestRequest::get().uri("/api/v1/me"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(("Authorization", "Bearer not-a-token"))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let app = app!();

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "admin", "password": "nope"}))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn me_returns_the_authenticated_employee() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(("Authorization", admin.as_str()))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "admin");
    assert_eq!(body["role"], "admin");
    assert!(body.get("credential_hash").is_none());
}

#[actix_web::test]
async fn onboarding_uses_configured_defaults_when_omitted() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);

    let body = onboard!(app, admin, "E-1", Value::Null);
    assert_eq!(body["employee"]["role"], "employee");

    let balances: HashMap<String, u64> = body["balances"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["leave_type"].as_str().unwrap().to_string(),
                b["remaining_days"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(balances, HashMap::from([("annual".into(), 10), ("sick".into(), 5)]));
}

#[actix_web::test]
async fn leave_lifecycle_over_http() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-1", json!({"annual": 10}));
    let employee = login!(app, "e-1", "emp-pass");

    // Mar 1-5: approved, five days debited
    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-1/leave")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({
                "leave_type": "annual",
                "start_date": "2026-03-01",
                "end_date": "2026-03-05",
                "reason": "family trip"
            }))
    );
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["remaining_days"], 5);
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(body["request"]["requested_days"], 5);

    // Mar 4-6 overlaps
    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-1/leave")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({
                "leave_type": "annual",
                "start_date": "2026-03-04",
                "end_date": "2026-03-06"
            }))
    );
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BUSINESS_RULE_VIOLATION");
    assert_eq!(body["rule"], "OverlappingRequest");

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/E-1/balances/annual")
            .insert_header(("Authorization", employee.as_str()))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining_days"], 5);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/E-1/leave")
            .insert_header(("Authorization", employee.as_str()))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["reason"], "family trip");
}

#[actix_web::test]
async fn insufficient_balance_and_bad_ranges_are_typed_rejections() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-2", json!({"annual": 2}));
    let employee = login!(app, "e-2", "emp-pass");

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-2/leave")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({
                "leave_type": "annual",
                "start_date": "2026-04-01",
                "end_date": "2026-04-05"
            }))
    );
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "InsufficientBalance");

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-2/leave")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({
                "leave_type": "annual",
                "start_date": "2026-04-05",
                "end_date": "2026-04-01"
            }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_DATE_RANGE");

    let (_, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/E-2/leave")
            .insert_header(("Authorization", employee.as_str()))
    );
    assert_eq!(body["count"], 0);
}

#[actix_web::test]
async fn admin_only_operations_reject_employees() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-3", json!({"annual": 3}));
    let employee = login!(app, "e-3", "emp-pass");

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({
                "id": "E-4",
                "username": "e-4",
                "password": "x",
                "name": "Nope",
                "email": "nope@company.com"
            }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-3/balances/annual/credit")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({"days": 5}))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/admin/leave")
            .insert_header(("Authorization", employee.as_str()))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    // nothing was created for E-4
    let (status, _) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/E-4")
            .insert_header(("Authorization", admin.as_str()))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn credit_validates_amount_and_increments() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-5", json!({"annual": 3}));

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-5/balances/annual/credit")
            .insert_header(("Authorization", admin.as_str()))
            .set_json(json!({"days": 0}))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_AMOUNT");

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees/E-5/balances/annual/credit")
            .insert_header(("Authorization", admin.as_str()))
            .set_json(json!({"days": 4, "note": "annual grant"}))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining_days"], 7);
    assert_eq!(body["adjustment"]["kind"], "CREDIT");
    assert_eq!(body["adjustment"]["note"], "annual grant");

    for days in [json!(i64::MAX), json!(u32::MAX)] {
        let (status, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/api/v1/employees/E-5/balances/annual/credit")
                .insert_header(("Authorization", admin.as_str()))
                .set_json(json!({"days": days}))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST, "{days}: {body}");
        assert_eq!(body["error"], "INVALID_AMOUNT");
    }

    let (_, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees/E-5/balances/annual")
            .insert_header(("Authorization", admin.as_str()))
    );
    assert_eq!(body["remaining_days"], 7);
}

#[actix_web::test]
async fn duplicate_onboarding_conflicts() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-6", json!({"annual": 3}));

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/v1/employees")
            .insert_header(("Authorization", admin.as_str()))
            .set_json(json!({
                "id": "E-6",
                "username": "someone-else",
                "password": "x",
                "name": "Dup",
                "email": "dup@company.com",
                "default_balances": {"annual": 1}
            }))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_EMPLOYEE");
}

#[actix_web::test]
async fn deactivated_employee_cannot_log_in_or_reuse_a_token() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-7", json!({"annual": 3}));
    let employee = login!(app, "e-7", "emp-pass");

    let (status, body) = call!(
        app,
        test::TestRequest::put()
            .uri("/api/v1/employees/E-7/deactivate")
            .insert_header(("Authorization", admin.as_str()))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "e-7", "password": "emp-pass"}))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(("Authorization", employee.as_str()))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Session revoked or expired");

    let (_, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/employees")
            .insert_header(("Authorization", admin.as_str()))
    );
    assert_eq!(body["total"], 1);
}

#[actix_web::test]
async fn password_reset_takes_effect_for_the_owner_only() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-8", json!({"annual": 3}));
    let employee = login!(app, "e-8", "emp-pass");

    let (status, _) = call!(
        app,
        test::TestRequest::put()
            .uri("/api/v1/employees/E-8/password")
            .insert_header(("Authorization", admin.as_str()))
            .set_json(json!({"new_password": "hijack"}))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(
        app,
        test::TestRequest::put()
            .uri("/api/v1/employees/E-8/password")
            .insert_header(("Authorization", employee.as_str()))
            .set_json(json!({"new_password": "fresh-pass"}))
    );
    assert_eq!(status, StatusCode::OK);

    login!(app, "e-8", "fresh-pass");
}

#[actix_web::test]
async fn logout_revokes_the_presented_token_only() {
    let app = app!();
    let admin = login!(app, "admin", ADMIN_PASSWORD);
    onboard!(app, admin, "E-9", json!({"annual": 3}));
    let first = login!(app, "e-9", "emp-pass");
    let second = login!(app, "e-9", "emp-pass");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/auth/logout")
            .insert_header(("Authorization", first.as_str()))
    );
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(("Authorization", first.as_str()))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Session revoked or expired");

    let (status, _) = call!(
        app,
        test::TestRequest::post()
            .uri("/auth/logout")
            .insert_header(("Authorization", first.as_str()))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(("Authorization", second.as_str()))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "E-9");
}
