use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

use leave_ledger::auth::password::hash_password;
use leave_ledger::config::Config;
use leave_ledger::db::init_store;
use leave_ledger::docs::ApiDoc;
use leave_ledger::ledger::{Ledger, OnboardEmployee};
use leave_ledger::model::employee::{EmployeeId, NewEmployee};
use leave_ledger::model::role::Role;
use leave_ledger::routes;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave Ledger"
}

/// Creates the configured first admin when the directory is empty.
async fn bootstrap_admin(ledger: &Ledger, config: &Config) -> anyhow::Result<()> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(());
    };

    let credential_hash = hash_password(&admin.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash bootstrap admin password: {e}"))?;
    let command = OnboardEmployee {
        employee: NewEmployee {
            id: EmployeeId::parse(&admin.username)?,
            username: admin.username.clone(),
            credential_hash,
            name: "Administrator".to_string(),
            email: format!("{}@localhost", admin.username),
            department: Some("management".to_string()),
            role: Role::Admin,
        },
        default_balances: config.default_allotments.clone(),
    };

    match ledger.bootstrap_admin(command).await? {
        Some(employee) => info!(employee_id = %employee.id, "Bootstrap admin created"),
        None => info!("Directory not empty, bootstrap admin skipped"),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "ledger.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store = init_store(&config.database_url).await?;
    let ledger = Ledger::new(store);

    bootstrap_admin(&ledger, &config)
        .await
        .context("Failed to bootstrap admin")?;

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(ledger.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
