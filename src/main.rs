use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

use kintai::config::Config;
use kintai::db::{init_db, run_migrations};
use kintai::docs::ApiDoc;
use kintai::mail::Mailer;
use kintai::routes::{self, RateLimiters};
use kintai::service::users;
use kintai::utils::{email_cache, email_filter};
use kintai::utils::http::redirect_to;

use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    redirect_to("/attendance")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("Migrations applied");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let admin_id = users::ensure_admin(&pool, email, password).await?;
        info!(admin_id, "Admin account provisioned");
    }

    let mailer = Mailer::from_config(&config)?;
    let limiters = RateLimiters::from_config(&config)?;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool_for_filter_warmup, 100).await {
            error!(error = %e, "Failed to warmup email filter");
        }
    });

    actix_web::rt::spawn(async move {
        // emails of users seen in the last 30 days, batches of 250
        if let Err(e) = email_cache::warmup_email_cache(&pool_for_cache_warmup, 30, 250).await {
            error!(error = %e, "Failed to warmup email cache");
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard serves the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(mailer.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
