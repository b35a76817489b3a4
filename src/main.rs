use actix_web::{web, App, HttpResponse, HttpServer};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use hyperdrip::config::Config;
use hyperdrip::error::HyperdripError;
use hyperdrip::models::lead::CreateLeadRequest;
use hyperdrip::queue::SqsMessageQueue;
use hyperdrip::scheduler::Scheduler;
use hyperdrip::store::PostgresLeadStore;

struct AppState {
    store: PostgresLeadStore,
    queue: SqsMessageQueue,
    config: Config,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to create pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let queue = SqsMessageQueue::from_env().await;
    let state = Arc::new(AppState {
        store: PostgresLeadStore::new(Arc::new(pool)),
        queue,
        config,
    });

    tracing::info!("hyperdrip-api starting on http://0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/leads", web::post().to(admit_lead))
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}

async fn admit_lead(
    state: web::Data<Arc<AppState>>,
    request: web::Json<CreateLeadRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let scheduler = Scheduler::new(
        &state.store,
        &state.queue,
        state.config.daily_max,
        state.config.overflow_horizon_days,
        state.config.test_mode,
    );

    match scheduler.admit(request.into_inner()).await {
        Ok(lead_id) => Ok(HttpResponse::Created().json(serde_json::json!({ "leadId": lead_id }))),
        Err(HyperdripError::DuplicateKey) => Ok(HttpResponse::Conflict().json(serde_json::json!({
            "error": "a lead with this email or phone already exists"
        }))),
        Err(e @ HyperdripError::LogicError { .. }) => {
            Ok(HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() })))
        }
        Err(e) => Err(actix_web::error::ErrorInternalServerError(e.to_string())),
    }
}
