use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sub67_dispatcher::config::AppConfig;
use sub67_dispatcher::events;
use sub67_dispatcher::routes::health;
use sub67_dispatcher::services::dispatch_service::Dispatcher;
use sub67_dispatcher::store::Repos;
use sub67_dispatcher::templates::create_templates;
use sub67_dispatcher::transport::{EmailTransport, PushTransport};
use sub67_dispatcher::AppState;
use sub67_shared::clients::db::create_pool;
use sub67_shared::clients::email::EmailClient;
use sub67_shared::clients::fcm::FcmClient;
use sub67_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sub67_shared::telemetry::init_tracing("sub67-dispatcher");
    let metrics_handle = sub67_shared::telemetry::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let push: Arc<dyn PushTransport> = Arc::new(FcmClient::new(
        http_client.clone(),
        &config.fcm_project_id,
        &config.fcm_access_token,
    ));

    let email: Option<Arc<dyn EmailTransport>> = match config.resend_api_key.as_deref() {
        Some(key) if config.email_enabled() => {
            let client = EmailClient::new(http_client, key, &config.email_from, &config.email_from_name);
            Some(Arc::new(client) as Arc<dyn EmailTransport>)
        }
        _ => {
            tracing::warn!("no email API key configured, email alerts disabled");
            None
        }
    };

    let dispatcher = Dispatcher::new(
        Repos::create_postgres(db.clone()),
        push,
        email,
        config.links(),
        create_templates()?,
    );

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        dispatcher,
        metrics_handle,
    });

    // Spawn job event subscriber
    let job_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_job_events(job_state).await {
            tracing::error!(error = %e, "job event subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "sub67-dispatcher starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
