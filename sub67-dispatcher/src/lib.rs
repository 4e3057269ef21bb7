pub mod config;
pub mod events;
pub mod matching;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;
pub mod templates;
pub mod transport;

use metrics_exporter_prometheus::PrometheusHandle;

use sub67_shared::clients::db::DbPool;
use sub67_shared::clients::rabbitmq::RabbitMQClient;

use crate::config::AppConfig;
use crate::services::dispatch_service::Dispatcher;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub dispatcher: Dispatcher,
    pub metrics_handle: PrometheusHandle,
}
