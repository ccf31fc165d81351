mod cloud_watch_metrics_client;
mod config;
mod error;
mod handler;
mod metric;
mod metrics_query_service;
mod payload;
mod time_range;

use anyhow::Context;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use rusoto_cloudwatch::CloudWatchClient;
use rusoto_core::Region;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::cloud_watch_metrics_client::CloudWatchMetricsClient;
use crate::config::Config;
use crate::handler::dashboard_handler;
use crate::metrics_query_service::MetricsQueryService;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_current_span(false)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let client = CloudWatchMetricsClient::new_with_client(CloudWatchClient::new(Region::default()));
    let service = MetricsQueryService::new(client, config);
    let service = &service;

    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<Value>| async move {
            dashboard_handler(service, event).await
        },
    ))
    .await
}
