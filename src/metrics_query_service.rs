use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cloud_watch_metrics_client::FetchMetrics;
use crate::config::Config;
use crate::error::MetricsDashboardError;
use crate::metric::dashboard_queries;
use crate::payload::{format_for_frontend, FormattedPayload};
use crate::time_range::TimeRange;

/// Queries the dashboard metrics over the trailing window and reshapes
/// them for the frontend. Built once per process.
pub struct MetricsQueryService<F> {
    fetcher: F,
    config: Config,
}

impl<F> MetricsQueryService<F>
where
    F: FetchMetrics + Sync,
{
    pub fn new(fetcher: F, config: Config) -> Self {
        MetricsQueryService { fetcher, config }
    }

    pub async fn load(&self, now: DateTime<Utc>) -> Result<FormattedPayload, MetricsDashboardError> {
        let time_range = TimeRange::try_from(now)?;
        info!(
            start_time = %time_range.start_time(),
            end_time = %time_range.end_time(),
            "time range"
        );

        let queries = dashboard_queries(&self.config);
        let queries_json = serde_json::to_string(&queries)?;
        debug!(queries = %queries_json, "metric queries");

        let results = self.fetcher.fetch_metrics(&queries, &time_range).await?;
        Ok(format_for_frontend(&results))
    }
}
