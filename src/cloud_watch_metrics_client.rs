use crate::error::MetricsDashboardError;
use async_trait::async_trait;

use chrono::{DateTime, Utc};
use rusoto_cloudwatch::{
    CloudWatch, CloudWatchClient, Dimension as CloudWatchDimension, GetMetricDataInput, Metric,
    MetricDataQuery, MetricDataResult, MetricStat,
};
use tracing::{debug, info};

use crate::metric::{MetricQuery, MetricSeries};
use crate::time_range::TimeRange;

// Bounds NextToken chasing if CloudWatch keeps handing out tokens.
const MAX_PAGES: usize = 100;

const FAILED_STATUS_CODES: [&str; 2] = ["InternalError", "Forbidden"];
const PARTIAL_DATA: &str = "PartialData";

pub struct CloudWatchMetricsClient {
    client: CloudWatchClient,
}

#[async_trait]
pub trait FetchMetrics {
    /// Runs every query as one batched read over `time_range`.
    async fn fetch_metrics(
        &self,
        queries: &[MetricQuery],
        time_range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, MetricsDashboardError>;
}

#[async_trait]
impl FetchMetrics for CloudWatchMetricsClient {
    async fn fetch_metrics(
        &self,
        queries: &[MetricQuery],
        time_range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, MetricsDashboardError> {
        let metric_data_queries: Vec<MetricDataQuery> =
            queries.iter().map(Self::metric_data_query).collect();
        let mut series = Vec::<MetricSeries>::new();
        let mut next_token: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let output = self
                .client
                .get_metric_data(GetMetricDataInput {
                    start_time: time_range.start_time(),
                    end_time: time_range.end_time(),
                    metric_data_queries: metric_data_queries.clone(),
                    next_token: next_token.take(),
                    ..Default::default()
                })
                .await?;
            debug!(page, response = ?output, "received GetMetricData page");

            let mut partial = Vec::<String>::new();
            for result in output.metric_data_results.unwrap_or_default() {
                if result.status_code.as_deref() == Some(PARTIAL_DATA) {
                    partial.extend(result.id.clone());
                }
                Self::merge(&mut series, Self::to_series(result)?);
            }

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => {
                    // Without a token, PartialData can no longer be completed.
                    if !partial.is_empty() {
                        return Err(MetricsDashboardError::MalformedResponse(format!(
                            "{} still reported {} on the last page",
                            partial.join(", "),
                            PARTIAL_DATA
                        )));
                    }
                    Self::ensure_complete(queries, &series)?;
                    info!(pages = page, results = series.len(), "fetched metric data");
                    return Ok(series);
                }
            }
        }

        Err(MetricsDashboardError::MalformedResponse(format!(
            "still paginating after {} pages",
            MAX_PAGES
        )))
    }
}

impl CloudWatchMetricsClient {
    pub fn new_with_client(client: CloudWatchClient) -> Self {
        CloudWatchMetricsClient { client }
    }

    fn metric_data_query(query: &MetricQuery) -> MetricDataQuery {
        MetricDataQuery {
            id: query.id.to_string(),
            metric_stat: Some(MetricStat {
                metric: Metric {
                    namespace: Some(query.namespace.to_string()),
                    metric_name: Some(query.metric_name.to_string()),
                    dimensions: Some(
                        query
                            .dimensions
                            .iter()
                            .map(|dimension| CloudWatchDimension {
                                name: dimension.name.clone(),
                                value: dimension.value.clone(),
                            })
                            .collect(),
                    ),
                    ..Default::default()
                },
                period: query.period,
                stat: query.stat.as_str().to_string(),
                ..Default::default()
            }),
            return_data: Some(query.return_data),
            ..Default::default()
        }
    }

    fn to_series(result: MetricDataResult) -> Result<MetricSeries, MetricsDashboardError> {
        let id = result.id.ok_or_else(|| {
            MetricsDashboardError::MalformedResponse("result without Id".to_string())
        })?;
        if let Some(status) = result.status_code.as_deref() {
            if FAILED_STATUS_CODES.contains(&status) {
                return Err(MetricsDashboardError::MalformedResponse(format!(
                    "{} returned status {}",
                    id, status
                )));
            }
        }

        let timestamps = result
            .timestamps
            .unwrap_or_default()
            .iter()
            .map(|timestamp| {
                DateTime::parse_from_rfc3339(timestamp)
                    .map(|timestamp| timestamp.with_timezone(&Utc))
                    .map_err(|error| {
                        MetricsDashboardError::MalformedResponse(format!(
                            "{} has invalid timestamp {:?}: {}",
                            id, timestamp, error
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MetricSeries {
            id,
            timestamps,
            values: result.values.unwrap_or_default(),
        })
    }

    fn ensure_complete(
        queries: &[MetricQuery],
        series: &[MetricSeries],
    ) -> Result<(), MetricsDashboardError> {
        let missing: Vec<&str> = queries
            .iter()
            .map(|query| query.id)
            .filter(|id| !series.iter().any(|series| series.id == *id))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MetricsDashboardError::MalformedResponse(format!(
                "no results for {}",
                missing.join(", ")
            )))
        }
    }

    fn merge(series: &mut Vec<MetricSeries>, page: MetricSeries) {
        match series.iter_mut().find(|existing| existing.id == page.id) {
            Some(existing) => {
                existing.timestamps.extend(page.timestamps);
                existing.values.extend(page.values);
            }
            None => series.push(page),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cloud_watch_metrics_client::{CloudWatchMetricsClient, FetchMetrics};
    use crate::config::Config;
    use crate::error::MetricsDashboardError;
    use crate::metric::{dashboard_queries, MetricSeries};
    use crate::time_range::TimeRange;
    use chrono::{DateTime, Utc};
    use rusoto_cloudwatch::{CloudWatchClient, MetricDataResult};
    use rusoto_mock::{
        MockCredentialsProvider, MockRequestDispatcher, MockResponseReader,
        MultipleMockRequestDispatcher, ReadMockResponse,
    };
    use std::convert::TryFrom;
    use std::str::FromStr;

    fn time(value: &str) -> DateTime<Utc> {
        DateTime::<Utc>::from_str(value).unwrap()
    }

    fn mock_dispatcher(dir: &str, file: &str) -> MockRequestDispatcher {
        MockRequestDispatcher::default()
            .with_body(&*MockResponseReader::read_response(dir, file))
    }

    fn time_range() -> TimeRange {
        TimeRange::try_from(time("2024-01-01T12:00:00Z")).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_metrics() {
        let mock = CloudWatchClient::new_with(
            mock_dispatcher("test_resources/valid", "get_metric_data.xml"),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await.unwrap();

        assert_eq!(result.len(), 6);
        assert_eq!(
            result[0],
            MetricSeries {
                id: "snsPublished".to_string(),
                timestamps: vec![time("2024-01-01T11:55:00Z"), time("2024-01-01T11:50:00Z")],
                values: vec![7.0, 2.0],
            }
        );
        assert_eq!(
            result[2],
            MetricSeries {
                id: "sqsVisible".to_string(),
                timestamps: vec![time("2024-01-01T11:55:00Z"), time("2024-01-01T11:50:00Z")],
                values: vec![3.0, 1.5],
            }
        );
        let received = result.iter().find(|series| series.id == "sqsReceived").unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_metrics_error() {
        let mock = CloudWatchClient::new_with(
            MockRequestDispatcher::with_status(400).with_body(&*MockResponseReader::read_response(
                "test_resources/error",
                "get_metric_data.xml",
            )),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await;

        assert!(result.err().unwrap().is_backend_error());
    }

    #[tokio::test]
    async fn test_fetch_metrics_follows_next_token() {
        let mock = CloudWatchClient::new_with(
            MultipleMockRequestDispatcher::new(vec![
                mock_dispatcher("test_resources/paginated", "get_metric_data_page_1.xml"),
                mock_dispatcher("test_resources/paginated", "get_metric_data_page_2.xml"),
            ]),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await.unwrap();

        let errors = result.iter().find(|series| series.id == "lambdaErrors").unwrap();
        assert_eq!(
            errors.timestamps,
            vec![
                time("2024-01-01T11:55:00Z"),
                time("2024-01-01T11:50:00Z"),
                time("2024-01-01T11:45:00Z"),
            ]
        );
        assert_eq!(errors.values, vec![1.0, 0.0, 2.0]);
        assert_eq!(result.len(), 6);
        assert_eq!(result.iter().filter(|series| series.id == "lambdaErrors").count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_metrics_rejects_failed_status() {
        let mock = CloudWatchClient::new_with(
            mock_dispatcher("test_resources/invalid", "get_metric_data_internal_error.xml"),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await;

        assert_eq!(
            result.err().unwrap(),
            MetricsDashboardError::MalformedResponse(
                "sqsSent returned status InternalError".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_metrics_rejects_missing_results() {
        let mock = CloudWatchClient::new_with(
            mock_dispatcher("test_resources/partial", "get_metric_data_missing_ids.xml"),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await;

        assert_eq!(
            result.err().unwrap(),
            MetricsDashboardError::MalformedResponse(
                "no results for lambdaErrors, sqsInFlight, sqsSent, sqsReceived".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_metrics_rejects_partial_data_on_last_page() {
        let mock = CloudWatchClient::new_with(
            mock_dispatcher("test_resources/partial", "get_metric_data_partial_data.xml"),
            MockCredentialsProvider,
            Default::default(),
        );

        let client = CloudWatchMetricsClient::new_with_client(mock);
        let queries = dashboard_queries(&Config::default());
        let result = client.fetch_metrics(&queries, &time_range()).await;

        assert_eq!(
            result.err().unwrap(),
            MetricsDashboardError::MalformedResponse(
                "sqsVisible still reported PartialData on the last page".to_string()
            )
        );
    }

    #[test]
    fn test_to_series_without_id() {
        let result = CloudWatchMetricsClient::to_series(MetricDataResult {
            values: Some(vec![1.0]),
            timestamps: Some(vec!["2024-01-01T00:00:00Z".to_string()]),
            ..Default::default()
        });
        assert_eq!(
            result.err().unwrap(),
            MetricsDashboardError::MalformedResponse("result without Id".to_string())
        );
    }

    #[test]
    fn test_to_series_with_bad_timestamp() {
        let result = CloudWatchMetricsClient::to_series(MetricDataResult {
            id: Some("sqsVisible".to_string()),
            timestamps: Some(vec!["yesterday".to_string()]),
            values: Some(vec![1.0]),
            ..Default::default()
        });
        assert!(result.err().unwrap().is_backend_error());
    }

    #[test]
    fn test_to_series_without_data() {
        let result = CloudWatchMetricsClient::to_series(MetricDataResult {
            id: Some("sqsInFlight".to_string()),
            status_code: Some("Complete".to_string()),
            ..Default::default()
        });
        assert_eq!(
            result.unwrap(),
            MetricSeries {
                id: "sqsInFlight".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_metric_data_query() {
        let queries = dashboard_queries(&Config::default());
        let query = CloudWatchMetricsClient::metric_data_query(&queries[2]);

        assert_eq!(query.id, "sqsVisible");
        assert_eq!(query.return_data, Some(true));
        let metric_stat = query.metric_stat.unwrap();
        assert_eq!(metric_stat.period, 300);
        assert_eq!(metric_stat.stat, "Average");
        assert_eq!(metric_stat.metric.namespace.as_deref(), Some("AWS/SQS"));
        assert_eq!(
            metric_stat.metric.metric_name.as_deref(),
            Some("ApproximateNumberOfMessagesVisible")
        );
        let dimensions = metric_stat.metric.dimensions.unwrap();
        assert_eq!(dimensions[0].name, "QueueName");
        assert_eq!(dimensions[0].value, "MyMessageQueue");
    }
}
