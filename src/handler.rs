use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::cloud_watch_metrics_client::FetchMetrics;
use crate::error::MetricsDashboardError;
use crate::metrics_query_service::MetricsQueryService;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "GET,OPTIONS"),
];

/// API Gateway proxy event. Only the method is read; REST (v1) events carry
/// it at the top level, HTTP API (v2) events under `requestContext.http`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRequest {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpDescription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpDescription {
    #[serde(default)]
    pub method: Option<String>,
}

impl DashboardRequest {
    pub fn method(&self) -> Option<&str> {
        self.http_method.as_deref().or_else(|| {
            self.request_context
                .as_ref()
                .and_then(|context| context.http.as_ref())
                .and_then(|http| http.method.as_deref())
        })
    }

    fn is_preflight(&self) -> bool {
        self.method()
            .map_or(false, |method| method.eq_ignore_ascii_case("OPTIONS"))
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl DashboardResponse {
    fn ok(body: String, content_type: Option<&str>) -> Self {
        let mut headers: BTreeMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        if let Some(content_type) = content_type {
            headers.insert("Content-Type".to_string(), content_type.to_string());
        }
        DashboardResponse {
            status_code: 200,
            headers,
            body,
        }
    }
}

pub async fn dashboard_handler<F>(
    service: &MetricsQueryService<F>,
    event: LambdaEvent<Value>,
) -> Result<DashboardResponse, Error>
where
    F: FetchMetrics + Sync,
{
    let (event, context) = event.into_parts();
    debug!(request_id = %context.request_id, event = %event, "raw event");

    let result = match parse_event(event) {
        Ok(request) => {
            info!(
                request_id = %context.request_id,
                method = ?request.method(),
                "incoming event"
            );
            handle(service, &request, Utc::now()).await
        }
        Err(e) => Err(e),
    };
    result.map_err(|e| {
        error!(error = %e, backend = e.is_backend_error(), "invocation failed");
        Error::from(e)
    })
}

pub fn parse_event(event: Value) -> Result<DashboardRequest, MetricsDashboardError> {
    serde_json::from_value(event)
        .map_err(|error| MetricsDashboardError::InvalidEvent(error.to_string()))
}

/// Answers CORS preflights directly; everything else runs the metrics
/// pipeline. Errors are not turned into responses, API Gateway maps the
/// failed invocation to a 5xx.
pub async fn handle<F>(
    service: &MetricsQueryService<F>,
    request: &DashboardRequest,
    now: DateTime<Utc>,
) -> Result<DashboardResponse, MetricsDashboardError>
where
    F: FetchMetrics + Sync,
{
    if request.is_preflight() {
        return Ok(DashboardResponse::ok(String::new(), None));
    }

    let payload = service.load(now).await?;
    let body = serde_json::to_string(&payload)?;
    Ok(DashboardResponse::ok(body, Some("application/json")))
}
