use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::metric::{
    MetricSeries, LAMBDA_ERRORS, SNS_PUBLISHED, SQS_IN_FLIGHT, SQS_RECEIVED, SQS_SENT,
    SQS_VISIBLE,
};

const SQS_SERIES: [&str; 4] = [SQS_VISIBLE, SQS_IN_FLIGHT, SQS_SENT, SQS_RECEIVED];

/// Body returned to the dashboard frontend.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedPayload {
    pub sns: SnsSummary,
    pub sqs: Vec<SqsRow>,
    pub lambda_errors: Vec<LambdaErrorRow>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct SnsSummary {
    #[serde(serialize_with = "serialize_value")]
    pub value: f64,
}

/// One timestamp of the pivoted SQS table. Series without a point at
/// `time` are left out of the JSON rather than zeroed.
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsRow {
    pub time: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_value"
    )]
    pub sqs_visible: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_value"
    )]
    pub sqs_in_flight: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_value"
    )]
    pub sqs_sent: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_value"
    )]
    pub sqs_received: Option<f64>,
}

impl SqsRow {
    fn set(&mut self, id: &str, value: f64) {
        let column = match id {
            SQS_VISIBLE => &mut self.sqs_visible,
            SQS_IN_FLIGHT => &mut self.sqs_in_flight,
            SQS_SENT => &mut self.sqs_sent,
            SQS_RECEIVED => &mut self.sqs_received,
            _ => return,
        };
        *column = Some(value);
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct LambdaErrorRow {
    pub time: String,
    #[serde(serialize_with = "serialize_value")]
    pub errors: f64,
}

/// Reshapes raw results into the dashboard payload. Missing or empty
/// series degrade to `0` / `[]`.
pub fn format_for_frontend(results: &[MetricSeries]) -> FormattedPayload {
    let raw = serde_json::to_string(results).unwrap_or_default();
    info!(raw = %raw, "raw metric data results");

    let by_id: HashMap<&str, &MetricSeries> = results
        .iter()
        .map(|series| (series.id.as_str(), series))
        .collect();
    for series in by_id.values().filter(|series| series.is_ragged()) {
        warn!(
            id = %series.id,
            timestamps = series.timestamps.len(),
            values = series.values.len(),
            "timestamps and values differ in length, truncating to the shorter"
        );
    }

    let formatted = FormattedPayload {
        sns: format_sns(by_id.get(SNS_PUBLISHED).copied()),
        sqs: format_sqs(SQS_SERIES.iter().filter_map(|id| by_id.get(id).copied())),
        lambda_errors: format_lambda_errors(by_id.get(LAMBDA_ERRORS).copied()),
    };

    let body = serde_json::to_string(&formatted).unwrap_or_default();
    info!(formatted = %body, "formatted payload");
    formatted
}

fn format_sns(series: Option<&MetricSeries>) -> SnsSummary {
    SnsSummary {
        value: series
            .and_then(|series| series.values.first().copied())
            .unwrap_or(0.0),
    }
}

fn format_sqs<'a, I>(series: I) -> Vec<SqsRow>
where
    I: Iterator<Item = &'a MetricSeries>,
{
    let mut rows = BTreeMap::<i64, SqsRow>::new();
    for series in series.filter(|series| !series.is_empty()) {
        for (timestamp, value) in series.points() {
            rows.entry(timestamp.timestamp_millis())
                .or_insert_with(|| SqsRow {
                    time: iso_time(&timestamp),
                    ..Default::default()
                })
                .set(&series.id, value);
        }
    }
    rows.into_iter().map(|(_, row)| row).collect()
}

fn format_lambda_errors(series: Option<&MetricSeries>) -> Vec<LambdaErrorRow> {
    let mut points: Vec<(DateTime<Utc>, f64)> = match series {
        Some(series) => series.points().collect(),
        None => return vec![],
    };
    points.sort_by_key(|(timestamp, _)| *timestamp);
    points
        .into_iter()
        .map(|(timestamp, errors)| LambdaErrorRow {
            time: iso_time(&timestamp),
            errors,
        })
        .collect()
}

// Largest magnitude below which every integer is exact in an f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Whole numbers go out as JSON integers (`7`, not `7.0`), the way the
/// frontend's own `JSON.stringify` renders them.
fn serialize_value<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn serialize_optional_value<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serialize_value(value, serializer),
        None => serializer.serialize_none(),
    }
}

fn iso_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
