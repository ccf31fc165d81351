use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const PERIOD_SECONDS: i64 = 300;

pub const SNS_PUBLISHED: &str = "snsPublished";
pub const LAMBDA_ERRORS: &str = "lambdaErrors";
pub const SQS_VISIBLE: &str = "sqsVisible";
pub const SQS_IN_FLIGHT: &str = "sqsInFlight";
pub const SQS_SENT: &str = "sqsSent";
pub const SQS_RECEIVED: &str = "sqsReceived";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Statistic {
    Sum,
    Average,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Sum => "Sum",
            Statistic::Average => "Average",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    pub id: &'static str,
    pub namespace: &'static str,
    pub metric_name: &'static str,
    pub stat: Statistic,
    pub period: i64,
    pub dimensions: Vec<Dimension>,
    pub return_data: bool,
}

impl MetricQuery {
    fn new(
        id: &'static str,
        namespace: &'static str,
        metric_name: &'static str,
        stat: Statistic,
        dimension_name: &str,
        dimension_value: &str,
    ) -> Self {
        MetricQuery {
            id,
            namespace,
            metric_name,
            stat,
            period: PERIOD_SECONDS,
            dimensions: vec![Dimension {
                name: dimension_name.to_string(),
                value: dimension_value.to_string(),
            }],
            return_data: true,
        }
    }
}

/// The six queries behind the dashboard, in request order.
pub fn dashboard_queries(config: &Config) -> Vec<MetricQuery> {
    let topic = config.sns_topic_name.as_str();
    let function = config.lambda_function_name.as_str();
    let queue = config.sqs_queue_name.as_str();
    vec![
        MetricQuery::new(
            SNS_PUBLISHED,
            "AWS/SNS",
            "NumberOfMessagesPublished",
            Statistic::Sum,
            "TopicName",
            topic,
        ),
        MetricQuery::new(
            LAMBDA_ERRORS,
            "AWS/Lambda",
            "Errors",
            Statistic::Sum,
            "FunctionName",
            function,
        ),
        MetricQuery::new(
            SQS_VISIBLE,
            "AWS/SQS",
            "ApproximateNumberOfMessagesVisible",
            Statistic::Average,
            "QueueName",
            queue,
        ),
        MetricQuery::new(
            SQS_IN_FLIGHT,
            "AWS/SQS",
            "ApproximateNumberOfMessagesNotVisible",
            Statistic::Average,
            "QueueName",
            queue,
        ),
        MetricQuery::new(
            SQS_SENT,
            "AWS/SQS",
            "NumberOfMessagesSent",
            Statistic::Sum,
            "QueueName",
            queue,
        ),
        MetricQuery::new(
            SQS_RECEIVED,
            "AWS/SQS",
            "NumberOfMessagesReceived",
            Statistic::Sum,
            "QueueName",
            queue,
        ),
    ]
}

/// One query's result. `timestamps[i]` pairs with `values[i]`; order is
/// whatever CloudWatch returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSeries {
    pub id: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_ragged(&self) -> bool {
        self.timestamps.len() != self.values.len()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}
