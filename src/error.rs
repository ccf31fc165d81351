use std::error::Error;

use rusoto_cloudwatch::GetMetricDataError;
use rusoto_core::RusotoError;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq)]
pub enum MetricsDashboardError {
    NoneValue,
    MalformedResponse(String),
    InvalidEvent(String),
    GetMetricDataError(RusotoError<GetMetricDataError>),
    Serialize(String),
}

impl MetricsDashboardError {
    /// True for failures of the upstream CloudWatch read.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            MetricsDashboardError::GetMetricDataError(_)
                | MetricsDashboardError::MalformedResponse(_)
        )
    }
}

impl Display for MetricsDashboardError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            MetricsDashboardError::NoneValue => write!(f, "Value is None"),
            MetricsDashboardError::MalformedResponse(ref reason) => {
                write!(f, "Malformed GetMetricData response: {}", reason)
            }
            MetricsDashboardError::InvalidEvent(ref reason) => {
                write!(f, "Unreadable invocation event: {}", reason)
            }
            MetricsDashboardError::GetMetricDataError(ref error) => {
                write!(f, "GetMetricData failed: ")?;
                std::fmt::Display::fmt(error, f)
            }
            MetricsDashboardError::Serialize(ref reason) => {
                write!(f, "Failed to serialize payload: {}", reason)
            }
        }
    }
}

impl Error for MetricsDashboardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            MetricsDashboardError::GetMetricDataError(ref error) => Some(error),
            _ => None,
        }
    }
}

impl From<RusotoError<GetMetricDataError>> for MetricsDashboardError {
    fn from(e: RusotoError<GetMetricDataError>) -> MetricsDashboardError {
        MetricsDashboardError::GetMetricDataError(e)
    }
}

impl From<serde_json::Error> for MetricsDashboardError {
    fn from(e: serde_json::Error) -> MetricsDashboardError {
        MetricsDashboardError::Serialize(e.to_string())
    }
}
