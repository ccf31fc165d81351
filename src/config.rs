use anyhow::{bail, Result};
use tracing::info;

pub const DEFAULT_SNS_TOPIC_NAME: &str = "MyTargetTopic";
pub const DEFAULT_SQS_QUEUE_NAME: &str = "MyMessageQueue";
pub const DEFAULT_LAMBDA_FUNCTION_NAME: &str = "api_router";

// CloudWatch rejects longer dimension values.
const MAX_DIMENSION_VALUE_LENGTH: usize = 1024;

/// Names of the monitored resources, read once at cold start.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sns_topic_name: String,
    pub sqs_queue_name: String,
    pub lambda_function_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sns_topic_name: DEFAULT_SNS_TOPIC_NAME.to_string(),
            sqs_queue_name: DEFAULT_SQS_QUEUE_NAME.to_string(),
            lambda_function_name: DEFAULT_LAMBDA_FUNCTION_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or blank variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str, default: &str| -> Result<String> {
            let value = lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string());
            if value.chars().count() > MAX_DIMENSION_VALUE_LENGTH {
                bail!(
                    "{} must be at most {} characters",
                    key,
                    MAX_DIMENSION_VALUE_LENGTH
                );
            }
            Ok(value)
        };

        let config = Config {
            sns_topic_name: resolve("SNS_TOPIC_NAME", DEFAULT_SNS_TOPIC_NAME)?,
            sqs_queue_name: resolve("SQS_QUEUE_NAME", DEFAULT_SQS_QUEUE_NAME)?,
            lambda_function_name: resolve("LAMBDA_FUNCTION_NAME", DEFAULT_LAMBDA_FUNCTION_NAME)?,
        };
        info!(
            sns_topic_name = %config.sns_topic_name,
            sqs_queue_name = %config.sqs_queue_name,
            lambda_function_name = %config.lambda_function_name,
            "loaded configuration"
        );
        Ok(config)
    }
}
