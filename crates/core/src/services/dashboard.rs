use std::sync::Arc;

use serde_json::Value;

use crate::error::{ClientError, Entity};
use crate::model::Stats;
use crate::transport::{ApiRequest, Transport};

const DASHBOARD_PATH: &str = "/dashboard";

/// Server-side task counters.
#[derive(Clone)]
pub struct DashboardService {
    transport: Arc<dyn Transport>,
}

impl DashboardService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Counters from `GET /dashboard`. Missing fields count as zero; a body with no
    /// recognizable object yields all zeros.
    pub async fn stats(&self) -> Result<Stats, ClientError> {
        let raw = self
            .transport
            .send(ApiRequest::get(DASHBOARD_PATH))
            .await
            .map_err(|err| ClientError::from_transport(Entity::Task, err))?;

        let payload = match raw {
            Value::Object(mut map) => match map.remove("data") {
                Some(data @ Value::Object(_)) => data,
                _ => Value::Object(map),
            },
            other => {
                tracing::warn!(shape = %shape_of(&other), "dashboard returned no stats object");
                return Ok(Stats::default());
            }
        };

        Ok(serde_json::from_value(payload).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not decode dashboard stats");
            Stats::default()
        }))
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
