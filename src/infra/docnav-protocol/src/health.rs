use serde::{Deserialize, Serialize};

/// Service name reported by the supervisor health endpoint.
pub const DEFAULT_SERVICE_NAME: &str = "doctree-mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Starting,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
}

impl HealthReport {
    pub fn new(ready: bool, service: impl Into<String>) -> Self {
        Self {
            status: if ready {
                HealthStatus::Ok
            } else {
                HealthStatus::Starting
            },
            service: service.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_wire_shape() {
        let ready = serde_json::to_value(HealthReport::new(true, DEFAULT_SERVICE_NAME)).unwrap();
        assert_eq!(ready, json!({ "status": "ok", "service": "doctree-mcp" }));
        let starting = serde_json::to_value(HealthReport::new(false, DEFAULT_SERVICE_NAME)).unwrap();
        assert_eq!(starting, json!({ "status": "starting", "service": "doctree-mcp" }));
    }
}
