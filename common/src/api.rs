//! Wire shapes and path constants for the manager's and worker's HTTP
//! surfaces (§6). The request/response bodies themselves are just `Task`
//! and `TaskEvent`; this module carries the error envelope both sides use
//! and the endpoint paths so neither binary hand-rolls a path string.

use serde::{Deserialize, Serialize};

/// The `{HTTPStatusCode, Message}` error envelope returned for any non-2xx
/// response from either HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrResponse {
    pub http_status_code: u16,
    pub message: String,
}

/// Manager HTTP surface paths.
pub mod manager_endpoints {
    pub const TASKS: &str = "/tasks";
    pub const TASK_BY_ID: &str = "/tasks/{id}";
    pub const NODES: &str = "/nodes";
}

/// Worker HTTP surface paths.
pub mod worker_endpoints {
    pub const TASKS: &str = "/tasks";
    pub const TASK_BY_ID: &str = "/tasks/{id}";
    pub const STATS: &str = "/stats";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn err_response_serializes_with_expected_field_names() {
        let err = ErrResponse {
            http_status_code: 400,
            message: "bad request".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["http_status_code"], 400);
        assert_eq!(json["message"], "bad request");
    }
}
