//! HTTP GraphQL executor for the ATS data service (Hasura).
//!
//! Admin credentials are sent as `x-hasura-admin-secret`, bearer
//! credentials as `Authorization: Bearer <token>`.

use async_trait::async_trait;
use recruitr_core::error::GraphQlError;
use recruitr_core::graphql::{Credential, GraphQlExecutor};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpGraphQlExecutor {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpGraphQlExecutor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

/// Split a response body into `data` or the error envelope.
fn unwrap_envelope(body: GraphQlResponse) -> Result<serde_json::Value, GraphQlError> {
    match body.errors {
        Some(errors) if errors.as_array().is_none_or(|e| !e.is_empty()) => {
            Err(GraphQlError::Envelope(errors))
        }
        _ => body.data.ok_or(GraphQlError::MissingData),
    }
}

#[async_trait]
impl GraphQlExecutor for HttpGraphQlExecutor {
    async fn execute(
        &self,
        credential: &Credential,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, GraphQlError> {
        let request = self.client.post(&self.endpoint).json(&serde_json::json!({
            "query": document,
            "variables": variables,
        }));
        let request = match credential {
            Credential::Admin { secret } => request.header("x-hasura-admin-secret", secret),
            Credential::Bearer { token, .. } => request.bearer_auth(token),
        };

        debug!(endpoint = %self.endpoint, "Executing GraphQL document");

        let response = request
            .send()
            .await
            .map_err(|e| GraphQlError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphQlError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| GraphQlError::Transport(format!("invalid response body: {e}")))?;
        unwrap_envelope(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Seen {
        headers: Vec<HeaderMap>,
        bodies: Vec<serde_json::Value>,
    }

    async fn serve(status: StatusCode, reply: serde_json::Value) -> (String, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let recorded = seen.clone();
        let app = Router::new().route(
            "/v1/graphql",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let reply = reply.clone();
                let recorded = recorded.clone();
                async move {
                    let mut seen = recorded.lock().unwrap();
                    seen.headers.push(headers);
                    seen.bodies.push(body);
                    (status, Json(reply))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1/graphql"), seen)
    }

    fn executor(url: String) -> HttpGraphQlExecutor {
        HttpGraphQlExecutor::new(url, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn admin_secret_header_and_data() {
        let (url, seen) = serve(
            StatusCode::OK,
            serde_json::json!({"data": {"Pipeline": [{"id": "p-1"}]}}),
        )
        .await;
        let data = executor(url)
            .execute(
                &Credential::Admin { secret: "s3cret".into() },
                "query GetPipelines { Pipeline { id } }",
                serde_json::json!({}),
            )
            .await
            .unwrap();
        assert_eq!(data["Pipeline"][0]["id"], "p-1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.headers[0]["x-hasura-admin-secret"], "s3cret");
        assert!(seen.headers[0].get("authorization").is_none());
        assert_eq!(seen.bodies[0]["query"], "query GetPipelines { Pipeline { id } }");
    }

    #[tokio::test]
    async fn bearer_token_header_and_variables() {
        let (url, seen) = serve(StatusCode::OK, serde_json::json!({"data": {"Candidate": []}})).await;
        executor(url)
            .execute(
                &Credential::Bearer { token: "jwt".into(), user_id: None },
                "query Q($email: String!) { Candidate { id } }",
                serde_json::json!({"email": "a@b.co"}),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.headers[0]["authorization"], "Bearer jwt");
        assert_eq!(seen.bodies[0]["variables"]["email"], "a@b.co");
    }

    #[tokio::test]
    async fn errors_envelope_is_an_error() {
        let (url, _) = serve(
            StatusCode::OK,
            serde_json::json!({"errors": [{"message": "field 'x' not found"}]}),
        )
        .await;
        let err = executor(url)
            .execute(&Credential::Admin { secret: "s".into() }, "query { x }", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphQlError::Envelope(_)));
        assert!(err.to_string().contains("field 'x' not found"));
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let (url, _) = serve(StatusCode::UNAUTHORIZED, serde_json::json!({"error": "denied"})).await;
        let err = executor(url)
            .execute(&Credential::Admin { secret: "s".into() }, "query { x }", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphQlError::Http { status: 401, .. }));
    }

    #[test]
    fn empty_errors_array_is_ignored() {
        let body = GraphQlResponse {
            data: Some(serde_json::json!({"ok": true})),
            errors: Some(serde_json::json!([])),
        };
        assert_eq!(unwrap_envelope(body).unwrap(), serde_json::json!({"ok": true}));

        let body = GraphQlResponse { data: None, errors: None };
        assert!(matches!(unwrap_envelope(body), Err(GraphQlError::MissingData)));
    }
}
