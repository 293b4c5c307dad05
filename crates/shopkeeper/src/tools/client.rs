use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use shopkeeper_core::tool::{Error as ToolError, ToolResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A client of the store tool server's REST API.
///
/// Cloning is cheap, clones share the connection pool.
#[derive(Clone, Debug)]
pub struct StoreApi {
    client: Client,
    base_url: String,
}

impl StoreApi {
    /// Creates a client for the server at `base_url`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build the HTTP client, using defaults: {err}");
                Client::new()
            });
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// Returns the server address without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the server answers its health endpoint.
    pub async fn health(&self) -> Result<(), String> {
        let resp = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("health check returned {}", resp.status()))
        }
    }

    pub(crate) async fn get<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ToolResult {
        let req = self.request(Method::GET, path).query(query);
        send(req).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ToolResult {
        let req = self.request(Method::POST, path).json(body);
        send(req).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ToolResult {
        let req = self.request(Method::PUT, path).json(body);
        send(req).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{method} {path}");
        self.client.request(method, self.url(path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Sends the request and returns the body as text, the model reads it as is.
async fn send(req: RequestBuilder) -> ToolResult {
    let resp = req.send().await.map_err(|err| {
        ToolError::execution_error().with_reason(format!("request failed: {err}"))
    })?;
    let status = resp.status();
    let body = resp.text().await.map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("failed to read the response: {err}"))
    })?;

    if status.is_success() {
        return Ok(body);
    }
    warn!("store server returned {status}: {body}");
    let err = if status == reqwest::StatusCode::NOT_FOUND {
        ToolError::not_found()
    } else {
        ToolError::execution_error()
    };
    Err(err.with_reason(format!("{status}: {body}")))
}

/// An empty query string.
pub(crate) const NO_QUERY: &[(&str, &str)] = &[];

/// Joins a collection path and an item id.
#[inline]
pub(crate) fn item_path(collection: &str, id: u64) -> String {
    format!("{collection}/{id}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shopkeeper_core::tool::ErrorKind;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(
            StoreApi::new("http://localhost:3000/").base_url(),
            "http://localhost:3000"
        );
        assert_eq!(item_path("/api/orders", 12), "/api/orders/12");
    }

    #[tokio::test]
    async fn test_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .and(query_param("per_page", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/7"))
            .and(body_json(json!({ "status": "completed" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":7}"))
            .mount(&server)
            .await;

        let api = StoreApi::new(server.uri());
        let body = api.get("/api/products", &[("per_page", 5)]).await.unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&body).unwrap(),
            json!([{ "id": 1 }])
        );
        let body = api
            .put("/api/orders/7", &json!({ "status": "completed" }))
            .await
            .unwrap();
        assert_eq!(body, "{\"id\":7}");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such order"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/coupons"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "duplicate code" })),
            )
            .mount(&server)
            .await;

        let api = StoreApi::new(server.uri());
        let err = api.get("/api/orders/404", NO_QUERY).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.reason().contains("no such order"));

        let err = api.post("/api/coupons", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert!(err.reason().starts_with("500"));
        assert!(err.reason().contains("duplicate code"));
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;
        assert!(StoreApi::new(server.uri()).health().await.is_ok());

        let down = MockServer::start().await;
        assert!(StoreApi::new(down.uri()).health().await.is_err());
    }
}
