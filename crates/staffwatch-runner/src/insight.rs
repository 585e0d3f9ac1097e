//! Jira Insight REST client: the catalog listing and per-object history.
//!
//! Two endpoints are used:
//!
//! - `GET /rest/insight/1.0/iql/objects` -- paged IQL query returning every
//!   object of the configured type (`objectEntries`).
//! - `GET /rest/insight/1.0/object/{id}/history` -- the audit log of one
//!   object, oldest entry first.
//!
//! A catalog fetch is all-or-nothing: any failing page fails the whole
//! fetch, since a partial catalog would make every missing record look
//! deleted.

use std::time::Duration;

use serde::Deserialize;
use staffwatch_core::config::InsightConfig;
use staffwatch_core::history::{HistoryError, HistorySource};
use staffwatch_types::{HistoryEvent, Record, RecordId, Snapshot};
use tracing::{debug, trace};

use crate::error::InsightError;

/// One page of an IQL object query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectPage {
    #[serde(default)]
    object_entries: Vec<Record>,
}

/// Client for the Insight catalog and history endpoints.
///
/// Holds one shared `reqwest::Client` (and so one connection pool) for the
/// lifetime of the process.
pub struct InsightClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    schema_id: u32,
    object_type_id: u32,
    page_size: u32,
    catalog_timeout: Duration,
    history_timeout: Duration,
}

impl InsightClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InsightError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &InsightConfig) -> Result<Self, InsightError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("staffwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InsightError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_owned(),
            token: config.token.clone(),
            schema_id: config.schema_id,
            object_type_id: config.object_type_id,
            page_size: config.page_size,
            catalog_timeout: config.catalog_timeout(),
            history_timeout: config.history_timeout(),
        })
    }

    /// Fetch every object of the configured type, following pagination.
    ///
    /// Pages are requested from 1 upward until a page comes back empty or
    /// shorter than the page size. Duplicate ids across pages fold into a
    /// single record, last one wins.
    ///
    /// # Errors
    ///
    /// Returns [`InsightError`] if any page fails; no partial result is
    /// returned.
    pub async fn fetch_all(&self) -> Result<Snapshot, InsightError> {
        let mut records = Vec::new();
        let mut page: u32 = 1;
        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);

        loop {
            let entries = self.fetch_page(page).await?;
            let count = entries.len();
            trace!(page, count, "catalog page fetched");
            records.extend(entries);

            if count == 0 || count < page_size {
                break;
            }
            page = page.saturating_add(1);
        }

        let snapshot = Snapshot::from_records(records);
        debug!(pages = page, records = snapshot.len(), "catalog fetched");
        Ok(snapshot)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Record>, InsightError> {
        let url = format!("{}/rest/insight/1.0/iql/objects", self.base_url);
        let query = [
            ("objectSchemaId", self.schema_id.to_string()),
            ("iql", format!("objectTypeId={}", self.object_type_id)),
            ("resultPerPage", self.page_size.to_string()),
            ("page", page.to_string()),
        ];

        let request = self
            .authorized(self.client.get(&url))
            .query(&query)
            .timeout(self.catalog_timeout);
        let body: ObjectPage = send_json(&url, request).await?;
        Ok(body.object_entries)
    }

    /// Fetch the audit history of one object.
    ///
    /// # Errors
    ///
    /// Returns [`InsightError`] on transport failure, a non-success status,
    /// or an unparsable body.
    pub async fn history(&self, id: &RecordId) -> Result<Vec<HistoryEvent>, InsightError> {
        let url = format!("{}/rest/insight/1.0/object/{id}/history", self.base_url);
        let request = self
            .authorized(self.client.get(&url))
            .timeout(self.history_timeout);
        send_json(&url, request).await
    }

    /// Handle to the shared HTTP client (and its connection pool).
    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }
}

async fn send_json<T: serde::de::DeserializeOwned>(
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, InsightError> {
    let response = request
        .send()
        .await
        .map_err(|e| InsightError::from_send(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(InsightError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| InsightError::from_send(url, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| InsightError::Malformed {
        url: url.to_owned(),
        message: e.to_string(),
    })
}

impl HistorySource for InsightClient {
    async fn fetch_history(
        &self,
        id: &RecordId,
        since: Option<&str>,
    ) -> Result<Vec<HistoryEvent>, HistoryError> {
        // The history endpoint has no server-side filter; `since` only
        // shows up in the trace.
        trace!(id = %id, since = since.unwrap_or_default(), "fetching history");
        self.history(id)
            .await
            .map_err(|e| e.into_history_error(self.history_timeout))
    }
}

/// Link to an object in the Jira UI.
pub fn object_url(base_url: &str, id: &RecordId) -> String {
    format!("{base_url}/secure/ShowObject.jspa?id={id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const OBJECTS: &str = "/rest/insight/1.0/iql/objects";

    fn config(base_url: &str) -> InsightConfig {
        InsightConfig {
            base_url: base_url.to_owned(),
            token: "test-token".to_owned(),
            page_size: 2,
            catalog_timeout_ms: 2_000,
            history_timeout_ms: 200,
            ..InsightConfig::default()
        }
    }

    fn entry(id: u64, label: &str, updated: &str) -> serde_json::Value {
        json!({"id": id, "label": label, "updated": updated, "objectKey": format!("HR-{id}")})
    }

    #[tokio::test]
    async fn fetch_all_follows_pages_until_short_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "1"))
            .and(query_param("objectSchemaId", "3"))
            .and(query_param("iql", "objectTypeId=405"))
            .and(query_param("resultPerPage", "2"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectEntries": [entry(1, "Alice", "t1"), entry(2, "Bob", "t1")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectEntries": [entry(3, "Carol", "t2")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();
        let snapshot = client.fetch_all().await.unwrap();

        let ids: Vec<&str> = snapshot.ids().map(RecordId::as_str).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(
            snapshot.get(&RecordId::from("3")).unwrap().last_modified.as_deref(),
            Some("t2")
        );
    }

    #[tokio::test]
    async fn fetch_all_stops_on_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectEntries": [entry(1, "Alice", "t1"), entry(1, "Alice Renamed", "t2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectEntries": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();
        let snapshot = client.fetch_all().await.unwrap();

        // Duplicate ids fold, last seen wins.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&RecordId::from("1")).unwrap().label,
            "Alice Renamed"
        );
    }

    #[tokio::test]
    async fn failing_page_fails_the_whole_catalog() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectEntries": [entry(1, "Alice", "t1"), entry(2, "Bob", "t1")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch_all().await;

        assert!(
            matches!(result, Err(InsightError::Status { status: 503, .. })),
            "expected 503, got {result:?}"
        );
    }

    #[tokio::test]
    async fn unexpected_catalog_shape_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OBJECTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectEntries": [{"label": "no id"}]
            })))
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch_all().await;

        assert!(matches!(result, Err(InsightError::Malformed { .. })));
    }

    #[tokio::test]
    async fn history_is_parsed_in_feed_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/insight/1.0/object/17/history"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"created": "2024-01-01T00:00:00", "affectedAttribute": "dept",
                 "oldValue": "Ops", "newValue": "Eng", "actor": {"displayName": "Dave"}},
                {"created": "2024-01-02T00:00:00", "affectedAttribute": "title",
                 "oldValue": "Eng", "newValue": "Sr Eng", "actor": {"displayName": "Carol"}}
            ])))
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();
        let history = client
            .fetch_history(&RecordId::from("17"), Some("2023-12-31T00:00:00"))
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].actor_name.as_deref(), Some("Carol"));
        assert_eq!(history[1].affected_attribute.as_deref(), Some("title"));
    }

    #[tokio::test]
    async fn history_errors_map_to_history_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/insight/1.0/object/1/history"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/insight/1.0/object/2/history"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/insight/1.0/object/3/history"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = InsightClient::new(&config(&server.uri())).unwrap();

        let status = client.fetch_history(&RecordId::from("1"), None).await;
        assert!(matches!(status, Err(HistoryError::Transport { .. })));

        let malformed = client.fetch_history(&RecordId::from("2"), None).await;
        assert!(matches!(malformed, Err(HistoryError::Malformed { .. })));

        let slow = client.fetch_history(&RecordId::from("3"), None).await;
        assert!(
            matches!(slow, Err(HistoryError::Timeout { after_ms: 200 })),
            "got {slow:?}"
        );
    }

    #[tokio::test]
    async fn empty_token_sends_no_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/insight/1.0/object/1/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let config = InsightConfig {
            token: String::new(),
            ..config(&server.uri())
        };
        let client = InsightClient::new(&config).unwrap();
        let history = client.history(&RecordId::from("1")).await.unwrap();
        assert!(history.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[test]
    fn object_url_points_at_show_object_page() {
        assert_eq!(
            object_url("https://jira.example.com", &RecordId::from("17")),
            "https://jira.example.com/secure/ShowObject.jspa?id=17"
        );
    }
}
