use reqwest::{Client, Proxy, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RemoteConfig;
use crate::remote::value;

const DEFAULT_USER_AGENT: &str = concat!("fishwiki_rs/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: &str = "100";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid document url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// One stored document with its fields decoded to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    fn from_wire(wire: &Value) -> Result<Self, RemoteError> {
        let name = wire.get("name").and_then(Value::as_str).unwrap_or_default();
        let id = name.rsplit('/').next().unwrap_or_default().to_string();
        let fields = match wire.get("fields").and_then(Value::as_object) {
            Some(fields) => value::decode_fields(fields)?,
            None => Map::new(),
        };
        Ok(Self { id, fields })
    }
}

/// Client for a shared document namespace: named documents grouped in
/// collections, read and written over REST.
pub struct DocumentStore {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl DocumentStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut client_builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        client_builder = client_builder.user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));

        if let Some(proxy_ip) = &config.proxy_ip {
            if let Some(proxy_port) = config.proxy_port {
                let proxy_url = format!("http://{}:{}", proxy_ip, proxy_port);
                let mut proxy = Proxy::all(&proxy_url)?;
                if let (Some(user), Some(pass)) = (&config.proxy_auth_user, &config.proxy_auth_password) {
                    proxy = proxy.basic_auth(user, pass);
                }
                client_builder = client_builder.proxy(proxy);
            }
        }

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        info!(base = %base, "Remote document store configured");
        Ok(Self {
            client: client_builder.build()?,
            base: Url::parse(&base)?,
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        let mut url = self.base.join(path)?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let res = request.send().await?;
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        warn!(%status, "Remote request failed: {}", body);
        Err(RemoteError::Status { status, body })
    }

    /// Reads one document. A missing document is `None`, not an error.
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let url = self.url(&format!("{}/{}", collection, id))?;
        debug!(%collection, %id, "GET document");

        let res = self.client.get(url).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            debug!(%collection, %id, "Document not found");
            return Ok(None);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Remote read failed: {}", body);
            return Err(RemoteError::Status { status, body });
        }
        let wire: Value = res.json().await?;
        Document::from_wire(&wire).map(Some)
    }

    /// Writes only the given top-level fields, creating the document if it
    /// does not exist. Other fields are left untouched. No concurrency
    /// check: the last write wins.
    pub async fn merge_document(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> Result<Document, RemoteError> {
        self.merge_typed(collection, id, value::encode_fields(fields)).await
    }

    /// [`merge_document`](Self::merge_document) for fields already in the
    /// typed-value encoding.
    pub async fn merge_typed(&self, collection: &str, id: &str, typed: Map<String, Value>) -> Result<Document, RemoteError> {
        let mut url = self.url(&format!("{}/{}", collection, id))?;
        {
            let mut query = url.query_pairs_mut();
            for key in typed.keys() {
                query.append_pair("updateMask.fieldPaths", &field_path(key));
            }
        }
        debug!(%collection, %id, fields = typed.len(), "PATCH document");

        let body = json!({ "fields": typed });
        let res = self.send(self.client.patch(url).json(&body)).await?;
        let wire: Value = res.json().await?;
        Document::from_wire(&wire)
    }

    /// Adds a document with a store-assigned id.
    pub async fn create_document(&self, collection: &str, fields: &Map<String, Value>) -> Result<Document, RemoteError> {
        self.create_typed(collection, value::encode_fields(fields)).await
    }

    pub async fn create_typed(&self, collection: &str, typed: Map<String, Value>) -> Result<Document, RemoteError> {
        let url = self.url(collection)?;
        debug!(%collection, "POST document");

        let body = json!({ "fields": typed });
        let res = self.send(self.client.post(url).json(&body)).await?;
        let wire: Value = res.json().await?;
        Document::from_wire(&wire)
    }

    /// Deletes a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.url(&format!("{}/{}", collection, id))?;
        debug!(%collection, %id, "DELETE document");

        let res = self.client.delete(url).send().await?;
        match res.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            status => {
                let body = res.text().await.unwrap_or_default();
                warn!(%status, "Remote delete failed: {}", body);
                Err(RemoteError::Status { status, body })
            }
        }
    }

    /// Every document in `collection`, following pagination.
    /// `order_by` takes the store's syntax, e.g. `"startDate desc"`.
    pub async fn list_documents(&self, collection: &str, order_by: Option<&str>) -> Result<Vec<Document>, RemoteError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(collection)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(order_by) = order_by {
                    query.append_pair("orderBy", order_by);
                }
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let res = self.send(self.client.get(url)).await?;
            let page: Value = res.json().await?;
            if let Some(docs) = page.get("documents").and_then(Value::as_array) {
                for doc in docs {
                    documents.push(Document::from_wire(doc)?);
                }
            }

            page_token = page.get("nextPageToken").and_then(Value::as_str).filter(|t| !t.is_empty()).map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        debug!(%collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }
}

/// Field paths that are not plain identifiers must be backquoted.
fn field_path(key: &str) -> String {
    let simple = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer, api_key: Option<&str>) -> DocumentStore {
        let config = RemoteConfig {
            enabled: true,
            base_url: format!("{}/docs", server.uri()),
            api_key: api_key.map(str::to_string),
            user_agent: None,
            proxy_ip: None,
            proxy_port: None,
            proxy_auth_user: None,
            proxy_auth_password: None,
            timeout_secs: 5,
            poll_interval_secs: 1,
        };
        DocumentStore::new(&config).unwrap()
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/settings/guide"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": { "code": 404 } })))
            .mount(&server)
            .await;

        let store = store(&server, None).await;
        assert_eq!(store.get_document("settings", "guide").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_decodes_fields_and_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/settings/guide"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/databases/(default)/documents/settings/guide",
                "fields": { "content": { "stringValue": "Hello" } }
            })))
            .mount(&server)
            .await;

        let doc = store(&server, Some("secret")).await.get_document("settings", "guide").await.unwrap().unwrap();
        assert_eq!(doc.id, "guide");
        assert_eq!(doc.fields.get("content"), Some(&json!("Hello")));
    }

    #[tokio::test]
    async fn merge_sends_an_update_mask_for_each_field() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/docs/settings/shopLinks"))
            .and(query_param("updateMask.fieldPaths", "links"))
            .and(body_json(json!({ "fields": { "links": { "arrayValue": { "values": [] } } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "x/settings/shopLinks",
                "fields": { "links": { "arrayValue": {} } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut fields = Map::new();
        fields.insert("links".into(), json!([]));
        let doc = store(&server, None).await.merge_document("settings", "shopLinks", &fields).await.unwrap();
        assert_eq!(doc.fields.get("links"), Some(&json!([])));
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = store(&server, None).await.merge_document("settings", "guide", &Map::new()).await.unwrap_err();
        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "PERMISSION_DENIED");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/weeklyEvents"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [{ "name": "x/weeklyEvents/b", "fields": {} }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/weeklyEvents"))
            .and(query_param("orderBy", "startDate desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [{ "name": "x/weeklyEvents/a", "fields": {} }],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let docs = store(&server, None).await.list_documents("weeklyEvents", Some("startDate desc")).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn deleting_a_missing_document_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/docs/weeklyEvents/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        store(&server, None).await.delete_document("weeklyEvents", "gone").await.unwrap();
    }

    #[test]
    fn odd_field_names_are_quoted() {
        assert_eq!(field_path("rateMultiplier"), "rateMultiplier");
        assert_eq!(field_path("m-001"), "`m-001`");
        assert_eq!(field_path("2x"), "`2x`");
    }
}
