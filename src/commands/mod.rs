//! API Command Wrappers
//!
//! Client bindings to the server's HTTP routes, organized by domain.
//! Every call goes through `with_retry`.

mod settings;
mod task;
mod team;
mod template;
mod ticket;

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::retry::{with_retry, RETRY_BASE_DELAY_MS};

pub use task::{NewTask, TaskPatch};
pub use template::NewTemplate;
pub use ticket::{NewTicket, TicketQuery};

/// Characters left as-is in a path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    /// `/api/<segments...>` with every segment percent-encoded
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = format!("{}/api", self.base_url);
        for segment in segments {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        url
    }

    pub async fn health(&self) -> ClientResult<Value> {
        self.get(self.url(&["health"]), &[]).await
    }

    async fn get<T: DeserializeOwned>(&self, url: String, query: &[(&str, String)]) -> ClientResult<T> {
        let text = self.execute(Method::GET, url, query, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send_json<B, T>(&self, method: Method, url: String, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let text = self.execute(method, url, &[], Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn delete(&self, url: String) -> ClientResult<()> {
        self.execute(Method::DELETE, url, &[], None).await?;
        Ok(())
    }

    /// Send with retries; returns the body of a 2xx response
    async fn execute(
        &self,
        method: Method,
        url: String,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> ClientResult<String> {
        let label = format!("{} {}", method, url);
        with_retry(&label, self.retry_delay, || self.attempt(&method, &url, query, body.as_ref())).await
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ClientResult<String> {
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(api_error(status.as_u16(), &text))
        }
    }
}

/// Build an `Api` error from a `{ "error": ... }` body, falling back to the raw text
fn api_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    ClientError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_segments() {
        let client = ApiClient::new("http://localhost:8787/").unwrap();
        assert_eq!(client.url(&["tasks"]), "http://localhost:8787/api/tasks");
        assert_eq!(
            client.url(&["settings", "ana maría/ops"]),
            "http://localhost:8787/api/settings/ana%20mar%C3%ADa%2Fops"
        );
    }

    #[test]
    fn test_api_error_prefers_error_field() {
        let err = api_error(404, r#"{"error":"Not found: Task t1"}"#);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "server returned 404: Not found: Task t1");

        let err = api_error(502, "bad gateway\n");
        assert_eq!(err.to_string(), "server returned 502: bad gateway");
    }
}
