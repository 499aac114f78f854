mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// GETs `url` with `query` appended and decodes the body as JSON.
pub async fn fetch_json<C: HttpClient>(
    client: &C,
    url: &str,
    query: &[(&str, String)],
) -> Result<serde_json::Value> {
    let mut req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    for (name, value) in query {
        req.url_mut().query_pairs_mut().append_pair(name, value);
    }

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.json().await?)
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::HttpClient;

    /// Replies to every request with a fixed status and body and remembers
    /// the last URL it was asked for.
    pub struct MockClient {
        pub status: u16,
        pub body: String,
        pub last_url: Mutex<Option<String>>,
    }

    impl MockClient {
        pub fn new(status: u16, body: impl Into<String>) -> Self {
            Self {
                status,
                body: body.into(),
                last_url: Mutex::new(None),
            }
        }

        pub fn last_url(&self) -> Option<String> {
            self.last_url.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            *self.last_url.lock().unwrap() = Some(req.url().to_string());
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body.clone())
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockClient;
    use super::*;

    #[tokio::test]
    async fn test_fetch_json_appends_query() {
        let client = MockClient::new(200, r#"{"ok": true}"#);
        let value = fetch_json(&client, "http://localhost/predict", &[("steps", "7".to_string())])
            .await
            .unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
        assert_eq!(
            client.last_url().as_deref(),
            Some("http://localhost/predict?steps=7")
        );
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let client = MockClient::new(500, "boom");
        assert!(fetch_json(&client, "http://localhost/predict", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_url_is_an_error() {
        let client = MockClient::new(200, "");
        assert!(fetch_json(&client, "not a url", &[]).await.is_err());
    }
}
