//! Registry Fetcher
//!
//! Downloads `registry.json` and per-plugin options schemas over HTTP.
//! Fetching never touches storage; callers decide what to persist.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::error::{PluginHubError, Result};
use crate::plugin::types::RegistrySnapshot;

const REGISTRY_FILE: &str = "registry.json";

/// Source of registry data
pub trait RegistrySource: Send + Sync {
    /// GET `<base_url>/registry.json` and parse it
    fn fetch_registry(&self, base_url: &str) -> Result<RegistrySnapshot>;

    /// GET an options-schema document; the body must be valid JSON
    fn fetch_options_schema(&self, url: &str) -> Result<String>;
}

/// Build the registry document URL from a base URL
pub fn registry_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim().trim_end_matches('/'), REGISTRY_FILE)
}

/// Blocking HTTP fetcher with a hard per-request timeout
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("plugin-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PluginHubError::Fetch {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let fetch_err = |message: String| PluginHubError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(fetch_err(format!("unexpected status {}", status)));
        }

        response.text().map_err(|e| fetch_err(e.to_string()))
    }
}

impl RegistrySource for HttpFetcher {
    fn fetch_registry(&self, base_url: &str) -> Result<RegistrySnapshot> {
        let url = registry_url(base_url);
        tracing::debug!(%url, "fetching plugin registry");

        let body = self.get_text(&url)?;
        serde_json::from_str(&body).map_err(|e| PluginHubError::Parse {
            url,
            message: e.to_string(),
        })
    }

    fn fetch_options_schema(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "fetching options schema");

        let body = self.get_text(url)?;
        serde_json::from_str::<serde_json::Value>(&body).map_err(|e| PluginHubError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response and return the server's base URL
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://{}", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_registry_url_trims_slash() {
        assert_eq!(
            registry_url("https://plugins.example.org/"),
            "https://plugins.example.org/registry.json"
        );
        assert_eq!(
            registry_url("https://plugins.example.org"),
            "https://plugins.example.org/registry.json"
        );
    }

    #[test]
    fn test_fetch_registry_ok() {
        let base = serve_once(
            "200 OK",
            r#"{"plugins":[{"id":"katex","name":"KaTeX","type":"plugin","version":"1.0.0"}],"themes":[]}"#,
        );

        let snapshot = fetcher().fetch_registry(&base).unwrap();
        assert_eq!(snapshot.plugins.len(), 1);
        assert_eq!(snapshot.plugins[0].id, "katex");
    }

    #[test]
    fn test_fetch_registry_bad_status() {
        let base = serve_once("503 Service Unavailable", "{}");
        let result = fetcher().fetch_registry(&base);
        assert!(matches!(result, Err(PluginHubError::Fetch { .. })));
    }

    #[test]
    fn test_fetch_registry_malformed() {
        let base = serve_once("200 OK", "<html>not json</html>");
        let result = fetcher().fetch_registry(&base);
        assert!(matches!(result, Err(PluginHubError::Parse { .. })));
    }

    #[test]
    fn test_fetch_registry_unreachable() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let result = fetcher().fetch_registry(&format!("http://127.0.0.1:{}", port));
        assert!(matches!(result, Err(PluginHubError::Fetch { .. })));
    }

    #[test]
    fn test_fetch_options_schema() {
        let base = serve_once("200 OK", r#"{"type":"object"}"#);
        let body = fetcher()
            .fetch_options_schema(&format!("{}/schema.json", base))
            .unwrap();
        assert_eq!(body, r#"{"type":"object"}"#);

        let base = serve_once("200 OK", "nope");
        let result = fetcher().fetch_options_schema(&format!("{}/schema.json", base));
        assert!(matches!(result, Err(PluginHubError::Parse { .. })));
    }

    #[test]
    fn test_fetch_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let _held = listener.accept();
            thread::sleep(Duration::from_secs(3));
        });

        let fetcher = HttpFetcher::new(Duration::from_millis(300)).unwrap();
        let result = fetcher.fetch_options_schema(&format!("http://{}/schema.json", addr));
        assert!(matches!(result, Err(PluginHubError::Fetch { .. })));
    }
}
