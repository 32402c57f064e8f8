//! datesync-http: remote file API store
//!
//! Blocking reqwest client (no Tokio runtime required). Downloads a file's
//! media and overwrites it with a media upload; payloads above
//! `RESUMABLE_THRESHOLD` go through a chunked resumable upload session.
//! Obtaining the access token is left to the caller.

use datesync_core::{Acknowledgement, FetchError, Store, StoreError};
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{redirect, StatusCode, Url};
use std::time::Duration;

/// Default API host
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

/// Largest payload sent as a single media upload
pub const RESUMABLE_THRESHOLD: usize = 5 * 1024 * 1024;

/// Bytes per request in a resumable session
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Store backed by the remote file API (blocking)
#[derive(Clone)]
pub struct HttpStore {
    http: reqwest::blocking::Client,
    api_base: Url,
    token: String,
    resumable_threshold: usize,
    chunk_size: usize,
}

impl HttpStore {
    /// Create a store against the default API host
    pub fn new(token: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Create a store against an explicit API host
    pub fn with_base_url(token: impl Into<String>, api_base: &str) -> Result<Self, StoreError> {
        let api_base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| StoreError::Transport(format!("invalid API base '{}': {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "invalid API base '{}': not a hierarchical URL",
                api_base
            )));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("datesync/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            // An unfinished resumable session answers 308 without a Location
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.status() == StatusCode::PERMANENT_REDIRECT
                    || attempt.previous().len() >= 10
                {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base,
            token: token.into(),
            resumable_threshold: RESUMABLE_THRESHOLD,
            chunk_size: UPLOAD_CHUNK_SIZE,
        })
    }

    /// `{api_base}/{prefix...}/{identifier}` with every segment percent-encoded
    fn file_url(&self, prefix: &[&str], identifier: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(prefix).push(identifier);
        }
        url
    }

    fn media_url(&self, identifier: &str) -> Url {
        self.file_url(&["drive", "v3", "files"], identifier)
    }

    fn upload_url(&self, identifier: &str) -> Url {
        self.file_url(&["upload", "drive", "v3", "files"], identifier)
    }

    fn store_media(&self, identifier: &str, text: &str) -> Result<Acknowledgement, StoreError> {
        let response = self
            .http
            .patch(self.upload_url(identifier))
            .query(&[("uploadType", "media")])
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "text/csv")
            .body(text.as_bytes().to_vec())
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_acknowledgement(&body)
    }

    fn store_resumable(&self, identifier: &str, text: &str) -> Result<Acknowledgement, StoreError> {
        let session = self.open_session(identifier, text.len())?;
        let bytes = text.as_bytes();
        let total = bytes.len();
        let mut offset = 0;

        loop {
            let end = (offset + self.chunk_size).min(total);
            let response = self
                .http
                .put(session.clone())
                .bearer_auth(&self.token)
                .header(
                    CONTENT_RANGE,
                    format!("bytes {}-{}/{}", offset, end - 1, total),
                )
                .body(bytes[offset..end].to_vec())
                .send()
                .map_err(|e| StoreError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::PERMANENT_REDIRECT {
                // The Range header names the last byte the server has kept
                let next = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(last_received_byte)
                    .map_or(0, |last| last + 1);
                if next <= offset || next >= total {
                    return Err(StoreError::Transport(format!(
                        "upload session for '{}' stalled at byte {} of {}",
                        identifier, next, total
                    )));
                }
                offset = next;
                continue;
            }

            let body = response
                .text()
                .map_err(|e| StoreError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(StoreError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            return parse_acknowledgement(&body);
        }
    }

    /// Start a resumable session; returns the session URI
    fn open_session(&self, identifier: &str, length: usize) -> Result<Url, StoreError> {
        let response = self
            .http
            .patch(self.upload_url(identifier))
            .query(&[("uploadType", "resumable")])
            .bearer_auth(&self.token)
            .header("X-Upload-Content-Type", "text/csv")
            .header("X-Upload-Content-Length", length.to_string())
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                StoreError::MalformedResponse("resumable session without a Location header".into())
            })?;
        Url::parse(location)
            .map_err(|e| StoreError::MalformedResponse(format!("bad session URI: {}", e)))
    }
}

impl Store for HttpStore {
    fn fetch(&self, identifier: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .get(self.media_url(identifier))
            .query(&[("alt", "media")])
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(identifier.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn store(&self, identifier: &str, text: &str) -> Result<Acknowledgement, StoreError> {
        if text.len() > self.resumable_threshold {
            self.store_resumable(identifier, text)
        } else {
            self.store_media(identifier, text)
        }
    }
}

/// `bytes=0-1048575` -> 1048575
fn last_received_byte(range: &str) -> Option<usize> {
    let (_, last) = range.strip_prefix("bytes=")?.split_once('-')?;
    last.trim().parse().ok()
}

/// Read `id` and `size` from an upload response
fn parse_acknowledgement(body: &str) -> Result<Acknowledgement, StoreError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| StoreError::MalformedResponse(e.to_string()))?;

    let object = json
        .as_object()
        .ok_or_else(|| StoreError::MalformedResponse("expected a JSON object".into()))?;

    let id = object.get("id").and_then(|v| v.as_str()).map(String::from);

    // Sizes come back as decimal strings; accept numbers too
    let size = object.get("size").and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });

    Ok(Acknowledgement { id, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn store_for(server: &MockServer) -> HttpStore {
        HttpStore::with_base_url("test-token", &server.base_url()).unwrap()
    }

    #[test]
    fn test_fetch_returns_media_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/drive/v3/files/ABC123")
                .query_param("alt", "media")
                .header("authorization", "Bearer test-token");
            then.status(200)
                .header("content-type", "text/csv")
                .body("Date,Qty\n2025-11-01,5\n");
        });

        let text = store_for(&server).fetch("ABC123").unwrap();

        mock.assert();
        assert_eq!(text, "Date,Qty\n2025-11-01,5\n");
    }

    #[test]
    fn test_fetch_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/drive/v3/files/missing");
            then.status(404).body("{\"error\": \"notFound\"}");
        });

        let err = store_for(&server).fetch("missing").unwrap_err();
        assert!(matches!(err, FetchError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn test_fetch_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/drive/v3/files/ABC123");
            then.status(503).body("backend unavailable");
        });

        let err = store_for(&server).fetch("ABC123").unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 503, .. }));
    }

    #[test]
    fn test_store_uploads_media_and_parses_ack() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/upload/drive/v3/files/ABC123")
                .query_param("uploadType", "media")
                .header("content-type", "text/csv")
                .body("Date,Qty\n2025-11-03,9\n");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "id": "ABC123",
                    "name": "production.csv",
                    "size": "23"
                }));
        });

        let ack = store_for(&server)
            .store("ABC123", "Date,Qty\n2025-11-03,9\n")
            .unwrap();

        mock.assert();
        assert_eq!(ack.id.as_deref(), Some("ABC123"));
        assert_eq!(ack.size, Some(23));
        assert!(ack.confirm("ABC123").is_ok());
    }

    #[test]
    fn test_store_rejects_non_json_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/upload/drive/v3/files/ABC123");
            then.status(200).body("<html>ok</html>");
        });

        let err = store_for(&server).store("ABC123", "Date\n").unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse(_)));
    }

    #[test]
    fn test_store_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/upload/drive/v3/files/ABC123");
            then.status(403).body("insufficient permissions");
        });

        let err = store_for(&server).store("ABC123", "Date\n").unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 403, ref body } if body.contains("insufficient")));
    }

    #[test]
    fn test_parse_acknowledgement_without_id() {
        let ack = parse_acknowledgement("{\"kind\": \"drive#file\"}").unwrap();
        assert_eq!(ack.id, None);
        assert!(ack.confirm("ABC123").is_err());

        assert!(matches!(
            parse_acknowledgement("[1, 2]"),
            Err(StoreError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_identifier_is_percent_encoded() {
        let store = HttpStore::with_base_url("t", "https://api.example.com/").unwrap();

        assert_eq!(
            store.media_url("a#b?c%d/e").as_str(),
            "https://api.example.com/drive/v3/files/a%23b%3Fc%25d%2Fe"
        );
        assert_eq!(
            store.upload_url("ABC123").as_str(),
            "https://api.example.com/upload/drive/v3/files/ABC123"
        );
    }

    #[test]
    fn test_invalid_api_base() {
        assert!(matches!(
            HttpStore::with_base_url("t", "not a url"),
            Err(StoreError::Transport(_))
        ));
    }

    #[test]
    fn test_large_upload_uses_resumable_session() {
        let server = MockServer::start();
        let text = format!("Date,Qty\n{}", "2025-11-03,9\n".repeat(3));
        assert_eq!(text.len(), 48);

        let session = server.mock(|when, then| {
            when.method(PATCH)
                .path("/upload/drive/v3/files/ABC123")
                .query_param("uploadType", "resumable")
                .header("x-upload-content-type", "text/csv")
                .header("x-upload-content-length", "48");
            then.status(200)
                .header("Location", format!("{}/upload/session/xyz", server.base_url()));
        });
        let first = server.mock(|when, then| {
            when.method(PUT)
                .path("/upload/session/xyz")
                .header("content-range", "bytes 0-15/48")
                .body(&text[0..16]);
            then.status(308).header("Range", "bytes=0-15");
        });
        let second = server.mock(|when, then| {
            when.method(PUT)
                .path("/upload/session/xyz")
                .header("content-range", "bytes 16-31/48");
            then.status(308).header("Range", "bytes=0-31");
        });
        let last = server.mock(|when, then| {
            when.method(PUT)
                .path("/upload/session/xyz")
                .header("content-range", "bytes 32-47/48")
                .body(&text[32..48]);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "id": "ABC123", "size": "48" }));
        });

        let mut store = store_for(&server);
        store.resumable_threshold = 32;
        store.chunk_size = 16;
        let ack = store.store("ABC123", &text).unwrap();

        session.assert();
        first.assert();
        second.assert();
        last.assert();
        assert_eq!(ack.size, Some(48));
        assert!(ack.confirm("ABC123").is_ok());
    }

    #[test]
    fn test_resumable_session_requires_location() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/upload/drive/v3/files/ABC123")
                .query_param("uploadType", "resumable");
            then.status(200);
        });

        let mut store = store_for(&server);
        store.resumable_threshold = 4;
        let err = store.store("ABC123", "Date\n2025\n").unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse(_)));
    }

    #[test]
    fn test_last_received_byte() {
        assert_eq!(last_received_byte("bytes=0-1048575"), Some(1048575));
        assert_eq!(last_received_byte("0-10"), None);
    }
}
