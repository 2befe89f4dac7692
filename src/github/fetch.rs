// src/github/fetch.rs
// =============================================================================
// This module talks to the GitHub contents API.
//
// Strategy:
// - List a folder with GET /repos/{owner}/{repo}/contents/{path}?ref={branch}
// - Each entry carries a `sha` (the git blob hash) which we use as the
//   content identifier, and a `download_url` on raw.githubusercontent.com
// - Download file bodies from that URL as a stream of chunks
//
// Listing requests go through the retry loop here. A download is a single
// attempt: the sync engine retries the whole fetch-and-write, since a body
// can also break halfway through. Status codes are sorted into
// NotFound / Unauthorized / RateLimited / TransientNetwork so the retry
// loop and the sync engine know what they're dealing with.
//
// Submodules: inside a folder listing GitHub reports them as "type": "file"
// with no download_url. They are mapped to an unsupported "submodule"
// entry rather than a file we would try (and fail) to download.
//
// Rust concepts:
// - async functions: For network I/O
// - serde: To decode the JSON the API sends back
// - Streams: To write files without holding them fully in memory
// =============================================================================

use super::reference::join_path;
use super::retry::{with_retry, RetryPolicy};
use super::{ByteStream, EntryKind, FileFetcher, RemoteEntry, RemoteTreeClient, RepoRef};
use crate::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_MEDIA_TYPE: &str = "application/vnd.github+json";
const USER_AGENT_VALUE: &str = concat!("gh-folder-sync/", env!("CARGO_PKG_VERSION"));

// One item of a contents API listing. Only the fields we use are decoded.
#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

// A folder comes back as an array; a file path comes back as one object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

/// GitHub contents API client. Cheap to clone (reqwest's Client is an Arc).
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Creates a client for `api_base` (normally https://api.github.com).
    ///
    /// `token` is passed through as a bearer token on every request.
    pub fn new(
        api_base: &str,
        token: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Protocol(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            retry,
        })
    }

    fn contents_url(&self, reference: &RepoRef, repo_path: &str) -> String {
        contents_url(&self.api_base, reference, repo_path)
    }

    // Sends one GET and turns any non-2xx status into a classified error
    async fn get(&self, url: &str, accept_json: bool) -> Result<Response, FetchError> {
        let mut request = self.http.get(url).header(USER_AGENT, USER_AGENT_VALUE);
        if accept_json {
            request = request.header(ACCEPT, API_MEDIA_TYPE);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(categorize_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_status(status, response.headers(), url))
        }
    }

    async fn list_once(&self, url: &str, dir: &str) -> Result<Vec<RemoteEntry>, FetchError> {
        let response = self.get(url, true).await?;
        let body: ContentsResponse = response.json().await.map_err(categorize_error)?;
        into_entries(body, dir)
    }
}

#[async_trait]
impl RemoteTreeClient for GithubClient {
    async fn list_children(
        &self,
        reference: &RepoRef,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, FetchError> {
        let url = self.contents_url(reference, &reference.repo_path(path));
        debug!(url = %url, "listing folder");

        with_retry(&self.retry, "list", || self.list_once(&url, path)).await
    }
}

#[async_trait]
impl FileFetcher for GithubClient {
    async fn fetch(&self, entry: &RemoteEntry) -> Result<ByteStream, FetchError> {
        debug!(url = %entry.fetch_ref, "downloading file");

        // One attempt; the engine retries the download as a whole
        let response = self.get(&entry.fetch_ref, false).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(categorize_error))
            .boxed())
    }
}

/// Builds the contents API URL for a path inside the repository.
fn contents_url(api_base: &str, reference: &RepoRef, repo_path: &str) -> String {
    let mut url = format!(
        "{}/repos/{}/{}/contents",
        api_base,
        urlencoding::encode(&reference.owner),
        urlencoding::encode(&reference.repo)
    );
    if !repo_path.is_empty() {
        url.push('/');
        url.push_str(&encode_path(repo_path));
    }
    url.push_str("?ref=");
    url.push_str(&urlencoding::encode(&reference.branch));
    url
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// Maps a listing response onto entries whose paths are relative to the
// folder the session started at (`dir` is the listed folder, relative too)
fn into_entries(body: ContentsResponse, dir: &str) -> Result<Vec<RemoteEntry>, FetchError> {
    let items = match body {
        ContentsResponse::Listing(items) => items,
        ContentsResponse::Single(item) => {
            return Err(FetchError::Protocol(format!(
                "'{}' is a {}, not a folder",
                item.path, item.kind
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let kind = match (item.kind.as_str(), &item.download_url) {
                ("file", Some(_)) => EntryKind::File,
                // How a folder listing reports a submodule
                ("file", None) => EntryKind::Unsupported("submodule".to_string()),
                ("dir", _) => EntryKind::Directory,
                (other, _) => EntryKind::Unsupported(other.to_string()),
            };
            let fetch_ref = item.download_url.unwrap_or_default();

            RemoteEntry {
                path: join_path(dir, &item.name),
                kind,
                content_id: item.sha,
                fetch_ref,
            }
        })
        .collect())
}

/// Sorts a non-success HTTP status into our error taxonomy.
///
/// GitHub reports rate limiting as either 429 or 403 with
/// `x-ratelimit-remaining: 0`, so a bare 403 is only "unauthorized" when
/// those headers say we still have quota.
fn classify_status(status: StatusCode, headers: &HeaderMap, url: &str) -> FetchError {
    let header = |name: &str| header_str(headers, name);

    let retry_after = header(RETRY_AFTER.as_str())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| {
            header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(|reset| {
                    let wait = reset - chrono::Utc::now().timestamp();
                    Duration::from_secs(wait.max(0) as u64)
                })
        });

    let quota_exhausted = header("x-ratelimit-remaining") == Some("0");

    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED => {
            FetchError::Unauthorized(format!("HTTP {} for {}", status.as_u16(), url))
        }
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if quota_exhausted || header(RETRY_AFTER.as_str()).is_some() => {
            FetchError::RateLimited { retry_after }
        }
        StatusCode::FORBIDDEN => {
            FetchError::Unauthorized(format!("HTTP {} for {}", status.as_u16(), url))
        }
        s if s.is_server_error() => {
            FetchError::TransientNetwork(format!("HTTP {} for {}", s.as_u16(), url))
        }
        s => FetchError::Protocol(format!("HTTP {} for {}", s.as_u16(), url)),
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// Categorizes reqwest errors. Anything that happened on the wire is worth
// retrying; a body we couldn't decode is not.
fn categorize_error(error: reqwest::Error) -> FetchError {
    if error.is_decode() {
        FetchError::Protocol(error.to_string())
    } else if error.is_timeout() {
        FetchError::TransientNetwork(format!("request timed out: {}", error))
    } else {
        FetchError::TransientNetwork(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn reference() -> RepoRef {
        RepoRef::parse("https://github.com/octo/demo/tree/main/docs").unwrap()
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let url = contents_url("https://api.github.com", &reference(), "docs/my notes");
        assert_eq!(
            url,
            "https://api.github.com/repos/octo/demo/contents/docs/my%20notes?ref=main"
        );
    }

    #[test]
    fn test_contents_url_for_repository_root() {
        let url = contents_url("https://ghe.example/api/v3", &reference(), "");
        assert_eq!(url, "https://ghe.example/api/v3/repos/octo/demo/contents?ref=main");
    }

    #[test]
    fn test_listing_maps_kinds_and_relative_paths() {
        let json = r#"[
            {"name": "a.txt", "path": "docs/sub/a.txt", "sha": "111", "type": "file",
             "download_url": "https://raw.githubusercontent.com/octo/demo/main/docs/sub/a.txt"},
            {"name": "deeper", "path": "docs/sub/deeper", "sha": "222", "type": "dir",
             "download_url": null},
            {"name": "vendor", "path": "docs/sub/vendor", "sha": "333", "type": "submodule",
             "download_url": null}
        ]"#;
        let body: ContentsResponse = serde_json::from_str(json).unwrap();
        let entries = into_entries(body, "sub").unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, "sub/a.txt");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].content_id, "111");
        assert_eq!(entries[1].kind, EntryKind::Directory);
        assert_eq!(entries[2].kind, EntryKind::Unsupported("submodule".into()));
        assert!(entries[2].fetch_ref.is_empty());
    }

    #[test]
    fn test_listed_submodule_is_not_a_file() {
        // Inside a folder listing GitHub reports submodules as files with
        // no download_url (and a git_url pointing at a tree)
        let json = r#"[
            {"name": "vendored", "path": "docs/vendored",
             "sha": "abc", "type": "file", "download_url": null,
             "git_url": "https://api.github.com/repos/octo/lib/git/trees/abc"},
            {"name": "notes.md", "path": "docs/notes.md", "sha": "def", "type": "file",
             "download_url": "https://raw.githubusercontent.com/octo/demo/main/docs/notes.md"}
        ]"#;
        let body: ContentsResponse = serde_json::from_str(json).unwrap();
        let entries = into_entries(body, "").unwrap();

        assert_eq!(entries[0].path, "vendored");
        assert_eq!(entries[0].kind, EntryKind::Unsupported("submodule".into()));
        assert!(!entries[0].is_file());
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(
            entries[1].fetch_ref,
            "https://raw.githubusercontent.com/octo/demo/main/docs/notes.md"
        );
    }

    #[test]
    fn test_single_file_response_is_not_a_folder() {
        let json = r#"{"name": "a.txt", "path": "docs/a.txt", "sha": "1", "type": "file",
                       "download_url": "https://example.com/a.txt"}"#;
        let body: ContentsResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            into_entries(body, ""),
            Err(FetchError::Protocol(_))
        ));
    }

    #[test]
    fn test_classify_not_found_and_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, &headers, "u"),
            FetchError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, &headers, "u"),
            FetchError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &headers, "u"),
            FetchError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_classify_rate_limits() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &headers, "u"),
            FetchError::RateLimited { .. }
        ));

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers, "u"),
            FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn test_classify_server_errors_as_transient() {
        let err = classify_status(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "u");
        assert!(err.is_retryable());
    }
}
