//! GitHub REST client with rate-limit aware call wrapping.
//!
//! Every request goes through [`gh_call`], which turns an exhausted API
//! quota into a scheduler-visible [`RetrySignal`](crate::RetrySignal)
//! carrying the reset time. Any other rejection, including a genuine
//! authorization failure, propagates unchanged.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::config::BotConfig;
use crate::error::{Error, Result, RetrySignal};
use crate::git::RepoId;

const USER_AGENT: &str = concat!("botsync/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wrap a call into the GitHub API, intercepting rate-limit rejections.
///
/// A 403 whose `X-RateLimit-Remaining` header is present and zero becomes
/// [`Error::Retry`] with `not_before` taken from `X-RateLimit-Reset`;
/// everything else is re-raised unchanged.
pub fn gh_call<T>(call: impl FnOnce() -> std::result::Result<T, ureq::Error>) -> Result<T> {
    match call() {
        Ok(value) => Ok(value),
        Err(ureq::Error::Status(403, response)) => {
            if header_u64(&response, "X-RateLimit-Remaining") == Some(0) {
                let reset = header_u64(&response, "X-RateLimit-Reset");
                let mut signal = RetrySignal::new("github api rate limit exhausted")
                    .with_cause(ureq::Error::Status(403, response));
                if let Some(reset) = reset {
                    signal = signal.with_not_before(reset);
                }
                Err(Error::Retry(signal))
            } else {
                Err(ureq::Error::Status(403, response).into())
            }
        }
        Err(error) => Err(error.into()),
    }
}

fn header_u64(response: &ureq::Response, name: &str) -> Option<u64> {
    response.header(name).and_then(|value| value.parse().ok())
}

/// A repository collaborator as reported by the API.
#[derive(Debug, Deserialize)]
pub struct Collaborator {
    pub login: String,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Default, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub pull: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub admin: bool,
}

/// Minimal GitHub REST client.
pub struct GithubClient {
    agent: ureq::Agent,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.github_api.clone(), config.github_token.clone())
    }

    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            agent: ureq::builder().timeout(REQUEST_TIMEOUT).build(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ureq::Response> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .agent
            .get(&url)
            .set("User-Agent", USER_AGENT)
            .set("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("token {token}"));
        }
        for (key, value) in query {
            request = request.query(key, value);
        }
        gh_call(|| request.call())
    }

    /// All collaborators of a repository, following pagination.
    pub fn collaborators(&self, id: &RepoId) -> Result<Vec<Collaborator>> {
        let path = format!("/repos/{}/{}/collaborators", id.org(), id.repo());
        let per_page = PER_PAGE.to_string();
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let page_param = page.to_string();
            let response = self.get(&path, &[("per_page", &per_page), ("page", &page_param)])?;
            let batch: Vec<Collaborator> = serde_json::from_reader(response.into_reader())
                .map_err(|error| Error::Io(error.into()))?;
            let full_page = batch.len() == PER_PAGE;
            all.extend(batch);
            if !full_page {
                break;
            }
            page += 1;
        }
        debug!("{} collaborators on {id}", all.len());
        Ok(all)
    }

    /// Whether `username` has push rights on the repository.
    ///
    /// Login matching is exact (the forge treats logins as canonical); an
    /// unknown user is a normal `false`, not an error.
    pub fn can_push(&self, id: &RepoId, username: &str) -> Result<bool> {
        Ok(self
            .collaborators(id)?
            .iter()
            .any(|c| c.login == username && c.permissions.push))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve the same canned HTTP response to every connection on a
    /// loopback port, returning the base URL.
    fn serve(
        status_line: &'static str,
        headers: &'static [(&'static str, &'static str)],
        body: &'static str,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let mut response = format!("HTTP/1.1 {status_line}\r\n");
                for (name, value) in headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                ));
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    fn test_id() -> RepoId {
        RepoId::new("acme", "widgets")
    }

    #[test]
    fn exhausted_rate_limit_becomes_retry_signal() {
        let url = serve(
            "403 Forbidden",
            &[
                ("X-RateLimit-Remaining", "0"),
                ("X-RateLimit-Reset", "1700000009"),
            ],
            "{\"message\":\"API rate limit exceeded\"}",
        );
        let client = GithubClient::new(url, None);
        match client.collaborators(&test_id()).unwrap_err() {
            Error::Retry(signal) => assert_eq!(signal.not_before(), Some(1_700_000_009)),
            other => panic!("expected Retry, got {other:?}"),
        }
    }

    #[test]
    fn forbidden_with_quota_left_is_fatal() {
        let url = serve(
            "403 Forbidden",
            &[("X-RateLimit-Remaining", "5")],
            "{\"message\":\"Must have admin rights\"}",
        );
        let client = GithubClient::new(url, None);
        assert!(matches!(
            client.collaborators(&test_id()).unwrap_err(),
            Error::Api(_)
        ));
    }

    #[test]
    fn forbidden_without_rate_limit_headers_is_fatal() {
        let url = serve("403 Forbidden", &[], "{\"message\":\"nope\"}");
        let client = GithubClient::new(url, None);
        assert!(matches!(
            client.collaborators(&test_id()).unwrap_err(),
            Error::Api(_)
        ));
    }

    #[test]
    fn can_push_requires_exact_login_and_push_permission() {
        let url = serve(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"[
                {"login": "alice", "permissions": {"pull": true, "push": true, "admin": false}},
                {"login": "bob", "permissions": {"pull": true, "push": false, "admin": false}}
            ]"#,
        );
        let client = GithubClient::new(url, None);
        let id = test_id();
        assert!(client.can_push(&id, "alice").unwrap());
        assert!(!client.can_push(&id, "bob").unwrap());
        assert!(!client.can_push(&id, "Alice").unwrap());
        assert!(!client.can_push(&id, "mallory").unwrap());
    }

    #[test]
    fn collaborators_tolerates_missing_permissions() {
        let url = serve(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"[{"login": "carol"}]"#,
        );
        let client = GithubClient::new(url, None);
        let collaborators = client.collaborators(&test_id()).unwrap();
        assert_eq!(collaborators.len(), 1);
        assert!(!collaborators[0].permissions.push);
    }
}
