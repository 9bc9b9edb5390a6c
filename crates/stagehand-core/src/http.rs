//! HTTP requests via `curl`.
//!
//! Like git, HTTP is shelled out so that the user's netrc, proxy settings
//! and CA bundle apply unchanged. Every request appends the status code to
//! stdout with `-w`, so callers see the status even for error responses.

use std::process::Command;

use camino::Utf8PathBuf;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from HTTP requests.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Failed to execute `curl`.
    #[error("failed to run curl: {0}")]
    Exec(#[from] std::io::Error),

    /// `curl` itself failed (DNS, TLS, connection refused, ...).
    #[error("curl {method} {url} failed: {stderr}")]
    Command {
        /// HTTP method.
        method: &'static str,
        /// Request URL.
        url: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The server answered with an unexpected status.
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        /// HTTP method.
        method: &'static str,
        /// Request URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The response body was not the expected JSON.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Request URL.
        url: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// `curl` output did not end with a status code.
    #[error("could not read HTTP status for {0}")]
    MissingStatus(String),
}

/// Result alias for HTTP requests.
pub type HttpResult<T> = Result<T, HttpError>;

/// Status code and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl Response {
    /// Whether the status is 2xx.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// A `curl` client.
#[derive(Debug, Clone, Default)]
pub struct Curl {
    netrc: Option<Utf8PathBuf>,
}

impl Curl {
    /// Create a client. Credentials come from `netrc` when given,
    /// otherwise from `~/.netrc` if present.
    pub const fn new(netrc: Option<Utf8PathBuf>) -> Self {
        Self { netrc }
    }

    /// `HEAD` request; returns the status code.
    #[instrument(skip(self))]
    pub fn head(&self, url: &str) -> HttpResult<u16> {
        Ok(self.request("HEAD", url, None)?.status)
    }

    /// `GET` a JSON document.
    #[instrument(skip(self))]
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> HttpResult<T> {
        let response = self.expect_success("GET", url, None)?;
        serde_json::from_str(&response.body).map_err(|source| HttpError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// `POST` a JSON document, discarding the response body.
    #[instrument(skip(self, body))]
    pub fn post_json<B: Serialize>(&self, url: &str, body: &B) -> HttpResult<()> {
        let payload = serde_json::to_string(body).map_err(|source| HttpError::Decode {
            url: url.to_string(),
            source,
        })?;
        self.expect_success("POST", url, Some(&payload))?;
        Ok(())
    }

    /// `DELETE` a resource.
    #[instrument(skip(self))]
    pub fn delete(&self, url: &str) -> HttpResult<()> {
        self.expect_success("DELETE", url, None)?;
        Ok(())
    }

    fn expect_success(
        &self,
        method: &'static str,
        url: &str,
        body: Option<&str>,
    ) -> HttpResult<Response> {
        let response = self.request(method, url, body)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(HttpError::Status {
                method,
                url: url.to_string(),
                status: response.status,
            })
        }
    }

    fn request(&self, method: &'static str, url: &str, body: Option<&str>) -> HttpResult<Response> {
        let args = self.arguments(method, url, body);
        debug!(method, url, "curl");

        let output = Command::new("curl").args(&args).output()?;
        if !output.status.success() {
            return Err(HttpError::Command {
                method,
                url: url.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (status, body) =
            split_status(&stdout).ok_or_else(|| HttpError::MissingStatus(url.to_string()))?;
        debug!(status, "response");
        Ok(Response {
            status,
            body: body.to_string(),
        })
    }

    #[expect(clippy::literal_string_with_formatting_args)]
    fn arguments(&self, method: &str, url: &str, body: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = vec!["--silent".into(), "--show-error".into(), "--location".into()];
        match &self.netrc {
            Some(path) => {
                args.push("--netrc-file".into());
                args.push(path.to_string());
            }
            None => args.push("--netrc-optional".into()),
        }
        if method == "HEAD" {
            args.push("--head".into());
            args.push("--output".into());
            args.push("/dev/null".into());
        } else {
            args.push("--request".into());
            args.push(method.into());
            args.push("--header".into());
            args.push("Accept: application/json".into());
        }
        if let Some(body) = body {
            args.push("--header".into());
            args.push("Content-Type: application/json".into());
            args.push("--data-binary".into());
            args.push(body.into());
        }
        args.push("--write-out".into());
        args.push("\n%{http_code}".into());
        args.push(url.into());
        args
    }
}

/// Split `curl` output into the trailing status code and the body before it.
fn split_status(output: &str) -> Option<(u16, &str)> {
    let (body, code) = output.rsplit_once('\n')?;
    Some((code.trim().parse().ok()?, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_body_and_status() {
        assert_eq!(split_status("{\"data\":[]}\n200"), Some((200, "{\"data\":[]}")));
        assert_eq!(split_status("\n404"), Some((404, "")));
        assert_eq!(split_status("a\nb\n201"), Some((201, "a\nb")));
    }

    #[test]
    fn split_rejects_missing_status() {
        assert_eq!(split_status("no status"), None);
        assert_eq!(split_status("body\nnot-a-code"), None);
    }

    #[test]
    fn head_arguments_discard_body() {
        let args = Curl::default().arguments("HEAD", "https://repo/x.pom", None);
        assert!(args.contains(&"--head".to_string()));
        assert!(args.contains(&"--netrc-optional".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://repo/x.pom"));
    }

    #[test]
    fn post_arguments_carry_body_and_netrc() {
        let curl = Curl::new(Some("/secrets/netrc".into()));
        let args = curl.arguments("POST", "https://staging/bulk/close", Some("{}"));
        let joined = args.join(" ");
        assert!(joined.contains("--netrc-file /secrets/netrc"));
        assert!(joined.contains("--request POST"));
        assert!(joined.contains("--data-binary {}"));
        assert!(joined.contains("Content-Type: application/json"));
    }

    #[test]
    fn response_success_range() {
        let ok = Response { status: 204, body: String::new() };
        let missing = Response { status: 404, body: String::new() };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
