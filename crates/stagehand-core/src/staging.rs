//! Public staging repositories.
//!
//! Signed publishing opens staging repositories on the release system.
//! The run closes them once everything is uploaded; an operator can also
//! list, close or drop them by hand.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::http::{Curl, HttpError};

/// Errors from the staging API.
#[derive(Error, Debug)]
pub enum StagingError {
    /// The staging API request failed.
    #[error("staging API request failed: {0}")]
    Http(#[from] HttpError),
}

/// Result alias for staging operations.
pub type StagingResult<T> = Result<T, StagingError>;

/// An open staging repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingRepo {
    /// Repository id (`orgscala-lang-1234`).
    pub id: String,
    /// Repository URI.
    pub uri: String,
}

/// Staging operations.
pub trait StagingApi {
    /// Open staging repositories belonging to `profile`.
    fn list_open(&self, profile: &str) -> StagingResult<Vec<StagingRepo>>;

    /// Close the given repositories.
    fn close(&self, ids: &[String], message: &str) -> StagingResult<()>;

    /// Drop the given repositories.
    fn drop_repos(&self, ids: &[String], message: &str) -> StagingResult<()>;
}

/// [`StagingApi`] over the Nexus staging REST API.
#[derive(Debug, Clone)]
pub struct NexusStaging {
    base_url: String,
    curl: Curl,
}

impl NexusStaging {
    /// Talk to the API rooted at `base_url` (`.../service/local`).
    pub fn new(base_url: impl Into<String>, curl: Curl) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            curl,
        }
    }

    fn bulk(&self, action: &str, ids: &[String], message: &str) -> StagingResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = BulkRequest {
            data: BulkData {
                description: message,
                staged_repository_ids: ids,
            },
        };
        let url = format!("{}/staging/bulk/{action}", self.base_url);
        self.curl.post_json(&url, &body)?;
        info!(action, count = ids.len(), "staging repositories updated");
        Ok(())
    }
}

impl StagingApi for NexusStaging {
    #[instrument(skip(self))]
    fn list_open(&self, profile: &str) -> StagingResult<Vec<StagingRepo>> {
        let url = format!("{}/staging/profile_repositories", self.base_url);
        let listing: ProfileRepositories = self.curl.get_json(&url)?;
        Ok(open_for_profile(listing, profile))
    }

    #[instrument(skip(self))]
    fn close(&self, ids: &[String], message: &str) -> StagingResult<()> {
        self.bulk("close", ids, message)
    }

    #[instrument(skip(self))]
    fn drop_repos(&self, ids: &[String], message: &str) -> StagingResult<()> {
        self.bulk("drop", ids, message)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRepositories {
    #[serde(default)]
    data: Vec<ProfileRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRepository {
    profile_name: String,
    #[serde(rename = "type")]
    state: String,
    repository_id: String,
    #[serde(rename = "repositoryURI", default)]
    repository_uri: String,
}

#[derive(Debug, Serialize)]
struct BulkRequest<'a> {
    data: BulkData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkData<'a> {
    description: &'a str,
    staged_repository_ids: &'a [String],
}

fn open_for_profile(listing: ProfileRepositories, profile: &str) -> Vec<StagingRepo> {
    listing
        .data
        .into_iter()
        .filter(|r| r.profile_name == profile && r.state == "open")
        .map(|r| StagingRepo {
            id: r.repository_id,
            uri: r.repository_uri,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "data": [
            {"profileName": "org.scala-lang", "type": "open", "repositoryId": "orgscala-lang-1201",
             "repositoryURI": "https://oss.sonatype.org/content/repositories/orgscala-lang-1201"},
            {"profileName": "org.scala-lang", "type": "closed", "repositoryId": "orgscala-lang-1199",
             "repositoryURI": "https://oss.sonatype.org/content/repositories/orgscala-lang-1199"},
            {"profileName": "org.example", "type": "open", "repositoryId": "orgexample-7",
             "repositoryURI": "https://oss.sonatype.org/content/repositories/orgexample-7"}
        ]
    }"#;

    #[test]
    fn filters_open_repositories_of_profile() {
        let listing: ProfileRepositories = serde_json::from_str(LISTING).unwrap();
        let open = open_for_profile(listing, "org.scala-lang");
        assert_eq!(
            open,
            vec![StagingRepo {
                id: "orgscala-lang-1201".into(),
                uri: "https://oss.sonatype.org/content/repositories/orgscala-lang-1201".into(),
            }]
        );
    }

    #[test]
    fn empty_listing_has_no_data_key() {
        let listing: ProfileRepositories = serde_json::from_str("{}").unwrap();
        assert!(open_for_profile(listing, "org.scala-lang").is_empty());
    }

    #[test]
    fn bulk_request_shape() {
        let ids = vec!["orgscala-lang-1201".to_string()];
        let body = BulkRequest {
            data: BulkData {
                description: "Scala 2.12.1",
                staged_repository_ids: &ids,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "data": {
                    "description": "Scala 2.12.1",
                    "stagedRepositoryIds": ["orgscala-lang-1201"]
                }
            })
        );
    }

    #[test]
    fn bulk_with_no_ids_is_a_no_op() {
        let staging = NexusStaging::new("http://127.0.0.1:9/service/local/", Curl::default());
        assert_eq!(staging.base_url, "http://127.0.0.1:9/service/local");
        assert!(staging.close(&[], "nothing").is_ok());
    }
}
