//! Removal of earlier builds of the same version from the integration
//! repository, so a re-run never resolves stale artifacts.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::http::{Curl, HttpError};
use crate::version::Version;

/// Errors from build cleanup.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// A storage API request failed.
    #[error("cleanup request failed: {0}")]
    Http(#[from] HttpError),
}

/// Result alias for cleanup.
pub type CleanupResult<T> = Result<T, CleanupError>;

/// Removes artifacts of a version that was built before.
pub trait BuildCleaner {
    /// Delete every artifact of `version`. Returns the deleted paths.
    fn remove_existing(&self, version: &Version) -> CleanupResult<Vec<String>>;
}

/// [`BuildCleaner`] using the Artifactory storage API.
#[derive(Debug, Clone)]
pub struct ArtifactoryCleaner {
    repository: String,
    group_path: String,
    curl: Curl,
}

/// Where an Artifactory repository URL splits into API root and repo id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StorageLocation {
    /// `https://host/artifactory/api/storage/<repo>`
    api: String,
    /// `https://host/artifactory/<repo>`
    content: String,
}

impl ArtifactoryCleaner {
    /// Clean `group_path` (`org/scala-lang`) in `repository`.
    pub fn new(repository: impl Into<String>, group_path: impl Into<String>, curl: Curl) -> Self {
        Self {
            repository: repository.into(),
            group_path: group_path.into().trim_matches('/').to_string(),
            curl,
        }
    }
}

impl BuildCleaner for ArtifactoryCleaner {
    #[instrument(skip(self), fields(%version, repository = %self.repository))]
    fn remove_existing(&self, version: &Version) -> CleanupResult<Vec<String>> {
        let Some(location) = storage_location(&self.repository) else {
            warn!("integration repository is not Artifactory; skipping cleanup");
            return Ok(Vec::new());
        };
        let storage = ArtifactoryStorage {
            location: &location,
            curl: &self.curl,
        };
        let deleted = remove_version(&storage, &self.group_path, &version.to_string())?;
        info!(count = deleted.len(), "removed existing builds");
        Ok(deleted)
    }
}

/// Repository-relative listing and deletion.
trait Storage {
    /// Child entries of `path`; a missing folder has none.
    fn children(&self, path: &str) -> CleanupResult<Vec<Child>>;
    /// Delete `path` and everything below it.
    fn delete(&self, path: &str) -> CleanupResult<()>;
}

struct ArtifactoryStorage<'a> {
    location: &'a StorageLocation,
    curl: &'a Curl,
}

impl Storage for ArtifactoryStorage<'_> {
    fn children(&self, path: &str) -> CleanupResult<Vec<Child>> {
        match self.curl.get_json::<Folder>(&format!("{}/{path}", self.location.api)) {
            Ok(folder) => Ok(folder.children),
            Err(HttpError::Status { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, path: &str) -> CleanupResult<()> {
        Ok(self.curl.delete(&format!("{}/{path}", self.location.content))?)
    }
}

/// Walk two levels below `group` and delete every folder built for
/// `version`: plain version folders (`scala-library/2.12.0-M1`) and
/// cross-versioned artifact folders (`modules/scala-xml_2.12.0-M1`).
fn remove_version(storage: &dyn Storage, group: &str, version: &str) -> CleanupResult<Vec<String>> {
    let cross_suffix = format!("_{version}");
    let mut deleted = Vec::new();
    for parent in storage.children(group)?.into_iter().filter(|c| c.folder) {
        let parent = format!("{group}/{}", parent.name());
        for found in storage.children(&parent)? {
            let name = found.name();
            let built_for_version = name == version || name.ends_with(&cross_suffix);
            if !found.folder || !built_for_version {
                continue;
            }
            let path = format!("{parent}/{name}");
            debug!(%path, "deleting");
            storage.delete(&path)?;
            deleted.push(path);
        }
    }
    Ok(deleted)
}

#[derive(Debug, Deserialize)]
struct Folder {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Clone, Deserialize)]
struct Child {
    uri: String,
    #[serde(default)]
    folder: bool,
}

impl Child {
    fn name(&self) -> &str {
        self.uri.trim_start_matches('/')
    }
}

/// Split an Artifactory repository URL, or `None` for other servers.
fn storage_location(repository: &str) -> Option<StorageLocation> {
    const MARKER: &str = "/artifactory/";
    let at = repository.find(MARKER)?;
    let prefix = &repository[..at + MARKER.len()];
    let repo_id = repository[at + MARKER.len()..].trim_matches('/');
    if repo_id.is_empty() {
        return None;
    }
    Some(StorageLocation {
        api: format!("{prefix}api/storage/{repo_id}"),
        content: format!("{prefix}{repo_id}"),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// In-memory folder tree; deletions are recorded, not applied.
    #[derive(Default)]
    struct FakeStorage {
        folders: HashMap<String, Vec<Child>>,
        deleted: RefCell<Vec<String>>,
    }

    impl FakeStorage {
        fn folder(mut self, path: &str, children: &[&str]) -> Self {
            let children = children
                .iter()
                .map(|name| match name.strip_suffix('*') {
                    Some(file) => Child { uri: format!("/{file}"), folder: false },
                    None => Child { uri: format!("/{name}"), folder: true },
                })
                .collect();
            self.folders.insert(path.to_string(), children);
            self
        }
    }

    impl Storage for FakeStorage {
        fn children(&self, path: &str) -> CleanupResult<Vec<Child>> {
            Ok(self.folders.get(path).cloned().unwrap_or_default())
        }

        fn delete(&self, path: &str) -> CleanupResult<()> {
            self.deleted.borrow_mut().push(path.to_string());
            Ok(())
        }
    }

    fn scala_lang() -> FakeStorage {
        FakeStorage::default()
            .folder("org/scala-lang", &["scala-library", "scala-compiler", "modules", "maven-metadata.xml*"])
            .folder("org/scala-lang/scala-library", &["2.12.0-M1", "2.12.0-M2", "maven-metadata.xml*"])
            .folder("org/scala-lang/scala-compiler", &["2.12.0-M1"])
            .folder(
                "org/scala-lang/modules",
                &["scala-xml_2.12.0-M1", "scala-xml_2.11", "scala-swing_2.12.0-M1", "scala-xml_2.12.0-M10"],
            )
    }

    #[test]
    fn removes_version_and_cross_versioned_folders() {
        let storage = scala_lang();
        let deleted = remove_version(&storage, "org/scala-lang", "2.12.0-M1").unwrap();

        assert_eq!(
            deleted,
            vec![
                "org/scala-lang/scala-library/2.12.0-M1",
                "org/scala-lang/scala-compiler/2.12.0-M1",
                "org/scala-lang/modules/scala-xml_2.12.0-M1",
                "org/scala-lang/modules/scala-swing_2.12.0-M1",
            ]
        );
        assert_eq!(*storage.deleted.borrow(), deleted);
    }

    #[test]
    fn shared_binary_folders_survive_a_patch_release() {
        let storage = FakeStorage::default()
            .folder("org/scala-lang", &["scala-library", "modules"])
            .folder("org/scala-lang/scala-library", &["2.12.1", "2.12.11"])
            .folder("org/scala-lang/modules", &["scala-xml_2.12"]);

        let deleted = remove_version(&storage, "org/scala-lang", "2.12.1").unwrap();
        assert_eq!(deleted, vec!["org/scala-lang/scala-library/2.12.1"]);
    }

    #[test]
    fn empty_group_deletes_nothing() {
        let storage = FakeStorage::default();
        assert!(remove_version(&storage, "org/scala-lang", "2.12.1").unwrap().is_empty());
        assert!(storage.deleted.borrow().is_empty());
    }

    #[test]
    fn splits_artifactory_url() {
        let loc = storage_location("https://scala-ci.typesafe.com/artifactory/scala-integration/").unwrap();
        assert_eq!(
            loc,
            StorageLocation {
                api: "https://scala-ci.typesafe.com/artifactory/api/storage/scala-integration".into(),
                content: "https://scala-ci.typesafe.com/artifactory/scala-integration".into(),
            }
        );
    }

    #[test]
    fn non_artifactory_url_is_none() {
        assert_eq!(storage_location("https://repo1.maven.org/maven2/"), None);
        assert_eq!(storage_location("https://host/artifactory/"), None);
    }

    #[test]
    fn non_artifactory_cleanup_is_skipped() {
        let cleaner = ArtifactoryCleaner::new("https://repo.example/maven2", "org/scala-lang", Curl::default());
        let v = Version::from_parts("2.12.1", "").unwrap();
        assert!(cleaner.remove_existing(&v).unwrap().is_empty());
    }

    #[test]
    fn child_listing_parses() {
        let folder: Folder = serde_json::from_str(
            r#"{"repo":"scala-integration","path":"/org/scala-lang","children":[
                {"uri":"/scala-library","folder":true},
                {"uri":"/maven-metadata.xml","folder":false}]}"#,
        )
        .unwrap();
        let names: Vec<&str> = folder.children.iter().filter(|c| c.folder).map(Child::name).collect();
        assert_eq!(names, vec!["scala-library"]);
    }
}
