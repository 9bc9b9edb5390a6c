//! In-memory collaborators for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use camino::Utf8Path;

use crate::artifacts::{ArtifactError, ArtifactResolver, ArtifactResult, Coordinates, CrossVersion};
use crate::build::{BuildError, BuildInvocation, BuildResult, BuildTool};
use crate::cleanup::{BuildCleaner, CleanupResult};
use crate::git::{GitError, GitResult, SourceControl, WorkingTree};
use crate::http::HttpError;
use crate::release::{ReleaseDecision, VersionRequest, select_release_version};
use crate::staging::{StagingApi, StagingRepo, StagingResult};
use crate::version::{Revision, Version};

/// A release decision taken through the explicit path.
pub fn explicit_decision(base: &str, suffix: &str) -> ReleaseDecision {
    let request = VersionRequest {
        base: Some(base.to_string()),
        suffix: (!suffix.is_empty()).then(|| suffix.to_string()),
        publish_override: None,
    };
    select_release_version(
        &request,
        Utf8Path::new("/unused"),
        &FakeScm::default(),
        &FakeBuild::default(),
    )
    .unwrap()
}

#[derive(Default)]
pub struct FakeScm {
    all_tags: bool,
    tags: BTreeSet<(String, String, String)>,
    describe: BTreeMap<String, String>,
    exact_tag: Option<String>,
    head: Option<String>,
    fetched: RefCell<Vec<(String, String, String)>>,
    describe_patterns: RefCell<Vec<Option<String>>>,
}

impl FakeScm {
    pub fn with_all_tags(mut self) -> Self {
        self.all_tags = true;
        self
    }

    pub fn with_tag(mut self, owner: &str, repo: &str, tag: &str) -> Self {
        self.tags.insert((owner.into(), repo.into(), tag.into()));
        self
    }

    /// `git describe` output for the checkout directory named `dir`.
    pub fn with_describe(mut self, dir: &str, described: &str) -> Self {
        self.describe.insert(dir.into(), described.into());
        self
    }

    pub fn with_exact_tag(mut self, tag: &str) -> Self {
        self.exact_tag = Some(tag.into());
        self
    }

    pub fn with_head(mut self, sha: &str) -> Self {
        self.head = Some(sha.into());
        self
    }

    /// `(owner/repo, revision, into)` for every fetch.
    pub fn fetched(&self) -> Vec<(String, String, String)> {
        self.fetched.borrow().clone()
    }

    pub fn describe_patterns(&self) -> Vec<Option<String>> {
        self.describe_patterns.borrow().clone()
    }
}

impl SourceControl for FakeScm {
    fn fetch(
        &self,
        owner: &str,
        repo: &str,
        revision: &Revision,
        into: &Utf8Path,
    ) -> GitResult<WorkingTree> {
        self.fetched.borrow_mut().push((
            format!("{owner}/{repo}"),
            revision.to_string(),
            into.to_string(),
        ));
        Ok(WorkingTree {
            path: into.to_path_buf(),
        })
    }

    fn describe(&self, tree: &WorkingTree, pattern: Option<&str>) -> GitResult<String> {
        self.describe_patterns
            .borrow_mut()
            .push(pattern.map(str::to_string));
        let dir = tree.path.file_name().unwrap_or_default();
        self.describe
            .get(dir)
            .cloned()
            .ok_or_else(|| GitError::NoTag(tree.path.to_string()))
    }

    fn exact_tag_at(&self, _root: &Utf8Path) -> GitResult<Option<String>> {
        Ok(self.exact_tag.clone())
    }

    fn head_commit(&self, _root: &Utf8Path) -> GitResult<Revision> {
        let sha = self
            .head
            .clone()
            .unwrap_or_else(|| "0123456789abcdef0123456789abcdef01234567".into());
        Ok(Revision::new(sha).unwrap())
    }

    fn remote_tag_exists(&self, owner: &str, repo: &str, tag: &str) -> GitResult<bool> {
        Ok(self.all_tags
            || self
                .tags
                .contains(&(owner.to_string(), repo.to_string(), tag.to_string())))
    }
}

#[derive(Default)]
pub struct FakeBuild {
    fail_in: Option<String>,
    invocations: RefCell<Vec<BuildInvocation>>,
}

impl FakeBuild {
    /// Fail any invocation whose directory ends with `dir`.
    pub fn failing_in(mut self, dir: &str) -> Self {
        self.fail_in = Some(dir.into());
        self
    }

    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.invocations.borrow().clone()
    }
}

impl BuildTool for FakeBuild {
    fn run(&self, invocation: &BuildInvocation) -> BuildResult<()> {
        self.invocations.borrow_mut().push(invocation.clone());
        if let Some(dir) = &self.fail_in
            && invocation.dir.as_str().ends_with(dir.as_str())
        {
            return Err(BuildError::Failed {
                tool: "fake".into(),
                dir: invocation.dir.clone(),
                exit_code: Some(1),
                stderr: "[error] Compilation failed".into(),
            });
        }
        Ok(())
    }

    fn dist_version_override(&self, version: &Version) -> String {
        format!("-Dproject.version={version}")
    }
}

#[derive(Default)]
pub struct FakeArtifacts {
    failing: bool,
    fail_after: Option<usize>,
    published: BTreeSet<(String, String)>,
    queries: RefCell<Vec<String>>,
}

impl FakeArtifacts {
    /// Mark `artifact_id` at `version` as published for any cross version.
    pub fn with_published(mut self, artifact_id: &str, version: &str) -> Self {
        self.published.insert((artifact_id.into(), version.into()));
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Answer the first `queries` lookups normally, then fail.
    pub fn failing_after(mut self, queries: usize) -> Self {
        self.fail_after = Some(queries);
        self
    }

    /// `<cross-versioned name>:<version>` for every query.
    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl ArtifactResolver for FakeArtifacts {
    fn resolves(&self, coordinates: &Coordinates, cross: &CrossVersion) -> ArtifactResult<bool> {
        self.queries.borrow_mut().push(format!(
            "{}:{}",
            cross.artifact_name(&coordinates.artifact_id),
            coordinates.version
        ));
        let exhausted = self
            .fail_after
            .is_some_and(|n| self.queries.borrow().len() > n);
        if self.failing || exhausted {
            return Err(ArtifactError::Query {
                repository: "https://repo.example/".into(),
                source: HttpError::MissingStatus("https://repo.example/".into()),
            });
        }
        Ok(self
            .published
            .contains(&(coordinates.artifact_id.clone(), coordinates.version.clone())))
    }
}

#[derive(Default)]
pub struct FakeStaging {
    open: RefCell<Vec<StagingRepo>>,
    closed: RefCell<Vec<Vec<String>>>,
    dropped: RefCell<Vec<Vec<String>>>,
}

impl FakeStaging {
    pub fn with_open(self, ids: &[&str]) -> Self {
        self.open.borrow_mut().extend(ids.iter().map(|id| StagingRepo {
            id: (*id).to_string(),
            uri: format!("https://staging.example/{id}"),
        }));
        self
    }

    /// Simulate a later upload opening another repository.
    pub fn open_another(&self, id: &str) {
        self.open.borrow_mut().push(StagingRepo {
            id: id.to_string(),
            uri: format!("https://staging.example/{id}"),
        });
    }

    pub fn closed(&self) -> Vec<Vec<String>> {
        self.closed.borrow().clone()
    }

    pub fn dropped(&self) -> Vec<Vec<String>> {
        self.dropped.borrow().clone()
    }
}

impl StagingApi for FakeStaging {
    fn list_open(&self, _profile: &str) -> StagingResult<Vec<StagingRepo>> {
        Ok(self.open.borrow().clone())
    }

    fn close(&self, ids: &[String], _message: &str) -> StagingResult<()> {
        self.open.borrow_mut().retain(|r| !ids.contains(&r.id));
        self.closed.borrow_mut().push(ids.to_vec());
        Ok(())
    }

    fn drop_repos(&self, ids: &[String], _message: &str) -> StagingResult<()> {
        self.open.borrow_mut().retain(|r| !ids.contains(&r.id));
        self.dropped.borrow_mut().push(ids.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCleaner {
    removed: RefCell<Vec<String>>,
}

impl FakeCleaner {
    /// Versions cleanup was requested for.
    pub fn removed(&self) -> Vec<String> {
        self.removed.borrow().clone()
    }
}

impl BuildCleaner for FakeCleaner {
    fn remove_existing(&self, version: &Version) -> CleanupResult<Vec<String>> {
        self.removed.borrow_mut().push(version.to_string());
        Ok(Vec::new())
    }
}
