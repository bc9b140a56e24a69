//! Environment and CI/CD context capture.
//!
//! A fresh [`Environment`] snapshot is taken for every log call. CI/CD
//! details are read from GitHub Actions or GitLab CI variables, and only
//! when the `CI` flag is set.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::traits::Clock;
use crate::types::{CiCdContext, Environment};

/// Variable that marks a CI run.
pub const CI_FLAG: &str = "CI";

/// Pipeline id variables, first match wins.
pub const PIPELINE_ID_VARS: [&str; 2] = ["GITHUB_RUN_ID", "CI_PIPELINE_ID"];
/// Branch variables, first match wins.
pub const BRANCH_VARS: [&str; 2] = ["GITHUB_REF_NAME", "CI_COMMIT_REF_NAME"];
/// Commit SHA variables, first match wins.
pub const COMMIT_VARS: [&str; 2] = ["GITHUB_SHA", "CI_COMMIT_SHA"];
/// Job id variables, first match wins.
pub const JOB_ID_VARS: [&str; 2] = ["GITHUB_JOB", "CI_JOB_ID"];

/// Dependency versions recorded in every snapshot.
///
/// Maintained by hand alongside the manifest.
pub const TRACKED_DEPENDENCIES: &[(&str, &str)] = &[
    ("devlog", env!("CARGO_PKG_VERSION")),
    ("chrono", "0.4"),
    ("parking_lot", "0.12"),
    ("serde", "1.0"),
    ("serde_json", "1.0"),
    ("tokio", "1.43"),
    ("tracing", "0.1"),
    ("uuid", "1.11"),
];

/// Read access to environment variables.
pub trait EnvLookup: Send + Sync {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Captures [`Environment`] snapshots.
pub struct EnvironmentCollector {
    lookup: Arc<dyn EnvLookup>,
    clock: Arc<dyn Clock>,
    dependencies: BTreeMap<String, String>,
}

impl EnvironmentCollector {
    /// Creates a collector over the given variable source and clock.
    #[must_use]
    pub fn new(lookup: Arc<dyn EnvLookup>, clock: Arc<dyn Clock>) -> Self {
        let dependencies = TRACKED_DEPENDENCIES
            .iter()
            .map(|(name, version)| ((*name).to_string(), (*version).to_string()))
            .collect();
        Self {
            lookup,
            clock,
            dependencies,
        }
    }

    /// Adds or overrides tracked dependency versions.
    #[must_use]
    pub fn with_dependencies(mut self, extra: &BTreeMap<String, String>) -> Self {
        self.dependencies
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Takes a snapshot of the current environment.
    #[must_use]
    pub fn capture(&self) -> Environment {
        Environment {
            runtime_version: runtime_version(),
            dependencies: self.dependencies.clone(),
            os: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            captured_at: self.clock.now(),
            ci_cd: self.ci_context(),
        }
    }

    /// Returns the CI/CD context if the CI flag is set.
    #[must_use]
    pub fn ci_context(&self) -> Option<CiCdContext> {
        if !self.is_ci() {
            return None;
        }
        Some(CiCdContext {
            pipeline_id: self.first_of(&PIPELINE_ID_VARS),
            branch: self.first_of(&BRANCH_VARS),
            commit_sha: self.first_of(&COMMIT_VARS),
            job_id: self.first_of(&JOB_ID_VARS),
        })
    }

    /// Returns true when running inside a CI pipeline.
    #[must_use]
    pub fn is_ci(&self) -> bool {
        self.lookup
            .var(CI_FLAG)
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.lookup.var(key))
            .find(|value| !value.is_empty())
    }
}

fn runtime_version() -> String {
    let rust = option_env!("CARGO_PKG_RUST_VERSION")
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown");
    format!("rust {rust}")
}
