//! Run configuration
//!
//! Layered configuration: defaults → optional TOML file → environment.
//!
//! Environment layers, lowest to highest precedence:
//! - `PACKAGE_SYNC_*` variables (e.g. `PACKAGE_SYNC_BASE_BRANCH`)
//! - the plain CI keys `TOKEN`, `USERNAME`, `EMAIL`, `CREATE_SYNC_BRANCH`,
//!   `BASE_BRANCH`, `MANIFEST_ROOT`
//! - GitHub Actions inputs (`INPUT_TOKEN`, `INPUT_BASE_BRANCH`, ...)
//!
//! `GITHUB_REPOSITORY`, `GITHUB_SERVER_URL` and `GITHUB_API_URL` populate the
//! source identity and endpoints when running inside Actions.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::git::{ConfigScope, PullStrategy};

/// Plain CI keys read without a prefix
const RAW_ENV_KEYS: &[&str] = &[
    "TOKEN",
    "USERNAME",
    "EMAIL",
    "CREATE_SYNC_BRANCH",
    "BASE_BRANCH",
    "MANIFEST_ROOT",
];

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential used for cloning, pushing and the review API
    pub token: Option<String>,

    /// Commit author name
    pub username: String,

    /// Commit author email
    pub email: String,

    /// Whether the author identity is written to each checkout or globally
    pub identity_scope: ConfigScope,

    /// Open a pull request from a dedicated sync branch (false pushes to the base branch)
    pub create_sync_branch: bool,

    /// Branch pull requests are opened against
    pub base_branch: String,

    /// How an already existing sync branch is updated from `origin`
    pub pull_strategy: PullStrategy,

    /// Manifest search root, relative to `source_dir` (default: the source root)
    pub manifest_root: Option<PathBuf>,

    /// Checkout of the source repository
    pub source_dir: PathBuf,

    /// Source repository as `owner/name`
    pub source_repository: Option<String>,

    /// Git host base URL
    pub server_url: String,

    /// Review API base URL
    pub api_url: String,

    /// Directory inside each target that receives mirrored packages
    pub packages_dir: PathBuf,

    /// Where target working copies are cloned (default: system temp dir)
    pub work_dir: Option<PathBuf>,

    /// Skip malformed manifest files instead of failing the run
    pub skip_invalid_manifests: bool,

    /// Drop repeated package paths declared for the same target
    pub dedupe_paths: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            username: "blockerabot".to_string(),
            email: "blockeraai+githubbot@gmail.com".to_string(),
            identity_scope: ConfigScope::Local,
            create_sync_branch: true,
            base_branch: "master".to_string(),
            pull_strategy: PullStrategy::Merge,
            manifest_root: None,
            source_dir: PathBuf::from("."),
            source_repository: None,
            server_url: "https://github.com".to_string(),
            api_url: "https://api.github.com".to_string(),
            packages_dir: PathBuf::from("packages"),
            work_dir: None,
            skip_invalid_manifests: false,
            dedupe_paths: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::LoadFailed(format!(
                    "config file not found: {}",
                    path.display()
                ))
                .into());
            }
            figment = figment.merge(Toml::file(path));
        }

        let figment = figment
            .merge(Env::prefixed("PACKAGE_SYNC_"))
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("INPUT_").only(RAW_ENV_KEYS))
            .merge(Env::raw().only(&["GITHUB_REPOSITORY"]).map(|_| "source_repository".into()))
            .merge(Env::raw().only(&["GITHUB_SERVER_URL"]).map(|_| "server_url".into()))
            .merge(Env::raw().only(&["GITHUB_API_URL"]).map(|_| "api_url".into()));

        Self::from_figment(figment)
    }

    /// Extract a configuration from an already-assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        Ok(config)
    }

    /// Ensure everything a full sync run needs is present
    pub fn validate_for_run(&self) -> Result<()> {
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => return Err(ConfigError::Missing("token").into()),
        }
        self.source_identity()?;
        if self.base_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "base_branch".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Split `source_repository` into `(owner, name)`
    pub fn source_identity(&self) -> Result<(String, String)> {
        let full = self
            .source_repository
            .as_deref()
            .ok_or(ConfigError::Missing("source_repository"))?;

        match full.trim().trim_end_matches(".git").split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok((owner.to_string(), name.to_string()))
            }
            _ => Err(ConfigError::InvalidValue {
                key: "source_repository".to_string(),
                reason: format!("expected 'owner/name', got '{}'", full),
            }
            .into()),
        }
    }

    /// Canonical clone URL of the source repository
    pub fn source_url(&self) -> Result<String> {
        let (owner, name) = self.source_identity()?;
        Ok(format!(
            "{}/{}/{}.git",
            self.server_url.trim_end_matches('/'),
            owner,
            name
        ))
    }

    /// Directory searched for manifest files
    pub fn manifest_search_root(&self) -> PathBuf {
        match &self.manifest_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => self.source_dir.join(root),
            None => self.source_dir.clone(),
        }
    }

    /// Parent directory for per-target working copies
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("package-sync"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Config::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::string(toml)),
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_branch, "master");
        assert!(config.create_sync_branch);
        assert_eq!(config.packages_dir, PathBuf::from("packages"));
        assert!(!config.skip_invalid_manifests);
        assert!(!config.dedupe_paths);
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let config = from_toml(
            r#"
            token = "abc"
            base_branch = "main"
            create_sync_branch = false
            source_repository = "org/app-one"
            "#,
        );
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.base_branch, "main");
        assert!(!config.create_sync_branch);
        assert_eq!(config.username, "blockerabot");
    }

    #[test]
    fn test_git_behavior_switches() {
        let config = Config::default();
        assert_eq!(config.identity_scope, ConfigScope::Local);
        assert_eq!(config.pull_strategy, PullStrategy::Merge);

        let config = from_toml(
            r#"
            identity_scope = "global"
            pull_strategy = "fast-forward-only"
            "#,
        );
        assert_eq!(config.identity_scope, ConfigScope::Global);
        assert_eq!(config.pull_strategy, PullStrategy::FastForwardOnly);

        let err = Config::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::string(r#"pull_strategy = "rebase""#)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("pull_strategy") || err.to_string().contains("rebase"));
    }

    #[test]
    fn test_source_identity_and_url() {
        let config = from_toml(r#"source_repository = "org/app-one""#);
        let (owner, name) = config.source_identity().unwrap();
        assert_eq!(owner, "org");
        assert_eq!(name, "app-one");
        assert_eq!(
            config.source_url().unwrap(),
            "https://github.com/org/app-one.git"
        );
    }

    #[test]
    fn test_source_identity_rejects_bare_name() {
        let config = from_toml(r#"source_repository = "app-one""#);
        assert!(config.source_identity().is_err());
    }

    #[test]
    fn test_validate_requires_token() {
        let config = from_toml(r#"source_repository = "org/app-one""#);
        let err = config.validate_for_run().unwrap_err();
        assert!(err.to_string().contains("token"));

        let config = from_toml(
            r#"
            token = "abc"
            source_repository = "org/app-one"
            "#,
        );
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_manifest_search_root() {
        let config = from_toml(
            r#"
            source_dir = "/src"
            manifest_root = "shared"
            "#,
        );
        assert_eq!(config.manifest_search_root(), PathBuf::from("/src/shared"));

        let config = from_toml(r#"source_dir = "/src""#);
        assert_eq!(config.manifest_search_root(), PathBuf::from("/src"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("base_branch"));
        assert!(toml.contains("master"));
    }
}
