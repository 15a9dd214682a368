//! Environment-sourced runtime settings.
//!
//! Everything is optional: without a token the crate still mirrors and
//! clones public repositories, it just cannot authenticate pushes or API
//! calls. Settings are loaded once at process start and passed explicitly
//! into component constructors.

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

const CACHE_DIR_NAME: &str = "oca-mqt";

pub const DEFAULT_GITHUB_URL: &str = "https://github.com";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Settings shared by every component.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Access token, embedded in push URLs and API requests.
    pub github_token: Option<String>,
    /// Base URL repositories are cloned from.
    pub github_url: String,
    /// REST API root.
    pub github_api: String,
    /// Commit author identity, set as local config in each workspace.
    pub git_name: Option<String>,
    pub git_email: Option<String>,
    /// Root directory holding the bare mirrors.
    pub cache_dir: PathBuf,
}

impl BotConfig {
    /// Load settings from `BOTSYNC_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(RawConfig::load(None)?.into())
    }

    /// Host segment of the cache layout, derived from the clone base URL.
    pub fn host(&self) -> String {
        host_of(&self.github_url)
    }
}

impl From<RawConfig> for BotConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            github_token: raw.github.token,
            github_url: raw.github.url.unwrap_or_else(|| DEFAULT_GITHUB_URL.to_string()),
            github_api: raw.github.api.unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            git_name: raw.git.name,
            git_email: raw.git.email,
            cache_dir: raw.cache.dir.unwrap_or_else(default_cache_dir),
        }
    }
}

/// Platform cache directory plus the application name.
///
/// Resolves to `~/.cache/oca-mqt` on Linux and the equivalent on other
/// platforms.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(CACHE_DIR_NAME)
}

/// First authority-ish component of a URL, without scheme or path.
pub(crate) fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
        .to_string()
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    github: GithubSection,
    #[serde(default)]
    git: GitSection,
    #[serde(default)]
    cache: CacheSection,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GithubSection {
    token: Option<String>,
    url: Option<String>,
    api: Option<String>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitSection {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheSection {
    dir: Option<PathBuf>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("BOTSYNC")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let env = HashMap::from([]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(config, RawConfig::default());
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("BOTSYNC_GITHUB_TOKEN".to_owned(), "t0ken".to_owned()),
            ("BOTSYNC_GIT_NAME".to_owned(), "Sync Bot".to_owned()),
            ("BOTSYNC_GIT_EMAIL".to_owned(), "bot@example.com".to_owned()),
            ("BOTSYNC_CACHE_DIR".to_owned(), "/var/cache/bot".to_owned()),
        ]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                github: GithubSection {
                    token: Some("t0ken".to_owned()),
                    url: None,
                    api: None,
                },
                git: GitSection {
                    name: Some("Sync Bot".to_owned()),
                    email: Some("bot@example.com".to_owned()),
                },
                cache: CacheSection {
                    dir: Some("/var/cache/bot".into()),
                },
            }
        );
    }

    #[test]
    fn defaults_fill_in() {
        let config: BotConfig = RawConfig::default().into();
        assert_eq!(config.github_url, DEFAULT_GITHUB_URL);
        assert_eq!(config.github_api, DEFAULT_GITHUB_API);
        assert!(config.cache_dir.ends_with(CACHE_DIR_NAME));
        assert_eq!(config.host(), "github.com");
    }

    #[test]
    fn host_of_strips_scheme_and_path() {
        assert_eq!(host_of("https://github.com"), "github.com");
        assert_eq!(host_of("https://git.example.org/sub"), "git.example.org");
        assert_eq!(host_of("http://localhost:8080/x"), "localhost:8080");
    }
}
