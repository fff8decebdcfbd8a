use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Header Miniflux reads the API token from
pub const AUTH_HEADER: &str = "X-Auth-Token";

const DEFAULT_CONFIG_FILE: &str = "config.yml";
const ENV_URL: &str = "MINIFLUX_URL";
const ENV_API_TOKEN: &str = "MINIFLUX_API_TOKEN";

/// Validated configuration, built once per run and passed by reference
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Miniflux base URL as configured
    pub url: String,
    pub api_token: String,
    pub categories: Option<Vec<CategoryRule>>,
    pub feeds: Option<Vec<FeedRule>>,
    pub http: HttpConfig,
}

/// Shape of the YAML file before validation
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    api_token: Option<String>,
    #[serde(default)]
    categories: Option<Vec<CategoryRule>>,
    #[serde(default)]
    feeds: Option<Vec<FeedRule>>,
    #[serde(default)]
    http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    pub category: Target,
    #[serde(deserialize_with = "expiry_string")]
    pub expiry: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedRule {
    #[serde(alias = "category")]
    pub feed: Target,
    #[serde(deserialize_with = "expiry_string")]
    pub expiry: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Entries requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Entry ids sent per mark-as-read call
    #[serde(default = "default_mark_batch_size")]
    pub mark_batch_size: usize,
    /// Proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            mark_batch_size: default_mark_batch_size(),
            proxy_url: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_mark_batch_size() -> usize {
    500
}

/// A category or feed, named either by numeric id or by title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(i64),
    Title(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Id(id) => write!(f, "{}", id),
            Target::Title(title) => f.write_str(title),
        }
    }
}

// YAML gives us either an integer or a string; numeric strings count as ids
impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct TargetVisitor;

        impl<'de> Visitor<'de> for TargetVisitor {
            type Value = Target;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a numeric id or a title")
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Target, E>
            where
                E: de::Error,
            {
                Ok(Target::Id(value))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Target, E>
            where
                E: de::Error,
            {
                i64::try_from(value)
                    .map(Target::Id)
                    .map_err(|_| E::custom(format!("id {} out of range", value)))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Target, E>
            where
                E: de::Error,
            {
                let value = value.trim();
                if value.is_empty() {
                    return Err(E::custom("empty category/feed name"));
                }
                Ok(match value.parse::<i64>() {
                    Ok(id) => Target::Id(id),
                    Err(_) => Target::Title(value.to_string()),
                })
            }
        }

        deserializer.deserialize_any(TargetVisitor)
    }
}

// `expiry: 3600` arrives as a YAML number
fn expiry_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct ExpiryVisitor;

    impl<'de> Visitor<'de> for ExpiryVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration such as \"30d\" or a number of seconds")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> std::result::Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(ExpiryVisitor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Category,
    Feed,
}

impl TargetKind {
    /// Path segment used by the REST API
    pub fn path_segment(self) -> &'static str {
        match self {
            TargetKind::Category => "categories",
            TargetKind::Feed => "feeds",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetKind::Category => "category",
            TargetKind::Feed => "feed",
        }
    }
}

/// One configured (target, expiry) pair, flattened from `categories` and `feeds`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRule {
    pub kind: TargetKind,
    pub target: Target,
    pub expiry: String,
}

impl fmt::Display for ExpiryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.kind.label(), self.target, self.expiry)
    }
}

impl AppConfig {
    /// Load, override from the environment, and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub(crate) fn load_with_env<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path, env)
    }

    fn parse<F>(content: &str, path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file: ConfigFile =
            serde_yaml::from_str(content).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        apply_env_overrides(&mut file, env);

        tracing::debug!(
            path = %path.display(),
            url = file.url.as_deref().unwrap_or(""),
            categories = file.categories.as_ref().map(Vec::len),
            feeds = file.feeds.as_ref().map(Vec::len),
            timeout_secs = file.http.timeout_secs,
            "Parsed config file"
        );

        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self> {
        let api_token = match file.api_token {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => {
                return Err(Error::InvalidConfig(
                    "Miniflux API token not set in config".to_string(),
                ))
            }
        };

        let url = match file.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => {
                return Err(Error::InvalidConfig(
                    "Miniflux URL not set in config".to_string(),
                ))
            }
        };

        let parsed = Url::parse(&url)
            .map_err(|e| Error::InvalidConfig(format!("Miniflux URL '{}' is invalid: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "Miniflux URL '{}' must use http or https",
                url
            )));
        }

        HeaderValue::from_str(&api_token).map_err(|_| {
            Error::InvalidConfig("Miniflux API token contains invalid characters".to_string())
        })?;

        if file.http.page_size == 0 || file.http.mark_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "http.page_size and http.mark_batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            url,
            api_token,
            categories: file.categories,
            feeds: file.feeds,
            http: file.http,
        })
    }

    /// Base URL for API requests, without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Authentication headers sent with every request
    pub fn auth_headers(&self) -> Result<HeaderMap> {
        let mut value = HeaderValue::from_str(&self.api_token).map_err(|_| {
            Error::InvalidConfig("Miniflux API token contains invalid characters".to_string())
        })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, value);
        Ok(headers)
    }

    /// All configured rules, categories first, in file order
    pub fn rules(&self) -> Result<Vec<ExpiryRule>> {
        if self.categories.is_none() && self.feeds.is_none() {
            return Err(Error::NoSweepTargets);
        }

        let categories = self.categories.iter().flatten().map(|rule| ExpiryRule {
            kind: TargetKind::Category,
            target: rule.category.clone(),
            expiry: rule.expiry.clone(),
        });
        let feeds = self.feeds.iter().flatten().map(|rule| ExpiryRule {
            kind: TargetKind::Feed,
            target: rule.feed.clone(),
            expiry: rule.expiry.clone(),
        });

        Ok(categories.chain(feeds).collect())
    }

    /// Pick the config file: explicit path, then `./config.yml`, then
    /// `~/.config/miniflush/config.yml`
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        Self::resolve_path_in(explicit, Path::new("."), dirs::home_dir().as_deref())
    }

    pub(crate) fn resolve_path_in(
        explicit: Option<&Path>,
        cwd: &Path,
        home: Option<&Path>,
    ) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let local = cwd.join(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }

        match home {
            Some(home) => {
                let user = home.join(".config").join("miniflush").join(DEFAULT_CONFIG_FILE);
                if user.exists() {
                    user
                } else {
                    local
                }
            }
            None => local,
        }
    }
}

fn apply_env_overrides<F>(file: &mut ConfigFile, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env(ENV_URL).filter(|v| !v.is_empty()) {
        tracing::debug!("Using {} from environment", ENV_URL);
        file.url = Some(url);
    }

    if let Some(token) = env(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
        tracing::debug!("Using {} from environment", ENV_API_TOKEN);
        file.api_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(content: &str) -> Result<AppConfig> {
        AppConfig::parse(content, Path::new("config.yml"), no_env)
    }

    #[test]
    fn test_base_url_and_headers_from_fields() {
        let config = parse(
            "url: https://reader.example.com/\napi_token: secret\ncategories:\n  - category: 3\n    expiry: 30d\n",
        )
        .unwrap();

        assert_eq!(config.base_url(), "https://reader.example.com");
        let headers = config.auth_headers().unwrap();
        assert_eq!(headers.get(AUTH_HEADER).unwrap().to_str().unwrap(), "secret");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.page_size, 100);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = parse("url: https://reader.example.com\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("API token")));
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let err = parse("url: \"\"\napi_token: secret\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("URL not set")));

        let err = parse("url:\napi_token: secret\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_token_checked_before_url() {
        let err = parse("categories: []\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("API token")));
    }

    #[test]
    fn test_non_http_url_is_rejected() {
        let err = parse("url: ftp://reader.example.com\napi_token: secret\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("http")));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse("url: [unclosed\napi_token: x\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("miniflush-does-not-exist").join("config.yml");
        let err = AppConfig::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("miniflush-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");
        std::fs::write(
            &path,
            "url: http://localhost:8080\napi_token: abc\nfeeds:\n  - feed: 17\n    expiry: 1 day\n",
        )
        .unwrap();

        let config = AppConfig::load_with_env(&path, no_env).unwrap();
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert!(config.categories.is_none());
        assert_eq!(config.feeds.as_ref().unwrap()[0].feed, Target::Id(17));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env = |key: &str| match key {
            "MINIFLUX_URL" => Some("https://override.example.com".to_string()),
            "MINIFLUX_API_TOKEN" => Some("from-env".to_string()),
            _ => None,
        };
        let config = AppConfig::parse("categories: []\n", Path::new("config.yml"), env).unwrap();
        assert_eq!(config.base_url(), "https://override.example.com");
        assert_eq!(config.api_token, "from-env");
    }

    #[test]
    fn test_targets_accept_ids_and_titles() {
        let config = parse(
            r#"
url: https://reader.example.com
api_token: secret
categories:
  - category: 3
    expiry: 30d
  - category: "12"
    expiry: 1w
  - category: News
    expiry: 2 weeks
feeds:
  - category: 40
    expiry: 1 day
"#,
        )
        .unwrap();

        let rules = config.rules().unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].target, Target::Id(3));
        assert_eq!(rules[1].target, Target::Id(12));
        assert_eq!(rules[2].target, Target::Title("News".to_string()));
        assert_eq!(rules[2].expiry, "2 weeks");
        assert_eq!(rules[3].kind, TargetKind::Feed);
        assert_eq!(rules[3].target, Target::Id(40));
    }

    #[test]
    fn test_numeric_expiry_is_seconds_string() {
        let config = parse(
            "url: https://reader.example.com\napi_token: secret\ncategories:\n  - category: 1\n    expiry: 3600\n",
        )
        .unwrap();
        assert_eq!(config.rules().unwrap()[0].expiry, "3600");
    }

    #[test]
    fn test_rules_require_categories_or_feeds() {
        let config = parse("url: https://reader.example.com\napi_token: secret\n").unwrap();
        assert!(matches!(config.rules(), Err(Error::NoSweepTargets)));

        let config =
            parse("url: https://reader.example.com\napi_token: secret\ncategories: []\n").unwrap();
        assert!(config.rules().unwrap().is_empty());
    }

    #[test]
    fn test_http_overrides() {
        let config = parse(
            "url: https://reader.example.com\napi_token: secret\nhttp:\n  timeout_secs: 5\n  page_size: 20\n",
        )
        .unwrap();
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.page_size, 20);
        assert_eq!(config.http.max_retries, 3);

        let err = parse("url: https://reader.example.com\napi_token: secret\nhttp:\n  page_size: 0\n")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/etc/miniflush.yml");
        assert_eq!(AppConfig::resolve_path(Some(path)), PathBuf::from("/etc/miniflush.yml"));
    }

    #[test]
    fn test_path_falls_back_to_cwd_then_home() {
        let root = std::env::temp_dir().join(format!("miniflush-resolve-{}", std::process::id()));
        let cwd = root.join("work");
        let home = root.join("home");
        let user_dir = home.join(".config").join("miniflush");
        std::fs::create_dir_all(&cwd).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        let local = cwd.join("config.yml");
        let user = user_dir.join("config.yml");

        // neither exists: the local path is reported
        assert_eq!(AppConfig::resolve_path_in(None, &cwd, Some(&home)), local);
        assert_eq!(AppConfig::resolve_path_in(None, &cwd, None), local);

        std::fs::write(&user, "url: http://localhost
").unwrap();
        assert_eq!(AppConfig::resolve_path_in(None, &cwd, Some(&home)), user);

        std::fs::write(&local, "url: http://localhost
").unwrap();
        assert_eq!(AppConfig::resolve_path_in(None, &cwd, Some(&home)), local);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_url_and_token_are_trimmed() {
        let config = parse("url: \"  https://reader.example.com/  \"\napi_token: \" secret\t\"\n").unwrap();
        assert_eq!(config.url, "https://reader.example.com/");
        assert_eq!(config.base_url(), "https://reader.example.com");
        assert_eq!(config.api_token, "secret");
    }
}
