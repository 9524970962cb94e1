//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use tracing::level_filters::LevelFilter;
use url::Url;
use writedesk_api_types::iso_date;


const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "writedesk";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_FILE: &str = ".writedesk/token.json";
const DEFAULT_SESSION_FILE: &str = ".writedesk/session.json";
const DEFAULT_CACHE_POST_LIMIT: usize = 200;
const DEFAULT_CACHE_SIGNAL_CAPACITY: usize = 64;

/// Command-line arguments for the writedesk binary.
#[derive(Debug, Parser)]
#[command(name = "writedesk", version, about = "Write and browse blog posts")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "WRITEDESK_CONFIG_FILE",
        value_name = "PATH",
        global = true,
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that can be overridden on any command.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the posts API root, e.g. http://localhost:8000/api.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override where the bearer token is kept.
    #[arg(
        long = "token-file",
        value_name = "PATH",
        global = true,
        value_hint = ValueHint::FilePath
    )]
    pub token_file: Option<PathBuf>,

    /// Override where session state (cache, active tag) is kept.
    #[arg(
        long = "session-file",
        value_name = "PATH",
        global = true,
        value_hint = ValueHint::FilePath
    )]
    pub session_file: Option<PathBuf>,

    /// Keep session state in memory only.
    #[arg(long = "ephemeral-session", action = ArgAction::SetTrue, global = true)]
    pub ephemeral_session: bool,

    /// Bypass the session cache for posts and the post list.
    #[arg(long = "no-cache", action = ArgAction::SetTrue, global = true)]
    pub no_cache: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Browse and edit posts.
    #[command(subcommand)]
    Posts(PostsCommand),
    /// Manage the bearer token used for changes.
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Debug, Subcommand, Clone)]
pub enum PostsCommand {
    /// List posts, newest first.
    List(ListArgs),
    /// List the tags posts can be filtered by.
    Tags,
    /// Show a single post.
    Show(ShowArgs),
    /// Create a post.
    New(NewArgs),
    /// Edit an existing post.
    Edit(EditArgs),
    /// Delete a post.
    Delete(DeleteArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct ListArgs {
    /// Only show posts with this tag ("All" shows everything). Remembered.
    #[arg(long)]
    pub tag: Option<String>,

    /// Fetch from the server even when the list is cached.
    #[arg(long, action = ArgAction::SetTrue)]
    pub refresh: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    pub id: String,

    /// Print sanitized HTML instead of markdown.
    #[arg(long, action = ArgAction::SetTrue)]
    pub html: bool,
}

#[derive(Debug, Args, Clone, Default)]
pub struct FieldArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Calendar date, YYYY-MM-DD.
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub date: Option<Date>,

    /// Markdown content.
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read markdown content from a file ("-" for stdin).
    #[arg(long = "content-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub content_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct NewArgs {
    #[command(flatten)]
    pub fields: FieldArgs,

    /// Tag for the new post; defaults to `posts.default_tag`.
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct EditArgs {
    pub id: String,

    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DeleteArgs {
    pub id: String,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y', action = ArgAction::SetTrue)]
    pub yes: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum AuthCommand {
    /// Store a bearer token read from a file or stdin.
    SetToken(SetTokenArgs),
    /// Forget the stored token.
    Clear,
    /// Report whether a token is stored.
    Status,
}

#[derive(Debug, Args, Clone, Default)]
pub struct SetTokenArgs {
    /// Read the token from this file instead of stdin.
    #[arg(long = "from-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub from_file: Option<PathBuf>,
}

fn parse_date(raw: &str) -> Result<Date, String> {
    iso_date::parse(raw).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub auth: AuthSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
    pub posts: PostSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub token_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// `None` keeps session state in memory for the life of the process.
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub post_limit: NonZeroUsize,
    pub signal_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct PostSettings {
    pub default_tag: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut raw = load_raw(cli.config_file.as_deref())?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

fn load_raw(config_file: Option<&Path>) -> Result<RawSettings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("WRITEDESK").separator("__"));

    Ok(builder.build()?.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    auth: RawAuthSettings,
    session: RawSessionSettings,
    cache: RawCacheSettings,
    posts: RawPostSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(path) = overrides.token_file.as_ref() {
            self.auth.token_file = Some(path.clone());
        }
        if let Some(path) = overrides.session_file.as_ref() {
            self.session.state_file = Some(path.clone());
        }
        if overrides.ephemeral_session {
            self.session.ephemeral = Some(true);
        }
        if overrides.no_cache {
            self.cache.enabled = Some(false);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            auth,
            session,
            cache,
            posts,
            logging,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            auth: build_auth_settings(auth)?,
            session: build_session_settings(session),
            cache: build_cache_settings(cache)?,
            posts: build_post_settings(posts)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("api.base_url", format!("`{raw_url}`: {err}")))?;
    if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("`{raw_url}` is not an http(s) URL"),
        ));
    }

    let timeout_seconds = api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        timeout: Duration::from_secs(timeout_seconds),
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let token_file = auth
        .token_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE));
    if token_file.as_os_str().is_empty() {
        return Err(LoadError::invalid("auth.token_file", "must not be empty"));
    }
    Ok(AuthSettings { token_file })
}

fn build_session_settings(session: RawSessionSettings) -> SessionSettings {
    if session.ephemeral.unwrap_or(false) {
        return SessionSettings { state_file: None };
    }
    let state_file = match session.state_file {
        Some(path) if path.as_os_str().is_empty() => None,
        Some(path) => Some(path),
        None => Some(PathBuf::from(DEFAULT_SESSION_FILE)),
    };
    SessionSettings { state_file }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let post_limit = non_zero_usize(
        cache.post_limit.unwrap_or(DEFAULT_CACHE_POST_LIMIT as u64),
        "cache.post_limit",
    )?;
    let signal_capacity = non_zero_usize(
        cache
            .signal_capacity
            .unwrap_or(DEFAULT_CACHE_SIGNAL_CAPACITY as u64),
        "cache.signal_capacity",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        post_limit,
        signal_capacity,
    })
}

fn build_post_settings(posts: RawPostSettings) -> Result<PostSettings, LoadError> {
    let default_tag = posts
        .default_tag
        .map(|tag| tag.trim().to_string())
        .unwrap_or_else(|| crate::domain::posts::DEFAULT_TAG.to_string());
    if default_tag.is_empty() {
        return Err(LoadError::invalid("posts.default_tag", "must not be empty"));
    }
    if default_tag == crate::domain::posts::ALL_TAGS {
        return Err(LoadError::invalid(
            "posts.default_tag",
            "`All` is reserved for the unfiltered listing",
        ));
    }
    Ok(PostSettings { default_tag })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    state_file: Option<PathBuf>,
    ephemeral: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    post_limit: Option<u64>,
    signal_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPostSettings {
    default_tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
