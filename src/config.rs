//! Configuration for the document-AI pipeline.
//!
//! Everything a [`crate::extract::Pipeline`] needs is held in one
//! [`DocAiConfig`], built via [`DocAiConfigBuilder`] or read from the
//! environment with [`DocAiConfig::from_env`]. The config is a plain value
//! passed in at construction; nothing in the crate reads global state once a
//! pipeline exists.

use crate::error::DocAiError;
use crate::progress::ProgressCallback;
use crate::provider::DocumentAiProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default API root; endpoint paths are appended to it.
pub const DEFAULT_BASE_URL: &str = "https://api.upstage.ai/v1";

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";

/// Upper bound for every remote call. Not configurable.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Environment variable holding the bearer token.
pub const API_KEY_ENV: &str = "UPSTAGE_API_KEY";
/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "UPSTAGE_API_BASE";
/// Environment variable overriding [`DEFAULT_OUTPUT_ROOT`].
pub const OUTPUT_DIR_ENV: &str = "UPSTAGE_OUTPUT_DIR";

/// Configuration for a [`crate::extract::Pipeline`].
///
/// # Example
/// ```rust
/// use upstage_docai::DocAiConfig;
///
/// let config = DocAiConfig::builder()
///     .api_key("up_test_key")
///     .output_root("/tmp/docai-outputs")
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://api.upstage.ai/v1");
/// ```
#[derive(Clone)]
pub struct DocAiConfig {
    /// Bearer token sent with every request. Required unless `provider` is set.
    pub api_key: Option<String>,

    /// API root URL, without a trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Root of the artifact tree. Default: `./outputs`.
    ///
    /// Holds `document_parsing/`, `information_extraction/` and
    /// `information_extraction/schemas/`.
    pub output_root: PathBuf,

    /// Pre-constructed provider. Takes precedence over `api_key`/`base_url`.
    pub provider: Option<Arc<dyn DocumentAiProvider>>,

    /// Observer for stage transitions and messages.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DocAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            provider: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DocAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("output_root", &self.output_root)
            .field(
                "provider",
                &self.provider.as_ref().map(|_| "<dyn DocumentAiProvider>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl DocAiConfig {
    /// Create a new builder for `DocAiConfig`.
    pub fn builder() -> DocAiConfigBuilder {
        DocAiConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from `UPSTAGE_API_KEY`, `UPSTAGE_API_BASE` and
    /// `UPSTAGE_OUTPUT_DIR`.
    ///
    /// A missing or empty API key is a startup error, not something a run
    /// discovers later.
    pub fn from_env() -> Result<Self, DocAiError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(DocAiError::MissingApiKey)?;

        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base) = std::env::var(BASE_URL_ENV) {
            if !base.trim().is_empty() {
                builder = builder.base_url(base);
            }
        }
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                builder = builder.output_root(dir);
            }
        }
        builder.build()
    }
}

/// Builder for [`DocAiConfig`].
#[derive(Debug)]
pub struct DocAiConfigBuilder {
    config: DocAiConfig,
}

impl DocAiConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn DocumentAiProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DocAiConfig, DocAiError> {
        let c = &self.config;
        if c.provider.is_none() {
            match c.api_key.as_deref() {
                Some(k) if !k.trim().is_empty() => {}
                _ => return Err(DocAiError::MissingApiKey),
            }
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(DocAiError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.output_root.as_os_str().is_empty() {
            return Err(DocAiError::InvalidConfig(
                "output root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
