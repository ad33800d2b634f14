//! Configuration types for document signing.
//!
//! All signing behaviour is controlled through [`SigningConfig`], built via
//! its [`SigningConfigBuilder`]. The visual signature block is described
//! separately by [`SignatureLayout`] so callers can restyle it without
//! touching the network settings.

use crate::error::SigningError;
use crate::progress::ProgressCallback;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted `max_signed_bytes`. Anything below cannot hold a
/// minimal PDF.
const MIN_SIGNED_BYTES: usize = 1024;

/// Configuration for a [`crate::DocumentSigner`].
///
/// Built via [`SigningConfig::builder()`] or using
/// [`SigningConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfsign::SigningConfig;
///
/// let config = SigningConfig::builder()
///     .base_url("https://docs.example.com/api")
///     .submit_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SigningConfig {
    /// Document service root, e.g. `https://docs.example.com/api`.
    ///
    /// Required for [`crate::DocumentSigner::sign`] and the remote helpers;
    /// offline preparation works without it.
    pub base_url: Option<String>,

    /// Timeout for reading document metadata and bytes. Default: 60.
    pub fetch_timeout_secs: u64,

    /// Timeout for the upload request. Default: none.
    ///
    /// Uploads of large signed PDFs over slow links can legitimately take
    /// minutes, so no limit is imposed unless the caller asks for one.
    pub submit_timeout_secs: Option<u64>,

    /// TCP connect timeout for both clients. Default: 10.
    pub connect_timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Upper bound on the serialized signed PDF. Default: 64 MiB.
    pub max_signed_bytes: usize,

    /// Where and how the signature block is drawn.
    pub layout: SignatureLayout,

    /// Optional progress callback for per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            fetch_timeout_secs: 60,
            submit_timeout_secs: None,
            connect_timeout_secs: 10,
            user_agent: concat!("edgequake-pdfsign/", env!("CARGO_PKG_VERSION")).to_string(),
            max_signed_bytes: 64 * 1024 * 1024,
            layout: SignatureLayout::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("base_url", &self.base_url)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("submit_timeout_secs", &self.submit_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_signed_bytes", &self.max_signed_bytes)
            .field("layout", &self.layout)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn SigningProgressCallback>"),
            )
            .finish()
    }
}

impl SigningConfig {
    /// Create a new builder for `SigningConfig`.
    pub fn builder() -> SigningConfigBuilder {
        SigningConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SigningConfig`].
#[derive(Debug)]
pub struct SigningConfigBuilder {
    config: SigningConfig,
}

impl SigningConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn submit_timeout_secs(mut self, secs: u64) -> Self {
        self.config.submit_timeout_secs = Some(secs);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn max_signed_bytes(mut self, n: usize) -> Self {
        self.config.max_signed_bytes = n;
        self
    }

    pub fn layout(mut self, layout: SignatureLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SigningConfig, SigningError> {
        let c = &self.config;
        if let Some(url) = &c.base_url {
            let parsed = reqwest::Url::parse(url).map_err(|e| {
                SigningError::InvalidConfig(format!("base_url '{url}' is not a URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SigningError::InvalidConfig(format!(
                    "base_url must be http or https, got '{}'",
                    parsed.scheme()
                )));
            }
            if parsed.cannot_be_a_base() {
                return Err(SigningError::InvalidConfig(format!(
                    "base_url '{url}' cannot carry a path"
                )));
            }
        }
        if c.fetch_timeout_secs == 0 {
            return Err(SigningError::InvalidConfig(
                "fetch_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.submit_timeout_secs == Some(0) {
            return Err(SigningError::InvalidConfig(
                "submit_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        if c.max_signed_bytes < MIN_SIGNED_BYTES {
            return Err(SigningError::InvalidConfig(format!(
                "max_signed_bytes must be ≥ {MIN_SIGNED_BYTES}, got {}",
                c.max_signed_bytes
            )));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Signature block layout ───────────────────────────────────────────────

/// Placement of the three-line signature block on the first page.
///
/// Coordinates are PDF points measured from the lower-left corner of the
/// page's visible area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureLayout {
    /// Left edge of every line. Default: 50.
    pub left: f32,
    /// Baseline of `Signed by: …`. Default: 50.
    pub name_y: f32,
    /// Baseline of `Email: …`. Default: 35.
    pub email_y: f32,
    /// Baseline of `Date: …`. Default: 20.
    pub timestamp_y: f32,
    /// Font size of the name line. Default: 10.
    pub name_size: f32,
    /// Font size of the email and date lines. Default: 8.
    pub detail_size: f32,
    /// `chrono` strftime pattern for the date line.
    /// Default renders like `10/18/2026, 3:04:05 PM`.
    pub timestamp_format: String,
}

impl Default for SignatureLayout {
    fn default() -> Self {
        Self {
            left: 50.0,
            name_y: 50.0,
            email_y: 35.0,
            timestamp_y: 20.0,
            name_size: 10.0,
            detail_size: 8.0,
            timestamp_format: "%-m/%-d/%Y, %-I:%M:%S %p".to_string(),
        }
    }
}

impl SignatureLayout {
    fn validate(&self) -> Result<(), SigningError> {
        for (label, size) in [("name_size", self.name_size), ("detail_size", self.detail_size)] {
            if !(size.is_finite() && size > 0.0) {
                return Err(SigningError::InvalidConfig(format!(
                    "{label} must be a positive number, got {size}"
                )));
            }
        }
        let offsets = [self.left, self.name_y, self.email_y, self.timestamp_y];
        if offsets.iter().any(|v| !v.is_finite()) {
            return Err(SigningError::InvalidConfig(
                "signature layout offsets must be finite".into(),
            ));
        }
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(SigningError::InvalidConfig(format!(
                "invalid timestamp_format '{}'",
                self.timestamp_format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SigningConfig::builder().build().expect("defaults build");
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.submit_timeout_secs, None);
        assert!(config.user_agent.starts_with("edgequake-pdfsign/"));
        assert_eq!(config.layout.left, 50.0);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = SigningConfig::builder()
            .base_url("ftp://docs.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidConfig(_)));

        let err = SigningConfig::builder()
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not a URL"), "got {err}");
    }

    #[test]
    fn rejects_zero_timeouts_and_tiny_limits() {
        assert!(SigningConfig::builder().fetch_timeout_secs(0).build().is_err());
        assert!(SigningConfig::builder().submit_timeout_secs(0).build().is_err());
        assert!(SigningConfig::builder().max_signed_bytes(10).build().is_err());
    }

    #[test]
    fn rejects_broken_timestamp_format() {
        let layout = SignatureLayout {
            timestamp_format: "%Y-%Q".into(),
            ..SignatureLayout::default()
        };
        let err = SigningConfig::builder().layout(layout).build().unwrap_err();
        assert!(err.to_string().contains("timestamp_format"), "got {err}");
    }

    #[test]
    fn rejects_non_positive_font_size() {
        let layout = SignatureLayout {
            detail_size: 0.0,
            ..SignatureLayout::default()
        };
        assert!(SigningConfig::builder().layout(layout).build().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let config = SigningConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("<dyn SigningProgressCallback>"));
    }
}
