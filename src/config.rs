//! Configuration for a DocSend-to-PDF conversion.
//!
//! All knobs live in one [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Callers set only what they care about and
//! rely on documented defaults for the rest; the struct is cheap to clone
//! into the worker task.

use crate::error::ConvertError;
use crate::pipeline::capture::CaptureDriver;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default directory PDFs are saved into, created on demand.
pub const DEFAULT_OUTPUT_DIR: &str = "converted PDFs";

/// Configuration for one conversion run.
///
/// # Example
/// ```rust
/// use docsend2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("decks")
///     .email("reader@example.com")
///     .jpeg_quality(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Where the finished PDF is written. Default: `converted PDFs`.
    pub output_dir: PathBuf,

    /// Caller-chosen base name for the output file. When set, the name pool
    /// is bypassed entirely. Default: None (a pool name is drawn).
    pub output_name: Option<String>,

    /// Email to present to an email gate without pausing. Default: None.
    pub email: Option<String>,

    /// Passcode to present to a passcode gate without pausing. Default: None.
    pub passcode: Option<String>,

    /// Browser viewport, which is also the capture resolution of each page.
    /// Default: 1440 x 1080.
    pub viewport: (u32, u32),

    /// JPEG quality used when recompressing page screenshots into the PDF,
    /// 40 to 100. Default: 85.
    ///
    /// 85 keeps slide text crisp while cutting a deck of full-viewport PNG
    /// screenshots to a fraction of its raw size. Lower it for huge decks,
    /// raise it for decks full of fine print.
    pub jpeg_quality: u8,

    /// Bound on every navigation, form submission, and screenshot wait, in
    /// seconds. Default: 30. The credential pause is exempt; it has no
    /// timeout by design.
    pub nav_timeout_secs: u64,

    /// Settle delay after a navigation or page advance, in milliseconds.
    /// Default: 400. Decks animate page transitions; capturing mid-animation
    /// produces smeared frames.
    pub page_settle_ms: u64,

    /// Pre-built capture driver. Tests inject a scripted driver here; when
    /// None, a headless Chromium session is launched per run.
    pub driver: Option<Arc<dyn CaptureDriver>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_name: None,
            email: None,
            passcode: None,
            viewport: (1440, 1080),
            jpeg_quality: 85,
            nav_timeout_secs: 30,
            page_settle_ms: 400,
            driver: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("output_name", &self.output_name)
            .field("email", &self.email)
            .field("passcode", &self.passcode.as_ref().map(|_| "<redacted>"))
            .field("viewport", &self.viewport)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("nav_timeout_secs", &self.nav_timeout_secs)
            .field("page_settle_ms", &self.page_settle_ms)
            .field("driver", &self.driver.as_ref().map(|_| "<dyn CaptureDriver>"))
            .finish()
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.config.email = Some(email.into());
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.config.passcode = Some(passcode.into());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport = (width.max(320), height.max(240));
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(40, 100);
        self
    }

    pub fn nav_timeout_secs(mut self, secs: u64) -> Self {
        self.config.nav_timeout_secs = secs.max(1);
        self
    }

    pub fn page_settle_ms(mut self, ms: u64) -> Self {
        self.config.page_settle_ms = ms;
        self
    }

    pub fn driver(mut self, driver: Arc<dyn CaptureDriver>) -> Self {
        self.config.driver = Some(driver);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if let Some(name) = &c.output_name {
            if name.trim().is_empty() {
                return Err(ConvertError::InvalidConfig(
                    "output name must not be empty".into(),
                ));
            }
            if name.contains(['/', '\\']) {
                return Err(ConvertError::InvalidConfig(format!(
                    "output name must not contain path separators: '{name}'"
                )));
            }
        }
        if let Some(email) = &c.email {
            if !email.contains('@') {
                return Err(ConvertError::InvalidConfig(format!(
                    "'{email}' does not look like an email address"
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ConversionConfig::default();
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.jpeg_quality, 85);
        assert!(config.driver.is_none());
    }

    #[test]
    fn quality_is_clamped() {
        let config = ConversionConfig::builder()
            .jpeg_quality(5)
            .build()
            .unwrap();
        assert_eq!(config.jpeg_quality, 40);
    }

    #[test]
    fn empty_output_name_is_rejected() {
        let err = ConversionConfig::builder()
            .output_name("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn output_name_with_separator_is_rejected() {
        assert!(ConversionConfig::builder()
            .output_name("../evil")
            .build()
            .is_err());
    }

    #[test]
    fn bare_string_email_is_rejected() {
        assert!(ConversionConfig::builder()
            .email("not-an-email")
            .build()
            .is_err());
    }

    #[test]
    fn debug_redacts_passcode() {
        let config = ConversionConfig::builder()
            .email("a@b.com")
            .passcode("hunter2")
            .build()
            .unwrap();
        let dump = format!("{config:?}");
        assert!(!dump.contains("hunter2"));
    }
}
