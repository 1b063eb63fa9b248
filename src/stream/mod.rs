//! Stream parameters, the verification result model and the collaborator
//! traits the verifier talks to.

mod extract;
mod ffprobe;
mod resolution;
mod verify;

pub use extract::{extract_actual, TextReader};
pub use ffprobe::FfprobeReader;
pub use resolution::{closest_resolution, Resolution};
pub use verify::{ConfigApplyVerifier, VerifierConfig, MAX_ATTEMPTS};

use crate::error::{Error, Result};

use async_trait::async_trait;
use std::fmt;

/// What the caller asked the camera to stream.
#[derive(Debug, Clone, Copy, PartialEq)]
#[rustfmt::skip]
pub struct ExpectedStreamConfig {
    width:        u32,
    height:       u32,
    frame_rate:   f64,
}

impl ExpectedStreamConfig {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "resolution must be non-zero, got {width}x{height}"
            )));
        }
        if !frame_rate.is_finite() || frame_rate < 0.0 {
            return Err(Error::InvalidInput(format!(
                "frame rate must be a finite value >= 0, got {frame_rate}"
            )));
        }

        Ok(ExpectedStreamConfig {
            width,
            height,
            frame_rate,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub(crate) fn with_resolution(self, resolution: Resolution) -> Self {
        ExpectedStreamConfig {
            width: resolution.width,
            height: resolution.height,
            ..self
        }
    }
}

impl fmt::Display for ExpectedStreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {} fps", self.width, self.height, self.frame_rate)
    }
}

/// What was observed on the wire. Zero means "not known".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[rustfmt::skip]
pub struct ActualStreamReading {
    pub width:        u32,
    pub height:       u32,
    pub frame_rate:   f64,
}

impl ActualStreamReading {
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0 && self.frame_rate == 0.0
    }

    pub fn matches(&self, expected: &ExpectedStreamConfig) -> bool {
        *self == ActualStreamReading::from(expected)
    }
}

impl From<&ExpectedStreamConfig> for ActualStreamReading {
    fn from(expected: &ExpectedStreamConfig) -> Self {
        ActualStreamReading {
            width: expected.width,
            height: expected.height,
            frame_rate: expected.frame_rate,
        }
    }
}

/// Outcome of one verification call. Built once, read-only afterwards.
///
/// A valid result always carries `actual == expected`; an invalid one always
/// carries an error or a non-empty message.
#[derive(Debug, Clone, PartialEq)]
#[rustfmt::skip]
pub struct ValidationResult {
    is_valid:   bool,
    message:    String,
    expected:   ExpectedStreamConfig,
    actual:     ActualStreamReading,
    error:      Option<String>,
    attempts:   u32,
}

impl ValidationResult {
    pub(crate) fn confirmed(expected: ExpectedStreamConfig, attempts: u32) -> Self {
        ValidationResult {
            is_valid: true,
            message: "Stream configuration matches expected values".to_string(),
            actual: ActualStreamReading::from(&expected),
            expected,
            error: None,
            attempts,
        }
    }

    pub(crate) fn failed(
        expected: ExpectedStreamConfig,
        actual: ActualStreamReading,
        message: impl Into<String>,
        error: Option<String>,
        attempts: u32,
    ) -> Self {
        let mut message = message.into();
        let error = error.filter(|e| !e.is_empty());

        if message.is_empty() && error.is_none() {
            message = "Stream configuration could not be verified".to_string();
        }

        ValidationResult {
            is_valid: false,
            message,
            expected,
            actual,
            error,
            attempts,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn expected(&self) -> &ExpectedStreamConfig {
        &self.expected
    }

    pub fn actual(&self) -> &ActualStreamReading {
        &self.actual
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of stream reads performed, at most [`MAX_ATTEMPTS`]. Zero only
    /// when the configuration never reached the device.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Converts a failed result into the matching error variant.
    pub fn into_result(self) -> Result<ActualStreamReading> {
        if self.is_valid {
            return Ok(self.actual);
        }

        let reason = self.error.unwrap_or(self.message);
        Err(Error::VerificationMismatch(reason))
    }
}

/// Typed answer from a stream reader for one read.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Matched,
    Mismatch {
        actual: ActualStreamReading,
        detail: String,
    },
    Unreachable {
        cause: String,
    },
    /// The requested change cannot be made on this device. Never retried.
    Unsupported {
        reason: String,
    },
}

impl VerificationOutcome {
    /// Maps free-form failure text onto an outcome. Text carrying either known
    /// mismatch shape becomes a `Mismatch`, anything else is `Unreachable`.
    pub fn from_error_text(text: &str) -> Self {
        let actual = extract_actual(text);

        if actual.is_empty() {
            VerificationOutcome::Unreachable {
                cause: text.to_string(),
            }
        } else {
            VerificationOutcome::Mismatch {
                actual,
                detail: text.to_string(),
            }
        }
    }
}

/// Reads what a stream actually carries and compares it to `expected`.
#[async_trait]
pub trait StreamReader: Send + Sync {
    async fn read_actual(
        &self,
        stream_address: &str,
        expected: &ExpectedStreamConfig,
    ) -> VerificationOutcome;
}

/// Encoder settings as exposed by a device adapter. Only the resolution and
/// frame rate are interpreted here.
#[derive(Debug, Clone, Default, PartialEq)]
#[rustfmt::skip]
pub struct EncoderConfig {
    pub token:        String,
    pub encoding:     Option<String>,
    pub width:        u32,
    pub height:       u32,
    pub frame_rate:   f64,
    pub bitrate:      Option<u32>,
}

/// Get/set access to a device's encoder configuration (ONVIF client side).
#[async_trait]
pub trait DeviceConfigAdapter: Send + Sync {
    async fn current_config(&self, stream_address: &str) -> Result<EncoderConfig>;

    /// Returns `Error::UnsupportedOperation` when a field cannot be set.
    async fn apply_config(&self, stream_address: &str, config: &EncoderConfig) -> Result<()>;

    async fn supported_resolutions(&self, _stream_address: &str) -> Result<Vec<Resolution>> {
        Ok(Vec::new())
    }
}
