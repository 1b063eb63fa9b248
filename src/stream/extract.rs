use super::{ActualStreamReading, ExpectedStreamConfig, StreamReader, VerificationOutcome};

use async_trait::async_trait;
use log::debug;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static RESOLUTION_MISMATCH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)resolution mismatch: got (\d+)x(\d+)").ok());
static FRAME_RATE_MISMATCH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)frame rate mismatch: got (\d+(?:\.\d+)?)").ok());

fn captures<'t>(pattern: &Option<Regex>, text: &'t str) -> Option<Captures<'t>> {
    pattern.as_ref()?.captures(text)
}

/// Pulls whatever numbers the two known mismatch shapes carry out of `text`.
/// Fields that cannot be recovered stay at zero.
pub fn extract_actual(text: &str) -> ActualStreamReading {
    let mut actual = ActualStreamReading::default();

    match captures(&RESOLUTION_MISMATCH, text) {
        Some(caps) => {
            actual.width = caps[1].parse().unwrap_or_default();
            actual.height = caps[2].parse().unwrap_or_default();
            debug!(
                "[Extract][resolution] Parsed actual resolution: {}x{}",
                actual.width, actual.height
            );
        }
        None => debug!("[Extract][resolution] No resolution in: {text}"),
    }

    match captures(&FRAME_RATE_MISMATCH, text) {
        Some(caps) => {
            actual.frame_rate = caps[1].parse().unwrap_or_default();
            debug!(
                "[Extract][frame_rate] Parsed actual frame rate: {:.2}",
                actual.frame_rate
            );
        }
        None => debug!("[Extract][frame_rate] No frame rate in: {text}"),
    }

    actual
}

/// Wraps a plain `(address, expected) -> Result<matches, error text>` check,
/// the shape most stream probes report in, as a [`StreamReader`].
pub struct TextReader<F> {
    check: F,
}

impl<F> TextReader<F>
where
    F: Fn(&str, &ExpectedStreamConfig) -> Result<bool, String> + Send + Sync,
{
    pub fn new(check: F) -> Self {
        TextReader { check }
    }
}

#[async_trait]
impl<F> StreamReader for TextReader<F>
where
    F: Fn(&str, &ExpectedStreamConfig) -> Result<bool, String> + Send + Sync,
{
    async fn read_actual(
        &self,
        stream_address: &str,
        expected: &ExpectedStreamConfig,
    ) -> VerificationOutcome {
        match (self.check)(stream_address, expected) {
            Ok(true) => VerificationOutcome::Matched,
            Ok(false) => VerificationOutcome::Mismatch {
                actual: ActualStreamReading::default(),
                detail: "stream reader reported a mismatch without details".to_string(),
            },
            Err(text) => VerificationOutcome::from_error_text(&text),
        }
    }
}
