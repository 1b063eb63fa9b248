use super::{
    closest_resolution, ActualStreamReading, DeviceConfigAdapter, ExpectedStreamConfig,
    StreamReader, ValidationResult, VerificationOutcome,
};
use crate::error::Error;

use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;

/// Reads allowed per verification. Fixed, not configurable.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub struct VerifierConfig {
    /// Pause before the first read so the device can apply the change.
    pub settle_delay:   Duration,
    /// Wait after failed attempt `n` is `n * backoff_unit`.
    pub backoff_unit:   Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            settle_delay: Duration::from_secs(2),
            backoff_unit: Duration::from_secs(2),
        }
    }
}

/// Confirms that a requested encoder change is visible in the live stream.
///
/// Holds no per-call state, so one verifier can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct ConfigApplyVerifier {
    config: VerifierConfig,
}

impl ConfigApplyVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        ConfigApplyVerifier { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Waits for the device to settle, then reads the stream up to
    /// [`MAX_ATTEMPTS`] times with linear backoff.
    ///
    /// A confirmed read is trusted as-is: the returned `actual` is `expected`.
    pub async fn verify<R>(
        &self,
        stream_address: &str,
        expected: ExpectedStreamConfig,
        reader: &R,
    ) -> ValidationResult
    where
        R: StreamReader + ?Sized,
    {
        debug!(
            "[Verifier][verify] Waiting {:?} for {stream_address} to apply {expected}",
            self.config.settle_delay
        );
        sleep(self.config.settle_delay).await;

        for attempt in 1..=MAX_ATTEMPTS {
            info!("[Verifier][verify] Attempt {attempt}/{MAX_ATTEMPTS} for {stream_address}");

            let result = match reader.read_actual(stream_address, &expected).await {
                VerificationOutcome::Matched => {
                    info!("[Verifier][verify] {stream_address} confirmed {expected}");
                    return ValidationResult::confirmed(expected, attempt);
                }
                VerificationOutcome::Unsupported { reason } => {
                    warn!("[Verifier][verify] {stream_address} cannot apply {expected}: {reason}");
                    return ValidationResult::failed(
                        expected,
                        ActualStreamReading::default(),
                        "Requested configuration is not supported by the device",
                        Some(reason),
                        attempt,
                    );
                }
                VerificationOutcome::Mismatch { actual, detail } => {
                    warn!("[Verifier][verify] Attempt {attempt} mismatch: {detail}");
                    ValidationResult::failed(
                        expected,
                        actual,
                        format!("Configuration mismatch on attempt {attempt}"),
                        Some(detail),
                        attempt,
                    )
                }
                VerificationOutcome::Unreachable { cause } => {
                    warn!("[Verifier][verify] Attempt {attempt} could not read stream: {cause}");
                    ValidationResult::failed(
                        expected,
                        ActualStreamReading::default(),
                        format!("Stream could not be read on attempt {attempt}"),
                        Some(cause),
                        attempt,
                    )
                }
            };

            if attempt == MAX_ATTEMPTS {
                warn!("[Verifier][verify] Giving up on {stream_address} after {attempt} attempts");
                return result;
            }

            let delay = self.config.backoff_unit * attempt;
            debug!("[Verifier][verify] Waiting {delay:?} before next attempt");
            sleep(delay).await;
        }

        ValidationResult::failed(
            expected,
            ActualStreamReading::default(),
            format!("Failed to validate stream configuration after {MAX_ATTEMPTS} attempts"),
            None,
            MAX_ATTEMPTS,
        )
    }

    /// Pushes `expected` to the device through `adapter`, then verifies it.
    ///
    /// The requested resolution is snapped to the nearest one the device
    /// advertises; the snapped values are what gets verified.
    pub async fn apply_and_verify<A, R>(
        &self,
        stream_address: &str,
        expected: ExpectedStreamConfig,
        adapter: &A,
        reader: &R,
    ) -> ValidationResult
    where
        A: DeviceConfigAdapter + ?Sized,
        R: StreamReader + ?Sized,
    {
        let expected = self.snap_resolution(stream_address, expected, adapter).await;

        let mut config = match adapter.current_config(stream_address).await {
            Ok(config) => config,
            Err(e) => return apply_failure(expected, "read current configuration", e),
        };

        config.width = expected.width();
        config.height = expected.height();
        config.frame_rate = expected.frame_rate();

        info!("[Verifier][apply_and_verify] Applying {expected} to {stream_address}");
        if let Err(e) = adapter.apply_config(stream_address, &config).await {
            return apply_failure(expected, "apply configuration", e);
        }

        self.verify(stream_address, expected, reader).await
    }

    async fn snap_resolution<A>(
        &self,
        stream_address: &str,
        expected: ExpectedStreamConfig,
        adapter: &A,
    ) -> ExpectedStreamConfig
    where
        A: DeviceConfigAdapter + ?Sized,
    {
        let available = match adapter.supported_resolutions(stream_address).await {
            Ok(available) => available,
            Err(e) => {
                debug!("[Verifier][snap_resolution] No resolution list for {stream_address}: {e}");
                return expected;
            }
        };

        match closest_resolution(expected.resolution(), &available) {
            Some(closest) if closest != expected.resolution() => {
                warn!(
                    "[Verifier][snap_resolution] {} not supported by {stream_address}, using {closest}",
                    expected.resolution()
                );
                expected.with_resolution(closest)
            }
            _ => expected,
        }
    }
}

fn apply_failure(expected: ExpectedStreamConfig, stage: &str, error: Error) -> ValidationResult {
    warn!("[Verifier][apply_and_verify] Failed to {stage}: {error}");

    let message = match &error {
        Error::UnsupportedOperation(_) => "Requested configuration is not supported by the device",
        _ => "Configuration could not be applied",
    };

    ValidationResult::failed(
        expected,
        ActualStreamReading::default(),
        format!("{message} ({stage})"),
        Some(error.to_string()),
        0,
    )
}
