use super::{ActualStreamReading, ExpectedStreamConfig, StreamReader, VerificationOutcome};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{process::Command, time::timeout};

const FRAME_RATE_TOLERANCE: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
#[rustfmt::skip]
struct ProbeStream {
    #[serde(default)] codec_type:       String,
    #[serde(default)] width:            u32,
    #[serde(default)] height:           u32,
    #[serde(default)] avg_frame_rate:   String,
    #[serde(default)] r_frame_rate:     String,
}

/// Reads the live stream parameters with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeReader {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for FfprobeReader {
    fn default() -> Self {
        FfprobeReader {
            binary: PathBuf::from("ffprobe"),
            timeout: Duration::from_secs(15),
        }
    }
}

impl FfprobeReader {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        FfprobeReader {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StreamReader for FfprobeReader {
    async fn read_actual(
        &self,
        stream_address: &str,
        expected: &ExpectedStreamConfig,
    ) -> VerificationOutcome {
        debug!(
            "[Ffprobe][read_actual] Probing {stream_address} with {}",
            self.binary.display()
        );

        let probe = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(stream_address)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, probe).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return VerificationOutcome::Unreachable {
                    cause: format!("failed to run {}: {e}", self.binary.display()),
                }
            }
            Err(_) => {
                return VerificationOutcome::Unreachable {
                    cause: format!("ffprobe timed out after {:?}", self.timeout),
                }
            }
        };

        if !output.status.success() {
            warn!(
                "[Ffprobe][read_actual] ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return VerificationOutcome::Unreachable {
                cause: format!("stream validation failed: ffprobe exited with {}", output.status),
            };
        }

        evaluate(&output.stdout, expected)
    }
}

/// Compares ffprobe's JSON report against `expected`.
fn evaluate(report: &[u8], expected: &ExpectedStreamConfig) -> VerificationOutcome {
    if report.is_empty() {
        return VerificationOutcome::Unreachable {
            cause: "ffprobe returned no data".to_string(),
        };
    }

    let parsed: ProbeOutput = match serde_json::from_slice(report) {
        Ok(parsed) => parsed,
        Err(e) => {
            return VerificationOutcome::Unreachable {
                cause: format!("failed to parse ffprobe output: {e}"),
            }
        }
    };

    let Some(video) = parsed.streams.iter().find(|s| s.codec_type == "video") else {
        return VerificationOutcome::Unreachable {
            cause: "no video stream found".to_string(),
        };
    };

    let frame_rate = frame_rate(video).unwrap_or_default();
    let actual = ActualStreamReading {
        width: video.width,
        height: video.height,
        frame_rate,
    };

    info!(
        "[Ffprobe][evaluate] Found video stream: {}x{} @ {:.2} fps",
        actual.width, actual.height, actual.frame_rate
    );

    let mut discrepancies = Vec::new();

    if actual.width != expected.width() || actual.height != expected.height() {
        discrepancies.push(format!(
            "resolution mismatch: got {}x{}, expected {}x{}",
            actual.width,
            actual.height,
            expected.width(),
            expected.height()
        ));
    }

    let check_rate = expected.frame_rate() > 0.0;
    if check_rate && (actual.frame_rate - expected.frame_rate()).abs() > FRAME_RATE_TOLERANCE {
        discrepancies.push(format!(
            "frame rate mismatch: got {:.2}, expected {:.2}",
            actual.frame_rate,
            expected.frame_rate()
        ));
    }

    if discrepancies.is_empty() {
        VerificationOutcome::Matched
    } else {
        VerificationOutcome::Mismatch {
            actual,
            detail: discrepancies.join(", "),
        }
    }
}

/// `avg_frame_rate` is preferred, `r_frame_rate` is the fallback.
fn frame_rate(stream: &ProbeStream) -> Option<f64> {
    [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .filter(|expr| !expr.is_empty() && expr.as_str() != "0/0")
        .find_map(|expr| evaluate_ratio(expr))
}

fn evaluate_ratio(expr: &str) -> Option<f64> {
    let (num, den) = expr.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;

    if den == 0.0 {
        return None;
    }

    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(width: u32, height: u32, avg: &str, real: &str) -> Vec<u8> {
        format!(
            r#"{{"streams":[
                {{"codec_type":"audio","codec_name":"aac"}},
                {{"codec_type":"video","codec_name":"h264","width":{width},"height":{height},
                  "avg_frame_rate":"{avg}","r_frame_rate":"{real}"}}
            ]}}"#
        )
        .into_bytes()
    }

    #[test]
    fn matching_stream_is_matched() {
        let expected = ExpectedStreamConfig::new(1920, 1080, 30.0).unwrap();
        let outcome = evaluate(&report(1920, 1080, "30/1", "30/1"), &expected);
        assert_eq!(outcome, VerificationOutcome::Matched);
    }

    #[test]
    fn ntsc_rate_is_within_tolerance() {
        let expected = ExpectedStreamConfig::new(1920, 1080, 29.97).unwrap();
        let outcome = evaluate(&report(1920, 1080, "30000/1001", "0/0"), &expected);
        assert_eq!(outcome, VerificationOutcome::Matched);
    }

    #[test]
    fn mismatch_carries_typed_actual_and_parsable_detail() {
        let expected = ExpectedStreamConfig::new(1280, 720, 25.0).unwrap();
        let outcome = evaluate(&report(640, 480, "0/0", "15/1"), &expected);

        let VerificationOutcome::Mismatch { actual, detail } = outcome else {
            panic!("expected a mismatch");
        };
        assert_eq!(
            actual,
            ActualStreamReading {
                width: 640,
                height: 480,
                frame_rate: 15.0,
            }
        );
        assert_eq!(crate::stream::extract_actual(&detail), actual);
    }

    #[test]
    fn zero_expected_rate_skips_rate_check() {
        let expected = ExpectedStreamConfig::new(1280, 720, 0.0).unwrap();
        let outcome = evaluate(&report(1280, 720, "12/1", "12/1"), &expected);
        assert_eq!(outcome, VerificationOutcome::Matched);
    }

    #[test]
    fn broken_reports_are_unreachable() {
        let expected = ExpectedStreamConfig::new(1280, 720, 25.0).unwrap();

        let bodies: [&[u8]; 3] = [b"", b"{not json", br#"{"streams":[{"codec_type":"audio"}]}"#];

        for body in bodies {
            assert!(matches!(
                evaluate(body, &expected),
                VerificationOutcome::Unreachable { .. }
            ));
        }
    }

    #[test]
    fn ratio_parsing() {
        assert_eq!(evaluate_ratio("25/1"), Some(25.0));
        assert_eq!(evaluate_ratio("25/0"), None);
        assert_eq!(evaluate_ratio("25"), None);
        assert_eq!(evaluate_ratio("x/1"), None);
    }
}
