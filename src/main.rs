use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use onvif_cam_ctl::{
    player::{PlayerControlConfig, PlayerOrchestrator, StreamRequest},
    stream::{ConfigApplyVerifier, ExpectedStreamConfig, FfprobeReader, VerifierConfig},
};
use std::{env, process::ExitCode};

const USAGE: &str = "usage:
    onvif-cam-ctl verify <stream-uri> <width> <height> <fps>
    onvif-cam-ctl play <stream-uri>";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("verify") => verify(&args[1..]).await,
        Some("play") => play(&args[1..]).await,
        _ => bail!("{USAGE}"),
    }
}

async fn verify(args: &[String]) -> Result<()> {
    let [uri, width, height, fps] = args else {
        bail!("{USAGE}");
    };

    let width = width.parse().with_context(|| format!("width {width}"))?;
    let height = height.parse().with_context(|| format!("height {height}"))?;
    let fps = fps.parse().with_context(|| format!("fps {fps}"))?;
    let expected = ExpectedStreamConfig::new(width, height, fps)?;

    let verifier = ConfigApplyVerifier::new(VerifierConfig::default());
    let result = verifier.verify(uri, expected, &FfprobeReader::default()).await;

    println!(
        "{}: {} (attempts: {})",
        expected,
        result.message(),
        result.attempts()
    );

    if !result.is_valid() {
        let actual = result.actual();
        return Err(anyhow!(
            "got {}x{} @ {} fps: {}",
            actual.width,
            actual.height,
            actual.frame_rate,
            result.error().unwrap_or(result.message())
        ));
    }

    Ok(())
}

async fn play(args: &[String]) -> Result<()> {
    let [uri] = args else {
        bail!("{USAGE}");
    };

    let request = StreamRequest::new(uri.as_str())?;
    let orchestrator = PlayerOrchestrator::from_config(PlayerControlConfig::from_env())?;

    let action = orchestrator.ensure_stream_playing(&request).await?;
    info!("[main][play] {uri}: {action}");
    println!("{action}");

    Ok(())
}
