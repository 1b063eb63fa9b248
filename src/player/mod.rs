//! Getting a stream on screen through a locally running media player (VLC)
//! and its HTTP control surface.

mod control;
mod orchestrator;
mod process;

pub use control::{HttpControlSurface, PlayerStatus};
pub use orchestrator::PlayerOrchestrator;
pub use process::{Platform, SystemProcessControl};

use crate::error::{Error, Result};

use async_trait::async_trait;
use log::warn;
use std::{env, fmt, path::PathBuf, time::Duration};

pub const DEFAULT_HTTP_HOST: &str = "localhost";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTP_PASSWORD: &str = "123";

/// Where the player's control surface lives and how long to wait on it.
#[derive(Debug, Clone, PartialEq)]
#[rustfmt::skip]
pub struct PlayerControlConfig {
    pub host:              String,
    pub port:              u16,
    pub username:          String,
    pub password:          String,
    pub probe_timeout:     Duration,
    pub command_timeout:   Duration,
    /// Pause between terminating the player and relaunching it.
    pub settle_delay:      Duration,
    /// Explicit player executable, bypassing the per-platform lookup.
    pub binary:            Option<PathBuf>,
}

impl Default for PlayerControlConfig {
    fn default() -> Self {
        PlayerControlConfig {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            username: String::new(),
            password: DEFAULT_HTTP_PASSWORD.to_string(),
            probe_timeout: Duration::from_millis(500),
            command_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(1),
            binary: None,
        }
    }
}

impl PlayerControlConfig {
    /// Defaults overlaid with `VLC_HTTP_HOST`, `VLC_HTTP_PORT`,
    /// `VLC_HTTP_PASSWORD` and `VLC_PATH` when set.
    pub fn from_env() -> Self {
        PlayerControlConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Same overlay as [`PlayerControlConfig::from_env`], reading values
    /// through `lookup`. An unparseable port keeps the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PlayerControlConfig::default();

        if let Some(host) = lookup("VLC_HTTP_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("VLC_HTTP_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(e) => warn!("[PlayerControlConfig][from_env] Ignoring VLC_HTTP_PORT={port}: {e}"),
            }
        }

        if let Some(password) = lookup("VLC_HTTP_PASSWORD") {
            config.password = password;
        }

        if let Some(path) = lookup("VLC_PATH") {
            config.binary = Some(PathBuf::from(path));
        }

        config
    }

    /// Command line for a fresh player with the control surface enabled.
    pub fn launch_args(&self, stream_uri: &str) -> Vec<String> {
        vec![
            "--no-video-title-show".to_string(),
            "--rtsp-tcp".to_string(),
            "--extraintf".to_string(),
            "http".to_string(),
            "--http-host".to_string(),
            self.host.clone(),
            "--http-port".to_string(),
            self.port.to_string(),
            "--http-password".to_string(),
            self.password.clone(),
            stream_uri.to_string(),
        ]
    }
}

/// Sampled fresh for every request, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    NotRunning,
    RunningNoControlSurface,
    RunningControllable,
}

/// Which path got the stream playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Launched,
    Injected,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerAction::Launched => write!(f, "launched fresh player instance"),
            PlayerAction::Injected => write!(f, "injected into running instance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    uri: String,
}

impl StreamRequest {
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();

        if uri.trim().is_empty() {
            return Err(Error::InvalidInput("stream URI cannot be empty".to_string()));
        }

        Ok(StreamRequest { uri })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// The player's local command endpoint. Every call is an independent request.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Whether the surface answers at all. Auth rejections count as alive.
    async fn probe(&self) -> bool;

    async fn playlist(&self) -> Result<()>;

    async fn empty_playlist(&self) -> Result<()>;

    /// Load `uri` and start playing it in one command.
    async fn play(&self, uri: &str) -> Result<PlayerStatus>;
}

/// OS level control over the player process.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn is_running(&self) -> bool;

    /// Best-effort; having nothing to terminate is not an error.
    async fn terminate_all(&self);

    async fn launch(&self, args: &[String]) -> Result<()>;
}
