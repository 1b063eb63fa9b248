use super::{ControlSurface, PlayerControlConfig};
use crate::error::{Error, Result};
use crate::utils::find_element;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

const STATUS_PATH: &str = "requests/status.xml";
const PLAYLIST_PATH: &str = "requests/playlist.xml";

/// Player state as reported in `status.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: Option<String>,
    pub version: Option<String>,
}

impl PlayerStatus {
    pub fn from_xml(body: &[u8]) -> Self {
        PlayerStatus {
            state: find_element(body, "state"),
            version: find_element(body, "version"),
        }
    }
}

/// VLC's HTTP interface (`--extraintf http`), Basic auth with an empty user.
#[derive(Debug, Clone)]
pub struct HttpControlSurface {
    client: Client,
    base: Url,
    username: String,
    password: String,
    probe_timeout: Duration,
    command_timeout: Duration,
}

impl HttpControlSurface {
    pub fn new(config: &PlayerControlConfig) -> Result<Self> {
        let base = format!("http://{}:{}/", config.host, config.port);
        let base = Url::parse(&base)
            .map_err(|e| Error::InvalidInput(format!("control surface address {base}: {e}")))?;

        Ok(HttpControlSurface {
            client: Client::new(),
            base,
            username: config.username.clone(),
            password: config.password.clone(),
            probe_timeout: config.probe_timeout,
            command_timeout: config.command_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("control surface path {path}: {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    async fn get(&self, url: Url, timeout: Duration) -> reqwest::Result<Response> {
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(timeout)
            .send()
            .await
    }

    async fn command(&self, stage: &'static str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.endpoint(STATUS_PATH, query)?;
        debug!("[ControlSurface][{stage}] GET {url}");

        self.get(url, self.command_timeout)
            .await
            .map_err(|e| Error::connection(stage, e))
    }
}

#[async_trait]
impl ControlSurface for HttpControlSurface {
    async fn probe(&self) -> bool {
        let url = match self.endpoint(STATUS_PATH, &[]) {
            Ok(url) => url,
            Err(e) => {
                warn!("[ControlSurface][probe] {e}");
                return false;
            }
        };

        match self.get(url, self.probe_timeout).await {
            Ok(response) => {
                let status = response.status();
                debug!("[ControlSurface][probe] Control surface answered with {status}");
                status == StatusCode::OK || status == StatusCode::UNAUTHORIZED
            }
            Err(e) => {
                debug!("[ControlSurface][probe] Control surface not responding: {e}");
                false
            }
        }
    }

    async fn playlist(&self) -> Result<()> {
        let url = self.endpoint(PLAYLIST_PATH, &[])?;

        let response = self
            .get(url, self.command_timeout)
            .await
            .map_err(|e| Error::connection("playlist", e))?;

        debug!("[ControlSurface][playlist] Playlist query answered with {}", response.status());
        Ok(())
    }

    async fn empty_playlist(&self) -> Result<()> {
        let response = self.command("empty_playlist", &[("command", "pl_empty")]).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::connection(
                "empty_playlist",
                format!("control surface returned {status}"),
            ));
        }

        Ok(())
    }

    async fn play(&self, uri: &str) -> Result<PlayerStatus> {
        let response = self
            .command("play", &[("command", "in_play"), ("input", uri)])
            .await?;
        let status = response.status();

        if status != StatusCode::OK {
            return Err(Error::connection(
                "play",
                format!("control surface returned {status}"),
            ));
        }

        // The reply body is a status.xml snapshot; unreadable bodies are tolerated.
        let body = response.bytes().await.unwrap_or_default();
        let player = PlayerStatus::from_xml(&body);

        info!(
            "[ControlSurface][play] Playing {uri}, player state: {}",
            player.state.as_deref().unwrap_or("unknown")
        );

        Ok(player)
    }
}
