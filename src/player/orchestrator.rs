use super::{
    ControlSurface, HttpControlSurface, PlayerAction, PlayerControlConfig, PlayerState,
    PlayerStatus, ProcessControl, StreamRequest, SystemProcessControl,
};
use crate::error::{Error, Result};

use log::{debug, info, warn};
use tokio::time::sleep;

/// Gets a stream playing, preferring injection into a live player over a
/// relaunch. Stateless between calls: the player is re-sampled every time.
pub struct PlayerOrchestrator<P, S> {
    process: P,
    surface: S,
    config: PlayerControlConfig,
}

impl PlayerOrchestrator<SystemProcessControl, HttpControlSurface> {
    /// Real player on this machine, controlled over HTTP.
    pub fn from_config(config: PlayerControlConfig) -> Result<Self> {
        let surface = HttpControlSurface::new(&config)?;
        let process = SystemProcessControl::new(config.binary.clone());

        Ok(PlayerOrchestrator::new(process, surface, config))
    }
}

impl<P, S> PlayerOrchestrator<P, S>
where
    P: ProcessControl,
    S: ControlSurface,
{
    pub fn new(process: P, surface: S, config: PlayerControlConfig) -> Self {
        PlayerOrchestrator {
            process,
            surface,
            config,
        }
    }

    pub fn config(&self) -> &PlayerControlConfig {
        &self.config
    }

    /// Running needs a live process; controllable additionally needs the
    /// control surface to answer.
    pub async fn player_state(&self) -> PlayerState {
        if !self.process.is_running().await {
            return PlayerState::NotRunning;
        }

        match self.surface.probe().await {
            true => PlayerState::RunningControllable,
            false => PlayerState::RunningNoControlSurface,
        }
    }

    pub async fn ensure_stream_playing(&self, request: &StreamRequest) -> Result<PlayerAction> {
        let uri = request.uri();
        let state = self.player_state().await;
        info!("[PlayerOrchestrator][ensure_stream_playing] Player state: {state:?}");

        match state {
            PlayerState::NotRunning => {
                self.launch(uri, "launch").await?;
                Ok(PlayerAction::Launched)
            }
            PlayerState::RunningControllable => match self.inject(uri).await {
                Ok(status) => {
                    debug!("[PlayerOrchestrator][ensure_stream_playing] Injected, status {status:?}");
                    Ok(PlayerAction::Injected)
                }
                Err(e) => {
                    warn!("[PlayerOrchestrator][ensure_stream_playing] Injection failed: {e}");
                    self.relaunch(uri).await
                }
            },
            PlayerState::RunningNoControlSurface => {
                warn!("[PlayerOrchestrator][ensure_stream_playing] Running player has no control surface");
                self.relaunch(uri).await
            }
        }
    }

    /// Swaps the live player's playlist for `uri`. Only the play command
    /// decides success; a failed clear is tolerated.
    async fn inject(&self, uri: &str) -> Result<PlayerStatus> {
        self.surface.playlist().await?;

        if let Err(e) = self.surface.empty_playlist().await {
            warn!("[PlayerOrchestrator][inject] Could not clear playlist: {e}");
        }

        self.surface.play(uri).await
    }

    /// Last tier: terminate every instance, settle, launch once.
    async fn relaunch(&self, uri: &str) -> Result<PlayerAction> {
        info!("[PlayerOrchestrator][relaunch] Closing running players before relaunch");
        self.process.terminate_all().await;

        sleep(self.config.settle_delay).await;

        self.launch(uri, "relaunch").await?;
        Ok(PlayerAction::Launched)
    }

    async fn launch(&self, uri: &str, stage: &'static str) -> Result<()> {
        let args = self.config.launch_args(uri);
        info!("[PlayerOrchestrator][{stage}] Launching player for {uri}");

        self.process.launch(&args).await.map_err(|e| match e {
            Error::ResourceUnavailable { reason, .. } => Error::ResourceUnavailable { stage, reason },
            Error::Connection { reason, .. } => Error::Connection { stage, reason },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        IsRunning,
        Terminate,
        Launch(Vec<String>),
        Probe,
        Playlist,
        Empty,
        Play(String),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    struct FakeProcess {
        log: Log,
        running: bool,
        launch_fails: bool,
    }

    #[async_trait]
    impl ProcessControl for FakeProcess {
        async fn is_running(&self) -> bool {
            self.log.lock().unwrap().push(Call::IsRunning);
            self.running
        }

        async fn terminate_all(&self) {
            self.log.lock().unwrap().push(Call::Terminate);
        }

        async fn launch(&self, args: &[String]) -> Result<()> {
            self.log.lock().unwrap().push(Call::Launch(args.to_vec()));
            match self.launch_fails {
                true => Err(Error::resource_unavailable("spawn player", "vlc not found")),
                false => Ok(()),
            }
        }
    }

    struct FakeSurface {
        log: Log,
        alive: bool,
        playlist_ok: bool,
        play_ok: bool,
    }

    #[async_trait]
    impl ControlSurface for FakeSurface {
        async fn probe(&self) -> bool {
            self.log.lock().unwrap().push(Call::Probe);
            self.alive
        }

        async fn playlist(&self) -> Result<()> {
            self.log.lock().unwrap().push(Call::Playlist);
            match self.playlist_ok {
                true => Ok(()),
                false => Err(Error::connection("playlist", "connection refused")),
            }
        }

        async fn empty_playlist(&self) -> Result<()> {
            self.log.lock().unwrap().push(Call::Empty);
            Err(Error::connection("empty_playlist", "timed out"))
        }

        async fn play(&self, uri: &str) -> Result<PlayerStatus> {
            self.log.lock().unwrap().push(Call::Play(uri.to_string()));
            match self.play_ok {
                true => Ok(PlayerStatus::default()),
                false => Err(Error::connection("play", "control surface returned 500")),
            }
        }
    }

    struct Setup {
        running: bool,
        alive: bool,
        playlist_ok: bool,
        play_ok: bool,
        launch_fails: bool,
    }

    impl Default for Setup {
        fn default() -> Self {
            Setup {
                running: true,
                alive: true,
                playlist_ok: true,
                play_ok: true,
                launch_fails: false,
            }
        }
    }

    fn orchestrator(setup: Setup) -> (PlayerOrchestrator<FakeProcess, FakeSurface>, Log) {
        let log: Log = Arc::default();
        let process = FakeProcess {
            log: log.clone(),
            running: setup.running,
            launch_fails: setup.launch_fails,
        };
        let surface = FakeSurface {
            log: log.clone(),
            alive: setup.alive,
            playlist_ok: setup.playlist_ok,
            play_ok: setup.play_ok,
        };

        (
            PlayerOrchestrator::new(process, surface, PlayerControlConfig::default()),
            log,
        )
    }

    fn calls(log: &Log) -> Vec<Call> {
        log.lock().unwrap().clone()
    }

    const URI: &str = "rtsp://192.168.1.31:554/stream1";

    fn request() -> StreamRequest {
        StreamRequest::new(URI).unwrap()
    }

    fn launch_call() -> Call {
        Call::Launch(PlayerControlConfig::default().launch_args(URI))
    }

    #[tokio::test(start_paused = true)]
    async fn not_running_goes_straight_to_launch() {
        let (orchestrator, log) = orchestrator(Setup {
            running: false,
            ..Default::default()
        });

        let action = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(action, PlayerAction::Launched);
        assert_eq!(calls(&log), vec![Call::IsRunning, launch_call()]);
    }

    #[tokio::test(start_paused = true)]
    async fn controllable_player_gets_injected() {
        let (orchestrator, log) = orchestrator(Setup::default());

        let action = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(action, PlayerAction::Injected);
        assert_eq!(
            calls(&log),
            vec![
                Call::IsRunning,
                Call::Probe,
                Call::Playlist,
                Call::Empty,
                Call::Play(URI.to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn state_is_resampled_on_every_call() {
        let (orchestrator, log) = orchestrator(Setup::default());

        let first = orchestrator.ensure_stream_playing(&request()).await.unwrap();
        let second = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(first, PlayerAction::Injected);
        assert_eq!(second, PlayerAction::Injected);

        let probes = calls(&log).iter().filter(|c| **c == Call::IsRunning).count();
        assert_eq!(probes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_play_terminates_waits_and_relaunches_once() {
        let (orchestrator, log) = orchestrator(Setup {
            play_ok: false,
            ..Default::default()
        });

        let start = Instant::now();
        let action = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(action, PlayerAction::Launched);
        assert_eq!(
            calls(&log),
            vec![
                Call::IsRunning,
                Call::Probe,
                Call::Playlist,
                Call::Empty,
                Call::Play(URI.to_string()),
                Call::Terminate,
                launch_call(),
            ]
        );
        assert!(start.elapsed() >= orchestrator.config().settle_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_playlist_aborts_injection() {
        let (orchestrator, log) = orchestrator(Setup {
            playlist_ok: false,
            ..Default::default()
        });

        let action = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(action, PlayerAction::Launched);
        let log = calls(&log);
        assert!(!log.iter().any(|c| matches!(c, Call::Play(_))));
        assert!(log.contains(&Call::Terminate));
    }

    #[tokio::test(start_paused = true)]
    async fn uncontrollable_player_is_replaced() {
        let (orchestrator, log) = orchestrator(Setup {
            alive: false,
            ..Default::default()
        });

        let action = orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert_eq!(action, PlayerAction::Launched);
        assert_eq!(
            calls(&log),
            vec![Call::IsRunning, Call::Probe, Call::Terminate, launch_call()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_relaunch_is_terminal_and_names_the_stage() {
        let (orchestrator, log) = orchestrator(Setup {
            play_ok: false,
            launch_fails: true,
            ..Default::default()
        });

        let err = orchestrator.ensure_stream_playing(&request()).await.unwrap_err();

        assert_eq!(
            err,
            Error::ResourceUnavailable {
                stage: "relaunch",
                reason: "vlc not found".to_string(),
            }
        );
        let launches = calls(&log)
            .iter()
            .filter(|c| matches!(c, Call::Launch(_)))
            .count();
        assert_eq!(launches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fresh_launch_is_terminal() {
        let (orchestrator, log) = orchestrator(Setup {
            running: false,
            launch_fails: true,
            ..Default::default()
        });

        let err = orchestrator.ensure_stream_playing(&request()).await.unwrap_err();

        assert!(matches!(err, Error::ResourceUnavailable { stage: "launch", .. }));
        assert!(!calls(&log).contains(&Call::Terminate));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_comes_from_config() {
        let log: Log = Arc::default();
        let config = PlayerControlConfig {
            settle_delay: Duration::from_secs(5),
            ..Default::default()
        };
        let orchestrator = PlayerOrchestrator::new(
            FakeProcess {
                log: log.clone(),
                running: true,
                launch_fails: false,
            },
            FakeSurface {
                log,
                alive: false,
                playlist_ok: true,
                play_ok: true,
            },
            config,
        );

        let start = Instant::now();
        orchestrator.ensure_stream_playing(&request()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
