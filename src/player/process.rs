use super::ProcessControl;
use crate::error::{Error, Result};

use async_trait::async_trait;
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

const WINDOWS_INSTALL_PATHS: [&str; 2] = [
    r"C:\Program Files\VideoLAN\VLC\vlc.exe",
    r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
];
const MACOS_APP_PATH: &str = "/Applications/VLC.app/Contents/MacOS/VLC";

/// Operating system family, which decides the process commands used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    #[rustfmt::skip]
    pub fn running_check(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Platform::Linux     => ("pgrep",    vec!["vlc"]),
            Platform::MacOs     => ("pgrep",    vec!["VLC"]),
            Platform::Windows   => ("tasklist", vec!["/FI", "IMAGENAME eq vlc.exe", "/NH"]),
        }
    }

    #[rustfmt::skip]
    pub fn terminate_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Platform::Linux     => ("killall",  vec!["vlc"]),
            Platform::MacOs     => ("killall",  vec!["VLC"]),
            Platform::Windows   => ("taskkill", vec!["/F", "/IM", "vlc.exe"]),
        }
    }

    /// `pgrep` answers through its exit status; `tasklist` always succeeds
    /// and prints an info line when nothing matches.
    pub fn is_running_from(&self, succeeded: bool, stdout: &str) -> bool {
        match self {
            Platform::Linux | Platform::MacOs => succeeded && !stdout.trim().is_empty(),
            Platform::Windows => succeeded && stdout.to_lowercase().contains("vlc.exe"),
        }
    }
}

/// Real process control through the platform's command line tools.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    platform: Platform,
    binary: Option<PathBuf>,
}

impl SystemProcessControl {
    pub fn new(binary: Option<PathBuf>) -> Self {
        SystemProcessControl {
            platform: Platform::current(),
            binary,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Finds the player executable: explicit path first, then the usual
    /// per-platform locations.
    pub async fn locate_player(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.binary {
            return match binary.exists() {
                true => Ok(binary.clone()),
                false => Err(Error::resource_unavailable(
                    "locate player",
                    format!("{} does not exist", binary.display()),
                )),
            };
        }

        let found = match self.platform {
            Platform::Windows => WINDOWS_INSTALL_PATHS
                .into_iter()
                .map(PathBuf::from)
                .find(|path| path.exists()),
            Platform::MacOs => Some(PathBuf::from(MACOS_APP_PATH)).filter(|path| path.exists()),
            Platform::Linux => which("vlc").await,
        };

        found.ok_or_else(|| Error::resource_unavailable("locate player", "VLC not found on system"))
    }
}

async fn which(program: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(program).output().await.ok()?;

    if !output.status.success() {
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(path).filter(|p| !p.is_empty()).map(PathBuf::from)
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn is_running(&self) -> bool {
        let (program, args) = self.platform.running_check();

        match Command::new(program).args(&args).output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let running = self.platform.is_running_from(output.status.success(), &stdout);
                debug!("[ProcessControl][is_running] {program}: running={running}");
                running
            }
            Err(e) => {
                debug!("[ProcessControl][is_running] Could not run {program}: {e}");
                false
            }
        }
    }

    async fn terminate_all(&self) {
        let (program, args) = self.platform.terminate_command();

        match Command::new(program).args(&args).status().await {
            Ok(status) => debug!("[ProcessControl][terminate_all] {program} exited with {status}"),
            Err(e) => debug!("[ProcessControl][terminate_all] Could not run {program}: {e}"),
        }
    }

    async fn launch(&self, args: &[String]) -> Result<()> {
        let player = self.locate_player().await?;
        info!("[ProcessControl][launch] Starting {}", player.display());

        spawn_detached(&player, args)
    }
}

fn spawn_detached(program: &Path, args: &[String]) -> Result<()> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_child| ())
        .map_err(|e| Error::resource_unavailable("spawn player", e))
}
