//! # CAN Link Management
//!
//! Brings the SocketCAN interface up before a session and takes it down afterwards.
//! An interface that is already up and running when we look at it belongs to someone
//! else: it is used as is and left alone on teardown.
//!
//! For an absent interface a serial-line adapter is assumed and attached with
//! `slcand` first. The interface is then configured with `ip link` for the bus
//! bitrate (250 kbit/s) and a transmit queue of 1000 frames.

use crate::constants::{DEFAULT_BITRATE, DEFAULT_INTERFACE, DEFAULT_SERIAL_DEVICE, DEFAULT_TXQUEUELEN};
use crate::error::MwCanError;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;

const IFF_UP: u32 = 0x1;
const IFF_RUNNING: u32 = 0x40;

/// State of the interface as found before we touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No such interface
    Absent,
    /// Interface exists but is not up and running
    Down,
    /// Interface is up and running
    Up,
}

/// Lifecycle of the bus link around a session.
#[async_trait::async_trait]
pub trait LinkControl: Send {
    /// Makes sure the interface is up; returns the state found before.
    async fn ensure_up(&mut self) -> Result<LinkState, MwCanError>;

    /// Undoes what `ensure_up` did. A no-op for externally managed links.
    async fn tear_down(&mut self) -> Result<(), MwCanError>;

    /// True if the interface was already up when `ensure_up` ran.
    fn is_externally_managed(&self) -> bool;
}

/// Runs the system commands that configure the link.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), MwCanError>;
}

/// Spawns commands with `tokio::process`, optionally through `sudo`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    pub use_sudo: bool,
}

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), MwCanError> {
        let mut cmd = if self.use_sudo {
            let mut cmd = tokio::process::Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            tokio::process::Command::new(program)
        };
        cmd.args(args);

        debug!("Running {} {}", program, args.join(" "));
        let output = cmd
            .output()
            .await
            .map_err(|e| MwCanError::Transport(format!("failed to spawn {program}: {e}")))?;

        if !output.status.success() {
            return Err(MwCanError::Transport(format!(
                "{program} {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Link parameters.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub interface: String,
    pub serial_device: String,
    pub bitrate: u32,
    pub txqueuelen: u32,
    /// Root of the network class directory, `/sys/class/net` on a live system
    pub sysfs_root: PathBuf,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            interface: DEFAULT_INTERFACE.to_string(),
            serial_device: DEFAULT_SERIAL_DEVICE.to_string(),
            bitrate: DEFAULT_BITRATE,
            txqueuelen: DEFAULT_TXQUEUELEN,
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }
}

/// Reads the interface state from the `flags` attribute in sysfs.
pub fn probe_link(config: &LinkConfig) -> Result<LinkState, MwCanError> {
    let dir = config.sysfs_root.join(&config.interface);
    if !dir.exists() {
        return Ok(LinkState::Absent);
    }

    let raw = fs::read_to_string(dir.join("flags"))?;
    let flags = parse_flags(&raw).ok_or_else(|| {
        MwCanError::Transport(format!("unreadable flags '{}' for {}", raw.trim(), config.interface))
    })?;

    if flags & (IFF_UP | IFF_RUNNING) == (IFF_UP | IFF_RUNNING) {
        Ok(LinkState::Up)
    } else {
        Ok(LinkState::Down)
    }
}

fn parse_flags(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u32::from_str_radix(digits, 16).ok()
}

/// `ip link` based link control.
pub struct IpLink<R: CommandRunner = SystemRunner> {
    config: LinkConfig,
    runner: R,
    found: Option<LinkState>,
}

impl IpLink<SystemRunner> {
    pub fn new(config: LinkConfig, use_sudo: bool) -> Self {
        IpLink::with_runner(config, SystemRunner { use_sudo })
    }
}

impl<R: CommandRunner> IpLink<R> {
    pub fn with_runner(config: LinkConfig, runner: R) -> Self {
        IpLink {
            config,
            runner,
            found: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    async fn ip(&self, args: &[&str]) -> Result<(), MwCanError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run("ip", &args).await
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> LinkControl for IpLink<R> {
    async fn ensure_up(&mut self) -> Result<LinkState, MwCanError> {
        let state = probe_link(&self.config)?;
        self.found = Some(state);
        let iface = self.config.interface.clone();

        match state {
            LinkState::Up => {
                info!("{} is already up, using it as is", iface);
                return Ok(state);
            }
            LinkState::Absent => {
                info!(
                    "{} not found, attaching serial adapter {}",
                    iface, self.config.serial_device
                );
                let args = vec![
                    "-f".to_string(),
                    "-s5".to_string(),
                    "-o".to_string(),
                    self.config.serial_device.clone(),
                    iface.clone(),
                ];
                self.runner.run("slcand", &args).await?;
            }
            LinkState::Down => debug!("{} present but down", iface),
        }

        let bitrate = self.config.bitrate.to_string();
        let txqueuelen = self.config.txqueuelen.to_string();
        self.ip(&["link", "set", &iface, "up", "type", "can", "bitrate", &bitrate])
            .await?;
        self.ip(&["link", "set", "up", &iface, "txqueuelen", &txqueuelen])
            .await?;
        info!("{} up at {} bit/s", iface, bitrate);
        Ok(state)
    }

    async fn tear_down(&mut self) -> Result<(), MwCanError> {
        let iface = self.config.interface.clone();
        match self.found.take() {
            None => Ok(()),
            Some(LinkState::Up) => {
                info!("{} was externally created, not removing it", iface);
                Ok(())
            }
            Some(state) => {
                info!("Shutting down {}", iface);
                self.ip(&["link", "set", &iface, "down"]).await?;
                if state == LinkState::Absent {
                    if let Err(e) = self.ip(&["link", "del", &iface]).await {
                        warn!("Could not delete {}: {}", iface, e);
                    }
                }
                Ok(())
            }
        }
    }

    fn is_externally_managed(&self) -> bool {
        self.found == Some(LinkState::Up)
    }
}
