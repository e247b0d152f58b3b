//! # CAN Transport
//!
//! The session talks to the bus only through [`CanTransport`], so the protocol logic
//! runs unchanged against a SocketCAN interface ([`SocketCanBus`]) or the in-memory
//! [`crate::can::mock::MockCanBus`] used in tests.
//!
//! A receive waits at most the given duration and yields `Ok(None)` when nothing
//! arrived; a timeout is an expected outcome, not an error.

use crate::can::frame::CanFrame;
use crate::error::MwCanError;
use log::{debug, trace};
use socketcan::tokio::CanSocket;
use socketcan::{CanFrame as SocketFrame, EmbeddedFrame, ExtendedId, Id as CanId};
use std::time::Duration;
use tokio::time::timeout;

/// Frame-level access to a CAN bus.
#[async_trait::async_trait]
pub trait CanTransport: Send {
    /// Queues one frame for transmission.
    async fn send(&mut self, frame: &CanFrame) -> Result<(), MwCanError>;

    /// Waits up to `wait` for the next data frame.
    async fn recv(&mut self, wait: Duration) -> Result<Option<CanFrame>, MwCanError>;
}

/// SocketCAN backed transport using extended identifiers.
pub struct SocketCanBus {
    interface: String,
    socket: CanSocket,
}

impl SocketCanBus {
    /// Opens a raw CAN socket on `interface` (e.g. `can0`).
    pub fn open(interface: &str) -> Result<Self, MwCanError> {
        let socket = CanSocket::open(interface).map_err(|e| {
            MwCanError::Transport(format!("failed to open CAN interface {interface}: {e}"))
        })?;
        debug!("Opened CAN socket on {}", interface);
        Ok(SocketCanBus {
            interface: interface.to_string(),
            socket,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

#[async_trait::async_trait]
impl CanTransport for SocketCanBus {
    async fn send(&mut self, frame: &CanFrame) -> Result<(), MwCanError> {
        let id = ExtendedId::new(frame.id)
            .ok_or_else(|| MwCanError::Transport(format!("invalid extended id {:#x}", frame.id)))?;
        let wire = SocketFrame::new(id, &frame.data)
            .ok_or_else(|| MwCanError::Transport(format!("cannot build frame {frame}")))?;

        trace!("TX {}", frame);
        self.socket
            .write_frame(wire)
            .await
            .map_err(|e| MwCanError::Transport(format!("write on {}: {e}", self.interface)))
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<CanFrame>, MwCanError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let read = match timeout(remaining, self.socket.read_frame()).await {
                Ok(read) => read,
                Err(_) => return Ok(None),
            };

            match read {
                Ok(SocketFrame::Data(data)) => {
                    let id = match data.id() {
                        CanId::Standard(id) => u32::from(id.as_raw()),
                        CanId::Extended(id) => id.as_raw(),
                    };
                    let frame = CanFrame::new(id, data.data());
                    trace!("RX {}", frame);
                    return Ok(Some(frame));
                }
                Ok(other) => {
                    // Remote and error frames carry no reply; keep waiting.
                    debug!("Skipping non-data frame on {}: {:?}", self.interface, other);
                }
                Err(e) => {
                    return Err(MwCanError::Transport(format!(
                        "read on {}: {e}",
                        self.interface
                    )))
                }
            }
        }
    }
}
