//! Mock CAN bus implementation for testing
//!
//! This module provides an in-memory bus that records every transmitted frame and
//! hands out scripted reply frames, so the session can be tested without hardware.
//! An empty reply queue behaves like a receive timeout.

use crate::can::frame::CanFrame;
use crate::can::transport::CanTransport;
use crate::error::MwCanError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock bus that simulates a device answering on the wire
#[derive(Clone, Default)]
pub struct MockCanBus {
    /// Frames sent by the session (outgoing)
    pub tx_frames: Arc<Mutex<Vec<CanFrame>>>,
    /// Frames to be received by the session (incoming)
    pub rx_frames: Arc<Mutex<VecDeque<CanFrame>>>,
    /// Simulated transport failure for the next operation
    pub next_error: Arc<Mutex<Option<String>>>,
    /// Number of receive calls that found no frame
    pub timeouts: Arc<Mutex<usize>>,
}

impl MockCanBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be received
    pub fn queue_reply(&self, id: u32, data: &[u8]) {
        self.rx_frames
            .lock()
            .unwrap()
            .push_back(CanFrame::new(id, data));
    }

    /// Get the frames written to the bus
    pub fn sent(&self) -> Vec<CanFrame> {
        self.tx_frames.lock().unwrap().clone()
    }

    /// Number of receives that timed out
    pub fn timeouts(&self) -> usize {
        *self.timeouts.lock().unwrap()
    }

    /// Clear all queues
    pub fn clear(&self) {
        self.tx_frames.lock().unwrap().clear();
        self.rx_frames.lock().unwrap().clear();
        *self.timeouts.lock().unwrap() = 0;
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, message: &str) {
        *self.next_error.lock().unwrap() = Some(message.to_string());
    }

    fn take_error(&self) -> Option<MwCanError> {
        self.next_error
            .lock()
            .unwrap()
            .take()
            .map(MwCanError::Transport)
    }
}

#[async_trait::async_trait]
impl CanTransport for MockCanBus {
    async fn send(&mut self, frame: &CanFrame) -> Result<(), MwCanError> {
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        self.tx_frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    async fn recv(&mut self, _wait: Duration) -> Result<Option<CanFrame>, MwCanError> {
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        let next = self.rx_frames.lock().unwrap().pop_front();
        if next.is_none() {
            *self.timeouts.lock().unwrap() += 1;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_and_replays() {
        let mut bus = MockCanBus::new();
        bus.queue_reply(0x000C_0203, &[0x60, 0x00, 0x06, 0x0A]);

        bus.send(&CanFrame::new(0x000C_0303, &[0x60, 0x00]))
            .await
            .unwrap();
        assert_eq!(bus.sent().len(), 1);

        let reply = bus.recv(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(reply.id, 0x000C_0203);
        assert!(bus.recv(Duration::from_millis(10)).await.unwrap().is_none());
        assert_eq!(bus.timeouts(), 1);
    }

    #[tokio::test]
    async fn test_mock_injected_error() {
        let mut bus = MockCanBus::new();
        bus.set_next_error("bus off");
        let err = bus.send(&CanFrame::new(1, &[])).await.unwrap_err();
        assert!(matches!(err, MwCanError::Transport(_)));
        assert!(bus.send(&CanFrame::new(1, &[])).await.is_ok());
    }
}
