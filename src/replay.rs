// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scripted session for testing and benchmarking.
//!
//! [`ReplaySession`] plays back a fixed sequence of [`ReplayEvent`]s, so the
//! driver's poll/read state machine can be exercised without hardware.
//!
//! # Example
//!
//! ```
//! use edgefirst_ouster_driver::{
//!     ClientState, Configuration, OusterSensor,
//!     replay::{ReplayConnector, ReplayEvent},
//! };
//!
//! let connector = ReplayConnector::new(vec![
//!     ReplayEvent::Imu(vec![7; 48]),
//!     ReplayEvent::State(ClientState::TimedOut),
//! ]);
//! let mut sensor = OusterSensor::new(connector);
//! sensor.configure(&Configuration::new("10.0.0.20", "10.0.0.2")).unwrap();
//!
//! let state = sensor.poll().unwrap();
//! assert_eq!(state, ClientState::ImuData);
//! assert_eq!(sensor.read_packet(state).unwrap(), Some(&[7u8; 48][..]));
//! assert!(sensor.poll().is_err());
//! ```

use crate::lidar::{ClientState, Connector, Error, Session, SessionParams};
use std::{
    cell::{Cell, RefCell},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// One scripted step of a [`ReplaySession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayEvent {
    /// Poll reports lidar data and the next lidar read yields these bytes
    Lidar(Vec<u8>),
    /// Poll reports IMU data and the next IMU read yields these bytes
    Imu(Vec<u8>),
    /// Poll reports the given state with no packet behind it
    State(ClientState),
    /// Poll reports the given state but the following read fails
    DroppedRead(ClientState),
}

impl ReplayEvent {
    fn state(&self) -> ClientState {
        match self {
            ReplayEvent::Lidar(_) => ClientState::LidarData,
            ReplayEvent::Imu(_) => ClientState::ImuData,
            ReplayEvent::State(state) | ReplayEvent::DroppedRead(state) => *state,
        }
    }
}

/// Session that replays scripted events.
///
/// Once the script is exhausted every poll returns [`ClientState::Exit`].
pub struct ReplaySession {
    events: Vec<ReplayEvent>,
    index: usize,
    /// Event announced by the last poll and not yet read
    current: Option<usize>,
    metadata: Option<String>,
    live: Option<Arc<AtomicUsize>>,
}

impl ReplaySession {
    pub fn new(events: Vec<ReplayEvent>) -> Self {
        Self {
            events,
            index: 0,
            current: None,
            metadata: None,
            live: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Metadata document returned by [`Session::fetch_metadata`].
    pub fn with_metadata(mut self, blob: impl Into<String>) -> Self {
        self.metadata = Some(blob.into());
        self
    }

    /// Rewind to the first event.
    pub fn reset(&mut self) {
        self.index = 0;
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn has_more(&self) -> bool {
        self.index < self.events.len()
    }

    fn read(&mut self, state: ClientState, buf: &mut [u8]) -> bool {
        let Some(index) = self.current.take() else {
            return false;
        };

        let bytes = match (&self.events[index], state) {
            (ReplayEvent::Lidar(bytes), ClientState::LidarData) => bytes,
            (ReplayEvent::Imu(bytes), ClientState::ImuData) => bytes,
            _ => return false,
        };

        // The buffer carries one spare byte past the expected packet length
        if bytes.len() + 1 != buf.len() {
            return false;
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        true
    }
}

impl Session for ReplaySession {
    fn poll(&mut self) -> ClientState {
        if self.index >= self.events.len() {
            self.current = None;
            return ClientState::Exit;
        }

        let state = self.events[self.index].state();
        self.current = Some(self.index);
        self.index += 1;
        state
    }

    fn read_lidar_packet(&mut self, buf: &mut [u8]) -> bool {
        self.read(ClientState::LidarData, buf)
    }

    fn read_imu_packet(&mut self, buf: &mut [u8]) -> bool {
        self.read(ClientState::ImuData, buf)
    }

    fn fetch_metadata(&mut self) -> Result<String, Error> {
        self.metadata.clone().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no metadata in replay script",
            ))
        })
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Connector handing out fresh [`ReplaySession`]s of one script.
///
/// It records every connection attempt so tests can check how the driver
/// manages its session.
pub struct ReplayConnector {
    events: Vec<ReplayEvent>,
    metadata: Option<String>,
    refuse: RefCell<Option<String>>,
    connects: Cell<usize>,
    last_params: RefCell<Option<SessionParams>>,
    live: Arc<AtomicUsize>,
    max_live_at_connect: Cell<usize>,
}

impl ReplayConnector {
    pub fn new(events: Vec<ReplayEvent>) -> Self {
        Self {
            events,
            metadata: None,
            refuse: RefCell::new(None),
            connects: Cell::new(0),
            last_params: RefCell::new(None),
            live: Arc::new(AtomicUsize::new(0)),
            max_live_at_connect: Cell::new(0),
        }
    }

    pub fn with_metadata(mut self, blob: impl Into<String>) -> Self {
        self.metadata = Some(blob.into());
        self
    }

    /// Fail subsequent connection attempts with a connection-refused error.
    pub fn refuse(&self, reason: impl Into<String>) {
        self.refuse.replace(Some(reason.into()));
    }

    /// Accept connection attempts again.
    pub fn accept(&self) {
        self.refuse.replace(None);
    }

    /// Number of connection attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.get()
    }

    pub fn last_params(&self) -> Option<SessionParams> {
        self.last_params.borrow().clone()
    }

    /// Sessions created by this connector that have not been dropped.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of live sessions observed when a connection started.
    pub fn max_live_at_connect(&self) -> usize {
        self.max_live_at_connect.get()
    }
}

impl Connector for ReplayConnector {
    type Session = ReplaySession;

    fn connect(&self, params: &SessionParams) -> Result<ReplaySession, Error> {
        self.connects.set(self.connects.get() + 1);
        self.last_params.replace(Some(params.clone()));

        let live = self.live.load(Ordering::SeqCst);
        self.max_live_at_connect
            .set(self.max_live_at_connect.get().max(live));

        if let Some(reason) = self.refuse.borrow().as_ref() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                reason.clone(),
            )));
        }

        let mut session = ReplaySession::new(self.events.clone());
        session.metadata = self.metadata.clone();
        self.live.fetch_add(1, Ordering::SeqCst);
        session.live = Some(self.live.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_session() {
        let mut session = ReplaySession::new(vec![
            ReplayEvent::Lidar(vec![1, 2, 3]),
            ReplayEvent::Imu(vec![4, 5]),
            ReplayEvent::State(ClientState::Error),
        ]);
        assert_eq!(session.len(), 3);

        let mut lidar = [0u8; 4];
        let mut imu = [0u8; 3];

        assert_eq!(session.poll(), ClientState::LidarData);
        assert!(session.read_lidar_packet(&mut lidar));
        assert_eq!(&lidar[..3], &[1, 2, 3]);

        // Packet already consumed
        assert!(!session.read_lidar_packet(&mut lidar));

        assert_eq!(session.poll(), ClientState::ImuData);
        // Wrong stream for the announced packet
        assert!(!session.read_lidar_packet(&mut lidar));

        assert_eq!(session.poll(), ClientState::Error);
        assert!(!session.read_imu_packet(&mut imu));

        assert!(!session.has_more());
        assert_eq!(session.poll(), ClientState::Exit);
        assert_eq!(session.poll(), ClientState::Exit);
    }

    #[test]
    fn test_replay_rejects_wrong_length() {
        let mut session = ReplaySession::new(vec![ReplayEvent::Imu(vec![9; 48])]);
        let mut short = [0u8; 48];
        assert_eq!(session.poll(), ClientState::ImuData);
        assert!(!session.read_imu_packet(&mut short));
    }

    #[test]
    fn test_replay_reset() {
        let mut session = ReplaySession::new(vec![ReplayEvent::State(ClientState::TimedOut)]);
        assert_eq!(session.poll(), ClientState::TimedOut);
        assert!(!session.has_more());

        session.reset();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.poll(), ClientState::TimedOut);
    }

    #[test]
    fn test_replay_metadata() {
        let mut session = ReplaySession::empty();
        assert!(session.is_empty());
        assert!(matches!(session.fetch_metadata(), Err(Error::Io(_))));

        let mut session = ReplaySession::empty().with_metadata("{}");
        assert_eq!(session.fetch_metadata().unwrap(), "{}");
    }

    #[test]
    fn test_connector_tracks_sessions() {
        let connector = ReplayConnector::new(Vec::new());
        let params = SessionParams {
            lidar_ip: "10.0.0.20".to_string(),
            computer_ip: "10.0.0.2".to_string(),
            mode: crate::mode::LidarMode::Mode1024x10,
            lidar_port: 7502,
            imu_port: 7503,
        };

        let first = connector.connect(&params).unwrap();
        assert_eq!(connector.live_sessions(), 1);
        let second = connector.connect(&params).unwrap();
        assert_eq!(connector.live_sessions(), 2);
        assert_eq!(connector.max_live_at_connect(), 1);

        drop(first);
        drop(second);
        assert_eq!(connector.live_sessions(), 0);

        connector.refuse("no route to host");
        assert!(connector.connect(&params).is_err());
        assert_eq!(connector.connects(), 3);
        assert_eq!(connector.live_sessions(), 0);

        connector.accept();
        assert!(connector.connect(&params).is_ok());
        assert_eq!(connector.last_params(), Some(params));
    }
}
