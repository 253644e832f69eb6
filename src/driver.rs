// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Ouster sensor driver.
//!
//! [`OusterSensor`] owns the packet buffers and, once configured, exactly
//! one [`Session`]. A caller drives it with a simple loop:
//!
//! ```ignore
//! let mut sensor = OusterSensor::new(UdpConnector::default());
//! sensor.configure(&config)?;
//!
//! loop {
//!     let state = sensor.poll()?;
//!     if let Some(packet) = sensor.read_packet(state)? {
//!         // packet borrows the sensor until the next poll/read
//!     }
//! }
//! ```
//!
//! The returned packet slice borrows the driver, so it cannot outlive the
//! next `poll` or `read_packet` call which overwrites the buffer in place.

use crate::{
    config::Configuration,
    lidar::{ClientState, Connector, Error, Session, SessionParams},
    metadata::{Metadata, parse_metadata},
    mode::{LidarMode, PacketFormat, lidar_mode_of_string},
};
use tracing::{debug, info, instrument, trace, warn};

pub struct OusterSensor<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    mode: Option<LidarMode>,
    format: PacketFormat,
    /// Sized to the lidar packet plus one spare byte
    lidar_packet: Vec<u8>,
    /// Sized to the IMU packet plus one spare byte
    imu_packet: Vec<u8>,
    last_state: Option<ClientState>,
}

impl<C: Connector> OusterSensor<C> {
    /// Create an unconfigured driver for the default packet format.
    pub fn new(connector: C) -> Self {
        Self::with_format(connector, PacketFormat::default())
    }

    /// Create an unconfigured driver whose buffers match `format`.
    pub fn with_format(connector: C, format: PacketFormat) -> Self {
        Self {
            connector,
            session: None,
            mode: None,
            format,
            lidar_packet: vec![0; format.lidar_packet_bytes() + 1],
            imu_packet: vec![0; format.imu_packet_bytes() + 1],
            last_state: None,
        }
    }

    /// Validate `config` and replace the current session with a new one.
    ///
    /// An unrecognized lidar mode fails with [`Error::InvalidConfiguration`]
    /// and leaves the driver untouched. Otherwise the previous session is
    /// released before connecting; if the connector fails the driver is left
    /// unconfigured and [`Error::ConnectionFailed`] is returned.
    #[instrument(skip_all, fields(lidar_ip = %config.lidar_ip, lidar_mode = %config.lidar_mode))]
    pub fn configure(&mut self, config: &Configuration) -> Result<(), Error> {
        let mode = lidar_mode_of_string(&config.lidar_mode)
            .ok_or_else(|| Error::InvalidConfiguration(config.lidar_mode.clone()))?;

        let params = SessionParams {
            lidar_ip: config.lidar_ip.clone(),
            computer_ip: config.computer_ip.clone(),
            mode,
            lidar_port: config.lidar_port,
            imu_port: config.imu_port,
        };

        self.release();

        let session = self.connector.connect(&params).map_err(|err| match err {
            Error::ConnectionFailed(_) => err,
            err => Error::ConnectionFailed(err.to_string()),
        })?;

        info!(
            "connected to lidar {} in mode {} (lidar port {}, imu port {})",
            params.lidar_ip, mode, params.lidar_port, params.imu_port
        );
        self.session = Some(session);
        self.mode = Some(mode);
        Ok(())
    }

    /// Release the current session, if any, then configure from scratch.
    pub fn reset(&mut self, config: &Configuration) -> Result<(), Error> {
        self.release();
        self.configure(config)
    }

    /// Drop the current session. Returns whether one was held.
    pub fn release(&mut self) -> bool {
        self.mode = None;
        self.last_state = None;
        match self.session.take() {
            Some(session) => {
                drop(session);
                debug!("released lidar session");
                true
            }
            None => false,
        }
    }

    /// Block until the session reports the next state.
    ///
    /// Only [`ClientState::LidarData`] and [`ClientState::ImuData`] are
    /// successful outcomes; every other state is returned as
    /// [`Error::SensorDataUnavailable`]. No retry is attempted.
    pub fn poll(&mut self) -> Result<ClientState, Error> {
        let session = self.session.as_mut().ok_or(Error::NotConfigured)?;

        let state = session.poll();
        trace!("poll returned {}", state);

        if state.has_data() {
            self.last_state = Some(state);
            Ok(state)
        } else {
            warn!("lidar session reported {}", state);
            self.last_state = None;
            Err(Error::SensorDataUnavailable(state))
        }
    }

    /// Read the packet announced by the last successful [`Self::poll`].
    ///
    /// # Returns
    /// - `Ok(Some(packet))` with exactly one packet worth of bytes
    /// - `Ok(None)` if the session failed to read a complete packet
    /// - `Err(Error::InvalidState)` if `state` is not the last poll result
    pub fn read_packet(&mut self, state: ClientState) -> Result<Option<&[u8]>, Error> {
        let session = self.session.as_mut().ok_or(Error::NotConfigured)?;

        if self.last_state != Some(state) {
            return Err(Error::InvalidState(state));
        }

        let (buffer, len) = match state {
            ClientState::ImuData => {
                if !session.read_imu_packet(&mut self.imu_packet) {
                    warn!("imu packet read failed");
                    return Ok(None);
                }
                (&self.imu_packet, self.format.imu_packet_bytes())
            }
            ClientState::LidarData => {
                if !session.read_lidar_packet(&mut self.lidar_packet) {
                    warn!("lidar packet read failed");
                    return Ok(None);
                }
                (&self.lidar_packet, self.format.lidar_packet_bytes())
            }
            state => return Err(Error::InvalidState(state)),
        };

        Ok(Some(&buffer[..len]))
    }

    /// Static sensor parameters.
    ///
    /// Without a session this returns [`Metadata::unknown`] and never fails.
    pub fn metadata(&mut self) -> Result<Metadata, Error> {
        match self.session.as_mut() {
            Some(session) => {
                let blob = session.fetch_metadata()?;
                parse_metadata(&blob)
            }
            None => Ok(Metadata::unknown()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.session.is_some()
    }

    /// Mode of the active session.
    pub fn lidar_mode(&self) -> Option<LidarMode> {
        self.mode
    }

    /// State of the last successful poll, cleared by failed polls and
    /// reconfiguration.
    pub fn last_state(&self) -> Option<ClientState> {
        self.last_state
    }

    pub fn packet_format(&self) -> PacketFormat {
        self.format
    }

    pub fn lidar_packet_bytes(&self) -> usize {
        self.format.lidar_packet_bytes()
    }

    pub fn imu_packet_bytes(&self) -> usize {
        self.format.imu_packet_bytes()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayConnector, ReplayEvent};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::{
        Registry,
        layer::{Context, Layer, SubscriberExt},
    };

    /// Counts events logged at warning level.
    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn config() -> Configuration {
        Configuration::new("10.0.0.20", "10.0.0.2")
    }

    #[test]
    fn test_buffers_have_spare_byte() {
        let sensor = OusterSensor::new(ReplayConnector::new(Vec::new()));
        assert_eq!(sensor.lidar_packet.len(), 12609);
        assert_eq!(sensor.imu_packet.len(), 49);
        assert!(!sensor.is_configured());
        assert_eq!(sensor.lidar_mode(), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut sensor = OusterSensor::new(ReplayConnector::new(Vec::new()));
        assert!(!sensor.release());
        sensor.configure(&config()).unwrap();
        assert!(sensor.release());
        assert!(!sensor.release());
        assert!(!sensor.is_configured());
    }

    #[test]
    fn test_connector_error_becomes_connection_failed() {
        let connector = ReplayConnector::new(Vec::new());
        connector.refuse("connection refused");
        let mut sensor = OusterSensor::new(connector);

        match sensor.configure(&config()) {
            Err(Error::ConnectionFailed(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(!sensor.is_configured());
    }

    #[test]
    fn test_failed_poll_clears_last_state() {
        let format = PacketFormat::OS1_16;
        let connector = ReplayConnector::new(vec![
            ReplayEvent::Lidar(vec![1; format.lidar_packet_bytes()]),
            ReplayEvent::State(ClientState::TimedOut),
        ]);
        let mut sensor = OusterSensor::with_format(connector, format);
        sensor.configure(&config()).unwrap();

        assert_eq!(sensor.poll().unwrap(), ClientState::LidarData);
        assert_eq!(sensor.last_state(), Some(ClientState::LidarData));
        assert!(sensor.poll().is_err());
        assert_eq!(sensor.last_state(), None);
        assert!(matches!(
            sensor.read_packet(ClientState::LidarData),
            Err(Error::InvalidState(ClientState::LidarData))
        ));
    }

    #[test]
    fn test_warns_on_non_data_state_and_dropped_read() {
        let format = PacketFormat::OS1_16;
        let connector = ReplayConnector::new(vec![
            ReplayEvent::Lidar(vec![1; format.lidar_packet_bytes()]),
            ReplayEvent::State(ClientState::TimedOut),
            ReplayEvent::DroppedRead(ClientState::ImuData),
        ]);
        let mut sensor = OusterSensor::with_format(connector, format);
        let warnings = WarnCounter::default();
        let subscriber = Registry::default().with(warnings.clone());

        tracing::subscriber::with_default(subscriber, || {
            sensor.configure(&config()).unwrap();

            let state = sensor.poll().unwrap();
            assert!(sensor.read_packet(state).unwrap().is_some());
            assert_eq!(warnings.0.load(Ordering::SeqCst), 0);

            assert!(sensor.poll().is_err());
            assert_eq!(warnings.0.load(Ordering::SeqCst), 1);

            let state = sensor.poll().unwrap();
            assert_eq!(sensor.read_packet(state).unwrap(), None);
            assert_eq!(warnings.0.load(Ordering::SeqCst), 2);
        });
    }
}
