// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR session types and trait abstraction.
//!
//! This module defines the contract between the [`crate::driver::OusterSensor`]
//! and whatever owns the sockets: a [`Connector`] creates a [`Session`], and
//! the session reports [`ClientState`] transitions and fills packet buffers.

use crate::mode::LidarMode;
use std::fmt;

/// Common error type for driver operations
#[derive(Debug)]
pub enum Error {
    /// The lidar mode string is not one the sensor supports
    InvalidConfiguration(String),
    /// The connector could not create a session
    ConnectionFailed(String),
    /// Poll or read attempted before a successful configure
    NotConfigured,
    /// Poll returned a state that carries no sensor data
    SensorDataUnavailable(ClientState),
    /// Read attempted with a state that was not produced by the last poll
    InvalidState(ClientState),
    /// Malformed metadata document
    MetadataParse(String),
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// HTTP request to the sensor API failed
    Http(String),
    /// Invalid capture data
    InvalidPacket(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(mode) => write!(f, "invalid lidar mode: {}", mode),
            Error::ConnectionFailed(msg) => {
                write!(f, "failed to create connection to lidar: {}", msg)
            }
            Error::NotConfigured => write!(f, "sensor is not configured"),
            Error::SensorDataUnavailable(state) => write!(
                f,
                "failed to get valid sensor data from lidar, returned state {}",
                state
            ),
            Error::InvalidState(state) => write!(f, "invalid client state for read: {}", state),
            Error::MetadataParse(msg) => write!(f, "metadata parse error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Http(msg) => write!(f, "http error: {}", msg),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MetadataParse(err.to_string())
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Error::Http(err.to_string())
    }
}

/// Outcome of a single session poll.
///
/// The raw encoding matches the sensor client's bit values so sessions that
/// report a bitmask can be mapped with [`ClientState::from_bits`]. Values
/// that do not correspond to exactly one state are kept as
/// [`ClientState::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientState {
    TimedOut,
    Error,
    LidarData,
    ImuData,
    Exit,
    Other(u8),
}

impl ClientState {
    pub const TIMEOUT_BITS: u8 = 0;
    pub const ERROR_BITS: u8 = 1;
    pub const LIDAR_DATA_BITS: u8 = 2;
    pub const IMU_DATA_BITS: u8 = 4;
    pub const EXIT_BITS: u8 = 8;

    pub fn from_bits(bits: u8) -> ClientState {
        match bits {
            Self::TIMEOUT_BITS => ClientState::TimedOut,
            Self::ERROR_BITS => ClientState::Error,
            Self::LIDAR_DATA_BITS => ClientState::LidarData,
            Self::IMU_DATA_BITS => ClientState::ImuData,
            Self::EXIT_BITS => ClientState::Exit,
            other => ClientState::Other(other),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ClientState::TimedOut => Self::TIMEOUT_BITS,
            ClientState::Error => Self::ERROR_BITS,
            ClientState::LidarData => Self::LIDAR_DATA_BITS,
            ClientState::ImuData => Self::IMU_DATA_BITS,
            ClientState::Exit => Self::EXIT_BITS,
            ClientState::Other(bits) => *bits,
        }
    }

    /// True for the two states that carry a packet.
    pub fn has_data(&self) -> bool {
        matches!(self, ClientState::LidarData | ClientState::ImuData)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientState::TimedOut => write!(f, "TIMEOUT"),
            ClientState::Error => write!(f, "ERROR"),
            ClientState::LidarData => write!(f, "LIDAR_DATA"),
            ClientState::ImuData => write!(f, "IMU_DATA"),
            ClientState::Exit => write!(f, "EXIT"),
            ClientState::Other(bits) => write!(f, "UNKNOWN({:#04x})", bits),
        }
    }
}

/// Validated parameters handed to a [`Connector`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub lidar_ip: String,
    pub computer_ip: String,
    pub mode: LidarMode,
    pub lidar_port: u16,
    pub imu_port: u16,
}

/// Connection to a sensor.
///
/// Buffers passed to the read methods are one byte longer than the expected
/// packet so that oversized datagrams can be detected and rejected.
pub trait Session: Send {
    /// Block until the next state transition or the internal timeout.
    fn poll(&mut self) -> ClientState;

    /// Fill `buf` with the next lidar packet.
    ///
    /// # Returns
    /// - `true` if a complete packet was written
    /// - `false` if the read failed; the buffer contents are unspecified
    fn read_lidar_packet(&mut self, buf: &mut [u8]) -> bool;

    /// Fill `buf` with the next IMU packet. Same contract as
    /// [`Session::read_lidar_packet`].
    fn read_imu_packet(&mut self, buf: &mut [u8]) -> bool;

    /// Fetch the raw metadata document from the sensor.
    fn fetch_metadata(&mut self) -> Result<String, Error>;
}

/// Factory for [`Session`]s.
pub trait Connector {
    type Session: Session;

    /// Open a session bound to the given mode, IP pair and port pair.
    fn connect(&self, params: &SessionParams) -> Result<Self::Session, Error>;
}
