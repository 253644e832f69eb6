// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Ouster Driver Library
//!
//! This library provides the session driver core for Ouster network LiDAR
//! sensors: it connects to a sensor, polls for the next lidar or IMU packet
//! and hands the raw packet bytes to the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │   Connector     │ ──► │   Session     │ ──► │  OusterSensor   │
//! │ (UDP/pcap/test) │     │ (poll / read) │     │ (packet buffers)│
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//! ```
//!
//! The driver owns two fixed-size packet buffers and lends them out:
//! 1. Caller configures: `sensor.configure(&config)`
//! 2. Caller polls: `sensor.poll()` blocks until lidar or IMU data is ready
//! 3. Caller reads: `sensor.read_packet(state)` fills the matching buffer
//! 4. The returned slice borrows the driver until the next poll/read
//!
//! # Modules
//!
//! - [`lidar`]: Common types, session traits, and error handling
//! - [`mode`]: Lidar mode lookup and packet-format profiles
//! - [`metadata`]: Sensor metadata record and parser
//! - [`driver`]: The [`OusterSensor`] state machine
//! - [`client`]: Live UDP session
//! - [`replay`]: Scripted session for testing
//! - [`pcap_source`]: Capture replay session (`pcap` feature)
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_ouster_driver::{
//!     Configuration, Error, OusterSensor, client::UdpConnector,
//! };
//!
//! let config = Configuration::new("192.168.1.20", "192.168.1.2");
//! let mut sensor = OusterSensor::new(UdpConnector::default());
//! sensor.configure(&config)?;
//!
//! loop {
//!     match sensor.poll() {
//!         Ok(state) => {
//!             if let Some(packet) = sensor.read_packet(state)? {
//!                 // packet.len() == sensor.lidar_packet_bytes() for lidar data
//!             }
//!         }
//!         Err(Error::SensorDataUnavailable(_)) => sensor.reset(&config)?,
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod driver;
pub mod lidar;
pub mod metadata;
pub mod mode;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod replay;

// Re-exports for convenience
pub use config::Configuration;
pub use driver::OusterSensor;
pub use lidar::{ClientState, Connector, Error, Session, SessionParams};
pub use metadata::Metadata;
pub use mode::{LidarMode, PacketFormat, lidar_mode_of_string};
