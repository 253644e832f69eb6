// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor metadata record and parser.
//!
//! The sensor publishes its static parameters as a JSON document from
//! `/api/v1/sensor/metadata`, grouped into sections (`sensor_info`,
//! `beam_intrinsics`, `imu_intrinsics`, `lidar_intrinsics`,
//! `config_params`). Older firmware returns the same keys flattened at the
//! top level; both layouts are accepted, with the sectioned values taking
//! precedence.

use crate::lidar::Error;
use serde::{Deserialize, Serialize};

/// Placeholder used for identity fields the sensor did not report.
pub const UNKNOWN: &str = "UNKNOWN";

/// Default UDP destination port for lidar packets.
pub const DEFAULT_LIDAR_PORT: u16 = 7502;

/// Default UDP destination port for IMU packets.
pub const DEFAULT_IMU_PORT: u16 = 7503;

/// Static descriptive parameters of a sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub product_line: String,
    pub sensor_serial: String,
    pub build_revision: String,
    pub firmware_version: String,
    pub beam_azimuth_angles: Vec<f64>,
    pub beam_altitude_angles: Vec<f64>,
    /// Row-major 4x4 homogeneous transform.
    pub imu_to_sensor_transform: Vec<f64>,
    /// Row-major 4x4 homogeneous transform.
    pub lidar_to_sensor_transform: Vec<f64>,
    pub lidar_port: u16,
    pub imu_port: u16,
}

impl Metadata {
    /// Sentinel returned while no session is connected.
    ///
    /// The port numbers intentionally mirror the legacy driver, which
    /// reports 7503 for lidar and 7502 for IMU when disconnected.
    pub fn unknown() -> Self {
        Self {
            product_line: UNKNOWN.to_string(),
            sensor_serial: UNKNOWN.to_string(),
            build_revision: UNKNOWN.to_string(),
            firmware_version: UNKNOWN.to_string(),
            beam_azimuth_angles: Vec::new(),
            beam_altitude_angles: Vec::new(),
            imu_to_sensor_transform: Vec::new(),
            lidar_to_sensor_transform: Vec::new(),
            lidar_port: 7503,
            imu_port: 7502,
        }
    }

    /// Number of beams described by the altitude table.
    pub fn beam_count(&self) -> usize {
        self.beam_altitude_angles.len()
    }
}

#[derive(Default, Deserialize)]
struct SensorInfoSection {
    #[serde(default)]
    prod_line: Option<String>,
    #[serde(default)]
    prod_sn: Option<serde_json::Value>,
    #[serde(default)]
    build_rev: Option<String>,
    #[serde(default)]
    image_rev: Option<String>,
}

#[derive(Default, Deserialize)]
struct BeamIntrinsicsSection {
    #[serde(default)]
    beam_altitude_angles: Option<Vec<f64>>,
    #[serde(default)]
    beam_azimuth_angles: Option<Vec<f64>>,
}

#[derive(Default, Deserialize)]
struct ImuIntrinsicsSection {
    #[serde(default)]
    imu_to_sensor_transform: Option<Vec<f64>>,
}

#[derive(Default, Deserialize)]
struct LidarIntrinsicsSection {
    #[serde(default)]
    lidar_to_sensor_transform: Option<Vec<f64>>,
}

#[derive(Default, Deserialize)]
struct ConfigParamsSection {
    #[serde(default)]
    udp_port_lidar: Option<u16>,
    #[serde(default)]
    udp_port_imu: Option<u16>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    sensor_info: Option<SensorInfoSection>,
    #[serde(default)]
    beam_intrinsics: Option<BeamIntrinsicsSection>,
    #[serde(default)]
    imu_intrinsics: Option<ImuIntrinsicsSection>,
    #[serde(default)]
    lidar_intrinsics: Option<LidarIntrinsicsSection>,
    #[serde(default)]
    config_params: Option<ConfigParamsSection>,

    // Legacy flat layout
    #[serde(flatten)]
    flat_info: SensorInfoSection,
    #[serde(flatten)]
    flat_beams: BeamIntrinsicsSection,
    #[serde(flatten)]
    flat_imu: ImuIntrinsicsSection,
    #[serde(flatten)]
    flat_lidar: LidarIntrinsicsSection,
    #[serde(flatten)]
    flat_ports: ConfigParamsSection,
}

/// Serial numbers are strings on current firmware and integers on older
/// releases.
fn serial_string(value: serde_json::Value) -> Result<String, Error> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::MetadataParse(format!(
            "prod_sn must be a string or number, got {}",
            other
        ))),
    }
}

fn check_transform(name: &str, transform: &[f64]) -> Result<(), Error> {
    if !transform.is_empty() && transform.len() != 16 {
        return Err(Error::MetadataParse(format!(
            "{} must have 16 elements, got {}",
            name,
            transform.len()
        )));
    }
    Ok(())
}

/// Parse a raw metadata document into a [`Metadata`] record.
///
/// Missing identity fields become [`UNKNOWN`], missing tables become empty
/// and missing ports fall back to [`DEFAULT_LIDAR_PORT`] and
/// [`DEFAULT_IMU_PORT`]. Malformed JSON, wrongly typed values, mismatched
/// beam tables and transforms that are not 4x4 are rejected with
/// [`Error::MetadataParse`].
pub fn parse_metadata(blob: &str) -> Result<Metadata, Error> {
    let raw: RawMetadata = serde_json::from_str(blob)?;

    let info = raw.sensor_info.unwrap_or_default();
    let beams = raw.beam_intrinsics.unwrap_or_default();
    let imu = raw.imu_intrinsics.unwrap_or_default();
    let lidar = raw.lidar_intrinsics.unwrap_or_default();
    let ports = raw.config_params.unwrap_or_default();

    let identity = |primary: Option<String>, fallback: Option<String>| {
        primary.or(fallback).unwrap_or_else(|| UNKNOWN.to_string())
    };

    let sensor_serial = match info.prod_sn.or(raw.flat_info.prod_sn) {
        Some(value) => serial_string(value)?,
        None => UNKNOWN.to_string(),
    };

    let metadata = Metadata {
        product_line: identity(info.prod_line, raw.flat_info.prod_line),
        sensor_serial,
        build_revision: identity(info.build_rev, raw.flat_info.build_rev),
        firmware_version: identity(info.image_rev, raw.flat_info.image_rev),
        beam_azimuth_angles: beams
            .beam_azimuth_angles
            .or(raw.flat_beams.beam_azimuth_angles)
            .unwrap_or_default(),
        beam_altitude_angles: beams
            .beam_altitude_angles
            .or(raw.flat_beams.beam_altitude_angles)
            .unwrap_or_default(),
        imu_to_sensor_transform: imu
            .imu_to_sensor_transform
            .or(raw.flat_imu.imu_to_sensor_transform)
            .unwrap_or_default(),
        lidar_to_sensor_transform: lidar
            .lidar_to_sensor_transform
            .or(raw.flat_lidar.lidar_to_sensor_transform)
            .unwrap_or_default(),
        lidar_port: ports
            .udp_port_lidar
            .or(raw.flat_ports.udp_port_lidar)
            .unwrap_or(DEFAULT_LIDAR_PORT),
        imu_port: ports
            .udp_port_imu
            .or(raw.flat_ports.udp_port_imu)
            .unwrap_or(DEFAULT_IMU_PORT),
    };

    if metadata.beam_azimuth_angles.len() != metadata.beam_altitude_angles.len() {
        return Err(Error::MetadataParse(format!(
            "beam tables differ in length: {} azimuth, {} altitude",
            metadata.beam_azimuth_angles.len(),
            metadata.beam_altitude_angles.len()
        )));
    }
    check_transform("imu_to_sensor_transform", &metadata.imu_to_sensor_transform)?;
    check_transform(
        "lidar_to_sensor_transform",
        &metadata.lidar_to_sensor_transform,
    )?;

    Ok(metadata)
}
