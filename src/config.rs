// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::metadata::{DEFAULT_IMU_PORT, DEFAULT_LIDAR_PORT};
use serde::{Deserialize, Serialize};

/// Connection parameters for [`crate::driver::OusterSensor::configure`].
///
/// The lidar mode is kept as the user supplied string and validated when the
/// driver is configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Address of the sensor
    pub lidar_ip: String,
    /// Address of this host, where the sensor sends its UDP streams
    pub computer_ip: String,
    /// Column and refresh rate configuration, formatted as "COLSxHZ"
    #[serde(default = "default_lidar_mode")]
    pub lidar_mode: String,
    #[serde(default = "default_lidar_port")]
    pub lidar_port: u16,
    #[serde(default = "default_imu_port")]
    pub imu_port: u16,
}

fn default_lidar_mode() -> String {
    "1024x10".to_string()
}

fn default_lidar_port() -> u16 {
    DEFAULT_LIDAR_PORT
}

fn default_imu_port() -> u16 {
    DEFAULT_IMU_PORT
}

impl Configuration {
    /// Create a configuration with the default mode and ports.
    pub fn new(lidar_ip: impl Into<String>, computer_ip: impl Into<String>) -> Self {
        Self {
            lidar_ip: lidar_ip.into(),
            computer_ip: computer_ip.into(),
            lidar_mode: default_lidar_mode(),
            lidar_port: default_lidar_port(),
            imu_port: default_imu_port(),
        }
    }

    pub fn with_lidar_mode(mut self, lidar_mode: impl Into<String>) -> Self {
        self.lidar_mode = lidar_mode.into();
        self
    }

    pub fn with_ports(mut self, lidar_port: u16, imu_port: u16) -> Self {
        self.lidar_port = lidar_port;
        self.imu_port = imu_port;
        self
    }
}
