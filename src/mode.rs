// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Lidar mode lookup and packet-format profiles.
//!
//! The lidar mode selects the horizontal resolution and rotation rate,
//! written as `"COLSxHZ"`. The packet format determines how many bytes one
//! lidar or IMU datagram carries and therefore how large the driver's packet
//! buffers are.

use std::fmt;

/// Horizontal resolution and rotation rate of the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LidarMode {
    Mode512x10,
    Mode512x20,
    Mode1024x10,
    Mode1024x20,
    Mode2048x10,
}

impl LidarMode {
    /// Every mode accepted by [`lidar_mode_of_string`].
    pub const ALL: [LidarMode; 5] = [
        LidarMode::Mode512x10,
        LidarMode::Mode512x20,
        LidarMode::Mode1024x10,
        LidarMode::Mode1024x20,
        LidarMode::Mode2048x10,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LidarMode::Mode512x10 => "512x10",
            LidarMode::Mode512x20 => "512x20",
            LidarMode::Mode1024x10 => "1024x10",
            LidarMode::Mode1024x20 => "1024x20",
            LidarMode::Mode2048x10 => "2048x10",
        }
    }

    /// Columns per full rotation.
    pub fn columns(&self) -> usize {
        match self {
            LidarMode::Mode512x10 | LidarMode::Mode512x20 => 512,
            LidarMode::Mode1024x10 | LidarMode::Mode1024x20 => 1024,
            LidarMode::Mode2048x10 => 2048,
        }
    }

    /// Rotations per second.
    pub fn frequency(&self) -> u32 {
        match self {
            LidarMode::Mode512x20 | LidarMode::Mode1024x20 => 20,
            _ => 10,
        }
    }
}

impl fmt::Display for LidarMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up a lidar mode by its string form, `None` if unrecognized.
pub fn lidar_mode_of_string(name: &str) -> Option<LidarMode> {
    LidarMode::ALL.into_iter().find(|mode| mode.as_str() == name)
}

/// Packet-format profile of the sensor's UDP streams.
///
/// Each lidar packet carries `columns_per_packet` measurement blocks. A block
/// is a 16 byte column header, 12 bytes per pixel, and a 4 byte status word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketFormat {
    pub pixels_per_column: usize,
    pub columns_per_packet: usize,
}

impl PacketFormat {
    const COLUMN_HEADER_BYTES: usize = 16;
    const PIXEL_BYTES: usize = 12;
    const COLUMN_STATUS_BYTES: usize = 4;

    /// IMU packets have a fixed size independent of the profile.
    pub const IMU_PACKET_BYTES: usize = 48;

    pub const OS1_16: PacketFormat = PacketFormat::new(16, 16);
    pub const OS1_64: PacketFormat = PacketFormat::new(64, 16);
    pub const OS1_128: PacketFormat = PacketFormat::new(128, 16);

    pub const fn new(pixels_per_column: usize, columns_per_packet: usize) -> Self {
        Self {
            pixels_per_column,
            columns_per_packet,
        }
    }

    pub const fn column_bytes(&self) -> usize {
        Self::COLUMN_HEADER_BYTES
            + self.pixels_per_column * Self::PIXEL_BYTES
            + Self::COLUMN_STATUS_BYTES
    }

    pub const fn lidar_packet_bytes(&self) -> usize {
        self.columns_per_packet * self.column_bytes()
    }

    pub const fn imu_packet_bytes(&self) -> usize {
        Self::IMU_PACKET_BYTES
    }
}

impl Default for PacketFormat {
    fn default() -> Self {
        Self::OS1_64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lidar_mode_lookup() {
        assert_eq!(lidar_mode_of_string("512x10"), Some(LidarMode::Mode512x10));
        assert_eq!(lidar_mode_of_string("512x20"), Some(LidarMode::Mode512x20));
        assert_eq!(lidar_mode_of_string("1024x10"), Some(LidarMode::Mode1024x10));
        assert_eq!(lidar_mode_of_string("1024x20"), Some(LidarMode::Mode1024x20));
        assert_eq!(lidar_mode_of_string("2048x10"), Some(LidarMode::Mode2048x10));

        assert_eq!(lidar_mode_of_string("bogus-mode"), None);
        assert_eq!(lidar_mode_of_string("2048x20"), None);
        assert_eq!(lidar_mode_of_string(""), None);
        assert_eq!(lidar_mode_of_string(" 1024x10"), None);
    }

    #[test]
    fn test_lidar_mode_roundtrip_and_geometry() {
        for mode in LidarMode::ALL {
            assert_eq!(lidar_mode_of_string(&mode.to_string()), Some(mode));
        }

        assert_eq!(LidarMode::Mode2048x10.columns(), 2048);
        assert_eq!(LidarMode::Mode2048x10.frequency(), 10);
        assert_eq!(LidarMode::Mode512x20.columns(), 512);
        assert_eq!(LidarMode::Mode512x20.frequency(), 20);
    }

    #[test]
    fn test_packet_sizes() {
        assert_eq!(PacketFormat::OS1_64.column_bytes(), 788);
        assert_eq!(PacketFormat::OS1_64.lidar_packet_bytes(), 12608);
        assert_eq!(PacketFormat::OS1_16.lidar_packet_bytes(), 16 * 212);
        assert_eq!(PacketFormat::OS1_128.lidar_packet_bytes(), 16 * 1556);
        assert_eq!(PacketFormat::default(), PacketFormat::OS1_64);
        assert_eq!(PacketFormat::default().imu_packet_bytes(), 48);
    }
}
