// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, builder::PossibleValuesParser};
use edgefirst_ouster_driver::Configuration;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hostname or IP address of the LiDAR.
    #[arg(env)]
    pub lidar_ip: String,

    /// Address of this host where the LiDAR sends its UDP streams.
    #[arg(long, env, default_value = "192.168.1.2")]
    pub computer_ip: String,

    /// LiDAR column and refresh rate configuration.  The format is "COLxHZ".
    #[arg(long, env, default_value = "1024x10",
          value_parser = PossibleValuesParser::new(["512x10", "1024x10", "2048x10", "512x20", "1024x20",]))]
    pub lidar_mode: String,

    /// UDP port for lidar packets
    #[arg(long, env, default_value = "7502")]
    pub lidar_port: u16,

    /// UDP port for IMU packets
    #[arg(long, env, default_value = "7503")]
    pub imu_port: u16,

    /// Time in milliseconds a poll waits for data before timing out
    #[arg(long, env, default_value = "1000")]
    pub timeout_ms: u64,

    /// Consecutive session resets attempted before giving up
    #[arg(long, env, default_value = "3")]
    pub max_resets: u32,

    /// Do not write the UDP configuration to the LiDAR, use its current
    /// destination and ports.
    #[arg(long, env)]
    pub no_configure: bool,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl From<&Args> for Configuration {
    fn from(args: &Args) -> Self {
        Configuration::new(args.lidar_ip.clone(), args.computer_ip.clone())
            .with_lidar_mode(args.lidar_mode.clone())
            .with_ports(args.lidar_port, args.imu_port)
    }
}
