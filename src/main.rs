// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_ouster_driver::{
    ClientState, Configuration, Connector, Error, OusterSensor, client::UdpConnector,
};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Stats {
    lidar: u64,
    imu: u64,
    dropped: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.rust_log.into())
                .from_env_lossy(),
        )
        .init();

    let mut connector = UdpConnector::default().with_timeout(Duration::from_millis(args.timeout_ms));
    if args.no_configure {
        connector = connector.without_sensor_config();
    }

    let config = Configuration::from(&args);
    let mut sensor = OusterSensor::new(connector);

    if let Err(e) = sensor.configure(&config) {
        error!("Failed to configure lidar {}: {}", config.lidar_ip, e);
        return Err(e.into());
    }

    match sensor.metadata() {
        Ok(meta) => info!(
            "{} serial {} firmware {} ({} beams)",
            meta.product_line,
            meta.sensor_serial,
            meta.firmware_version,
            meta.beam_count()
        ),
        Err(e) => warn!("Could not read sensor metadata: {}", e),
    }

    run(&mut sensor, &config, args.max_resets)?;
    Ok(())
}

fn run<C: Connector>(
    sensor: &mut OusterSensor<C>,
    config: &Configuration,
    max_resets: u32,
) -> Result<(), Error> {
    let mut stats = Stats::default();
    let mut resets = 0;
    let mut report_time = Instant::now() + STATS_INTERVAL;

    loop {
        match sensor.poll() {
            Ok(state) => {
                resets = 0;
                match sensor.read_packet(state)? {
                    Some(packet) => {
                        debug!("{} packet of {} bytes", state, packet.len());
                        match state {
                            ClientState::LidarData => stats.lidar += 1,
                            _ => stats.imu += 1,
                        }
                    }
                    None => stats.dropped += 1,
                }
            }
            Err(Error::SensorDataUnavailable(state)) => {
                warn!("Lidar returned {}", state);
                reconnect(
                    sensor,
                    config,
                    Error::SensorDataUnavailable(state),
                    &mut resets,
                    max_resets,
                )?;
            }
            Err(e) => return Err(e),
        }

        if Instant::now() >= report_time {
            info!(
                "received {} lidar and {} imu packets, {} dropped",
                stats.lidar, stats.imu, stats.dropped
            );
            report_time += STATS_INTERVAL;
        }
    }
}

/// Reset the session until it connects again or `max_resets` consecutive
/// attempts are used up. A reset that fails to connect counts as an attempt.
fn reconnect<C: Connector>(
    sensor: &mut OusterSensor<C>,
    config: &Configuration,
    mut failure: Error,
    resets: &mut u32,
    max_resets: u32,
) -> Result<(), Error> {
    loop {
        if *resets >= max_resets {
            error!("{} after {} resets, giving up", failure, resets);
            return Err(failure);
        }
        *resets += 1;
        warn!("Resetting lidar session ({}/{})", resets, max_resets);

        match sensor.reset(config) {
            Ok(()) => return Ok(()),
            Err(Error::ConnectionFailed(reason)) => {
                warn!("Reset failed: {}", reason);
                failure = Error::ConnectionFailed(reason);
            }
            Err(e) => return Err(e),
        }
    }
}
