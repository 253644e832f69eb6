// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Loopback tests for the live UDP session.
//!
//! The sensor configuration step is skipped; packets are sent from a local
//! socket to the session's ephemeral ports.

use edgefirst_ouster_driver::{
    ClientState, Connector, LidarMode, PacketFormat, Session, SessionParams,
    client::{UdpConnector, UdpSession},
};
use std::{
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

struct Loopback {
    session: UdpSession,
    sender: UdpSocket,
    lidar: SocketAddr,
    imu: SocketAddr,
}

fn loopback() -> Loopback {
    let connector = UdpConnector::default()
        .with_timeout(Duration::from_millis(200))
        .without_sensor_config();
    let params = SessionParams {
        lidar_ip: "127.0.0.1".to_string(),
        computer_ip: "127.0.0.1".to_string(),
        mode: LidarMode::Mode1024x10,
        lidar_port: 0,
        imu_port: 0,
    };
    let session = connector.connect(&params).unwrap();
    let (lidar, imu) = session.local_addrs().unwrap();

    Loopback {
        session,
        sender: UdpSocket::bind("127.0.0.1:0").unwrap(),
        lidar: SocketAddr::from(([127, 0, 0, 1], lidar.port())),
        imu: SocketAddr::from(([127, 0, 0, 1], imu.port())),
    }
}

#[test]
fn test_poll_times_out_without_data() {
    let mut lo = loopback();
    assert_eq!(lo.session.poll(), ClientState::TimedOut);
}

#[test]
fn test_imu_packet() {
    let mut lo = loopback();
    let packet = [0x5au8; PacketFormat::IMU_PACKET_BYTES];
    lo.sender.send_to(&packet, lo.imu).unwrap();

    assert_eq!(lo.session.poll(), ClientState::ImuData);
    let mut buf = [0u8; PacketFormat::IMU_PACKET_BYTES + 1];
    assert!(lo.session.read_imu_packet(&mut buf));
    assert_eq!(&buf[..PacketFormat::IMU_PACKET_BYTES], &packet[..]);
}

#[test]
fn test_lidar_has_priority() {
    let mut lo = loopback();
    let format = PacketFormat::OS1_64;
    let lidar = vec![1u8; format.lidar_packet_bytes()];
    let imu = vec![2u8; format.imu_packet_bytes()];

    lo.sender.send_to(&imu, lo.imu).unwrap();
    lo.sender.send_to(&lidar, lo.lidar).unwrap();

    let mut lidar_buf = vec![0u8; format.lidar_packet_bytes() + 1];
    let mut imu_buf = vec![0u8; format.imu_packet_bytes() + 1];

    assert_eq!(lo.session.poll(), ClientState::LidarData);
    assert!(lo.session.read_lidar_packet(&mut lidar_buf));
    assert_eq!(&lidar_buf[..lidar.len()], &lidar[..]);

    assert_eq!(lo.session.poll(), ClientState::ImuData);
    assert!(lo.session.read_imu_packet(&mut imu_buf));

    assert_eq!(lo.session.poll(), ClientState::TimedOut);
}

#[test]
fn test_wrong_size_packet_is_rejected() {
    let mut lo = loopback();
    let mut buf = [0u8; PacketFormat::IMU_PACKET_BYTES + 1];

    // Short datagram
    lo.sender.send_to(&[0u8; 12], lo.imu).unwrap();
    assert_eq!(lo.session.poll(), ClientState::ImuData);
    assert!(!lo.session.read_imu_packet(&mut buf));

    // Oversized datagram fills the spare byte
    lo.sender.send_to(&[0u8; 64], lo.imu).unwrap();
    assert_eq!(lo.session.poll(), ClientState::ImuData);
    assert!(!lo.session.read_imu_packet(&mut buf));
}

#[test]
fn test_read_without_data_fails() {
    let mut lo = loopback();
    let mut buf = [0u8; PacketFormat::IMU_PACKET_BYTES + 1];
    assert!(!lo.session.read_imu_packet(&mut buf));
}
