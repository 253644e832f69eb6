// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Live UDP session with an Ouster sensor.
//!
//! Connecting configures the sensor through its HTTP API so that it streams
//! lidar and IMU packets to this host, then binds one UDP socket per stream.
//! Polling waits on both sockets at once, giving lidar data priority when
//! both are readable.

use crate::lidar::{ClientState, Connector, Error, Session, SessionParams};
use serde::Serialize;
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    os::fd::AsRawFd as _,
    time::Duration,
};
use tracing::{debug, info, warn};

/// Default time a poll waits for either stream.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Time allowed for each request to the sensor API.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Subset of the sensor configuration written on connect.
#[derive(Serialize, Debug)]
struct SensorConfig<'a> {
    udp_dest: &'a str,
    udp_port_lidar: u16,
    udp_port_imu: u16,
    lidar_mode: &'a str,
}

/// Connector for live sensors.
#[derive(Clone, Debug)]
pub struct UdpConnector {
    timeout: Duration,
    configure_sensor: bool,
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            configure_sensor: true,
        }
    }
}

impl UdpConnector {
    /// Set how long a single poll waits before reporting a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip writing the sensor configuration, for sensors that are already
    /// streaming to this host.
    pub fn without_sensor_config(mut self) -> Self {
        self.configure_sensor = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn api_url(lidar_ip: &str, path: &str) -> String {
    format!("http://{}/api/v1/sensor/{}", lidar_ip, path)
}

/// On Linux [::] will bind to IPv4 and IPv6 but not on Windows so we bind
/// according to the host address IP version.
fn bind_addr(computer_ip: &str, port: u16) -> SocketAddr {
    match computer_ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
        _ => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
    }
}

fn data_socket(addr: SocketAddr) -> Result<UdpSocket, Error> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    debug!("bound udp socket {}", socket.local_addr()?);
    Ok(socket)
}

impl Connector for UdpConnector {
    type Session = UdpSession;

    fn connect(&self, params: &SessionParams) -> Result<UdpSession, Error> {
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();

        if self.configure_sensor {
            let config = SensorConfig {
                udp_dest: &params.computer_ip,
                udp_port_lidar: params.lidar_port,
                udp_port_imu: params.imu_port,
                lidar_mode: params.mode.as_str(),
            };
            debug!("{:?}", config);
            agent
                .post(&api_url(&params.lidar_ip, "config"))
                .send_json(&config)?;
            info!("configured sensor {}", params.lidar_ip);
        }

        let lidar = data_socket(bind_addr(&params.computer_ip, params.lidar_port))?;
        let imu = data_socket(bind_addr(&params.computer_ip, params.imu_port))?;

        Ok(UdpSession {
            lidar,
            imu,
            timeout: self.timeout,
            agent,
            metadata_url: api_url(&params.lidar_ip, "metadata"),
        })
    }
}

/// Session bound to the sensor's lidar and IMU streams.
pub struct UdpSession {
    lidar: UdpSocket,
    imu: UdpSocket,
    timeout: Duration,
    agent: ureq::Agent,
    metadata_url: String,
}

impl UdpSession {
    /// Local addresses of the lidar and IMU sockets.
    pub fn local_addrs(&self) -> Result<(SocketAddr, SocketAddr), Error> {
        Ok((self.lidar.local_addr()?, self.imu.local_addr()?))
    }

    /// Receive exactly one packet; the spare byte in `buf` catches datagrams
    /// that are longer than expected.
    fn recv_packet(socket: &UdpSocket, buf: &mut [u8]) -> bool {
        let expected = buf.len().saturating_sub(1);
        match socket.recv(buf) {
            Ok(len) if len == expected => true,
            Ok(len) => {
                warn!("dropped packet of {} bytes, expected {}", len, expected);
                false
            }
            Err(err) => {
                debug!("recv failed: {}", err);
                false
            }
        }
    }
}

impl Session for UdpSession {
    fn poll(&mut self) -> ClientState {
        let mut fds = [
            libc::pollfd {
                fd: self.lidar.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.imu.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        let timeout = self.timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return ClientState::Exit;
            }
            warn!("poll failed: {}", err);
            return ClientState::Error;
        }
        if ret == 0 {
            return ClientState::TimedOut;
        }

        if fds[0].revents & libc::POLLIN != 0 {
            ClientState::LidarData
        } else if fds[1].revents & libc::POLLIN != 0 {
            ClientState::ImuData
        } else {
            warn!(
                "poll reported socket condition {:#x}/{:#x}",
                fds[0].revents, fds[1].revents
            );
            ClientState::Error
        }
    }

    fn read_lidar_packet(&mut self, buf: &mut [u8]) -> bool {
        Self::recv_packet(&self.lidar, buf)
    }

    fn read_imu_packet(&mut self, buf: &mut [u8]) -> bool {
        Self::recv_packet(&self.imu, buf)
    }

    fn fetch_metadata(&mut self) -> Result<String, Error> {
        let body = self.agent.get(&self.metadata_url).call()?.into_string()?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("192.168.1.20", "metadata"),
            "http://192.168.1.20/api/v1/sensor/metadata"
        );
    }

    #[test]
    fn test_bind_addr_family() {
        assert_eq!(bind_addr("192.168.1.2", 7502).to_string(), "0.0.0.0:7502");
        assert_eq!(bind_addr("fe80::1", 7503).to_string(), "[::]:7503");
        assert_eq!(bind_addr("host.local", 7502).to_string(), "0.0.0.0:7502");
    }

    #[test]
    fn test_sensor_config_json() {
        let config = SensorConfig {
            udp_dest: "10.0.0.2",
            udp_port_lidar: 7502,
            udp_port_imu: 7503,
            lidar_mode: "1024x10",
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({
                "udp_dest": "10.0.0.2",
                "udp_port_lidar": 7502,
                "udp_port_imu": 7503,
                "lidar_mode": "1024x10"
            })
        );
    }

    #[test]
    fn test_connector_builder() {
        let connector = UdpConnector::default()
            .with_timeout(Duration::from_millis(250))
            .without_sensor_config();
        assert_eq!(connector.timeout(), Duration::from_millis(250));
        assert!(!connector.configure_sensor);
    }
}
