// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP capture session for testing and offline replay.
//!
//! [`PcapConnector`] loads the UDP datagrams of a capture once. Every
//! connection produces a [`PcapSession`] that replays the datagrams addressed
//! to the session's lidar and IMU ports, in capture order, as if they were
//! arriving live.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_ouster_driver::{OusterSensor, pcap_source::PcapConnector};
//!
//! let connector = PcapConnector::from_file("os1_frames.pcap")?
//!     .with_metadata_file("os1_metadata.json")?;
//! let mut sensor = OusterSensor::new(connector);
//! sensor.configure(&config)?;
//! ```

use crate::lidar::{ClientState, Connector, Error, Session, SessionParams};
use pcap_parser::traits::PcapReaderIterator;
use std::{path::Path, sync::Arc};
use tracing::debug;

/// UDP datagram extracted from a capture.
#[derive(Clone, Debug)]
struct CapturedPacket {
    dst_port: u16,
    payload: Vec<u8>,
}

/// Connector replaying a PCAP or PCAPNG capture.
pub struct PcapConnector {
    packets: Arc<Vec<CapturedPacket>>,
    metadata: Option<String>,
}

impl PcapConnector {
    /// Load a PCAP or PCAPNG file from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref()).map_err(Error::Io)?;
        Self::from_bytes(&data)
    }

    /// Load a capture from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let packets = Self::extract_packets(data)?;
        debug!("loaded {} udp packets from capture", packets.len());
        Ok(Self {
            packets: Arc::new(packets),
            metadata: None,
        })
    }

    /// Metadata document served by the sessions.
    pub fn with_metadata(mut self, blob: impl Into<String>) -> Self {
        self.metadata = Some(blob.into());
        self
    }

    /// Read the metadata document from a JSON file saved next to the capture.
    pub fn with_metadata_file<P: AsRef<Path>>(self, path: P) -> Result<Self, Error> {
        let blob = std::fs::read_to_string(path.as_ref())?;
        Ok(self.with_metadata(blob))
    }

    /// Total number of UDP datagrams in the capture.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    fn extract_packets(data: &[u8]) -> Result<Vec<CapturedPacket>, Error> {
        let mut packets = Vec::new();

        if data.len() >= 4 && data[0..4] == [0x0a, 0x0d, 0x0d, 0x0a] {
            // PCAPNG format (Section Header Block magic)
            Self::extract_pcapng(data, &mut packets)?;
        } else {
            Self::extract_legacy_pcap(data, &mut packets)?;
        }

        Ok(packets)
    }

    fn extract_legacy_pcap(data: &[u8], packets: &mut Vec<CapturedPacket>) -> Result<(), Error> {
        use pcap_parser::*;

        // Buffer size must be at least as large as the data to avoid Incomplete errors
        let mut reader = LegacyPcapReader::new(data.len().max(65536), data)
            .map_err(|e| Error::InvalidPacket(format!("Failed to create PCAP reader: {:?}", e)))?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    if let PcapBlockOwned::Legacy(packet) = block {
                        if let Some(captured) = Self::extract_udp_packet(packet.data) {
                            packets.push(captured);
                        }
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                // Everything is loaded already, a partial trailing record is dropped
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAP parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    fn extract_pcapng(data: &[u8], packets: &mut Vec<CapturedPacket>) -> Result<(), Error> {
        use pcap_parser::*;

        let mut reader = PcapNGReader::new(data.len().max(65536), data).map_err(|e| {
            Error::InvalidPacket(format!("Failed to create PCAPNG reader: {:?}", e))
        })?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    let captured = match block {
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            Self::extract_udp_packet(epb.data)
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            Self::extract_udp_packet(spb.data)
                        }
                        _ => None,
                    };
                    if let Some(captured) = captured {
                        packets.push(captured);
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAPNG parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    /// Extract destination port and payload from an Ethernet frame.
    fn extract_udp_packet(data: &[u8]) -> Option<CapturedPacket> {
        use etherparse::SlicedPacket;

        let packet = SlicedPacket::from_ethernet(data).ok()?;
        let udp = match packet.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => udp,
            _ => return None,
        };

        let payload = udp.payload().to_vec();
        if payload.is_empty() {
            return None;
        }

        Some(CapturedPacket {
            dst_port: udp.destination_port(),
            payload,
        })
    }
}

impl Connector for PcapConnector {
    type Session = PcapSession;

    fn connect(&self, params: &SessionParams) -> Result<PcapSession, Error> {
        if self.packets.is_empty() {
            return Err(Error::InvalidPacket(
                "capture contains no udp packets".to_string(),
            ));
        }

        let stream: Vec<usize> = self
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.dst_port == params.lidar_port || p.dst_port == params.imu_port)
            .map(|(i, _)| i)
            .collect();
        debug!(
            "replaying {} of {} captured packets",
            stream.len(),
            self.packets.len()
        );

        Ok(PcapSession {
            packets: self.packets.clone(),
            stream,
            lidar_port: params.lidar_port,
            index: 0,
            current: None,
            metadata: self.metadata.clone(),
        })
    }
}

/// Session replaying one capture for a port pair.
pub struct PcapSession {
    packets: Arc<Vec<CapturedPacket>>,
    /// Indices into `packets` addressed to the lidar or IMU port
    stream: Vec<usize>,
    lidar_port: u16,
    index: usize,
    current: Option<(ClientState, usize)>,
    metadata: Option<String>,
}

impl PcapSession {
    /// Packets left to replay.
    pub fn remaining(&self) -> usize {
        self.stream.len().saturating_sub(self.index)
    }

    /// Rewind to the start of the capture.
    pub fn reset(&mut self) {
        self.index = 0;
        self.current = None;
    }

    fn read(&mut self, state: ClientState, buf: &mut [u8]) -> bool {
        let packet = match self.current.take() {
            Some((announced, index)) if announced == state => &self.packets[index],
            _ => return false,
        };

        if packet.payload.len() + 1 != buf.len() {
            debug!(
                "dropped packet of {} bytes, expected {}",
                packet.payload.len(),
                buf.len().saturating_sub(1)
            );
            return false;
        }
        buf[..packet.payload.len()].copy_from_slice(&packet.payload);
        true
    }
}

impl Session for PcapSession {
    fn poll(&mut self) -> ClientState {
        let Some(&index) = self.stream.get(self.index) else {
            self.current = None;
            return ClientState::Exit;
        };
        self.index += 1;

        let state = if self.packets[index].dst_port == self.lidar_port {
            ClientState::LidarData
        } else {
            ClientState::ImuData
        };
        self.current = Some((state, index));
        state
    }

    fn read_lidar_packet(&mut self, buf: &mut [u8]) -> bool {
        self.read(ClientState::LidarData, buf)
    }

    fn read_imu_packet(&mut self, buf: &mut [u8]) -> bool {
        self.read(ClientState::ImuData, buf)
    }

    fn fetch_metadata(&mut self) -> Result<String, Error> {
        self.metadata.clone().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no metadata file for capture",
            ))
        })
    }
}
