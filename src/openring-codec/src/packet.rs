use std::fmt;

use crate::error::RingError;

pub const PACKET_SIZE: usize = 16;
pub const PAYLOAD_SIZE: usize = 14;

/// One fixed-size frame exchanged with the ring: a command byte, 14 payload
/// bytes and a trailing additive checksum on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingPacket {
    pub command: u8,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl RingPacket {
    pub fn new(command: u8, data: &[u8]) -> Result<Self, RingError> {
        if data.len() > PAYLOAD_SIZE {
            return Err(RingError::PayloadTooLong(data.len()));
        }

        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[..data.len()].copy_from_slice(data);
        Ok(Self { command, payload })
    }

    /// Selector byte for multi-purpose commands: metric kind on real-time
    /// frames, frame index on historical-log frames, 255 for "no data".
    pub fn subtype(&self) -> u8 {
        self.payload[0]
    }

    /// Byte sum of everything before the checksum slot, mod 256.
    pub fn checksum(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = self.command;
        bytes[1..PACKET_SIZE - 1].copy_from_slice(&self.payload);
        bytes[PACKET_SIZE - 1] = Self::checksum(&bytes[..PACKET_SIZE - 1]);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RingError> {
        if bytes.len() != PACKET_SIZE {
            return Err(RingError::InvalidPacketLength(bytes.len()));
        }

        let expected = Self::checksum(&bytes[..PACKET_SIZE - 1]);
        let found = bytes[PACKET_SIZE - 1];
        if expected != found {
            return Err(RingError::ChecksumMismatch { expected, found });
        }

        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[1..PACKET_SIZE - 1]);
        Ok(Self {
            command: bytes[0],
            payload,
        })
    }
}

impl fmt::Display for RingPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RingPacket {{ Cmd: {:#04x}, Bytes: {} }}",
            self.command,
            hex::encode(self.to_bytes())
        )
    }
}
