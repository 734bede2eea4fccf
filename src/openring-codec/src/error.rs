use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{self:?}")]
pub enum RingError {
    PayloadTooLong(usize),
    InvalidPacketLength(usize),
    ChecksumMismatch { expected: u8, found: u8 },
    UnknownCommand { command: u8, subtype: u8 },
    UnknownMetric(u8),
    UnexpectedSubtype { command: u8, subtype: u8 },
}
