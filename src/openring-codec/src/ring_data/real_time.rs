use crate::{
    RingPacket,
    constants::RealTimeMetric,
    error::RingError,
    ring_data::RingData,
    router::{DecodeOutcome, PacketDecoder},
};

/// One live sensor reading, carried in a single frame.
///
/// A non-zero `error_code` means the ring could not measure (usually not
/// worn). The reading still decodes; the value is present but not
/// meaningful, and the caller decides what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealTimeReading {
    pub metric: RealTimeMetric,
    pub error_code: u8,
    pub value: u8,
}

impl RealTimeReading {
    pub fn is_valid(&self) -> bool {
        self.error_code == 0 && self.value != 0
    }
}

/// Decodes `CMD_START_REAL_TIME` responses. Stateless; one frame per
/// reading.
#[derive(Debug, Default)]
pub struct RealTimeDecoder;

impl PacketDecoder for RealTimeDecoder {
    fn decode(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError> {
        let metric = RealTimeMetric::from_u8(packet.payload[0])
            .ok_or(RingError::UnknownMetric(packet.payload[0]))?;

        Ok(DecodeOutcome::Data(RingData::RealTime(RealTimeReading {
            metric,
            error_code: packet.payload[1],
            value: packet.payload[2],
        })))
    }
}
