use crate::{
    RingPacket,
    error::RingError,
    ring_data::RingData,
    router::{DecodeOutcome, PacketDecoder},
};

/// Battery state answered to `CMD_BATTERY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub level: u8,
    pub charging: bool,
}

#[derive(Debug, Default)]
pub struct BatteryDecoder;

impl PacketDecoder for BatteryDecoder {
    fn decode(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError> {
        Ok(DecodeOutcome::Data(RingData::Battery(BatteryInfo {
            level: packet.payload[0],
            charging: packet.payload[1] != 0,
        })))
    }
}
