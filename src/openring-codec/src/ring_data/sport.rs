use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::{
    RingPacket,
    constants::NO_DATA,
    error::RingError,
    helpers::{bcd_decode, u16_at},
    ring_data::{LogOutcome, RingData},
    router::{DecodeOutcome, PacketDecoder},
};

const HEADER_SUBTYPE: u8 = 0xF0;
const SLOT_MINUTES: i64 = 15;

/// One populated quarter-hour activity slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportDetail {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub time_index: u8,
    pub calories: u32,
    pub steps: u16,
    pub distance: u16,
}

impl SportDetail {
    pub fn day_start(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
            0,
            0,
            0,
        )
        .single()
    }

    /// Slot start, `time_index` quarter hours from midnight of the recorded
    /// date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.day_start()
            .map(|midnight| midnight + TimeDelta::minutes(SLOT_MINUTES * i64::from(self.time_index)))
    }
}

/// A day of step/sport activity, one record per populated slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SportDetailLog {
    pub timestamp: DateTime<Utc>,
    pub details: Vec<SportDetail>,
}

/// Reassembles one in-flight `CMD_GET_STEP_SOMEDAY` request.
///
/// Frame layout, subtype = first payload byte:
/// - 255: nothing stored for the requested day
/// - 0xF0: header; `payload[2]` == 1 selects the ten-calorie scale of newer
///   firmware
/// - otherwise a data frame: BCD date in `payload[0..3]`, quarter-hour slot
///   in `payload[3]`, frame count and index in `payload[4]`/`payload[5]`,
///   u16 LE calories, steps and distance from `payload[6]`
///
/// Complete when the frame index reaches count - 1.
#[derive(Debug)]
pub struct SportDetailParser {
    day: DateTime<Utc>,
    new_calorie_protocol: bool,
    seen_header: bool,
    expected_frames: usize,
    details: Vec<SportDetail>,
}

impl SportDetailParser {
    pub fn new(day: DateTime<Utc>) -> Self {
        Self {
            day,
            new_calorie_protocol: false,
            seen_header: false,
            expected_frames: 0,
            details: Vec::new(),
        }
    }

    /// Consumes the next frame. `Ok(None)` means keep feeding.
    pub fn feed(
        &mut self,
        packet: &RingPacket,
    ) -> Result<Option<LogOutcome<SportDetailLog>>, RingError> {
        let subtype = packet.subtype();

        if subtype == NO_DATA && !self.seen_header {
            return Ok(Some(LogOutcome::NoData));
        }

        if subtype == HEADER_SUBTYPE {
            if self.seen_header {
                return Err(RingError::UnexpectedSubtype {
                    command: packet.command,
                    subtype,
                });
            }
            self.seen_header = true;
            self.new_calorie_protocol = packet.payload[2] == 1;
            return Ok(None);
        }

        if !self.seen_header {
            return Err(RingError::UnexpectedSubtype {
                command: packet.command,
                subtype,
            });
        }

        let payload = &packet.payload;
        let count = usize::from(payload[4]);
        let index = usize::from(payload[5]);
        if index != self.details.len() || (self.expected_frames != 0 && count != self.expected_frames)
        {
            return Err(RingError::UnexpectedSubtype {
                command: packet.command,
                subtype,
            });
        }
        self.expected_frames = count;

        let mut calories = u32::from(u16_at(payload, 6));
        if self.new_calorie_protocol {
            calories *= 10;
        }

        self.details.push(SportDetail {
            year: 2000 + u16::from(bcd_decode(payload[0])),
            month: bcd_decode(payload[1]),
            day: bcd_decode(payload[2]),
            time_index: payload[3],
            calories,
            steps: u16_at(payload, 8),
            distance: u16_at(payload, 10),
        });

        if self.details.len() >= count {
            return Ok(Some(LogOutcome::Complete(self.build_log())));
        }
        Ok(None)
    }

    pub fn into_incomplete(mut self) -> LogOutcome<SportDetailLog> {
        LogOutcome::Incomplete {
            expected_frames: self.expected_frames,
            partial: self.build_log(),
        }
    }

    fn build_log(&mut self) -> SportDetailLog {
        let details = std::mem::take(&mut self.details);
        let timestamp = details
            .first()
            .and_then(SportDetail::day_start)
            .unwrap_or(self.day);

        SportDetailLog { timestamp, details }
    }
}

impl PacketDecoder for SportDetailParser {
    fn decode(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError> {
        Ok(match self.feed(packet)? {
            Some(outcome) => DecodeOutcome::Data(RingData::Sport(outcome)),
            None => DecodeOutcome::Pending,
        })
    }

    fn finish(self: Box<Self>) -> Option<RingData> {
        Some(RingData::Sport(self.into_incomplete()))
    }
}
