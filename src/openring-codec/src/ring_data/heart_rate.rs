use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    RingPacket,
    constants::NO_DATA,
    error::RingError,
    helpers::u32_at,
    ring_data::{LogOutcome, RingData},
    router::{DecodeOutcome, PacketDecoder},
};

const HEADER_SUBTYPE: u8 = 0;
const MINUTES_PER_DAY: usize = 24 * 60;
const DEFAULT_INTERVAL_MINUTES: u8 = 5;

/// A day of heart-rate samples, one every `interval_minutes` from
/// `timestamp`. Zero is a valid "sensor idle" slot, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRateLog {
    pub timestamp: DateTime<Utc>,
    pub interval_minutes: u8,
    pub samples: Vec<u8>,
}

impl HeartRateLog {
    pub fn samples_with_times(&self) -> impl Iterator<Item = (DateTime<Utc>, u8)> + '_ {
        let interval = TimeDelta::minutes(i64::from(self.interval_minutes));
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, sample)| (self.timestamp + interval * i as i32, *sample))
    }
}

/// Reassembles one in-flight `CMD_READ_HEART_RATE` request.
///
/// Frame layout, subtype = first payload byte:
/// - 255: nothing stored for the requested day
/// - 0: header, `payload[1]` = total frame count (header included),
///   `payload[2]` = sample interval in minutes
/// - 1: u32 LE day timestamp in `payload[1..5]`, 9 samples in the rest
/// - 2..count: 13 samples each
///
/// Frames arrive in send order; the transport does not reorder. One parser
/// per request, dropped once it produced its outcome.
#[derive(Debug)]
pub struct HeartRateLogParser {
    day: DateTime<Utc>,
    interval_minutes: u8,
    expected_frames: usize,
    next_subtype: u8,
    timestamp: Option<DateTime<Utc>>,
    samples: Vec<u8>,
}

impl HeartRateLogParser {
    pub fn new(day: DateTime<Utc>) -> Self {
        Self {
            day,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            expected_frames: 0,
            next_subtype: HEADER_SUBTYPE,
            timestamp: None,
            samples: Vec::new(),
        }
    }

    /// Consumes the next frame. `Ok(None)` means keep feeding.
    pub fn feed(
        &mut self,
        packet: &RingPacket,
    ) -> Result<Option<LogOutcome<HeartRateLog>>, RingError> {
        let subtype = packet.subtype();

        if subtype == NO_DATA && self.next_subtype == HEADER_SUBTYPE {
            return Ok(Some(LogOutcome::NoData));
        }

        if subtype != self.next_subtype {
            return Err(RingError::UnexpectedSubtype {
                command: packet.command,
                subtype,
            });
        }

        match subtype {
            0 => {
                self.expected_frames = usize::from(packet.payload[1]);
                if packet.payload[2] > 0 {
                    self.interval_minutes = packet.payload[2];
                }
            }
            1 => {
                let unix = u32_at(&packet.payload, 1);
                if unix != 0 {
                    self.timestamp = DateTime::from_timestamp(i64::from(unix), 0);
                }
                self.samples.extend_from_slice(&packet.payload[5..]);
            }
            _ => {
                self.samples.extend_from_slice(&packet.payload[1..]);
            }
        }

        if usize::from(subtype) + 1 >= self.expected_frames {
            return Ok(Some(LogOutcome::Complete(self.build_log())));
        }

        self.next_subtype = subtype + 1;
        Ok(None)
    }

    pub fn into_incomplete(mut self) -> LogOutcome<HeartRateLog> {
        LogOutcome::Incomplete {
            expected_frames: self.expected_frames,
            partial: self.build_log(),
        }
    }

    fn build_log(&mut self) -> HeartRateLog {
        let mut samples = std::mem::take(&mut self.samples);
        let capacity = MINUTES_PER_DAY / usize::from(self.interval_minutes);
        samples.truncate(capacity);

        HeartRateLog {
            timestamp: self.timestamp.unwrap_or(self.day),
            interval_minutes: self.interval_minutes,
            samples,
        }
    }
}

impl PacketDecoder for HeartRateLogParser {
    fn decode(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError> {
        Ok(match self.feed(packet)? {
            Some(outcome) => DecodeOutcome::Data(RingData::HeartRate(outcome)),
            None => DecodeOutcome::Pending,
        })
    }

    fn finish(self: Box<Self>) -> Option<RingData> {
        Some(RingData::HeartRate(self.into_incomplete()))
    }
}
