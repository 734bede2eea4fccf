mod battery;
pub use battery::{BatteryDecoder, BatteryInfo};

mod real_time;
pub use real_time::{RealTimeDecoder, RealTimeReading};

mod heart_rate;
pub use heart_rate::{HeartRateLog, HeartRateLogParser};

mod sport;
pub use sport::{SportDetail, SportDetailLog, SportDetailParser};

/// Typed value produced by a registered decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RingData {
    RealTime(RealTimeReading),
    Battery(BatteryInfo),
    HeartRate(LogOutcome<HeartRateLog>),
    Sport(LogOutcome<SportDetailLog>),
}

/// Result of one historical-log request.
///
/// `NoData` is the ring saying it has nothing stored for the day, distinct
/// from a completed log whose samples happen to be empty. `Incomplete` is a
/// session that ended mid-accumulation and keeps everything gathered up to
/// that point.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome<T> {
    NoData,
    Complete(T),
    Incomplete { expected_frames: usize, partial: T },
}
