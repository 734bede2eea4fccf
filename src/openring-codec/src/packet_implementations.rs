use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::{
    RingPacket,
    constants::{
        CMD_BATTERY, CMD_GET_STEP_SOMEDAY, CMD_READ_HEART_RATE, CMD_SET_TIME, CMD_START_REAL_TIME,
        CMD_STOP_REAL_TIME, RealTimeAction, RealTimeMetric,
    },
    helpers::bcd_encode,
    packet::PAYLOAD_SIZE,
};

impl RingPacket {
    pub fn read_heart_rate(day: DateTime<Utc>) -> RingPacket {
        let unix = day.timestamp() as u32;
        build(CMD_READ_HEART_RATE, &unix.to_le_bytes())
    }

    /// `day_offset` counts back from today; 0 requests today's log.
    pub fn read_sport_detail(day_offset: u8) -> RingPacket {
        build(CMD_GET_STEP_SOMEDAY, &[day_offset, 0x0F, 0x00, 0x5F, 0x01])
    }

    pub fn start_real_time(metric: RealTimeMetric) -> RingPacket {
        build(
            CMD_START_REAL_TIME,
            &[metric.as_u8(), RealTimeAction::Start.as_u8()],
        )
    }

    pub fn continue_real_time(metric: RealTimeMetric) -> RingPacket {
        build(
            CMD_START_REAL_TIME,
            &[metric.as_u8(), RealTimeAction::Continue.as_u8()],
        )
    }

    pub fn stop_real_time(metric: RealTimeMetric) -> RingPacket {
        build(CMD_STOP_REAL_TIME, &[metric.as_u8(), 0, 0])
    }

    pub fn battery() -> RingPacket {
        build(CMD_BATTERY, &[])
    }

    /// BCD-encoded wall clock, the only write the ring expects on connect.
    pub fn set_time(time: DateTime<Utc>) -> RingPacket {
        build(
            CMD_SET_TIME,
            &[
                bcd_encode((time.year() % 100) as u8),
                bcd_encode(time.month() as u8),
                bcd_encode(time.day() as u8),
                bcd_encode(time.hour() as u8),
                bcd_encode(time.minute() as u8),
                bcd_encode(time.second() as u8),
            ],
        )
    }
}

// Builder payloads are compile-time small; no fallible path.
fn build(command: u8, data: &[u8]) -> RingPacket {
    let mut payload = [0u8; PAYLOAD_SIZE];
    payload[..data.len()].copy_from_slice(data);
    RingPacket { command, payload }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::helpers::u32_at;

    #[test]
    fn view_bytes() {
        let packet = RingPacket::read_sport_detail(0);
        assert_eq!(
            hex::encode(packet.to_bytes()),
            "43000f005f01000000000000000000b2"
        );
    }

    #[test]
    fn heart_rate_request_carries_the_day() {
        let day = Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap();
        let packet = RingPacket::read_heart_rate(day);

        assert_eq!(packet.command, CMD_READ_HEART_RATE);
        assert_eq!(
            i64::from(u32_at(&packet.payload, 0)),
            day.timestamp()
        );
    }

    #[test]
    fn real_time_actions() {
        let start = RingPacket::start_real_time(RealTimeMetric::Spo2);
        assert_eq!(start.payload[..2], [3, 1]);

        let cont = RingPacket::continue_real_time(RealTimeMetric::Spo2);
        assert_eq!(cont.command, CMD_START_REAL_TIME);
        assert_eq!(cont.payload[..2], [3, 3]);

        let stop = RingPacket::stop_real_time(RealTimeMetric::Spo2);
        assert_eq!(stop.command, CMD_STOP_REAL_TIME);
        assert_eq!(stop.payload[..3], [3, 0, 0]);
    }

    #[test]
    fn set_time_is_bcd() {
        let time = Utc.with_ymd_and_hms(2025, 11, 12, 13, 59, 7).unwrap();
        let packet = RingPacket::set_time(time);

        assert_eq!(packet.command, CMD_SET_TIME);
        assert_eq!(packet.payload[..6], [0x25, 0x11, 0x12, 0x13, 0x59, 0x07]);
    }
}
