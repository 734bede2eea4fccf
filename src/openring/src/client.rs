use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use openring_codec::{
    BatteryDecoder, BatteryInfo, DecodeOutcome, HeartRateLog, HeartRateLogParser, LogOutcome,
    PacketDecoder, PacketRouter, RealTimeDecoder, RingData, RingError, RingPacket, Route,
    SportDetailLog, SportDetailParser,
    constants::{
        CMD_BATTERY, CMD_GET_STEP_SOMEDAY, CMD_READ_HEART_RATE, CMD_START_REAL_TIME,
        RealTimeMetric,
    },
};
use tokio::time::timeout;

use crate::{
    helpers::dates,
    history::{DateWindow, DayLog, DayRecord, FetchError, LogSamples, RangeDownload},
    transport::RingTransport,
};

const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>12} [{wide_bar:.cyan/dim}] {pos}/{len} days")
        .unwrap()
        .progress_chars("=>-")
}

/// Typed session layer over one exclusive ring connection.
///
/// One request/response exchange runs at a time; the transport is owned for
/// the duration of a call and handed back with [`RingClient::into_transport`]
/// so the caller can release the link, also after failures.
pub struct RingClient<T> {
    transport: T,
    frame_timeout: Duration,
    cancel: Arc<AtomicBool>,
}

impl<T: RingTransport> RingClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            cancel: Arc::default(),
        }
    }

    pub fn with_frame_timeout(mut self, frame_timeout: Duration) -> Self {
        self.frame_timeout = frame_timeout;
        self
    }

    /// Flag shared with e.g. a ctrl-c handler. Setting it aborts the current
    /// exchange and any remaining days of a range download.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// One request/response exchange: send, then feed every incoming frame
    /// through the router until a decoder produces data. A quiet or closed
    /// link tears the router down so a stateful decoder can report what it
    /// had gathered.
    async fn exchange(
        &mut self,
        request: RingPacket,
        command: u8,
        decoder: Box<dyn PacketDecoder + Send>,
    ) -> Result<RingData, FetchError> {
        let mut router = PacketRouter::new();
        router.route(command, Route::Any, decoder);
        self.transport.send_frame(&request).await?;

        loop {
            if self.cancelled() {
                return Err(FetchError::Cancelled);
            }

            let frame = match timeout(self.frame_timeout, self.transport.next_frame()).await {
                Err(_elapsed) => {
                    return router
                        .finish(command)
                        .ok_or(FetchError::Timeout(self.frame_timeout));
                }
                Ok(Err(error)) => return Err(FetchError::Transport(error)),
                Ok(Ok(None)) => {
                    return router.finish(command).ok_or(FetchError::LinkClosed);
                }
                Ok(Ok(Some(bytes))) => bytes,
            };

            let packet = match RingPacket::from_bytes(&frame) {
                Ok(packet) => packet,
                Err(error) => {
                    warn!("discarding frame {}: {error}", hex::encode(&frame));
                    continue;
                }
            };

            match router.dispatch(&packet) {
                Ok(DecodeOutcome::Pending) => {}
                Ok(DecodeOutcome::Data(data)) => return Ok(data),
                Err(RingError::UnknownCommand { command, subtype }) => {
                    // The ring pushes unsolicited frames (battery, state
                    // changes) during an exchange.
                    debug!("ignoring frame for command {command:#04x}/{subtype:#04x}");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    pub async fn get_battery(&mut self) -> Result<BatteryInfo, FetchError> {
        let data = self
            .exchange(RingPacket::battery(), CMD_BATTERY, Box::new(BatteryDecoder))
            .await?;
        match data {
            RingData::Battery(info) => Ok(info),
            _ => Err(FetchError::UnexpectedData),
        }
    }

    /// Pushes the current wall clock to the ring. The ring acks with an
    /// empty frame nobody waits for.
    pub async fn set_clock(&mut self, time: DateTime<Utc>) -> Result<(), FetchError> {
        self.transport.send_frame(&RingPacket::set_time(time)).await?;
        Ok(())
    }

    /// The heart-rate log stored for `day`'s calendar day.
    pub async fn get_heart_rate_log(
        &mut self,
        day: DateTime<Utc>,
    ) -> Result<LogOutcome<HeartRateLog>, FetchError> {
        let day = dates::start_of_day(day);
        let data = self
            .exchange(
                RingPacket::read_heart_rate(day),
                CMD_READ_HEART_RATE,
                Box::new(HeartRateLogParser::new(day)),
            )
            .await?;
        match data {
            RingData::HeartRate(outcome) => Ok(outcome),
            _ => Err(FetchError::UnexpectedData),
        }
    }

    /// The step/sport detail log stored for `day`'s calendar day.
    pub async fn get_sport_detail_log(
        &mut self,
        day: DateTime<Utc>,
    ) -> Result<LogOutcome<SportDetailLog>, FetchError> {
        let day = dates::start_of_day(day);
        let offset = dates::day_offset(Utc::now(), day).map_err(FetchError::Unsupported)?;
        let data = self
            .exchange(
                RingPacket::read_sport_detail(offset),
                CMD_GET_STEP_SOMEDAY,
                Box::new(SportDetailParser::new(day)),
            )
            .await?;
        match data {
            RingData::Sport(outcome) => Ok(outcome),
            _ => Err(FetchError::UnexpectedData),
        }
    }

    /// One heart-rate log request per day of the window, ascending and
    /// strictly sequential. A failed day is recorded and the loop moves on;
    /// days already collected are never lost.
    pub async fn download_heart_rate_range(
        &mut self,
        window: DateWindow,
    ) -> RangeDownload<HeartRateLog> {
        let days = window.days();
        let bar = ProgressBar::new(days.len() as u64).with_style(bar_style());
        bar.set_prefix("heart rate");

        let mut records = Vec::with_capacity(days.len());
        for day in days {
            if self.cancelled() {
                records.push(DayRecord {
                    day,
                    result: Err(FetchError::Cancelled),
                });
                break;
            }

            let result = match self.get_heart_rate_log(day).await {
                Ok(outcome) => day_result(outcome),
                Err(error) => Err(error),
            };
            if let Err(error) = &result {
                warn!("{}: {error}", day.date_naive());
            }
            records.push(DayRecord { day, result });
            bar.inc(1);
        }
        bar.finish_and_clear();

        RangeDownload { days: records }
    }

    /// Sport-detail counterpart of [`RingClient::download_heart_rate_range`].
    pub async fn download_sport_range(
        &mut self,
        window: DateWindow,
    ) -> RangeDownload<SportDetailLog> {
        let days = window.days();
        let bar = ProgressBar::new(days.len() as u64).with_style(bar_style());
        bar.set_prefix("sport");

        let mut records = Vec::with_capacity(days.len());
        for day in days {
            if self.cancelled() {
                records.push(DayRecord {
                    day,
                    result: Err(FetchError::Cancelled),
                });
                break;
            }

            let result = match self.get_sport_detail_log(day).await {
                Ok(outcome) => day_result(outcome),
                Err(error) => Err(error),
            };
            if let Err(error) = &result {
                warn!("{}: {error}", day.date_naive());
            }
            records.push(DayRecord { day, result });
            bar.inc(1);
        }
        bar.finish_and_clear();

        RangeDownload { days: records }
    }

    /// Collects live readings until `count` valid (error-free, non-zero)
    /// ones arrived or `deadline` passed, whichever comes first. A timeout
    /// with nothing valid is an empty Vec, not an error.
    pub async fn read_realtime(
        &mut self,
        metric: RealTimeMetric,
        count: usize,
        deadline: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let mut router = PacketRouter::new();
        router.route(
            CMD_START_REAL_TIME,
            Route::Exact(metric.as_u8()),
            Box::new(RealTimeDecoder),
        );
        self.transport
            .send_frame(&RingPacket::start_real_time(metric))
            .await?;

        let started = tokio::time::Instant::now();
        let mut readings = Vec::new();

        let result = loop {
            if self.cancelled() {
                break Err(FetchError::Cancelled);
            }
            let Some(remaining) = deadline.checked_sub(started.elapsed()) else {
                break Ok(readings);
            };

            let wait = remaining.min(self.frame_timeout);
            let frame = match timeout(wait, self.transport.next_frame()).await {
                Err(_elapsed) => break Ok(readings),
                Ok(Err(error)) => break Err(FetchError::Transport(error)),
                Ok(Ok(None)) => break Ok(readings),
                Ok(Ok(Some(bytes))) => bytes,
            };

            let packet = match RingPacket::from_bytes(&frame) {
                Ok(packet) => packet,
                Err(error) => {
                    warn!("discarding frame {}: {error}", hex::encode(&frame));
                    continue;
                }
            };

            match router.dispatch(&packet) {
                Ok(DecodeOutcome::Data(RingData::RealTime(reading))) => {
                    if reading.error_code != 0 {
                        warn!(
                            "ring reported error {} for {:?}, stopping",
                            reading.error_code, metric
                        );
                        break Ok(readings);
                    }
                    if reading.value != 0 {
                        readings.push(reading.value);
                    }
                    if readings.len() >= count {
                        break Ok(readings);
                    }
                    if let Err(error) = self
                        .transport
                        .send_frame(&RingPacket::continue_real_time(metric))
                        .await
                    {
                        break Err(FetchError::Transport(error));
                    }
                }
                Ok(_) => {}
                Err(RingError::UnknownCommand { command, subtype }) => {
                    debug!("ignoring frame for command {command:#04x}/{subtype:#04x}");
                }
                Err(error) => break Err(error.into()),
            }
        };

        // The ring keeps streaming until told otherwise, also on failure.
        let _ = self
            .transport
            .send_frame(&RingPacket::stop_real_time(metric))
            .await;
        result
    }
}

fn day_result<T: LogSamples>(outcome: LogOutcome<T>) -> Result<DayLog<T>, FetchError> {
    match outcome {
        LogOutcome::NoData => Ok(DayLog::NoData),
        LogOutcome::Complete(log) => Ok(DayLog::Log(log)),
        LogOutcome::Incomplete {
            expected_frames,
            partial,
        } => Err(FetchError::Incomplete {
            expected_frames,
            received_samples: partial.rows().len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::TimeZone;
    use openring_codec::constants::{CMD_STOP_REAL_TIME, NO_DATA};

    use super::*;

    enum Script {
        Frame(Vec<u8>),
        /// Never yields; lets the client's timeout fire.
        Silence,
        Fail,
        Closed,
    }

    #[derive(Default)]
    struct ScriptTransport {
        script: VecDeque<Script>,
        sent: Vec<RingPacket>,
    }

    impl ScriptTransport {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: script.into(),
                sent: Vec::new(),
            }
        }
    }

    impl RingTransport for ScriptTransport {
        async fn send_frame(&mut self, packet: &RingPacket) -> anyhow::Result<()> {
            self.sent.push(packet.clone());
            Ok(())
        }

        async fn next_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
            match self.script.pop_front() {
                Some(Script::Frame(bytes)) => Ok(Some(bytes)),
                Some(Script::Silence) | None => futures::future::pending().await,
                Some(Script::Fail) => Err(anyhow::anyhow!("simulated link failure")),
                Some(Script::Closed) => Ok(None),
            }
        }
    }

    fn client(script: Vec<Script>) -> RingClient<ScriptTransport> {
        RingClient::new(ScriptTransport::new(script))
            .with_frame_timeout(Duration::from_millis(50))
    }

    fn day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap()
    }

    fn frame(command: u8, payload: &[u8]) -> Script {
        Script::Frame(RingPacket::new(command, payload).unwrap().to_bytes().to_vec())
    }

    fn hr_no_data() -> Script {
        frame(CMD_READ_HEART_RATE, &[NO_DATA])
    }

    fn hr_log_frames(day: DateTime<Utc>) -> Vec<Script> {
        let unix = (day.timestamp() as u32).to_le_bytes();
        let mut ts_payload = vec![1];
        ts_payload.extend_from_slice(&unix);
        ts_payload.extend_from_slice(&[70, 71, 72, 73, 74, 75, 76, 77, 78]);

        let mut data_payload = vec![2];
        data_payload.extend_from_slice(&[79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90, 91]);

        vec![
            frame(CMD_READ_HEART_RATE, &[0, 3, 5]),
            frame(CMD_READ_HEART_RATE, &ts_payload),
            frame(CMD_READ_HEART_RATE, &data_payload),
        ]
    }

    fn realtime(metric: RealTimeMetric, error_code: u8, value: u8) -> Script {
        frame(CMD_START_REAL_TIME, &[metric.as_u8(), error_code, value])
    }

    #[tokio::test]
    async fn battery_round_trip() {
        let mut client = client(vec![frame(CMD_BATTERY, &[77, 1])]);

        let info = client.get_battery().await.unwrap();
        assert_eq!(info.level, 77);
        assert!(info.charging);

        let transport = client.into_transport();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].command, CMD_BATTERY);
    }

    #[tokio::test]
    async fn corrupt_frames_are_discarded_not_fatal() {
        let good = RingPacket::new(CMD_READ_HEART_RATE, &[NO_DATA])
            .unwrap()
            .to_bytes();
        let mut corrupt = good;
        corrupt[15] ^= 0x01;

        let mut client = client(vec![Script::Frame(corrupt.to_vec()), hr_no_data()]);

        let outcome = client.get_heart_rate_log(day()).await.unwrap();
        assert_eq!(outcome, LogOutcome::NoData);
    }

    #[tokio::test]
    async fn unsolicited_frames_are_skipped_mid_session() {
        let mut script = vec![frame(CMD_BATTERY, &[50, 0])];
        script.extend(hr_log_frames(day()));
        let mut client = client(script);

        let outcome = client.get_heart_rate_log(day()).await.unwrap();
        let LogOutcome::Complete(log) = outcome else {
            panic!("expected a complete log, got {outcome:?}");
        };
        assert_eq!(log.samples.len(), 22);
        assert_eq!(log.timestamp, day());
    }

    #[tokio::test]
    async fn quiet_link_mid_accumulation_is_incomplete() {
        let unix = (day().timestamp() as u32).to_le_bytes();
        let mut ts_payload = vec![1];
        ts_payload.extend_from_slice(&unix);
        ts_payload.extend_from_slice(&[70, 71, 72, 73, 74, 75, 76, 77, 78]);

        let mut client = client(vec![
            frame(CMD_READ_HEART_RATE, &[0, 3, 5]),
            frame(CMD_READ_HEART_RATE, &ts_payload),
            Script::Silence,
        ]);

        let outcome = client.get_heart_rate_log(day()).await.unwrap();
        let LogOutcome::Incomplete {
            expected_frames,
            partial,
        } = outcome
        else {
            panic!("expected an incomplete log, got {outcome:?}");
        };
        assert_eq!(expected_frames, 3);
        assert_eq!(partial.samples, vec![70, 71, 72, 73, 74, 75, 76, 77, 78]);
    }

    #[tokio::test]
    async fn one_bad_day_does_not_abort_the_range() {
        let start = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap();
        let window = DateWindow::new(start, end).unwrap();

        let mut script = hr_log_frames(start);
        for _ in 2..5 {
            script.push(hr_no_data());
        }
        script.push(Script::Fail);
        for _ in 6..=12 {
            script.push(hr_no_data());
        }
        let mut client = client(script);

        let download = client.download_heart_rate_range(window).await;

        assert_eq!(download.days.len(), 12);
        assert!(matches!(
            download.days[0].result,
            Ok(DayLog::Log(ref log)) if log.samples.len() == 22
        ));
        for record in &download.days[1..] {
            if record.day == Utc.with_ymd_and_hms(2025, 11, 5, 0, 0, 0).unwrap() {
                assert!(matches!(record.result, Err(FetchError::Transport(_))));
            } else {
                assert!(matches!(record.result, Ok(DayLog::NoData)));
            }
        }

        // Day starts stay ascending, one request per day.
        let transport = client.into_transport();
        assert_eq!(transport.sent.len(), 12);
        assert_eq!(download.rows().len(), 22);
    }

    #[tokio::test]
    async fn cancel_aborts_the_remainder() {
        let start = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap();
        let window = DateWindow::new(start, end).unwrap();

        let mut client = client(vec![]);
        client.cancel_flag().store(true, Ordering::Relaxed);

        let download = client.download_heart_rate_range(window).await;
        assert_eq!(download.days.len(), 1);
        assert!(matches!(download.days[0].result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn sport_day_too_far_back_fails_per_day() {
        let mut client = client(vec![]);
        let ancient = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let result = client.get_sport_detail_log(ancient).await;
        assert!(matches!(result, Err(FetchError::Unsupported(_))));
    }

    #[tokio::test]
    async fn realtime_returns_valid_readings_at_the_deadline() {
        let metric = RealTimeMetric::Spo2;
        let mut script: Vec<Script> = (0..4).map(|i| realtime(metric, 0, 95 + i)).collect();
        for _ in 0..3 {
            script.push(realtime(metric, 0, 0));
        }
        script.push(Script::Silence);
        let mut client = client(script);

        let readings = client
            .read_realtime(metric, 6, Duration::from_millis(250))
            .await
            .unwrap();

        assert_eq!(readings, vec![95, 96, 97, 98]);

        let transport = client.into_transport();
        let last = transport.sent.last().unwrap();
        assert_eq!(last.command, CMD_STOP_REAL_TIME);
    }

    #[tokio::test]
    async fn realtime_stops_once_enough_valid_readings() {
        let metric = RealTimeMetric::HeartRate;
        let script: Vec<Script> = (0..10).map(|i| realtime(metric, 0, 60 + i)).collect();
        let mut client = client(script);

        let readings = client
            .read_realtime(metric, 3, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(readings, vec![60, 61, 62]);
    }

    #[tokio::test]
    async fn realtime_error_code_ends_collection() {
        let metric = RealTimeMetric::HeartRate;
        let script = vec![realtime(metric, 0, 72), realtime(metric, 1, 0)];
        let mut client = client(script);

        let readings = client
            .read_realtime(metric, 6, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(readings, vec![72]);
    }

    #[tokio::test]
    async fn closed_link_with_stateless_decoder_is_an_error() {
        let mut client = client(vec![Script::Closed]);

        let result = client.get_battery().await;
        assert!(matches!(result, Err(FetchError::LinkClosed)));
    }
}
