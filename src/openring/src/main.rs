#[macro_use]
extern crate log;

use std::{path::PathBuf, str::FromStr, sync::atomic::Ordering, time::Duration};

use anyhow::anyhow;
use btleplug::{
    api::{BDAddr, Central, Manager as _, Peripheral as _, ScanFilter},
    platform::{Adapter, Manager, Peripheral},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use openring::{
    DateWindow, DayLog, LogSamples, RangeDownload, RingClient, RingDevice, export, helpers::dates,
};
use openring_codec::constants::{RING_SERVICE, RealTimeMetric};
use tokio::time::sleep;

#[cfg(target_os = "linux")]
pub type DeviceId = BDAddr;

#[cfg(target_os = "macos")]
pub type DeviceId = String;

#[derive(Parser)]
pub struct OpenRingCli {
    #[arg(env, long)]
    pub ble_interface: Option<String>,
    #[clap(subcommand)]
    pub subcommand: OpenRingCommand,
}

#[derive(Subcommand)]
pub enum OpenRingCommand {
    ///
    /// Scan for rings
    ///
    Scan,
    ///
    /// Battery level and charging state
    ///
    Battery {
        #[arg(long, env)]
        ring: DeviceId,
    },
    ///
    /// Collect live readings until enough valid ones arrive or the timeout hits
    ///
    Realtime {
        #[arg(long, env)]
        ring: DeviceId,
        #[arg(long, default_value = "heart-rate")]
        metric: Metric,
        #[arg(long, default_value_t = 6)]
        count: usize,
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    ///
    /// Download heart-rate logs for a day or a date range
    ///
    HeartRate {
        #[arg(long, env)]
        ring: DeviceId,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    ///
    /// Download step/sport detail logs for a day or a date range
    ///
    Sport {
        #[arg(long, env)]
        ring: DeviceId,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    ///
    /// Push the current time to the ring
    ///
    SetTime {
        #[arg(long, env)]
        ring: DeviceId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(error) = dotenv() {
        println!("{}", error);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = OpenRingCli::parse();

    let manager = Manager::new().await?;
    let adapter = match cli.ble_interface {
        Some(interface) => {
            let adapters = manager.adapters().await?;
            let mut c_adapter = Err(anyhow!("Adapter: `{}` not found", interface));
            for adapter in adapters {
                let name = adapter.adapter_info().await?;
                if name.starts_with(&interface) {
                    c_adapter = Ok(adapter);
                    break;
                }
            }

            c_adapter?
        }
        None => {
            let adapters = manager.adapters().await?;
            adapters
                .into_iter()
                .next()
                .ok_or(anyhow!("No BLE adapters found"))?
        }
    };

    match cli.subcommand {
        OpenRingCommand::Scan => {
            scan_command(adapter, None).await?;
            Ok(())
        }
        OpenRingCommand::Battery { ring } => {
            let mut client = connect(adapter, ring).await?;
            let result = client.get_battery().await;
            disconnect(client).await;

            let info = result?;
            println!("Battery: {}% (charging: {})", info.level, info.charging);
            Ok(())
        }
        OpenRingCommand::Realtime {
            ring,
            metric,
            count,
            timeout,
        } => {
            let mut client = connect(adapter, ring).await?;
            let result = client
                .read_realtime(metric.0, count, Duration::from_secs(timeout))
                .await;
            disconnect(client).await;

            let readings = result?;
            if readings.is_empty() {
                println!("No valid readings obtained (error or ring not worn).");
                return Ok(());
            }
            println!("Raw readings: {readings:?}");
            summarize(readings.iter().map(|reading| i64::from(*reading)));
            Ok(())
        }
        OpenRingCommand::HeartRate {
            ring,
            start,
            end,
            csv,
        } => {
            let window = resolve_window(start, end)?;
            let mut client = connect(adapter, ring).await?;
            let download = client.download_heart_rate_range(window).await;
            disconnect(client).await;

            report(&download, "heart_rate", csv)
        }
        OpenRingCommand::Sport {
            ring,
            start,
            end,
            csv,
        } => {
            let window = resolve_window(start, end)?;
            let mut client = connect(adapter, ring).await?;
            let download = client.download_sport_range(window).await;
            disconnect(client).await;

            report(&download, "steps", csv)
        }
        OpenRingCommand::SetTime { ring } => {
            let mut client = connect(adapter, ring).await?;
            let result = client.set_clock(Utc::now()).await;
            disconnect(client).await;

            result?;
            println!("Clock pushed to the ring");
            Ok(())
        }
    }
}

async fn connect(adapter: Adapter, ring: DeviceId) -> anyhow::Result<RingClient<RingDevice>> {
    let peripheral = scan_command(adapter, Some(ring)).await?;
    let mut device = RingDevice::new(peripheral);
    device.connect().await?;
    device.initialize().await?;

    let client = RingClient::new(device);
    let cancel = client.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))?;
    Ok(client)
}

/// The link is released on every path before results are reported.
async fn disconnect(client: RingClient<RingDevice>) {
    let mut device = client.into_transport();
    if let Err(error) = device.disconnect().await {
        warn!("disconnect failed: {error}");
    }
}

fn resolve_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<DateWindow> {
    let aware = |date: NaiveDate| dates::to_aware(date.and_time(NaiveTime::MIN));
    let today = dates::start_of_day(Utc::now());

    let (start, end) = match (start, end) {
        (None, None) => (today, today),
        (Some(start), None) => (aware(start), aware(start)),
        (None, Some(end)) => (aware(end), aware(end)),
        (Some(start), Some(end)) => (aware(start), aware(end)),
    };

    Ok(DateWindow::new(start, end)?)
}

fn report<T: LogSamples>(
    download: &RangeDownload<T>,
    value_header: &str,
    csv: Option<PathBuf>,
) -> anyhow::Result<()> {
    for record in &download.days {
        match &record.result {
            Ok(DayLog::NoData) => info!("{}: no data", record.day.date_naive()),
            Ok(DayLog::Log(_)) => {}
            Err(error) => warn!("{}: failed: {error}", record.day.date_naive()),
        }
    }

    let rows = download.rows();
    match csv {
        Some(path) => {
            export::write_csv(&path, value_header, &rows)?;
            println!("Written {} rows to {}", rows.len(), path.display());
        }
        None => {
            println!("Total samples collected: {}", rows.len());
            summarize(rows.iter().map(|(_, value)| *value));
        }
    }
    Ok(())
}

fn summarize(values: impl Iterator<Item = i64>) {
    let mut values: Vec<i64> = values.filter(|value| *value != 0).collect();
    if values.is_empty() {
        println!("No non-zero readings.");
        return;
    }
    values.sort_unstable();

    let n = values.len();
    let mean = values.iter().sum::<i64>() as f64 / n as f64;
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) as f64 / 2.0
    } else {
        values[n / 2] as f64
    };
    println!(
        "N={n}  mean={mean:.1}  median={median}  min={}  max={}",
        values[0],
        values[n - 1]
    );
}

async fn scan_command(adapter: Adapter, device_id: Option<DeviceId>) -> anyhow::Result<Peripheral> {
    adapter
        .start_scan(ScanFilter {
            services: vec![RING_SERVICE],
        })
        .await?;

    loop {
        let peripherals = adapter.peripherals().await?;

        for peripheral in peripherals {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };

            if !properties.services.contains(&RING_SERVICE) {
                continue;
            }

            let Some(device_id) = device_id.as_ref() else {
                println!("Address: {}", properties.address);
                println!("Name: {:?}", properties.local_name);
                println!("RSSI: {:?}", properties.rssi);
                println!();
                continue;
            };

            #[cfg(target_os = "linux")]
            if properties.address == *device_id {
                return Ok(peripheral);
            }

            #[cfg(target_os = "macos")]
            {
                let Some(name) = properties.local_name else {
                    continue;
                };
                if name.starts_with(device_id) {
                    return Ok(peripheral);
                }
            }
        }

        sleep(Duration::from_secs(1)).await;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Metric(RealTimeMetric);

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let metric = match s {
            "heart-rate" | "hr" => RealTimeMetric::HeartRate,
            "blood-pressure" | "bp" => RealTimeMetric::BloodPressure,
            "spo2" => RealTimeMetric::Spo2,
            "fatigue" => RealTimeMetric::Fatigue,
            "health-check" => RealTimeMetric::HealthCheck,
            "ecg" => RealTimeMetric::Ecg,
            "pressure" => RealTimeMetric::Pressure,
            "blood-sugar" => RealTimeMetric::BloodSugar,
            "hrv" => RealTimeMetric::Hrv,
            _ => return Err(anyhow!("Unknown metric: {s}")),
        };
        Ok(Self(metric))
    }
}
