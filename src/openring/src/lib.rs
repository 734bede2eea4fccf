#[macro_use]
extern crate log;

mod client;
pub use client::RingClient;

mod device;
pub use device::RingDevice;

mod transport;
pub use transport::RingTransport;

pub mod export;

mod history;
pub use history::{
    DateWindow, DayLog, DayRecord, FetchError, LogSamples, RangeDownload, WindowError,
};

pub mod helpers;
