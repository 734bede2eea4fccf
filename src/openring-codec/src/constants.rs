#![allow(unused)]

use uuid::{Uuid, uuid};

pub const RING_SERVICE: Uuid = uuid!("6e40fff0-b5a3-f393-e0a9-e50e24dcca9e");
pub const CMD_TO_RING: Uuid = uuid!("6e400002-b5a3-f393-e0a9-e50e24dcca9e");
pub const DATA_FROM_RING: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

// Command bytes
pub const CMD_SET_TIME: u8 = 1;
pub const CMD_BATTERY: u8 = 3;
pub const CMD_READ_HEART_RATE: u8 = 21;
pub const CMD_GET_STEP_SOMEDAY: u8 = 67;
pub const CMD_START_REAL_TIME: u8 = 105;
pub const CMD_STOP_REAL_TIME: u8 = 106;

/// Subtype a historical query answers with when the ring has nothing
/// stored for the requested parameters.
pub const NO_DATA: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RealTimeMetric {
    HeartRate = 1,
    BloodPressure = 2,
    Spo2 = 3,
    Fatigue = 4,
    HealthCheck = 5,
    Ecg = 7,
    Pressure = 8,
    BloodSugar = 9,
    Hrv = 10,
}

impl RealTimeMetric {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::HeartRate),
            2 => Some(Self::BloodPressure),
            3 => Some(Self::Spo2),
            4 => Some(Self::Fatigue),
            5 => Some(Self::HealthCheck),
            7 => Some(Self::Ecg),
            8 => Some(Self::Pressure),
            9 => Some(Self::BloodSugar),
            10 => Some(Self::Hrv),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RealTimeAction {
    Start = 1,
    Pause = 2,
    Continue = 3,
    Stop = 4,
}

impl RealTimeAction {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
