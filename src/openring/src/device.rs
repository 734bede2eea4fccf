use std::{collections::BTreeSet, pin::Pin};

use btleplug::{
    api::{CharPropFlags, Characteristic, Peripheral as _, ValueNotification, WriteType},
    platform::Peripheral,
};
use futures::{Stream, StreamExt};
use openring_codec::{
    RingPacket,
    constants::{CMD_TO_RING, DATA_FROM_RING, RING_SERVICE},
};
use uuid::Uuid;

use crate::transport::RingTransport;

type Notifications = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// btleplug-backed transport for a connected ring.
pub struct RingDevice {
    peripheral: Peripheral,
    notifications: Option<Notifications>,
}

impl RingDevice {
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            notifications: None,
        }
    }

    pub async fn connect(&mut self) -> anyhow::Result<()> {
        self.peripheral.connect().await?;
        self.peripheral.discover_services().await?;
        Ok(())
    }

    pub async fn is_connected(&mut self) -> anyhow::Result<bool> {
        let is_connected = self.peripheral.is_connected().await?;
        Ok(is_connected)
    }

    fn create_char(characteristic: Uuid) -> Characteristic {
        Characteristic {
            uuid: characteristic,
            service_uuid: RING_SERVICE,
            properties: CharPropFlags::empty(),
            descriptors: BTreeSet::new(),
        }
    }

    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        self.peripheral
            .subscribe(&Self::create_char(DATA_FROM_RING))
            .await?;
        self.notifications = Some(self.peripheral.notifications().await?);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl RingTransport for RingDevice {
    async fn send_frame(&mut self, packet: &RingPacket) -> anyhow::Result<()> {
        self.peripheral
            .write(
                &Self::create_char(CMD_TO_RING),
                &packet.to_bytes(),
                WriteType::WithoutResponse,
            )
            .await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(notifications) = self.notifications.as_mut() else {
            anyhow::bail!("device not initialized");
        };

        loop {
            let Some(notification) = notifications.next().await else {
                return Ok(None);
            };

            if notification.uuid == DATA_FROM_RING {
                return Ok(Some(notification.value));
            }
        }
    }
}
