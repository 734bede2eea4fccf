use openring_codec::RingPacket;

/// The single request/response channel to the ring.
///
/// One exchange is in flight at a time and implementations deliver
/// notifications in the order the ring sent them; connection setup and
/// teardown stay with the implementation.
#[allow(async_fn_in_trait)]
pub trait RingTransport {
    /// Write one frame to the device.
    async fn send_frame(&mut self, packet: &RingPacket) -> anyhow::Result<()>;

    /// Next raw notification from the device, `None` once the link is gone.
    async fn next_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
}
