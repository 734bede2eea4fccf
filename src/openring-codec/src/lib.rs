#[macro_use]
extern crate serde;

mod packet;
pub use packet::RingPacket;

mod error;
pub use error::RingError;

pub mod constants;

mod helpers;

mod router;
pub use router::{DecodeOutcome, PacketDecoder, PacketRouter, Route};

mod ring_data;
pub use ring_data::*;

mod packet_implementations;
