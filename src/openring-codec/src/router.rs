use std::collections::HashMap;

use crate::{RingPacket, error::RingError, ring_data::RingData};

/// Narrows a registration to one subtype value, or matches any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Exact(u8),
    Any,
}

/// What a decoder made of one frame.
#[derive(Debug, PartialEq)]
pub enum DecodeOutcome {
    /// Frame consumed, more frames expected for the same request.
    Pending,
    Data(RingData),
}

pub trait PacketDecoder {
    fn decode(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError>;

    /// Terminal outcome when the stream ends before the decoder produced
    /// its value. Stateless decoders have none.
    fn finish(self: Box<Self>) -> Option<RingData> {
        None
    }
}

/// Lookup table from (command, subtype) to the registered decoder. Routing
/// only; decoding stays with the decoders themselves.
#[derive(Default)]
pub struct PacketRouter {
    routes: HashMap<(u8, Route), Box<dyn PacketDecoder + Send>>,
}

impl PacketRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, command: u8, route: Route, decoder: Box<dyn PacketDecoder + Send>) {
        self.routes.insert((command, route), decoder);
    }

    /// Hands the frame to the most specific registration, subtype-exact
    /// winning over wildcard.
    pub fn dispatch(&mut self, packet: &RingPacket) -> Result<DecodeOutcome, RingError> {
        let command = packet.command;
        let subtype = packet.subtype();

        let key = if self.routes.contains_key(&(command, Route::Exact(subtype))) {
            (command, Route::Exact(subtype))
        } else {
            (command, Route::Any)
        };

        match self.routes.get_mut(&key) {
            Some(decoder) => decoder.decode(packet),
            None => Err(RingError::UnknownCommand { command, subtype }),
        }
    }

    /// Tears down every registration for `command`, letting a stateful
    /// decoder report whatever it had accumulated so far.
    pub fn finish(&mut self, command: u8) -> Option<RingData> {
        let keys: Vec<_> = self
            .routes
            .keys()
            .filter(|(routed, _)| *routed == command)
            .copied()
            .collect();

        let mut outcome = None;
        for key in keys {
            if let Some(decoder) = self.routes.remove(&key) {
                outcome = decoder.finish().or(outcome);
            }
        }
        outcome
    }
}
