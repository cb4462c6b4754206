//! Wire protocol: message payloads and event framing.

pub mod messages;
pub mod wire;

pub use messages::*;
pub use wire::{decode_frame, encode_frame, event, EventHeader, EVENT_NAME_LEN, HEADER_LEN};
