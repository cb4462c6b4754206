//! Event framing.
//!
//! Every websocket frame starts with a fixed 40-byte header: a 32-byte
//! null-padded ASCII event name, a little-endian u32 request id, and four
//! reserved zero bytes. The protobuf payload follows; its length is implied
//! by the transport frame.

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;

use crate::error::SessionError;

/// Fixed width of the event name field.
pub const EVENT_NAME_LEN: usize = 32;

/// Total header size preceding the payload.
pub const HEADER_LEN: usize = EVENT_NAME_LEN + 8;

/// Event tags used by the core protocol.
pub mod event {
    pub const REGISTER_VIEWER: &str = "REGISTER_VIEWER";
    pub const REGISTER_VIEWER_ACK: &str = "REGISTER_VIEWER_ACK";
    pub const FILE_LIST_REQUEST: &str = "FILE_LIST_REQUEST";
    pub const FILE_LIST_RESPONSE: &str = "FILE_LIST_RESPONSE";
    pub const FILE_INFO_REQUEST: &str = "FILE_INFO_REQUEST";
    pub const FILE_INFO_RESPONSE: &str = "FILE_INFO_RESPONSE";
    pub const OPEN_FILE: &str = "OPEN_FILE";
    pub const OPEN_FILE_ACK: &str = "OPEN_FILE_ACK";
    pub const CLOSE_FILE: &str = "CLOSE_FILE";
    pub const SET_IMAGE_VIEW: &str = "SET_IMAGE_VIEW";
    pub const SET_IMAGE_CHANNELS: &str = "SET_IMAGE_CHANNELS";
    pub const SET_REGION: &str = "SET_REGION";
    pub const SET_REGION_ACK: &str = "SET_REGION_ACK";
    pub const REMOVE_REGION: &str = "REMOVE_REGION";
    pub const SET_CURSOR: &str = "SET_CURSOR";
    pub const SET_HISTOGRAM_REQUIREMENTS: &str = "SET_HISTOGRAM_REQUIREMENTS";
    pub const SET_SPATIAL_REQUIREMENTS: &str = "SET_SPATIAL_REQUIREMENTS";
    pub const SET_SPECTRAL_REQUIREMENTS: &str = "SET_SPECTRAL_REQUIREMENTS";
    pub const RASTER_IMAGE_DATA: &str = "RASTER_IMAGE_DATA";
    pub const REGION_HISTOGRAM_DATA: &str = "REGION_HISTOGRAM_DATA";
    pub const SPATIAL_PROFILE_DATA: &str = "SPATIAL_PROFILE_DATA";
    pub const SPECTRAL_PROFILE_DATA: &str = "SPECTRAL_PROFILE_DATA";
    pub const ERROR_DATA: &str = "ERROR_DATA";
}

/// Decoded header of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    pub name: String,
    pub request_id: u32,
}

/// Split an inbound frame into its header and payload.
pub fn decode_frame(frame: &[u8]) -> Result<(EventHeader, &[u8]), SessionError> {
    if frame.len() < HEADER_LEN {
        return Err(SessionError::InvalidRequest(format!(
            "frame of {} bytes is shorter than the {HEADER_LEN}-byte header",
            frame.len()
        )));
    }

    let name_field = &frame[..EVENT_NAME_LEN];
    let name_len = name_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(EVENT_NAME_LEN);
    let name = std::str::from_utf8(&name_field[..name_len])
        .map_err(|_| SessionError::InvalidRequest("event name is not ASCII".into()))?;
    if !name.is_ascii() || name.is_empty() {
        return Err(SessionError::InvalidRequest("event name is not ASCII".into()));
    }

    let request_id = u32::from_le_bytes([
        frame[EVENT_NAME_LEN],
        frame[EVENT_NAME_LEN + 1],
        frame[EVENT_NAME_LEN + 2],
        frame[EVENT_NAME_LEN + 3],
    ]);

    Ok((
        EventHeader {
            name: name.to_string(),
            request_id,
        },
        &frame[HEADER_LEN..],
    ))
}

/// Frame an outbound event into `buf` and return the finished bytes.
///
/// `buf` is the session's reusable send buffer; it is cleared, filled with
/// header plus payload, and split off so the allocation is recycled across
/// events.
pub fn encode_frame(
    buf: &mut BytesMut,
    name: &str,
    request_id: u32,
    payload: &impl Message,
) -> Bytes {
    buf.clear();
    buf.reserve(HEADER_LEN + payload.encoded_len());

    let name_bytes = name.as_bytes();
    let copied = name_bytes.len().min(EVENT_NAME_LEN);
    buf.put_slice(&name_bytes[..copied]);
    buf.put_bytes(0, EVENT_NAME_LEN - copied);

    buf.put_u32_le(request_id);
    buf.put_bytes(0, 4);

    payload
        .encode(buf)
        .expect("BytesMut reserve guarantees capacity");
    buf.split().freeze()
}
