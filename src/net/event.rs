use std::io::{Read, Write};

use super::{error::NetError, events::Message, framing::{read_frame, write_frame}};

pub fn serialize_event(message: &Message) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(message).map_err(NetError::Encode)
}

pub fn deserialize_event(payload: &[u8]) -> Result<Message, NetError> {
    serde_json::from_slice(payload).map_err(NetError::Decode)
}

pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), NetError> {
    let payload = serialize_event(message)?;
    write_frame(writer, &payload)?;
    Ok(())
}

/// Blocking read of one framed message.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, NetError> {
    let payload = read_frame(reader)?;
    deserialize_event(&payload)
}
