//! Line-oriented text protocol between the hub and its clients.
//!
//! The server sends two kinds of frames: `HEARTBEAT\n`, and a pretty-printed
//! [`ChatEvent`] JSON object followed by `\n`. Event frames span several
//! lines, so the decoder parses JSON objects incrementally instead of
//! splitting on newlines.

use {
    bytes::{Buf, Bytes, BytesMut},
    courier_common::ChatEvent,
    tokio_util::codec::Decoder,
};

use crate::{Error, Result};

pub const HEARTBEAT: &str = "HEARTBEAT";

/// Heartbeat exactly as written to the socket.
pub const HEARTBEAT_FRAME: &[u8] = b"HEARTBEAT\n";

/// Buffered bytes the decoder accepts before giving up on a frame.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Serialize an event frame once, for every client.
pub fn encode_event(event: &ChatEvent) -> Result<Bytes> {
    let mut json = event.to_json()?;
    json.push('\n');
    Ok(Bytes::from(json))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Heartbeat,
    Event(Box<ChatEvent>),
}

/// Client-side decoder for the hub's stream.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Error = Error;
    type Item = Frame;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match src.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => src.advance(start),
            None => {
                src.clear();
                return Ok(None);
            },
        }

        let frame = if src[0] == b'{' {
            decode_event(src)?
        } else {
            decode_line(src)?
        };
        if frame.is_none() && src.len() > MAX_FRAME_BYTES {
            return Err(Error::FrameTooLarge {
                max: MAX_FRAME_BYTES,
            });
        }
        Ok(frame)
    }
}

fn decode_event(src: &mut BytesMut) -> Result<Option<Frame>> {
    let (next, consumed) = {
        let mut stream = serde_json::Deserializer::from_slice(&src[..]).into_iter::<ChatEvent>();
        let next = stream.next();
        (next, stream.byte_offset())
    };
    match next {
        Some(Ok(event)) => {
            src.advance(consumed);
            Ok(Some(Frame::Event(Box::new(event))))
        },
        // Object not complete yet.
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(Error::decode(e)),
        None => Ok(None),
    }
}

fn decode_line(src: &mut BytesMut) -> Result<Option<Frame>> {
    let Some(newline) = src.iter().position(|b| *b == b'\n') else {
        return Ok(None);
    };
    let line = src.split_to(newline + 1);
    let text = String::from_utf8_lossy(&line);
    let text = text.trim();
    if text == HEARTBEAT {
        Ok(Some(Frame::Heartbeat))
    } else {
        Err(Error::UnexpectedLine {
            line: text.to_string(),
        })
    }
}
