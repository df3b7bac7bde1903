//! Inbound stream frame decoding.
//!
//! Frames are parsed once at the boundary into a tagged variant. Only
//! `"e": "kline"` frames carry data; every other event type decodes to
//! [`StreamMessage::Unrecognized`] and is skipped by the caller.

use crate::error::{WsError, WsResult};
use chartfeed_core::{coerce_f64, Bar};
use serde::Deserialize;
use serde_json::Value;

/// Event type tag for candle updates.
pub const KLINE_EVENT: &str = "kline";

/// One decoded candle update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlineUpdate {
    pub bar: Bar,
    /// Exchange marks the candle final (`k.x`).
    pub is_closed: bool,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Kline(KlineUpdate),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "e", default)]
    event: Option<String>,
    #[serde(rename = "k", default)]
    kline: Option<Value>,
}

// Prices and volumes arrive as decimal text; kept as raw values and coerced.
#[derive(Debug, Deserialize)]
struct RawKline {
    t: i64,
    o: Value,
    h: Value,
    l: Value,
    c: Value,
    v: Value,
    #[serde(default)]
    x: bool,
}

impl RawKline {
    fn into_update(self) -> WsResult<KlineUpdate> {
        let num = |v: &Value| coerce_f64(v).map_err(|e| WsError::ParseError(e.to_string()));
        Ok(KlineUpdate {
            bar: Bar::new(
                self.t,
                num(&self.o)?,
                num(&self.h)?,
                num(&self.l)?,
                num(&self.c)?,
                num(&self.v)?,
            ),
            is_closed: self.x,
        })
    }
}

/// Decode one text frame.
///
/// Invalid JSON, or a kline frame with missing or non-numeric fields, is an
/// error. Well-formed frames of any other event type are `Unrecognized`.
pub fn decode_frame(text: &str) -> WsResult<StreamMessage> {
    let envelope: Envelope = serde_json::from_str(text)?;

    if envelope.event.as_deref() != Some(KLINE_EVENT) {
        return Ok(StreamMessage::Unrecognized);
    }

    let payload = envelope
        .kline
        .ok_or_else(|| WsError::ParseError("kline event without payload".to_string()))?;
    let raw: RawKline =
        serde_json::from_value(payload).map_err(|e| WsError::ParseError(e.to_string()))?;

    raw.into_update().map(StreamMessage::Kline)
}
