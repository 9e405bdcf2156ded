//! Decoding of `event:`/`data:` status streams into JSON frames.
use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use tracker_logging::{tracker_debug, tracker_warn};

use crate::client::ByteStream;
use crate::{ApiError, FailureKind};

/// Payload key under which a frame's event name is stored.
pub const EVENT_KEY: &str = "_event";

/// One decoded frame: the JSON object from its data lines, plus `_event` when
/// the frame was named.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    payload: Map<String, Value>,
}

impl Frame {
    pub fn event(&self) -> Option<&str> {
        self.payload.get(EVENT_KEY).and_then(Value::as_str)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }
}

/// Default cap on one buffered line, and on the joined data of one frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental parser for one connection.
///
/// Frames whose data is not a JSON object are dropped and counted; the parser
/// keeps going with the next frame.
#[derive(Debug)]
pub struct FrameParser {
    partial: Vec<u8>,
    /// Length of the `partial` prefix already searched for a line terminator.
    scanned: usize,
    event: Option<String>,
    data: Option<String>,
    dropped: u64,
    max_frame_bytes: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            partial: Vec::new(),
            scanned: 0,
            event: None,
            data: None,
            dropped: 0,
            max_frame_bytes,
        }
    }

    /// Feeds a chunk of raw bytes; a line may be split across chunks.
    ///
    /// Fails with [`FailureKind::TooLarge`] when a line, or the data of the frame
    /// being assembled, outgrows the limit. Everything buffered is discarded then.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, ApiError> {
        self.partial.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.partial[search_from..]
            .iter()
            .position(|&byte| byte == b'\n')
        {
            let end = search_from + offset;
            if end - start > self.max_frame_bytes {
                return Err(self.overflow());
            }
            let raw = String::from_utf8_lossy(&self.partial[start..end]).into_owned();
            start = end + 1;
            search_from = start;
            let line = raw.strip_suffix('\r').unwrap_or(&raw);
            if let Some(frame) = self.push_line(line) {
                frames.push(frame);
            }
            if self.data.as_ref().is_some_and(|data| data.len() > self.max_frame_bytes) {
                return Err(self.overflow());
            }
        }
        self.partial.drain(..start);
        self.scanned = self.partial.len();
        if self.partial.len() > self.max_frame_bytes {
            return Err(self.overflow());
        }
        Ok(frames)
    }

    /// Feeds one complete line without its terminator.
    pub fn push_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim_start();
            match self.data.as_mut() {
                Some(buffer) => {
                    buffer.push('\n');
                    buffer.push_str(data);
                }
                None => self.data = Some(data.to_string()),
            }
        }
        None
    }

    /// Ends the connection. A frame that never saw its blank terminator line is discarded.
    pub fn finish(&mut self) {
        self.scanned = 0;
        if !self.partial.is_empty() {
            let raw = std::mem::take(&mut self.partial);
            let line = String::from_utf8_lossy(&raw);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            // The trailing line is never blank here, so it cannot complete a frame.
            let _ = self.push_line(line);
        }
        if self.data.take().is_some() {
            tracker_debug!("Discarding unterminated frame at end of stream");
        }
        self.event = None;
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn overflow(&mut self) -> ApiError {
        tracker_warn!(
            "Status stream exceeded {} bytes without completing a frame",
            self.max_frame_bytes
        );
        self.partial = Vec::new();
        self.scanned = 0;
        self.event = None;
        self.data = None;
        ApiError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_frame_bytes,
            },
            "status stream frame exceeds the size limit",
        )
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = self.event.take();
        let data = self.data.take()?;
        if data.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(mut payload)) => {
                if let Some(event) = event.filter(|name| !name.is_empty()) {
                    payload.insert(EVENT_KEY.to_string(), Value::String(event));
                }
                Some(Frame { payload })
            }
            Ok(other) => {
                self.dropped += 1;
                tracker_warn!("Dropping frame with non-object payload: {}", other);
                None
            }
            Err(err) => {
                self.dropped += 1;
                tracker_warn!("Dropping malformed frame: {}", err);
                None
            }
        }
    }
}

/// Lazily turns a byte stream into frames. A transport error, or a frame larger
/// than `max_frame_bytes`, is yielded once and ends the stream.
pub fn frame_stream(
    bytes: ByteStream,
    max_frame_bytes: usize,
) -> BoxStream<'static, Result<Frame, ApiError>> {
    struct Decoder {
        bytes: ByteStream,
        parser: FrameParser,
        ready: VecDeque<Frame>,
        done: bool,
    }

    let decoder = Decoder {
        bytes,
        parser: FrameParser::with_limit(max_frame_bytes),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(frame) = decoder.ready.pop_front() {
                return Some((Ok(frame), decoder));
            }
            if decoder.done {
                return None;
            }
            match decoder.bytes.next().await {
                Some(Ok(chunk)) => match decoder.parser.feed(&chunk) {
                    Ok(frames) => decoder.ready.extend(frames),
                    Err(err) => {
                        decoder.done = true;
                        return Some((Err(err), decoder));
                    }
                },
                Some(Err(err)) => {
                    decoder.done = true;
                    return Some((Err(err), decoder));
                }
                None => {
                    decoder.parser.finish();
                    decoder.done = true;
                }
            }
        }
    })
    .boxed()
}
