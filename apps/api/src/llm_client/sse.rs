//! Incremental Server-Sent-Events decoder for the streaming Messages API.
//!
//! Network chunks do not line up with event boundaries (or even UTF-8
//! boundaries), so bytes are buffered until a blank line closes an event.

use bytes::{Buf, BufMut, BytesMut};

/// One decoded SSE event. `data` joins multi-line `data:` fields with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes and returns every event completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CRLF, CR and LF all end a line. A CR at the end of one chunk may pair
        // with an LF at the start of the next.
        for &b in chunk {
            let after_cr = std::mem::replace(&mut self.after_cr, b == b'\r');
            match b {
                b'\r' => self.buffer.put_u8(b'\n'),
                b'\n' if after_cr => {}
                _ => self.buffer.put_u8(b),
            }
        }

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block = self.buffer.split_to(end);
            self.buffer.advance(2);
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    /// Returns true if undecoded bytes remain (an unterminated trailing event).
    pub fn has_pending(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.starts_with(':') {
            continue; // comment / keep-alive
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}
