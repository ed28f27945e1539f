//! Event framing for `text/event-stream` bodies.
//!
//! Turns an arbitrary sequence of byte chunks into discrete frames.
//! Chunk boundaries carry no meaning: a frame may span several chunks
//! and one chunk may hold several frames. This layer knows nothing
//! about what the frames mean.

/// One complete event extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event: String,
    pub data: String,
}

const DEFAULT_EVENT: &str = "message";

/// Accumulating frame extractor. Feed chunks with [`EventFramer::push`];
/// any trailing partial frame is retained for the next call.
#[derive(Debug, Default)]
pub struct EventFramer {
    buffer: Vec<u8>,
}

impl EventFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every complete frame from the front
    /// of the buffer, in order. A frame ends at a blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        // CR is only ever a line terminator in this protocol; dropping
        // it up front makes CRLF streams frame identically to LF ones.
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8_lossy(&block[..end]).into_owned();
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes held back as a partial frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut saw_field = false;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start_matches(' ').to_string());
            saw_field = true;
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            saw_field = true;
        }
        // Comments and unknown fields fall through silently.
    }

    if !saw_field {
        return None;
    }

    Some(StreamFrame {
        event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data: data_lines.join("\n"),
    })
}
