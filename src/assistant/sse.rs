//! Incremental Server-Sent Events parsing for assistant run streams

/// One complete SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

#[derive(Debug, Default)]
struct FrameBuilder {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameBuilder {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }

    fn take(&mut self) -> SseFrame {
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        frame
    }

    /// Feed one line; a blank line closes the current frame
    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return (!self.is_empty()).then(|| self.take());
        }

        // Comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }

        None
    }
}

/// Turns arbitrary byte chunks into complete SSE frames
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    builder: FrameBuilder,
}

impl SseParser {
    /// Create an empty parser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk, returning every frame it completes
    ///
    /// Bytes are buffered until a newline so multi-byte characters split
    /// across chunks decode correctly.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.builder.line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Emit whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.builder.line(&line) {
                return Some(frame);
            }
        }

        (!self.builder.is_empty()).then(|| self.builder.take())
    }
}
