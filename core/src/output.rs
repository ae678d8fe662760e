//! Bounded capture of child output plus incremental UTF-8 decoding for the
//! live stream.

/// Bytes of a stream retained up to `max_bytes`; later bytes are dropped but
/// still counted.
#[derive(Debug)]
pub struct OutputCapture {
    max_bytes: usize,
    data: Vec<u8>,
    total_bytes: usize,
}

impl OutputCapture {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            data: Vec::new(),
            total_bytes: 0,
        }
    }

    /// Appends `chunk`, returning true when this call is the first to hit the
    /// ceiling.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let was_truncated = self.is_truncated();
        self.total_bytes = self.total_bytes.saturating_add(chunk.len());
        let room = self.max_bytes.saturating_sub(self.data.len());
        let keep = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..keep]);
        !was_truncated && self.is_truncated()
    }

    pub fn retained_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_truncated(&self) -> bool {
        self.total_bytes > self.data.len()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Decodes a byte stream chunk by chunk without splitting multi-byte
/// characters across chunks. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as is complete; an unfinished
    /// trailing character is held until the next call.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        let held = rest.len();
        let consumed = self.pending.len() - held;
        self.pending.drain(..consumed);
        out
    }

    /// Flushes whatever is held, replacing an incomplete character.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
