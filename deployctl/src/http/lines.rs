//! Newline-delimited response bodies

use std::collections::VecDeque;

use futures::{stream, StreamExt};
use reqwest::Response;

use crate::deploy::api::LineStream;
use crate::errors::ClientError;

/// Line that is not valid UTF-8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine(pub String);

/// Splits a byte stream into non-empty lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the lines it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, MalformedLine>> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = decode(&raw[..raw.len() - 1]).transpose() {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the body ended
    pub fn finish(&mut self) -> Option<Result<String, MalformedLine>> {
        let rest = std::mem::take(&mut self.buffer);
        decode(&rest).transpose()
    }
}

fn decode(raw: &[u8]) -> Result<Option<String>, MalformedLine> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8(raw.to_vec())
        .map_err(|e| MalformedLine(format!("line is not valid UTF-8: {}", e.utf8_error())))?;
    if line.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

struct LineState<S> {
    body: S,
    decoder: LineDecoder,
    ready: VecDeque<Result<String, MalformedLine>>,
    malformed: fn(String) -> ClientError,
    done: bool,
}

/// Stream the lines of `response` as they arrive.
///
/// A line that is not UTF-8 is turned into an error by `malformed` and ends
/// the stream.
pub fn line_stream(response: Response, malformed: fn(String) -> ClientError) -> LineStream {
    let state = LineState {
        body: Box::pin(response.bytes_stream()),
        decoder: LineDecoder::new(),
        ready: VecDeque::new(),
        malformed,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            match state.ready.pop_front() {
                Some(Ok(line)) => return Some((Ok(line), state)),
                Some(Err(MalformedLine(reason))) => {
                    state.done = true;
                    state.ready.clear();
                    let error = (state.malformed)(reason);
                    return Some((Err(error), state));
                }
                None => {}
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.push(&chunk)),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ClientError::from(e)), state));
                }
                None => {
                    state.done = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
