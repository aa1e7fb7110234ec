//! Incremental consumer of the chunked chat response.
//!
//! A pure byte accumulator: it decodes each chunk as UTF-8, appends to a
//! running buffer, and hands the full buffer back after every chunk for
//! progressive rendering. It knows nothing about tags - in-band error tags
//! are data here, only a dropped connection is an error. Dropping the
//! decoder abandons the read loop; there is no automatic retry.

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// A transport-level failure, distinct from in-band error tags
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError(message.into())
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

pub struct StreamDecoder {
    source: ByteStream,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence, carried to the next chunk
    pending: Vec<u8>,
    in_flight: bool,
    error: Option<TransportError>,
}

impl StreamDecoder {
    pub fn new(source: ByteStream) -> Self {
        StreamDecoder {
            source,
            buffer: String::new(),
            pending: Vec::new(),
            in_flight: true,
            error: None,
        }
    }

    /// Accumulated text so far
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Last transport-level failure, if the stream died
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    fn append_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    let valid = std::str::from_utf8(&self.pending[start..start + valid_up_to])
                        .expect("validated prefix");
                    self.buffer.push_str(valid);
                    match e.error_len() {
                        // Invalid bytes: replace and continue past them
                        Some(len) => {
                            self.buffer.push('\u{FFFD}');
                            start += valid_up_to + len;
                        }
                        // Incomplete trailing sequence: keep it for the next chunk
                        None => {
                            self.pending.drain(..start + valid_up_to);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Pull one chunk. Returns the full accumulated buffer after appending,
    /// a transport error if the connection died, or `None` once the source
    /// is exhausted (the terminal done signal).
    pub async fn next_update(&mut self) -> Option<Result<String, TransportError>> {
        if !self.in_flight {
            return None;
        }
        match self.source.next().await {
            Some(Ok(bytes)) => {
                self.append_bytes(&bytes);
                Some(Ok(self.buffer.clone()))
            }
            Some(Err(e)) => {
                self.error = Some(e.clone());
                self.in_flight = false;
                Some(Err(e))
            }
            None => {
                self.in_flight = false;
                None
            }
        }
    }

    /// Drain the stream, invoking `on_update` with the accumulated buffer
    /// after every chunk. Returns the final text, or the transport error
    /// that ended the stream.
    pub async fn read_to_end(
        mut self,
        mut on_update: impl FnMut(&str),
    ) -> Result<String, TransportError> {
        while let Some(update) = self.next_update().await {
            match update {
                Ok(snapshot) => on_update(&snapshot),
                Err(e) => return Err(e),
            }
        }
        Ok(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: Vec<&[u8]>) -> ByteStream {
        let items: Vec<Result<Bytes, TransportError>> = parts
            .into_iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_accumulates_chunks_in_order() {
        let decoder = StreamDecoder::new(chunks(vec![b"Hi ", b"the", b"re"]));

        let mut snapshots = Vec::new();
        let text = decoder
            .read_to_end(|snapshot| snapshots.push(snapshot.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Hi there");
        assert_eq!(snapshots, vec!["Hi ", "Hi the", "Hi there"]);
    }

    #[tokio::test]
    async fn test_multibyte_codepoint_split_across_chunks() {
        // "héllo" with the é split between chunks
        let bytes = "héllo".as_bytes();
        let decoder = StreamDecoder::new(chunks(vec![&bytes[..2], &bytes[2..]]));

        let text = decoder.read_to_end(|_| {}).await.unwrap();
        assert_eq!(text, "héllo");
    }

    #[tokio::test]
    async fn test_invalid_bytes_become_replacement_char() {
        let decoder = StreamDecoder::new(chunks(vec![b"ok \xff done"]));
        let text = decoder.read_to_end(|_| {}).await.unwrap();
        assert_eq!(text, "ok \u{FFFD} done");
    }

    #[tokio::test]
    async fn test_transport_error_is_not_in_band_data() {
        let items: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::new("connection reset")),
        ];
        let mut decoder = StreamDecoder::new(Box::pin(stream::iter(items)));

        assert_eq!(
            decoder.next_update().await,
            Some(Ok("partial".to_string()))
        );
        assert_eq!(
            decoder.next_update().await,
            Some(Err(TransportError::new("connection reset")))
        );
        assert!(!decoder.is_in_flight());
        assert_eq!(
            decoder.error(),
            Some(&TransportError::new("connection reset"))
        );
        // Terminal after a transport failure
        assert_eq!(decoder.next_update().await, None);
    }

    #[tokio::test]
    async fn test_done_signal_after_source_closes() {
        let mut decoder = StreamDecoder::new(chunks(vec![b"x"]));
        assert!(decoder.is_in_flight());
        decoder.next_update().await;
        assert_eq!(decoder.next_update().await, None);
        assert!(!decoder.is_in_flight());
        assert!(decoder.error().is_none());
    }
}
