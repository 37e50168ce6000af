//! An incremental reader for server-sent events.

#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The underlying connection failed.
    Connection,
    /// The stream delivered a block that is not valid UTF-8.
    InvalidUtf8,
}

/// An adapter for the byte sources an event stream can read from.
pub enum ByteSource {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

impl ByteSource {
    pub fn from_response(response: Response) -> Self {
        ByteSource::Response(response)
    }

    #[cfg(test)]
    pub fn scripted(chunks: impl Into<VecDeque<Bytes>>) -> Self {
        ByteSource::Scripted(chunks.into())
    }

    #[inline]
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            ByteSource::Response(response) => {
                response.chunk().await.map_err(|_| Error::Connection)
            }
            #[cfg(test)]
            ByteSource::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }
}

/// One parsed event block.
#[derive(Debug, PartialEq, Eq)]
pub struct SseBlock {
    /// The event name, when the server sent an `event:` field.
    pub event: Option<String>,
    /// The concatenated data payload.
    pub data: String,
}

/// A type for reading server-sent event blocks from a chunk stream.
///
/// The backend frames every payload as an `event:`/`data:` pair followed
/// by a blank line. Bytes are buffered until a full block is available,
/// so chunk boundaries may fall anywhere, including inside a multi-byte
/// character. Only line feeds are handled as line terminators.
pub struct Sse {
    buf: Vec<u8>,
    source: ByteSource,
}

impl Sse {
    #[inline]
    pub fn new(source: ByteSource) -> Self {
        Self {
            buf: Vec::new(),
            source,
        }
    }

    /// Reads the next complete event block.
    ///
    /// Returns `None` when the stream ends. Blocks that carry no data
    /// (comments, bare `event:` lines) are skipped.
    pub async fn next_block(&mut self) -> Result<Option<SseBlock>, Error> {
        loop {
            if let Some(end) =
                self.buf.windows(2).position(|w| w == b"\n\n")
            {
                let block: Vec<u8> = self.buf.drain(..end + 2).collect();
                let text = str::from_utf8(&block[..end])
                    .map_err(|_| Error::InvalidUtf8)?;
                if let Some(parsed) = parse_block(text) {
                    return Ok(Some(parsed));
                }
                continue;
            }

            let Some(bytes) = self.source.next_chunk().await? else {
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }
}

/// Parses the field lines of one block.
///
/// Per the SSE grammar: comment lines start with a colon, a missing
/// value is the empty string, one optional space after the colon is
/// stripped, and multiple `data:` lines are joined with line feeds.
/// Fields other than `event` and `data` are not used by the backend and
/// are ignored.
fn parse_block(text: &str) -> Option<SseBlock> {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_owned()),
            "data" => match &mut data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_owned()),
            },
            _ => {}
        }
    }
    data.map(|data| SseBlock { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(chunks: &[&'static [u8]]) -> Sse {
        Sse::new(ByteSource::scripted(
            chunks
                .iter()
                .map(|c| Bytes::from_static(c))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn test_normal_blocks() {
        let mut sse = scripted(&[
            b"event: message\ndata: hello\n\n",
            b"event: message\ndata: bye\n\n",
        ]);
        assert_eq!(
            sse.next_block().await.unwrap().unwrap(),
            SseBlock {
                event: Some("message".to_owned()),
                data: "hello".to_owned(),
            }
        );
        assert_eq!(
            sse.next_block().await.unwrap().unwrap().data,
            "bye"
        );
        assert_eq!(sse.next_block().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        // Chunk boundaries can fall anywhere inside a block.
        let mut sse = scripted(&[b"event: mess", b"age\ndata:", b" hello\n", b"\n"]);
        let block = sse.next_block().await.unwrap().unwrap();
        assert_eq!(block.event.as_deref(), Some("message"));
        assert_eq!(block.data, "hello");
        assert_eq!(sse.next_block().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        // "é" is 0xC3 0xA9; the split lands between the two bytes.
        let mut sse = scripted(&[b"data: caf\xc3", b"\xa9\n\n"]);
        assert_eq!(sse.next_block().await.unwrap().unwrap().data, "café");
    }

    #[tokio::test]
    async fn test_data_only_block() {
        let mut sse = scripted(&[b"data: {\"type\": \"final\"}\n\n"]);
        let block = sse.next_block().await.unwrap().unwrap();
        assert_eq!(block.event, None);
        assert_eq!(block.data, "{\"type\": \"final\"}");
    }

    #[tokio::test]
    async fn test_multiline_data_is_joined() {
        let mut sse = scripted(&[b"data: first\ndata: second\n\n"]);
        assert_eq!(
            sse.next_block().await.unwrap().unwrap().data,
            "first\nsecond"
        );
    }

    #[tokio::test]
    async fn test_comments_and_dataless_blocks_are_skipped() {
        let mut sse = scripted(&[
            b": keep-alive comment\n\n",
            b"event: lonely\n\n",
            b"data: real\n\n",
        ]);
        assert_eq!(sse.next_block().await.unwrap().unwrap().data, "real");
    }

    #[tokio::test]
    async fn test_incomplete_block_at_end_of_stream() {
        let mut sse = scripted(&[b"data: truncated\n"]);
        assert_eq!(sse.next_block().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_block() {
        let mut sse = scripted(&[b"data: \xff\xfe\n\n"]);
        assert_eq!(
            sse.next_block().await.unwrap_err(),
            Error::InvalidUtf8
        );
    }
}
