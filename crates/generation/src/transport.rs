use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Source of raw response chunks for one generation session. The
/// session controller releases it on every terminal path; `cancel`
/// must be safe to call more than once.
#[async_trait]
pub trait StreamTransport: Send {
    /// Next chunk in arrival order; `None` once the stream has closed.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>>;

    /// Drop the underlying connection immediately.
    fn cancel(&mut self);
}

/// Chunked HTTP response body from the generation endpoint.
pub struct HttpTransport {
    stream: Option<BoxStream<'static, Result<Vec<u8>, TransportError>>>,
}

impl HttpTransport {
    pub fn new(response: reqwest::Response) -> Self {
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| TransportError(err.to_string()))
        });
        Self {
            stream: Some(stream.boxed()),
        }
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        self.stream.as_mut()?.next().await
    }

    fn cancel(&mut self) {
        self.stream = None;
    }
}
