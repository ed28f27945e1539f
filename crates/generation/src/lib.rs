//! Generation session engine: opens the streaming generation request,
//! frames the chunked response, and applies the resulting events to
//! the live project through its mutation gateway.

mod event;
mod session;
mod transport;

pub use event::{ErrorPayload, GenerationEvent, ResultPayload};
pub use session::{
    build_request, GenerationClient, GenerationError, GenerationRequest, GenerationSession,
    SessionOptions,
};
pub use transport::{HttpTransport, StreamTransport, TransportError};
