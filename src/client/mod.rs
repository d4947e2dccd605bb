//! Client side of a chat session: the HTTP API, the media and messaging
//! transport, and the controller that ties them together.

use reqwest::StatusCode;

mod api;
mod session;
mod transport;

pub use api::ApiClient;
pub use session::{ChatLine, RenderState, SessionController, Speaker};
pub use transport::{LocalHub, LocalTransport, MediaKind, Transport, TransportEvent};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("not signed in")]
    SignedOut,
    #[error("no active session")]
    NotConnected,
}

pub type ClientResult<T> = Result<T, ClientError>;
