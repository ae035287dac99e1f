// openmotics: Async Rust client for the OpenMotics cloud and local gateway APIs

pub mod cloud;
pub mod error;
pub mod gateway;
pub mod websocket;

mod request;
mod token;
mod transport;

pub use error::Error;
pub use request::{MAX_REQUEST_ATTEMPTS, Payload, RequestDescriptor, RetryPolicy};
pub use token::{CLOCK_OUT_OF_SYNC_MAX_SEC, LOCAL_TOKEN_EXPIRES_IN, TokenRefresher};
pub use transport::{DEFAULT_REQUEST_TIMEOUT, TlsMode, TransportConfig};
