#![deny(unsafe_code)]

//! Async client for the controller API.
//!
//! Adapts the controller's unary and server-streaming calls into two
//! consumer-facing shapes: futures for one-shot operations, and callback
//! subscriptions with explicit cancellation for live data.
//!
//! The interesting machinery is in three places:
//!
//! - [`mux`]: one underlying stream per watched resource, shared by all
//!   of its subscribers, torn down when the last one cancels, with the
//!   latest value replayed to late subscribers;
//! - [`cancel`]: the idempotent cancel handle every subscription returns;
//! - [`deploy`]: folding a deployment event stream into a single
//!   terminal result.
//!
//! The wire transport is pluggable: implement [`ControllerRpc`] and hand
//! it to [`Client::new`].
//!
//! # Example
//!
//! ```ignore
//! let client = Client::new(transport(ClientConfig::from_env()));
//! let cancel = client.stream_app("apps/my-app", |update| match update {
//!     Ok(app) => render(app),
//!     Err(e) => show_error(e),
//! });
//! // ... later, on teardown:
//! cancel.cancel();
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod mux;
pub mod transport;
pub mod types;

pub use cancel::CancelHandle;
pub use client::Client;
pub use config::ClientConfig;
pub use errors::{ClientError, StreamError, TransportError};
pub use mux::{StreamMux, Subscription, SubscriptionKey};
pub use transport::{
    ControllerRpc, RequestStream, ServerStream, Status, StatusCode, StreamEvent,
};
pub use types::*;
