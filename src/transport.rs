//! The RPC transport boundary.
//!
//! This module defines the [`ControllerRpc`] trait that abstracts over the
//! actual wire transport to the controller, plus the handle types a
//! transport hands back for streaming calls.
//!
//! The wire model is the usual one for a unary/server-streaming RPC stack:
//! a unary call completes exactly once with an optional response or an
//! error, and a streaming call delivers a sequence of items followed by a
//! terminal [`Status`] and an end-of-stream marker, with a cancel
//! operation available at any point. How those are produced (the actual
//! protocol, framing, endpoint setup) is entirely the transport's
//! business.

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use crate::cancel::CancelHandle;
use crate::errors::TransportError;
use crate::types::{
    App, CreateDeploymentRequest, CreateReleaseRequest, CreateScaleRequest, Event, Formation, GetAppFormationRequest, GetAppReleaseRequest, GetAppRequest, GetReleaseRequest,
    ListAppsRequest, ListAppsResponse, ListReleasesRequest, ListReleasesResponse,
    ListScaleRequestsRequest, ListScaleRequestsResponse, Release, ScaleRequest, UpdateAppRequest,
};

// ============================================================================
// Status
// ============================================================================

/// Terminal status code of a streaming call, gRPC-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Cancelled,
    DeadlineExceeded,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    Internal,
    Unavailable,
    Unknown,
}

impl StatusCode {
    /// Whether this code signals success.
    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

/// Terminal status a streaming call reports before ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    /// Human-readable detail string from the remote.
    pub details: String,
}

impl Status {
    pub fn new(code: StatusCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
        }
    }

    /// A success status with no details.
    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.details)
        }
    }
}

// ============================================================================
// Streaming call handles
// ============================================================================

/// One event delivered on a streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    /// A response item.
    Item(T),
    /// The terminal status. Items never follow a status.
    Status(Status),
    /// End of stream.
    End,
}

/// Handle to an open server-streaming call.
///
/// Events arrive on an unbounded channel: delivery from the remote must
/// never apply backpressure to the transport layer. The cancel handle
/// terminates the underlying call; after cancellation the event channel
/// closes without a further `End` marker.
pub struct ServerStream<T> {
    events: mpsc::UnboundedReceiver<StreamEvent<T>>,
    cancel: CancelHandle,
}

impl<T> ServerStream<T> {
    /// Build a stream handle from an event channel and a cancel hook.
    /// Transports construct one of these per streaming call.
    pub fn new(events: mpsc::UnboundedReceiver<StreamEvent<T>>, cancel: CancelHandle) -> Self {
        Self { events, cancel }
    }

    /// Receive the next event. `None` means the transport dropped its end
    /// of the channel (after `End`, or after cancellation).
    pub async fn next_event(&mut self) -> Option<StreamEvent<T>> {
        self.events.recv().await
    }

    /// A handle that cancels the underlying call. Clones share the
    /// at-most-once firing state.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl<T> fmt::Debug for ServerStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStream")
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Handle to a client-streaming call: a [`ServerStream`] plus a request
/// writer.
pub struct RequestStream<Req, T> {
    stream: ServerStream<T>,
    writer: mpsc::UnboundedSender<Req>,
}

impl<Req, T> RequestStream<Req, T> {
    /// Build a handle from its halves. Transports construct one of these
    /// per client-streaming call.
    pub fn new(stream: ServerStream<T>, writer: mpsc::UnboundedSender<Req>) -> Self {
        Self { stream, writer }
    }

    /// Write a request onto the call.
    pub fn write(&self, req: Req) -> Result<(), TransportError> {
        self.writer
            .send(req)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Split off the response half.
    pub fn into_stream(self) -> ServerStream<T> {
        self.stream
    }

    /// A handle that cancels the underlying call.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.stream.cancel_handle()
    }
}

// ============================================================================
// The controller RPC surface
// ============================================================================

/// One method per remote operation of the controller.
///
/// Unary methods resolve with `Ok(None)` when the remote completed the
/// call without either a response payload or an error; the facade treats
/// that as a failure rather than an ambiguous success. Streaming methods
/// return their handle synchronously — opening a stream does not wait for
/// the remote.
///
/// On native multi-threaded executors the returned futures must be
/// `Send`, the same posture as the rest of the async surface.
#[allow(async_fn_in_trait)]
pub trait ControllerRpc: Send + Sync + 'static {
    // ---- unary ----

    fn get_app(
        &self,
        req: GetAppRequest,
    ) -> impl Future<Output = Result<Option<App>, TransportError>> + Send;

    fn update_app(
        &self,
        req: UpdateAppRequest,
    ) -> impl Future<Output = Result<Option<App>, TransportError>> + Send;

    fn update_app_meta(
        &self,
        req: UpdateAppRequest,
    ) -> impl Future<Output = Result<Option<App>, TransportError>> + Send;

    fn create_scale(
        &self,
        req: CreateScaleRequest,
    ) -> impl Future<Output = Result<Option<ScaleRequest>, TransportError>> + Send;

    fn get_release(
        &self,
        req: GetReleaseRequest,
    ) -> impl Future<Output = Result<Option<Release>, TransportError>> + Send;

    fn create_release(
        &self,
        req: CreateReleaseRequest,
    ) -> impl Future<Output = Result<Option<Release>, TransportError>> + Send;

    // ---- server-streaming ----

    fn stream_app(&self, req: GetAppRequest) -> ServerStream<App>;

    fn stream_app_release(&self, req: GetAppReleaseRequest) -> ServerStream<Release>;

    fn stream_app_formation(&self, req: GetAppFormationRequest) -> ServerStream<Formation>;

    fn list_scale_requests_stream(
        &self,
        req: ListScaleRequestsRequest,
    ) -> ServerStream<ListScaleRequestsResponse>;

    fn create_deployment(&self, req: CreateDeploymentRequest) -> ServerStream<Event>;

    // ---- client-streaming ----

    fn list_apps_stream(&self) -> RequestStream<ListAppsRequest, ListAppsResponse>;

    fn list_releases_stream(&self) -> RequestStream<ListReleasesRequest, ListReleasesResponse>;
}
