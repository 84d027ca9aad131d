//! The public client facade.
//!
//! One method per remote operation, each wiring the smallest sufficient
//! machinery:
//!
//! - unary calls become futures;
//! - plain streams are opened directly and forwarded into the caller's
//!   callback, returning a [`CancelHandle`];
//! - streams for resources watched by many independent consumers go
//!   through the [`StreamMux`], which shares one underlying call per
//!   resource and replays the latest value to late subscribers;
//! - deployment creation drives an event stream to its terminal status
//!   and resolves with the deployment it produced.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::cancel::CancelHandle;
use crate::deploy;
use crate::errors::{ClientError, StreamError, TransportError};
use crate::mux::StreamMux;
use crate::transport::{ControllerRpc, ServerStream, StreamEvent};
use crate::types::{
    App, CreateDeploymentRequest, CreateReleaseRequest, CreateScaleRequest, Deployment, Event,
    Formation, GetAppFormationRequest, GetAppReleaseRequest, GetAppRequest, GetReleaseRequest,
    ListAppsRequest, ListReleasesRequest, ListScaleRequestsRequest, Release, ReleasesFilter,
    ScaleRequest, UpdateAppRequest,
};

/// Mux context names. Two subscriptions share a stream only when both the
/// context and the resource match.
const CTX_STREAM_APP: &str = "stream_app";
const CTX_STREAM_APP_FORMATION: &str = "stream_app_formation";

/// Client for the controller API, generic over the transport.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Streaming
/// methods must be called from within a tokio runtime (they spawn the
/// tasks that feed the caller's callback).
pub struct Client<C> {
    rpc: Arc<C>,
    app_streams: StreamMux<App>,
    formation_streams: StreamMux<Formation>,
}

impl<C: ControllerRpc> Client<C> {
    pub fn new(rpc: C) -> Self {
        Self {
            rpc: Arc::new(rpc),
            app_streams: StreamMux::new(),
            formation_streams: StreamMux::new(),
        }
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// Subscribe to snapshots of the full app list.
    pub fn list_apps_stream<F>(&self, cb: F) -> CancelHandle
    where
        F: FnMut(Result<Vec<App>, StreamError>) + Send + 'static,
    {
        let stream = self.rpc.list_apps_stream();
        if stream.write(ListAppsRequest::default()).is_err() {
            warn!("list-apps stream closed before the initial request was written");
        }
        let cancel = stream.cancel_handle();
        spawn_forwarder(stream.into_stream(), |response| response.apps, cb);
        cancel
    }

    pub async fn get_app(&self, name: &str) -> Result<App, ClientError> {
        let req = GetAppRequest {
            name: name.to_string(),
        };
        expect_response(self.rpc.get_app(req).await)
    }

    /// Watch the live state of one app. Concurrent watchers of the same
    /// app share a single underlying stream; a late watcher is called
    /// synchronously with the latest known state before this returns.
    pub fn stream_app<F>(&self, name: &str, mut cb: F) -> CancelHandle
    where
        F: FnMut(Result<App, StreamError>) + Send + 'static,
    {
        let rpc = Arc::clone(&self.rpc);
        let req_name = name.to_string();
        let (subscription, last) = self.app_streams.subscribe(CTX_STREAM_APP, name, move || {
            rpc.stream_app(GetAppRequest { name: req_name })
        });
        let cancel = subscription.cancel_handle();
        if let Some(app) = last {
            cb(Ok(app));
        }
        spawn_mux_forwarder(subscription.into_updates(), cb);
        cancel
    }

    pub async fn update_app(&self, app: App) -> Result<App, ClientError> {
        let req = UpdateAppRequest { app };
        expect_response(self.rpc.update_app(req).await)
    }

    pub async fn update_app_meta(&self, app: App) -> Result<App, ClientError> {
        let req = UpdateAppRequest { app };
        expect_response(self.rpc.update_app_meta(req).await)
    }

    // ------------------------------------------------------------------
    // Releases
    // ------------------------------------------------------------------

    /// Watch the current release of an app. Each caller gets its own
    /// stream.
    pub fn stream_app_release<F>(&self, app_name: &str, cb: F) -> CancelHandle
    where
        F: FnMut(Result<Release, StreamError>) + Send + 'static,
    {
        let req = GetAppReleaseRequest {
            parent: app_name.to_string(),
        };
        let stream = self.rpc.stream_app_release(req);
        let cancel = stream.cancel_handle();
        spawn_forwarder(stream, |release| release, cb);
        cancel
    }

    pub async fn get_release(&self, name: &str) -> Result<Release, ClientError> {
        let req = GetReleaseRequest {
            name: name.to_string(),
        };
        expect_response(self.rpc.get_release(req).await)
    }

    /// Subscribe to snapshots of an app's release list, optionally
    /// filtered.
    pub fn list_releases_stream<F>(
        &self,
        parent_name: &str,
        filters: &[ReleasesFilter],
        cb: F,
    ) -> CancelHandle
    where
        F: FnMut(Result<Vec<Release>, StreamError>) + Send + 'static,
    {
        let stream = self.rpc.list_releases_stream();
        let mut req = ListReleasesRequest {
            parent: parent_name.to_string(),
            ..Default::default()
        };
        for filter in filters {
            filter.apply(&mut req);
        }
        if stream.write(req).is_err() {
            warn!("list-releases stream closed before the initial request was written");
        }
        let cancel = stream.cancel_handle();
        spawn_forwarder(stream.into_stream(), |response| response.releases, cb);
        cancel
    }

    pub async fn create_release(
        &self,
        parent_name: &str,
        release: Release,
    ) -> Result<Release, ClientError> {
        let req = CreateReleaseRequest {
            parent: parent_name.to_string(),
            release,
        };
        expect_response(self.rpc.create_release(req).await)
    }

    // ------------------------------------------------------------------
    // Formations and scale
    // ------------------------------------------------------------------

    /// Watch the formation of an app. Concurrent watchers share a single
    /// underlying stream, with synchronous catch-up like
    /// [`stream_app`](Client::stream_app).
    pub fn stream_app_formation<F>(&self, app_name: &str, mut cb: F) -> CancelHandle
    where
        F: FnMut(Result<Formation, StreamError>) + Send + 'static,
    {
        let rpc = Arc::clone(&self.rpc);
        let parent = app_name.to_string();
        let (subscription, last) =
            self.formation_streams
                .subscribe(CTX_STREAM_APP_FORMATION, app_name, move || {
                    rpc.stream_app_formation(GetAppFormationRequest { parent })
                });
        let cancel = subscription.cancel_handle();
        if let Some(formation) = last {
            cb(Ok(formation));
        }
        spawn_mux_forwarder(subscription.into_updates(), cb);
        cancel
    }

    pub async fn create_scale(&self, req: CreateScaleRequest) -> Result<ScaleRequest, ClientError> {
        expect_response(self.rpc.create_scale(req).await)
    }

    /// Subscribe to snapshots of an app's scale requests. Each caller
    /// gets its own stream.
    pub fn list_scale_requests_stream<F>(&self, app_name: &str, cb: F) -> CancelHandle
    where
        F: FnMut(Result<Vec<ScaleRequest>, StreamError>) + Send + 'static,
    {
        let req = ListScaleRequestsRequest {
            parent: app_name.to_string(),
        };
        let stream = self.rpc.list_scale_requests_stream(req);
        let cancel = stream.cancel_handle();
        spawn_forwarder(stream, |response| response.scale_requests, cb);
        cancel
    }

    // ------------------------------------------------------------------
    // Deployments
    // ------------------------------------------------------------------

    /// Deploy a release, reusing the formation of the release it
    /// replaces. Resolves once the controller reports the deployment
    /// finished.
    pub async fn create_deployment(
        &self,
        parent_name: &str,
        release_name: &str,
    ) -> Result<Deployment, ClientError> {
        let req = CreateDeploymentRequest {
            parent: parent_name.to_string(),
            release: release_name.to_string(),
            use_prev_formation: true,
            ..Default::default()
        };
        self.deploy(req).await
    }

    /// Deploy a release with an explicit formation.
    pub async fn create_deployment_with_formation(
        &self,
        parent_name: &str,
        release_name: &str,
        formation: Formation,
    ) -> Result<Deployment, ClientError> {
        let req = CreateDeploymentRequest {
            parent: parent_name.to_string(),
            release: release_name.to_string(),
            use_prev_formation: false,
            processes: formation.processes,
            tags: formation.tags,
        };
        self.deploy(req).await
    }

    async fn deploy(&self, req: CreateDeploymentRequest) -> Result<Deployment, ClientError> {
        let stream = self.rpc.create_deployment(req);
        deploy::watch_for_result(stream, |event: &Event| {
            event
                .deployment_event
                .as_ref()
                .and_then(|de| de.deployment.clone())
        })
        .await
    }
}

/// Turn a unary reply into a facade result. A missing payload without an
/// error is a failure, not a success.
fn expect_response<T>(reply: Result<Option<T>, TransportError>) -> Result<T, ClientError> {
    match reply {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(ClientError::EmptyResponse),
        Err(e) => Err(ClientError::Transport(e)),
    }
}

/// Feed a directly-owned stream into a callback until it ends. A non-OK
/// terminal status reaches the callback's error arm.
fn spawn_forwarder<T, U, M, F>(mut stream: ServerStream<T>, map: M, mut cb: F)
where
    T: Send + 'static,
    U: Send + 'static,
    M: Fn(T) -> U + Send + 'static,
    F: FnMut(Result<U, StreamError>) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Item(item) => cb(Ok(map(item))),
                StreamEvent::Status(status) => {
                    if !status.is_ok() {
                        cb(Err(StreamError::Status(status)));
                    }
                }
                StreamEvent::End => break,
            }
        }
    });
}

/// Feed a mux subscription into a callback until the shared stream goes
/// away.
fn spawn_mux_forwarder<T, F>(
    mut updates: tokio::sync::broadcast::Receiver<Result<T, StreamError>>,
    mut cb: F,
) where
    T: Clone + Send + 'static,
    F: FnMut(Result<T, StreamError>) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => cb(update),
                Err(RecvError::Lagged(missed)) => cb(Err(StreamError::Lagged(missed))),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
