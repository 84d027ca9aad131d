//! Application payloads and request types for the controller API.
//!
//! These are opaque data carriers: the client never inspects them beyond
//! routing (the one exception is [`Event`], which the deployment
//! aggregator probes for an embedded [`Deployment`]).

use std::collections::HashMap;

// ============================================================================
// Resources
// ============================================================================

/// An application managed by the controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct App {
    /// Fully-qualified resource name, e.g. `apps/my-app`.
    pub name: String,
    pub display_name: String,
    pub labels: HashMap<String, String>,
    /// Resource name of the current release, empty if none.
    pub release: String,
}

/// Release type filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseType {
    #[default]
    Any,
    Code,
    Config,
}

/// A release of an application.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Release {
    /// Fully-qualified resource name, e.g. `apps/my-app/releases/r1`.
    pub name: String,
    pub artifacts: Vec<String>,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub release_type: ReleaseType,
}

/// The process formation of an application release.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Formation {
    pub app: String,
    pub release: String,
    /// Process type to desired count.
    pub processes: HashMap<String, i32>,
    /// Process type to placement tags.
    pub tags: HashMap<String, HashMap<String, String>>,
}

/// State of a scale request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleRequestState {
    #[default]
    Pending,
    Cancelled,
    Complete,
}

/// A request to change an application's formation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScaleRequest {
    pub name: String,
    pub parent: String,
    pub state: ScaleRequestState,
    pub old_processes: HashMap<String, i32>,
    pub new_processes: HashMap<String, i32>,
}

/// A deployment of a release.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Deployment {
    pub name: String,
    pub app: String,
    pub old_release: String,
    pub new_release: String,
}

/// A deployment-related event on the event stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeploymentEvent {
    /// The deployment this event refers to, when the controller has one.
    pub deployment: Option<Deployment>,
}

/// One item on the controller's event stream.
///
/// Events are heterogeneous; only the deployment arm matters to this
/// client, everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub parent: String,
    pub deployment_event: Option<DeploymentEvent>,
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListAppsRequest {}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListAppsResponse {
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetAppRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateAppRequest {
    pub app: App,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetAppReleaseRequest {
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetAppFormationRequest {
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetReleaseRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateReleaseRequest {
    pub parent: String,
    pub release: Release,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListReleasesRequest {
    pub parent: String,
    pub filter_labels: HashMap<String, String>,
    pub filter_type: Option<ReleaseType>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListReleasesResponse {
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateScaleRequest {
    pub parent: String,
    pub processes: HashMap<String, i32>,
    pub tags: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListScaleRequestsRequest {
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListScaleRequestsResponse {
    pub scale_requests: Vec<ScaleRequest>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateDeploymentRequest {
    pub parent: String,
    pub release: String,
    /// Reuse the formation of the release being replaced.
    pub use_prev_formation: bool,
    /// Explicit formation, consulted when `use_prev_formation` is false.
    pub processes: HashMap<String, i32>,
    pub tags: HashMap<String, HashMap<String, String>>,
}

// ============================================================================
// Request modifiers
// ============================================================================

/// Filters applied to a [`ListReleasesRequest`] before it is written.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleasesFilter {
    /// Keep releases carrying all of these labels.
    Labels(HashMap<String, String>),
    /// Keep releases of this type.
    Type(ReleaseType),
}

impl ReleasesFilter {
    /// Fold this filter into the outgoing request.
    pub fn apply(&self, req: &mut ListReleasesRequest) {
        match self {
            ReleasesFilter::Labels(labels) => {
                for (k, v) in labels {
                    req.filter_labels.insert(k.clone(), v.clone());
                }
            }
            ReleasesFilter::Type(release_type) => {
                req.filter_type = Some(*release_type);
            }
        }
    }
}
