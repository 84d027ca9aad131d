//! Folding a deployment event stream into a single terminal result.
//!
//! Creating a deployment does not return the deployment directly: the
//! controller answers with an event stream, and the deployment descriptor
//! shows up somewhere in it. [`watch_for_result`] drives such a stream to
//! its terminal status, keeping only the newest value of interest, and
//! settles exactly once.

use tracing::debug;

use crate::errors::ClientError;
use crate::transport::{ServerStream, StreamEvent};

/// Consume `stream` until it reports a terminal status, retaining the
/// newest value `extract` pulls out of an event.
///
/// Resolution rules:
/// - terminal status OK with a retained value: that value;
/// - terminal status not OK: [`ClientError::Status`] carrying it;
/// - terminal status OK but nothing was ever extracted:
///   [`ClientError::NoResult`];
/// - stream end without any status: [`ClientError::MissingStatus`].
///
/// The first status settles the result; nothing after it is consumed.
pub async fn watch_for_result<E, T, F>(
    mut stream: ServerStream<E>,
    extract: F,
) -> Result<T, ClientError>
where
    F: Fn(&E) -> Option<T>,
{
    let mut latest = None;
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Item(item) => {
                if let Some(value) = extract(&item) {
                    latest = Some(value);
                }
            }
            StreamEvent::Status(status) => {
                debug!(%status, "event stream reported terminal status");
                if !status.is_ok() {
                    return Err(ClientError::Status(status));
                }
                return latest.ok_or(ClientError::NoResult);
            }
            StreamEvent::End => break,
        }
    }
    Err(ClientError::MissingStatus)
}
