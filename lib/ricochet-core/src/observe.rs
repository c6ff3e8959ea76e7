//! Observer hook, called once per physical request.
//!
//! Every attempt and every redirect hop is reported: [`Observer::observe`]
//! runs right before the request is sent and returns a [`Completion`] that
//! runs when it finishes. The engine catches panics from both halves, so an
//! observer can never change the outcome of a call.

use std::fmt;
use std::time::{Duration, SystemTime};

use url::Url;

use crate::{Error, Method};

/// Metadata of a request about to be sent.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method of this hop.
    pub method: Method,
    /// URL of this hop.
    pub url: Url,
    /// Retry attempt, starting at 1.
    pub attempt: u32,
    /// Redirect hop within the attempt, starting at 0.
    pub hop: u32,
    /// Wall-clock start time.
    pub started_at: SystemTime,
}

/// How a physical request ended.
pub struct AttemptOutcome<'a> {
    /// Response status, if a response arrived.
    pub status: Option<u16>,
    /// Transport failure, if no response arrived.
    pub error: Option<&'a Error>,
    /// Time spent on the request.
    pub duration: Duration,
}

impl fmt::Debug for AttemptOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptOutcome")
            .field("status", &self.status)
            .field("error", &self.error.map(ToString::to_string))
            .field("duration", &self.duration)
            .finish()
    }
}

impl AttemptOutcome<'_> {
    /// `true` when a response arrived, whatever its status.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.status.is_some()
    }
}

/// Called when a request finishes.
pub type Completion = Box<dyn for<'a> FnOnce(&AttemptOutcome<'a>) + Send>;

/// Request lifecycle hook.
pub trait Observer: Send + Sync + 'static {
    /// A request is about to be sent.
    fn observe(&self, request: &RequestInfo) -> Completion;
}

impl<F> Observer for F
where
    F: Fn(&RequestInfo) -> Completion + Send + Sync + 'static,
{
    fn observe(&self, request: &RequestInfo) -> Completion {
        self(request)
    }
}
