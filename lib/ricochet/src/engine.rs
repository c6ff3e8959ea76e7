//! Request execution: retries around redirect chains around the transport.
//!
//! One call runs inside an `http_request` span. Each retry attempt gets a fresh
//! deadline covering its whole redirect chain, and every hop rebuilds its
//! request from the prepared parts, opening the body again. The backoff sleep
//! and the transport call both give way to the caller's cancellation token.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, span, warn};
use url::Url;

use crate::config::{ClientConfig, MAX_REDIRECTS, RedirectPolicy};
use crate::redirect;
use crate::transport::SharedTransport;
use crate::{
    AttemptOutcome, Completion, Error, HeaderMap, HttpError, Method, Observer, Request,
    RequestEncoding, RequestInfo, Response, Result,
};

/// Everything needed to (re)build one physical request.
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) encoding: Option<RequestEncoding>,
}

impl Outgoing {
    /// Build a request with a freshly opened body.
    fn build(&self) -> Result<Request> {
        let builder = Request::builder(self.method, self.url.clone()).headers(self.headers.clone());
        let request = match &self.encoding {
            Some(encoding) => builder.body(encoding.open()?).build(),
            None => builder.build(),
        };
        Ok(request)
    }
}

/// Run a call to completion: retries, redirects and error coercion.
pub(crate) async fn execute(
    config: &ClientConfig,
    transport: &SharedTransport,
    outgoing: Outgoing,
    cancel: Option<&CancellationToken>,
) -> Result<Response> {
    let span = span!(Level::INFO, "http_request", method = %outgoing.method, url = %outgoing.url);

    async move {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let Some(policy) = &config.retry else {
            return run_attempt(config, transport, &outgoing, 1, cancel).await;
        };

        let started = Instant::now();
        let mut schedule = policy.schedule();
        let mut attempt = 1;
        loop {
            let error = match run_attempt(config, transport, &outgoing, attempt, cancel).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let Some(delay) = schedule.next_delay(attempt, &error, started.elapsed()) else {
                return Err(error);
            };
            warn!(attempt, delay_ms = delay.as_millis(), error = %error, "retrying request");

            tokio::select! {
                biased;
                () = cancelled(cancel) => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
    .instrument(span)
    .await
}

/// One retry attempt: a redirect chain under a single deadline.
async fn run_attempt(
    config: &ClientConfig,
    transport: &SharedTransport,
    outgoing: &Outgoing,
    attempt: u32,
    cancel: Option<&CancellationToken>,
) -> Result<Response> {
    let deadline = Instant::now().checked_add(config.timeout);
    let mut current = outgoing.clone();
    let mut hop = 0;

    loop {
        let response = send_hop(config, transport, &current, attempt, hop, deadline, cancel).await?;
        let status = response.status();
        if status < 300 {
            return Ok(response);
        }

        if config.redirects == RedirectPolicy::Follow && redirect::is_followed(status) {
            if let Some(target) = redirect::location(&response, &current.url) {
                let target = target?;
                if hop as usize + 1 >= MAX_REDIRECTS {
                    return Err(Error::TooManyRedirects { max: MAX_REDIRECTS });
                }
                debug!(status, hop, location = %target, "following redirect");
                current = redirect::follow(&current, status, target);
                hop += 1;
                continue;
            }
        }

        return Err(coerce(config, response));
    }
}

/// Wrap a response with a status of 300 or above, capturing the body when
/// a decoder is configured.
fn coerce(config: &ClientConfig, response: Response) -> Error {
    match &config.decoder {
        Some(decoder) => match HttpError::capture(response, Arc::clone(decoder)) {
            Ok(err) => Error::Http(err),
            Err(err) => err,
        },
        None => Error::Http(HttpError::new(response)),
    }
}

async fn send_hop(
    config: &ClientConfig,
    transport: &SharedTransport,
    current: &Outgoing,
    attempt: u32,
    hop: u32,
    deadline: Option<Instant>,
    cancel: Option<&CancellationToken>,
) -> Result<Response> {
    let request = current.build()?;

    let completion = config.observer.as_deref().and_then(|observer| {
        start_observer(
            observer,
            &RequestInfo {
                method: current.method,
                url: current.url.clone(),
                attempt,
                hop,
                started_at: SystemTime::now(),
            },
        )
    });

    debug!(attempt, hop, method = %current.method, url = %current.url, "sending request");
    let started = Instant::now();

    let result = tokio::select! {
        biased;
        () = cancelled(cancel) => Err(Error::Cancelled),
        result = within(deadline, transport.send(request)) => result,
    };

    let duration = started.elapsed();
    match &result {
        Ok(response) => debug!(status = response.status(), ?duration, "received response"),
        Err(error) => debug!(error = %error, ?duration, "request failed"),
    }

    if let Some(completion) = completion {
        finish_observer(completion, &result, duration);
    }
    result
}

fn start_observer(observer: &dyn Observer, info: &RequestInfo) -> Option<Completion> {
    match catch_unwind(AssertUnwindSafe(|| observer.observe(info))) {
        Ok(completion) => Some(completion),
        Err(_) => {
            warn!(url = %info.url, "observer panicked on request start");
            None
        }
    }
}

fn finish_observer(completion: Completion, result: &Result<Response>, duration: Duration) {
    let outcome = AttemptOutcome {
        status: result.as_ref().ok().map(Response::status),
        error: result.as_ref().err(),
        duration,
    };
    if catch_unwind(AssertUnwindSafe(|| completion(&outcome))).is_err() {
        warn!("observer panicked on request completion");
    }
}

/// Await `send` until the deadline. A deadline too far to represent never fires.
async fn within(
    deadline: Option<Instant>,
    send: impl Future<Output = Result<Response>>,
) -> Result<Response> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, send)
            .await
            .unwrap_or_else(|_| Err(Error::Timeout)),
        None => send.await,
    }
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
