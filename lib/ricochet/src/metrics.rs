//! Metrics observer using the metrics crate facade.
//!
//! Records one sample per physical request, so retries and redirect hops are
//! all counted. Works with any `metrics` recorder (Prometheus, `StatsD`, ...).

use ricochet_core::{AttemptOutcome, Completion, Observer, RequestInfo};

/// Labels used for metrics.
const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";

/// Metric names.
const METRIC_REQUESTS_TOTAL: &str = "http_client_requests_total";
const METRIC_REQUEST_DURATION: &str = "http_client_request_duration_seconds";
const METRIC_REQUESTS_IN_FLIGHT: &str = "http_client_requests_in_flight";

/// Observer that records HTTP metrics.
///
/// Records the following metrics:
/// - `http_client_requests_total` (counter): requests, labeled by method and status
/// - `http_client_request_duration_seconds` (histogram): request duration in seconds
/// - `http_client_requests_in_flight` (gauge): requests currently in flight
///
/// Failed requests carry the status label `error`.
///
/// # Example
///
/// ```ignore
/// use ricochet::{Client, MetricsObserver};
///
/// let client = Client::builder().observe(MetricsObserver::new()).build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver {
    _private: (),
}

impl MetricsObserver {
    /// Create a new metrics observer.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

fn status_label(outcome: &AttemptOutcome<'_>) -> String {
    outcome
        .status
        .map_or_else(|| "error".to_string(), |status| status.to_string())
}

/// Holds one unit of the in-flight gauge until dropped.
///
/// The completion owns it, so the gauge goes back down even when the call
/// future is dropped before the attempt finishes.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

impl Observer for MetricsObserver {
    fn observe(&self, request: &RequestInfo) -> Completion {
        let method = request.method.as_str();
        let in_flight = InFlight::enter();

        Box::new(move |outcome: &AttemptOutcome<'_>| {
            drop(in_flight);

            metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_METHOD => method)
                .record(outcome.duration.as_secs_f64());

            metrics::counter!(
                METRIC_REQUESTS_TOTAL,
                LABEL_METHOD => method,
                LABEL_STATUS => status_label(outcome)
            )
            .increment(1);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    use assert2::check;
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use ricochet_core::{Error, Method, Url};

    use super::*;

    fn request() -> RequestInfo {
        RequestInfo {
            method: Method::Get,
            url: Url::parse("https://example.com/test").expect("valid url"),
            attempt: 1,
            hop: 0,
            started_at: SystemTime::now(),
        }
    }

    #[test]
    fn status_labels() {
        let ok = AttemptOutcome {
            status: Some(503),
            error: None,
            duration: Duration::from_millis(3),
        };
        assert_eq!(status_label(&ok), "503");

        let error = Error::Timeout;
        let failed = AttemptOutcome {
            status: None,
            error: Some(&error),
            duration: Duration::from_millis(3),
        };
        assert_eq!(status_label(&failed), "error");
    }

    #[test]
    fn records_without_recorder() {
        // No recorder installed: the facade turns every call into a no-op.
        let completion = MetricsObserver::new().observe(&request());
        completion(&AttemptOutcome {
            status: Some(200),
            error: None,
            duration: Duration::from_millis(1),
        });
    }

    /// Recorder tracking the in-flight gauge only.
    #[derive(Default)]
    struct FlightRecorder(Arc<Flight>);

    #[derive(Default)]
    struct Flight(Mutex<f64>);

    impl Flight {
        fn value(&self) -> f64 {
            *self.0.lock().expect("lock")
        }
    }

    impl GaugeFn for Flight {
        fn increment(&self, value: f64) {
            *self.0.lock().expect("lock") += value;
        }

        fn decrement(&self, value: f64) {
            *self.0.lock().expect("lock") -= value;
        }

        fn set(&self, value: f64) {
            *self.0.lock().expect("lock") = value;
        }
    }

    impl Recorder for FlightRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == METRIC_REQUESTS_IN_FLIGHT {
                Gauge::from_arc(Arc::clone(&self.0))
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn in_flight_returns_to_zero_on_every_path() {
        let recorder = FlightRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let observer = MetricsObserver::new();

            let completed = observer.observe(&request());
            check!(recorder.0.value() == 1.0);
            completed(&AttemptOutcome {
                status: Some(200),
                error: None,
                duration: Duration::from_millis(1),
            });
            check!(recorder.0.value() == 0.0);

            // a call future dropped mid-attempt never runs its completion
            let abandoned = observer.observe(&request());
            check!(recorder.0.value() == 1.0);
            drop(abandoned);
            check!(recorder.0.value() == 0.0);
        });
    }
}
