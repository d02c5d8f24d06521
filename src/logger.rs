//! A request/response logger built on the observer list.

use crate::notification::{NetworkObserver, ObserverId, RequestEvent, ResponseEvent, WeakObservers};
use crate::service::NetworkService;
use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

/// Destination for the lines produced by a [`NetworkLogger`].
pub trait LogSink: Send + Sync {
    /// Writes one log line.
    fn log(&self, level: Level, message: &str);
}

/// Forwards log lines to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!("{}", message);
        } else if level == Level::WARN {
            tracing::warn!("{}", message);
        } else if level == Level::INFO {
            tracing::info!("{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!("{}", message);
        } else {
            tracing::trace!("{}", message);
        }
    }
}

/// Logs every request sent by a service and every response it receives.
///
/// The logger does nothing until [`start`](Self::start) is called. It holds
/// only a weak reference to the service's observers, so it never keeps a
/// service alive.
///
/// # Examples
///
/// ```no_run
/// use courier::{NetworkLogger, NetworkService};
///
/// # fn example() -> Result<(), courier::NetworkError> {
/// let service = NetworkService::builder().build()?;
/// let logger = NetworkLogger::new(&service).include_headers(true);
/// logger.start();
/// // ... requests are logged ...
/// logger.stop();
/// # Ok(())
/// # }
/// ```
pub struct NetworkLogger {
    observers: WeakObservers,
    include_headers: bool,
    include_body: bool,
    sink: Arc<dyn LogSink>,
    registration: Mutex<Option<Registration>>,
}

struct Registration {
    id: ObserverId,
    active: Arc<AtomicBool>,
}

impl NetworkLogger {
    /// Creates a stopped logger for `service`.
    pub fn new(service: &NetworkService) -> Self {
        Self {
            observers: service.observers().downgrade(),
            include_headers: false,
            include_body: true,
            sink: Arc::new(TracingSink),
            registration: Mutex::new(None),
        }
    }

    /// Whether to log request and response headers. Defaults to `false`.
    ///
    /// Headers are always logged for error responses.
    pub fn include_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    /// Whether to log request and response bodies. Defaults to `true`.
    pub fn include_body(mut self, include: bool) -> Self {
        self.include_body = include;
        self
    }

    /// Sets where log lines are written. Defaults to [`TracingSink`].
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Starts logging. Calling it again while started has no effect.
    pub fn start(&self) {
        let mut registration = self.registration.lock();
        if registration.is_some() {
            return;
        }
        let Some(observers) = self.observers.upgrade() else {
            tracing::debug!("Network service dropped, logger not started");
            return;
        };

        let active = Arc::new(AtomicBool::new(true));
        let id = observers.add(Arc::new(LogObserver {
            include_headers: self.include_headers,
            include_body: self.include_body,
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&active),
        }));
        *registration = Some(Registration { id, active });
    }

    /// Stops logging. Calling it again while stopped has no effect.
    pub fn stop(&self) {
        let Some(registration) = self.registration.lock().take() else {
            return;
        };
        // A notification already in flight may still hold the observer.
        registration.active.store(false, Ordering::SeqCst);
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(registration.id);
        }
    }

    /// Returns `true` while the logger is started.
    pub fn is_started(&self) -> bool {
        self.registration.lock().is_some()
    }
}

impl Drop for NetworkLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for NetworkLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkLogger")
            .field("include_headers", &self.include_headers)
            .field("include_body", &self.include_body)
            .field("started", &self.is_started())
            .finish()
    }
}

struct LogObserver {
    include_headers: bool,
    include_body: bool,
    sink: Arc<dyn LogSink>,
    active: Arc<AtomicBool>,
}

impl NetworkObserver for LogObserver {
    fn did_request(&self, event: &RequestEvent<'_>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let request = event.request;
        let mut line = format!("{} {}", request.method, request.url);
        if self.include_headers {
            append_headers(&mut line, &request.headers);
        }
        if self.include_body {
            if let Some(body) = &request.body {
                append_body(&mut line, body);
            }
        }
        self.sink.log(Level::INFO, &line);
    }

    fn did_receive(&self, event: &ResponseEvent<'_>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let mut line = format!("[{}ms] ", event.duration.as_millis());
        let is_error_status = match event.response {
            Some(response) => {
                let _ = write!(line, "{} ", response.status.as_u16());
                response.status.is_client_error() || response.status.is_server_error()
            }
            None => false,
        };
        match event.response {
            Some(response) => line.push_str(response.url.as_str()),
            None => line.push_str(event.request.url.as_str()),
        }

        if let Some(response) = event.response {
            if self.include_headers || is_error_status {
                append_headers(&mut line, &response.headers);
            }
            if self.include_body || is_error_status {
                append_body(&mut line, &response.body);
            }
        }

        match event.error {
            Some(error) => {
                let _ = write!(line, ": {}", error);
                self.sink.log(Level::ERROR, &line);
            }
            None => self.sink.log(Level::INFO, &line),
        }
    }
}

fn append_headers(line: &mut String, headers: &HeaderMap) {
    if headers.is_empty() {
        return;
    }
    line.push_str(":\n");
    for (name, value) in headers {
        let _ = writeln!(line, "{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
}

fn append_body(line: &mut String, body: &Bytes) {
    if body.is_empty() {
        return;
    }
    if let Ok(text) = std::str::from_utf8(body) {
        line.push('\n');
        line.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RequestDescriptor;
    use http::{HeaderValue, Method};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Level, String)>>);

    impl LogSink for Recorder {
        fn log(&self, level: Level, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    fn observer(recorder: Arc<Recorder>, include_headers: bool) -> LogObserver {
        LogObserver {
            include_headers,
            include_body: true,
            sink: recorder,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    #[test]
    fn test_request_line() {
        let recorder = Arc::new(Recorder::default());
        let mut request = RequestDescriptor::new(
            Method::POST,
            url::Url::parse("https://example.com/users").unwrap(),
        );
        request
            .headers
            .insert("content-type", HeaderValue::from_static("application/json"));
        request.body = Some(Bytes::from_static(b"{\"name\":\"a\"}"));

        observer(recorder.clone(), true).did_request(&RequestEvent { request: &request });

        let lines = recorder.0.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::INFO);
        assert_eq!(
            lines[0].1,
            "POST https://example.com/users:\ncontent-type: application/json\n\n{\"name\":\"a\"}"
        );
    }

    #[test]
    fn test_inactive_observer_logs_nothing() {
        let recorder = Arc::new(Recorder::default());
        let observer = observer(recorder.clone(), false);
        observer.active.store(false, Ordering::SeqCst);

        let request =
            RequestDescriptor::new(Method::GET, url::Url::parse("https://example.com").unwrap());
        observer.did_request(&RequestEvent { request: &request });
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn test_binary_body_is_omitted() {
        let mut line = String::from("GET /");
        append_body(&mut line, &Bytes::from_static(&[0xff, 0xfe]));
        assert_eq!(line, "GET /");
    }
}
