// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::environ::Environ;
use crate::errors::{AppError, HostError};
use crate::handler::{Application, Body, ResponseIter, ResponseState, StartResponse};
use crate::observability::messages::request::CloseHookFailed;
use crate::observability::messages::StructuredLog;
use crate::transport::{FileDescriptor, Transport};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Protocol state of one request.
///
/// `Errored` may be entered from any state; every other transition moves
/// strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    HeadersPending,
    HeadersSent,
    BodyStreaming,
    Closing,
    Done,
    Errored,
}

/// What the host keeps in the transport's data slot while a request is in
/// flight.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub request_id: u64,
    pub tenant: String,
    pub module_id: String,
    pub entry_point: String,
    pub started: Instant,
}

#[derive(Debug, Error)]
pub(crate) enum RequestError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    App(#[from] AppError),
}

/// A request that did not complete.
#[derive(Debug)]
pub(crate) struct Failure {
    pub(crate) stage: &'static str,
    pub(crate) headers_sent: bool,
    pub(crate) error: RequestError,
}

impl Failure {
    /// A failure before any response bytes went out.
    pub(crate) fn early(stage: &'static str, error: impl Into<RequestError>) -> Self {
        Self {
            stage,
            headers_sent: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Completed {
    pub(crate) status: u16,
    pub(crate) body_bytes: u64,
}

/// One request between handler resolution and release.
///
/// Owns its environ, response bookkeeping and, once the handler returned, the
/// body. The body's `close` runs exactly once, whatever the outcome.
pub(crate) struct Request {
    id: u64,
    transport: Arc<dyn Transport>,
    environ: Environ,
    response: ResponseState,
    state: RequestState,
}

impl Request {
    pub(crate) fn new(id: u64, transport: Arc<dyn Transport>, environ: Environ) -> Self {
        Self {
            id,
            transport,
            environ,
            response: ResponseState::default(),
            state: RequestState::Created,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        self.state
    }

    /// Invoke `handler` and stream its response.
    pub(crate) fn run(&mut self, handler: &dyn Application) -> Result<Completed, Failure> {
        self.state = RequestState::HeadersPending;

        let invoked = {
            let mut start_response = StartResponse::new(&mut self.response, self.transport.as_ref());
            let environ = &mut self.environ;
            catch_unwind(AssertUnwindSafe(|| handler.call(environ, &mut start_response)))
        };
        self.note_headers();

        let mut body = match invoked {
            Ok(Ok(body)) => body,
            Ok(Err(error)) => return Err(self.fail("handler", error)),
            Err(panic) => return Err(self.fail("handler", AppError::from_panic(panic))),
        };

        // A Reraise handed out during the call fails the request even when the
        // handler swallowed it.
        if let Some(error) = self.response.pending_reraise.take() {
            self.state = RequestState::Closing;
            self.close(&mut body);
            return Err(self.fail("handler", error));
        }

        let streamed = catch_unwind(AssertUnwindSafe(|| self.stream(&mut body)))
            .unwrap_or_else(|panic| Err(AppError::from_panic(panic)));

        self.state = RequestState::Closing;
        self.close(&mut body);

        match streamed {
            Ok(()) => {
                self.state = RequestState::Done;
                Ok(Completed {
                    status: self.response.status,
                    body_bytes: self.response.body_bytes,
                })
            }
            Err(error) => Err(self.fail("streaming", error)),
        }
    }

    fn stream(&mut self, body: &mut Body) -> Result<(), AppError> {
        match body {
            Body::File(wrapper) => match wrapper.descriptor() {
                Some(file) => self.send_file(file),
                None => self.stream_chunks(wrapper),
            },
            Body::Iter(iter) => self.stream_chunks(iter.as_mut()),
        }
    }

    fn send_file(&mut self, file: FileDescriptor) -> Result<(), AppError> {
        let len = file.len;
        self.response
            .send_headers(self.transport.as_ref(), Some(len))?;
        self.state = RequestState::BodyStreaming;
        self.transport.send_file(file)?;
        self.response.body_bytes += len;
        Ok(())
    }

    fn stream_chunks(&mut self, iter: &mut dyn ResponseIter) -> Result<(), AppError> {
        // Length is known only for a body of at most one chunk.
        let single_chunk = iter.remaining_chunks().is_some_and(|n| n <= 1);

        while let Some(chunk) = iter.next_chunk() {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            let content_length =
                (single_chunk && !self.response.headers_sent).then_some(chunk.len() as u64);
            self.response
                .write_chunk(self.transport.as_ref(), &chunk, content_length)?;
            self.state = RequestState::BodyStreaming;
        }

        if !self.response.headers_sent {
            self.response
                .send_headers(self.transport.as_ref(), single_chunk.then_some(0))?;
            self.state = RequestState::HeadersSent;
        }
        Ok(())
    }

    fn close(&mut self, body: &mut Body) {
        let closed = catch_unwind(AssertUnwindSafe(|| match body {
            Body::Iter(iter) => iter.close(),
            Body::File(wrapper) => wrapper.close(),
        }))
        .unwrap_or_else(|panic| Err(AppError::from_panic(panic)));

        if let Err(error) = closed {
            CloseHookFailed {
                request_id: self.id,
                error: &error,
            }
            .log();
        }
    }

    fn note_headers(&mut self) {
        if self.response.headers_sent {
            self.state = RequestState::HeadersSent;
        }
    }

    fn fail(&mut self, stage: &'static str, error: AppError) -> Failure {
        self.state = RequestState::Errored;
        Failure {
            stage,
            headers_sent: self.response.headers_sent,
            error: RequestError::App(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::{build, BuildOptions};
    use crate::handler::{handler_fn, SetResponse};
    use crate::transport::MemoryTransport;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn request(memory: &Arc<MemoryTransport>) -> Request {
        let transport: Arc<dyn Transport> = memory.clone();
        let environ = build(transport.clone(), &BuildOptions::default()).unwrap();
        Request::new(1, transport, environ)
    }

    fn text_plain() -> Vec<(String, String)> {
        vec![("Content-Type".to_string(), "text/plain".to_string())]
    }

    #[test]
    fn test_single_chunk_gets_content_length() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, start_response| {
            start_response.set_response(200, text_plain(), None)?;
            Ok(Body::once("ok"))
        });

        let completed = request.run(app.as_ref()).unwrap();

        assert_eq!(completed, Completed { status: 200, body_bytes: 2 });
        assert_eq!(request.state(), RequestState::Done);
        let headers = memory.header_writes();
        assert_eq!(headers.len(), 1);
        assert!(headers[0]
            .1
            .contains(&("Content-Length".to_string(), "2".to_string())));
        assert_eq!(memory.body_writes(), vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_declared_content_length_is_kept() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, start_response| {
            start_response.set_response(
                200,
                vec![("content-length".to_string(), "2".to_string())],
                None,
            )?;
            Ok(Body::once("ok"))
        });

        request.run(app.as_ref()).unwrap();
        assert_eq!(memory.header_writes()[0].1.len(), 1);
    }

    #[test]
    fn test_multi_chunk_and_lazy_bodies_have_no_content_length() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, start_response| {
            start_response.set_response(200, text_plain(), None)?;
            Ok(Body::from_chunks(["a", "", "b"]))
        });

        request.run(app.as_ref()).unwrap();
        assert_eq!(memory.header_writes()[0].1, text_plain());
        assert_eq!(memory.body_writes(), vec![b"a".to_vec(), b"b".to_vec()]);

        let memory = Arc::new(MemoryTransport::new());
        let mut request = self::request(&memory);
        let app = handler_fn(|_environ, start_response| {
            start_response.set_response(200, text_plain(), None)?;
            Ok(Body::from_iter(vec![Ok(b"x".to_vec())].into_iter()))
        });
        request.run(app.as_ref()).unwrap();
        assert_eq!(memory.header_writes()[0].1, text_plain());
    }

    #[test]
    fn test_empty_body_flushes_headers_at_end() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, start_response| {
            start_response.set_response("204 No Content", vec![], None)?;
            Ok(Body::empty())
        });

        request.run(app.as_ref()).unwrap();
        assert_eq!(
            memory.header_writes(),
            vec![(204, vec![("Content-Length".to_string(), "0".to_string())])]
        );
        assert!(memory.body_writes().is_empty());
    }

    #[test]
    fn test_write_callable_sends_headers_once() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, start_response| {
            assert!(start_response.write(b"early").is_err());
            start_response.set_response(200, text_plain(), None)?;
            start_response.write(b"")?;
            assert!(!start_response.headers_sent());
            start_response.write(b"first")?;
            assert!(start_response.headers_sent());
            Ok(Body::once("second"))
        });

        request.run(app.as_ref()).unwrap();
        assert_eq!(memory.header_writes().len(), 1);
        assert_eq!(memory.header_writes()[0].1, text_plain());
        assert_eq!(memory.body(), b"firstsecond");
    }

    #[test]
    fn test_reraise_after_headers_fails_request() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let closed = Arc::new(AtomicBool::new(false));
        let closed_in_body = closed.clone();
        let app = handler_fn(move |_environ, start_response| {
            start_response.set_response(200, text_plain(), None)?;
            start_response.write(b"partial")?;
            let outcome =
                start_response.set_response(500, vec![], Some(AppError::raised("db gone")))?;
            assert_eq!(outcome, SetResponse::Reraise(AppError::raised("db gone")));
            let closed = closed_in_body.clone();
            Ok(Body::once("ignored").with_close(move || {
                closed.store(true, Ordering::SeqCst);
                Ok(())
            }))
        });

        let failure = request.run(app.as_ref()).err().unwrap();

        assert_eq!(failure.stage, "handler");
        assert!(failure.headers_sent);
        assert!(matches!(
            failure.error,
            RequestError::App(AppError::Raised(ref m)) if m == "db gone"
        ));
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(request.state(), RequestState::Errored);
        assert_eq!(memory.body(), b"partial");
    }

    #[test]
    fn test_close_runs_when_streaming_fails() {
        let memory = Arc::new(MemoryTransport::new().fail_writes_after(2));
        let mut request = request(&memory);
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let app = handler_fn(move |_environ, start_response| {
            start_response.set_response(200, text_plain(), None)?;
            let counter = counter.clone();
            Ok(Body::from_chunks(["one", "two", "three"]).with_close(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AppError::raised("close failed too"))
            }))
        });

        let failure = request.run(app.as_ref()).err().unwrap();

        assert_eq!(failure.stage, "streaming");
        assert!(matches!(failure.error, RequestError::App(AppError::Transport(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, _start_response| panic!("boom"));

        let failure = request.run(app.as_ref()).err().unwrap();

        assert!(!failure.headers_sent);
        assert!(matches!(
            failure.error,
            RequestError::App(AppError::Panicked(ref m)) if m == "boom"
        ));
        assert!(memory.events().is_empty());
    }

    #[test]
    fn test_body_without_set_response_is_protocol_error() {
        let memory = Arc::new(MemoryTransport::new());
        let mut request = request(&memory);
        let app = handler_fn(|_environ, _start_response| Ok(Body::once("orphan")));

        let failure = request.run(app.as_ref()).err().unwrap();
        assert!(matches!(failure.error, RequestError::App(AppError::Protocol(_))));
        assert!(!failure.headers_sent);
    }
}
