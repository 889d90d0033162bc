// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The interface between the host and application handlers.
//!
//! A handler is anything implementing [`Application`]: it receives the request
//! [`Environ`] and a [`StartResponse`] callback and returns a response
//! [`Body`]. Plain closures with the right signature are handlers too.

mod body;
mod start_response;

pub use body::{Body, FileWrapper, FileWrapperFactory, ResponseIter, WrappedFile};
pub use start_response::{SetResponse, StartResponse, Status};
pub(crate) use start_response::ResponseState;

use crate::environ::Environ;
use crate::errors::AppError;
use std::sync::Arc;

/// An invocable request handler.
pub trait Application: Send + Sync {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut StartResponse<'_>,
    ) -> Result<Body, AppError>;
}

impl<F> Application for F
where
    F: Fn(&mut Environ, &mut StartResponse<'_>) -> Result<Body, AppError> + Send + Sync,
{
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut StartResponse<'_>,
    ) -> Result<Body, AppError> {
        self(environ, start_response)
    }
}

/// Box a closure as a shareable handler.
///
/// # Example
/// ```
/// use tenant_host::handler::{handler_fn, Body};
///
/// let app = handler_fn(|_environ, start_response| {
///     start_response.set_response("200 OK", vec![], None)?;
///     Ok(Body::once("hello"))
/// });
/// # let _ = app;
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Application>
where
    F: Fn(&mut Environ, &mut StartResponse<'_>) -> Result<Body, AppError> + Send + Sync + 'static,
{
    Arc::new(f)
}
