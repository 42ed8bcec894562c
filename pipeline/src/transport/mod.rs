//! # Transport
//!
//! The narrow seam between a [`Reporter`](crate::Reporter) and the network.
//!
//! - **`Transport`**: one round trip of a fully buffered [`Request`]
//! - **`http`**: the `reqwest` backed implementation
//! - **`retry`**: a decorator that replays a request on transient failures
//!
//! A [`Request`] owns its body as [`Bytes`], so replaying it is a cheap clone of
//! the same buffer. A [`Reply`] owns the whole response body, which means the
//! underlying connection has been drained by the time a caller sees it.

use bytes::Bytes;
use reqwest::{
    header::{
        HeaderMap,
        HeaderName,
        HeaderValue,
    },
    Method,
    StatusCode,
};
use std::{
    future::Future,
    pin::Pin,
};
use url::Url;

pub mod http;
pub mod retry;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Network level failures are worth another attempt, a request that could
    /// not even be built is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Http(err) => !err.is_builder(),
            TransportError::Io(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn post(url: Url) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }
}

/// Performs a single HTTP round trip.
pub trait Transport: Send + Sync {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>> {
        (**self).round_trip(request)
    }
}
