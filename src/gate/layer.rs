//! Tower middleware that routes every request through a [`RequestGate`].

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::{Body, Frame, SizeHint};
use tower::{Layer, Service};

use crate::gate::operation::OperationMeta;
use crate::gate::tracker::{BusyGuard, RequestGate};

/// Layer applying [`BusyService`] to an inner service.
#[derive(Debug, Clone)]
pub struct BusyLayer {
    gate: RequestGate,
}

impl BusyLayer {
    pub fn new(gate: RequestGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for BusyLayer {
    type Service = BusyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BusyService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Counts each request as an operation until its response body has been
/// read to the end or dropped. Marker headers are consumed here and not
/// forwarded.
#[derive(Debug, Clone)]
pub struct BusyService<S> {
    inner: S,
    gate: RequestGate,
}

impl<S> BusyService<S> {
    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }
}

impl<S, B, ResBody> Service<Request<B>> for BusyService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Body + 'static,
{
    type Response = Response<GuardedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let op = OperationMeta::from_request(&request);
        let guard = self.gate.enter(&op);
        self.gate.strip_markers(request.headers_mut());

        let future = self.inner.call(request);
        Box::pin(async move {
            let response = future.await?;
            Ok(response.map(|body| GuardedBody::new(body, guard)))
        })
    }
}

/// Response body that holds its request's busy count until the last frame.
#[derive(Debug)]
pub struct GuardedBody<B> {
    inner: B,
    guard: Option<BusyGuard>,
}

impl<B: Body> GuardedBody<B> {
    fn new(inner: B, guard: Option<BusyGuard>) -> Self {
        let guard = guard.filter(|_| !inner.is_end_stream());
        Self { inner, guard }
    }

    /// Whether this body still counts toward busy state.
    pub fn is_counted(&self) -> bool {
        self.guard.is_some()
    }
}

impl<B> Body for GuardedBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        let finished = match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => true,
            Poll::Ready(Some(Ok(_))) => this.inner.is_end_stream(),
            Poll::Pending => false,
        };
        if finished {
            this.guard.take();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
