//! Admission control for the obfuscation route.
//!
//! Every admitted request owns a child process and a temp directory, so the
//! number in flight can be capped. Over the cap, requests are turned away
//! with 503 at once instead of queueing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, StatusCode};
use axum::response::Response;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::text_response;

/// Body sent when the cap is reached.
pub const OVERLOADED_MESSAGE: &str = "Server busy, try again later.";

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer limiting concurrent requests via a semaphore.
///
/// Permits are taken with `try_acquire`, never awaited.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Option<Arc<Semaphore>>,
}

impl LoadShedLayer {
    /// Admit at most `max_concurrent` requests at a time.
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Some(Arc::new(Semaphore::new(max_concurrent as usize))),
        }
    }

    /// Admit everything.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { semaphore: None }
    }

    /// Builds the layer from an optional limit; `None` means unbounded.
    #[must_use]
    pub fn from_limit(limit: Option<u32>) -> Self {
        limit.map_or_else(Self::unbounded, Self::new)
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Option<Arc<Semaphore>>,
}

impl<S, B> Service<Request<B>> for LoadShedService<S>
where
    S: Service<Request<B>, Response = Response> + Send,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let permit = match &self.semaphore {
            None => None,
            Some(semaphore) => {
                let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                    warn!("concurrency limit reached, shedding request");
                    return Box::pin(async {
                        Ok(text_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            OVERLOADED_MESSAGE,
                        ))
                    });
                };
                Some(permit)
            }
        };

        let fut = self.inner.call(req);
        Box::pin(async move {
            // Held until the response (and the workspace release before it) is done.
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use axum::body::Body;
    use axum::response::IntoResponse;
    use tower::ServiceExt;

    use super::*;

    /// Service that holds each request for a configurable duration.
    #[derive(Clone)]
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<Request<Body>> for SlowService {
        type Response = Response;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Body>) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(StatusCode::OK.into_response())
            })
        }
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn admits_requests_under_limit() {
        let svc = LoadShedLayer::new(2).layer(SlowService { delay_ms: 1 });
        let resp = svc.oneshot(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sheds_when_saturated() {
        let mut svc = LoadShedLayer::new(1).layer(SlowService { delay_ms: 500 });

        let _ = ServiceExt::<Request<Body>>::ready(&mut svc).await.unwrap();
        let in_flight = tokio::spawn(svc.call(request()));

        // Give the spawned call time to hold the single permit.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let resp = svc.call(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let first = in_flight.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn permit_is_returned_after_completion() {
        let mut svc = LoadShedLayer::new(1).layer(SlowService { delay_ms: 1 });

        for _ in 0..3 {
            let _ = ServiceExt::<Request<Body>>::ready(&mut svc).await.unwrap();
            let resp = svc.call(request()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn unbounded_never_sheds() {
        let svc = LoadShedLayer::from_limit(None).layer(SlowService { delay_ms: 20 });
        let calls = (0..16).map(|_| svc.clone().oneshot(request()));
        for resp in run_concurrently(calls).await {
            assert_eq!(resp.unwrap().status(), StatusCode::OK);
        }
    }

    async fn run_concurrently<F, T>(futures: impl Iterator<Item = F>) -> Vec<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.map(tokio::spawn).collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    }
}
