use axum::http::{header, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_TOTAL_COUNT: &str = "x-total-count";

const NOSNIFF: &str = "nosniff";
const NO_STORE: &str = "no-store";

/// Stamps every API response with a request id and no-cache headers.
///
/// A client-supplied `X-Request-Id` is echoed back; otherwise a fresh UUID is used.
#[derive(Clone, Default)]
pub struct ApiHeadersLayer;

impl<S> Layer<S> for ApiHeadersLayer {
    type Service = ApiHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiHeadersService { inner }
    }
}

#[derive(Clone)]
pub struct ApiHeadersService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ApiHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ApiHeadersFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(new_request_id);

        ApiHeadersFuture {
            future: self.inner.call(request),
            request_id,
        }
    }
}

fn new_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap_or(HeaderValue::from_static("-"))
}

#[pin_project::pin_project]
pub struct ApiHeadersFuture<F> {
    #[pin]
    future: F,
    request_id: HeaderValue,
}

impl<F, ResBody, E> std::future::Future for ApiHeadersFuture<F>
where
    F: std::future::Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.future.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                let headers = response.headers_mut();
                headers.insert(X_REQUEST_ID, this.request_id.clone());
                headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(NOSNIFF));
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
                Poll::Ready(Ok(response))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub fn create_api_headers_layer() -> ApiHeadersLayer {
    ApiHeadersLayer
}
