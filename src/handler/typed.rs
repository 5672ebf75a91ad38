//! Typed-body adapters.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::envelope::{ApiError, Request, RequestOf, Response};
use crate::handler::{Context, Handler};

/// Input validation returning every problem found.
pub trait Validate {
    fn ok(&self) -> Vec<ApiError>;
}

/// Decode the body into `T`, or produce the single bad-request response.
pub(crate) async fn decode_request<T: DeserializeOwned>(req: Request) -> Result<RequestOf<T>, Response> {
    let (req, body) = req.split_body(());
    let decoded = match body.into_bytes().await {
        Ok(bytes) => serde_json::from_slice::<T>(&bytes).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match decoded {
        Ok(v) => Ok(req.with_body(v)),
        Err(e) => Err(Response::from_errors([ApiError::bad_request(format!(
            "failed to unmarshal payload: {e}"
        ))])),
    }
}

/// Handler decoding the body into `T` before calling `F`.
pub struct Typed<T, F> {
    inner: F,
    _body: PhantomData<fn() -> T>,
}

pub fn typed<T, F, Fut>(f: F) -> Typed<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Context, RequestOf<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    Typed {
        inner: f,
        _body: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> Handler for Typed<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Context, RequestOf<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        match decode_request::<T>(req).await {
            Ok(req) => (self.inner)(ctx, req).await,
            Err(resp) => resp,
        }
    }
}

/// Handler decoding and validating the body before calling `F`.
pub struct Validated<T, F> {
    inner: F,
    _body: PhantomData<fn() -> T>,
}

pub fn validated<T, F, Fut>(f: F) -> Validated<T, F>
where
    T: DeserializeOwned + Validate + Send + 'static,
    F: Fn(Context, RequestOf<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    Validated {
        inner: f,
        _body: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> Handler for Validated<T, F>
where
    T: DeserializeOwned + Validate + Send + 'static,
    F: Fn(Context, RequestOf<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        let req = match decode_request::<T>(req).await {
            Ok(req) => req,
            Err(resp) => return resp,
        };
        let errs = req.body.ok();
        if !errs.is_empty() {
            return Response::from_errors(errs);
        }
        (self.inner)(ctx, req).await
    }
}
