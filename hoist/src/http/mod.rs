//! The HTTP seam: everything network-facing goes through [`HttpClient`], so
//! tests can drive the whole crate against an in-process implementation.

mod error;
pub mod tokio;

use std::{future::Future, pin::Pin};

use bytes::Bytes;
pub use error::HttpError;
use http::{Request, Response};
use http_body::Body;
use http_body_util::BodyExt;

use crate::error::BoxedError;

pub use self::tokio::TokioClient;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, HttpError>;

pub trait HttpClient: Send + Sync {
    type RespBody: Body<Data: Into<Bytes>, Error: Into<BoxedError>> + Send + Sync + 'static;

    fn send_request<B>(
        &self,
        request: Request<B>,
    ) -> impl Future<Output = Result<Response<Self::RespBody>, HttpError>> + Send
    where
        B: Body + Send + Sync + 'static,
        B::Data: Into<Bytes> + Send,
        B::Error: Into<BoxedError>;
}

/// Object-safe form of [`HttpClient`], implemented for every client.
pub trait DynHttpClient: Send + Sync {
    fn dyn_send_request(
        &self,
        request: Request<BoxBody>,
    ) -> Pin<Box<dyn Future<Output = Result<Response<BoxBody>, HttpError>> + Send + '_>>;
}

impl<C> DynHttpClient for C
where
    C: HttpClient,
{
    fn dyn_send_request(
        &self,
        request: Request<BoxBody>,
    ) -> Pin<Box<dyn Future<Output = Result<Response<BoxBody>, HttpError>> + Send + '_>> {
        Box::pin(async move {
            let response = self.send_request(request).await?;
            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(
                parts,
                BoxBody::new(
                    body.map_frame(|f| f.map_data(|data| data.into()))
                        .map_err(|e| HttpError::from(e.into() as BoxedError)),
                ),
            ))
        })
    }
}

/// Erases a concrete request body so it can cross the [`DynHttpClient`] seam.
pub(crate) fn boxed<B>(request: Request<B>) -> Request<BoxBody>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxedError>,
{
    request.map(|body| BoxBody::new(body.map_err(|e| HttpError::from(e.into() as BoxedError))))
}
