//! Request and response vocabulary the dispatcher needs.
//!
//! The transport owns the real request and response types; the dispatcher
//! only needs a method for retryability, a URI for logging, an optional
//! partition key, and a status code on the way out. Blanket
//! implementations cover `http::Request` and `http::Response` so embedders
//! using those types plug in without adapters.

use http::{Method, StatusCode, Uri};

/// What the dispatcher needs to know about a request.
pub trait LbRequest: Send + Sync {
    /// The HTTP method, used for idempotency classification.
    fn method(&self) -> Method;

    /// The request URI, used for hook logging.
    fn uri(&self) -> &Uri;

    /// Optional partition hint handed to the selection rule.
    fn lb_key(&self) -> Option<&str> {
        None
    }
}

/// What the dispatcher needs to know about a response.
pub trait LbResponse: Send + Sync {
    /// The response status code.
    fn status(&self) -> StatusCode;
}

impl<T: Send + Sync> LbRequest for http::Request<T> {
    fn method(&self) -> Method {
        self.method().clone()
    }

    fn uri(&self) -> &Uri {
        self.uri()
    }
}

impl<T: Send + Sync> LbResponse for http::Response<T> {
    fn status(&self) -> StatusCode {
        self.status()
    }
}

/// Whether a method is safe to replay after bytes may have been sent.
#[must_use]
pub fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
