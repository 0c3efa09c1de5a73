//! HTTP client module with retry logic and error classification.

mod client;
mod error;
mod payload;
mod retry;
mod transport;

pub use client::{RequestClient, RequestOptions};
pub use error::{
    ApiError, CODE_CONFLICT, CODE_DECODE, CODE_FORBIDDEN, CODE_NETWORK, CODE_NOT_FOUND,
    CODE_RATE_LIMITED, CODE_SERVER, CODE_UNAUTHORIZED, CODE_UNKNOWN, CODE_VALIDATION, ErrorKind,
    classify,
};
pub use payload::Payload;
pub use retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, RETRYABLE_STATUSES,
    RetryConfig,
};
pub use transport::{HttpRequest, RawResponse, ReqwestTransport, Transport};
