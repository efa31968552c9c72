//! Backend-proxied device authorization: value types and the polling seam.

pub mod backend;
pub mod device_code;
pub mod error;
pub mod http;
pub mod token;

pub use backend::{AuthBackend, StartResponse};
pub use device_code::{DeviceCode, DeviceCodeResponse};
pub use error::FlowError;
pub use http::HttpBackend;
pub use token::{Token, TokenResponse};
