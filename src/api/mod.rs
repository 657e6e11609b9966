pub mod ebay;
pub mod transport;
pub mod types;

pub use ebay::Endpoints;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::*;

#[cfg(test)]
pub use transport::MockHttpTransport;
