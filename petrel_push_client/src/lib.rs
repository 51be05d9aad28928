//! HTTP implementation of the Petrel bulk transport.

mod http;

pub use http::HttpBulkTransport;
