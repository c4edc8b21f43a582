//! HTTP access to the ESIOS API: the [`Transport`] seam, a `reqwest`-backed
//! implementation of it, and parsing of the indicator value response shapes.

mod reqwest_transport;
mod response;
mod transport;

pub use reqwest_transport::{ReqwestTransport, RetryConfig};
pub use response::{parse_values, ApiValues, GeoValue, PlainValue};
pub use transport::Transport;
