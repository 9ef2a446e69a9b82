pub mod http;
pub mod stub;

pub use http::HttpPredictor;
pub use stub::StubPredictor;
