pub mod request;
pub mod transport;
pub mod uploader;

pub use request::{StationCredentials, TelemetryRequest};
pub use uploader::{Endpoints, Uploader};
