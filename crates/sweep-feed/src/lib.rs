pub mod client;
pub mod error;
pub mod normalizer;
pub mod reshape;
pub mod selector;
pub mod static_data;
pub mod transport;

pub mod test_support;

pub use client::{BackendClient, BulkFetch, FetchSuccess, SymbolFailure};
pub use error::FeedError;
pub use normalizer::{normalize, NormalizedData};
pub use reshape::BackendPayload;
pub use selector::{BackendSelector, BackendTarget, HealthCheck, HttpHealthCheck};
pub use static_data::StaticDataClient;
pub use transport::{JsonTransport, ReqwestTransport};
