pub mod analysis;
pub mod cache_schema;
pub mod config;
pub mod dataset;
pub mod envelope;
pub mod lenient;
pub mod ordered_map;

pub use analysis::{AnalysisRequest, AnalysisResult, ChatRole, ChatTurn};
pub use cache_schema::{CacheEntry, CacheNamespace};
pub use config::{
    AgentsConfig, BackendKind, CacheConfig, FeedConfig, ProviderConfig, ProviderKind,
    RuntimeMode, StoreKind, SweepConfig,
};
pub use dataset::{DatasetKind, MarketDataset};
pub use envelope::{
    CanonicalResponse, EnvelopeError, ExpiryRecord, LegacyEntry, OptionRecord, OptionSide,
    PayloadSource, StructuredData, SymbolRecord,
};
pub use ordered_map::OrderedMap;
