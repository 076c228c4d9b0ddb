pub mod client;
pub mod enrich;

pub use client::{HttpSampleMetadata, SampleMetadata, SampleMetadataSource};
pub use enrich::SampleEnricher;
