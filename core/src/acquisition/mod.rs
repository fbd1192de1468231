pub mod ingest;
pub mod sample;

pub use ingest::Ingestor;
pub use sample::{AccelScale, Sample, STANDARD_GRAVITY};
