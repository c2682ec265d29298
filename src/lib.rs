pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod dates;
pub mod error;
pub mod output;
pub mod performance;
pub mod storage;
pub mod sweep;
pub mod table;
pub mod trades;

pub use aggregate::{AggregationBatcher, FlushSummary, OutputKey, ParamSet, ParamTable};
pub use error::HarnessError;
