pub mod alignment;
pub mod config;
pub mod error;
pub mod grouping;
pub mod impact;
pub mod monthly;
pub mod observations;
pub mod outputs;
pub mod periods;
pub mod pipeline;
pub mod rolling;
pub mod seasonal;
pub mod stations;

pub use config::{CliOverrides, FileConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{run, RunSummary};
