//! U2NET background removal: decode, predict a saliency mask, write it into
//! the alpha channel, export at the requested size and format.

pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod load;
pub mod pipeline;
pub mod runtime;
pub mod telemetry;
pub mod u2net;

pub use config::{Device, ModelConfig};
pub use error::{RemovalError, Result};
pub use export::{ExportFormat, ExportRequest, Exported, Resolution};
pub use pipeline::{BackgroundRemover, CompositeResult};
pub use u2net::Segmenter;
