mod tracing_layer;
mod metrics_recorder;

pub use tracing_layer::*;
pub use metrics_recorder::*;
