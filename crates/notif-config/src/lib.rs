pub mod engine;
pub mod logging;
pub mod tracing_init;

pub use engine::{AiConfig, EngineConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use tracing_init::init_tracing;
