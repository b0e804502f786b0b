pub mod config;
pub mod logging;
pub mod script;

pub use config::{LoggingConfig, NodeConfig, NodeSettings};
pub use script::{account, NodeSeed, Script, ScriptReport, ScriptStep, StepReport};
