//! Smuggler Core Library
//!
//! Pure building blocks of a smuggler action: the request model, the
//! command registry, parameter layer merging, the command environment and
//! response decoding. Process execution lives in `smuggler-runner`.

pub mod config;
pub mod decoder;
pub mod domain;
pub mod environment;
pub mod params;
pub mod telemetry;

pub use config::LocalConfig;
pub use decoder::{decode_response, METADATA_FILE, VERSIONS_FILE, VERSION_FILE};
pub use domain::{
    Action, CommandDefinition, CommandTable, InOutResponse, MetadataPair, ResourceRequest,
    ResourceResponse, Result, SmugglerError, Version,
};
pub use environment::{
    build_environment, env_name, ActionContext, CommandEnvironment, PreparedExecution, ENV_PREFIX,
};
pub use params::{merge_layers, render_env_value, ParamLayer, ParamLayers};
pub use telemetry::{init_tracing, LogSink};
