//! stackcmp-lib: Argo CD config management plugin for Pulumi stacks
//!
//! This crate turns an application source and the Argo CD invocation
//! environment into a manifest stream:
//! - `InvocationContext`: the app identity, parameters and extras for one sync
//! - `ManifestTemplate`: `${NAME}` templates split into YAML documents
//! - `Invocation`: the discover, init, generate state machine
//! - `Emitter`: validation and serialization of the rendered manifest

pub mod config;
pub mod consts;
pub mod context;
pub mod lifecycle;
pub mod manifest;
pub mod platform;
pub mod resolve;
pub mod scaffold;
pub mod source;
pub mod store;
pub mod template;

pub use lifecycle::{Invocation, LifecycleState, Outcome, PluginError};
