//! Havener Core - configuration model and shell-operator templating
//!
//! This crate provides the building blocks shared by the deploy and purge
//! workflows:
//! - `Config`: the declarative multi-release configuration
//! - `ConfigNode`: a shape-preserving tree for arbitrary override sections
//! - `ShellEvaluator`: evaluation of `((shell <command>))` operators
//! - `Templater`: recursive templating of a whole `ConfigNode` tree

pub mod config;
pub mod error;
pub mod node;
pub mod shell;
pub mod template;

pub use config::{Config, ReleaseSpec, Task};
pub use error::{CoreError, Result, ShellError};
pub use node::{ConfigNode, Scalar};
pub use shell::{CommandRunner, ShellEvaluator, ShellRunner};
pub use template::Templater;
