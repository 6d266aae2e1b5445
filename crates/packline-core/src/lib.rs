#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod build;
pub mod chunks;
pub mod compiler;
pub mod config;
pub mod css;
pub mod devserver;
pub mod error;
pub mod imports;
pub mod mode;
pub mod naming;
pub mod project;
pub mod resolver;
pub mod rules;
pub mod version;

pub use build::{build, BuildError, BuildReport};
pub use chunks::{ChunkPartitioner, ChunkPlan, ModuleRecord};
pub use config::Config;
pub use devserver::{DevResponse, DevServerDescriptor};
pub use error::Error;
pub use imports::{scan_imports, ImportKind, ImportSpecCore};
pub use mode::Mode;
pub use naming::{ArtifactKind, OutputNamer, RenderContext};
pub use project::{load_project_config, ProjectConfig};
pub use resolver::ResolvedConfig;
pub use rules::{RouteMatch, Rule, RuleRouter, Step};
pub use version::VERSION;
