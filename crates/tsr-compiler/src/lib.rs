/// tsr compiler
///
/// Rewrites TypeScript sources through an ordered pipeline of rules that
/// insert runtime type checks, and reports the run's lifecycle to a
/// separate status process.

pub mod bus;
pub mod config;
pub mod diagnostic;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod protocol;
pub mod rule;
pub mod rules;
pub mod session;
pub mod types;

pub use bus::{Event, EventBus, EventKind};
pub use config::{CompilationConfig, CompilerOptions, ConfigError, TransformOptions};
pub use diagnostic::{Category, Diagnostic};
pub use driver::{transform_source, CompilationResult, Compiler, FileResult};
pub use error::{CompileError, Result, SupervisorError};
pub use pipeline::Pipeline;
pub use process::{Shutdown, ShutdownState, SupervisorProcess};
pub use protocol::{bridge, envelope_channel, Ack, Envelope, EnvelopeReceiver, EnvelopeSender};
pub use rule::{RuleError, StageContext, TransformRule};
pub use rules::{default_pipeline, RuleOptions};
pub use session::Session;
