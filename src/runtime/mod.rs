//! The tree-walking evaluator: runtime values, channels, scopes,
//! built-ins, pluggable input/output, and the interpreter itself.

pub mod builtins;
pub mod channel;
pub mod input;
pub mod interpreter;
pub mod network;
pub mod scope;
pub mod value;

pub use channel::{Channel, ChannelHandle};
pub use input::{
    BufferSink, DirectInputProvider, InputProvider, OutputSink, RunRecord, RunRegistry,
    StdoutSink,
};
pub use interpreter::{ChannelConfig, ChannelRole, ExecResult, Interp, RunConfig};
pub use network::{NetworkChannel, Role};
pub use scope::{CallFrames, Globals};
pub use value::{ObjectInstance, Value};
