//! DelftProto: a bytecode virtual machine for amorphous/spatial sensor
//! network computing.
//!
//! A [`machine::Machine`] interprets an installed [`script::Script`]
//! against four stacks, a globals table, a per-thread feedback-cell state
//! table, and a neighborhood of nearby nodes. The host drives it with
//! [`machine::Machine::install`] followed by repeated
//! [`machine::Machine::run`]/[`machine::Machine::step`] calls; everything
//! outside that loop — transport, platform I/O, the Proto compiler that
//! emits scripts — is the host's concern, represented here only by the
//! narrow [`host::Platform`] trait.

#[cfg(feature = "mit-compatible")]
compile_error!(
    "the `mit-compatible` feature is reserved for a future fixed-width-operand \
     cursor alongside the extended (VLQ) dialect; it carries no implementation yet"
);

pub mod error;
pub mod host;
pub mod machine;
pub mod neighborhood;
pub mod opcodes;
pub mod script;
pub mod stacks;
pub mod state;
pub mod thread_table;
pub mod value;

pub use error::{VmError, VmResult};
pub use host::{HostConfig, Platform};
pub use machine::Machine;
pub use neighborhood::NodeId;
pub use script::Script;
pub use value::Value;
