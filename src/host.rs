//! Host-facing surface (C10): the collaborators spec.md §1/§6 declares out
//! of scope (transport, platform I/O, PRNG, math primitives, the Proto
//! compiler) as narrow traits and a small config type, grounded on
//! `original_source/vm/src/platforms/example/main.cpp`'s install-then-loop
//! shape and on the teacher's hand-rolled `main.rs` CLI parsing style.

use serde::Deserialize;

use crate::error::VmResult;
use crate::neighborhood::NodeId;

/// The capabilities a host must supply that the engine treats as opaque
/// (spec.md §1's "external collaborators"). The default `unknown_opcode`
/// no-ops, matching spec.md §4.2 ("Unknown opcodes invoke a platform hook
/// that defaults to a no-op").
pub trait Platform {
    /// A uniform random value in `[0, 1)`, backing the `RND` opcode. The
    /// algorithm is explicitly out of scope (spec.md §1); hosts plug in
    /// whatever PRNG fits their platform.
    fn random(&mut self) -> f32;

    /// Invoked when `step()` decodes a byte in the reserved platform I/O
    /// range (LEDs, buttons, ...) with no matching [`Opcode`](crate::opcodes::Opcode).
    /// A byte outside that range instead fails with
    /// [`VmError::InvalidOpcode`](crate::error::VmError::InvalidOpcode).
    fn unknown_opcode(&mut self, _opcode_byte: u8) -> VmResult<()> {
        Ok(())
    }
}

/// A deterministic placeholder `Platform` for tests and the example host
/// binary. Not suitable for production — a real host supplies real entropy
/// and real platform I/O.
pub struct NullPlatform {
    state: u64,
}

impl NullPlatform {
    pub fn new(seed: u64) -> Self {
        NullPlatform { state: seed | 1 }
    }
}

impl Default for NullPlatform {
    fn default() -> Self {
        NullPlatform::new(0x9E3779B97F4A7C15)
    }
}

impl Platform for NullPlatform {
    fn random(&mut self) -> f32 {
        // xorshift64*, good enough for deterministic test fixtures.
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        ((x >> 40) as f32) / (1u64 << 24) as f32
    }
}

/// Node/install-time configuration, loaded from a small TOML manifest the
/// way the rest of the ecosystem loads its manifests (serde + toml).
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub node_id: NodeId,
    /// Default max call depth used before the script's own `DEF_VM_EX`
    /// prologue overrides it.
    #[serde(default = "HostConfig::default_max_call_depth")]
    pub initial_max_call_depth: usize,
}

impl HostConfig {
    fn default_max_call_depth() -> usize {
        256
    }

    pub fn from_toml(text: &str) -> Result<HostConfig, toml::de::Error> {
        toml::from_str(text)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig { node_id: 1, initial_max_call_depth: HostConfig::default_max_call_depth() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let cfg = HostConfig::from_toml("node_id = 42\n").unwrap();
        assert_eq!(cfg.node_id, 42);
        assert_eq!(cfg.initial_max_call_depth, 256);
    }
}
