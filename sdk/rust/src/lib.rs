//! Rust reference implementations of the RDT Lab ARQ protocols.
//! Provides Stop-and-Wait and Go-Back-N sender/receiver pairs plus a
//! name-based registry used by the CLI and scenario runner.

pub mod builtin;
pub mod go_back_n;
pub mod stop_and_wait;

#[cfg(test)]
pub(crate) mod testing;

pub use builtin::{BuiltinProtocol, builtin_by_name};
pub use go_back_n::{GoBackNReceiver, GoBackNSender};
pub use rdt_lab_abstract::{Packet, ProtocolConfig, SendError, SystemContext, TransportProtocol};
pub use stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};
