use anyhow::Result;
use rdt_lab_abstract::{ProtocolConfig, TransportProtocol};

use crate::go_back_n::{GoBackNReceiver, GoBackNSender};
use crate::stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};

/// Built-in Rust implementations selectable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinProtocol {
    StopAndWait,
    GoBackN,
}

impl BuiltinProtocol {
    pub fn sender(self, config: &ProtocolConfig) -> Box<dyn TransportProtocol> {
        match self {
            BuiltinProtocol::StopAndWait => Box::new(StopAndWaitSender::new(config.timeout)),
            BuiltinProtocol::GoBackN => {
                Box::new(GoBackNSender::new(config.timeout, config.window_size))
            }
        }
    }

    pub fn receiver(self) -> Box<dyn TransportProtocol> {
        match self {
            BuiltinProtocol::StopAndWait => Box::new(StopAndWaitReceiver::new()),
            BuiltinProtocol::GoBackN => Box::new(GoBackNReceiver::new()),
        }
    }

    pub fn pair(
        self,
        config: &ProtocolConfig,
    ) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>) {
        (self.sender(config), self.receiver())
    }
}

/// Map a user-visible protocol name to a built-in implementation.
pub fn builtin_by_name(name: &str) -> Result<BuiltinProtocol> {
    match name.to_ascii_lowercase().as_str() {
        "saw" | "stop-and-wait" => Ok(BuiltinProtocol::StopAndWait),
        "gbn" | "go-back-n" => Ok(BuiltinProtocol::GoBackN),
        other => anyhow::bail!("Unknown protocol '{other}'. Try 'saw' or 'gbn'."),
    }
}
