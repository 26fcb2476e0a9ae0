pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{IN_FLIGHT_METRIC, SystemContext, TransportProtocol};
pub use packet::{Packet, checksum};

pub use config::{ProtocolConfig, SimConfig};
pub use error::SendError;
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
