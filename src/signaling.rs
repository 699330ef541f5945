//! WebSocket rendezvous relay for P2P connection setup

mod actor;
mod directory;
mod messages;
mod registry;
mod router;
mod server;
mod types;

pub use actor::RouterHandle;
pub use messages::{ClientMessage, ServerMessage};
pub use router::{Router, RouterStats};
pub use server::SignalingServer;
pub use types::{ClientId, OutboundMessage, RoomName, SignalingError};
