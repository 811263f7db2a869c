//! Location sharing relay.

pub mod protocol;
pub mod state;
pub mod transport;
pub mod worker;

pub use protocol::{decode_server_message, encode_location, LocationTable, LocationUpdate};
pub use state::{RelayConfig, RelayConnectionState, DEFAULT_RECONNECT_DELAY};
pub use transport::{Connector, RelaySocket, WsConnector};
pub use worker::LocationRelay;
