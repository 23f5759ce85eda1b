//! Agora Network Library
//!
//! Keeps a local projection of one debate session in sync with the
//! authoritative server.
//!
//! # Architecture
//!
//! - **Snapshot**: One-shot HTTP fetch of status, roster, tally and arguments
//! - **Connector**: STOMP session over a WebSocket, one subscription per topic
//! - **Router**: Applies each inbound message to the session state
//! - **Dispatcher**: Validates local intents and sends them to the authority
//! - **Room**: Event loop tying the above together, one per attached room
//!
//! # Usage
//!
//! ```ignore
//! let loader = Arc::new(HttpSnapshotLoader::new("http://localhost:8080"));
//! let dialer = Arc::new(WsDialer::new("ws://localhost:8080/ws/websocket"));
//! let mut room = Room::new("ab12", LocalIdentity::guest(), loader, dialer).enter();
//!
//! while let Some(event) = room.next_event().await {
//!     match event {
//!         RoomEvent::Joined(me) => { room.act(Action::SendChat("hi".into())).await; }
//!         RoomEvent::Left => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod room;
pub mod router;
pub mod snapshot;
pub mod transport;

pub use connector::{ConnectionState, Inbound, SessionConnector, SubscriptionHandle};
pub use dispatcher::{dispatch, prepare, Action, Dispatch, Outbound, SkipReason};
pub use error::{Error, Result, SnapshotError};
pub use protocol::{Destination, Topic};
pub use room::{FailureHook, Room, RoomConfig, RoomEvent, RoomHandle};
pub use router::{route, Applied};
pub use snapshot::{HttpSnapshotLoader, Snapshot, SnapshotSource};
pub use transport::{memory_pair, Dialer, MemoryDialer, MemoryPeer, Transport, WsDialer};

/// Default HTTP origin of the debate server
pub const DEFAULT_HTTP_BASE: &str = "http://localhost:8080";

/// Default raw WebSocket endpoint of the debate server
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws/websocket";
