// Service exports
pub mod api;
pub mod cache;
pub mod game_socket;
pub mod realtime;
pub mod session;
pub mod stomp;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use cache::{CatalogCache, CatalogKey};
pub use game_socket::{GameClientMessage, GameServerMessage, GameSocket, GameSocketEvent};
pub use realtime::{Connector, RealtimeClient, RealtimeError, RealtimeEvent, Transport, WsConnector};
pub use session::{Session, SessionEvent};
pub use stomp::{Frame, StompError};
pub use storage::{LocalStorage, StorageError, StorageEvent};
