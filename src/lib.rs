//! GameVerse client - headless SDK for the GameVerse social gaming platform
//!
//! This library holds the client side of GameVerse: phone/OTP sessions, the
//! REST and STOMP clients, the state slices the screens read from, and the
//! thin chess and racing models driven by server-pushed game state.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod views;

// Re-export commonly used types
pub use config::Settings;
pub use error::{AppError, ErrorCode};
pub use services::{ApiClient, ApiError, CatalogCache, LocalStorage, RealtimeClient, Session};
pub use store::{Action, RootState, Store};
