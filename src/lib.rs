pub mod app;
pub mod booking;
pub mod bookmark;
pub mod chat;
pub mod config;
pub mod error;
pub mod limits;
pub mod maintenance;
pub mod media;
pub mod model;
pub mod notify;
pub mod observability;
pub mod property;
pub mod session;
pub mod store;
pub mod wal;

pub use app::Marketplace;
pub use error::Error;
pub use session::{Identity, Session};
pub use store::{Store, StoreError};
