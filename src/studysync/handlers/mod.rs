pub mod health;
pub use self::health::health;

pub mod auth;
pub use self::auth::auth;

pub mod session;
pub use self::session::{logout, session};

pub mod types;
