pub mod booking;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod server;
pub mod slots;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use server::create_app;
