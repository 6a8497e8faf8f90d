//! HTTP surface: configuration, middleware, handlers, lifecycle.

pub mod config;
pub mod handlers;
pub mod load_shed;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::*;
pub use handlers::AppState;
pub use load_shed::LoadShedLayer;
pub use module::NetworkModule;
pub use shutdown::*;
