//! Development HTTP server with live reload for sluice.

pub mod error;
pub mod livereload;
pub mod server;

pub use error::{Result, ServeError};
pub use livereload::LiveReload;
pub use server::{create_router, start, AxumDevServer};
