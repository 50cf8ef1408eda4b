//! Axum integration for the Composable MVC action pipeline.
//!
//! The pipeline expects a request that is already routed to a controller
//! and an action. This crate supplies that routing for a conventional
//! `/{controller}/{action}/{id}` URL space and converts between axum and
//! pipeline types.
//!
//! # Request Flow
//!
//! 1. **Request id** is assigned by [`middleware::request_id_layer`]
//! 2. **Route values** come from the path (`action` defaults to `Index`)
//! 3. **Query, form and JSON** bodies are decoded into an `HttpRequest`
//! 4. **Pipeline** runs on the blocking pool via `MvcApplication::process_request`
//! 5. **Response** is copied back, or the failure is mapped by [`AppError`]
//!
//! # Example
//!
//! ```no_run
//! use composable_mvc_runtime::MvcApplication;
//! use composable_mvc_web::{MvcState, router};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = MvcApplication::builder().build()?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, router(MvcState::new(app))).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use middleware::{REQUEST_ID_HEADER, RequestId, request_id_layer};
pub use router::router;
pub use state::MvcState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
