//! # Composable MVC Runtime
//!
//! Runtime for the Composable MVC action pipeline.
//!
//! This crate drives the abstractions of `composable-mvc-core` for each
//! request: it creates the routed controller, binds action parameters, runs
//! the filter pipeline around the action and its result, and returns the
//! buffered response.
//!
//! ## Core Components
//!
//! - **`MvcApplication`**: Configured pipeline; entry point for routed requests and child actions
//! - **`ControllerActionInvoker`**: Action selection, binding and the filter pipeline
//! - **`DefaultModelBinder`**: Binds simple, complex and collection models and validates them
//! - **`DefaultControllerFactory`**: Case-insensitive controller registry
//! - **Metrics**: Prometheus recorder for pipeline counters and timings
//!
//! ## Example
//!
//! ```ignore
//! use composable_mvc_runtime::MvcApplication;
//!
//! let app = MvcApplication::builder()
//!     .controller::<HomeController>()
//!     .global_filter(HandleErrorFilter::new())
//!     .view_engine(engine)
//!     .build()?;
//!
//! let response = app.process_request(request_context)?;
//! ```

pub mod application;
pub mod binder;
pub mod controller_factory;
pub mod invoker;
pub mod metrics;

pub use application::{MvcApplication, MvcApplicationBuilder};
pub use binder::DefaultModelBinder;
pub use controller_factory::{ControllerFactory, DefaultControllerFactory};
pub use invoker::ControllerActionInvoker;
