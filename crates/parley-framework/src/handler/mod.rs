//! Handlers and their tower adapters.
//!
//! - [`traits`]: the [`Handler`] trait, implemented for async functions whose
//!   parameters are [`FromContext`](crate::extractor::FromContext) extractors
//! - [`service`]: [`HandlerService`] and the erased [`BoxedHandler`] the
//!   router and scenes store
//!
//! ```text
//! async fn(..) ──into_boxed──▶ BoxedHandler ──middleware──▶ BoxedHandler
//! ```

pub mod service;
pub mod traits;

pub use service::{BoxedHandler, HandlerService, call_handler, into_boxed};
pub use traits::{Handler, IntoHandlerResult};
