//! # Parley Framework
//!
//! The dispatch core of the Parley bot framework.
//!
//! This layer provides:
//! - [`Context`]: the per-update object with a typed state map
//! - [`filter`]: composable route predicates
//! - [`Handler`]: async functions with parameter extraction
//! - [`middleware`]: decorators around handlers, including `recover` and `logger`
//! - [`Router`]: first-match-wins routing with sub-routers
//! - [`scene`]: per-user conversation state machines
//! - [`session`]: per-user persisted state with dirty tracking
//!
//! A typical chain, outermost first:
//!
//! ```text
//! recover → logger → session → scene → route middleware → handler
//! ```

pub mod context;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod scene;
pub mod session;

pub use context::Context;
pub use error::{
    BoxError, ExtractError, ExtractResult, HandlerResult, PanicError, SceneError, SessionError,
    StoreError, StoreResult,
};
pub use extractor::{FromContext, State};
pub use filter::Filter;
pub use handler::{BoxedHandler, Handler, IntoHandlerResult};
pub use middleware::{Middleware, Middlewares, Next, from_fn, logger, recover};
pub use router::{ErrorHandler, Router, SubRouter};
pub use scene::{Scene, SceneControl, SceneManager, SceneSlot};
pub use session::{
    FailurePolicy, MemoryStore, Session, SessionData, SessionManager, SessionMap, SessionStore,
};
