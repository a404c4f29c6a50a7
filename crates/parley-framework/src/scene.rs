//! Conversation scenes.
//!
//! A [`Scene`] is a named router that owns every update of a user while it
//! is that user's current scene. The [`SceneManager`] is the registry of
//! scenes plus a getter/setter pair that reads and persists the current
//! scene name; where that name lives (a session, a database row, a test
//! double) is up to the caller.
//!
//! The manager's [`middleware`](SceneManager::middleware) stores a
//! [`SceneControl`] in every context and, when a registered scene is current,
//! hands the update to that scene instead of the rest of the chain.
//!
//! ```rust,ignore
//! let mut scenes = SceneManager::session_backed::<SessionMap>();
//! let form = scenes.scene("form");
//! form.on_enter(|ctx: Arc<Context>| async move { ctx.send("What is your name?").await.map(drop) });
//! form.on(has_message(), save_name);
//!
//! let scenes = Arc::new(scenes);
//! router.use_middleware([sessions.middleware(), scenes.middleware()]);
//! router.on(command("form"), |scene: SceneControl| async move { scene.enter("form").await });
//! ```
//!
//! # Transitions
//!
//! Entering `B` while `A` is current runs `A`'s leave hook strictly before
//! `B`'s enter hook. A failing leave hook aborts the transition: the stored
//! name stays `A` and `B`'s enter hook never runs. A failing enter hook is
//! reported after `B` has already been stored as current; callers decide how
//! to recover.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{ExtractError, ExtractResult, HandlerResult, SceneError};
use crate::extractor::FromContext;
use crate::filter::Filter;
use crate::handler::{BoxedHandler, Handler, call_handler, into_boxed};
use crate::middleware::{Middleware, Middlewares};
use crate::router::{Router, SubRouter};
use crate::session::{Session, SessionData};

/// Reads the current scene name for the update's owner.
pub type SceneGetter = Arc<dyn Fn(&Context) -> Option<String> + Send + Sync>;

/// Persists the current scene name; `None` clears it.
pub type SceneSetter = Arc<dyn Fn(&Context, Option<&str>) + Send + Sync>;

/// A session value that can hold the current scene name.
pub trait SceneSlot {
    /// Returns the stored scene name.
    fn scene(&self) -> Option<&str>;

    /// Stores or clears the scene name.
    fn set_scene(&mut self, scene: Option<String>);
}

/// One state of a conversation: a router plus optional enter/leave hooks.
pub struct Scene {
    name: String,
    router: Router,
    on_enter: Option<BoxedHandler>,
    on_leave: Option<BoxedHandler>,
}

impl Scene {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            router: Router::new(),
            on_enter: None,
            on_leave: None,
        }
    }

    /// The scene's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends middleware for routes registered on this scene from now on.
    pub fn use_middleware(&mut self, middlewares: impl Into<Middlewares>) -> &mut Self {
        self.router.use_middleware(middlewares);
        self
    }

    /// Registers a route inside the scene.
    pub fn on<H, T>(&mut self, filter: Filter, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.router.on(filter, handler);
        self
    }

    /// Registers a route with additional middleware inside the scene.
    pub fn on_with<H, T>(
        &mut self,
        filter: Filter,
        handler: H,
        extra: impl Into<Middlewares>,
    ) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.router.on_with(filter, handler, extra);
        self
    }

    /// Opens a sub-router inside the scene.
    pub fn sub(&mut self, filter: Filter, extra: impl Into<Middlewares>) -> SubRouter<'_> {
        self.router.sub(filter, extra)
    }

    /// Sets the hook run after the scene becomes current.
    pub fn on_enter<H, T>(&mut self, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on_enter = Some(into_boxed(handler));
        self
    }

    /// Sets the hook run before the scene stops being current.
    pub fn on_leave<H, T>(&mut self, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on_leave = Some(into_boxed(handler));
        self
    }

    /// Routes an update through the scene's router.
    pub async fn handle(&self, ctx: Arc<Context>) -> HandlerResult {
        self.router.handle(ctx).await
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("router", &self.router)
            .field("has_on_enter", &self.on_enter.is_some())
            .field("has_on_leave", &self.on_leave.is_some())
            .finish()
    }
}

/// Registry of scenes plus the current-scene accessors.
pub struct SceneManager {
    scenes: HashMap<String, Scene>,
    getter: SceneGetter,
    setter: SceneSetter,
}

impl SceneManager {
    /// Creates an empty registry over the given accessors.
    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&Context) -> Option<String> + Send + Sync + 'static,
        S: Fn(&Context, Option<&str>) + Send + Sync + 'static,
    {
        Self {
            scenes: HashMap::new(),
            getter: Arc::new(getter),
            setter: Arc::new(setter),
        }
    }

    /// Creates a registry that keeps the current scene name inside a
    /// [`Session<T>`].
    ///
    /// The session middleware must run outside the scene middleware. Without
    /// a session in the context no scene is current and transitions are not
    /// persisted.
    pub fn session_backed<T>() -> Self
    where
        T: SessionData + SceneSlot,
    {
        Self::new(
            |ctx| {
                ctx.state::<Session<T>>()
                    .and_then(|session| session.read(|value| value.scene().map(str::to_owned)))
            },
            |ctx, name| match ctx.state::<Session<T>>() {
                Some(session) => session.update(|value| value.set_scene(name.map(str::to_owned))),
                None => warn!(
                    update_id = ctx.update().update_id,
                    scene = ?name,
                    "no session in context, scene change not persisted"
                ),
            },
        )
    }

    /// Returns the scene named `name`, creating it on first use.
    pub fn scene(&mut self, name: &str) -> &mut Scene {
        self.scenes
            .entry(name.to_string())
            .or_insert_with(|| Scene::new(name))
    }

    /// Looks up a registered scene.
    pub fn get(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    /// Returns `true` if a scene named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.scenes.contains_key(name)
    }

    /// Reads the current scene name. An empty name counts as none.
    pub fn current(&self, ctx: &Context) -> Option<String> {
        (self.getter)(ctx).filter(|name| !name.is_empty())
    }

    /// Returns the middleware that installs [`SceneControl`] and routes
    /// updates into the current scene.
    pub fn middleware(self: &Arc<Self>) -> Middleware {
        Middleware::layer(SceneLayer {
            manager: Arc::clone(self),
        })
    }

    async fn enter(&self, ctx: &Arc<Context>, name: &str) -> Result<(), SceneError> {
        let Some(target) = self.scenes.get(name) else {
            return Err(SceneError::NotFound(name.to_string()));
        };

        if let Some(current) = self.current(ctx) {
            self.run_leave(ctx, &current).await?;
        }

        (self.setter)(ctx, Some(name));
        debug!(update_id = ctx.update().update_id, scene = name, "entered scene");

        if let Some(hook) = &target.on_enter {
            call_handler(hook, Arc::clone(ctx))
                .await
                .map_err(|source| SceneError::Enter {
                    scene: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn leave(&self, ctx: &Arc<Context>) -> Result<(), SceneError> {
        let Some(current) = self.current(ctx) else {
            return Ok(());
        };

        self.run_leave(ctx, &current).await?;
        (self.setter)(ctx, None);
        debug!(update_id = ctx.update().update_id, scene = %current, "left scene");
        Ok(())
    }

    async fn run_leave(&self, ctx: &Arc<Context>, current: &str) -> Result<(), SceneError> {
        let Some(hook) = self.scenes.get(current).and_then(|s| s.on_leave.as_ref()) else {
            return Ok(());
        };

        call_handler(hook, Arc::clone(ctx))
            .await
            .map_err(|source| SceneError::Leave {
                scene: current.to_string(),
                source,
            })
    }
}

impl fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SceneManager")
            .field("scenes", &names)
            .finish_non_exhaustive()
    }
}

/// Per-update handle for scene transitions.
///
/// Bound to one [`SceneManager`] and one context. Extract it in a handler or
/// fetch it with [`Context::scene`].
#[derive(Clone)]
pub struct SceneControl {
    manager: Arc<SceneManager>,
    ctx: Weak<Context>,
}

impl SceneControl {
    fn new(manager: Arc<SceneManager>, ctx: &Arc<Context>) -> Self {
        Self {
            manager,
            ctx: Arc::downgrade(ctx),
        }
    }

    fn context(&self) -> Result<Arc<Context>, SceneError> {
        self.ctx
            .upgrade()
            .ok_or(SceneError::Context(ExtractError::ContextGone))
    }

    /// Makes `name` the current scene, leaving the current one first.
    pub async fn enter(&self, name: &str) -> Result<(), SceneError> {
        let ctx = self.context()?;
        self.manager.enter(&ctx, name).await
    }

    /// Leaves the current scene. Does nothing when no scene is current.
    pub async fn leave(&self) -> Result<(), SceneError> {
        let ctx = self.context()?;
        self.manager.leave(&ctx).await
    }

    /// Returns the current scene name.
    pub fn current(&self) -> Option<String> {
        self.ctx.upgrade().and_then(|ctx| self.manager.current(&ctx))
    }
}

impl fmt::Debug for SceneControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneControl")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl FromContext for SceneControl {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.require_state::<SceneControl>()
    }
}

/// The [`Layer`] behind [`SceneManager::middleware`].
#[derive(Clone)]
pub struct SceneLayer {
    manager: Arc<SceneManager>,
}

impl Layer<BoxedHandler> for SceneLayer {
    type Service = SceneService;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        SceneService {
            manager: Arc::clone(&self.manager),
            inner,
        }
    }
}

/// The [`Service`] behind [`SceneManager::middleware`].
#[derive(Clone)]
pub struct SceneService {
    manager: Arc<SceneManager>,
    inner: BoxedHandler,
}

impl Service<Arc<Context>> for SceneService {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        let manager = Arc::clone(&self.manager);
        let inner = self.inner.clone();

        async move {
            ctx.insert_state(SceneControl::new(Arc::clone(&manager), &ctx));

            if let Some(name) = manager.current(&ctx) {
                match manager.get(&name) {
                    Some(scene) => {
                        debug!(
                            update_id = ctx.update().update_id,
                            scene = %name,
                            "routing update to scene"
                        );
                        return scene.handle(ctx).await;
                    }
                    None => warn!(
                        update_id = ctx.update().update_id,
                        scene = %name,
                        "current scene is not registered"
                    ),
                }
            }

            inner.oneshot(ctx).await
        }
        .boxed()
    }
}
