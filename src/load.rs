//! # Loading Store Nodes
//!
//! [`register_load`] wires an asynchronous service call to a store node or a
//! store list. Calling [`LoadRegistration::load`] runs the service and, on
//! success only, sets the result into the target. [`LoadRegistration::watch`]
//! reloads whenever the observables read by the params function change.
//!
//! There is no cancellation: a call that resolves after a newer call started, or
//! after [`LoadRegistration::dispose`], has its result discarded.
//!
//! ```rust
//! use focus4::{Domain, Entity, LoadOutcome, SchemaKind, ServiceError, StoreNode, field, register_load};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let text = Domain::builder(SchemaKind::String).build();
//! let entity = Entity::builder("Operation").entry("code", field(&text, |f| f)).build();
//! let store = StoreNode::new(&entity);
//!
//! let registration = register_load(&store, |l| {
//!     l.params(|| Some(json!(42)))
//!         .getter(|id| async move { Ok::<_, ServiceError>(json!({"code": format!("OP-{id}")})) })
//! });
//! assert_eq!(registration.load().await.unwrap(), LoadOutcome::Loaded);
//! assert_eq!(store.field("code").unwrap().value(), json!("OP-42"));
//! # });
//! ```

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::{ActionError, ServiceError};
use crate::observable::{Disposer, Observable, Reaction, action, reaction, untracked};
use crate::store::{StoreListNode, StoreNode};

/// Boxed future returned by a service.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Value, ServiceError>>>>;

pub(crate) type ServiceFn = Rc<dyn Fn(Value) -> ServiceFuture>;
type ParamsFn = Rc<dyn Fn() -> Option<Value>>;
type LoadedFn = Box<dyn Fn(&Value)>;

pub(crate) fn service_fn<F, Fut>(f: F) -> ServiceFn
where
    F: Fn(Value) -> Fut + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + 'static,
{
    Rc::new(move |params| Box::pin(f(params)))
}

/// Something a load can fill.
pub trait LoadTarget: Clone + 'static {
    /// Applies a successful result.
    fn apply(&self, data: &Value);
    /// Name used in logs.
    fn describe(&self) -> String;
}

impl LoadTarget for StoreNode {
    fn apply(&self, data: &Value) {
        self.set(data);
    }

    fn describe(&self) -> String {
        self.entity().name().unwrap_or("<anonymous>").to_string()
    }
}

impl LoadTarget for StoreListNode {
    fn apply(&self, data: &Value) {
        self.set(data);
    }

    fn describe(&self) -> String {
        format!("[{}]", self.entity().name().unwrap_or("<anonymous>"))
    }
}

/// What happened to a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result was set into the target.
    Loaded,
    /// The params function returned `None`; nothing was called.
    Skipped,
    /// The result arrived after a newer load started or after disposal.
    Discarded,
}

/// Configuration of a load.
#[derive(Default)]
pub struct LoadBuilder {
    params: Option<ParamsFn>,
    getter: Option<ServiceFn>,
    on_loaded: Option<LoadedFn>,
}

impl LoadBuilder {
    /// Computes the service's parameters; `None` means "do not load".
    ///
    /// Without a params function the service is called with `null`.
    pub fn params(mut self, f: impl Fn() -> Option<Value> + 'static) -> Self {
        self.params = Some(Rc::new(f));
        self
    }

    /// The service.
    pub fn getter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + 'static,
    {
        self.getter = Some(service_fn(f));
        self
    }

    /// Called with the result once it has been set into the target.
    pub fn on_loaded(mut self, f: impl Fn(&Value) + 'static) -> Self {
        self.on_loaded = Some(Box::new(f));
        self
    }
}

struct LoadState {
    target: String,
    apply: Box<dyn Fn(&Value)>,
    params: Option<ParamsFn>,
    getter: Option<ServiceFn>,
    on_loaded: Option<LoadedFn>,
    is_loading: Observable<bool>,
    generation: Cell<u64>,
    disposed: Cell<bool>,
    watcher: RefCell<Option<Reaction>>,
}

/// A load wired to a target.
#[derive(Clone)]
pub struct LoadRegistration(Rc<LoadState>);

impl std::fmt::Debug for LoadRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRegistration")
            .field("target", &self.0.target)
            .field("is_loading", &self.0.is_loading)
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

/// Wires a load to `target`.
pub fn register_load<T: LoadTarget>(
    target: &T,
    configure: impl FnOnce(LoadBuilder) -> LoadBuilder,
) -> LoadRegistration {
    let builder = configure(LoadBuilder::default());
    let applied = target.clone();
    LoadRegistration(Rc::new(LoadState {
        target: target.describe(),
        apply: Box::new(move |data| applied.apply(data)),
        params: builder.params,
        getter: builder.getter,
        on_loaded: builder.on_loaded,
        is_loading: Observable::new(false),
        generation: Cell::new(0),
        disposed: Cell::new(false),
        watcher: RefCell::new(None),
    }))
}

impl LoadRegistration {
    /// Runs the service once and sets its result into the target.
    ///
    /// A failed call leaves the target untouched and returns the service's error.
    pub async fn load(&self) -> Result<LoadOutcome, ActionError> {
        let state = &self.0;
        if state.disposed.get() {
            return Ok(LoadOutcome::Discarded);
        }
        let Some(getter) = state.getter.clone() else {
            return Err(ActionError::MissingService { action: "load" });
        };
        let params = match &state.params {
            Some(params) => untracked(|| params()),
            None => Some(Value::Null),
        };
        let Some(params) = params else {
            debug!(node = %state.target, "no params, load skipped");
            return Ok(LoadOutcome::Skipped);
        };

        let generation = state.generation.get() + 1;
        state.generation.set(generation);
        state.is_loading.set(true);
        debug!(node = %state.target, params = %params, "loading");
        let result = getter(params).await;

        if state.disposed.get() || state.generation.get() != generation {
            warn!(node = %state.target, "discarding stale load result");
            return Ok(LoadOutcome::Discarded);
        }
        state.is_loading.set(false);
        let data = result.map_err(|source| ActionError::Service {
            action: "load",
            source,
        })?;
        action(|| (state.apply)(&data));
        debug!(node = %state.target, "loaded");
        if let Some(on_loaded) = &state.on_loaded {
            on_loaded(&data);
        }
        Ok(LoadOutcome::Loaded)
    }

    /// Loads now and again whenever the params change.
    ///
    /// Loads are spawned with [`tokio::task::spawn_local`], so this must be called
    /// from within a [`tokio::task::LocalSet`].
    pub fn watch(&self) {
        let Some(params) = self.0.params.clone() else {
            warn!(node = %self.0.target, "load has no params to watch");
            return;
        };
        let weak = Rc::downgrade(&self.0);
        let watcher = reaction(move || params(), {
            let weak = weak.clone();
            move |_| spawn_load(&weak)
        });
        if let Some(previous) = self.0.watcher.replace(Some(watcher)) {
            previous.dispose();
        }
        spawn_load(&weak);
    }

    /// True while a call is in flight, recording the read.
    pub fn is_loading(&self) -> bool {
        self.0.is_loading.get()
    }

    /// Stops watching and discards the result of any call in flight.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }
        if let Some(watcher) = self.0.watcher.take() {
            watcher.dispose();
        }
        self.0.is_loading.set(false);
    }

    /// True once [`LoadRegistration::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }
}

fn spawn_load(weak: &Weak<LoadState>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let registration = LoadRegistration(state);
    tokio::task::spawn_local(async move {
        if let Err(err) = registration.load().await {
            error!(node = %registration.0.target, error = %err, "load failed");
        }
    });
}

impl From<LoadRegistration> for Disposer {
    fn from(registration: LoadRegistration) -> Self {
        Disposer::new(move || registration.dispose())
    }
}
