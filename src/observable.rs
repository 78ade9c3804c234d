//! # Observable Runtime
//!
//! Observable cells, cached computed values, reactions and batched actions over
//! the [`reactive_graph`] signal graph.
//!
//! [`Observable`] wraps an `ArcRwSignal` and [`Computed`] an `ArcMemo`, so
//! dependency tracking and memoization are the graph's. Reactions are immediate
//! effects that re-evaluate their expression synchronously and queue their
//! effect; the queue runs once the outermost [`action`] completes, so no effect
//! ever observes a half-applied batch of writes.
//!
//! Values are kept in [`SendWrapper`]s: the graph requires `Send + Sync` while
//! nodes and forms are `Rc`-based and never leave their thread.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use focus4::observable::{Computed, Observable, action, reaction};
//!
//! let a = Observable::new(1);
//! let b = Observable::new(2);
//! let sum = Computed::new({
//!     let (a, b) = (a.clone(), b.clone());
//!     move || a.get() + b.get()
//! });
//! assert_eq!(sum.get(), 3);
//!
//! let runs = Rc::new(Cell::new(0));
//! let r = reaction({ let sum = sum.clone(); move || sum.get() }, {
//!     let runs = Rc::clone(&runs);
//!     move |_| runs.set(runs.get() + 1)
//! });
//! action(|| {
//!     a.set(10);
//!     b.set(20);
//! });
//! assert_eq!(sum.get(), 30);
//! assert_eq!(runs.get(), 1);
//! r.dispose();
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use reactive_graph::computed::ArcMemo;
use reactive_graph::effect::ImmediateEffect;
use reactive_graph::graph::untrack;
use reactive_graph::signal::ArcRwSignal;
use reactive_graph::traits::{Update, With, WithUntracked, Write};
use send_wrapper::SendWrapper;
use tracing::error;

/// Maximum number of reactions a single drain of the queue may execute before it
/// is considered divergent.
const MAX_REACTION_ITERATIONS: usize = 100;

/////////////////////////////////////////////// Batching //////////////////////////////////////////////

#[derive(Default)]
struct Runtime {
    batch_depth: Cell<usize>,
    draining: Cell<bool>,
    pending: RefCell<VecDeque<Rc<ReactionInner>>>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

/// Runs `f` without recording any of its reads against the enclosing derivation.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = RUNTIME.with(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth
        });
        if depth == 0 && !std::thread::panicking() {
            drain_reactions();
        }
    }
}

/// Runs `f` as a single batch of writes.
///
/// Reactions invalidated by writes inside the batch run after `f` returns, once
/// the outermost action completes. Nested actions join the outer batch.
pub fn action<T>(f: impl FnOnce() -> T) -> T {
    let _guard = BatchGuard::enter();
    f()
}

fn drain_reactions() {
    if RUNTIME.with(|rt| rt.draining.replace(true)) {
        return;
    }
    let mut iterations = 0;
    loop {
        let next = RUNTIME.with(|rt| rt.pending.borrow_mut().pop_front());
        let Some(reaction) = next else {
            break;
        };
        iterations += 1;
        if iterations > MAX_REACTION_ITERATIONS {
            error!(
                limit = MAX_REACTION_ITERATIONS,
                "reactions did not converge to a stable state; dropping the pending queue"
            );
            RUNTIME.with(|rt| {
                for pending in rt.pending.borrow_mut().drain(..) {
                    pending.scheduled.set(false);
                }
            });
            reaction.scheduled.set(false);
            break;
        }
        reaction.execute();
    }
    RUNTIME.with(|rt| rt.draining.set(false));
}

fn schedule(reaction: Rc<ReactionInner>) {
    if reaction.scheduled.replace(true) {
        return;
    }
    RUNTIME.with(|rt| rt.pending.borrow_mut().push_back(reaction));
}

/// Value slot shared with the signal graph.
struct Local<T>(SendWrapper<T>);

impl<T> Local<T> {
    fn new(value: T) -> Self {
        Local(SendWrapper::new(value))
    }
}

impl<T: PartialEq> PartialEq for Local<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

///////////////////////////////////////////// Observable //////////////////////////////////////////////

/// A mutable cell whose reads are tracked and whose writes notify dependents.
///
/// Cloning an `Observable` yields another handle to the same cell.
pub struct Observable<T>(Rc<ArcRwSignal<Local<T>>>);

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable(Rc::clone(&self.0))
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0
            .with_untracked(|value| f.debug_tuple("Observable").field(&*value.0).finish())
    }
}

impl<T: Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> Observable<T> {
    /// Creates a new observable cell.
    pub fn new(value: T) -> Self {
        Observable(Rc::new(ArcRwSignal::new(Local::new(value))))
    }

    /// Borrows the current value, recording the read.
    ///
    /// `f` must not write to this same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with(|value| f(&value.0))
    }

    /// Borrows the current value without recording the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with_untracked(|value| f(&value.0))
    }

    /// Stores `value` unconditionally and notifies dependents, returning the previous value.
    pub fn replace(&self, value: T) -> T {
        action(|| {
            let mut slot = self.0.write();
            std::mem::replace(&mut *slot.0, value)
        })
    }

    /// Mutates the value in place and notifies dependents.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        action(|| self.0.update(|slot| f(&mut slot.0)));
    }

    /// Returns true if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Returns a copy of the current value, recording the read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Returns a copy of the current value without recording the read.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Observable<T> {
    /// Stores `value`, notifying dependents only when it differs from the current value.
    pub fn set(&self, value: T) {
        if self.with_untracked(|current| *current == value) {
            return;
        }
        self.update(|slot| *slot = value);
    }
}

////////////////////////////////////////////// Computed ///////////////////////////////////////////////

/// A cached derivation over observables.
///
/// The value is computed on first read and cached until one of the observables
/// read during the last evaluation changes. A recomputation yielding an equal
/// value does not notify dependents.
pub struct Computed<T: 'static>(Rc<ArcMemo<Local<T>>>);

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed(Rc::clone(&self.0))
    }
}

impl<T: 'static> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed").finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Creates a derivation from `compute`.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let compute = SendWrapper::new(compute);
        Computed(Rc::new(ArcMemo::new(move |_| Local::new((*compute)()))))
    }

    /// Returns the current value, recomputing it if a dependency changed.
    pub fn get(&self) -> T {
        self.0.with(|value| T::clone(&value.0))
    }
}

////////////////////////////////////////////// Reaction ///////////////////////////////////////////////

struct ReactionInner {
    run: Box<dyn Fn()>,
    effect: RefCell<Option<Box<dyn Any>>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
}

impl ReactionInner {
    fn execute(&self) {
        self.scheduled.set(false);
        if self.disposed.get() {
            return;
        }
        action(|| (self.run)());
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.effect.borrow_mut().take();
    }
}

/// A running side effect driven by observable reads.
///
/// The reaction stays subscribed as long as this handle (or a [`Disposer`]
/// made from it) is alive and [`Reaction::dispose`] has not been called.
#[must_use = "a reaction stops as soon as its handle is dropped"]
pub struct Reaction(Rc<ReactionInner>);

impl Reaction {
    fn start(run: Box<dyn Fn()>, track: impl Fn() + 'static, queue: bool) -> Self {
        let inner = Rc::new(ReactionInner {
            run,
            effect: RefCell::new(None),
            scheduled: Cell::new(false),
            disposed: Cell::new(false),
        });
        let weak = Rc::downgrade(&inner);
        let body = SendWrapper::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.disposed.get() {
                return;
            }
            track();
            if queue {
                schedule(inner);
            }
        });
        let effect = action(|| ImmediateEffect::new_isomorphic(move || (*body)()));
        *inner.effect.borrow_mut() = Some(Box::new(effect));
        Reaction(inner)
    }

    /// Stops the reaction and releases its subscriptions.
    pub fn dispose(&self) {
        self.0.dispose();
    }

    /// True once [`Reaction::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

/// Tracks `expression` and calls `effect` with its new value each time it changes.
///
/// The expression is re-evaluated as soon as a dependency changes; the effect
/// does not run for the initial value, and otherwise runs untracked once the
/// outermost action completes.
pub fn reaction<T, E, F>(expression: E, effect: F) -> Reaction
where
    T: PartialEq + 'static,
    E: Fn() -> T + 'static,
    F: Fn(&T) + 'static,
{
    let latest: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let last: RefCell<Option<T>> = RefCell::new(None);
    let run = {
        let latest = Rc::clone(&latest);
        Box::new(move || {
            let Some(value) = latest.borrow_mut().take() else {
                return;
            };
            let fire = matches!(&*last.borrow(), Some(previous) if *previous != value);
            if fire {
                untracked(|| effect(&value));
            }
            *last.borrow_mut() = Some(value);
        })
    };
    Reaction::start(run, move || *latest.borrow_mut() = Some(expression()), true)
}

/// Runs `f` now and again, synchronously, whenever any observable it read changes.
///
/// Unlike [`reaction`], `f` is not deferred to the end of an action, so it must
/// only read.
pub fn autorun(f: impl Fn() + 'static) -> Reaction {
    Reaction::start(Box::new(|| {}), f, false)
}

////////////////////////////////////////////// Disposal ///////////////////////////////////////////////

/// A teardown callback that runs exactly once, when [`Disposer::dispose`] is called.
#[must_use = "dropping a disposer without calling dispose skips its teardown"]
pub struct Disposer(Option<Box<dyn FnOnce()>>);

impl Disposer {
    /// Wraps a teardown callback.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Disposer(Some(Box::new(f)))
    }

    /// Runs the teardown.
    pub fn dispose(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl From<Reaction> for Disposer {
    fn from(reaction: Reaction) -> Self {
        Disposer::new(move || reaction.dispose())
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Disposer").field(&self.0.is_some()).finish()
    }
}

/// The owner of a set of disposers, typically one per view.
///
/// Disposers run in reverse registration order when [`Scope::dispose`] is
/// called or when the scope is dropped.
#[derive(Debug, Default)]
pub struct Scope {
    disposers: RefCell<Vec<Disposer>>,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a disposer with this scope.
    pub fn register(&self, disposer: impl Into<Disposer>) {
        self.disposers.borrow_mut().push(disposer.into());
    }

    /// Number of disposers still pending.
    pub fn len(&self) -> usize {
        self.disposers.borrow().len()
    }

    /// True when no disposer is pending.
    pub fn is_empty(&self) -> bool {
        self.disposers.borrow().is_empty()
    }

    /// Runs every registered disposer.
    pub fn dispose(&self) {
        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers.into_iter().rev() {
            disposer.dispose();
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<usize>>, impl Fn() + Clone) {
        let count = Rc::new(Cell::new(0));
        let bump = {
            let count = Rc::clone(&count);
            move || count.set(count.get() + 1)
        };
        (count, bump)
    }

    #[test]
    fn computed_is_cached_until_dependency_changes() {
        let cell = Observable::new(2);
        let (evaluations, bump) = counter();
        let doubled = Computed::new({
            let cell = cell.clone();
            move || {
                bump();
                cell.get() * 2
            }
        });
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(evaluations.get(), 1);
        cell.set(5);
        assert_eq!(evaluations.get(), 1);
        assert_eq!(doubled.get(), 10);
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    fn setting_an_equal_value_does_not_notify() {
        let cell = Observable::new("a".to_string());
        let (runs, bump) = counter();
        let r = autorun({
            let cell = cell.clone();
            move || {
                cell.with(|_| ());
                bump();
            }
        });
        assert_eq!(runs.get(), 1);
        cell.set("a".to_string());
        assert_eq!(runs.get(), 1);
        cell.set("b".to_string());
        assert_eq!(runs.get(), 2);
        r.dispose();
    }

    #[test]
    fn reaction_skips_initial_value_and_fires_on_change() {
        let cell = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let r = reaction({ let cell = cell.clone(); move || cell.get() }, {
            let seen = Rc::clone(&seen);
            move |v: &i32| seen.borrow_mut().push(*v)
        });
        assert!(seen.borrow().is_empty());
        cell.set(2);
        cell.set(3);
        assert_eq!(*seen.borrow(), vec![2, 3]);
        r.dispose();
        cell.set(4);
        assert_eq!(*seen.borrow(), vec![2, 3]);
    }

    #[test]
    fn action_batches_notifications() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        let (runs, bump) = counter();
        let r = reaction(
            {
                let (a, b) = (a.clone(), b.clone());
                move || a.get() + b.get()
            },
            move |_| bump(),
        );
        action(|| {
            a.set(1);
            b.set(1);
            a.set(2);
        });
        assert_eq!(runs.get(), 1);
        r.dispose();
    }

    #[test]
    fn equal_computed_values_do_not_fire() {
        let cell = Observable::new(1);
        let (runs, bump) = counter();
        let parity = Computed::new({
            let cell = cell.clone();
            move || cell.get() % 2
        });
        let r = reaction(move || parity.get(), move |_| bump());
        cell.set(3);
        assert_eq!(runs.get(), 0);
        cell.set(4);
        assert_eq!(runs.get(), 1);
        r.dispose();
    }

    #[test]
    fn replace_returns_the_previous_value() {
        let cell = Observable::new(vec![1]);
        assert_eq!(cell.replace(vec![2, 3]), vec![1]);
        assert_eq!(cell.get_untracked(), vec![2, 3]);
    }

    #[test]
    fn untracked_reads_are_not_dependencies() {
        let tracked = Observable::new(0);
        let ignored = Observable::new(0);
        let (runs, bump) = counter();
        let r = autorun({
            let (tracked, ignored) = (tracked.clone(), ignored.clone());
            move || {
                tracked.get();
                untracked(|| ignored.get());
                bump();
            }
        });
        ignored.set(1);
        assert_eq!(runs.get(), 1);
        tracked.set(1);
        assert_eq!(runs.get(), 2);
        r.dispose();
    }

    #[test]
    fn dropping_the_handle_stops_the_reaction() {
        let cell = Observable::new(0);
        let (runs, bump) = counter();
        let r = autorun({
            let cell = cell.clone();
            move || {
                cell.get();
                bump();
            }
        });
        drop(r);
        cell.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn divergent_reactions_are_cut_off() {
        let cell = Observable::new(0u64);
        let r = reaction({ let cell = cell.clone(); move || cell.get() }, {
            let cell = cell.clone();
            move |v: &u64| cell.set(v + 1)
        });
        cell.set(1);
        let settled = cell.get_untracked();
        assert!(settled > 1);
        assert!(settled <= (MAX_REACTION_ITERATIONS as u64) + 2);
        r.dispose();
    }

    #[test]
    fn scope_disposes_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let scope = Scope::new();
        for i in 0..3 {
            let order = Rc::clone(&order);
            scope.register(Disposer::new(move || order.borrow_mut().push(i)));
        }
        assert_eq!(scope.len(), 3);
        scope.dispose();
        assert!(scope.is_empty());
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }
}
