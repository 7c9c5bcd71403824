//! The ambient active crumb.
//!
//! Each thread has its own active slot, starting at [`ROOT_CRUMB`]. Futures run
//! through [`scope`] get a task-local slot instead, so tasks interleaved on one
//! worker thread never see each other's crumb. While a task-local slot exists it
//! takes precedence over the thread slot.
//!
//! Entering a context is scoped: [`enter_context`] returns a [`ContextGuard`]
//! that puts the previous crumb back when dropped, whether the scope ends
//! normally, through `?`, or by unwinding.

use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::crumb::{Crumb, Field};
use crate::trail::TrailCapable;

/// Default active crumb for every thread that has not entered a context.
pub static ROOT_CRUMB: Lazy<Crumb> = Lazy::new(|| Crumb::new("RootEntry"));

pub fn root_crumb() -> Crumb {
    ROOT_CRUMB.clone()
}

thread_local! {
    static THREAD_ACTIVE: RefCell<Crumb> = RefCell::new(root_crumb());
}

tokio::task_local! {
    static TASK_ACTIVE: RefCell<Crumb>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Task,
    Thread,
}

impl Slot {
    fn current() -> Self {
        if TASK_ACTIVE.try_with(|_| ()).is_ok() {
            Slot::Task
        } else {
            Slot::Thread
        }
    }

    fn with<R>(self, f: impl FnOnce(&RefCell<Crumb>) -> R) -> R {
        match self {
            Slot::Task if TASK_ACTIVE.try_with(|_| ()).is_ok() => TASK_ACTIVE.with(f),
            Slot::Task => {
                warn!("task-local crumb scope ended before its guard; using the thread slot");
                THREAD_ACTIVE.with(f)
            }
            Slot::Thread => THREAD_ACTIVE.with(f),
        }
    }

    fn replace(self, crumb: Crumb) -> Crumb {
        self.with(|cell| cell.replace(crumb))
    }
}

/// Restores the previously active crumb when dropped.
///
/// Guards are tied to the thread (or task scope) that created them and must be
/// dropped in reverse order of creation; the borrow checker enforces this for
/// guards bound with `let` in nested blocks.
///
/// A guard must not be held across an `.await`. Futures polled concurrently
/// inside one task (`tokio::join!`, `select!`) share that task's slot, so a
/// guard alive across a suspension point leaks its crumb into the sibling
/// future. Give each concurrently polled future its own [`scope`] instead.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ContextGuard {
    slot: Slot,
    entered: Crumb,
    previous: Option<Crumb>,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// The crumb this guard made active.
    pub fn crumb(&self) -> &Crumb {
        &self.entered
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let restored_title = previous.title().to_string();
        let replaced = self.slot.replace(previous);
        if !replaced.ptr_eq(&self.entered) {
            warn!(
                expected = %self.entered.title(),
                found = %replaced.title(),
                "crumb context exited out of order"
            );
        }
        trace!(crumb = %restored_title, "restored crumb context");
    }
}

/// Make `crumb` the active crumb until the returned guard is dropped.
///
/// For synchronous code. In async code use [`scope`]; see [`ContextGuard`].
pub fn enter_context(crumb: &Crumb) -> ContextGuard {
    let slot = Slot::current();
    let previous = slot.replace(crumb.clone());
    trace!(crumb = %crumb.title(), id = %crumb.id(), ?slot, "entered crumb context");
    ContextGuard {
        slot,
        entered: crumb.clone(),
        previous: Some(previous),
        _not_send: PhantomData,
    }
}

/// Run `f` with `crumb` active.
pub fn with_context<R>(crumb: &Crumb, f: impl FnOnce() -> R) -> R {
    let _guard = enter_context(crumb);
    f()
}

/// Run `future` with its own task-local slot, starting at `crumb`.
///
/// The slot belongs to this future only: sibling futures joined with it keep
/// their own crumb, and tasks started with `tokio::spawn` from inside it start
/// back at the thread slot. Use [`spawn`] to carry the active crumb over.
pub fn scope<F: Future>(crumb: &Crumb, future: F) -> impl Future<Output = F::Output> {
    TASK_ACTIVE.scope(RefCell::new(crumb.clone()), future)
}

/// `tokio::spawn` with the caller's active crumb as the new task's context.
///
/// Must be called from within a tokio runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let parent = get_active();
    trace!(crumb = %parent.title(), "spawning task in crumb context");
    tokio::spawn(scope(&parent, future))
}

/// The crumb that context-free calls currently target.
pub fn get_active() -> Crumb {
    Slot::current().with(|cell| cell.borrow().clone())
}

/// Merge entries into the active crumb's `info`.
pub fn update_info<I, K, V>(entries: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Field>,
{
    get_active().update_info(entries);
}

/// Merge entries into the active crumb's `extra`.
pub fn update_extra<I, K, V>(entries: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Field>,
{
    get_active().update_extra(entries);
}

/// Attach `crumb` as a child of the active crumb.
pub fn put(crumb: Crumb) {
    get_active().attach_child(crumb);
}

/// Keyword-style [`update_info`]: `update_info!(rows = 10, source = "db")`.
///
/// Values are recorded with [`Field::capture`]; one that cannot be serialized
/// is stored as a placeholder instead of panicking.
#[macro_export]
macro_rules! update_info {
    ($($key:ident = $value:expr),+ $(,)?) => {
        $crate::context::update_info([
            $((
                ::core::stringify!($key),
                $crate::Field::capture(::core::stringify!($key), &$value),
            )),+
        ])
    };
}

/// Keyword-style [`update_extra`]: `update_extra!(cache_hit = true)`.
#[macro_export]
macro_rules! update_extra {
    ($($key:ident = $value:expr),+ $(,)?) => {
        $crate::context::update_extra([
            $((
                ::core::stringify!($key),
                $crate::Field::capture(::core::stringify!($key), &$value),
            )),+
        ])
    };
}
