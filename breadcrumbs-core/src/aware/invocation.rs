//! The per-call engine shared by [`Aware`](super::Aware) and `#[aware]`.
//!
//! A call goes through three steps:
//! 1. arguments are captured into a [`CapturedArgs`] snapshot,
//! 2. [`Invocation::run`] (or one of its variants) executes the body with the
//!    new crumb active,
//! 3. the returned [`Completed`] attaches the crumb to its parent and hands
//!    back the body's output.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use tracing::debug;

use super::AttachPolicy;
use crate::context::{get_active, scope, with_context};
use crate::crumb::{Crumb, Field, Fields};
use crate::error::CrumbError;
use crate::sentinel::REDACTED;
use crate::trail::TrailCapable;

/// Snapshot of a call's arguments, ready to become a crumb's `info`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CapturedArgs {
    fields: Fields,
}

impl CapturedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Record an independent copy of `value`.
    ///
    /// A value that cannot be serialized is recorded as a placeholder string
    /// so the call itself still goes ahead.
    pub fn capture<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) {
        self.fields.insert(name.to_string(), Field::capture(name, value));
    }

    pub fn try_capture<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<(), CrumbError> {
        let field = Field::from_serialize(value).map_err(|source| CrumbError::Capture {
            name: name.to_string(),
            source,
        })?;
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        self.fields.insert(name.into(), field.into());
    }

    /// Replace (or add) `name` with the shared redaction sentinel.
    pub fn redact(&mut self, name: &str) {
        self.fields.insert(name.to_string(), Field::from(&*REDACTED));
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// One in-flight call: the crumb it records and how to settle it.
#[derive(Debug)]
pub struct Invocation {
    crumb: Crumb,
    attach: AttachPolicy,
}

impl Invocation {
    pub fn new(title: impl Into<String>, captured: CapturedArgs, attach: AttachPolicy) -> Self {
        Self {
            crumb: Crumb::with_info(title, captured.into_fields()),
            attach,
        }
    }

    pub fn crumb(&self) -> &Crumb {
        &self.crumb
    }

    /// Run an infallible body with this call's crumb active.
    pub fn run<R>(self, body: impl FnOnce() -> R) -> Completed<R> {
        let output = with_context(&self.crumb, body);
        Completed {
            output,
            crumb: self.crumb,
            attach: true,
        }
    }

    /// Run a body whose `Err` counts as a failed call.
    pub fn run_fallible<T, E: fmt::Debug>(
        self,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Completed<Result<T, E>> {
        let output = with_context(&self.crumb, body);
        let attach = self.settle(&output);
        Completed {
            output,
            crumb: self.crumb,
            attach,
        }
    }

    /// Async form of [`Invocation::run`]; the crumb is active in a task-local scope.
    pub async fn run_async<F: Future>(self, future: F) -> Completed<F::Output> {
        let output = scope(&self.crumb, future).await;
        Completed {
            output,
            crumb: self.crumb,
            attach: true,
        }
    }

    /// Async form of [`Invocation::run_fallible`].
    pub async fn run_fallible_async<T, E, F>(self, future: F) -> Completed<Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        let output = scope(&self.crumb, future).await;
        let attach = self.settle(&output);
        Completed {
            output,
            crumb: self.crumb,
            attach,
        }
    }

    fn settle<T, E: fmt::Debug>(&self, output: &Result<T, E>) -> bool {
        let Err(err) = output else {
            return true;
        };
        match self.attach {
            AttachPolicy::Always => {
                debug!(crumb = %self.crumb.title(), error = ?err, "call failed; keeping crumb");
                self.crumb
                    .update_extra([("error", Field::from(format!("{:?}", err)))]);
                true
            }
            AttachPolicy::OnSuccess => {
                debug!(crumb = %self.crumb.title(), error = ?err, "call failed; dropping crumb");
                false
            }
        }
    }
}

/// A finished call whose crumb still has to be attached.
#[must_use = "the crumb is only attached by `attach_to` or `attach_ambient`"]
#[derive(Debug)]
pub struct Completed<R> {
    output: R,
    crumb: Crumb,
    attach: bool,
}

impl<R> Completed<R> {
    pub fn crumb(&self) -> &Crumb {
        &self.crumb
    }

    /// Whether the attach policy keeps this crumb.
    pub fn will_attach(&self) -> bool {
        self.attach
    }

    /// Attach to an explicit trail owner and return the body's output.
    pub fn attach_to(self, target: &dyn TrailCapable) -> R {
        if self.attach {
            debug!(crumb = %self.crumb.title(), id = %self.crumb.id(), "attaching crumb to trail parameter");
            target.attach_child(self.crumb);
        }
        self.output
    }

    /// Attach to whichever crumb is active now, i.e. the caller's context.
    pub fn attach_ambient(self) -> R {
        if self.attach {
            let parent = get_active();
            debug!(
                crumb = %self.crumb.title(),
                id = %self.crumb.id(),
                parent = %parent.title(),
                "attaching crumb to active crumb"
            );
            parent.attach_child(self.crumb);
        }
        self.output
    }
}

/// Pins a future's output type; used by `#[aware]` on `async fn`.
#[doc(hidden)]
pub fn expect_output<R, F: Future<Output = R>>(future: F) -> F {
    future
}
