//! Ambient call-trail recording for function pipelines.
//!
//! While code runs, `breadcrumbs` records a tree of [`Crumb`]s: named records of
//! the inputs and metadata of each step. The tree is built without threading a
//! parameter through every call:
//!
//! ```text
//! RootEntry (ambient default)
//!   └── pipeline::load          info: {path: "..."}
//!         ├── pipeline::parse   info: {strict: true}
//!         └── pipeline::check   info: {token: REDACTED}   extra: {warnings: 2}
//! ```
//!
//! - [`context`] holds the active crumb per thread and per tokio task.
//! - [`aware`] wraps a function so each call records a child crumb, either via
//!   the [`aware`](macro@aware) attribute or the runtime [`Aware`] wrapper.
//! - [`TrailCapable`] lets any host type own a trail of crumbs.
//!
//! ## Example
//!
//! ```ignore
//! use breadcrumbs_core::prelude::*;
//!
//! #[aware(redact_params = "token")]
//! fn check(token: String, depth: u32) -> bool {
//!     update_extra!(warnings = 2);
//!     !token.is_empty() && depth > 0
//! }
//!
//! let run = Crumb::new("run");
//! with_context(&run, || check("s3cr3t".into(), 3));
//! assert_eq!(run.trail().len(), 1);
//! ```

// Lets the attribute macro's `::breadcrumbs_core` paths resolve inside this crate's own tests.
extern crate self as breadcrumbs_core;

pub mod aware;
pub mod context;
pub mod crumb;
pub mod error;
pub mod sentinel;
pub mod trail;
pub mod writer;

pub use aware::{AttachPolicy, Aware, AwareConfig, BoundArgs, CallArgs, RedactParams, Signature};
pub use breadcrumbs_macros::aware;
pub use context::{
    enter_context, get_active, put, root_crumb, scope, spawn, update_extra, update_info,
    with_context, ContextGuard, ROOT_CRUMB,
};
pub use crumb::{Crumb, CrumbId, Field, Fields};
pub use error::CrumbError;
pub use sentinel::{NamedSentinel, REDACTED};
pub use trail::{Trail, TrailCapable};
pub use writer::TrailWriter;

/// Everything needed to annotate and inspect a pipeline.
pub mod prelude {
    pub use crate::{
        aware, enter_context, get_active, put, root_crumb, scope, update_extra, update_info,
        with_context, AttachPolicy, Aware, AwareConfig, CallArgs, Crumb, Field, Signature,
        TrailCapable, REDACTED,
    };
}
