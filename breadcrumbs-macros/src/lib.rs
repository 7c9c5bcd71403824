//! Proc macros for breadcrumbs.
//!
//! This crate provides the `#[aware]` attribute, which records every call of a
//! function as a child crumb. It is re-exported by `breadcrumbs-core`; depend on
//! that crate rather than on this one.
//!
//! # Example
//!
//! ```ignore
//! use breadcrumbs_core::prelude::*;
//!
//! #[aware(trail_param = "job", redact_params = "token")]
//! fn fetch(job: &Job, url: String, token: String, #[crumb(default = 3)] retries: Option<u32>) -> usize {
//!     update_extra!(cached = false);
//!     download(&url, &token, retries)
//! }
//! ```

mod aware;

use proc_macro::TokenStream;

/// Records each call of the annotated function as a crumb.
///
/// # Options
///
/// - `trail_param = "name"` - parameter (or `"self"`) whose trail receives the
///   crumb. Without it the crumb goes to the crumb active at the call site.
/// - `redact_params = "name"` or `redact_params = ["a", "b"]` - parameters
///   recorded as `REDACTED`. Their values are never serialized.
/// - `attach = "on_success" | "always"` - what to do with the crumb of a call
///   that returned `Err`. Only applies to functions returning a `Result`.
/// - `title = "..."` - crumb title. Defaults to `module_path!()::name`, or
///   `type_name::<Self>()::name` for methods with a receiver.
///
/// # Parameter attributes
///
/// - `#[crumb(skip)]` - do not record this parameter.
/// - `#[crumb(default = expr)]` - on an `Option<T>` parameter: `None` becomes
///   `expr`, the body sees a plain `T`, and the effective value is recorded.
///
/// Every other parameter must implement `serde::Serialize`.
#[proc_macro_attribute]
pub fn aware(attr: TokenStream, item: TokenStream) -> TokenStream {
    aware::aware_impl(attr, item)
}
