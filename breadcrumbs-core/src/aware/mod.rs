//! Call annotation: record every call of a function as a child crumb.
//!
//! Two front-ends drive the same [`Invocation`] engine:
//!
//! - the `#[aware]` attribute, for ordinary Rust functions, which reads the
//!   parameter list at compile time and captures values with `serde`;
//! - [`Aware`], a runtime wrapper around an explicit [`Signature`], for callers
//!   that pass arguments as structured values.
//!
//! ## Per-call flow
//!
//! ```text
//! bind args ──> snapshot (minus trail param) ──> redact ──> Crumb{title, info}
//!                                                              │
//!          caller context  <── attach (policy) <── body runs with crumb active
//! ```

pub mod invocation;
pub mod signature;

pub use invocation::{CapturedArgs, Completed, Invocation};
pub use signature::{ArgValue, BoundArgs, CallArgs, Param, Signature};

#[doc(hidden)]
pub use invocation::expect_output;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CrumbError;
use crate::trail::TrailCapable;

// ============================================================================
// Configuration
// ============================================================================

/// What happens to the crumb of a call that returned `Err`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachPolicy {
    /// Only successful calls are attached.
    #[default]
    OnSuccess,
    /// Failed calls are attached too, with the error text in `extra["error"]`.
    Always,
}

/// One parameter name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RedactParams {
    One(String),
    Many(Vec<String>),
}

impl RedactParams {
    pub fn names(&self) -> Vec<&str> {
        match self {
            RedactParams::One(name) => vec![name.as_str()],
            RedactParams::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

impl Default for RedactParams {
    fn default() -> Self {
        RedactParams::Many(Vec::new())
    }
}

impl From<&str> for RedactParams {
    fn from(name: &str) -> Self {
        RedactParams::One(name.to_string())
    }
}

impl From<String> for RedactParams {
    fn from(name: String) -> Self {
        RedactParams::One(name)
    }
}

impl From<Vec<String>> for RedactParams {
    fn from(names: Vec<String>) -> Self {
        RedactParams::Many(names)
    }
}

impl From<Vec<&str>> for RedactParams {
    fn from(names: Vec<&str>) -> Self {
        RedactParams::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for RedactParams {
    fn from(names: &[&str]) -> Self {
        RedactParams::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RedactParams {
    fn from(names: [&str; N]) -> Self {
        RedactParams::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Settings for an annotated function.
///
/// Deserializes from the same shape hosts keep in their own config files:
///
/// ```json
/// { "trail_param": "job", "redact_params": ["token"], "attach": "always" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwareConfig {
    /// Parameter holding the trail owner; `None` means the caller's active crumb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_param: Option<String>,

    /// Parameters recorded as `REDACTED`.
    pub redact_params: RedactParams,

    pub attach: AttachPolicy,
}

// ============================================================================
// Runtime wrapper
// ============================================================================

/// A function signature plus the settings for recording its calls.
///
/// ```ignore
/// let sum = Aware::builder(
///     Signature::new("pipeline::sum")
///         .param("c")
///         .param("a")
///         .param_with_default("b", json!(1)),
/// )
/// .trail_param("c")
/// .redact_params("a")
/// .build()?;
///
/// let total = sum.call(CallArgs::new().target(&run).arg(json!(1)), |args| {
///     args.get::<i64>("a").unwrap() + args.get::<i64>("b").unwrap()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct Aware {
    signature: Signature,
    config: AwareConfig,
}

impl Aware {
    /// Check `config` against `signature` and build the wrapper.
    pub fn new(signature: Signature, config: AwareConfig) -> Result<Self, CrumbError> {
        signature.validate()?;
        let function = signature.name().to_string();

        if let Some(trail) = &config.trail_param {
            if !signature.has_param(trail) {
                return Err(CrumbError::UnknownParameter {
                    function,
                    name: trail.clone(),
                });
            }
        }
        for name in config.redact_params.names() {
            if !signature.has_param(name) {
                return Err(CrumbError::UnknownParameter {
                    function,
                    name: name.to_string(),
                });
            }
            if config.trail_param.as_deref() == Some(name) {
                return Err(CrumbError::RedactedTrailParam {
                    function,
                    name: name.to_string(),
                });
            }
        }

        Ok(Self { signature, config })
    }

    pub fn builder(signature: Signature) -> AwareBuilder {
        AwareBuilder {
            signature,
            config: AwareConfig::default(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn config(&self) -> &AwareConfig {
        &self.config
    }

    /// Call an infallible body, recording the call.
    ///
    /// Binding and trail lookup errors are returned before the body runs and
    /// before any crumb exists.
    pub fn call<'a, R>(
        &self,
        args: CallArgs<'a>,
        body: impl FnOnce(&BoundArgs<'a>) -> R,
    ) -> Result<R, CrumbError> {
        let Prepared {
            bound,
            target,
            invocation,
        } = self.prepare(args)?;
        let completed = invocation.run(|| body(&bound));
        Ok(match target {
            Some(target) => completed.attach_to(target),
            None => completed.attach_ambient(),
        })
    }

    /// Call a fallible body; its `Err` is settled by the attach policy and
    /// returned unchanged.
    pub fn try_call<'a, T, E>(
        &self,
        args: CallArgs<'a>,
        body: impl FnOnce(&BoundArgs<'a>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<CrumbError> + fmt::Debug,
    {
        let Prepared {
            bound,
            target,
            invocation,
        } = self.prepare(args)?;
        let completed = invocation.run_fallible(|| body(&bound));
        match target {
            Some(target) => completed.attach_to(target),
            None => completed.attach_ambient(),
        }
    }

    fn prepare<'a>(&self, args: CallArgs<'a>) -> Result<Prepared<'a>, CrumbError> {
        let function = self.signature.name();
        let bound = self.signature.bind(args)?;

        let trail_param = self.config.trail_param.as_deref();
        let target = match trail_param {
            // `Aware::new` checked the name, so binding always fills it.
            Some(name) => match bound.target(name) {
                Some(target) => Some(target),
                None => {
                    return Err(CrumbError::TrailParamNotTarget {
                        function: function.to_string(),
                        name: name.to_string(),
                    })
                }
            },
            None => None,
        };

        let mut captured = CapturedArgs::from_fields(bound.snapshot(function, trail_param)?);
        for name in self.config.redact_params.names() {
            captured.redact(name);
        }

        Ok(Prepared {
            invocation: Invocation::new(function, captured, self.config.attach),
            bound,
            target,
        })
    }
}

struct Prepared<'a> {
    bound: BoundArgs<'a>,
    target: Option<&'a dyn TrailCapable>,
    invocation: Invocation,
}

/// Fluent construction of an [`Aware`].
#[derive(Debug, Clone)]
pub struct AwareBuilder {
    signature: Signature,
    config: AwareConfig,
}

impl AwareBuilder {
    pub fn trail_param(mut self, name: impl Into<String>) -> Self {
        self.config.trail_param = Some(name.into());
        self
    }

    pub fn redact_params(mut self, names: impl Into<RedactParams>) -> Self {
        self.config.redact_params = names.into();
        self
    }

    pub fn attach(mut self, policy: AttachPolicy) -> Self {
        self.config.attach = policy;
        self
    }

    pub fn build(self) -> Result<Aware, CrumbError> {
        Aware::new(self.signature, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sum_signature() -> Signature {
        Signature::new("tests::sum")
            .param("c")
            .param("a")
            .param_with_default("b", json!(1))
    }

    #[test]
    fn test_config_from_json_single_redact_name() {
        let config: AwareConfig =
            serde_json::from_value(json!({"trail_param": "c", "redact_params": "a"})).unwrap();

        assert_eq!(config.trail_param.as_deref(), Some("c"));
        assert_eq!(config.redact_params, RedactParams::One("a".into()));
        assert_eq!(config.attach, AttachPolicy::OnSuccess);
    }

    #[test]
    fn test_config_from_json_redact_list_and_policy() {
        let config: AwareConfig = serde_json::from_value(json!({
            "redact_params": ["a", "b"],
            "attach": "always"
        }))
        .unwrap();

        assert_eq!(config.trail_param, None);
        assert_eq!(config.redact_params.names(), vec!["a", "b"]);
        assert_eq!(config.attach, AttachPolicy::Always);
    }

    #[test]
    fn test_redact_params_conversions() {
        assert!(RedactParams::from("a").contains("a"));
        assert!(RedactParams::from(["a", "b"]).contains("b"));
        assert!(RedactParams::from(vec!["x"]).contains("x"));
        assert!(!RedactParams::default().contains("a"));
    }

    #[test]
    fn test_builder_validates_parameter_names() {
        let err = Aware::builder(sum_signature())
            .trail_param("missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, CrumbError::UnknownParameter { ref name, .. } if name == "missing"));

        let err = Aware::builder(sum_signature())
            .redact_params("zzz")
            .build()
            .unwrap_err();
        assert!(matches!(err, CrumbError::UnknownParameter { .. }));

        let err = Aware::builder(sum_signature())
            .trail_param("c")
            .redact_params("c")
            .build()
            .unwrap_err();
        assert!(matches!(err, CrumbError::RedactedTrailParam { .. }));
    }

    #[test]
    fn test_trail_param_bound_to_plain_value() {
        let sum = Aware::builder(sum_signature())
            .trail_param("c")
            .build()
            .unwrap();

        let err = sum
            .call(CallArgs::new().arg(json!("not a trail")).arg(json!(1)), |_| ())
            .unwrap_err();
        assert!(matches!(err, CrumbError::TrailParamNotTarget { .. }));

        let err = sum
            .call(
                CallArgs::new().kwarg("c", json!(0)).kwarg("a", json!(1)),
                |_| (),
            )
            .unwrap_err();
        assert!(matches!(err, CrumbError::TrailParamNotTarget { ref name, .. } if name == "c"));
        assert!(!err.is_binding_error());
    }
}
