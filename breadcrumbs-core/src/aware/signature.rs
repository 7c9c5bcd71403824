//! Declared parameters and argument binding for the runtime [`Aware`](super::Aware) wrapper.
//!
//! Binding follows the usual positional-then-keyword rules: positional values
//! fill parameters in declaration order, keywords fill by name, and anything
//! still unfilled takes its default or fails.

use serde::de::DeserializeOwned;
use std::fmt;

use crate::crumb::{Field, Fields};
use crate::error::CrumbError;
use crate::trail::TrailCapable;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Field>,
}

/// Name and parameter list of a wrapped function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    /// `name` becomes the title of every crumb recorded for this function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Field>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub(crate) fn validate(&self) -> Result<(), CrumbError> {
        for (i, param) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|p| p.name == param.name) {
                return Err(CrumbError::DuplicateParameter {
                    function: self.name.clone(),
                    name: param.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Match `args` against the declared parameters, applying defaults.
    pub fn bind<'a>(&self, args: CallArgs<'a>) -> Result<BoundArgs<'a>, CrumbError> {
        let CallArgs {
            positional,
            keywords,
        } = args;

        if positional.len() > self.params.len() {
            return Err(CrumbError::TooManyPositional {
                function: self.name.clone(),
                expected: self.params.len(),
                given: positional.len(),
            });
        }

        let mut slots: Vec<Option<ArgValue<'a>>> = self.params.iter().map(|_| None).collect();
        for (slot, value) in slots.iter_mut().zip(positional) {
            *slot = Some(value);
        }

        for (name, value) in keywords {
            let Some(index) = self.params.iter().position(|p| p.name == name) else {
                return Err(CrumbError::UnexpectedKeyword {
                    function: self.name.clone(),
                    name,
                });
            };
            if slots[index].is_some() {
                return Err(CrumbError::MultipleValues {
                    function: self.name.clone(),
                    name,
                });
            }
            slots[index] = Some(value);
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = match (slot, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => ArgValue::Field(default.clone()),
                (None, None) => {
                    return Err(CrumbError::MissingArgument {
                        function: self.name.clone(),
                        name: param.name.clone(),
                    })
                }
            };
            values.push((param.name.clone(), value));
        }

        Ok(BoundArgs { values })
    }
}

/// A value passed for one parameter.
#[derive(Clone)]
pub enum ArgValue<'a> {
    Field(Field),
    Target(&'a dyn TrailCapable),
}

impl fmt::Debug for ArgValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Field(field) => f.debug_tuple("Field").field(field).finish(),
            ArgValue::Target(_) => f.write_str("Target(..)"),
        }
    }
}

/// Arguments of one call, as the caller supplied them.
#[derive(Debug, Default, Clone)]
pub struct CallArgs<'a> {
    positional: Vec<ArgValue<'a>>,
    keywords: Vec<(String, ArgValue<'a>)>,
}

impl<'a> CallArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Field>) -> Self {
        self.positional.push(ArgValue::Field(value.into()));
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.keywords
            .push((name.into(), ArgValue::Field(value.into())));
        self
    }

    /// Positional trail target.
    pub fn target(mut self, target: &'a dyn TrailCapable) -> Self {
        self.positional.push(ArgValue::Target(target));
        self
    }

    /// Trail target passed by name.
    pub fn target_kw(mut self, name: impl Into<String>, target: &'a dyn TrailCapable) -> Self {
        self.keywords.push((name.into(), ArgValue::Target(target)));
        self
    }
}

/// Arguments after binding, in declaration order, with defaults applied.
///
/// The wrapped body reads its real, unredacted values from here.
#[derive(Debug, Clone)]
pub struct BoundArgs<'a> {
    values: Vec<(String, ArgValue<'a>)>,
}

impl<'a> BoundArgs<'a> {
    pub fn value(&self, name: &str) -> Option<&ArgValue<'a>> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.value(name)? {
            ArgValue::Field(field) => Some(field),
            ArgValue::Target(_) => None,
        }
    }

    pub fn target(&self, name: &str) -> Option<&'a dyn TrailCapable> {
        match self.value(name)? {
            ArgValue::Target(target) => Some(*target),
            ArgValue::Field(_) => None,
        }
    }

    /// Read a bound value as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CrumbError> {
        let value = self
            .field(name)
            .and_then(Field::as_value)
            .ok_or_else(|| CrumbError::UnknownArgument { name: name.into() })?;
        serde_json::from_value(value.clone()).map_err(|source| CrumbError::Deserialize {
            name: name.into(),
            source,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    /// Independent copy of every plain value, keyed by parameter name.
    pub(crate) fn snapshot(&self, function: &str, skip: Option<&str>) -> Result<Fields, CrumbError> {
        let mut out = Fields::new();
        for (name, value) in &self.values {
            if Some(name.as_str()) == skip {
                continue;
            }
            match value {
                ArgValue::Field(field) => {
                    out.insert(name.clone(), field.clone());
                }
                ArgValue::Target(_) => {
                    return Err(CrumbError::UnexpectedTarget {
                        function: function.into(),
                        name: name.clone(),
                    })
                }
            }
        }
        Ok(out)
    }
}
