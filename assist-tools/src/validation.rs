//! Declarative parameter rules and the validator that enforces them.
//!
//! A [`ParameterRule`] is what a tool author writes; [`ParameterRule::resolve`]
//! turns it into an immutable [`ParameterSpec`] with its type and required
//! flag settled and its pattern compiled. Validation then walks the specs in
//! declaration order and stops at the first failed rule.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Bound, PluginError, ToolResult, Violation};

/// Parameter name reported when the argument payload itself is malformed.
pub const ARGUMENTS_PARAMETER: &str = "<arguments>";

/// Semantic type of a tool parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Accepts every non-null value.
    Any,
}

impl ParamType {
    /// Infers the type of a JSON value, as used for default values.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
            Value::Null => Self::Any,
        }
    }

    /// Returns `true` when `value` satisfies this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    /// Returns `true` for [`ParamType::Integer`] and [`ParamType::Number`].
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    /// Returns the lowercase name used in messages and JSON schemas.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the JSON type name of a runtime value.
#[must_use]
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Named custom check attached to a parameter.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    check: fn(&Value) -> bool,
    message: String,
}

impl Predicate {
    /// Creates a predicate; `message` is reported verbatim when `check` fails.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        check: fn(&Value) -> bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            check,
            message: message.into(),
        }
    }

    /// Returns the predicate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn test(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Rules declared for one parameter, before resolution.
#[derive(Clone, Debug, Default)]
pub struct ParameterRule {
    param_type: Option<ParamType>,
    required: Option<bool>,
    default: Option<Value>,
    description: Option<String>,
    pattern: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    allowed: Option<Vec<Value>>,
    custom: Option<Predicate>,
}

impl ParameterRule {
    /// Creates an empty rule whose type is inferred at resolution.
    #[must_use]
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Rule for a string parameter.
    #[must_use]
    pub fn string() -> Self {
        Self::new().with_type(ParamType::String)
    }

    /// Rule for an integer parameter.
    #[must_use]
    pub fn integer() -> Self {
        Self::new().with_type(ParamType::Integer)
    }

    /// Rule for a numeric parameter.
    #[must_use]
    pub fn number() -> Self {
        Self::new().with_type(ParamType::Number)
    }

    /// Rule for a boolean parameter.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new().with_type(ParamType::Boolean)
    }

    /// Rule for an array parameter.
    #[must_use]
    pub fn array() -> Self {
        Self::new().with_type(ParamType::Array)
    }

    /// Rule for an object parameter.
    #[must_use]
    pub fn object() -> Self {
        Self::new().with_type(ParamType::Object)
    }

    /// Declares the parameter type explicitly.
    #[must_use]
    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    /// Marks the parameter as required regardless of any default.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    /// Marks the parameter as optional even without a default.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    /// Sets the default value, which also makes the parameter optional.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description shown to the model.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Requires string values to match `pattern` from their first character.
    #[must_use]
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Sets both inclusive bounds.
    #[must_use]
    pub fn range(self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.min(min).max(max)
    }

    /// Restricts values to the supplied set.
    #[must_use]
    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Attaches a named custom predicate.
    #[must_use]
    pub fn custom(mut self, predicate: Predicate) -> Self {
        self.custom = Some(predicate);
        self
    }

    /// Settles the type and required flag and compiles the pattern.
    ///
    /// The type comes from the explicit declaration, then the default value,
    /// then the kind of constraint attached (pattern implies string, range
    /// implies number). A parameter is required unless it has a default or
    /// was marked optional.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSpec`] when the rules contradict each
    /// other or the pattern does not compile.
    pub fn resolve(self, name: impl Into<String>) -> ToolResult<ParameterSpec> {
        let name = name.into();
        let invalid = |reason: String| PluginError::invalid_spec(format!("parameter `{name}`: {reason}"));

        if name.trim().is_empty() {
            return Err(PluginError::invalid_spec("parameter name cannot be empty"));
        }

        let param_type = self
            .param_type
            .or_else(|| self.default.as_ref().map(ParamType::of))
            .unwrap_or(if self.pattern.is_some() {
                ParamType::String
            } else if self.min.is_some() || self.max.is_some() {
                ParamType::Number
            } else {
                ParamType::Any
            });

        if self.pattern.is_some() && param_type != ParamType::String {
            return Err(invalid(format!(
                "regex applies to string parameters, not {param_type}"
            )));
        }
        if (self.min.is_some() || self.max.is_some()) && !param_type.is_numeric() {
            return Err(invalid(format!(
                "range applies to numeric parameters, not {param_type}"
            )));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(invalid(format!("min {min} is greater than max {max}")));
            }
        }
        if self.allowed.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid("allowed values cannot be empty".into()));
        }

        let regex = match &self.pattern {
            Some(pattern) => Some(
                Regex::new(&format!("^(?:{pattern})"))
                    .map_err(|err| invalid(format!("invalid regex `{pattern}`: {err}")))?,
            ),
            None => None,
        };

        let required = self.required.unwrap_or(self.default.is_none());
        let spec = ParameterSpec {
            name,
            param_type,
            required,
            default: self.default,
            description: self.description,
            pattern: self.pattern,
            regex,
            min: self.min,
            max: self.max,
            allowed: self.allowed,
            custom: self.custom,
        };

        if let Some(default) = &spec.default {
            spec.check(Some(default)).map_err(|violation| {
                PluginError::invalid_spec(format!(
                    "parameter `{}`: default value rejected: {violation}",
                    spec.name
                ))
            })?;
        }

        Ok(spec)
    }
}

/// Resolved, immutable rules for one parameter.
#[derive(Clone, Debug)]
pub struct ParameterSpec {
    name: String,
    param_type: ParamType,
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    pattern: Option<String>,
    regex: Option<Regex>,
    min: Option<f64>,
    max: Option<f64>,
    allowed: Option<Vec<Value>>,
    custom: Option<Predicate>,
}

impl ParameterSpec {
    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved type.
    #[must_use]
    pub const fn param_type(&self) -> ParamType {
        self.param_type
    }

    /// Returns whether the parameter must be supplied.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the pattern as declared.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Returns the inclusive bounds.
    #[must_use]
    pub const fn range(&self) -> (Option<f64>, Option<f64>) {
        (self.min, self.max)
    }

    /// Returns the allowed value set, if any.
    #[must_use]
    pub fn allowed_values(&self) -> Option<&[Value]> {
        self.allowed.as_deref()
    }

    /// Returns the custom predicate, if any.
    #[must_use]
    pub fn predicate(&self) -> Option<&Predicate> {
        self.custom.as_ref()
    }

    /// Checks one argument against every rule, in fixed order.
    ///
    /// `None` and JSON `null` both count as absent.
    ///
    /// # Errors
    ///
    /// Returns the first [`Violation`] encountered.
    pub fn check(&self, value: Option<&Value>) -> Result<(), Violation> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return if self.required {
                Err(Violation::Missing)
            } else {
                Ok(())
            };
        };

        if !self.param_type.matches(value) {
            return Err(Violation::TypeMismatch {
                expected: self.param_type,
                actual: value_type_name(value),
            });
        }

        if let (Some(regex), Some(text)) = (&self.regex, value.as_str()) {
            if !regex.is_match(text) {
                return Err(Violation::PatternMismatch {
                    pattern: self.pattern.clone().unwrap_or_default(),
                    value: text.to_owned(),
                });
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(min) = self.min.filter(|min| number < *min) {
                return Err(Violation::RangeViolation {
                    bound: Bound::Min,
                    limit: min,
                    value: number,
                });
            }
            if let Some(max) = self.max.filter(|max| number > *max) {
                return Err(Violation::RangeViolation {
                    bound: Bound::Max,
                    limit: max,
                    value: number,
                });
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|choice| same_choice(choice, value)) {
                return Err(Violation::InvalidChoice {
                    value: value.clone(),
                    allowed: allowed.clone(),
                });
            }
        }

        if let Some(predicate) = &self.custom {
            if !predicate.test(value) {
                return Err(Violation::CustomValidationFailure {
                    predicate: predicate.name.clone(),
                    message: predicate.message.clone(),
                });
            }
        }

        Ok(())
    }

    /// Renders this parameter as a JSON-schema property.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        if self.param_type != ParamType::Any {
            schema.insert("type".into(), json!(self.param_type.as_str()));
        }
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(pattern) = &self.pattern {
            schema.insert("pattern".into(), json!(pattern));
        }
        if let Some(min) = self.min {
            schema.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.max {
            schema.insert("maximum".into(), json!(max));
        }
        if let Some(allowed) = &self.allowed {
            schema.insert("enum".into(), Value::Array(allowed.clone()));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Numbers compare by value so `1.0` matches an allowed `1`.
#[allow(clippy::float_cmp)]
fn same_choice(choice: &Value, value: &Value) -> bool {
    match (choice.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => choice == value,
    }
}

/// Validates call arguments against a tool's parameters in declaration order.
///
/// `null` arguments are treated as an empty object. Undeclared keys are
/// ignored here.
///
/// # Errors
///
/// Returns [`PluginError::Validation`] for the first failed rule, or for a
/// payload that is not a JSON object.
pub fn validate_arguments(tool: &str, params: &[ParameterSpec], args: &Value) -> ToolResult<()> {
    let empty = Map::new();
    let object = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(PluginError::validation(
                tool,
                ARGUMENTS_PARAMETER,
                Violation::TypeMismatch {
                    expected: ParamType::Object,
                    actual: value_type_name(other),
                },
            ));
        }
    };

    for param in params {
        param
            .check(object.get(param.name()))
            .map_err(|violation| PluginError::validation(tool, param.name(), violation))?;
    }

    Ok(())
}
