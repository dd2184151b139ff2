//! Plan model: the declarative ordered script of simulation steps.
//!
//! Plans deserialize from JSON or YAML; the format is detected by whichever
//! parse succeeds (JSON attempted first).

use crate::error::SimulatorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Method selector for a deploy step. Any other method string names the
/// exported guest function to invoke.
pub const PROGRAM_CREATE: &str = "program_create";

/// A named, ordered list of steps plus the runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Name of the simulation.
    pub name: String,
    /// Description of the simulation.
    #[serde(default)]
    pub description: String,
    /// Key of the caller to use for all steps.
    #[serde(default)]
    pub caller_key: Option<String>,
    /// Runtime configuration.
    #[serde(default)]
    pub config: PlanConfig,
    /// Steps to perform during simulation.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Plan-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Maximum number of pages of memory that can be used.
    /// Each page represents 64KiB of memory.
    #[serde(default)]
    pub max_memory_pages: Option<u64>,
}

/// A single driver action: key op, deploy, or program call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Which executor handles the step.
    pub endpoint: Endpoint,
    /// Method selector: `program_create` deploys, anything else is the
    /// guest function to call. Unused for key steps.
    #[serde(default)]
    pub method: Option<String>,
    /// Typed parameters for the step.
    #[serde(default)]
    pub params: Vec<Parameter>,
    /// Post-conditions asserted against the step outcome.
    #[serde(default)]
    pub require: Option<Require>,
    /// Description of the step.
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Named-key creation.
    Key,
    /// Program deploys and calls that commit state on success.
    Execute,
    /// Program calls that never commit.
    ReadOnly,
    /// Anything else; rejected by the driver rather than the parser.
    Unknown,
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(match text.as_str() {
            "key" => Endpoint::Key,
            "execute" => Endpoint::Execute,
            "readonly" => Endpoint::ReadOnly,
            _ => Endpoint::Unknown,
        })
    }
}

/// A typed step parameter. The declared type stays a raw string at parse
/// time and is checked only when the parameter is decoded for a call, so
/// a plan with a malformed parameter still runs and commits every step
/// before the offending one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Parameter {
    /// Decode the raw value against the declared type. An unrecognized
    /// type is `InvalidParamType`; a value that does not match its
    /// declared type is `FailedParamTypeCast`.
    pub fn decode(&self) -> Result<ParamValue, SimulatorError> {
        match self.param_type.as_str() {
            "string" => self.string_value().map(ParamValue::String),
            "bool" => self
                .value
                .as_bool()
                .map(ParamValue::Bool)
                .ok_or_else(|| self.cast_error()),
            "id" => self.string_value().map(ParamValue::Id),
            "key-ed25519" | "key" => self.string_value().map(ParamValue::Key),
            "u64" | "uint64" => self.u64_value().map(ParamValue::U64),
            _ => Err(SimulatorError::InvalidParamType(self.param_type.clone())),
        }
    }

    fn string_value(&self) -> Result<String, SimulatorError> {
        self.value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.cast_error())
    }

    /// Numbers may arrive as floating-point; lossy narrowing is rejected.
    fn u64_value(&self) -> Result<u64, SimulatorError> {
        if let Some(value) = self.value.as_u64() {
            return Ok(value);
        }
        match self.value.as_f64() {
            Some(v) if v >= 0.0 && v <= u64::MAX as f64 && v.fract() == 0.0 => Ok(v as u64),
            _ => Err(self.cast_error()),
        }
    }

    fn cast_error(&self) -> SimulatorError {
        SimulatorError::FailedParamTypeCast(self.param_type.clone())
    }
}

/// A parameter decoded against its declared type.
#[derive(Debug, Clone)]
pub enum ParamValue {
    String(String),
    Bool(bool),
    Id(String),
    Key(String),
    U64(u64),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::String(_) => "string",
            ParamValue::Bool(_) => "bool",
            ParamValue::Id(_) => "id",
            ParamValue::Key(_) => "key-ed25519",
            ParamValue::U64(_) => "u64",
        }
    }
}

/// Post-conditions on a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Require {
    /// Assertion against the first returned value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Assertion>,
    /// Assertion against the fuel balance after the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Assertion>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Assertion {
    /// Comparison operator.
    pub operator: Operator,
    /// Value compared against the actual result.
    pub operand: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "==")]
    EqualTo,
    #[serde(rename = "!=")]
    NotEqualTo,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThanOrEqual => "<=",
            Operator::EqualTo => "==",
            Operator::NotEqualTo => "!=",
        };
        f.write_str(symbol)
    }
}

/// Validate the assertion against the actual value.
pub fn validate_assertion(actual: u64, assertion: &Assertion) -> bool {
    let operand = assertion.operand;
    match assertion.operator {
        Operator::GreaterThan => actual > operand,
        Operator::LessThan => actual < operand,
        Operator::GreaterThanOrEqual => actual >= operand,
        Operator::LessThanOrEqual => actual <= operand,
        Operator::EqualTo => actual == operand,
        Operator::NotEqualTo => actual != operand,
    }
}

/// Parse a plan from raw bytes: JSON attempted first, then YAML.
pub fn unmarshal_plan(bytes: &[u8]) -> Result<Plan, SimulatorError> {
    if let Ok(plan) = serde_json::from_slice::<Plan>(bytes) {
        return Ok(plan);
    }
    if let Ok(plan) = serde_yaml::from_slice::<Plan>(bytes) {
        return Ok(plan);
    }
    Err(SimulatorError::InvalidConfigFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_PLAN: &str = r#"
    {
        "name": "counter demo",
        "description": "deploy and bump a counter",
        "caller_key": "alice",
        "config": {"max_memory_pages": 18},
        "steps": [
            {
                "endpoint": "key",
                "params": [{"type": "string", "value": "alice"}]
            },
            {
                "endpoint": "execute",
                "method": "program_create",
                "params": [{"type": "string", "value": "counter.wasm"}]
            },
            {
                "endpoint": "execute",
                "method": "inc",
                "params": [
                    {"type": "id", "value": "step_1"},
                    {"type": "u64", "value": 100000},
                    {"type": "u64", "value": 10}
                ],
                "require": {"result": {"operator": "==", "operand": 10}}
            }
        ]
    }
    "#;

    #[test]
    fn test_json_plan_parses() {
        let plan = unmarshal_plan(JSON_PLAN.as_bytes()).unwrap();
        assert_eq!(plan.name, "counter demo");
        assert_eq!(plan.config.max_memory_pages, Some(18));
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].endpoint, Endpoint::Key);
        assert_eq!(plan.steps[1].method.as_deref(), Some(PROGRAM_CREATE));

        let require = plan.steps[2].require.as_ref().unwrap();
        let result = require.result.unwrap();
        assert_eq!(result.operator, Operator::EqualTo);
        assert_eq!(result.operand, 10);
    }

    #[test]
    fn test_yaml_plan_parses() {
        let yaml = r#"
name: yaml demo
config:
  max_memory_pages: 2
steps:
  - endpoint: readonly
    method: value
    params:
      - type: id
        value: step_0
      - type: uint64
        value: 5000
    require:
      balance:
        operator: ">"
        operand: 0
"#;
        let plan = unmarshal_plan(yaml.as_bytes()).unwrap();
        assert_eq!(plan.name, "yaml demo");
        assert_eq!(plan.steps[0].endpoint, Endpoint::ReadOnly);
        // uint64 alias accepted
        assert!(matches!(
            plan.steps[0].params[1].decode().unwrap(),
            ParamValue::U64(5000)
        ));
    }

    #[test]
    fn test_neither_format_rejected() {
        assert!(matches!(
            unmarshal_plan(b"{{{{not a plan"),
            Err(SimulatorError::InvalidConfigFormat)
        ));
    }

    #[test]
    fn test_float_narrowing() {
        let json = r#"
        {
            "name": "narrow",
            "steps": [
                {"endpoint": "execute", "method": "f",
                 "params": [{"type": "u64", "value": 1000000.0}]}
            ]
        }
        "#;
        let plan = unmarshal_plan(json.as_bytes()).unwrap();
        assert!(matches!(
            plan.steps[0].params[0].decode().unwrap(),
            ParamValue::U64(1_000_000)
        ));
    }

    #[test]
    fn test_lossy_float_rejected_at_decode() {
        let json = r#"
        {
            "name": "narrow",
            "steps": [
                {"endpoint": "execute", "method": "f",
                 "params": [{"type": "u64", "value": 10.5}]}
            ]
        }
        "#;
        // the plan itself parses; the bad value fails its own step
        let plan = unmarshal_plan(json.as_bytes()).unwrap();
        assert!(matches!(
            plan.steps[0].params[0].decode(),
            Err(SimulatorError::FailedParamTypeCast(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected_at_decode() {
        let json = r#"
        {
            "name": "odd type",
            "steps": [
                {"endpoint": "execute", "method": "f",
                 "params": [{"type": "float32", "value": 3}]}
            ]
        }
        "#;
        let plan = unmarshal_plan(json.as_bytes()).unwrap();
        assert!(matches!(
            plan.steps[0].params[0].decode(),
            Err(SimulatorError::InvalidParamType(t)) if t == "float32"
        ));
    }

    #[test]
    fn test_key_alias() {
        let json = r#"
        {
            "name": "keys",
            "steps": [
                {"endpoint": "execute", "method": "f",
                 "params": [{"type": "key", "value": "alice"},
                            {"type": "key-ed25519", "value": "bob"}]}
            ]
        }
        "#;
        let plan = unmarshal_plan(json.as_bytes()).unwrap();
        assert!(
            matches!(plan.steps[0].params[0].decode().unwrap(), ParamValue::Key(name) if name == "alice")
        );
        assert!(
            matches!(plan.steps[0].params[1].decode().unwrap(), ParamValue::Key(name) if name == "bob")
        );
    }

    #[test]
    fn test_unknown_endpoint_parses_as_unknown() {
        let json = r#"
        {"name": "x", "steps": [{"endpoint": "teleport"}]}
        "#;
        let plan = unmarshal_plan(json.as_bytes()).unwrap();
        assert_eq!(plan.steps[0].endpoint, Endpoint::Unknown);
    }

    // operator completeness: validate(x, {op, y}) matches the operator's
    // mathematical meaning for all six operators
    #[test]
    fn test_assertion_completeness() {
        let cases: &[(Operator, fn(u64, u64) -> bool)] = &[
            (Operator::GreaterThan, |a, b| a > b),
            (Operator::LessThan, |a, b| a < b),
            (Operator::GreaterThanOrEqual, |a, b| a >= b),
            (Operator::LessThanOrEqual, |a, b| a <= b),
            (Operator::EqualTo, |a, b| a == b),
            (Operator::NotEqualTo, |a, b| a != b),
        ];

        for (operator, expected) in cases {
            for actual in [0u64, 1, 99, 100, 101, u64::MAX] {
                for operand in [0u64, 100, u64::MAX] {
                    let assertion = Assertion {
                        operator: *operator,
                        operand,
                    };
                    assert_eq!(
                        validate_assertion(actual, &assertion),
                        expected(actual, operand),
                        "{} {} {}",
                        actual,
                        operator,
                        operand
                    );
                }
            }
        }
    }
}
