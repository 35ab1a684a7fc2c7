//! Variables embedded in configuration values
//!
//! `env('NAME')` and `prop('NAME', 'default')` are looked up through a
//! [`VariableSource`]. Composite expressions join values with `+ - * /` and
//! are evaluated when the tree is written in resolving mode.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// Arithmetic operator of a composite expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Multiply,
    Divide,
    Add,
    Subtract,
}

impl Operation {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(Operation::Multiply),
            '/' => Some(Operation::Divide),
            '+' => Some(Operation::Add),
            '-' => Some(Operation::Subtract),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operation::Multiply => '*',
            Operation::Divide => '/',
            Operation::Add => '+',
            Operation::Subtract => '-',
        }
    }

    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
        }
    }
}

/// Operands and operators of a composite expression, in source order.
/// `values.len() == operations.len() + 1` once the expression is complete.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositeVariable {
    pub values: Vec<Value>,
    pub operations: Vec<Operation>,
}

impl CompositeVariable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operand followed by the operator that comes after it.
    pub fn push(&mut self, value: Value, operation: Operation) {
        self.values.push(value);
        self.operations.push(operation);
    }

    /// Append the trailing operand.
    pub fn finish(&mut self, value: Value) {
        self.values.push(value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Env {
        name: String,
        default: Option<String>,
    },
    Property {
        name: String,
        default: Option<String>,
    },
    Composite(CompositeVariable),
}

/// Lookup of environment variables and system-style properties.
pub trait VariableSource {
    fn env(&self, name: &str) -> Option<String>;
    fn property(&self, name: &str) -> Option<String>;
}

/// Reads `env(...)` from the process environment and `prop(...)` from a
/// property table supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ProcessVariables {
    properties: HashMap<String, String>,
}

impl ProcessVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }
}

impl VariableSource for ProcessVariables {
    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }
}

impl Variable {
    /// Evaluate the variable to a plain value.
    pub fn resolve(&self, source: &dyn VariableSource) -> Result<Value> {
        match self {
            Variable::Env { name, default } => Ok(source
                .env(name)
                .or_else(|| default.clone())
                .map(Value::Str)
                .unwrap_or(Value::Null)),
            Variable::Property { name, default } => Ok(source
                .property(name)
                .or_else(|| default.clone())
                .map(Value::Str)
                .unwrap_or(Value::Null)),
            Variable::Composite(composite) => composite.calculate(source),
        }
    }
}

impl CompositeVariable {
    pub fn calculate(&self, source: &dyn VariableSource) -> Result<Value> {
        let mut values = Vec::with_capacity(self.values.len());
        for value in &self.values {
            values.push(match value {
                Value::Variable(variable) => variable.resolve(source)?,
                other => other.clone(),
            });
        }
        if values.len() != self.operations.len() + 1 {
            return Err(Error::Evaluation(
                "Incomplete composite variable!".to_string(),
            ));
        }

        match values.first() {
            Some(Value::Str(_)) => {
                if self.operations.iter().any(|op| *op != Operation::Add) {
                    return Err(Error::Evaluation("Invalid operation for String!".to_string()));
                }
                let mut out = String::new();
                for value in &values {
                    match value {
                        Value::Null => {}
                        Value::Str(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                Ok(Value::Str(out))
            }
            Some(first) if first.is_number() => {
                let mut operations = self.operations.clone();
                for pass in [
                    Operation::Multiply,
                    Operation::Divide,
                    Operation::Add,
                    Operation::Subtract,
                ] {
                    let mut i = 0;
                    while i < operations.len() {
                        if operations[i] != pass {
                            i += 1;
                            continue;
                        }
                        let right = values.remove(i + 1);
                        let left = values.remove(i);
                        values.insert(i, apply(pass, &left, &right)?);
                        operations.remove(i);
                    }
                }
                values.pop().ok_or_else(|| {
                    Error::Evaluation("Cannot calculate composite variable!".to_string())
                })
            }
            _ => Err(Error::Evaluation(
                "Cannot calculate composite variable!".to_string(),
            )),
        }
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Number {
    fn rank(&self) -> u8 {
        match self {
            Number::Int(_) => 0,
            Number::Long(_) => 1,
            Number::Float(_) => 2,
            Number::Double(_) => 3,
        }
    }

    fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => f64::from(v),
            Number::Long(v) => v as f64,
            Number::Float(v) => f64::from(v),
            Number::Double(v) => v,
        }
    }

    fn as_i64(&self) -> i64 {
        match *self {
            Number::Int(v) => i64::from(v),
            Number::Long(v) => v,
            Number::Float(v) => v as i64,
            Number::Double(v) => v as i64,
        }
    }
}

fn to_number(operation: Operation, value: &Value) -> Result<Number> {
    match value {
        Value::Int(v) => Ok(Number::Int(*v)),
        Value::Long(v) => Ok(Number::Long(*v)),
        Value::Float(v) => Ok(Number::Float(*v)),
        Value::Double(v) => Ok(Number::Double(*v)),
        Value::Str(_) => Err(Error::Evaluation(format!(
            "Cannot {} a String",
            operation.verb()
        ))),
        other => Err(Error::Evaluation(format!(
            "Cannot {} value {}",
            operation.verb(),
            other
        ))),
    }
}

fn apply(operation: Operation, left: &Value, right: &Value) -> Result<Value> {
    let a = to_number(operation, left)?;
    let b = to_number(operation, right)?;
    let rank = a.rank().max(b.rank());

    if rank >= 2 {
        let (x, y) = (a.as_f64(), b.as_f64());
        let result = match operation {
            Operation::Multiply => x * y,
            Operation::Divide => x / y,
            Operation::Add => x + y,
            Operation::Subtract => x - y,
        };
        return Ok(if rank == 3 {
            Value::Double(result)
        } else {
            Value::Float(result as f32)
        });
    }

    let (x, y) = (a.as_i64(), b.as_i64());
    let result = match operation {
        Operation::Multiply => x.wrapping_mul(y),
        Operation::Divide => x
            .checked_div(y)
            .ok_or_else(|| Error::Evaluation("Division by zero".to_string()))?,
        Operation::Add => x.wrapping_add(y),
        Operation::Subtract => x.wrapping_sub(y),
    };
    Ok(if rank == 1 {
        Value::Long(result)
    } else {
        Value::Int(result as i32)
    })
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Env { name, default } => fmt_call(f, "env", name, default.as_deref()),
            Variable::Property { name, default } => fmt_call(f, "prop", name, default.as_deref()),
            Variable::Composite(composite) => {
                for (i, value) in composite.values.iter().enumerate() {
                    if i > 0 {
                        if let Some(op) = composite.operations.get(i - 1) {
                            write!(f, " {} ", op)?;
                        }
                    }
                    match value {
                        Value::Str(s) => write!(f, "'{}'", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn fmt_call(
    f: &mut fmt::Formatter<'_>,
    function: &str,
    name: &str,
    default: Option<&str>,
) -> fmt::Result {
    match default {
        Some(default) => write!(f, "{}('{}', '{}')", function, name, default),
        None => write!(f, "{}('{}')", function, name),
    }
}
