//! Expression evaluation against an [`EvalContext`].

use std::collections::BTreeMap;

use super::functions::{Function, FunctionError};
use super::syntax::{BinaryOp, Expr, ObjectKey, TemplatePart, UnaryOp};
use crate::value::{Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unknown variable {0:?}")]
    UnknownVariable(String),
    #[error("call to unknown function {0:?}")]
    UnknownFunction(String),
    #[error("{name}(): {source}")]
    Function {
        name: String,
        #[source]
        source: FunctionError,
    },
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    Operands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("{0}")]
    Type(String),
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("division by zero")]
    DivisionByZero,
}

/// Functions and variables visible while evaluating configuration.
#[derive(Clone, Default)]
pub struct EvalContext {
    functions: BTreeMap<String, Function>,
    variables: BTreeMap<String, Value>,
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("variables", &self.variables)
            .finish()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_function(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), function);
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Expr::Template(parts) => self.eval_template(parts),
            Expr::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(&args).map_err(|source| EvalError::Function {
                    name: name.clone(),
                    source,
                })
            }
            Expr::Tuple(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Object(items) => {
                let mut map = BTreeMap::new();
                for (key, value) in items {
                    let key = match key {
                        ObjectKey::Name(name) => name.clone(),
                        ObjectKey::Expr(expr) => match self.eval(expr)? {
                            Value::String(s) => s,
                            Value::Number(n) => n.to_string(),
                            Value::Bool(b) => b.to_string(),
                            other => {
                                return Err(EvalError::Type(format!(
                                    "object key must be a string, found {}",
                                    other.type_name()
                                )))
                            }
                        },
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::GetAttr { target, name } => match self.eval(target)? {
                Value::Object(map) => map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::Type(format!("object has no attribute {name:?}"))),
                other => Err(EvalError::Type(format!(
                    "cannot access attribute {name:?} on {}",
                    other.type_name()
                ))),
            },
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match (op, v) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, v) => match to_number(&v) {
                        Some(Number::Int(i)) => i
                            .checked_neg()
                            .map(Value::int)
                            .ok_or(EvalError::Overflow("-")),
                        Some(Number::Float(f)) => Ok(Value::float(-f)),
                        None => Err(EvalError::Type(format!("cannot negate {}", v.type_name()))),
                    },
                    (UnaryOp::Not, v) => {
                        Err(EvalError::Type(format!("cannot apply ! to {}", v.type_name())))
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => match self.eval(cond)? {
                Value::Bool(true) => self.eval(then),
                Value::Bool(false) => self.eval(otherwise),
                other => Err(EvalError::Type(format!(
                    "condition must be bool, found {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn eval_template(&self, parts: &[TemplatePart]) -> Result<Value, EvalError> {
        // A lone interpolation keeps the type of its result.
        if let [TemplatePart::Interpolation(expr)] = parts {
            return self.eval(expr);
        }
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Interpolation(expr) => match self.eval(expr)? {
                    Value::String(s) => out.push_str(&s),
                    Value::Number(n) => out.push_str(&n.to_string()),
                    Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                    other => {
                        return Err(EvalError::Type(format!(
                            "cannot include {} in a string template",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok(Value::String(out))
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        // Logical operators short-circuit.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = self.eval(lhs)?;
            let Value::Bool(l) = left else {
                return Err(operands(op, &left, &Value::Bool(false)));
            };
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            return match self.eval(rhs)? {
                Value::Bool(r) => Ok(Value::Bool(r)),
                r => Err(operands(op, &Value::Bool(l), &r)),
            };
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => return Ok(Value::Bool(values_equal(&l, &r))),
            BinaryOp::Ne => return Ok(Value::Bool(!values_equal(&l, &r))),
            _ => {}
        }

        let (Some(a), Some(b)) = (to_number(&l), to_number(&r)) else {
            return Err(operands(op, &l, &r));
        };
        match op {
            BinaryOp::Lt => Ok(Value::Bool(a.as_f64() < b.as_f64())),
            BinaryOp::Le => Ok(Value::Bool(a.as_f64() <= b.as_f64())),
            BinaryOp::Gt => Ok(Value::Bool(a.as_f64() > b.as_f64())),
            BinaryOp::Ge => Ok(Value::Bool(a.as_f64() >= b.as_f64())),
            _ => arithmetic(op, a, b).map(Value::Number),
        }
    }
}

fn operands(op: BinaryOp, l: &Value, r: &Value) -> EvalError {
    EvalError::Operands {
        op: op.symbol(),
        lhs: l.type_name(),
        rhs: r.type_name(),
    }
}

/// Numbers pass through; numeric strings convert.
fn to_number(v: &Value) -> Option<Number> {
    match v {
        Value::Number(n) => Some(*n),
        Value::String(s) => Number::parse(s.trim()),
        _ => None,
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Number, EvalError> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                if x % y == 0 {
                    x.checked_div(y)
                } else {
                    None
                }
            }
            BinaryOp::Rem => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_rem(y)
            }
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Number::Int(v));
        }
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let v = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::Rem if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => return Err(EvalError::Overflow(op.symbol())),
    };
    if v.is_finite() {
        Ok(Number::Float(v))
    } else {
        Err(EvalError::Overflow(op.symbol()))
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match target {
        Value::List(items) => {
            let i = to_number(index)
                .and_then(Number::as_i64)
                .ok_or_else(|| {
                    EvalError::Type(format!("list index must be a whole number, found {index}"))
                })?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| {
                    EvalError::Type(format!("index {i} out of range for list of {}", items.len()))
                })
        }
        Value::Object(map) => {
            let key = match index {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(EvalError::Type(format!(
                        "object key must be a string, found {}",
                        other.type_name()
                    )))
                }
            };
            map.get(&key)
                .cloned()
                .ok_or_else(|| EvalError::Type(format!("object has no key {key:?}")))
        }
        other => Err(EvalError::Type(format!("cannot index {}", other.type_name()))),
    }
}
