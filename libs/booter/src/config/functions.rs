//! Built-in expression functions.
//!
//! Process-derived functions (`flag`, `arg`, `pname`, `version`, ...) read a
//! [`ProcessInfo`] captured when the function table is built, never globals.

use std::fmt;
use std::sync::Arc;

use crate::paths::{self, HomeDirError};
use crate::value::{Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: String, got: usize },
    #[error("argument {index}: {message}")]
    Argument { index: usize, message: String },
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    HomeDir(#[from] HomeDirError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

type FunctionImpl = dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync;

/// A callable usable from configuration expressions.
#[derive(Clone)]
pub struct Function {
    arity: Arity,
    imp: Arc<FunctionImpl>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("arity", &self.arity).finish()
    }
}

impl Function {
    pub fn new<F>(arity: Arity, imp: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self {
            arity,
            imp: Arc::new(imp),
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        let ok = match self.arity {
            Arity::Exact(n) => args.len() == n,
            Arity::AtLeast(n) => args.len() >= n,
        };
        if !ok {
            return Err(FunctionError::Arity {
                expected: self.arity.to_string(),
                got: args.len(),
            });
        }
        (self.imp)(args)
    }
}

/// Process data visible to the built-in functions.
#[derive(Debug, Clone, Default)]
pub struct ProcessInfo {
    /// Full argument vector, program name included.
    pub args: Vec<String>,
    pub pname: String,
    pub version: String,
}

impl ProcessInfo {
    pub fn from_env() -> Self {
        let pname = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        Self {
            args: std::env::args().collect(),
            pname,
            version: String::new(),
        }
    }

    /// Value following `name`, or the `name=value` suffix. `Some(None)` when
    /// `name` is the last token.
    fn find_flag(&self, name: &str) -> Option<Option<&str>> {
        for (i, arg) in self.args.iter().enumerate() {
            if arg == name {
                return Some(self.args.get(i + 1).map(String::as_str));
            }
            if let Some(value) = arg.strip_prefix(name).and_then(|r| r.strip_prefix('=')) {
                return Some(Some(value));
            }
        }
        None
    }

    /// Program name plus every token that does not start with `-`.
    fn positional(&self) -> Vec<&str> {
        self.args
            .iter()
            .enumerate()
            .filter(|(i, a)| *i == 0 || !a.starts_with('-'))
            .map(|(_, a)| a.as_str())
            .collect()
    }
}

fn string_arg(args: &[Value], index: usize) -> Result<String, FunctionError> {
    match &args[index] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(FunctionError::Argument {
            index,
            message: format!("must be a string, found {}", other.type_name()),
        }),
    }
}

fn optional_string_arg(args: &[Value], index: usize) -> Result<String, FunctionError> {
    if args[index].is_null() {
        return Ok(String::new());
    }
    string_arg(args, index)
}

fn number_arg(args: &[Value], index: usize) -> Result<Number, FunctionError> {
    let n = match &args[index] {
        Value::Number(n) => Some(*n),
        Value::String(s) => Number::parse(s.trim()),
        _ => None,
    };
    n.ok_or_else(|| FunctionError::Argument {
        index,
        message: format!("must be a number, found {}", args[index]),
    })
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, FunctionError> {
    number_arg(args, index)?
        .as_i64()
        .ok_or_else(|| FunctionError::Argument {
            index,
            message: format!("must be a whole number, found {}", args[index]),
        })
}

fn path_value(path: std::path::PathBuf) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// The standard function table installed on every builder.
pub fn default_functions(process: &Arc<ProcessInfo>) -> Vec<(&'static str, Function)> {
    let mut table = process_functions(process);
    table.extend(path_functions());
    table.extend(string_functions());
    table
}

fn process_functions(process: &Arc<ProcessInfo>) -> Vec<(&'static str, Function)> {
    let p = process.clone();
    let flag = Function::new(Arity::Exact(2), move |args| {
        let name = string_arg(args, 0)?;
        match p.find_flag(&name) {
            Some(Some(value)) => Ok(value.into()),
            _ => Ok(optional_string_arg(args, 1)?.into()),
        }
    });

    let p = process.clone();
    let flag_or_error = Function::new(Arity::Exact(1), move |args| {
        let name = string_arg(args, 0)?;
        match p.find_flag(&name) {
            Some(value) => Ok(value.unwrap_or_default().into()),
            None => Err(FunctionError::Failed(format!("required flag {name} missing"))),
        }
    });

    let p = process.clone();
    let arg = Function::new(Arity::Exact(2), move |args| {
        let index = int_arg(args, 0)?;
        let positional = p.positional();
        match usize::try_from(index).ok().and_then(|i| positional.get(i)) {
            Some(value) => Ok((*value).into()),
            None => Ok(args[1].clone()),
        }
    });

    let p = process.clone();
    let arg_or_error = Function::new(Arity::Exact(1), move |args| {
        let index = int_arg(args, 0)?;
        let positional = p.positional();
        usize::try_from(index)
            .ok()
            .and_then(|i| positional.get(i))
            .map(|value| (*value).into())
            .ok_or_else(|| FunctionError::Failed(format!("argument index {index} out of range")))
    });

    let p = process.clone();
    let arglen = Function::new(Arity::Exact(0), move |_| {
        Ok(Value::int(p.args.len() as i64))
    });

    let p = process.clone();
    let pname = Function::new(Arity::Exact(0), move |_| Ok(p.pname.clone().into()));

    let p = process.clone();
    let version = Function::new(Arity::Exact(0), move |_| Ok(p.version.clone().into()));

    let env = Function::new(Arity::Exact(2), |args| {
        let name = string_arg(args, 0)?;
        match std::env::var_os(&name) {
            Some(value) => Ok(value.to_string_lossy().into_owned().into()),
            None => Ok(optional_string_arg(args, 1)?.into()),
        }
    });

    let env_or_error = Function::new(Arity::Exact(1), |args| {
        let name = string_arg(args, 0)?;
        std::env::var_os(&name)
            .map(|value| value.to_string_lossy().into_owned().into())
            .ok_or_else(|| FunctionError::Failed(format!("required env variable {name} missing")))
    });

    vec![
        ("env", env),
        ("envOrError", env_or_error),
        ("flag", flag),
        ("flagOrError", flag_or_error),
        ("arg", arg),
        ("argOrError", arg_or_error),
        ("arglen", arglen),
        ("pname", pname),
        ("version", version),
    ]
}

fn path_functions() -> Vec<(&'static str, Function)> {
    vec![
        (
            "execFile",
            Function::new(Arity::Exact(0), |_| Ok(path_value(paths::executable_file()?))),
        ),
        (
            "execDir",
            Function::new(Arity::Exact(0), |_| Ok(path_value(paths::executable_dir()?))),
        ),
        (
            "tempDir",
            Function::new(Arity::Exact(0), |_| Ok(path_value(paths::temp_dir()?))),
        ),
        (
            "userDir",
            Function::new(Arity::Exact(0), |_| Ok(path_value(paths::user_home_dir()?))),
        ),
        (
            "userConfDir",
            Function::new(Arity::Exact(0), |_| Ok(path_value(paths::user_config_dir()?))),
        ),
        (
            "prefDir",
            Function::new(Arity::Exact(1), |args| {
                Ok(path_value(paths::pref_dir(&string_arg(args, 0)?)?))
            }),
        ),
    ]
}

fn string_functions() -> Vec<(&'static str, Function)> {
    vec![
        (
            "upper",
            Function::new(Arity::Exact(1), |args| Ok(string_arg(args, 0)?.to_uppercase().into())),
        ),
        (
            "lower",
            Function::new(Arity::Exact(1), |args| Ok(string_arg(args, 0)?.to_lowercase().into())),
        ),
        (
            "strlen",
            Function::new(Arity::Exact(1), |args| {
                Ok(Value::int(string_arg(args, 0)?.chars().count() as i64))
            }),
        ),
        ("substr", Function::new(Arity::Exact(3), substr)),
        ("min", Function::new(Arity::AtLeast(1), |args| extremum(args, |a, b| a < b))),
        ("max", Function::new(Arity::AtLeast(1), |args| extremum(args, |a, b| a > b))),
    ]
}

/// `substr(str, offset, length)`: negative offsets count from the end and a
/// negative length extends to the end of the string.
fn substr(args: &[Value]) -> Result<Value, FunctionError> {
    let chars: Vec<char> = string_arg(args, 0)?.chars().collect();
    let total = chars.len() as i64;
    let mut offset = int_arg(args, 1)?;
    let length = int_arg(args, 2)?;

    if offset < 0 {
        offset = (total + offset).max(0);
    }
    if offset >= total {
        return Ok(Value::String(String::new()));
    }
    let end = if length < 0 {
        total
    } else {
        offset.saturating_add(length).min(total)
    };
    Ok(Value::String(chars[offset as usize..end as usize].iter().collect()))
}

fn extremum(args: &[Value], better: fn(f64, f64) -> bool) -> Result<Value, FunctionError> {
    let mut best = number_arg(args, 0)?;
    for index in 1..args.len() {
        let n = number_arg(args, index)?;
        if better(n.as_f64(), best.as_f64()) {
            best = n;
        }
    }
    Ok(Value::Number(best))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(args: &[&str]) -> std::collections::HashMap<&'static str, Function> {
        let process = Arc::new(ProcessInfo {
            args: args.iter().map(|s| s.to_string()).collect(),
            pname: "neo".into(),
            version: "1.2.3".into(),
        });
        default_functions(&process).into_iter().collect()
    }

    fn call(
        t: &std::collections::HashMap<&'static str, Function>,
        name: &str,
        args: &[Value],
    ) -> Value {
        t[name].call(args).unwrap()
    }

    #[test]
    fn flag_reads_next_token_or_assignment() {
        let t = table(&["prog", "--data", "/d", "--log=/l", "--last"]);
        assert_eq!(call(&t, "flag", &["--data".into(), "x".into()]), "/d".into());
        assert_eq!(call(&t, "flag", &["--log".into(), "x".into()]), "/l".into());
        assert_eq!(call(&t, "flag", &["--last".into(), "dflt".into()]), "dflt".into());
        assert_eq!(call(&t, "flag", &["--none".into(), Value::Null]), "".into());
        assert_eq!(call(&t, "flagOrError", &["--last".into()]), "".into());
        assert!(t["flagOrError"].call(&["--none".into()]).is_err());
    }

    #[test]
    fn arg_skips_dash_tokens_except_program_name() {
        let t = table(&["prog", "-v", "first", "--x=1", "second"]);
        assert_eq!(call(&t, "arg", &[Value::int(0), "".into()]), "prog".into());
        assert_eq!(call(&t, "arg", &[Value::int(2), "".into()]), "second".into());
        assert_eq!(call(&t, "arg", &[Value::int(9), "none".into()]), "none".into());
        assert!(t["argOrError"].call(&[Value::int(9)]).is_err());
        assert_eq!(call(&t, "arglen", &[]), Value::int(5));
    }

    #[test]
    fn pname_and_version_come_from_process_info() {
        let t = table(&["prog"]);
        assert_eq!(call(&t, "pname", &[]), "neo".into());
        assert_eq!(call(&t, "version", &[]), "1.2.3".into());
    }

    #[test]
    fn env_falls_back_to_default() {
        let t = table(&["prog"]);
        let missing = "BOOTER_TEST_SURELY_UNSET_VARIABLE";
        assert_eq!(call(&t, "env", &[missing.into(), "fallback".into()]), "fallback".into());
        let err = t["envOrError"].call(&[missing.into()]).unwrap_err();
        assert_eq!(err.to_string(), format!("required env variable {missing} missing"));
    }

    #[test]
    fn string_functions_follow_stdlib_semantics() {
        let t = table(&["prog"]);
        assert_eq!(call(&t, "upper", &["abc".into()]), "ABC".into());
        assert_eq!(call(&t, "lower", &["ÀB".into()]), "àb".into());
        assert_eq!(call(&t, "strlen", &["héllo".into()]), Value::int(5));
        assert_eq!(
            call(&t, "substr", &["hello world".into(), Value::int(1), Value::int(3)]),
            "ell".into()
        );
        assert_eq!(
            call(&t, "substr", &["hello world".into(), Value::int(-5), Value::int(-1)]),
            "world".into()
        );
        assert_eq!(
            call(&t, "substr", &["hi".into(), Value::int(5), Value::int(1)]),
            "".into()
        );
        assert_eq!(
            call(&t, "min", &[Value::int(3), Value::float(1.5), Value::int(2)]),
            Value::float(1.5)
        );
        assert_eq!(call(&t, "max", &[Value::int(3), Value::int(7)]), Value::int(7));
    }

    #[test]
    fn arity_is_checked_before_invocation() {
        let t = table(&["prog"]);
        let err = t["env"].call(&["HOME".into()]).unwrap_err();
        assert!(matches!(err, FunctionError::Arity { got: 1, .. }));
        assert!(t["max"].call(&[]).is_err());
    }
}
