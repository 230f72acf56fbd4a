//! Module definitions: the schema layer on top of the parsed document.
//!
//! A document holds `define "<id>" { ... }` blocks, which publish variables
//! named `<id>_<attr>`, and `module "<id>" { ... }` blocks, each becoming one
//! [`Definition`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::eval::EvalContext;
use super::parser::parse_document;
use super::syntax::{Attribute, Block, Body, Location};
use super::ConfigError;
use crate::value::{self, Value};

/// File name reported in locations when parsing in-memory content.
pub const CONTENT_FILE_NAME: &str = "nofile.hcl";

pub const DEFAULT_CONFIG_SUFFIX: &str = ".hcl";

const PRIORITY_BASE: i64 = 1000;

/// One module instance to boot, as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub id: String,
    pub name: String,
    pub priority: i64,
    pub disabled: bool,
    /// Evaluated `config` block, or `Null` when the module has none.
    pub config: Value,
    pub injects: Vec<InjectionDef>,
    /// Targets of `reference "<target>" {}` blocks. Informational only: they
    /// take no part in ordering or injection.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// `inject "<target>" "<field>" {}`: the declaring module is handed to the
/// `target` module through its `field` injection point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionDef {
    /// Name or id of the module receiving the declaring module.
    pub target: String,
    /// Injection point on the target module.
    pub field_name: String,
}

fn schema(location: &Location, message: impl Into<String>) -> ConfigError {
    ConfigError::Schema {
        location: location.clone(),
        message: message.into(),
    }
}

fn eval_attr(ctx: &EvalContext, attr: &Attribute) -> Result<Value, ConfigError> {
    ctx.eval(&attr.expr).map_err(|source| ConfigError::Eval {
        location: attr.location.clone(),
        source,
    })
}

fn single_label<'a>(block: &'a Block) -> Result<&'a str, ConfigError> {
    match block.labels.as_slice() {
        [label] => Ok(label),
        _ => Err(schema(
            &block.location,
            format!(
                "{} block requires exactly one label, found {}",
                block.kind,
                block.labels.len()
            ),
        )),
    }
}

/// Name used when a module does not set `name`.
///
/// Path-like ids (`a/b/c`) use their last segment plus the two-digit
/// declaration index; anything else becomes `$mod_<index + 1>`.
fn default_name(id: &str, index: usize) -> String {
    match id.rfind('/') {
        Some(pos) if pos > 0 && pos + 1 < id.len() => format!("{}{:02}", &id[pos + 1..], index),
        _ => format!("$mod_{}", index + 1),
    }
}

/// Converts the definitions in a parsed document. `ctx` is cloned, so the
/// `define` variables stay local to this document.
pub fn parse_definitions(
    body: &Body,
    ctx: &EvalContext,
) -> Result<Vec<Definition>, ConfigError> {
    if let Some(attr) = body.attributes.first() {
        return Err(schema(
            &attr.location,
            format!("unexpected attribute {:?} at top level", attr.name),
        ));
    }

    let mut ctx = ctx.clone();
    let mut modules = Vec::new();
    for block in &body.blocks {
        match block.kind.as_str() {
            "define" => apply_define(&mut ctx, block)?,
            "module" => modules.push(block),
            other => {
                return Err(schema(
                    &block.location,
                    format!("unexpected block {other:?}, expected define or module"),
                ))
            }
        }
    }

    let mut definitions = modules
        .into_iter()
        .enumerate()
        .map(|(index, block)| parse_module(&ctx, block, index))
        .collect::<Result<Vec<_>, _>>()?;
    definitions.sort_by_key(|d| d.priority);

    tracing::debug!(count = definitions.len(), "parsed module definitions");
    Ok(definitions)
}

fn apply_define(ctx: &mut EvalContext, block: &Block) -> Result<(), ConfigError> {
    let id = single_label(block)?;
    if let Some(inner) = block.body.blocks.first() {
        return Err(schema(
            &inner.location,
            format!("define {id:?} accepts attributes only, found block {:?}", inner.kind),
        ));
    }
    for attr in &block.body.attributes {
        let value = eval_attr(ctx, attr)?;
        ctx.set_variable(format!("{id}_{}", attr.name), value);
    }
    Ok(())
}

fn parse_module(ctx: &EvalContext, block: &Block, index: usize) -> Result<Definition, ConfigError> {
    let id = single_label(block)?;
    let mut definition = Definition {
        id: id.to_owned(),
        name: default_name(id, index),
        priority: PRIORITY_BASE + index as i64,
        disabled: false,
        config: Value::Null,
        injects: Vec::new(),
        references: Vec::new(),
    };

    for attr in &block.body.attributes {
        let value = eval_attr(ctx, attr)?;
        match attr.name.as_str() {
            "priority" => definition.priority = value::priority_of(&value),
            "disabled" => {
                definition.disabled = value::to_bool(&value).map_err(|e| {
                    schema(&attr.location, format!("module {id} disabled: {e}"))
                })?;
            }
            "name" => {
                definition.name = value::to_str(&value)
                    .map_err(|e| schema(&attr.location, format!("module {id} name: {e}")))?
                    .to_owned();
            }
            other => {
                return Err(schema(
                    &attr.location,
                    format!("module {id}: unknown attribute {other:?}"),
                ))
            }
        }
    }

    for inner in &block.body.blocks {
        match inner.kind.as_str() {
            // A repeated config block replaces the earlier one.
            "config" => {
                if !inner.labels.is_empty() {
                    return Err(schema(
                        &inner.location,
                        format!("module {id}: config block takes no labels"),
                    ));
                }
                definition.config = config_value(ctx, &inner.body)?;
            }
            "inject" => definition.injects.push(parse_inject(id, inner)?),
            "reference" => definition.references.push(parse_reference(id, inner)?),
            other => {
                return Err(schema(
                    &inner.location,
                    format!("module {id}: unknown block {other:?}"),
                ))
            }
        }
    }

    Ok(definition)
}

fn parse_inject(id: &str, block: &Block) -> Result<InjectionDef, ConfigError> {
    let [target, field] = block.labels.as_slice() else {
        return Err(schema(
            &block.location,
            format!("module {id}: inject requires a target and a field label"),
        ));
    };
    if target.is_empty() {
        return Err(schema(&block.location, format!("module {id} inject target not defined")));
    }
    if field.is_empty() {
        return Err(schema(&block.location, format!("inject {target} requires target field")));
    }
    if !block.body.is_empty() {
        return Err(schema(&block.location, format!("inject {target} body must be empty")));
    }
    Ok(InjectionDef {
        target: target.clone(),
        field_name: field.clone(),
    })
}

fn parse_reference(id: &str, block: &Block) -> Result<String, ConfigError> {
    let target = single_label(block)?;
    if target.is_empty() {
        return Err(schema(&block.location, format!("module {id} reference target not defined")));
    }
    if !block.body.is_empty() {
        return Err(schema(&block.location, format!("reference {target} body must be empty")));
    }
    Ok(target.to_owned())
}

/// Evaluates a config body into an object; nested blocks become nested objects.
fn config_value(ctx: &EvalContext, body: &Body) -> Result<Value, ConfigError> {
    let mut map = BTreeMap::new();
    for attr in &body.attributes {
        map.insert(attr.name.clone(), eval_attr(ctx, attr)?);
    }
    for block in &body.blocks {
        if !block.labels.is_empty() {
            return Err(schema(
                &block.location,
                format!("config block {:?} takes no labels", block.kind),
            ));
        }
        map.insert(block.kind.clone(), config_value(ctx, &block.body)?);
    }
    Ok(Value::Object(map))
}

/// Parses in-memory configuration content.
pub fn load_definitions(content: &str, ctx: &EvalContext) -> Result<Vec<Definition>, ConfigError> {
    let body = parse_document(content, CONTENT_FILE_NAME)?;
    parse_definitions(&body, ctx)
}

/// Parses each file on its own and treats the concatenation of their blocks
/// as one document.
pub fn load_definition_files<P: AsRef<Path>>(
    paths: &[P],
    ctx: &EvalContext,
) -> Result<Vec<Definition>, ConfigError> {
    let mut document = Body::default();
    for path in paths {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(file = %path.display(), "loading configuration file");
        let body = parse_document(&source, &path.display().to_string())?;
        document.attributes.extend(body.attributes);
        document.blocks.extend(body.blocks);
    }
    parse_definitions(&document, ctx)
}

/// Loads every regular file in `dir` whose name ends with `suffix`, in
/// lexical order. Subdirectories are not visited.
pub fn load_definition_dir(
    dir: &Path,
    suffix: &str,
    ctx: &EvalContext,
) -> Result<Vec<Definition>, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    load_definition_files(&files, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(src: &str) -> Result<Vec<Definition>, ConfigError> {
        load_definitions(src, &EvalContext::new())
    }

    #[test]
    fn defaults_follow_declaration_order() {
        let defs = load(
            r#"
module "a/b/cmod" {}
module "plain" {}
module "trailing/" {}
"#,
        )
        .unwrap();
        let names: Vec<_> = defs.iter().map(|d| (d.name.as_str(), d.priority)).collect();
        assert_eq!(names, [("cmod00", 1000), ("$mod_2", 1001), ("$mod_3", 1002)]);
        assert!(defs.iter().all(|d| d.config.is_null() && !d.disabled));
    }

    #[test]
    fn modules_sort_stably_by_priority() {
        let defs = load(
            r#"
module "c" { priority = 300 }
module "a" { priority = 100 }
module "b1" { priority = 200 }
module "b2" { priority = 200 }
"#,
        )
        .unwrap();
        let ids: Vec<_> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b1", "b2", "c"]);
    }

    #[test]
    fn defines_publish_prefixed_variables() {
        let defs = load(
            r#"
define "net" {
  host = "localhost"
  port = 5000 + 1
}
define "urls" {
  api = "http://${net_host}:${net_port}"
}
module "amod" {
  name = "api"
  config {
    Url = urls_api
    Tcp {
      Port = net_port
    }
    Tcp {
      Port = 1
      Host = net_host
    }
  }
}
"#,
        )
        .unwrap();
        let config = &defs[0].config;
        assert_eq!(defs[0].name, "api");
        assert_eq!(config.get("Url"), Some(&"http://localhost:5001".into()));
        let tcp = config.get("Tcp").unwrap();
        assert_eq!(tcp.get("Port"), Some(&Value::int(1)));
        assert_eq!(tcp.get("Host"), Some(&"localhost".into()));
    }

    #[test]
    fn reserved_attributes_are_coerced() {
        let defs = load(
            r#"
module "x" {
  disabled = "yes"
  priority = "soon"
}
"#,
        )
        .unwrap();
        assert!(defs[0].disabled);
        assert_eq!(defs[0].priority, value::FALLBACK_PRIORITY);

        let err = load("module \"x\" {\n  disabled = \"maybe\"\n}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
        assert!(err.to_string().starts_with("nofile.hcl:2:3: "), "{err}");

        let err = load("module \"x\" {\n  name = 5\n}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
    }

    #[test]
    fn injects_keep_declaration_order() {
        let defs = load(
            r#"
module "amod" {
  inject "bmod" "Bmod" {}
  inject "cmod" "SetCmod" {}
}
"#,
        )
        .unwrap();
        assert_eq!(
            defs[0].injects,
            [
                InjectionDef { target: "bmod".into(), field_name: "Bmod".into() },
                InjectionDef { target: "cmod".into(), field_name: "SetCmod".into() },
            ]
        );
    }

    #[test]
    fn empty_inject_labels_are_rejected() {
        let err = load("module \"amod\" {\n  inject \"\" \"Bmod\" {}\n}\n").unwrap_err();
        assert!(err.to_string().ends_with("module amod inject target not defined"), "{err}");

        let err = load("module \"amod\" {\n  inject \"bmod\" \"\" {}\n}\n").unwrap_err();
        assert!(err.to_string().ends_with("inject bmod requires target field"), "{err}");
    }

    #[test]
    fn references_are_recorded_but_inert() {
        let defs = load(
            r#"
module "amod" {
  reference "bmod" {}
  reference "logger" {}
  inject "bmod" "Amod" {}
}
"#,
        )
        .unwrap();
        assert_eq!(defs[0].references, ["bmod", "logger"]);
        assert_eq!(defs[0].injects.len(), 1);

        let err = load(r#"module "amod" {
  reference "a" "b" {}
}
"#).unwrap_err();
        assert!(err.to_string().contains("reference block requires exactly one label"), "{err}");

        let err = load(r#"module "amod" {
  reference "bmod" {
    x = 1
  }
}
"#).unwrap_err();
        assert!(err.to_string().ends_with("reference bmod body must be empty"), "{err}");
    }

    #[test]
    fn schema_violations_carry_locations() {
        let err = load("module \"m\" {\n  colour = 1\n}\n").unwrap_err();
        assert_eq!(err.location().map(|l| (l.line, l.column)), Some((2, 3)));

        let err = load("service \"m\" {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));

        let err = load("module \"m\" {\n  config {\n    port = nope\n  }\n}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Eval { .. }));
        assert!(err.to_string().starts_with("nofile.hcl:3:5"), "{err}");
    }

    #[test]
    fn directory_loading_is_lexical_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20-b.hcl"), "module \"b\" {}\n").unwrap();
        std::fs::write(
            dir.path().join("10-a.hcl"),
            "define \"shared\" {\n  port = 7\n}\nmodule \"a\" {}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("30-c.hcl"),
            "module \"c\" {\n  config {\n    port = shared_port\n  }\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not configuration").unwrap();
        std::fs::create_dir(dir.path().join("nested.hcl")).unwrap();

        let defs =
            load_definition_dir(dir.path(), DEFAULT_CONFIG_SUFFIX, &EvalContext::new()).unwrap();
        let ids: Vec<_> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(defs[2].config.get("port"), Some(&Value::int(7)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_definition_files(&["/definitely/not/here.hcl"], &EvalContext::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
