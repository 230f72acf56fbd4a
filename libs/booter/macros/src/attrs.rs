use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use syn::{Attribute, LitStr};

/// Key naming applied by `#[bind(rename_all = "...")]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenameRule {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
}

impl RenameRule {
    const VALID: &'static str =
        "PascalCase, camelCase, snake_case, SCREAMING_SNAKE_CASE, kebab-case";

    fn from_lit(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "PascalCase" => Ok(RenameRule::Pascal),
            "camelCase" => Ok(RenameRule::Camel),
            "snake_case" => Ok(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Ok(RenameRule::ScreamingSnake),
            "kebab-case" => Ok(RenameRule::Kebab),
            other => Err(syn::Error::new_spanned(
                lit,
                format!("unknown rename_all rule '{other}', expected one of: {}", Self::VALID),
            )),
        }
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            RenameRule::Pascal => name.to_upper_camel_case(),
            RenameRule::Camel => name.to_lower_camel_case(),
            RenameRule::Snake => name.to_snake_case(),
            RenameRule::ScreamingSnake => name.to_shouty_snake_case(),
            RenameRule::Kebab => name.to_kebab_case(),
        }
    }
}

/// `#[bind(...)]` on the struct or enum itself.
#[derive(Debug, Default)]
pub struct ContainerAttrs {
    pub rename_all: Option<RenameRule>,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = ContainerAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    let lit: LitStr = meta.value()?.parse()?;
                    out.rename_all = Some(RenameRule::from_lit(&lit)?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported container attribute, expected `rename_all`"))
                }
            })?;
        }
        Ok(out)
    }
}

/// `#[bind(...)]` on a field or variant.
#[derive(Debug, Default)]
pub struct MemberAttrs {
    pub rename: Option<String>,
    pub skip: bool,
}

impl MemberAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = MemberAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    out.rename = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported attribute, expected `rename` or `skip`"))
                }
            })?;
        }
        Ok(out)
    }

    /// Configuration key for a member named `ident`.
    pub fn key(&self, ident: &str, rule: Option<RenameRule>) -> String {
        if let Some(rename) = &self.rename {
            return rename.clone();
        }
        let ident = ident.strip_prefix("r#").unwrap_or(ident);
        match rule {
            Some(rule) => rule.apply(ident),
            None => ident.to_owned(),
        }
    }
}
