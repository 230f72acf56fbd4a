use std::{
    env,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

/// Errors for resolving user directories
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("HOME environment variable is not set")]
    HomeMissing,
    #[error("APPDATA environment variable is not set")]
    AppDataMissing,
    #[error("directory must be an absolute path: {0}")]
    AbsoluteRequired(String),
}

fn non_empty(lookup: &impl Fn(&str) -> Option<OsString>, key: &str) -> Option<PathBuf> {
    lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn require_absolute(path: PathBuf) -> Result<PathBuf, HomeDirError> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(HomeDirError::AbsoluteRequired(path.to_string_lossy().into()))
    }
}

/// Resolve the user home directory from the given environment lookup.
///
/// - Windows: `%USERPROFILE%`, falling back to `%HOME%`.
/// - Linux/macOS: `$HOME`.
fn resolve_home(lookup: impl Fn(&str) -> Option<OsString>) -> Result<PathBuf, HomeDirError> {
    #[cfg(target_os = "windows")]
    let home = non_empty(&lookup, "USERPROFILE").or_else(|| non_empty(&lookup, "HOME"));
    #[cfg(not(target_os = "windows"))]
    let home = non_empty(&lookup, "HOME");

    require_absolute(home.ok_or(HomeDirError::HomeMissing)?)
}

/// Resolve the per-user configuration directory.
///
/// - Windows: `%APPDATA%`.
/// - macOS: `$HOME/Library/Application Support`.
/// - Other Unix: `$XDG_CONFIG_HOME` when absolute, else `$HOME/.config`.
fn resolve_config(lookup: impl Fn(&str) -> Option<OsString>) -> Result<PathBuf, HomeDirError> {
    #[cfg(target_os = "windows")]
    {
        let appdata = non_empty(&lookup, "APPDATA").ok_or(HomeDirError::AppDataMissing)?;
        require_absolute(appdata)
    }

    #[cfg(target_os = "macos")]
    {
        Ok(resolve_home(lookup)?.join("Library").join("Application Support"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = non_empty(&lookup, "XDG_CONFIG_HOME").filter(|p| p.is_absolute()) {
            return Ok(xdg);
        }
        Ok(resolve_home(lookup)?.join(".config"))
    }
}

pub fn user_home_dir() -> Result<PathBuf, HomeDirError> {
    resolve_home(|key| env::var_os(key))
}

pub fn user_config_dir() -> Result<PathBuf, HomeDirError> {
    resolve_config(|key| env::var_os(key))
}

/// `<home>/.config/<name>`
pub fn pref_dir(name: &str) -> Result<PathBuf, HomeDirError> {
    Ok(user_home_dir()?.join(".config").join(name))
}

/// Platform temporary directory. Unix always reports `/tmp`.
pub fn temp_dir() -> io::Result<PathBuf> {
    #[cfg(unix)]
    {
        Ok(PathBuf::from("/tmp"))
    }
    #[cfg(not(unix))]
    {
        absolute(&env::temp_dir())
    }
}

pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

pub fn executable_file() -> io::Result<PathBuf> {
    absolute(&env::current_exe()?)
}

pub fn executable_dir() -> io::Result<PathBuf> {
    let exe = executable_file()?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or(exe))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn home_comes_from_home_variable() {
        let home = resolve_home(env_of(&[("HOME", "/home/boot")])).unwrap();
        assert_eq!(home, PathBuf::from("/home/boot"));
    }

    #[test]
    fn missing_home_is_an_error() {
        let err = resolve_home(env_of(&[])).unwrap_err();
        assert!(matches!(err, HomeDirError::HomeMissing));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn relative_home_is_rejected() {
        let err = resolve_home(env_of(&[("HOME", "relative/home")])).unwrap_err();
        assert!(matches!(err, HomeDirError::AbsoluteRequired(_)));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn config_dir_prefers_absolute_xdg() {
        let dir = resolve_config(env_of(&[
            ("HOME", "/home/boot"),
            ("XDG_CONFIG_HOME", "/xdg"),
        ]))
        .unwrap();
        assert_eq!(dir, PathBuf::from("/xdg"));

        let dir = resolve_config(env_of(&[
            ("HOME", "/home/boot"),
            ("XDG_CONFIG_HOME", "rel"),
        ]))
        .unwrap();
        assert_eq!(dir, PathBuf::from("/home/boot/.config"));
    }

    #[test]
    fn absolute_joins_relative_paths_onto_cwd() {
        let cwd = env::current_dir().unwrap();
        assert_eq!(absolute(Path::new("x/y")).unwrap(), cwd.join("x/y"));
    }
}
