use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use booter::cli::{self, CommandLine, CommandLineParser, FlagError};
use booter::{global, BootError, Booter, Builder, FactoryRegistry};

use crate::flags::{BootFlagKind, BootFlags};
use crate::logging;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("command line, {0}")]
    Flags(#[from] FlagError),

    #[error("at least one of --{dir}, --{file} is required")]
    MissingConfig { dir: String, file: String },

    #[error("invalid default {value:?} for --{flag}")]
    BadDefault { flag: String, value: String },

    #[error("failed to write pid file {}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve working directory")]
    WorkDir(#[source] io::Error),

    #[cfg(unix)]
    #[error("daemonize failed: {0}")]
    Daemon(#[from] daemonize_me::DaemonError),

    #[error("failed to start async runtime")]
    Runtime(#[source] io::Error),

    #[error("failed to render definitions")]
    Render(#[from] serde_yaml::Error),

    #[error(transparent)]
    Boot(#[from] BootError),
}

impl LaunchError {
    /// 1 for command line problems, 2 for everything after flags parsed.
    pub fn exit_code(&self) -> u8 {
        match self {
            LaunchError::Flags(_)
            | LaunchError::MissingConfig { .. }
            | LaunchError::BadDefault { .. } => 1,
            _ => 2,
        }
    }
}

/// Where module definitions come from, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Dir(PathBuf),
    Fallback(String),
}

/// Process settings resolved from boot flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub source: ConfigSource,
    pub pname: String,
    pub pid_file: Option<PathBuf>,
    pub bootlog: Option<PathBuf>,
    pub daemon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAction {
    Help,
    /// Fallback config text, empty when none was installed.
    GenConfig(String),
    Check(LaunchOptions),
    Run(LaunchOptions),
}

/// Entry point of a booter-based binary.
pub struct Launcher {
    builder: Builder,
    flags: BootFlags,
    fallback_config: Option<String>,
    fallback_pname: Option<String>,
    program: String,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(FactoryRegistry::global())
    }
}

impl Launcher {
    pub fn new(registry: Arc<FactoryRegistry>) -> Self {
        let program = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "booter".to_owned());
        Self {
            builder: Builder::new(registry),
            flags: BootFlags::default(),
            fallback_config: None,
            fallback_pname: None,
            program,
        }
    }

    /// Renames a boot flag and sets its default value.
    pub fn set_flag(
        &mut self,
        kind: BootFlagKind,
        long: &str,
        short: &str,
        default: &str,
    ) -> &mut Self {
        self.flags.set(kind, long, short, default);
        self
    }

    pub fn flags(&self) -> &BootFlags {
        &self.flags
    }

    /// Configuration used when neither a file nor a directory is given.
    pub fn set_fallback_config(&mut self, content: impl Into<String>) -> &mut Self {
        self.fallback_config = Some(content.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn set_fallback_pname(&mut self, pname: impl Into<String>) -> &mut Self {
        self.fallback_pname = Some(pname.into()).filter(|p: &String| !p.is_empty());
        self
    }

    pub fn set_version_string(&mut self, version: impl Into<String>) -> &mut Self {
        self.builder.set_version_string(version);
        self
    }

    /// Access to functions, variables and hooks of the underlying [`Builder`].
    pub fn builder_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }

    pub fn usage(&self) -> String {
        self.flags.usage(&self.program)
    }

    /// Resolves boot flags. `args` excludes the program name; flags outside
    /// the boot table are left for the `flag()` expression function.
    pub fn parse_flags<I, S>(&self, args: I) -> Result<LaunchAction, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parser = CommandLineParser::new(args);
        for kind in BootFlagKind::ALL.into_iter().filter(|k| k.is_switch()) {
            let flag = self.flags.get(kind);
            parser.add_hint_bool(&flag.long, &flag.short, false);
        }
        let cmd = parser.parse()?;

        if self.switch(&cmd, BootFlagKind::Help)? {
            return Ok(LaunchAction::Help);
        }
        if self.switch(&cmd, BootFlagKind::GenConfig)? {
            return Ok(LaunchAction::GenConfig(
                self.fallback_config.clone().unwrap_or_default(),
            ));
        }

        let source = if let Some(file) = self.string(&cmd, BootFlagKind::ConfigFile) {
            ConfigSource::File(file.into())
        } else if let Some(dir) = self.string(&cmd, BootFlagKind::ConfigDir) {
            ConfigSource::Dir(dir.into())
        } else if let Some(content) = &self.fallback_config {
            ConfigSource::Fallback(content.clone())
        } else {
            return Err(LaunchError::MissingConfig {
                dir: self.flags.get(BootFlagKind::ConfigDir).long.clone(),
                file: self.flags.get(BootFlagKind::ConfigFile).long.clone(),
            });
        };

        let pname = self
            .string(&cmd, BootFlagKind::Pname)
            .or_else(|| self.fallback_pname.clone())
            .unwrap_or_else(|| format!("boot-{}", std::process::id()));

        let options = LaunchOptions {
            source,
            pname,
            pid_file: self.string(&cmd, BootFlagKind::Pid).map(PathBuf::from),
            bootlog: self.string(&cmd, BootFlagKind::Bootlog).map(PathBuf::from),
            daemon: cfg!(unix) && self.switch(&cmd, BootFlagKind::Daemon)?,
        };

        if self.switch(&cmd, BootFlagKind::Check)? {
            Ok(LaunchAction::Check(options))
        } else {
            Ok(LaunchAction::Run(options))
        }
    }

    /// Flag value or its default; `None` when both are empty.
    fn string(&self, cmd: &CommandLine, kind: BootFlagKind) -> Option<String> {
        let flag = self.flags.get(kind);
        let value = match cmd.flag(&flag.long, &flag.short) {
            Some(f) => f.string(&flag.default),
            None => flag.default.clone(),
        };
        Some(value).filter(|v| !v.is_empty())
    }

    fn switch(&self, cmd: &CommandLine, kind: BootFlagKind) -> Result<bool, LaunchError> {
        let flag = self.flags.get(kind);
        let default = if flag.default.is_empty() {
            false
        } else {
            cli::parse_bool(&flag.default).ok_or_else(|| LaunchError::BadDefault {
                flag: flag.long.clone(),
                value: flag.default.clone(),
            })?
        };
        Ok(cmd
            .flag(&flag.long, &flag.short)
            .map_or(default, |f| f.bool(default)))
    }

    /// Builds a booter from the resolved source without starting it.
    pub fn build(&mut self, options: &LaunchOptions) -> Result<Booter, LaunchError> {
        self.builder.set_pname(options.pname.clone());
        let booter = match &options.source {
            ConfigSource::File(path) => self.builder.build_with_files(&[path])?,
            ConfigSource::Dir(dir) => self.builder.build_with_dir(dir)?,
            ConfigSource::Fallback(content) => self.builder.build_with_content(content)?,
        };
        Ok(booter)
    }

    /// Module definitions as YAML, in start order.
    pub fn check(&mut self, options: &LaunchOptions) -> Result<String, LaunchError> {
        let booter = self.build(options)?;
        Ok(serde_yaml::to_string(booter.definitions())?)
    }

    /// Parses `args` (program name first), then boots and blocks until a
    /// signal arrives. Returns the process exit code.
    pub fn run<I, S>(mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if let Some(name) = args.first().and_then(|a| Path::new(a).file_name()) {
            self.program = name.to_string_lossy().into_owned();
        }
        self.builder.set_args(args.iter().cloned());

        let action = match self.parse_flags(args.iter().skip(1).cloned()) {
            Ok(action) => action,
            Err(err) => {
                eprintln!("\n  Error: {err}\n");
                eprint!("{}", self.usage());
                return ExitCode::from(err.exit_code());
            }
        };

        let result = match action {
            LaunchAction::Help => {
                print!("{}", self.usage());
                Ok(())
            }
            LaunchAction::GenConfig(content) => {
                if !content.is_empty() {
                    println!("{content}");
                }
                Ok(())
            }
            LaunchAction::Check(options) => self.check(&options).map(|yaml| print!("{yaml}")),
            LaunchAction::Run(options) => self.serve(options),
        };

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "Boot failed");
                eprintln!("Error: {}", error_chain(&err));
                ExitCode::from(err.exit_code())
            }
        }
    }

    fn serve(&mut self, options: LaunchOptions) -> Result<(), LaunchError> {
        #[cfg(unix)]
        if options.daemon {
            crate::daemon::daemonize(&options.pname)?;
        }

        logging::init_logging(options.bootlog.as_deref());
        let span = tracing::info_span!("boot", pname = %options.pname);
        let _enter = span.enter();
        tracing::info!(pid = std::process::id(), "Booting");

        if let Some(path) = &options.pid_file {
            write_pid_file(path)?;
        }

        let booter = self.build(&options)?;
        run_booter(&booter)
    }
}

/// Starts `booter` inside a fresh tokio runtime, waits for a signal, then
/// shuts it down. The booter is the process-wide default while it runs.
///
/// Modules may spawn onto the runtime from `start` and `stop`. Once
/// startup has begun, shutdown always runs, even when startup fails.
pub fn run_booter(booter: &Booter) -> Result<(), LaunchError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(LaunchError::Runtime)?;
    let _guard = runtime.enter();

    global::set_default(booter);
    tracing::info!("startup");
    let result = booter.startup();
    match &result {
        Ok(()) => match runtime.block_on(booter.wait_signal()) {
            Ok(signal) => tracing::info!(?signal, "Received signal"),
            Err(err) => tracing::warn!(error = %err, "Signal handling failed"),
        },
        Err(err) => tracing::error!(error = %err, "Startup failed, stopping started modules"),
    }

    tracing::info!("shutdown");
    booter.shutdown();
    global::take_default();
    result.map_err(LaunchError::from)
}

/// Writes the current process id as plain decimal.
pub fn write_pid_file(path: &Path) -> Result<(), LaunchError> {
    std::fs::write(path, std::process::id().to_string()).map_err(|source| LaunchError::PidFile {
        path: path.to_path_buf(),
        source,
    })
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use booter::{Bind, Module, ModuleState};

    fn launcher() -> Launcher {
        Launcher::new(Arc::new(FactoryRegistry::new()))
    }

    fn run_options(action: LaunchAction) -> LaunchOptions {
        match action {
            LaunchAction::Run(options) => options,
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn config_file_wins_over_dir() {
        let action = launcher()
            .parse_flags(["--config-dir", "conf.d", "-c", "main.hcl", "--pname", "svc"])
            .unwrap();
        let options = run_options(action);
        assert_eq!(options.source, ConfigSource::File("main.hcl".into()));
        assert_eq!(options.pname, "svc");
        assert!(!options.daemon);
        assert_eq!(options.pid_file, None);
    }

    #[test]
    fn missing_config_is_a_flag_error() {
        let err = launcher().parse_flags(["--pname", "svc"]).unwrap_err();
        assert_eq!(err.to_string(), "at least one of --config-dir, --config is required");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn bad_syntax_exits_with_one() {
        let err = launcher().parse_flags(["---config"]).unwrap_err();
        assert!(matches!(err, LaunchError::Flags(FlagError::BadFlagSyntax(_))));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn help_takes_precedence() {
        assert_eq!(launcher().parse_flags(["-h"]).unwrap(), LaunchAction::Help);
        assert_eq!(
            launcher().parse_flags(["--config", "x.hcl", "--help"]).unwrap(),
            LaunchAction::Help
        );
    }

    #[test]
    fn fallback_config_and_pname() {
        let mut l = launcher();
        l.set_fallback_config("module \"a\" {}").set_fallback_pname("demo");

        let options = run_options(l.parse_flags(Vec::<String>::new()).unwrap());
        assert_eq!(options.source, ConfigSource::Fallback("module \"a\" {}".into()));
        assert_eq!(options.pname, "demo");

        assert_eq!(
            l.parse_flags(["--gen-config"]).unwrap(),
            LaunchAction::GenConfig("module \"a\" {}".into())
        );
    }

    #[test]
    fn pname_defaults_to_pid() {
        let options = run_options(launcher().parse_flags(["-c", "x.hcl"]).unwrap());
        assert_eq!(options.pname, format!("boot-{}", std::process::id()));
    }

    #[test]
    fn gen_config_without_fallback_is_empty() {
        assert_eq!(
            launcher().parse_flags(["--gen-config"]).unwrap(),
            LaunchAction::GenConfig(String::new())
        );
    }

    #[test]
    fn switches_do_not_swallow_the_next_token() {
        let action = launcher().parse_flags(["--check", "-c", "x.hcl"]).unwrap();
        assert!(matches!(
            action,
            LaunchAction::Check(ref o) if o.source == ConfigSource::File("x.hcl".into())
        ));

        let options =
            run_options(launcher().parse_flags(["-d", "app-arg", "-c", "x.hcl"]).unwrap());
        assert_eq!(options.daemon, cfg!(unix));
    }

    #[test]
    fn renamed_flags_and_defaults() {
        let mut l = launcher();
        l.set_flag(BootFlagKind::ConfigDir, "conf", "C", "/etc/svc")
            .set_flag(BootFlagKind::Daemon, "background", "", "true");

        let options = run_options(l.parse_flags(["--pid", "svc.pid"]).unwrap());
        assert_eq!(options.source, ConfigSource::Dir("/etc/svc".into()));
        assert_eq!(options.pid_file, Some(PathBuf::from("svc.pid")));
        assert_eq!(options.daemon, cfg!(unix));

        let options = run_options(l.parse_flags(["-C", "other", "--background=false"]).unwrap());
        assert_eq!(options.source, ConfigSource::Dir("other".into()));
        assert!(!options.daemon);

        l.set_flag(BootFlagKind::Check, "check", "", "maybe");
        let err = l.parse_flags(["-C", "x"]).unwrap_err();
        assert_eq!(err.to_string(), r#"invalid default "maybe" for --check"#);
    }

    #[test]
    fn pid_file_is_plain_decimal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.pid");
        std::fs::write(&path, "stale content that is longer").unwrap();

        write_pid_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), std::process::id().to_string());

        let err = write_pid_file(&dir.path().join("no/such/dir.pid")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn check_renders_definitions_without_starting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("svc.hcl");
        std::fs::write(
            &file,
            r#"
            module "b" { priority = 2 }
            module "a" {
              priority = 1
              config { Name = pname() }
            }
            "#,
        )
        .unwrap();

        let mut l = launcher();
        let arg = file.to_string_lossy().into_owned();
        let action = l
            .parse_flags(["--check", "--pname", "svc", "-c", arg.as_str()])
            .unwrap();
        let LaunchAction::Check(options) = action else {
            panic!("expected Check");
        };
        let yaml = l.check(&options).unwrap();
        let a = yaml.find("id: a").unwrap();
        let b = yaml.find("id: b").unwrap();
        assert!(a < b, "{yaml}");
        assert!(yaml.contains("Name: svc"), "{yaml}");
    }

    #[test]
    fn build_errors_exit_with_two() {
        let mut l = launcher();
        let options = LaunchOptions {
            source: ConfigSource::Fallback("module \"a\" { priority = }".into()),
            pname: "svc".into(),
            pid_file: None,
            bootlog: None,
            daemon: false,
        };
        let err = l.build(&options).unwrap_err();
        assert!(matches!(err, LaunchError::Boot(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[derive(Default, Bind)]
    struct NoConf {}

    /// Needs a runtime to start; optionally wakes the launcher once started.
    struct Spawner {
        wake: bool,
        stopped: Arc<AtomicBool>,
    }

    impl Module for Spawner {
        fn start(&self) -> anyhow::Result<()> {
            let handle = tokio::runtime::Handle::try_current()?;
            handle.spawn(async {});
            if self.wake {
                std::thread::spawn(|| {
                    for _ in 0..1000 {
                        if global::notify_signal() {
                            return;
                        }
                        std::thread::sleep(Duration::from_millis(5));
                    }
                });
            }
            Ok(())
        }

        fn stop(&self) {
            tokio::runtime::Handle::current().spawn(async {});
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    struct Broken;

    impl Module for Broken {
        fn start(&self) -> anyhow::Result<()> {
            anyhow::bail!("broken on purpose")
        }

        fn stop(&self) {}
    }

    fn boot(content: &str, wake: bool) -> (Booter, Arc<AtomicBool>) {
        let stopped = Arc::new(AtomicBool::new(false));
        let registry = Arc::new(FactoryRegistry::new());
        let flag = stopped.clone();
        registry.register_typed("spawner", NoConf::default, move |_: &NoConf| {
            Ok(Spawner {
                wake,
                stopped: flag.clone(),
            })
        });
        registry.register_typed("broken", NoConf::default, |_: &NoConf| Ok(Broken));

        let mut l = Launcher::new(registry);
        let options = LaunchOptions {
            source: ConfigSource::Fallback(content.into()),
            pname: "svc".into(),
            pid_file: None,
            bootlog: None,
            daemon: false,
        };
        (l.build(&options).unwrap(), stopped)
    }

    // One test: both runs install the process-wide booter.
    #[test]
    fn run_booter_starts_inside_the_runtime_and_always_stops() {
        let (booter, stopped) = boot("module \"spawner\" {}", true);
        run_booter(&booter).unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(booter.state("spawner"), Some(ModuleState::Stop));
        assert!(global::current().is_none());

        let (booter, stopped) = boot(
            "module \"spawner\" {\n  priority = 1\n}\nmodule \"broken\" {\n  priority = 2\n}\n",
            false,
        );
        let err = run_booter(&booter).unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Boot(BootError::ModStartFailed { ref id, .. }) if id == "broken"
        ));
        assert_eq!(err.exit_code(), 2);
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(booter.state("broken"), Some(ModuleState::Stop));
        assert!(global::current().is_none());
    }
}
