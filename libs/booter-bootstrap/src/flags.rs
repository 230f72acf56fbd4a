use std::collections::BTreeMap;

/// Boot flags understood by [`crate::Launcher`], in usage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootFlagKind {
    ConfigDir,
    ConfigFile,
    GenConfig,
    Pname,
    Pid,
    Bootlog,
    Daemon,
    Check,
    Help,
}

impl BootFlagKind {
    pub const ALL: [BootFlagKind; 9] = [
        BootFlagKind::ConfigDir,
        BootFlagKind::ConfigFile,
        BootFlagKind::GenConfig,
        BootFlagKind::Pname,
        BootFlagKind::Pid,
        BootFlagKind::Bootlog,
        BootFlagKind::Daemon,
        BootFlagKind::Check,
        BootFlagKind::Help,
    ];

    /// Flags that never take a value.
    pub fn is_switch(self) -> bool {
        matches!(
            self,
            BootFlagKind::GenConfig
                | BootFlagKind::Daemon
                | BootFlagKind::Check
                | BootFlagKind::Help
        )
    }

    /// Hidden from usage where there is no daemon support.
    fn unix_only(self) -> bool {
        matches!(self, BootFlagKind::Pid | BootFlagKind::Bootlog | BootFlagKind::Daemon)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootFlag {
    pub long: String,
    pub short: String,
    pub placeholder: String,
    pub help: String,
    pub default: String,
}

impl BootFlag {
    fn new(long: &str, short: &str, placeholder: &str, help: &str) -> Self {
        Self {
            long: long.to_owned(),
            short: short.to_owned(),
            placeholder: placeholder.to_owned(),
            help: help.to_owned(),
            default: String::new(),
        }
    }

    /// `--long, -s <placeholder>`
    fn synopsis(&self) -> String {
        let mut out = String::new();
        if !self.long.is_empty() {
            out.push_str("--");
            out.push_str(&self.long);
        }
        if !self.short.is_empty() {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push('-');
            out.push_str(&self.short);
        }
        if !self.placeholder.is_empty() {
            out.push(' ');
            out.push_str(&self.placeholder);
        }
        out
    }
}

/// The boot flag table. Names and defaults can be changed per binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootFlags {
    table: BTreeMap<BootFlagKind, BootFlag>,
}

impl Default for BootFlags {
    fn default() -> Self {
        use BootFlagKind::*;
        let table = BTreeMap::from([
            (ConfigDir, BootFlag::new("config-dir", "", "<dir>", "config directory path")),
            (ConfigFile, BootFlag::new("config", "c", "<file>", "a single file config")),
            (GenConfig, BootFlag::new("gen-config", "", "", "print default config")),
            (Pname, BootFlag::new("pname", "", "<name>", "assign process name")),
            (Pid, BootFlag::new("pid", "", "<path>", "pid file path")),
            (Bootlog, BootFlag::new("bootlog", "", "<path>", "boot log path")),
            (Daemon, BootFlag::new("daemon", "d", "", "run process in background, daemonize")),
            (Check, BootFlag::new("check", "", "", "print module definitions and exit")),
            (Help, BootFlag::new("help", "h", "", "print this message")),
        ]);
        Self { table }
    }
}

impl BootFlags {
    pub fn get(&self, kind: BootFlagKind) -> &BootFlag {
        // every kind is seeded in `default()`
        &self.table[&kind]
    }

    pub fn set(&mut self, kind: BootFlagKind, long: &str, short: &str, default: &str) {
        let flag = self.table.entry(kind).or_default();
        flag.long = long.to_owned();
        flag.short = short.to_owned();
        flag.default = default.to_owned();
    }

    /// Renders the usage text, one aligned line per visible flag.
    pub fn usage(&self, program: &str) -> String {
        let lines: Vec<(String, &BootFlag)> = self
            .table
            .iter()
            .filter(|(kind, _)| cfg!(unix) || !kind.unix_only())
            .map(|(_, flag)| (flag.synopsis(), flag))
            .filter(|(synopsis, _)| !synopsis.is_empty())
            .collect();
        let width = lines.iter().map(|(synopsis, _)| synopsis.len()).max().unwrap_or(0) + 3;

        let mut out = format!("{program} flags...\n");
        for (synopsis, flag) in lines {
            let mut line = format!("    {synopsis:<width$}  {}", flag.help);
            if !flag.default.is_empty() {
                line.push_str(&format!(" (default {})", flag.default));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_lists_flags_in_table_order() {
        let usage = BootFlags::default().usage("svc");
        let lines: Vec<&str> = usage.lines().collect();
        assert_eq!(lines[0], "svc flags...");
        assert!(lines[1].trim_start().starts_with("--config-dir <dir>"));
        assert!(lines[2].trim_start().starts_with("--config, -c <file>"));
        assert!(lines.last().unwrap().trim_start().starts_with("--help, -h"));
        assert!(lines[1].ends_with("config directory path"));
    }

    #[test]
    fn daemon_flags_follow_platform() {
        let usage = BootFlags::default().usage("svc");
        assert_eq!(usage.contains("--daemon, -d"), cfg!(unix));
        assert_eq!(usage.contains("--pid <path>"), cfg!(unix));
        assert_eq!(usage.contains("--bootlog <path>"), cfg!(unix));
        assert!(usage.contains("--check"));
    }

    #[test]
    fn renamed_flag_shows_default() {
        let mut flags = BootFlags::default();
        flags.set(BootFlagKind::ConfigDir, "conf", "C", "/etc/svc");
        let flag = flags.get(BootFlagKind::ConfigDir);
        assert_eq!(flag.long, "conf");
        assert_eq!(flag.placeholder, "<dir>");

        let usage = flags.usage("svc");
        let line = usage.lines().find(|l| l.contains("--conf, -C <dir>")).unwrap();
        assert!(line.ends_with("config directory path (default /etc/svc)"));
    }

    #[test]
    fn help_texts_share_one_column() {
        let flags = BootFlags::default();
        let usage = flags.usage("svc");
        let columns: Vec<usize> = BootFlagKind::ALL
            .iter()
            .filter_map(|kind| {
                let help = flags.get(*kind).help.as_str();
                usage.lines().find_map(|line| line.find(help))
            })
            .collect();
        assert!(columns.len() >= 6);
        assert!(columns.windows(2).all(|w| w[0] == w[1]), "{columns:?}");
    }
}
