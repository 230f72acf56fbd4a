use std::process::ExitCode;
use std::sync::Arc;

use booter::FactoryRegistry;
use booter_bootstrap::Launcher;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_CONFIG: &str = include_str!("../config/default.hcl");

fn launcher(registry: Arc<FactoryRegistry>) -> Launcher {
    heartbeat::register(&registry);
    let mut launcher = Launcher::new(registry);
    launcher
        .set_fallback_config(DEFAULT_CONFIG)
        .set_fallback_pname(env!("CARGO_PKG_NAME"))
        .set_version_string(env!("CARGO_PKG_VERSION"));
    launcher
}

fn main() -> ExitCode {
    launcher(FactoryRegistry::global()).run(std::env::args())
}

#[cfg(test)]
mod tests {
    use super::*;
    use booter_bootstrap::LaunchAction;

    #[test]
    fn default_config_builds() {
        let mut launcher = launcher(Arc::new(FactoryRegistry::new()));
        let LaunchAction::Check(options) = launcher.parse_flags(["--check"]).unwrap() else {
            panic!("expected Check");
        };
        assert_eq!(options.pname, "booter-server");

        let yaml = launcher.check(&options).unwrap();
        let heartbeat = yaml.find("id: heartbeat").unwrap();
        let reporter = yaml.find("id: reporter").unwrap();
        assert!(heartbeat < reporter, "{yaml}");
        assert!(yaml.contains("label: booter-server-"), "{yaml}");
        assert!(yaml.contains("target: reporter"), "{yaml}");
    }

    #[test]
    fn gen_config_prints_the_embedded_default() {
        let launcher = launcher(Arc::new(FactoryRegistry::new()));
        assert_eq!(
            launcher.parse_flags(["--gen-config"]).unwrap(),
            LaunchAction::GenConfig(DEFAULT_CONFIG.to_owned())
        );
    }
}
