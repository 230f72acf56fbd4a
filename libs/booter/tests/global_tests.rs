//! Exercises the process-wide booter. Kept in its own test binary: the
//! default booter is shared by every test in a process.

use std::sync::Arc;
use std::time::Duration;

use booter::{global, Bind, Builder, FactoryRegistry, Module, Signal};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default, Bind)]
struct PeerConf {
    greeting: String,
}

struct Peer;

impl Module for Peer {
    fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Looks its neighbours up through the default booter, then asks the
/// launcher to wake up.
struct Waker {
    log: Log,
}

impl Module for Waker {
    fn start(&self) -> anyhow::Result<()> {
        let peer = global::get_instance_as::<Peer>("peer").is_some();
        let greeting = global::get_config_as::<PeerConf>("peer").map(|c| c.greeting.clone());
        let priority = global::get_definition("waker").map(|d| d.priority);
        self.log
            .lock()
            .push(format!("peer={peer} greeting={greeting:?} priority={priority:?}"));

        std::thread::spawn(|| {
            for _ in 0..1000 {
                if global::notify_signal() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.log.lock().push("stop waker".into());
    }
}

#[tokio::test]
async fn modules_reach_the_installed_booter() {
    assert!(global::current().is_none());
    assert!(!global::notify_signal());
    assert!(!global::add_shutdown_hook(|| {}));
    assert!(global::get_instance("peer").is_none());
    assert_eq!(global::wait_signal().await.unwrap(), None);

    let log = Log::default();
    let registry = Arc::new(FactoryRegistry::new());
    registry.register_typed("peer", PeerConf::default, |_: &PeerConf| Ok(Peer));
    let l = log.clone();
    registry.register_typed("waker", PeerConf::default, move |_: &PeerConf| {
        Ok(Waker { log: l.clone() })
    });

    let booter = Builder::new(registry)
        .build_with_content(
            r#"
module "peer" {
  priority = 1
  config {
    greeting = "hi"
  }
}
module "waker" {
  priority = 2
}
"#,
        )
        .unwrap();
    global::set_default(&booter);
    booter.startup().unwrap();

    let sig = tokio::time::timeout(Duration::from_secs(5), global::wait_signal())
        .await
        .expect("no signal delivered")
        .unwrap();
    assert_eq!(sig, Some(Signal::Interrupt));

    let l = log.clone();
    assert!(global::add_shutdown_hook(move || l.lock().push("global hook".into())));
    booter.shutdown();

    assert_eq!(
        *log.lock(),
        [
            "peer=true greeting=Some(\"hi\") priority=Some(2)",
            "global hook",
            "stop waker",
        ]
    );
    assert!(global::take_default().is_some());
    assert!(global::current().is_none());
}
