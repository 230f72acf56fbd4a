use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use booter::{downcast_module, InjectError, Module, ModuleRef};

use crate::config::{HeartbeatConfig, ReporterConfig};
use crate::ticker::Ticker;

/// Counts beats on a task of the ambient tokio runtime.
pub struct Heartbeat {
    config: HeartbeatConfig,
    beats: Arc<AtomicU64>,
    ticker: Ticker,
}

impl Heartbeat {
    pub fn new(config: &HeartbeatConfig) -> anyhow::Result<Self> {
        if config.interval.is_zero() {
            anyhow::bail!("heartbeat interval must be positive");
        }
        Ok(Self {
            config: config.clone(),
            beats: Arc::new(AtomicU64::new(0)),
            ticker: Ticker::default(),
        })
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }
}

impl Module for Heartbeat {
    fn start(&self) -> anyhow::Result<()> {
        let beats = self.beats.clone();
        let label = self.config.label.clone();
        self.ticker.start(&self.config.label, self.config.interval, move || {
            let n = beats.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(label = %label, beats = n, "beat");
        })?;
        tracing::info!(
            label = %self.config.label,
            interval = ?self.config.interval,
            "heartbeat started"
        );
        Ok(())
    }

    fn stop(&self) {
        self.ticker.stop();
        tracing::info!(label = %self.config.label, beats = self.beats(), "heartbeat stopped");
    }
}

/// Periodically logs the beat count of a [`Heartbeat`]. The heartbeat's
/// definition declares `inject "<reporter>" "Heartbeat" {}`.
pub struct Reporter {
    config: ReporterConfig,
    source: ArcSwapOption<Heartbeat>,
    ticker: Ticker,
}

impl Reporter {
    pub const HEARTBEAT_POINT: &'static str = "Heartbeat";

    pub fn new(config: &ReporterConfig) -> anyhow::Result<Self> {
        if config.every.is_zero() {
            anyhow::bail!("reporter period must be positive");
        }
        Ok(Self {
            config: config.clone(),
            source: ArcSwapOption::empty(),
            ticker: Ticker::default(),
        })
    }

    pub fn heartbeat(&self) -> Option<Arc<Heartbeat>> {
        self.source.load_full()
    }
}

impl Module for Reporter {
    fn start(&self) -> anyhow::Result<()> {
        let Some(heartbeat) = self.heartbeat() else {
            anyhow::bail!("reporter needs a heartbeat injected at {:?}", Self::HEARTBEAT_POINT);
        };
        self.ticker.start("reporter", self.config.every, move || {
            tracing::info!(label = %heartbeat.label(), beats = heartbeat.beats(), "report");
        })
    }

    fn stop(&self) {
        self.ticker.stop();
    }

    fn inject(&self, point: &str, source: &ModuleRef) -> Result<(), InjectError> {
        match point {
            Self::HEARTBEAT_POINT => {
                let heartbeat =
                    downcast_module::<Heartbeat>(source).ok_or(InjectError::TypeMismatch {
                        point: point.to_owned(),
                        expected: "Heartbeat",
                    })?;
                self.source.store(Some(heartbeat));
                Ok(())
            }
            _ => Err(InjectError::UnknownPoint(point.to_owned())),
        }
    }
}
