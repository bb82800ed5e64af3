//! ECAN: the Economic Attention Network.
//! Periodically decays STI, spreads it through the hypergraph and forgets
//! the least important atoms.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::atom::AtomId;
use crate::atomspace::{AtomSpace, SharedAtomSpace};
use crate::error::EcanError;

pub const MIN_UPDATE_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcanConfig {
    /// Share of |STI| removed per decay step.
    pub decay_percentage: f64,
    /// Upper bound on the share of STI spread per cycle. Validated and
    /// kept, spreading itself uses a fixed fraction.
    pub max_spread_percentage: f64,
    pub update_interval_ms: u64,
    /// Share of the forgettable atoms removed per cycle, rounded up.
    pub forget_percentage: f64,
}

impl Default for EcanConfig {
    fn default() -> Self {
        Self {
            decay_percentage: 0.05,
            max_spread_percentage: 0.5,
            update_interval_ms: 100,
            forget_percentage: 0.05,
        }
    }
}

impl EcanConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EcanError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EcanError> {
        check_percentage("decay percentage", self.decay_percentage)?;
        check_percentage("max spread percentage", self.max_spread_percentage)?;
        check_percentage("forget percentage", self.forget_percentage)?;
        check_interval(self.update_interval_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

fn check_percentage(name: &'static str, value: f64) -> Result<(), EcanError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EcanError::InvalidPercentage { name, value })
    }
}

fn check_interval(ms: u64) -> Result<(), EcanError> {
    if ms < MIN_UPDATE_INTERVAL_MS {
        return Err(EcanError::IntervalTooShort {
            value: ms,
            min: MIN_UPDATE_INTERVAL_MS,
        });
    }
    Ok(())
}

/// What one cycle did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub decayed: usize,
    pub spread_sources: usize,
    pub focus_size: usize,
    pub forgotten: Vec<AtomId>,
}

/// Remove the lowest-STI `ceil(fraction * n)` of the `n` forgettable atoms.
pub fn forget_atoms(space: &mut AtomSpace, fraction: f64) -> Vec<AtomId> {
    let mut forgettable: Vec<(f64, AtomId)> = space
        .get_forgettable_atoms()
        .iter()
        .map(|a| (a.attention_value().sti, a.id()))
        .collect();
    let count = (forgettable.len() as f64 * fraction).ceil() as usize;
    forgettable.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(CmpOrdering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let mut forgotten = Vec::with_capacity(count);
    for (_, id) in forgettable.into_iter().take(count) {
        if space.remove_atom(id) {
            forgotten.push(id);
        }
    }
    forgotten
}

/// One full cycle: decay, spread, forget.
pub fn run_cycle(space: &mut AtomSpace, config: &EcanConfig) -> CycleReport {
    let decayed = space.update_attention();
    let spread_sources = space.spread_activation();
    let forgotten = forget_atoms(space, config.forget_percentage);
    CycleReport {
        decayed,
        spread_sources,
        focus_size: space.attention_bank().focus().len(),
        forgotten,
    }
}

struct Run {
    // Per-run flag, so a stale task can never see a later start.
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Drives [`run_cycle`] on a timer over a shared AtomSpace.
pub struct Ecan {
    space: SharedAtomSpace,
    config: Arc<Mutex<EcanConfig>>,
    run: Option<Run>,
}

impl Ecan {
    pub fn new(space: SharedAtomSpace, config: EcanConfig) -> Result<Self, EcanError> {
        config.validate()?;
        space.write().set_attention_decay(config.decay_percentage);
        Ok(Self {
            space,
            config: Arc::new(Mutex::new(config)),
            run: None,
        })
    }

    pub fn space(&self) -> &SharedAtomSpace {
        &self.space
    }

    pub fn config(&self) -> EcanConfig {
        self.config.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Run one cycle now, on the caller's thread.
    pub fn tick(&self) -> CycleReport {
        let config = self.config();
        let mut space = self.space.write();
        run_cycle(&mut space, &config)
    }

    /// Start cycling on the current tokio runtime. The first cycle runs
    /// immediately. No-op if already running.
    pub fn start(&mut self) -> Result<(), EcanError> {
        if self.run.is_some() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| EcanError::NoRuntime)?;
        let active = Arc::new(AtomicBool::new(true));
        let task = handle.spawn(cycle_loop(
            self.space.clone(),
            self.config.clone(),
            active.clone(),
        ));
        self.run = Some(Run { active, task });
        tracing::info!("ECAN started");
        Ok(())
    }

    /// Stop cycling. Once this returns no further cycle begins.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        {
            // A cycle holds the write lock for its whole body, so taking it
            // here waits out any cycle in flight.
            let _space = self.space.write();
            run.active.store(false, Ordering::Release);
        }
        run.task.abort();
        tracing::info!("ECAN stopped");
    }

    pub fn set_decay_percentage(&self, percentage: f64) -> Result<(), EcanError> {
        check_percentage("decay percentage", percentage)?;
        self.space.write().set_attention_decay(percentage);
        self.config.lock().decay_percentage = percentage;
        Ok(())
    }

    pub fn set_max_spread_percentage(&self, percentage: f64) -> Result<(), EcanError> {
        check_percentage("max spread percentage", percentage)?;
        self.config.lock().max_spread_percentage = percentage;
        Ok(())
    }

    pub fn set_forget_percentage(&self, percentage: f64) -> Result<(), EcanError> {
        check_percentage("forget percentage", percentage)?;
        self.config.lock().forget_percentage = percentage;
        Ok(())
    }

    /// Takes effect from the next scheduled wait.
    pub fn set_update_interval(&self, ms: u64) -> Result<(), EcanError> {
        check_interval(ms)?;
        self.config.lock().update_interval_ms = ms;
        Ok(())
    }
}

impl Drop for Ecan {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn cycle_loop(space: SharedAtomSpace, config: Arc<Mutex<EcanConfig>>, active: Arc<AtomicBool>) {
    loop {
        let interval = {
            let mut space = space.write();
            if !active.load(Ordering::Acquire) {
                break;
            }
            let config = config.lock().clone();
            let report = run_cycle(&mut space, &config);
            tracing::debug!(
                decayed = report.decayed,
                spread = report.spread_sources,
                focus = report.focus_size,
                forgotten = report.forgotten.len(),
                atoms = space.size(),
                "ECAN cycle"
            );
            config.update_interval()
        };
        tokio::time::sleep(interval).await;
    }
}
