//! Attention values for the economic attention network.

use std::fmt;

use serde::Serialize;

/// Attention value: short-term importance (STI), long-term importance (LTI)
/// and the very-long-term flag that protects an atom from being forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AttentionValue {
    pub sti: f64,
    pub lti: f64,
    pub vlti: bool,
}

impl AttentionValue {
    pub const DISPOSABLE: f64 = -80.0;
    pub const NONDISPOSABLE: f64 = -20.0;
    pub const NORMAL: f64 = 0.0;
    pub const NOTICEABLE: f64 = 50.0;
    pub const HIGH: f64 = 80.0;
    pub const VERY_HIGH: f64 = 100.0;
    /// Symmetric bound for STI: [-MAXIMUM, MAXIMUM].
    pub const MAXIMUM: f64 = 300.0;

    pub fn new(sti: f64, lti: f64, vlti: bool) -> Self {
        Self { sti, lti, vlti }
    }

    pub fn with_sti(sti: f64) -> Self {
        Self {
            sti,
            ..Self::default()
        }
    }

    /// Above the noticeable threshold, so it may spread activation.
    pub fn is_spreadable(&self) -> bool {
        self.sti > Self::NOTICEABLE
    }

    /// Below the disposable threshold and not protected by VLTI.
    pub fn is_disposable(&self) -> bool {
        !self.vlti && self.sti < Self::DISPOSABLE
    }

    pub fn decay_sti(&mut self, amount: f64) {
        self.sti -= amount;
    }

    pub fn decay_lti(&mut self, amount: f64) {
        self.lti -= amount;
    }
}

impl fmt::Display for AttentionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "av(sti:{:.1}, lti:{:.1}, vlti:{})",
            self.sti, self.lti, self.vlti
        )
    }
}
