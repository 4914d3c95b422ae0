//! Drawdown kill-switch.
//!
//! Two states, transitioned only at bar boundaries after the equity snapshot:
//! Active → Halted when running drawdown exceeds the limit, Halted → Active
//! once the position is flat and drawdown is back within the limit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskState {
    Active,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTransition {
    Halted,
    Resumed,
}

#[derive(Debug, Clone)]
pub struct DrawdownMonitor {
    max_drawdown: f64,
    peak_equity: f64,
    state: RiskState,
}

impl DrawdownMonitor {
    pub fn new(initial_equity: f64, max_drawdown: f64) -> Self {
        DrawdownMonitor {
            max_drawdown,
            peak_equity: initial_equity,
            state: RiskState::Active,
        }
    }

    pub fn state(&self) -> RiskState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == RiskState::Halted
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Fractional decline from the running peak, without updating it.
    pub fn drawdown(&self, equity: f64) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        ((self.peak_equity - equity) / self.peak_equity).max(0.0)
    }

    /// Record the bar-close equity and transition if needed.
    pub fn on_bar_close(&mut self, equity: f64, is_flat: bool) -> Option<RiskTransition> {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let breached = self.drawdown(equity) > self.max_drawdown;

        match self.state {
            RiskState::Active if breached => {
                self.state = RiskState::Halted;
                Some(RiskTransition::Halted)
            }
            RiskState::Halted if is_flat && !breached => {
                self.state = RiskState::Active;
                Some(RiskTransition::Resumed)
            }
            _ => None,
        }
    }
}
