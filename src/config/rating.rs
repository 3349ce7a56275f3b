//! Rating system configuration

use crate::error::Result;
use crate::rating::{EloConfig, OpenSkillConfig, WhrConfig};
use serde::{Deserialize, Serialize};

/// Policy parameters of all three rating systems
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub elo: EloConfig,
    pub openskill: OpenSkillConfig,
    pub whr: WhrConfig,
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        self.elo.validate()?;
        self.openskill.validate()?;
        self.whr.validate()?;
        Ok(())
    }
}
