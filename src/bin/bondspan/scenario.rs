//! TOML scenario describing the demo chain and its migration schedule.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// A scripted multi-rank run: a bonded chain seeded on rank 0, then a number
/// of rounds in which each rank ships its highest-id particles to the right
/// neighbor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Number of in-process ranks (threads).
    pub ranks: usize,
    /// Migration rounds driven after the initial decomposition.
    pub rounds: usize,
    /// Particles each rank ships to its right neighbor per round.
    pub batch: usize,
    pub chain: Chain,
    pub lists: Lists,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Chain {
    /// Chain length; particle ids run 1..=particles.
    pub particles: u64,
    /// Distance between consecutive chain particles.
    pub spacing: f64,
}

/// Which relationship kinds to build over the chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Lists {
    /// Tag every odd-id particle.
    pub tags: bool,
    /// Bond consecutive particles.
    pub bonds: bool,
    /// Bond consecutive particles with a rest length frozen at creation.
    pub rest_lengths: bool,
    /// Angle over every consecutive triple.
    pub angles: bool,
    /// Dihedral over every consecutive quadruple.
    pub dihedrals: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            ranks: 2,
            rounds: 3,
            batch: 2,
            chain: Chain::default(),
            lists: Lists::default(),
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self { particles: 8, spacing: 1.0 }
    }
}

impl Default for Lists {
    fn default() -> Self {
        Self { tags: true, bonds: true, rest_lengths: true, angles: true, dihedrals: true }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranks == 0 {
            bail!("scenario needs at least one rank");
        }
        if self.chain.particles == 0 {
            bail!("scenario needs at least one chain particle");
        }
        if self.batch == 0 {
            bail!("batch must be at least 1");
        }
        if !(self.chain.spacing.is_finite() && self.chain.spacing > 0.0) {
            bail!("chain spacing must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_all_defaults() {
        let scenario: Scenario = toml::from_str("").unwrap();
        assert_eq!(scenario.ranks, 2);
        assert_eq!(scenario.chain.particles, 8);
        assert!(scenario.lists.dihedrals);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn partial_document_overrides_selectively() {
        let scenario: Scenario = toml::from_str(
            "ranks = 3\nrounds = 1\n\n[chain]\nparticles = 12\n\n[lists]\ndihedrals = false\n",
        )
        .unwrap();
        assert_eq!(scenario.ranks, 3);
        assert_eq!(scenario.chain.particles, 12);
        assert!((scenario.chain.spacing - 1.0).abs() < f64::EPSILON);
        assert!(scenario.lists.bonds);
        assert!(!scenario.lists.dihedrals);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Scenario>("rnaks = 2\n").is_err());
    }

    #[test]
    fn zero_ranks_fail_validation() {
        let scenario: Scenario = toml::from_str("ranks = 0\n").unwrap();
        assert!(scenario.validate().is_err());
    }
}
