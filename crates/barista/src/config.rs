//! Preparation timing and batching configuration.

use std::time::Duration;

use crate::error::ConfigError;
use crate::kind::{Kind, PerKind};

/// Default number of units moved into preparation per batch.
pub const DEFAULT_BATCH_SIZE: u32 = 2;

/// Default preparation time for tea.
pub const DEFAULT_TEA_PREPARATION: Duration = Duration::from_secs(30);

/// Default preparation time for coffee.
pub const DEFAULT_COFFEE_PREPARATION: Duration = Duration::from_secs(45);

/// How the scheduler batches and times preparation.
///
/// # Example
///
/// ```ignore
/// let config = CafeConfig::default()
///     .with_batch_size(3)
///     .with_preparation(Kind::Coffee, Duration::from_secs(60));
/// config.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CafeConfig {
    /// Upper bound on units of one kind moved into preparation at once.
    pub batch_size: u32,
    /// Fixed preparation time per kind. Kinds run independently.
    pub preparation: PerKind<Duration>,
}

impl Default for CafeConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            preparation: PerKind::new(DEFAULT_TEA_PREPARATION, DEFAULT_COFFEE_PREPARATION),
        }
    }
}

impl CafeConfig {
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_preparation(mut self, kind: Kind, duration: Duration) -> Self {
        self.preparation[kind] = duration;
        self
    }

    pub fn preparation_for(&self, kind: Kind) -> Duration {
        self.preparation[kind]
    }

    /// Reject settings that would stall or spin the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        for (kind, duration) in self.preparation.iter() {
            if duration.is_zero() {
                return Err(ConfigError::ZeroPreparation {
                    kind,
                    duration: *duration,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CafeConfig::default();
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.preparation_for(Kind::Tea), Duration::from_secs(30));
        assert_eq!(config.preparation_for(Kind::Coffee), Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = CafeConfig::default()
            .with_batch_size(5)
            .with_preparation(Kind::Tea, Duration::from_millis(10));
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.preparation_for(Kind::Tea), Duration::from_millis(10));
        assert_eq!(config.preparation_for(Kind::Coffee), Duration::from_secs(45));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = CafeConfig::default().with_batch_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = CafeConfig::default().with_preparation(Kind::Coffee, Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPreparation {
                kind: Kind::Coffee,
                duration: Duration::ZERO,
            })
        );
    }
}
