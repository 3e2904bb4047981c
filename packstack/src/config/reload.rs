//! Reload behaviour settings.

use std::fmt;
use std::str::FromStr;

/// Default number of background workers; `0` uses one per CPU.
pub const DEFAULT_WORKERS: usize = 0;

/// When a [`ResourceDirectory`](crate::directory::ResourceDirectory)
/// switches to the resolver built for a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapTiming {
    /// Swap as the reload begins; queries see new resources while listeners
    /// are still rebuilding.
    #[default]
    BeforeReload,
    /// Keep serving the old resolver until the reload succeeds. A failed
    /// reload leaves the old resolver in place.
    OnSuccess,
}

impl fmt::Display for SwapTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapTiming::BeforeReload => write!(f, "before_reload"),
            SwapTiming::OnSuccess => write!(f, "on_success"),
        }
    }
}

impl FromStr for SwapTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before_reload" | "before" | "begin" => Ok(SwapTiming::BeforeReload),
            "on_success" | "success" | "after" => Ok(SwapTiming::OnSuccess),
            other => Err(format!(
                "unknown swap timing '{}' (expected 'before_reload' or 'on_success')",
                other
            )),
        }
    }
}

/// Whether reloads record per-listener timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileMode {
    /// Profile when `tracing` debug output is enabled.
    #[default]
    Auto,
    /// Always profile.
    Always,
    /// Never profile.
    Never,
}

impl ProfileMode {
    /// Resolve the mode against the current subscriber.
    pub fn is_enabled(&self) -> bool {
        match self {
            ProfileMode::Auto => tracing::enabled!(tracing::Level::DEBUG),
            ProfileMode::Always => true,
            ProfileMode::Never => false,
        }
    }
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileMode::Auto => write!(f, "auto"),
            ProfileMode::Always => write!(f, "always"),
            ProfileMode::Never => write!(f, "never"),
        }
    }
}

impl FromStr for ProfileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ProfileMode::Auto),
            "always" | "on" | "true" => Ok(ProfileMode::Always),
            "never" | "off" | "false" => Ok(ProfileMode::Never),
            other => Err(format!(
                "unknown profile mode '{}' (expected 'auto', 'always' or 'never')",
                other
            )),
        }
    }
}

/// Settings of a [`ResourceDirectory`](crate::directory::ResourceDirectory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadConfig {
    /// Background worker threads; `0` uses one per CPU.
    pub workers: usize,
    /// Whether reloads are profiled.
    pub profile: ProfileMode,
    /// When the new resolver becomes current.
    pub swap: SwapTiming,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            profile: ProfileMode::default(),
            swap: SwapTiming::default(),
        }
    }
}

impl ReloadConfig {
    /// Set the number of background workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the profile mode.
    pub fn with_profile(mut self, profile: ProfileMode) -> Self {
        self.profile = profile;
        self
    }

    /// Set the swap timing.
    pub fn with_swap(mut self, swap: SwapTiming) -> Self {
        self.swap = swap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReloadConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.profile, ProfileMode::Auto);
        assert_eq!(config.swap, SwapTiming::BeforeReload);
    }

    #[test]
    fn test_builder() {
        let config = ReloadConfig::default()
            .with_workers(4)
            .with_profile(ProfileMode::Never)
            .with_swap(SwapTiming::OnSuccess);
        assert_eq!(config.workers, 4);
        assert_eq!(config.profile, ProfileMode::Never);
        assert_eq!(config.swap, SwapTiming::OnSuccess);
    }

    #[test]
    fn test_swap_timing_parse_and_display() {
        assert_eq!("on_success".parse::<SwapTiming>(), Ok(SwapTiming::OnSuccess));
        assert_eq!(" Before ".parse::<SwapTiming>(), Ok(SwapTiming::BeforeReload));
        assert!("later".parse::<SwapTiming>().is_err());
        assert_eq!(SwapTiming::OnSuccess.to_string(), "on_success");
    }

    #[test]
    fn test_profile_mode() {
        assert_eq!("ALWAYS".parse::<ProfileMode>(), Ok(ProfileMode::Always));
        assert_eq!("off".parse::<ProfileMode>(), Ok(ProfileMode::Never));
        assert!("sometimes".parse::<ProfileMode>().is_err());
        assert!(ProfileMode::Always.is_enabled());
        assert!(!ProfileMode::Never.is_enabled());
    }
}
