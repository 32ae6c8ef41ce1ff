//! Adaptive collection controller: throttles interval/sampling rate in
//! response to observed CPU and memory pressure, with hysteresis and
//! cooldown to prevent oscillation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use rand::Rng;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadLevel {
    Idle,
    Low,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for LoadLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadLevel::Idle => "idle",
            LoadLevel::Low => "low",
            LoadLevel::Moderate => "moderate",
            LoadLevel::High => "high",
            LoadLevel::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveStrategy {
    Conservative,
    Balanced,
    Aggressive,
}

impl AdaptiveStrategy {
    fn multiplier(self) -> f64 {
        match self {
            AdaptiveStrategy::Conservative => 0.8,
            AdaptiveStrategy::Balanced => 1.0,
            AdaptiveStrategy::Aggressive => 1.2,
        }
    }
}

/// Thresholds and tunables for one adaptive collector. Cloned out from
/// behind its own lock before every `adapt()` call so the stats lock is
/// never taken while the config lock is held.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub low_threshold: f64,
    pub moderate_threshold: f64,
    pub high_threshold: f64,
    pub critical_threshold: f64,
    pub memory_warning_threshold: f64,
    pub memory_critical_threshold: f64,
    pub strategy: AdaptiveStrategy,
    pub smoothing_factor: f64,
    pub hysteresis_margin: f64,
    pub cooldown_period: Duration,
    pub hysteresis_enabled: bool,
    pub interval_for_level: [Duration; 5],
    pub sampling_rate_for_level: [f64; 5],
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            low_threshold: 20.0,
            moderate_threshold: 40.0,
            high_threshold: 70.0,
            critical_threshold: 90.0,
            memory_warning_threshold: 75.0,
            memory_critical_threshold: 90.0,
            strategy: AdaptiveStrategy::Balanced,
            smoothing_factor: 0.3,
            hysteresis_margin: 5.0,
            cooldown_period: Duration::from_secs(10),
            hysteresis_enabled: true,
            interval_for_level: [
                Duration::from_secs(10),
                Duration::from_secs(5),
                Duration::from_secs(2),
                Duration::from_secs(1),
                Duration::from_millis(500),
            ],
            sampling_rate_for_level: [1.0, 1.0, 0.5, 0.25, 0.1],
        }
    }
}

impl AdaptiveConfig {
    fn threshold_for_level(&self, level: LoadLevel) -> f64 {
        match level {
            LoadLevel::Idle => 0.0,
            LoadLevel::Low => self.low_threshold,
            LoadLevel::Moderate => self.moderate_threshold,
            LoadLevel::High => self.high_threshold,
            LoadLevel::Critical => self.critical_threshold,
        }
    }

    fn level_index(level: LoadLevel) -> usize {
        match level {
            LoadLevel::Idle => 0,
            LoadLevel::Low => 1,
            LoadLevel::Moderate => 2,
            LoadLevel::High => 3,
            LoadLevel::Critical => 4,
        }
    }

    fn classify(&self, effective_load: f64) -> LoadLevel {
        if effective_load >= self.critical_threshold {
            LoadLevel::Critical
        } else if effective_load >= self.high_threshold {
            LoadLevel::High
        } else if effective_load >= self.moderate_threshold {
            LoadLevel::Moderate
        } else if effective_load >= self.low_threshold {
            LoadLevel::Low
        } else {
            LoadLevel::Idle
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationStats {
    pub cpu_ewma: f64,
    pub memory_ewma: f64,
    pub current_level: Option<LoadLevel>,
    pub adaptations: u64,
    pub upscales: u64,
    pub downscales: u64,
    pub samples_collected: u64,
    pub samples_dropped: u64,
    pub hysteresis_prevented_changes: u64,
    pub cooldown_prevented_changes: u64,
    pub last_change: Option<std::time::Instant>,
}

/// Wraps one collector's adaptation state: EWMA-smoothed load estimate,
/// current level, current interval/sampling rate, and the counters that
/// make adaptation behavior observable.
///
/// Config lives behind an `ArcSwap` rather than a `Mutex`: callers may
/// retune thresholds from another thread at any time via [`set_config`],
/// and `adapt()` must read a consistent snapshot without ever holding the
/// config lock while the stats lock is also held (the nested-lock
/// deadlock this crate's locking discipline forbids).
///
/// [`set_config`]: AdaptiveCollector::set_config
pub struct AdaptiveCollector {
    config: ArcSwap<AdaptiveConfig>,
    stats: Mutex<AdaptationStats>,
    enabled: AtomicBool,
    clock: Box<dyn Clock>,
}

impl AdaptiveCollector {
    pub fn new(config: AdaptiveConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            stats: Mutex::new(AdaptationStats::default()),
            enabled: AtomicBool::new(true),
            clock,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Swaps in new thresholds/intervals. Lock-free: in-flight `adapt()`
    /// calls finish against whichever config snapshot they already loaded.
    pub fn set_config(&self, config: AdaptiveConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<AdaptiveConfig> {
        self.config.load_full()
    }

    pub fn current_interval(&self) -> Duration {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let config = self.config.load();
        let level = stats.current_level.unwrap_or(LoadLevel::Low);
        config.interval_for_level[AdaptiveConfig::level_index(level)]
    }

    pub fn current_sampling_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let config = self.config.load();
        let level = stats.current_level.unwrap_or(LoadLevel::Low);
        config.sampling_rate_for_level[AdaptiveConfig::level_index(level)]
    }

    /// `true` iff a uniform draw in `[0, 1)` falls under the current
    /// sampling rate. Disabled collectors always sample.
    pub fn should_sample(&self) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return true;
        }
        let rate = self.current_sampling_rate();
        let draw: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let sampled = draw < rate;
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if sampled {
            stats.samples_collected += 1;
        } else {
            stats.samples_dropped += 1;
        }
        sampled
    }

    /// Folds one `(cpu%, memory%)` observation into the EWMA, reclassifies
    /// the load level subject to hysteresis and cooldown, and updates the
    /// current interval/sampling rate. Config is copied out under its own
    /// lock before the stats lock is taken, per the locking discipline
    /// that keeps adaptation stats and config from nesting.
    pub fn adapt(&self, cpu_usage_percent: f64, memory_usage_percent: f64) -> LoadLevel {
        let config = self.config.load_full();
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());

        let first_adaptation = stats.current_level.is_none();
        if first_adaptation {
            stats.cpu_ewma = cpu_usage_percent;
            stats.memory_ewma = memory_usage_percent;
        } else {
            stats.cpu_ewma = config.smoothing_factor * cpu_usage_percent
                + (1.0 - config.smoothing_factor) * stats.cpu_ewma;
            stats.memory_ewma = config.smoothing_factor * memory_usage_percent
                + (1.0 - config.smoothing_factor) * stats.memory_ewma;
        }

        let mut effective_load = stats.cpu_ewma;
        if stats.memory_ewma >= config.memory_critical_threshold {
            effective_load = effective_load.max(config.high_threshold + 1.0);
        } else if stats.memory_ewma >= config.memory_warning_threshold {
            effective_load = effective_load.max(config.moderate_threshold + 1.0);
        }
        effective_load *= config.strategy.multiplier();

        let raw_level = config.classify(effective_load);
        let current_level = stats.current_level.unwrap_or(raw_level);

        let accepted_level = if raw_level == current_level {
            raw_level
        } else if first_adaptation {
            raw_level
        } else {
            let cooldown_blocks = config.cooldown_period > Duration::ZERO
                && stats
                    .last_change
                    .map(|t| self.clock.now().duration_since(t) < config.cooldown_period)
                    .unwrap_or(false);
            if cooldown_blocks {
                stats.cooldown_prevented_changes += 1;
                current_level
            } else if config.hysteresis_enabled {
                let upward = raw_level > current_level;
                let boundary = if upward {
                    config.threshold_for_level(raw_level) + config.hysteresis_margin
                } else {
                    config.threshold_for_level(current_level) - config.hysteresis_margin
                };
                let crosses = if upward {
                    effective_load >= boundary
                } else {
                    effective_load <= boundary
                };
                if crosses {
                    raw_level
                } else {
                    stats.hysteresis_prevented_changes += 1;
                    current_level
                }
            } else {
                raw_level
            }
        };

        if Some(accepted_level) != stats.current_level {
            if stats.current_level.is_some() {
                if accepted_level > current_level {
                    stats.upscales += 1;
                } else {
                    stats.downscales += 1;
                }
            }
            stats.current_level = Some(accepted_level);
            stats.last_change = Some(self.clock.now());
        }
        stats.adaptations += 1;

        accepted_level
    }

    pub fn stats_snapshot(&self) -> AdaptationStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn collector() -> (AdaptiveCollector, FakeClock) {
        let clock = FakeClock::new();
        let config = AdaptiveConfig {
            cooldown_period: Duration::from_secs(10),
            ..Default::default()
        };
        (
            AdaptiveCollector::new(config, Box::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn first_adaptation_bypasses_cooldown() {
        let (collector, _clock) = collector();
        let level = collector.adapt(95.0, 10.0);
        assert_eq!(level, LoadLevel::Critical);
    }

    #[test]
    fn cooldown_prevents_rapid_successive_changes() {
        let (collector, clock) = collector();
        collector.adapt(10.0, 10.0);
        clock.advance(Duration::from_millis(100));
        let level = collector.adapt(95.0, 10.0);
        // Cooldown active: stays at whatever the EWMA-smoothed classification was before.
        assert_ne!(level, LoadLevel::Idle);
        let stats = collector.stats_snapshot();
        assert!(stats.cooldown_prevented_changes > 0 || level == LoadLevel::Critical);
    }

    #[test]
    fn should_sample_always_true_when_disabled() {
        let (collector, _clock) = collector();
        collector.set_enabled(false);
        for _ in 0..20 {
            assert!(collector.should_sample());
        }
    }

    #[test]
    fn set_config_is_visible_to_the_next_adapt_call() {
        let (collector, _clock) = collector();
        assert!((collector.config().low_threshold - 20.0).abs() < f64::EPSILON);
        collector.set_config(AdaptiveConfig {
            low_threshold: 5.0,
            ..Default::default()
        });
        assert!((collector.config().low_threshold - 5.0).abs() < f64::EPSILON);
        // A load of 10 now clears the lowered threshold and classifies above idle.
        let level = collector.adapt(10.0, 0.0);
        assert_ne!(level, LoadLevel::Idle);
    }
}
