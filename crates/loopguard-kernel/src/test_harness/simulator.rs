//! Render-storm simulator
//!
//! Drives a [`GuardRuntime`] with a seeded mix of quiet components and one
//! storming component, then checks the containment properties: the storm is
//! rate-limited, quiet components stay unaffected, emergency mode engages and
//! can be cleared, and diagnostics stay bounded.

use crate::config::{DiagnosticsConfig, GuardConfig, GuardOptions, MonitorConfig};
use crate::guard::{GuardedSetter, REASON_EMERGENCY};
use crate::runtime::GuardRuntime;
use crate::types::ComponentId;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of quiet components alongside the storming one
    pub quiet_components: usize,
    /// Total update attempts to issue
    pub total_updates: u64,
    /// Probability an attempt targets the storming component
    pub storm_ratio: f64,
    /// Per-component budget handed to the monitor
    pub max_updates_per_component: usize,
    /// Diagnostics ring capacity
    pub diagnostics_capacity: usize,
    /// Stop at the first violation instead of collecting all of them
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            quiet_components: 4,
            total_updates: 2_000,
            storm_ratio: 0.9,
            max_updates_per_component: 25,
            diagnostics_capacity: 200,
            stop_on_first_violation: false,
        }
    }
}

/// A containment property the simulator found violated
#[derive(Debug, Clone)]
pub enum Violation {
    /// The storming component applied more updates than its budget allows
    StormNotContained { applied: u64, budget: usize },
    /// A quiet component was rate-limited even though it stayed under budget
    QuietComponentBlocked {
        component: ComponentId,
        attempts: u64,
        reason: String,
    },
    /// The diagnostics buffer grew past its configured capacity
    DiagnosticsOverCapacity { len: usize, capacity: usize },
    /// The storm crossed the escalation threshold without engaging emergency
    /// mode
    EmergencyNeverEngaged { storm_attempts: u64, threshold: usize },
    /// Emergency mode survived an explicit clear
    EmergencyStuck,
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub total_updates: u64,
    pub applied: u64,
    pub blocked: u64,
    pub emergency_blocks: u64,
    pub attempts_by_component: HashMap<ComponentId, u64>,
    pub applied_by_component: HashMap<ComponentId, u64>,
}

/// Final report from the simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
    pub flagged_components: Vec<ComponentId>,
    pub emergency_engaged: bool,
}

impl SimulatorReport {
    /// Whether every containment property held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Render-Storm Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Total Updates: {}\n", self.stats.total_updates));
        report.push_str(&format!("Applied: {}\n", self.stats.applied));
        report.push_str(&format!("Blocked: {}\n", self.stats.blocked));
        report.push_str(&format!(
            "Emergency Blocks: {}\n",
            self.stats.emergency_blocks
        ));
        report.push_str(&format!(
            "Emergency Engaged: {}\n",
            self.emergency_engaged
        ));
        report.push_str(&format!(
            "Flagged Components: {}\n",
            self.flagged_components.len()
        ));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Run the render-storm simulator.
///
/// Deduplication and throttling are disabled so outcomes are a pure function
/// of the seed; every attempt is applied or blocked synchronously.
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let runtime = GuardRuntime::new(
        GuardConfig::new()
            .with_monitor(
                MonitorConfig::new()
                    .with_max_updates_per_component(config.max_updates_per_component)
                    .with_max_updates_per_second(usize::MAX),
            )
            .with_diagnostics(
                DiagnosticsConfig::new()
                    .enabled()
                    .with_capacity(config.diagnostics_capacity),
            ),
    );
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    let storm = ComponentId::new("storm");
    let quiet: Vec<ComponentId> = (0..config.quiet_components)
        .map(|i| ComponentId::new(format!("quiet-{i}")))
        .collect();

    let mut setters: HashMap<ComponentId, (GuardedSetter<u64>, Arc<AtomicU64>)> = HashMap::new();
    for component in std::iter::once(&storm).chain(quiet.iter()) {
        let applied = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&applied);
        let setter = runtime.guarded_setter(
            move |_value: u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            GuardOptions::new(component.clone(), "value")
                .with_deduplication(false)
                .with_throttling(false),
        );
        setters.insert(component.clone(), (setter, applied));
    }

    let mut emergency_engaged = false;

    for i in 0..config.total_updates {
        let component = if rng.gen_bool(config.storm_ratio) || quiet.is_empty() {
            storm.clone()
        } else {
            quiet[rng.gen_range(0..quiet.len())].clone()
        };

        let (setter, _) = &setters[&component];
        let result = setter.set(i);
        stats.total_updates += 1;
        *stats.attempts_by_component.entry(component.clone()).or_insert(0) += 1;

        if result.success {
            stats.applied += 1;
            *stats.applied_by_component.entry(component.clone()).or_insert(0) += 1;
        } else {
            stats.blocked += 1;
            let reason = result.reason.as_deref().unwrap_or("");
            if reason == REASON_EMERGENCY {
                stats.emergency_blocks += 1;
            } else if component != storm {
                violations.push(Violation::QuietComponentBlocked {
                    component: component.clone(),
                    attempts: stats.attempts_by_component[&component],
                    reason: reason.to_string(),
                });
                if config.stop_on_first_violation {
                    break;
                }
            }
        }

        if runtime.monitor().is_emergency_mode() {
            emergency_engaged = true;
        }
    }

    let storm_applied = setters[&storm].1.load(Ordering::SeqCst);
    if storm_applied > config.max_updates_per_component as u64 {
        violations.push(Violation::StormNotContained {
            applied: storm_applied,
            budget: config.max_updates_per_component,
        });
    }

    let storm_attempts = stats.attempts_by_component.get(&storm).copied().unwrap_or(0);
    let threshold = runtime.config().monitor.escalation_threshold();
    if storm_attempts > threshold as u64 && !emergency_engaged {
        violations.push(Violation::EmergencyNeverEngaged {
            storm_attempts,
            threshold,
        });
    }

    let diag_len = runtime.diagnostics().len();
    if diag_len > config.diagnostics_capacity {
        violations.push(Violation::DiagnosticsOverCapacity {
            len: diag_len,
            capacity: config.diagnostics_capacity,
        });
    }

    runtime.monitor().clear_emergency();
    if runtime.monitor().is_emergency_mode() {
        violations.push(Violation::EmergencyStuck);
    }

    SimulatorReport {
        config,
        stats,
        violations,
        flagged_components: runtime.detector().flagged_components(),
        emergency_engaged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_simulation_passes() {
        let report = run_simulator(SimulatorConfig::default());
        assert!(report.passed(), "{}", report.generate_text());
        assert!(report.emergency_engaged);
        assert!(report.stats.blocked > 0);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = run_simulator(SimulatorConfig::default());
        let b = run_simulator(SimulatorConfig::default());
        assert_eq!(a.stats.applied, b.stats.applied);
        assert_eq!(a.stats.blocked, b.stats.blocked);
    }

    #[test]
    fn quiet_only_simulation_never_escalates() {
        let report = run_simulator(SimulatorConfig {
            storm_ratio: 0.0,
            total_updates: 50,
            quiet_components: 10,
            ..Default::default()
        });
        assert!(report.passed(), "{}", report.generate_text());
        assert!(!report.emergency_engaged);
        assert_eq!(report.stats.blocked, 0);
    }
}
