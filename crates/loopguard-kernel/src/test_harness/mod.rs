// Test harness module
// Seeded render-storm simulation against a full guard runtime

pub mod simulator;

pub use simulator::*;

/// Harness for running stress and certification simulations
pub struct TestHarness;

impl TestHarness {
    /// Run a stress test with the given size parameters
    #[must_use]
    pub fn run_stress_test(quiet_components: usize, updates: u64) -> StressTestReport {
        let config = SimulatorConfig {
            seed: 12345,
            quiet_components,
            total_updates: updates,
            ..Default::default()
        };

        let report = run_simulator(config);

        StressTestReport {
            quiet_components,
            updates,
            violations: report.violations.len(),
            success: report.passed(),
        }
    }

    /// Run the default simulation across several seeds
    #[must_use]
    pub fn run_certification(seeds: u64) -> CertificationReport {
        let mut all_passed = true;
        let mut total_violations = 0;

        for seed in 0..seeds {
            let config = SimulatorConfig {
                seed,
                ..Default::default()
            };
            let report = run_simulator(config);
            if !report.passed() {
                all_passed = false;
            }
            total_violations += report.violations.len();
        }

        CertificationReport {
            passed: all_passed && total_violations == 0,
            total_violations,
            seeds_tested: seeds,
        }
    }
}

/// Report from a stress test
#[derive(Debug, Clone)]
pub struct StressTestReport {
    pub quiet_components: usize,
    pub updates: u64,
    pub violations: usize,
    pub success: bool,
}

/// Report from certification
#[derive(Debug, Clone)]
pub struct CertificationReport {
    pub passed: bool,
    pub total_violations: usize,
    pub seeds_tested: u64,
}
