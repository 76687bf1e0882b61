use clap::{value_parser, Arg, ArgAction, Command};
use loopguard_kernel::config::{DiagnosticsConfig, GuardConfig, GuardOptions, MonitorConfig};
use loopguard_kernel::runtime::GuardRuntime;
use loopguard_kernel::test_harness::{run_simulator, SimulatorConfig, TestHarness};
use loopguard_kernel::types::ComponentId;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Command::new("loopguard")
        .version(loopguard_kernel::VERSION)
        .about("Render-loop guard kernel")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Run the render-storm simulator")
                .arg(
                    Arg::new("updates")
                        .long("updates")
                        .default_value("2000")
                        .value_parser(value_parser!(u64))
                        .help("Number of update attempts to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("storm-ratio")
                        .long("storm-ratio")
                        .default_value("0.9")
                        .value_parser(value_parser!(f64))
                        .help("Share of attempts targeting the storming component"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(
            Command::new("stress")
                .about("Run a stress test")
                .arg(
                    Arg::new("components")
                        .long("components")
                        .default_value("16")
                        .value_parser(value_parser!(usize))
                        .help("Number of quiet components"),
                )
                .arg(
                    Arg::new("updates")
                        .long("updates")
                        .default_value("50000")
                        .value_parser(value_parser!(u64))
                        .help("Number of update attempts"),
                ),
        )
        .subcommand(
            Command::new("certify")
                .about("Run the simulator across multiple seeds")
                .arg(
                    Arg::new("seeds")
                        .long("seeds")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Number of seeds to test"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Run a short storm against a live runtime and export its diagnostics")
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the JSON export"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let updates = *args.get_one::<u64>("updates").unwrap();
            let seed = *args.get_one::<u64>("seed").unwrap();
            let storm_ratio = *args.get_one::<f64>("storm-ratio").unwrap();
            let stop_on_violation = args.get_flag("stop-on-violation");

            let config = SimulatorConfig {
                seed,
                total_updates: updates,
                storm_ratio,
                stop_on_first_violation: stop_on_violation,
                ..Default::default()
            };

            let report = run_simulator(config);
            println!("{}", report.generate_text());
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("stress", args)) => {
            let components = *args.get_one::<usize>("components").unwrap();
            let updates = *args.get_one::<u64>("updates").unwrap();

            let report = TestHarness::run_stress_test(components, updates);
            println!("Stress Test Report:");
            println!("  Quiet Components: {}", report.quiet_components);
            println!("  Updates: {}", report.updates);
            println!("  Violations: {}", report.violations);
            println!("  Success: {}", report.success);
            std::process::exit(if report.success { 0 } else { 1 });
        }
        Some(("certify", args)) => {
            let seeds = *args.get_one::<u64>("seeds").unwrap();

            let report = TestHarness::run_certification(seeds);
            println!("Certification Report:");
            println!("  Seeds Tested: {}", report.seeds_tested);
            println!("  Total Violations: {}", report.total_violations);
            println!("  Passed: {}", report.passed);
            std::process::exit(if report.passed { 0 } else { 1 });
        }
        Some(("export", args)) => {
            let pretty = args.get_flag("pretty");

            let runtime = GuardRuntime::new(
                GuardConfig::new()
                    .with_monitor(MonitorConfig::new().with_max_updates_per_component(5))
                    .with_diagnostics(DiagnosticsConfig::new().enabled()),
            );
            let setter = runtime.guarded_setter(
                |_value: u32| Ok(()),
                GuardOptions::new("demo", "value")
                    .with_deduplication(false)
                    .with_throttling(false),
            );
            for i in 0..20 {
                let _ = setter.set(i);
            }
            runtime
                .lifecycle()
                .record_event(loopguard_kernel::types::LifecycleEvent::mount(
                    ComponentId::new("demo"),
                ));

            let export = if pretty {
                runtime.diagnostics().export_pretty()
            } else {
                runtime.diagnostics().export()
            };
            match export {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("export failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => {}
    }
}
