use approx::assert_abs_diff_eq;

use dslab_placement::core::config::filters::{CostConfig, FilterMode, FilterSetting, ScoringConfig};
use dslab_placement::core::config::sim_config::SimulationConfig;
use dslab_placement::core::error::ConfigError;
use dslab_placement::core::host::UtilizationWeights;
use dslab_placement::core::power_model::power_model_resolver;
use dslab_placement::core::vm_scheduler::vm_scheduler_resolver;
use dslab_placement::extensions::{cloudlet_solver_resolver, solver_resolver};
use dslab_placement::simulation::PlacementSimulation;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

#[test]
fn test_load_config() {
    let config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.cycle_duration, 10.);
    assert!(config.use_solver);
    assert_eq!(config.scoring, ScoringConfig::Binary);
    assert_eq!(
        config.costs,
        Some(CostConfig {
            cpu: 3.0,
            ram: 0.05,
            storage: 0.001,
            bw: 0.1,
        })
    );
    assert_eq!(config.number_of_hosts(), 3);
    assert_eq!(config.hosts[0].vm_scheduler, "TimeShared");
    assert_eq!(config.hosts[0].utilization_weights, UtilizationWeights::default());
    assert_eq!(config.vms[0].count, 4);
    assert_eq!(config.cloudlets[0].cpu_utilization, Some(0.5));
}

#[test]
fn test_load_custom_config() {
    let config = SimulationConfig::from_file(&name_wrapper("custom.yaml")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.cycle_duration, 1.);
    assert_eq!(config.costs, None);
    assert_eq!(config.solver, "HillClimbing[steps=200,seed=7]");
    assert_eq!(config.cloudlet_solver, "FirstFitDecreasing");
    assert_eq!(config.hosts[0].name_prefix, "host");
    assert_eq!(config.hosts[0].vm_scheduler, "SpaceShared");
    assert_eq!(config.hosts[0].utilization_weights.ram, 0.2);
    assert_eq!(config.vms[0].owner_id, 0);
    match config.scoring {
        ScoringConfig::Custom { filters } => {
            assert_eq!(filters.max_host, FilterSetting::new(1, FilterMode::Soft));
            assert_eq!(filters.max_cpu, FilterSetting::new(90, FilterMode::Hard));
            assert_eq!(filters.min_cpu.enabled(), None);
        }
        other => panic!("unexpected scoring {:?}", other),
    }
}

#[test]
fn test_defaults() {
    let config = SimulationConfig::from_yaml("hosts: []").unwrap();
    assert_eq!(config, SimulationConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_configs() {
    assert!(matches!(
        SimulationConfig::from_file(&name_wrapper("missing.yaml")),
        Err(ConfigError::Io { .. })
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("cycle_length: 5"),
        Err(ConfigError::Yaml(_))
    ));

    let config = SimulationConfig::from_yaml("cycle_duration: 0").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidOption { .. })));

    let config = SimulationConfig::from_yaml("scoring:\n  type: Simple").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::MissingCostParameters(_))));

    let config = SimulationConfig::from_yaml("solver: Tabu").unwrap();
    assert!(config.validate().is_ok());
    assert!(matches!(PlacementSimulation::new(config), Err(ConfigError::UnknownSolver(_))));
    let config = SimulationConfig::from_yaml("cloudlet_solver: HillClimbing[seed=x]").unwrap();
    assert!(matches!(PlacementSimulation::new(config), Err(ConfigError::InvalidOption { .. })));

    let host = "hosts:\n  - pes: 2\n    mips_per_pe: 1000\n    ram: 1024\n    bw: 1000\n    storage: 1000\n";
    let config = SimulationConfig::from_yaml(&format!("{}    power_model: Cubic[max_power=10]", host)).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::UnknownPowerModel(_))));
    let config = SimulationConfig::from_yaml(&format!(
        "{}    power_model: Constant[power=10]\n    vm_scheduler: Fair",
        host
    ))
    .unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::UnknownVmScheduler(_))));
    let config = SimulationConfig::from_yaml(&format!("{}    power_model: Constant[power=10]", host)).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_power_model_resolver() {
    let model = power_model_resolver("LinearStatic[max_power=400,static_percent=0.2]").unwrap();
    assert_abs_diff_eq!(model.static_power(), 80., epsilon = 1e-9);
    assert_abs_diff_eq!(model.get_power(0.5), 240., epsilon = 1e-9);
    assert_abs_diff_eq!(model.max_power(), 400., epsilon = 1e-9);

    let model = power_model_resolver("Linear[max_power=100]").unwrap();
    assert_abs_diff_eq!(model.get_power(0.3), 30., epsilon = 1e-9);

    let model = power_model_resolver("Square[min_power=10,max_power=110]").unwrap();
    assert_abs_diff_eq!(model.get_power(0.5), 35., epsilon = 1e-9);

    let model = power_model_resolver("Constant[power=50]").unwrap();
    assert_eq!(model.get_power(0.9), 50.);

    assert!(matches!(
        power_model_resolver("Linear[min_power=10]"),
        Err(ConfigError::InvalidOption { .. })
    ));
    assert!(matches!(
        power_model_resolver("Linear[max_power=lots]"),
        Err(ConfigError::InvalidOption { .. })
    ));
}

#[test]
fn test_resolvers() {
    assert!(vm_scheduler_resolver("VmSchedulerTimeShared", Vec::new()).is_ok());
    assert!(vm_scheduler_resolver("SpaceShared", Vec::new()).is_ok());
    assert!(solver_resolver("Identity").is_ok());
    assert!(solver_resolver("HillClimbing").is_ok());
    assert!(matches!(
        solver_resolver("HillClimbing[steps=many]"),
        Err(ConfigError::InvalidOption { .. })
    ));
    assert!(cloudlet_solver_resolver("HillClimbing[steps=10,seed=1]").is_ok());
    assert!(matches!(cloudlet_solver_resolver("Random"), Err(ConfigError::UnknownSolver(_))));
}
