use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use dslab_placement::core::clock::ManualClock;
use dslab_placement::core::config::filters::{CostConfig, CustomFilters, FilterMode, FilterSetting, ScoringConfig};
use dslab_placement::core::context::PlacementContext;
use dslab_placement::core::error::ConfigError;
use dslab_placement::core::host::Host;
use dslab_placement::core::pe::make_pes;
use dslab_placement::core::power_model::LinearPowerModel;
use dslab_placement::core::provisioner::SimpleProvisioner;
use dslab_placement::core::scoring::{
    score_calculator_resolver, BinaryScoreCalculator, CustomScoreCalculator, MinPowerScoreCalculator,
    ScoreCalculator, SimpleScoreCalculator, VmCloudletScoreCalculator, VmCloudletSimpleScoreCalculator,
};
use dslab_placement::core::solution::{
    CloudletDemand, HardSoftScore, HostSnapshot, HostVmSolution, VmCapacity, VmCloudletSolution, VmDemand,
};
use dslab_placement::core::solver::VmCloudletSolver;
use dslab_placement::core::vm::VirtualMachine;
use dslab_placement::core::vm_scheduler::TimeSharedVmScheduler;
use dslab_placement::extensions::construction_heuristic::FirstFitDecreasing;

fn hosts(count: u32, pes: u32, clock: &ManualClock) -> Vec<Rc<RefCell<Host>>> {
    (0..count)
        .map(|id| {
            rc!(refcell!(Host::new(
                id,
                Box::new(SimpleProvisioner::new(2048)),
                Box::new(SimpleProvisioner::new(10000)),
                1_000_000,
                Box::new(TimeSharedVmScheduler::new(make_pes(pes, 1000.))),
                Box::new(LinearPowerModel::new(20., 120.)),
                PlacementContext::new(&format!("host-{}", id), clock.shared()),
            )))
        })
        .collect()
}

fn demand(id: u32, cores: u32) -> VmDemand {
    VmDemand::of(&VirtualMachine::new(id, 1, 1000., cores, 512, 1000, 10000))
}

fn solution(hosts: &[Rc<RefCell<Host>>], vms: Vec<VmDemand>, assignment: &[Option<usize>]) -> HostVmSolution {
    let mut solution = HostVmSolution::new(hosts.iter().map(|h| HostSnapshot::of(&h.borrow())).collect(), vms);
    for (vm_idx, host_idx) in assignment.iter().enumerate() {
        solution.assign(vm_idx, *host_idx);
    }
    solution
}

#[test]
fn test_score_order() {
    assert!(HardSoftScore::new(0, -100) > HardSoftScore::new(-1, 50));
    assert!(HardSoftScore::new(0, 5) > HardSoftScore::new(0, 4));
    assert!(HardSoftScore::new(0, -1).is_feasible());
    assert!(!HardSoftScore::new(-1, 0).is_feasible());
    assert_eq!(HardSoftScore::new(-2, 7).to_string(), "-2hard/7soft");
}

#[test]
// 3 VMs on 2 distinct hosts among 5 hosts.
fn test_binary_counts_used_hosts() {
    let clock = ManualClock::new();
    let hosts = hosts(5, 4, &clock);
    let s = solution(
        &hosts,
        vec![demand(0, 1), demand(1, 1), demand(2, 1)],
        &[Some(1), Some(3), Some(1)],
    );
    assert_eq!(BinaryScoreCalculator.calculate_score(&s), HardSoftScore::new(0, 2));
}

#[test]
fn test_binary_penalizes_exceeded_hosts() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let s = solution(&hosts, vec![demand(0, 2), demand(1, 2)], &[Some(0), Some(0)]);
    let score = BinaryScoreCalculator.calculate_score(&s);
    assert!(score.hard <= -1);
    assert_eq!(score, HardSoftScore::new(-1, 1));
}

#[test]
// Committed VMs of the ledger count together with assigned ones.
fn test_committed_usage_is_included() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let vm = rc!(refcell!(VirtualMachine::new(9, 1, 1000., 2, 512, 1000, 10000)));
    assert!(hosts[0].borrow_mut().admit(&vm).is_success());

    let s = solution(&hosts, vec![demand(0, 1)], &[Some(0)]);
    assert_eq!(BinaryScoreCalculator.calculate_score(&s), HardSoftScore::new(-1, 1));
    let s = solution(&hosts, vec![demand(0, 1)], &[Some(1)]);
    assert_eq!(BinaryScoreCalculator.calculate_score(&s), HardSoftScore::new(0, 2));
}

#[test]
// One host idle, the other at 50% with power(u) = 100u + 20: -(20 + 70) = -90.
fn test_min_power() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let s = solution(&hosts, vec![demand(0, 1)], &[Some(1)]);
    assert_eq!(MinPowerScoreCalculator.calculate_score(&s), HardSoftScore::new(0, -90));

    let s = solution(&hosts, vec![demand(0, 1)], &[None]);
    assert_eq!(MinPowerScoreCalculator.calculate_score(&s), HardSoftScore::new(0, -40));
}

#[test]
fn test_simple() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let calculator = SimpleScoreCalculator::new(CostConfig {
        cpu: 1.,
        ram: 1.,
        storage: 0.,
        bw: 0.,
    });

    // 1000 MIPS + 512 RAM on the only used host
    let s = solution(&hosts, vec![demand(0, 1)], &[Some(0)]);
    assert_eq!(calculator.calculate_score(&s), HardSoftScore::new(0, -1512));

    // 4000 MIPS on a 2000 MIPS host: shortfall of 2000
    let s = solution(&hosts, vec![demand(0, 2), demand(1, 2)], &[Some(1), Some(1)]);
    assert_eq!(calculator.calculate_score(&s), HardSoftScore::new(-2000, -5024));
}

#[test]
fn test_custom_filters() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let filters = CustomFilters::parse("[max_host](1){soft}\n[max_cpu](60){hard}\n").unwrap();
    let calculator = CustomScoreCalculator::new(filters, None).unwrap();

    // both hosts within 60% CPU, one used host
    let s = solution(&hosts, vec![demand(0, 1), demand(1, 2)], &[Some(0), None]);
    assert_eq!(calculator.calculate_score(&s), HardSoftScore::new(20, 11));

    // the second host is fully loaded and two hosts are used
    let s = solution(&hosts, vec![demand(0, 1), demand(1, 2)], &[Some(0), Some(1)]);
    assert_eq!(calculator.calculate_score(&s), HardSoftScore::new(0, 2));
}

#[test]
fn test_custom_min_filters_and_power() {
    let clock = ManualClock::new();
    let hosts = hosts(2, 2, &clock);
    let filters = CustomFilters {
        min_cpu: FilterSetting::new(40, FilterMode::Soft),
        max_pow: FilterSetting::new(100, FilterMode::Soft),
        ..Default::default()
    };
    let calculator = CustomScoreCalculator::new(filters, None).unwrap();

    // host 0 at 50%: +10, host 1 idle: -10, total power 90: +10
    let s = solution(&hosts, vec![demand(0, 1)], &[Some(0)]);
    assert_eq!(calculator.calculate_score(&s), HardSoftScore::new(0, 11));
}

#[test]
fn test_custom_requires_costs_for_cost_filter() {
    let filters = CustomFilters {
        max_cost: FilterSetting::new(1000, FilterMode::Hard),
        ..Default::default()
    };
    assert!(matches!(
        CustomScoreCalculator::new(filters.clone(), None),
        Err(ConfigError::MissingCostParameters(_))
    ));
    let costs = CostConfig {
        cpu: 1.,
        ram: 0.,
        storage: 0.,
        bw: 0.,
    };
    assert!(CustomScoreCalculator::new(filters, Some(costs)).is_ok());
}

#[test]
fn test_resolver() {
    assert!(score_calculator_resolver(&ScoringConfig::Binary, None).is_ok());
    assert!(score_calculator_resolver(&ScoringConfig::MinPower, None).is_ok());
    assert!(matches!(
        score_calculator_resolver(&ScoringConfig::Simple, None),
        Err(ConfigError::MissingCostParameters(_))
    ));
}

fn cloudlet_problem() -> VmCloudletSolution {
    VmCloudletSolution::new(
        vec![
            VmCapacity {
                id: 0,
                owner_id: 1,
                mips: 1000.,
                cores: 2,
            },
            VmCapacity {
                id: 1,
                owner_id: 2,
                mips: 500.,
                cores: 1,
            },
        ],
        vec![
            CloudletDemand {
                id: 0,
                owner_id: 1,
                length: 4000,
                cores: 1,
                cpu_utilization: 0.5,
            },
            CloudletDemand {
                id: 1,
                owner_id: 1,
                length: 2000,
                cores: 2,
                cpu_utilization: 1.,
            },
        ],
    )
}

#[test]
fn test_cloudlet_score() {
    let mut s = cloudlet_problem();
    assert_eq!(VmCloudletSimpleScoreCalculator.calculate_score(&s), HardSoftScore::new(-2, 0));

    // 4000 / 500 + 2000 / 1000 = 10
    s.assign(0, Some(0));
    s.assign(1, Some(0));
    assert_eq!(VmCloudletSimpleScoreCalculator.calculate_score(&s), HardSoftScore::new(0, -10));

    // VM 1 has one core and another owner
    s.assign(1, Some(1));
    assert_eq!(VmCloudletSimpleScoreCalculator.calculate_score(&s), HardSoftScore::new(-1, -8));
}

#[test]
fn test_cloudlet_first_fit_decreasing() {
    let s = VmCloudletSolver::solve(
        &mut FirstFitDecreasing::new(),
        cloudlet_problem(),
        &VmCloudletSimpleScoreCalculator,
    );
    assert_eq!(s.assignment, vec![Some(0), Some(0)]);
    assert_eq!(s.score, Some(HardSoftScore::new(0, -10)));
}
