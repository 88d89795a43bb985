use std::fs;

use dslab_placement::core::cloudlet::CloudletStatus;
use dslab_placement::core::config::sim_config::SimulationConfig;
use dslab_placement::core::host::Host;
use dslab_placement::core::pe::make_pes;
use dslab_placement::core::power_model::ConstantPowerModel;
use dslab_placement::core::provisioner::SimpleProvisioner;
use dslab_placement::core::solution::HardSoftScore;
use dslab_placement::core::utilization_model::{ConstUtilizationModel, FullUtilizationModel};
use dslab_placement::core::vm::VmStatus;
use dslab_placement::core::vm_scheduler::SpaceSharedVmScheduler;
use dslab_placement::simulation::PlacementSimulation;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn simulation() -> PlacementSimulation {
    init_logger();
    let config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    PlacementSimulation::new(config).unwrap()
}

fn temp_file(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("dslab-placement-{}-{}", std::process::id(), name))
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_scenario_setup() {
    let sim = simulation();
    assert_eq!(sim.hosts().len(), 3);
    assert_eq!(sim.vms().len(), 4);
    assert_eq!(sim.cloudlets().len(), 6);
    assert_eq!(sim.time(), 0.);
    let ids: Vec<u32> = sim.vms().iter().map(|vm| vm.borrow().id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(sim.host(2).map(|h| h.borrow().number_of_pes()), Some(4));
    assert_eq!(sim.hosts()[1].borrow().context().name(), "host-1");
}

#[test]
fn test_place_and_bind() {
    let mut sim = simulation();
    assert_eq!(sim.place_pending_vms(), 4);
    for vm in sim.vms() {
        assert_eq!(vm.borrow().status(), VmStatus::Placed);
    }
    // binary scoring spreads VMs over all hosts
    assert_eq!(sim.score_current_placement(), HardSoftScore::new(0, 3));
    assert_eq!(sim.policy().free_pes().iter().sum::<i64>(), 4);
    // nothing is left to place
    assert_eq!(sim.place_pending_vms(), 0);

    assert_eq!(sim.bind_cloudlets(), 6);
    for cloudlet in sim.cloudlets() {
        assert!(cloudlet.borrow().vm().is_some());
    }
    assert_eq!(sim.bind_cloudlets(), 0);
}

#[test]
fn test_greedy_when_solver_disabled() {
    init_logger();
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    config.use_solver = false;
    let mut sim = PlacementSimulation::new(config).unwrap();
    let vms = sim.vms().to_vec();
    assert_eq!(sim.place_vms(&vms), vec![true; 4]);
    let hosts: Vec<Option<u32>> = vms.iter().map(|vm| vm.borrow().host()).collect();
    assert_eq!(hosts, vec![Some(0), Some(1), Some(2), Some(0)]);
}

#[test]
fn test_vm_ids_per_owner() {
    let mut sim = simulation();
    let vm = sim.add_vm(1, 500., 1, 256, 100, 1000);
    assert_eq!(vm.borrow().id, 4);
    let vm = sim.add_vm(2, 500., 1, 256, 100, 1000);
    assert_eq!(vm.borrow().id, 0);
    assert_eq!(vm.borrow().uid(), "2-0");
    assert!(sim.place_vm(&vm));

    let huge = sim.add_vm(2, 1000., 8, 256, 100, 1000);
    assert!(!sim.place_vm(&huge));
    assert_eq!(huge.borrow().history().placements()[0].host, None);
}

#[test]
fn test_custom_host() {
    let mut sim = simulation();
    let id = sim.add_host_with(|id, ctx| {
        Host::new(
            id,
            Box::new(SimpleProvisioner::new(65536)),
            Box::new(SimpleProvisioner::new(100000)),
            10_000_000,
            Box::new(SpaceSharedVmScheduler::new(make_pes(16, 2000.))),
            Box::new(ConstantPowerModel::new(300.)),
            ctx,
        )
    });
    assert_eq!(id, 3);
    let vm = sim.add_vm(1, 2000., 16, 1024, 100, 1000);
    assert!(sim.place_vm(&vm));
    assert_eq!(vm.borrow().host(), Some(3));
}

#[test]
fn test_history_cycles() {
    let mut sim = simulation();
    sim.place_pending_vms();
    sim.bind_cloudlets();
    sim.step();
    assert_eq!(sim.time(), 10.);

    let vm = sim.vms()[0].clone();
    assert!(sim.deallocate_vm(&vm));
    sim.step_for_duration(5.);
    assert_eq!(sim.time(), 15.);
    assert_eq!(sim.recorder().cycles(), 2);

    for host in sim.hosts() {
        assert_eq!(host.borrow().history().len(), 2);
        assert_eq!(host.borrow().history().times(), vec![10., 15.]);
    }
    let intervals = vm.borrow().history().intervals().to_vec();
    assert_eq!(intervals.len(), 2);
    assert_eq!(intervals[0].host, Some(0));
    assert_eq!(intervals[0].duration, 10.);
    assert!(intervals[0].power.is_some());
    assert_eq!(intervals[1].host, None);
    assert_eq!(intervals[1].duration, 5.);
    assert_eq!(intervals[1].power, None);

    let host_history = temp_file("hosts.csv");
    let vm_history = temp_file("vms.csv");
    let cloudlet_history = temp_file("cloudlets.csv");
    sim.save_host_history(&host_history).unwrap();
    sim.save_vm_history(&vm_history).unwrap();
    sim.save_cloudlet_history(&cloudlet_history).unwrap();

    // header plus one row per entity and cycle
    assert_eq!(fs::read_to_string(&host_history).unwrap().lines().count(), 1 + 3 * 2);
    let vm_rows = fs::read_to_string(&vm_history).unwrap();
    assert_eq!(vm_rows.lines().count(), 1 + 4 * 2);
    assert!(vm_rows.lines().any(|line| line.starts_with("0,1,-1,5")));
    assert_eq!(fs::read_to_string(&cloudlet_history).unwrap().lines().count(), 1 + 6 * 2);

    for path in [host_history, vm_history, cloudlet_history] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn test_binding_without_vms() {
    let mut sim = simulation();
    assert_eq!(sim.bind_cloudlets(), 0);
    for cloudlet in sim.cloudlets() {
        let cloudlet = cloudlet.borrow();
        assert_eq!(cloudlet.vm(), None);
        assert_eq!(cloudlet.history().intervals().len(), 1);
        assert_eq!(cloudlet.history().intervals()[0].vm, None);
    }
}

#[test]
fn test_cloudlets_of_other_owner_stay_unbound() {
    let mut sim = simulation();
    sim.place_pending_vms();
    let cloudlet = sim.add_cloudlet(5, 1000, 1, 0, 0, Box::new(FullUtilizationModel));
    assert_eq!(sim.bind_cloudlets(), 6);
    assert_eq!(cloudlet.borrow().vm(), None);
}

#[test]
// A cloudlet with zero CPU utilization makes no progress on any VM and stays unbound.
fn test_idle_cloudlet_stays_unbound() {
    let mut sim = simulation();
    sim.place_pending_vms();
    let idle = sim.add_cloudlet(1, 1000, 1, 0, 0, Box::new(ConstUtilizationModel::new(0.)));
    assert_eq!(sim.bind_cloudlets(), 6);
    assert_eq!(idle.borrow().vm(), None);
    assert_eq!(idle.borrow().history().intervals().last().map(|i| i.vm), Some(None));
}

#[test]
fn test_cloudlet_lifecycle() {
    let mut sim = simulation();
    let cloudlet = sim.cloudlets()[0].clone();
    // unbound cloudlets can't start
    assert!(!sim.start_cloudlet(&cloudlet));

    sim.place_pending_vms();
    sim.bind_cloudlets();
    sim.step();
    assert!(sim.start_cloudlet(&cloudlet));
    assert!(!sim.start_cloudlet(&cloudlet));
    assert_eq!(cloudlet.borrow().status(), CloudletStatus::Running);
    assert_eq!(cloudlet.borrow().start_time(), Some(10.));

    sim.step();
    assert!(sim.finish_cloudlet(&cloudlet, true));
    assert_eq!(cloudlet.borrow().status(), CloudletStatus::Success);
    assert_eq!(cloudlet.borrow().finish_time(), Some(20.));
    assert!(!sim.finish_cloudlet(&cloudlet, false));

    let other = sim.cloudlets()[1].clone();
    assert!(!sim.finish_cloudlet(&other, false));
    assert!(sim.start_cloudlet(&other));
    assert!(sim.finish_cloudlet(&other, false));
    assert_eq!(other.borrow().status(), CloudletStatus::Failed);
}

#[test]
fn test_migration_through_simulation() {
    let mut sim = simulation();
    sim.place_pending_vms();
    let vm = sim.vms()[1].clone();
    assert_eq!(vm.borrow().host(), Some(1));

    assert!(sim.start_migration(&vm, 2));
    assert!(sim.finish_migration(&vm));
    assert_eq!(vm.borrow().host(), Some(2));

    assert!(sim.start_migration(&vm, 1));
    assert!(sim.cancel_migration(&vm));
    assert_eq!(vm.borrow().host(), Some(2));
    assert_eq!(sim.policy().free_pes(), &[0, 4, 0]);
}

#[test]
fn test_report() {
    let mut sim = simulation();
    sim.place_pending_vms();
    let report = sim.report();
    assert_eq!(report.placements.len(), 4);
    assert!(report.placements.iter().all(|p| p.host_id >= 0));
    assert_eq!(report.hosts.len(), 3);
    assert_eq!(report.hosts[0].vms, vec!["1-0".to_string(), "1-3".to_string()]);
    assert_eq!(report.hosts[0].free_pes, 0);
    let json = report.to_json().unwrap();
    assert!(json.contains("\"placements\""));
}
