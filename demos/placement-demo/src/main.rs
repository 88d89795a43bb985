use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::{error, info};

use dslab_placement::core::config::sim_config::SimulationConfig;
use dslab_placement::simulation::PlacementSimulation;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to simulation config
    #[clap(long, default_value = "config.yaml")]
    config: String,

    /// Number of placement cycles
    #[clap(long, default_value_t = 10)]
    cycles: u32,

    /// Number of VMs removed (and placed again) on every cycle
    #[clap(long, default_value_t = 2)]
    churn: usize,

    /// Directory for history CSV files and placement report
    #[clap(long)]
    output: Option<String>,
}

fn init_logger() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn save_results(sim: &PlacementSimulation, dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(dir)?;
    sim.save_host_history(&format!("{}/hosts.csv", dir))?;
    sim.save_vm_history(&format!("{}/vms.csv", dir))?;
    sim.save_cloudlet_history(&format!("{}/cloudlets.csv", dir))?;
    sim.report().save(&format!("{}/report.json", dir))
}

fn main() {
    init_logger();
    let args = Args::parse();

    let config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    let mut sim = match PlacementSimulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let placed = sim.place_pending_vms();
    let bound = sim.bind_cloudlets();
    for cloudlet in sim.cloudlets().to_vec() {
        sim.start_cloudlet(&cloudlet);
    }
    info!(
        "Initial placement: {} of {} vms placed, {} of {} cloudlets bound, score {}",
        placed,
        sim.vms().len(),
        bound,
        sim.cloudlets().len(),
        sim.score_current_placement()
    );

    for cycle in 0..args.cycles {
        let placed: Vec<_> = sim
            .vms()
            .iter()
            .filter(|vm| vm.borrow().host().is_some())
            .cloned()
            .collect();
        let offset = (cycle as usize * args.churn) % placed.len().max(1);
        for vm in placed.iter().skip(offset).take(args.churn) {
            sim.deallocate_vm(vm);
        }
        let replaced = sim.place_pending_vms();
        sim.step();
        let power: f64 = sim.hosts().iter().map(|host| host.borrow().power()).sum();
        info!(
            "Cycle {} at {:.1}: {} vms placed again, total power {:.1} W, score {}",
            cycle + 1,
            sim.time(),
            replaced,
            power,
            sim.score_current_placement()
        );
    }

    for host in sim.hosts() {
        let host = host.borrow();
        info!(
            "Host {}: {} vms, cpu {:.2}, ram {:.2}, power {:.1} W",
            host.id,
            host.vms().len(),
            host.cpu_utilization(),
            host.ram_utilization(),
            host.power()
        );
    }

    if let Some(dir) = args.output {
        if let Err(e) = save_results(&sim, &dir) {
            error!("Failed to save results to {}: {}", dir, e);
            process::exit(1);
        }
        info!("Results saved to {}", dir);
    }
}
