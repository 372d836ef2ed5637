use anyhow::Result;

use crate::cli::{Command, RunArgs};
use crate::harness;
use crate::scenario::Scenario;

pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    scenario.validate()?;

    let reports = harness::run(&scenario)?;
    for report in &reports {
        println!("rank {}: {} reals, {} ghosts", report.rank, report.reals, report.ghosts);
        for list in &report.lists {
            println!(
                "  {:<10} local {:>4}  resolved {:>4}  global {:>4}",
                list.label, list.local, list.resolved, list.global
            );
            if args.resolved {
                for entry in &list.entries {
                    println!("      {entry}");
                }
            }
        }
    }
    Ok(())
}
