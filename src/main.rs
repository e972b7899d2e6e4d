use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;

use pn_reach::analysis::boundness::BoundnessAnalyzer;
use pn_reach::analysis::reachability::ExportedGraph;
use pn_reach::config::SearchConfig;
use pn_reach::net::io::write_json;
use pn_reach::options::Options;
use pn_reach::search::{Controller, Status, Strategy};
use pn_reach::task::ReachabilityTask;

const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
struct Report {
    strategy: String,
    status: Status,
    steps: usize,
    backtrack: Option<Vec<String>>,
    boundness: Option<String>,
    graph: ExportedGraph,
}

fn main() -> Result<()> {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let mut flags = shellwords::split(&std::env::var("PN_FLAGS").unwrap_or_default())
        .context("PN_FLAGS has mismatched quotes")?;
    flags.extend(std::env::args().skip(1));
    let options = match Options::parse_from_args(&flags) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    debug!("PN options: {:?}", options);

    let config = SearchConfig::load_from_file(&options.config)?;
    let task = ReachabilityTask::load(&options.task)
        .with_context(|| format!("Failed to load task file: {:?}", options.task))?;
    let resolved = task.resolve().context("Invalid task")?;
    let net = resolved.net;

    let mut invariants = resolved.invariants;
    #[cfg(feature = "invariants")]
    if invariants.is_empty() {
        invariants = pn_reach::analysis::invariants::compute_place_invariants(&net);
        debug!("computed {} place invariants", invariants.len());
    }

    let heuristic = options.heuristic.as_deref();
    let strategy = Strategy::from_config(&options.algorithm, heuristic, &config)?;
    let mut controller = Controller::new(&net, &resolved.request, strategy)?
        .with_config(config.clone())
        .with_invariants(invariants);
    let events = controller.subscribe();
    controller.run()?;

    let mut deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    loop {
        match events.recv_timeout(POLL) {
            Ok(event) => {
                println!("{event}");
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    controller.stop_algorithm();
                    deadline = None;
                } else if !controller.is_running() {
                    events.try_iter().for_each(|event| println!("{event}"));
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let outcome = controller.join()?;
    let backtrack = outcome.backtrack.as_ref().map(|path| {
        path.iter()
            .map(|t| net.transition_name(*t).to_owned())
            .collect::<Vec<_>>()
    });
    if let Some(path) = &backtrack {
        println!("path: [{}]", path.join(", "));
    }
    let stats = outcome.graph.stats();
    println!(
        "{strategy}: {:?}, {} steps, {} markings, {} edges, {} deadlocks",
        outcome.status, outcome.steps, stats.state_count, stats.edge_count, stats.deadlock_count
    );

    let boundness = if options.boundness {
        let result = BoundnessAnalyzer::new()
            .with_config(config)
            .check_request(&net, &resolved.request)?;
        println!("{result}");
        Some(result.to_string())
    } else {
        None
    };

    if let Some(path) = &options.dot {
        outcome
            .graph
            .write_dot(&net, path)
            .with_context(|| format!("Failed to write DOT file: {:?}", path))?;
    }
    if let Some(path) = &options.json {
        let report = Report {
            strategy: strategy.to_string(),
            status: outcome.status,
            steps: outcome.steps,
            backtrack,
            boundness,
            graph: outcome.graph.export(&net),
        };
        write_json(path, &report)
            .with_context(|| format!("Failed to write JSON file: {:?}", path))?;
    }
    Ok(())
}
