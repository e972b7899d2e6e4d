//! Parsing Options.
//! `--task {file}` or `-t`, `--algorithm {name}` or `-a`, see `pn-reach --help`.

use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

fn make_options_parser() -> clap::Command {
    Command::new("pn-reach")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Reachability and coverability search on Petri nets")
        .arg(
            Arg::new("task")
                .short('t')
                .long("task")
                .value_name("FILE")
                .help("Task file (.json or .ron) with the net, start and target markings")
                .required(true),
        )
        .arg(
            Arg::new("algorithm")
                .short('a')
                .long("algorithm")
                .help("bfs, best-first, astar, full-reach or full-cover")
                .default_value("bfs"),
        )
        .arg(
            Arg::new("heuristic")
                .short('H')
                .long("heuristic")
                .help("Heuristic name for best-first / astar, e.g. \"Weighted Default\""),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .default_value("pn-reach.toml"),
        )
        .arg(
            Arg::new("dot")
                .short('d')
                .long("dot")
                .value_name("FILE")
                .help("Write the explored graph in DOT format"),
        )
        .arg(
            Arg::new("json")
                .short('o')
                .long("json")
                .value_name("FILE")
                .help("Write the outcome and explored graph as JSON"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout-ms")
                .value_name("MILLIS")
                .value_parser(clap::value_parser!(u64))
                .help("Stop the search after this many milliseconds"),
        )
        .arg(
            Arg::new("boundness")
                .short('b')
                .long("boundness")
                .action(ArgAction::SetTrue)
                .help("Also decide boundedness from the coverability graph"),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub task: PathBuf,
    pub algorithm: String,
    pub heuristic: Option<String>,
    pub config: PathBuf,
    pub dot: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub boundness: bool,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;
        let path = |id: &str| matches.get_one::<String>(id).map(PathBuf::from);

        let task = path("task").ok_or("missing --task")?;
        let algorithm = matches
            .get_one::<String>("algorithm")
            .cloned()
            .unwrap_or_else(|| "bfs".to_owned());
        let config = path("config").unwrap_or_else(|| PathBuf::from("pn-reach.toml"));

        Ok(Options {
            task,
            algorithm,
            heuristic: matches.get_one::<String>("heuristic").cloned(),
            config,
            dot: path("dot"),
            json: path("json"),
            timeout: matches
                .get_one::<u64>("timeout")
                .map(|ms| Duration::from_millis(*ms)),
            boundness: matches.get_flag("boundness"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_str() {
        let options =
            Options::parse_from_str("-t net.ron -a astar -H 'Firing Bound' --timeout-ms 250 -b")
                .unwrap();
        assert_eq!(options.task, PathBuf::from("net.ron"));
        assert_eq!(options.algorithm, "astar");
        assert_eq!(options.heuristic.as_deref(), Some("Firing Bound"));
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.config, PathBuf::from("pn-reach.toml"));
        assert!(options.boundness);
        assert!(options.dot.is_none());
    }

    #[test]
    fn test_defaults() {
        let flags = ["--task".to_owned(), "a.json".to_owned()];
        let options = Options::parse_from_args(&flags).unwrap();
        assert_eq!(options.algorithm, "bfs");
        assert!(options.heuristic.is_none());
        assert!(!options.boundness);
    }

    #[test]
    fn test_parse_from_str_err() {
        assert!(Options::parse_from_str("-a bfs").is_err());
        assert!(Options::parse_from_str("-t a.json --timeout-ms soon").is_err());
        assert!(Options::parse_from_str("-t 'unterminated").is_err());
    }
}
