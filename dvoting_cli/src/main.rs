use clap::{App, Arg, SubCommand};
use num_enum::TryFromPrimitive;

mod command_form;
mod command_keygen;
mod command_simulate;

use command_form::command_form;
use command_keygen::command_keygen;
use command_simulate::command_simulate;

#[derive(TryFromPrimitive, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Verbosity {
    fn level(self) -> log::LevelFilter {
        match self {
            Verbosity::Silent => log::LevelFilter::Off,
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warn => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
        }
    }
}

fn main() {
    let matches = App::new("dvoting CLI")
        .version("0.1")
        .about("Verifiable end-to-end encrypted voting")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate a client keypair, or a node secret with --node")
                .arg(
                    Arg::with_name("node")
                        .long("node")
                        .help("Generate a node secret and print the keys derived from it"),
                ),
        )
        .subcommand(
            SubCommand::with_name("form")
                .about("Validate a form configuration and report its ballot size")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("Configuration file in JSON format"),
                ),
        )
        .subcommand(
            SubCommand::with_name("simulate")
                .about("Run a whole form in memory: vote, shuffle, decrypt and tally")
                .arg(
                    Arg::with_name("config")
                        .long("config")
                        .takes_value(true)
                        .help("Configuration file in JSON format, a one-question form by default"),
                )
                .arg(
                    Arg::with_name("nodes")
                        .long("nodes")
                        .takes_value(true)
                        .default_value("3")
                        .help("Number of nodes in the roster"),
                )
                .arg(
                    Arg::with_name("voters")
                        .long("voters")
                        .takes_value(true)
                        .default_value("5")
                        .help("Number of voters"),
                )
                .arg(
                    Arg::with_name("print-ballots")
                        .long("print-ballots")
                        .help("Print every decrypted ballot"),
                ),
        )
        .get_matches();

    let verbosity = match matches.occurrences_of("v") {
        0 => Verbosity::Warn,
        n => Verbosity::try_from_primitive(std::cmp::min(n, 2) as u8 + 2)
            .unwrap_or(Verbosity::Debug),
    };

    // RUST_LOG takes precedence over -v
    env_logger::Builder::new()
        .filter_level(verbosity.level())
        .parse_default_env()
        .init();

    // Subcommands
    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen(matches);
        std::process::exit(0);
    }

    if let Some(matches) = matches.subcommand_matches("form") {
        command_form(matches);
        std::process::exit(0);
    }

    if let Some(matches) = matches.subcommand_matches("simulate") {
        command_simulate(matches);
        std::process::exit(0);
    }

    eprintln!("dvoting: no command given, see --help");
    std::process::exit(1);
}

pub fn expand(filename: &str) -> String {
    shellexpand::tilde(filename).to_string()
}

/// Read and parse a configuration file, exiting on failure
pub fn read_configuration(command: &str, filename: &str) -> dvoting::Configuration {
    let filename = expand(filename);

    let file_bytes = match std::fs::read(&filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("dvoting {}: unable to read {}: {}", command, filename, e);
            std::process::exit(1);
        }
    };

    serde_json::from_slice(&file_bytes).unwrap_or_else(|e| {
        eprintln!("dvoting {}: unable to parse {}: {}", command, filename, e);
        std::process::exit(1);
    })
}
