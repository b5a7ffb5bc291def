//! Promos operator CLI, runs the services of `promos_lib` against the configured database.
//! See `promos_lib` for details.

extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
extern crate promos_lib;
extern crate serde_json;
extern crate tokio_core;

use std::process;

use clap::Command;
use failure::Error as FailureError;
use tokio_core::reactor::Core;

use promos_lib::config::Config;
use promos_lib::models::{Caller, Role, UserId};
use promos_lib::services::{PromoCodesService, ReportsService};
use promos_lib::{logging, sentry_integration};

/// Operator acting from the command line
const OPERATOR_ID: UserId = UserId(0);

fn cli() -> Command {
    Command::new("promos")
        .about("Promo codes operator tool")
        .subcommand_required(true)
        .subcommand(Command::new("export").about("Prints all promo codes as CSV"))
        .subcommand(Command::new("stats").about("Prints promo code stats as JSON"))
        .subcommand(Command::new("valid").about("Prints currently valid promo codes as JSON"))
}

fn run(config: Config, command: &str) -> Result<String, FailureError> {
    let mut core = Core::new()?;
    let service = promos_lib::create_service(config, Some(Caller::new(OPERATOR_ID, Role::Admin)))?;

    match command {
        "export" => core.run(service.export_promo_codes()),
        "stats" => {
            let stats = core.run(service.promo_codes_stats())?;
            Ok(serde_json::to_string_pretty(&stats)?)
        }
        "valid" => {
            let promo_codes = core.run(service.valid_promo_codes())?;
            Ok(serde_json::to_string_pretty(&promo_codes)?)
        }
        other => bail!("Unknown command {}", other),
    }
}

fn main() {
    let matches = cli().get_matches();
    let command = matches.subcommand_name().unwrap_or_default().to_string();

    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Can't load app config: {}", e);
            process::exit(1);
        }
    };

    logging::init(&config.logging);
    let sentry_guard = sentry_integration::init(config.sentry.as_ref());

    match run(config, &command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            let causes = e.iter_chain().map(|cause| cause.to_string()).collect::<Vec<_>>();
            error!("Command {} failed: {}", command, causes.join(": "));
            sentry_integration::capture_fatal(&e);
            drop(sentry_guard);
            process::exit(1);
        }
    }
}
