use clap::{Arg, Command};
use srs_resolver::privileges;
use srs_resolver::{Config, Resolver, Server};
use std::process;

const BANNER: &str = "srs-resolver - Lightweight SRS decoder for Postfix autoresponders";

#[tokio::main]
async fn main() {
    let matches = Command::new("srs-resolver")
        .version(env!("CARGO_PKG_VERSION"))
        .about(BANNER)
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(Config::default_path()),
        )
        .arg(
            Arg::new("logtostdout")
                .long("logtostdout")
                .help("Send log to stdout instead of the configured log file")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Show version and license information")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Load and validate the configuration, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("resolve")
                .long("resolve")
                .value_name("REQUEST")
                .help("Answer a single request line (e.g. \"get SRS0=...\") without opening a socket")
                .action(clap::ArgAction::Set),
        )
        .get_matches();

    if matches.get_flag("version") {
        println!("{BANNER}");
        println!("Version: {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("License: GNU General Public License v3 or later");
        return;
    }

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(Config::default_path());

    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Config error: {e:#}");
        process::exit(1);
    }

    if matches.get_flag("test-config") {
        print_config_summary(config_path, &config);
        return;
    }

    if let Some(line) = matches.get_one::<String>("resolve") {
        let resolver = Resolver::new(config.fallback().map(str::to_string));
        print!("{}", resolver.respond(line).to_line());
        return;
    }

    if let Err(e) = srs_resolver::logging::init(&config, matches.get_flag("logtostdout")) {
        eprintln!("Logging error: {e:#}");
        process::exit(1);
    }

    if config.fallback_is_local() {
        log::warn!(
            "fallback_address '{}' is not a full email address; it will be returned as-is",
            config.fallback_address
        );
    }

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    match privileges::drop_privileges(config.drop_user(), config.drop_group()) {
        Ok(identity) => {
            log::info!("Running as {identity}");
            if identity.is_privileged() {
                log::error!(
                    "WARNING: still running with superuser privileges ({identity}); set user/group in {config_path}"
                );
            }
        }
        Err(e) => {
            log::error!("Failed to drop privileges: {e}");
            eprintln!("Error: failed to drop privileges: {e}");
            process::exit(1);
        }
    }

    if let Err(e) = server.run(tokio::signal::ctrl_c()).await {
        log::error!("Server error: {e:#}");
        process::exit(1);
    }
}

fn generate_default_config(path: &str) {
    match Config::default().to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn print_config_summary(path: &str, config: &Config) {
    println!("Configuration {path} is valid");
    println!("  listen:           {}", config.listen);
    println!(
        "  log file:         {}",
        if config.log_file.is_empty() { "(stderr)" } else { &config.log_file }
    );
    println!("  log level:        {}", config.log_level.as_str());
    println!(
        "  fallback address: {}",
        config.fallback().unwrap_or("(none)")
    );
    println!("  user:             {}", config.drop_user().unwrap_or("(unchanged)"));
    println!("  group:            {}", config.drop_group().unwrap_or("(unchanged)"));
    println!("  max line length:  {} bytes", config.max_line_length);
    match config.read_timeout_seconds {
        0 => println!("  read timeout:     disabled"),
        secs => println!("  read timeout:     {secs}s"),
    }
}
