//! subshell-host - line-oriented front end
//!
//! Reads command lines, runs each one in the hosted shell and applies the
//! pause-after-run policy. An empty line hands the shell to the user until
//! Ctrl-O. When the shell dies, later commands run one-shot.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use subshell_host::{
    handle_startup_error, init, init_with_config, start_session, Config, FallbackExecutor,
    HostTty, InvocationMode, NativeSession, PausePolicy, NAME, VERSION,
};

/// Prompt shown when there is no shell prompt to reuse
const FALLBACK_PROMPT: &str = "$ ";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Pause policy override
    pause: Option<PausePolicy>,
    /// Run every command one-shot
    no_subshell: bool,
}

/// What the command line asked for
#[derive(Debug, PartialEq)]
enum Invocation {
    Run(AppArgs),
    Help,
    Version,
}

impl AppArgs {
    /// Parse command line arguments, without the program name
    fn parse_from<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Invocation> {
        let mut app_args = AppArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("Missing config file path")?;
                    app_args.config_path = Some(PathBuf::from(path));
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--pause" | "-p" => {
                    let value = args.next().context("Missing pause policy")?;
                    app_args.pause = Some(value.parse()?);
                }
                "--no-subshell" => {
                    app_args.no_subshell = true;
                }
                "--help" | "-h" => return Ok(Invocation::Help),
                "--version" | "-V" => return Ok(Invocation::Version),
                other if other.starts_with('-') => {
                    anyhow::bail!("Unknown option: {}", other);
                }
                other => {
                    warn!("Ignoring positional argument: {}", other);
                }
            }
        }

        Ok(Invocation::Run(app_args))
    }
}

/// Print help information
fn print_help() {
    println!("{} - run commands in a hosted shell and pause when needed", NAME);
    println!();
    println!("USAGE:");
    println!("    {} [OPTIONS]", NAME);
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("    -p, --pause <POLICY>   never, on_dumb_terminals, always, on_output_only");
    println!("        --no-subshell      Run every command in a fresh shell");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    println!("USAGE NOTES:");
    println!("    An empty line hands the shell to you; press Ctrl-O to come back.");
    println!("    End of input (Ctrl-D) quits.");
    println!();
    println!("CONFIGURATION:");
    println!("    1. Path specified with --config");
    println!("    2. $SUBSHELL_HOST_CONFIG");
    println!("    3. <config dir>/subshell-host/config.toml (or .json)");
    println!("    4. $XDG_CONFIG_HOME/subshell-host/config.toml");
    println!("    5. ~/.subshell-host.toml");
    println!("    6. ./.subshell-host.toml");
    println!("    7. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    SUBSHELL_HOST_CONFIG   Path to configuration file");
    println!("    SUBSHELL_HOST_DEBUG    Enable debug logging (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let debug = debug
        || env::var("SUBSHELL_HOST_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
    let level = if debug { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    // stderr keeps log lines out of the shell's output on stdout
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

/// Load configuration from file or the default locations
fn load_configuration(args: &AppArgs) -> subshell_host::Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => init_with_config(path)?,
        None => init()?,
    };

    if let Some(policy) = args.pause {
        debug!("Pause policy override: {}", policy);
        config.pause.after_run = policy;
    }
    if args.no_subshell {
        config.subshell.enabled = false;
    }
    Ok(config)
}

/// Where commands currently run
enum Runner {
    Subshell(NativeSession),
    OneShot,
}

impl Runner {
    fn prompt(&self) -> String {
        match self {
            Runner::Subshell(session) if !session.prompt().trim().is_empty() => {
                session.prompt().to_string()
            }
            _ => FALLBACK_PROMPT.to_string(),
        }
    }
}

fn start_runner(config: &Config) -> Runner {
    if !config.subshell.enabled {
        info!("Subshell disabled, running commands one-shot");
        return Runner::OneShot;
    }

    match start_session(config) {
        Ok(session) => Runner::Subshell(session),
        Err(e) => {
            warn!("{}", handle_startup_error(&e));
            warn!("Falling back to one-shot execution");
            Runner::OneShot
        }
    }
}

fn run(config: Config) -> anyhow::Result<()> {
    let mut host = HostTty::new().context("Failed to open the host terminal")?;
    let fallback = FallbackExecutor::from_config(&config);
    let mut runner = start_runner(&config);

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("{}", runner.prompt());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let command = line.trim_end_matches(|c: char| c == '\n' || c == '\r');

        let outcome = match &mut runner {
            Runner::Subshell(session) => {
                session.run_command(command, InvocationMode::RunUserCommand, &mut host)
            }
            Runner::OneShot if command.trim().is_empty() => continue,
            Runner::OneShot => fallback.execute(command, &mut host),
        };

        match outcome {
            Ok(report) => {
                debug!(
                    "'{}': {} output bytes, paused: {}, took {}ms",
                    report.command,
                    report.output_bytes,
                    report.paused(),
                    report.duration().num_milliseconds()
                );
            }
            Err(e) if e.is_session_fatal() => {
                error!("{}", e);
                if let Runner::Subshell(session) = &mut runner {
                    if let Err(e) = session.shutdown() {
                        debug!("Shutdown after failure: {}", e);
                    }
                }
                warn!("Subshell gone, further commands run one-shot");
                runner = Runner::OneShot;
            }
            Err(e) => {
                eprintln!("{}", e);
            }
        }
    }

    if let Runner::Subshell(session) = &mut runner {
        session.set_quitting(true);
        let exit_code = session.shutdown()?;
        debug!("Subshell exited with {:?}", exit_code);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = match AppArgs::parse_from(env::args().skip(1)) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("{} v{}", NAME, VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Failed to parse arguments: {}", e);
            print_help();
            process::exit(1);
        }
    };

    init_logging(args.debug);
    info!("Starting {} v{}", NAME, VERSION);

    let config = match load_configuration(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", handle_startup_error(&e));
            process::exit(1);
        }
    };

    run(config)?;
    info!("{} shutdown complete", NAME);
    Ok(())
}
