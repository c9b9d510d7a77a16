use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use env_logger::Env;
use log::{error, info, LevelFilter};

use chainpeek::config::{Config, DEFAULT_CONFIG_FILE};
use chainpeek::{diagnose, initialize, DiagnosticError, TlsVersion};

#[derive(Parser, Debug)]
#[command(name = "chainpeek", version, about, long_about = None)]
struct Cli {
    /// Host to inspect: host, host:port, [v6addr]:port or https:// URL
    target: Option<String>,

    /// Port to connect to (default 443)
    #[arg(short, long)]
    port: Option<u16>,

    /// Protocol to request: 2, 3, 10, 11, 12 or a label such as tls1.2
    #[arg(short = 't', long = "tls-version")]
    tls_version: Option<String>,

    /// Connect and read timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u32>,

    /// OpenSSL cipher list
    #[arg(long)]
    ciphers: Option<String>,

    /// Do not send the host name as SNI
    #[arg(long)]
    no_sni: bool,

    /// Configuration file (defaults to ./chainpeek.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Log level: off, error, warn, info, debug, trace (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

/// An explicit level wins; otherwise `RUST_LOG` applies, falling back to info.
fn init_logger(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn load_config(cli: &Cli) -> Result<(Config, Option<LevelFilter>), DiagnosticError> {
    let file_config = match &cli.config {
        Some(path) => Some(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Some(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => None,
    };

    let version = match &cli.tls_version {
        Some(text) => Some(text.parse::<TlsVersion>()?),
        None => None,
    };
    let cli_config = Config::from_cli_args(
        cli.target.clone(),
        cli.port,
        cli.timeout_ms,
        cli.log_level.clone(),
        version,
        cli.ciphers.clone(),
        if cli.no_sni { Some(false) } else { None },
    );

    let mut config = Config::defaults();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    let config = config.merge_with(cli_config);
    let level = config.log_filter()?;
    Ok((config, level))
}

fn run(config: &Config) -> Result<String, DiagnosticError> {
    let (params, options) = config.resolve()?;
    let diagnosis = diagnose(&params, &options)?;
    diagnosis.render()
}

fn main() {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let (config, level) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            exit(e.exit_code());
        }
    };
    init_logger(level);
    initialize();

    match run(&config) {
        Ok(report) => {
            print!("{}", report);
            info!("status: ok");
            exit(0);
        }
        Err(e) => {
            error!("{}", e);
            error!("status: failed during {} (exit code {})", e.stage(), e.exit_code());
            exit(e.exit_code());
        }
    }
}
