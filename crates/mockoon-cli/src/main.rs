mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::start::StartRequest;
use commands::{CommandError, EXIT_FAILURE};
use mockoon_core::{install_signal_handler, Engine, ResolveOptions};
use mockoon_store::HomeLayout;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mockoon",
    version,
    about = "Run, supervise and containerize mock APIs from mockoon data files"
)]
struct Cli {
    /// Home directory for the registry, working files and logs
    /// (default: $MOCKOON_CLI_HOME or ~/.mockoon-cli).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Path or URL of the data file.
    #[arg(short, long)]
    data: String,
    /// Index of the environment in the data file.
    #[arg(short, long, conflicts_with_all = ["name", "all"])]
    index: Option<usize>,
    /// Name of the environment in the data file.
    #[arg(short, long, conflicts_with = "all")]
    name: Option<String>,
    /// Override the environment port.
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "all")]
    port: Option<i64>,
    /// Override the hostname the server binds to.
    #[arg(short = 'l', long)]
    hostname: Option<String>,
    /// Override the endpoint prefix.
    #[arg(long)]
    endpoint_prefix: Option<String>,
    /// Process name (defaults to the environment name).
    #[arg(short = 'N', long, conflicts_with = "all")]
    pname: Option<String>,
    /// Start every environment of the data file.
    #[arg(short, long, default_value_t = false)]
    all: bool,
    /// Migrate data files without a schema version without asking.
    #[arg(short, long, default_value_t = false)]
    repair: bool,
    /// Log full request and response bodies.
    #[arg(short = 't', long, default_value_t = false)]
    log_transaction: bool,
    /// Serve in this process instead of under the supervisor.
    #[arg(short, long, default_value_t = false, conflicts_with = "all")]
    foreground: bool,
    /// Run inside a container (implies --foreground).
    #[arg(short, long, default_value_t = false, conflicts_with = "all")]
    container: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start mock servers from a data file or URL.
    Start(StartArgs),
    /// Stop mock servers.
    Stop {
        /// Process id, name or "all". Prompts when omitted on a terminal.
        target: Option<String>,
    },
    /// List running mock servers.
    List,
    /// Show details of one mock server.
    Info {
        /// Process id or name.
        #[arg(default_value = "0")]
        target: String,
    },
    /// Generate a Dockerfile that runs one environment.
    Dockerize {
        /// Path or URL of the data file.
        #[arg(short, long)]
        data: String,
        /// Index of the environment in the data file.
        #[arg(short, long, conflicts_with = "name")]
        index: Option<usize>,
        /// Name of the environment in the data file.
        #[arg(short, long)]
        name: Option<String>,
        /// Override the environment port.
        #[arg(short, long, allow_negative_numbers = true)]
        port: Option<i64>,
        /// Migrate data files without a schema version without asking.
        #[arg(short, long, default_value_t = false)]
        repair: bool,
        /// Log full request and response bodies in the container.
        #[arg(short = 't', long, default_value_t = false)]
        log_transaction: bool,
        /// Dockerfile path. The data file is written next to it.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the last lines of a mock server's logs.
    Logs {
        /// Process id or name.
        target: String,
        /// Number of lines per log file.
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
        /// Only print the error log.
        #[arg(short, long, default_value_t = false)]
        errors: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Serve a working file (run by the supervisor).
    #[command(hide = true)]
    Serve {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        base_dir: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        log_transaction: bool,
    },
}

impl Commands {
    /// Long-running server modes log at info with timestamps.
    fn serves(&self) -> bool {
        match self {
            Commands::Serve { .. } => true,
            Commands::Start(args) => args.foreground || args.container,
            _ => false,
        }
    }
}

fn init_tracing(cli: &Cli) {
    let serving = cli.command.serves();
    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if serving {
        "info"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("MOCKOON_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    if serving {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .init();
    }
}

fn open_engine(home: Option<PathBuf>) -> Result<Engine, CommandError> {
    let root = match home {
        Some(path) => path,
        None => HomeLayout::default_root().map_err(|e| e.to_string())?,
    };
    Ok(Engine::open(root)?)
}

fn run(cli: Cli) -> Result<u8, CommandError> {
    let json = cli.json;
    match cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::Serve {
            data,
            base_dir,
            log_transaction,
        } => commands::serve::run(&data, base_dir, log_transaction),
        Commands::Start(args) => {
            let engine =
                open_engine(cli.home)?.on_foreground_start(commands::start::announce);
            let request = StartRequest {
                data: args.data,
                options: ResolveOptions {
                    index: args.index,
                    name: args.name,
                    port: args.port,
                    hostname: args.hostname,
                    endpoint_prefix: args.endpoint_prefix,
                    pname: args.pname,
                    repair: args.repair,
                    artifact_dir: None,
                },
                all: args.all,
                log_transaction: args.log_transaction,
                foreground: args.foreground || args.container,
            };
            commands::start::run(&engine, &request, json)
        }
        Commands::Stop { target } => {
            let engine = open_engine(cli.home)?;
            commands::stop::run(&engine, target.as_deref(), json)
        }
        Commands::List => commands::list::run(&open_engine(cli.home)?, json),
        Commands::Info { target } => commands::info::run(&open_engine(cli.home)?, &target, json),
        Commands::Dockerize {
            data,
            index,
            name,
            port,
            repair,
            log_transaction,
            output,
        } => {
            let engine = open_engine(cli.home)?;
            let options = ResolveOptions {
                index,
                name,
                port,
                repair,
                ..ResolveOptions::default()
            };
            commands::dockerize::run(&engine, &data, &options, &output, log_transaction, json)
        }
        Commands::Logs {
            target,
            lines,
            errors,
        } => commands::logs::run(&open_engine(cli.home)?, &target, lines, errors),
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();
    init_tracing(&cli);
    install_signal_handler();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {}", e.message);
            ExitCode::from(if e.code == 0 { EXIT_FAILURE } else { e.code })
        }
    }
}
