use clap::{Parser, Subcommand};
use ctxlint_runtime::cli::{audit_cmd, history_cmd};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ctxlint", version, about = "Audit how ready a website is for LLMs and AI crawlers")]
struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[arg(long, short, global = true, help = "Suppress human-readable output")]
    quiet: bool,
    #[arg(long, short, global = true, help = "Debug logging and extra detail")]
    verbose: bool,
    #[arg(long, global = true, help = "Disable colored output")]
    no_color: bool,
    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit a site and exit with the CI gate code
    Audit(audit_cmd::AuditArgs),
    /// Show recorded scores for a URL
    History {
        url: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "ctxlint=debug" } else { "ctxlint=info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse() {
        filter = filter.add_directive(directive);
    }
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Flags are read back through env by cli::output.
    if cli.json {
        std::env::set_var("CTXLINT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("CTXLINT_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("CTXLINT_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("CTXLINT_NO_COLOR", "1");
    }
    init_tracing(cli.verbose, cli.log_json);

    let result = match &cli.command {
        Commands::Audit(args) => audit_cmd::run(args).await,
        Commands::History { url, limit } => history_cmd::run(url, *limit).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if cli.json {
                let value = serde_json::json!({ "error": format!("{e:#}") });
                ctxlint_runtime::cli::output::print_json(&value);
            } else {
                eprintln!("error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}
