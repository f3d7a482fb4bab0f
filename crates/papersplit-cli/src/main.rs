mod clean_cmd;
mod cli;
mod detect_cmd;
mod segment_cmd;
mod shared;
mod split_cmd;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Segment { ref input, format } => segment_cmd::run(input, format),
        cli::Commands::Detect { ref input, format } => detect_cmd::run(input, format),
        cli::Commands::Split {
            ref input,
            ref output_dir,
            flat,
        } => split_cmd::run(input, output_dir, flat),
        cli::Commands::Clean {
            ref file,
            ref output,
            top,
            bottom,
        } => clean_cmd::run(file, output.as_deref(), top, bottom),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`; the default level is `warn`.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
