mod app;
mod cli;

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = cli::parse();

    // RUST_LOG wins; otherwise warnings only, or engine debug output with --verbose
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("reheight=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    app::run(cli);
}
