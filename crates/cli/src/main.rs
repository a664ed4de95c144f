fn setup_logging() {
    use tracing_subscriber::prelude::*;

    // stdout carries the JSON report, so logs go to stderr
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,markup_core=info"));

    tracing_subscriber::registry().with(filter).with(layer).init();
}

fn main() {
    setup_logging();
    if let Err(error) = markup_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
