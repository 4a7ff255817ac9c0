/// tsr status process
///
/// Started by `tsr` with envelopes on stdin. Status goes to stderr; stdout
/// carries only the final acknowledgment line.

use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use tsr_status::{serve, StatusReporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Ctrl-C reaches the whole process group; keep draining until tsr
    // closes our input
    tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, waiting for end of input");
        }
    });

    let mut reporter = StatusReporter::new(std::io::stderr());
    let ack = serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), &mut reporter).await?;

    tracing::debug!(drained = ack.drained, errors = reporter.errors(), "status process exiting");
    Ok(())
}
