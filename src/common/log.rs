use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// level, e.g. `RUST_LOG=rift_taskbar::actor::enumerator=trace`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let tree = HierarchicalLayer::default()
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed, e.g. by a test harness.
    if let Err(err) = tracing_subscriber::registry().with(filter).with(tree).try_init() {
        debug!(%err, "keeping the existing tracing subscriber");
    }
}
