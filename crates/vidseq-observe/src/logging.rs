use tracing_subscriber::EnvFilter;

/// Target of the one-off lifecycle events (catalog built, generator created).
pub const PROOF_TARGET: &str = "vidseq_proof";

/// Installs a `tracing_subscriber` filtered by `VIDSEQ_LOG`, then `RUST_LOG`, then `info`.
///
/// Field conventions:
/// - `partition` on every generator event.
/// - `seq_length` and `batch_size` once a generator is configured.
/// - `clip_id` on any per-sample failure.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .init();
}

pub fn env_filter() -> EnvFilter {
    let directives = std::env::var("VIDSEQ_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_default();
    filter_from_directives(&directives)
}

/// Parses `directives` like `RUST_LOG`, falling back to `info` when empty or
/// invalid. Lifecycle events under [`PROOF_TARGET`] stay at `info` unless the
/// directives mention that target themselves.
pub fn filter_from_directives(directives: &str) -> EnvFilter {
    let directives = directives.trim();
    let mut filter = if directives.is_empty() {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    if !directives.contains(PROOF_TARGET) {
        if let Ok(directive) = format!("{PROOF_TARGET}=info").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}
