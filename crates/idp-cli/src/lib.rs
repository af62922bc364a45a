use std::io::Write as _;
use std::path::Path;

/// Initialize `tracing` from `var` (`IDP_LOG`/`MIGR_LOG`), defaulting to
/// `info`, grounded on the ecosystem's usual `tracing_subscriber::fmt` +
/// `EnvFilter` wiring rather than `meilisearch`'s full reloadable-layer
/// stack, which only exists to support runtime log-route changes this CLI
/// has no use for.
pub fn init_logging(var: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(var).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// `130` on interrupt, `1` on any other error, `0` on success
/// (spec.md §6 "Exit codes").
pub fn exit_code(result: &anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) if err.downcast_ref::<Interrupted>().is_some() => 130,
        Err(_) => 1,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("interrupted")]
pub struct Interrupted;

/// Install a `SIGINT` handler that turns the next interrupt into an
/// `Interrupted` error the caller's main loop can observe between items,
/// mirroring `cli.py::main`'s `KeyboardInterrupt` handling.
pub fn install_interrupt_handler() -> std::sync::Arc<std::sync::atomic::AtomicBool> {
    let interrupted = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, std::sync::atomic::Ordering::SeqCst)).expect("failed to install SIGINT handler");
    interrupted
}

/// Bail with `Interrupted` if `flag` was set since the last check.
pub fn check_interrupted(flag: &std::sync::atomic::AtomicBool) -> anyhow::Result<()> {
    if flag.load(std::sync::atomic::Ordering::SeqCst) {
        anyhow::bail!(Interrupted);
    }
    Ok(())
}

/// Read a newline-separated list of paths, skipping blank lines
/// (`idp request_id <source_list>`, `migr migrate <issn_list>`, ...).
pub fn read_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
}

/// Append one result line to the log file opened in append mode, matching
/// `idp request_id <result_log>`'s incremental write semantics.
pub fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
