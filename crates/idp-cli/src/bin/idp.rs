use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use idp_core::Config;
use idp_store::DocumentStore;

#[derive(Parser)]
#[command(author, version, about = "Identifier Provider CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit each XML/ZIP listed in `source_list`, appending one result
    /// line per submission to `result_log`.
    RequestId { source_list: PathBuf, result_log: PathBuf },
    /// Print the stored XML for `v3`.
    GetXml { v3: String },
}

fn main() {
    idp_cli::init_logging("IDP_LOG");
    let interrupted = idp_cli::install_interrupt_handler();
    let result = run(&interrupted);
    if let Err(err) = &result {
        tracing::error!(error = %err, "idp command failed");
    }
    std::process::exit(idp_cli::exit_code(&result));
}

fn run(interrupted: &std::sync::Arc<std::sync::atomic::AtomicBool>) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    let store = DocumentStore::open(&config.store_path, config.store_map_size).context("opening id-provider store")?;

    match cli.command {
        Command::RequestId { source_list, result_log } => request_id(&store, &source_list, &result_log, interrupted),
        Command::GetXml { v3 } => get_xml(&store, &v3),
    }
}

fn request_id(
    store: &DocumentStore,
    source_list: &std::path::Path,
    result_log: &std::path::Path,
    interrupted: &std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> anyhow::Result<()> {
    for path in idp_cli::read_list(source_list)? {
        idp_cli::check_interrupted(interrupted)?;

        let outcome = submit_one(store, std::path::Path::new(&path));
        let line = match outcome {
            Ok(idp_core::PipelineOutcome::Rewritten(_)) => format!("{path}\tok\trewritten"),
            Ok(idp_core::PipelineOutcome::NoChange) => format!("{path}\tok\tno_change"),
            Err(err) => format!("{path}\terror\t{err}"),
        };
        idp_cli::append_line(result_log, &line)?;
    }
    Ok(())
}

fn submit_one(store: &DocumentStore, path: &std::path::Path) -> Result<idp_core::PipelineOutcome, anyhow::Error> {
    let input = idp_xml::parse(path)?;
    let facts = idp_types::DocumentFacts::from_input(input)?;
    Ok(idp_core::request_id(store, facts, "idp-cli")?)
}

fn get_xml(store: &DocumentStore, v3: &str) -> anyhow::Result<()> {
    let record = store.find_by_id(v3)?.with_context(|| format!("no record found for v3 {v3:?}"))?;
    println!("{}", record.xml);
    Ok(())
}
