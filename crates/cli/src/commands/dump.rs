//! `dump` command implementation.
//!
//! Every selected listener streams on its own thread and writes its frames
//! under `<out>/<listener name>`.

use std::thread;

use anyhow::{Context, Result};
use tracing::{error, info};

use listener::NameRegistry;

use super::{load_setup, select_listeners};
use crate::cli::DumpArgs;
use crate::error::CliError;

/// Execute the `dump` command
pub fn run_dump(args: &DumpArgs) -> Result<()> {
    info!(
        config = %args.config.display(),
        out = %args.out.display(),
        max_frames = ?args.max_frames,
        "Dumping listener streams"
    );

    let setup = load_setup(&args.config)?;
    let configs = select_listeners(setup, args.listener.as_deref())?;

    let registry = NameRegistry::new();
    let listeners = configs
        .iter()
        .map(|config| {
            sensors::build_listener(&registry, config)
                .with_context(|| format!("Failed to build listener '{}'", config.effective_name()))
        })
        .collect::<Result<Vec<_>>>()?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let results: Vec<(String, Result<u32, CliError>)> = thread::scope(|scope| {
        let handles: Vec<_> = listeners
            .into_iter()
            .map(|mut listener| {
                let dir = args.out.join(listener.name());
                let max_frames = args.max_frames;
                scope.spawn(move || {
                    let name = listener.name().to_string();
                    let written = listener
                        .dump_stream(&dir, max_frames)
                        .map_err(|e| CliError::stream(name.clone(), e.to_string()));
                    if let Ok(count) = written {
                        observability::record_frames_saved(&name, u64::from(count));
                    }
                    (name, written)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    (
                        "<unknown>".to_string(),
                        Err(CliError::stream("<unknown>", "dump thread panicked")),
                    )
                })
            })
            .collect()
    });

    let mut failed = 0usize;
    for (name, result) in &results {
        match result {
            Ok(count) => println!("✓ {}: {} frames -> {}", name, count, args.out.join(name).display()),
            Err(e) => {
                failed += 1;
                error!(listener = %name, error = %e, "Dump failed");
                println!("✗ {}: {}", name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} listeners failed to dump", failed, results.len());
    }
    Ok(())
}
