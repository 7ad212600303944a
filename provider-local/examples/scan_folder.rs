//! Scan a music folder and print what the local files core found.
//!
//! ```text
//! cargo run -p provider-local --example scan_folder -- ~/Music
//! ```

use anyhow::{bail, Context};
use core_contracts::{CancellationToken, Core, ItemKind};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use provider_local::{DirectorySource, LocalFilesCore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let Some(folder) = std::env::args().nth(1) else {
        bail!("usage: scan_folder <music folder>");
    };

    let config = CoreConfig::builder()
        .scan_playlists(true)
        .build()
        .context("invalid configuration")?;
    let core = LocalFilesCore::new(Arc::new(DirectorySource::new(&folder)), config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    core.init(&cancel)
        .await
        .with_context(|| format!("failed to scan {folder}"))?;

    let library = core.library();
    for kind in [ItemKind::Track, ItemKind::Album, ItemKind::Artist, ItemKind::Playlist] {
        println!("{:>10}: {}", kind.as_str(), library.count(kind).await?);
    }

    for track in library.get_tracks(0, 20).await? {
        println!(
            "{} - {}",
            track.artist_names.join(", "),
            track.name
        );
    }

    core.dispose().await?;
    Ok(())
}
