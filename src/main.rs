use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use dropscene_resolver::coordinator::{Resolution, ResolutionCoordinator, ResolutionOutcome};
use log::{info, trace};

use crate::io::fs::{FsDirectory, entries_from_paths};
use crate::scene::GltfSceneParser;
use crate::settings::CliArgs;

mod io;
mod scene;
mod settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    trace!("Starting with args: {:?}", args);

    let entries = entries_from_paths(&args.paths, args.page_size.into()).await?;
    let coordinator = ResolutionCoordinator::new(args.resolver_options());

    // Stands in for the UI, which only ever looks at the published phase.
    let mut phases = coordinator.subscribe();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let update = *phases.borrow_and_update();
            info!("Drop #{} is {:?}", update.generation, update.phase);
        }
    });

    let resolving = coordinator.resolve::<FsDirectory>(entries);
    let resolution = match args.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), resolving)
            .await
            .with_context(|| format!("Resolving the drop took longer than {} seconds", secs))??,
        None => resolving.await?,
    };

    print!("{}", resolution.report);

    let Some(summary) = coordinator.deliver(&resolution, &mut GltfSceneParser)? else {
        bail!("Nothing to load: the drop contains no .gltf or .glb file that could be read");
    };
    println!("{}", summary);

    if let Some(output) = &args.output {
        write_scene(&resolution, output, args.keep_handles).await?;
        info!("Wrote {}", output.display());
    }

    Ok(())
}

async fn write_scene(resolution: &Resolution, output: &Path, keep_handles: bool) -> anyhow::Result<()> {
    let bytes = match &resolution.outcome {
        ResolutionOutcome::Scene(scene) if keep_handles => scene.to_json()?.into_bytes(),
        ResolutionOutcome::Scene(scene) => scene.embed()?.into_bytes(),
        ResolutionOutcome::Package(package) => package.bytes().to_vec(),
        ResolutionOutcome::NothingToLoad => return Ok(()),
    };

    tokio::fs::write(output, bytes)
        .await
        .with_context(|| format!("Cannot write {}", output.display()))
}
