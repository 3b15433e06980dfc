//! Show annotation file information.

use std::path::PathBuf;

use vidredact_annotation_model::load_annotations;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let index = load_annotations(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load annotations: {e}"))?;
    let summary = index.summary();

    println!("Annotations: {}", path.display());
    println!("  Tracks: {}", summary.tracks);
    println!("  Annotated frames: {}", summary.frames);
    match (summary.first_frame, summary.last_frame) {
        (Some(first), Some(last)) => println!("  Frame range: {first}..={last}"),
        _ => println!("  Frame range: (none)"),
    }
    println!();

    println!("Regions: {}", summary.regions);
    println!("  Boxes: {}", summary.boxes);
    println!("  Ellipses: {}", summary.ellipses);
    println!("  Polygons: {}", summary.polygons);
    println!("  Occluded: {}", summary.occluded);
    println!("  Outside: {}", summary.outside);

    Ok(())
}
