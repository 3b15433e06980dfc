//! Check system capabilities.

use vidredact_common::config::AppConfig;
use vidredact_render_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("vidredact System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("decoder/encoder", &config.media.ffmpeg_bin),
        ("stream probe", &config.media.ffprobe_bin),
    ];

    let mut all_ok = true;
    for (role, binary) in tools {
        if command_exists(binary) {
            println!("[OK]   {binary} ({role})");
        } else {
            println!("[MISS] {binary} ({role})");
            all_ok = false;
        }
    }
    println!("       Output codec: {}", config.media.video_codec);

    println!();
    if all_ok {
        println!("All required tools are available. vidredact is ready.");
        Ok(())
    } else {
        anyhow::bail!("Some required tools are missing. Install ffmpeg or set media paths in the config.")
    }
}
