//! Preflight check: confirms `config.ini` is present and parses, the
//! storage path is writable, and `ffmpeg`/`ffprobe` are on `PATH`.

use gamecam_pipeline::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = PipelineConfig::find_config_file()
        .ok_or_else(|| anyhow::anyhow!("no config.ini found in current dir, binary dir, parent dir, or ./video_grouper/"))?;
    println!("selfcheck: found config at {}", config_path.display());

    let config = PipelineConfig::load(&config_path)?;
    println!("selfcheck: storage path = {}", config.storage_path.display());

    tokio::fs::create_dir_all(&config.storage_path).await?;

    gamecam_media::check_ffmpeg()?;
    gamecam_media::check_ffprobe()?;
    println!("selfcheck: ffmpeg/ffprobe present");

    println!("selfcheck: ok");
    Ok(())
}
