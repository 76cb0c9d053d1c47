//! Check system capabilities.

use reelsmith_common::{config_file_path, AppConfig};
use reelsmith_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelsmith System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[OK] Config: defaults ({} not present)", path.display());
    }

    match config.timeline.frame_rate() {
        Ok(rate) => println!(
            "[OK] Timeline: {} {}x{} @ {}",
            config.timeline.format_name, config.timeline.width, config.timeline.height, rate
        ),
        Err(e) => println!("[FAIL] Timeline: {e}"),
    }

    let ffprobe = &config.probe.ffprobe;
    let probe_ok = command_exists(ffprobe);
    if probe_ok {
        println!("[OK] Duration probe: {ffprobe}");
    } else {
        println!("[WARN] Duration probe: {ffprobe} not found");
        println!(
            "       Clips without an explicit duration will use {}s.",
            config.timeline.still_duration_secs
        );
    }

    println!();
    if probe_ok {
        println!("All capabilities are available. Reelsmith is ready.");
    } else {
        println!("Install ffmpeg to enable automatic clip durations.");
    }

    Ok(())
}
