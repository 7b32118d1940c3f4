use anyhow::Result;

#[cfg(not(target_os = "android"))]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    camera_roll::run()
}

#[cfg(target_os = "android")]
fn main() -> Result<()> {
    Ok(())
}
