use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Config file created. Set bootstrap credentials in config.toml and run again.");
    } else {
        println!("config.toml already exists; leaving it untouched.");
    }
    Ok(())
}
