//! `taskloop init`: write the default configuration file.

use taskloop_config::AppConfig;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = opts.config_path();

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or re-run with --force to overwrite.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;

    println!("Wrote default config to: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set [tools] code_generator / test_generator / test_runner commands");
    println!("  2. Run: taskloop run --kind code --description \"...\"");
    Ok(())
}
