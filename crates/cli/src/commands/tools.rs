//! `taskloop tools`: list registered tools.

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.load_config()?;
    let registry = taskloop_tools::default_registry(&config.tools);

    println!("Workspace: {}", config.tools.workspace_root.display());
    println!("Registered tools ({}):", registry.len());
    for (name, description) in registry.describe() {
        println!("  {name:<14} {description}");
    }

    let missing: Vec<&str> = ["code_generate", "test_generate", "test_run"]
        .into_iter()
        .filter(|name| !registry.contains(name))
        .collect();
    if !missing.is_empty() {
        println!();
        println!("Not configured: {}", missing.join(", "));
        println!("Set the matching commands under [tools] to enable them.");
    }
    Ok(())
}
