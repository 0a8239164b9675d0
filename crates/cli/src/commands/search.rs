//! `taskloop search`: rank workspace files against a query.

use taskloop_agent::Runtime;

use super::GlobalOpts;

pub async fn run(
    opts: &GlobalOpts,
    query: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.load_config()?;
    let limit = limit.unwrap_or(config.workers.search_max_files);
    let runtime = Runtime::from_config(config);
    let report = runtime.prime().await;

    let hits = runtime.store.search(query).await;
    if hits.is_empty() {
        println!("No matches for '{query}' in {} cached file(s)", report.inserted);
        return Ok(());
    }

    println!("{:>8}  PATH", "SCORE");
    for hit in hits.iter().take(limit) {
        println!("{:>8.2}  {}", hit.score, hit.id);
    }
    if hits.len() > limit {
        println!("... {} more", hits.len() - limit);
    }
    Ok(())
}
