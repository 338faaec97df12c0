mod config;
mod decode;
mod github;
mod search;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use github::Repository;

/// gh-search — query the GitHub repository search API and page through
/// the results.
#[derive(Parser, Debug)]
#[command(name = "gh-search", version, about)]
struct Cli {
    /// Search query (GitHub search syntax, e.g. "http client language:rust")
    query: String,

    /// Number of result pages to fetch
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    debug!("loading configuration");
    let config = config::Config::load()?;

    let transport = github::HttpTransport::new(&config)?;
    let api = github::GitHubApi::new(transport);
    let session = search::SearchSession::new(api, &cli.query)
        .ok_or("search query must not be empty")?;

    for page in 1..=cli.pages {
        info!(query = %session.query(), page, "fetching search results");
        if !session.search(false).await? {
            debug!("no more pages to fetch");
            break;
        }
    }

    let results = session.results();
    print_results(&results);
    info!(
        results = session.result_count(),
        next_page = session.current_page(),
        completed = session.completed(),
        "done"
    );

    if !session.completed() {
        println!(
            "{}",
            format!("(more results available, rerun with --pages {})", cli.pages + 1).dimmed()
        );
    }

    Ok(())
}

fn print_results(results: &[Repository]) {
    println!();
    for (index, repo) in results.iter().enumerate() {
        let language = repo.language.as_deref().unwrap_or("-");
        println!(
            "{:>4}. {}  {}  {}",
            index + 1,
            repo.full_name.bold(),
            format!("★ {}", repo.stargazers_count).yellow(),
            language.cyan(),
        );
        if let Some(description) = &repo.description {
            println!("      {description}");
        }
        println!("      {}", repo.html_url.as_str().dimmed());
    }
    println!();
}
