use chrono::{Duration, Utc};
use clap::Parser;
use feed_aggregator::{
    AuthorProfile, FeedConfig, FeedSession, InMemoryFeedService, Post, StaticMembership,
    StaticProfiles,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Demo: merge posts from several paginated group sources into one
/// reverse-chronological feed for a user.
#[derive(Parser)]
#[command(name = "feed-aggregator")]
struct Args {
    /// Posts requested from each source per fetch
    #[arg(long, default_value_t = 5)]
    page_size: usize,

    /// Maximum posts per returned feed page
    #[arg(long, default_value_t = 8)]
    target_size: usize,

    /// How many pages to pull before stopping
    #[arg(long, default_value_t = 4)]
    max_pages: usize,

    /// Print pages as JSON instead of one line per post
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut service = InMemoryFeedService::new();
    service.add_source("hiking-club", seed_posts("hiking-club", &["maya", "jon"], 12, 0));
    service.add_source("book-circle", seed_posts("book-circle", &["priya"], 7, 3));
    service.add_source("run-crew", seed_posts("run-crew", &["jon", "sam"], 9, 5));

    let membership = StaticMembership::new()
        .with_user("demo-user", &["hiking-club", "book-circle", "run-crew"]);
    let profiles = StaticProfiles::new(vec![
        profile("maya", "Maya R."),
        profile("jon", "Jon K."),
        profile("priya", "Priya S."),
        profile("sam", "Sam T."),
    ]);

    let session = FeedSession::open(
        Arc::new(membership),
        Arc::new(profiles),
        Arc::new(service),
        "demo-user".to_string(),
        FeedConfig {
            page_size_per_source: args.page_size,
            target_size: args.target_size,
        },
    );

    let mut page = match session.initial_load().await? {
        Some(page) => page,
        None => anyhow::bail!("initial load was ignored"),
    };

    let mut page_number = 1;
    loop {
        print_page(&session, page_number, &page, args.json).await?;
        if !page.has_more || page_number >= args.max_pages {
            break;
        }
        match session.load_more().await {
            Some(next) => {
                page = next;
                page_number += 1;
            }
            None => break,
        }
    }

    session.close();
    info!("feed session finished after {} pages", page_number);
    Ok(())
}

async fn print_page(
    session: &FeedSession,
    page_number: usize,
    page: &feed_aggregator::FeedPage,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&page.items)?);
        return Ok(());
    }

    println!("--- page {} ({} posts, has_more: {})", page_number, page.items.len(), page.has_more);
    for post in &page.items {
        let author = session
            .author_profile(&post.author_id)
            .await
            .map(|p| p.display_name)
            .unwrap_or_else(|| post.author_id.clone());
        println!(
            "{}  [{}]  {}: {}",
            post.created_at.format("%H:%M"),
            post.source_id,
            author,
            post.content
        );
    }
    Ok(())
}

fn seed_posts(source_id: &str, authors: &[&str], count: usize, stagger_minutes: i64) -> Vec<Post> {
    let now = Utc::now();
    (0..count)
        .map(|i| Post {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            author_id: authors[i % authors.len()].to_string(),
            created_at: now - Duration::minutes(stagger_minutes + (i as i64) * 11),
            content: format!("post {} in {}", i + 1, source_id),
        })
        .collect()
}

fn profile(user_id: &str, display_name: &str) -> AuthorProfile {
    AuthorProfile {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        photo_url: None,
    }
}
