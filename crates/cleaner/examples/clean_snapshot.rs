//! Clean a page snapshot and print the result
//!
//! ```text
//! cargo run --example clean_snapshot -- [snapshot.json] [config.json]
//! ```
//!
//! Without a snapshot a small RUTUBE-like page is built in place.

use dom::{Document, DomSerializer, DomService, Fragment};
use rutube_cleaner::{CleanerConfig, PageSession, SessionConfig};
use std::time::Duration;

fn demo_page() -> Result<Document, Box<dyn std::error::Error>> {
    let mut doc = Document::new("https://rutube.ru/");
    let body = doc.body()?;
    doc.append(
        body,
        &Fragment::element("div")
            .with_class("menu-content-module__menuContent")
            .with_child(
                Fragment::element("a")
                    .with_attr("href", "/kids")
                    .with_text("RUTUBE детям"),
            ),
    )?;
    doc.append(
        body,
        &Fragment::element("main")
            .with_child(Fragment::element("h1").with_text("Популярное"))
            .with_child(Fragment::element("button").with_text("Оформить подписку")),
    )?;
    doc.append(
        body,
        &Fragment::element("footer")
            .with_child(
                Fragment::element("a")
                    .with_attr("href", "https://apps.apple.com/app/rutube")
                    .with_child(Fragment::element("img").with_attr("alt", "App Store")),
            )
            .with_child(Fragment::element("a").with_attr("href", "/kids").with_text("Детям"))
            .with_child(Fragment::element("small").with_text("© 2024, RUTUBE")),
    )?;
    Ok(doc)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let document = match args.next() {
        Some(path) => {
            println!("Loading snapshot from: {}", path);
            let json = std::fs::read_to_string(&path)?;
            DomService::new().parse_snapshot_str(&json, "https://rutube.ru/")?
        }
        None => demo_page()?,
    };
    let mut cleaner = match args.next() {
        Some(path) => CleanerConfig::from_path(path)?,
        None => CleanerConfig::default(),
    };
    // Same schedule as in the browser, compressed
    cleaner.timing.startup_delays_ms = vec![50, 100, 150];

    let config = SessionConfig {
        url: document.url().to_string(),
        cleaner,
        ..SessionConfig::default()
    };
    let session = PageSession::new(config, document)?;

    session.start().await?;
    session.ready().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("Sweeps run: {}", session.sweep_count());

    let shared = session.document();
    let html = {
        let doc = rutube_cleaner::scheduler::lock(&shared);
        DomSerializer::new().serialize(doc.arena())?
    };
    println!("{}", html);

    session.stop().await?;
    Ok(())
}
