//! Tracelens demo.
//!
//! Builds a sample profiling session, stores it next to a few earlier ones
//! and prints every rendering of it.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p tracelens-demo
//! RUST_LOG=debug cargo run -p tracelens-demo -- --user alice
//! ```

use std::sync::Arc;

use tracelens_core::{parse_client_timings, CustomTiming, Session, Timing};
use tracelens_render::{
    DisplayOptions, MemoryStorage, RenderCoordinator, RenderPosition, RenderSettings,
    RequestContext, SessionStorage, StorageLimits,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default user the sample sessions belong to.
const DEFAULT_USER: &str = "demo";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let user = parse_args();

    let storage = Arc::new(MemoryStorage::with_limits(StorageLimits {
        capacity: 100,
        ..StorageLimits::default()
    }));
    for page in ["/", "/about"] {
        storage.save(sample_session(page, &user));
    }

    let coordinator = RenderCoordinator::new(RenderSettings::new(
        Arc::clone(&storage) as Arc<dyn SessionStorage>
    ));
    let current = sample_session("/posts/42", &user);

    let display_options = DisplayOptions {
        position: Some(RenderPosition::BottomLeft),
        max_traces_to_show: Some(15),
        ..DisplayOptions::default()
    };
    let request = RequestContext::new("/posts/42").with_user(user.clone());
    if let Some(payload) = coordinator.render_includes(Some(&current), &request, &display_options)? {
        info!(
            position = display_options.position.map_or("default", |p| p.name()),
            sessions = payload.ids.len(),
            "Includes payload ready"
        );
        println!("{}", payload.to_json()?);
    }

    print!("{}", coordinator.render_plain_text(Some(&current)));
    print!("{}", coordinator.render_html(Some(&current)));

    let client = parse_client_timings([
        ("clientPerformance[timing][navigationStart]", "1000"),
        ("clientPerformance[timing][responseStart]", "1040"),
        ("clientPerformance[timing][responseEnd]", "1065"),
        ("clientPerformance[timing][domInteractive]", "1120"),
    ]);
    for entry in &client.entries {
        info!(
            name = %entry.display_name(),
            start_ms = entry.start_ms,
            duration_ms = ?entry.duration_ms,
            "Client timing"
        );
    }

    storage.save(current);
    info!(stored = storage.len(), "Done");
    Ok(())
}

fn parse_args() -> String {
    let args: Vec<String> = std::env::args().collect();
    let mut user = DEFAULT_USER.to_string();

    let mut i = 1;
    while i < args.len() {
        if matches!(args[i].as_str(), "--user" | "-u") && i + 1 < args.len() {
            user = args[i + 1].clone();
            i += 1;
        }
        i += 1;
    }

    user
}

fn sample_session(page: &str, user: &str) -> Session {
    let query = Timing::new("Load data", 45.25)
        .with_custom_timing("sql", CustomTiming::new("select * from posts", 30.0))
        .with_custom_timing("sql", CustomTiming::new("select * from tags", 10.5))
        .with_custom_timing("redis", CustomTiming::new("GET page-cache", 0.75));
    let root = Timing::new(format!("GET {page}"), 120.5)
        .with_child(query)
        .with_child(Timing::new("Render view", 60.125));

    Session::new(format!("GET {page}"), root).with_user(user)
}
