//! End-to-end rendering of stored sessions.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracelens_core::{CustomTiming, Session, Timing};
use tracelens_render::{
    parse_client_timings, DisplayOptions, FixedEnvironment, MemoryStorage, RenderCoordinator,
    RenderPosition, RenderSettings, RequestContext, SessionStorage,
};

fn environment() -> Arc<FixedEnvironment> {
    Arc::new(FixedEnvironment::new(
        "web-01",
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
    ))
}

fn post_session(user: &str) -> Session {
    let load_post = Timing::new("Load post", 180.333)
        .with_custom_timing(
            "sql",
            CustomTiming::new("select * from posts where id = @id", 40.5).with_execute_type("Reader"),
        )
        .with_custom_timing("redis", CustomTiming::new("GET post:42", 1.25).starting_at(20.0))
        .with_custom_timing("sql", CustomTiming::new("select * from comments", 60.25))
        .with_child(Timing::new("Render comments", 1_234.5));

    let root = Timing::new("GET /posts/<id>", 250.75)
        .with_child(Timing::new("Authenticate", 12.0))
        .with_child(load_post)
        .with_child(Timing::new("Render view", 0.004));

    Session::new("GET /posts/42", root).with_user(user)
}

#[test]
fn plain_text_report() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator =
        RenderCoordinator::new(RenderSettings::new(storage).with_environment(environment()));

    let report = coordinator.render_plain_text(Some(&post_session("alice")));
    insta::assert_snapshot!(report.trim_end(), @r"
    web-01 at 2026-10-19T12:00:00Z
    GET /posts/<id> = 250.75ms
    >Authenticate = 12ms
    >Load post = 180.33ms (redis = 1.25ms in 1 cmd) (sql = 100.75ms in 2 cmds)
    >>Render comments = 1,234.5ms
    >Render view = 0ms
    ");
}

#[test]
fn html_report() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator =
        RenderCoordinator::new(RenderSettings::new(storage).with_environment(environment()));

    let report = coordinator.render_html(Some(&post_session("alice")));
    insta::assert_snapshot!(report.trim_end(), @r"
    web-01 at 2026-10-19T12:00:00Z
    GET /posts/&lt;id&gt; = 250.75ms
    >Authenticate = 12ms
    >Load post = 180.33ms (redis = 1.25ms in 1 cmd) (sql = 100.75ms in 2 cmds)
    >>Render comments = 1,234.5ms
    >Render view = 0ms
    ");
}

#[test]
fn unviewed_sessions_are_surfaced_until_viewed() {
    let storage = Arc::new(MemoryStorage::new());
    let settings = RenderSettings::new(Arc::clone(&storage) as Arc<dyn SessionStorage>)
        .with_environment(environment());
    let coordinator = RenderCoordinator::new(settings);
    let request = RequestContext::new("/posts/42").with_user("alice");
    let display = DisplayOptions {
        position: Some(RenderPosition::Right),
        show_controls: Some(true),
        ..DisplayOptions::default()
    };

    let earlier = [post_session("alice"), post_session("alice")];
    let earlier_ids: Vec<_> = earlier.iter().map(Session::id).collect();
    for session in earlier {
        storage.save(session);
    }
    storage.save(post_session("bob"));

    let current = post_session("alice");
    let payload = coordinator
        .render_includes(Some(&current), &request, &display)
        .unwrap()
        .unwrap();
    assert_eq!(payload.ids, [earlier_ids[0], earlier_ids[1], current.id()]);
    assert_eq!(payload.display, display);

    // The UI fetches each listed session, which marks it viewed.
    for id in &payload.ids {
        storage.set_viewed(Some("alice"), *id);
    }

    let next = post_session("alice");
    let payload = coordinator
        .render_includes(Some(&next), &request, &display)
        .unwrap()
        .unwrap();
    assert_eq!(payload.ids, [next.id()]);
}

#[test]
fn client_timings_from_posted_form() {
    let form = [
        ("clientPerformance[navigation][redirectCount]", "0"),
        ("clientPerformance[timing][navigationStart]", "1700000000000"),
        ("clientPerformance[timing][requestStart]", "1700000000040"),
        ("clientPerformance[timing][responseStart]", "1700000000090"),
        ("clientPerformance[timing][responseEnd]", "1700000000120"),
        ("clientPerformance[timing][domContentLoadedEventStart]", "1700000000300"),
        ("clientPerformance[timing][domContentLoadedEventEnd]", "1700000000310"),
        ("clientPerformance[timing][firstPaintTime]", "1700000000200"),
    ];

    let timings = parse_client_timings(form);
    let summary: Vec<(String, i64, Option<i64>)> = timings
        .entries
        .iter()
        .map(|entry| (entry.display_name(), entry.start_ms, entry.duration_ms))
        .collect();

    assert_eq!(
        summary,
        [
            ("Request".to_string(), 40, None),
            ("Response".to_string(), 90, Some(30)),
            ("Dom Content Loaded Event".to_string(), 300, Some(10)),
            ("First Paint Time".to_string(), 200, None),
        ]
    );
    assert_eq!(timings.skipped, 0);
}
