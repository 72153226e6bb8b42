use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use scout_core::{
    decode_message, update, Category, CoordinatorState, Effect, Lifecycle, Msg, Outcome,
    Progress, ProgressStatus, Reply, ScraperFlags, StatusView, WireError,
};

#[test]
fn update_is_noop() {
    let state = CoordinatorState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn agent_reports_map_to_effects() {
    let state = CoordinatorState::new();
    let cases = vec![
        (Msg::PauseScraping, vec![Effect::SetPaused(true)]),
        (
            Msg::ResumeScraping,
            vec![Effect::SetPaused(false), Effect::ReopenParent],
        ),
        (Msg::QuickResume, vec![Effect::ReopenParent]),
        (
            Msg::OpenUrls(vec!["a".to_string()]),
            vec![Effect::EnqueueUrls(vec!["a".to_string()])],
        ),
        (Msg::OpenUrls(Vec::new()), Vec::new()),
        (Msg::ListingsCount(40), vec![Effect::SetTotalListings(40)]),
        (
            Msg::ScrapeSucceeded,
            vec![Effect::RecordOutcome(Outcome::Scraped)],
        ),
        (Msg::ScrapeFailed, vec![Effect::RecordOutcome(Outcome::Failed)]),
        (Msg::GetDeviceId, vec![Effect::ReplyDeviceId]),
        (
            Msg::SetParent("https://p".to_string()),
            vec![Effect::SetParent("https://p".to_string())],
        ),
    ];

    for (msg, expected) in cases {
        let (next, effects) = update(state.clone(), msg.clone());
        assert_eq!(effects, expected, "effects for {msg:?}");
        assert_eq!(*next.lifecycle(), Lifecycle::Idle);
    }
}

#[test]
fn decodes_tagged_messages() {
    assert_eq!(
        decode_message(r#"{"type":"START_SCRAPING"}"#),
        Ok(Msg::StartScraping)
    );
    assert_eq!(
        decode_message(r#"{"type":"RESUME_SCRAPING_DATA","persistent":true}"#),
        Ok(Msg::ResumeScraping)
    );
    assert_eq!(
        decode_message(r#"{"type":"RESUME_SCRAPING1"}"#),
        Ok(Msg::QuickResume)
    );
    assert_eq!(
        decode_message(r#"{"type":"SET_PARENT","parentUrl":"https://l/1"}"#),
        Ok(Msg::SetParent("https://l/1".to_string()))
    );
    assert_eq!(
        decode_message(r#"{"type":"SITE_SELECTED","siteValue":"bayut"}"#),
        Ok(Msg::SiteSelected("bayut".to_string()))
    );
    assert_eq!(
        decode_message(r#"{"type":"LISTINGS_COUNT","count":24}"#),
        Ok(Msg::ListingsCount(24))
    );
    assert_eq!(
        decode_message(r#"{"type":"OPEN_URLS","urls":["a","b"]}"#),
        Ok(Msg::OpenUrls(vec!["a".to_string(), "b".to_string()]))
    );
}

#[test]
fn open_urls_with_non_array_payload_is_empty() {
    assert_eq!(
        decode_message(r#"{"type":"OPEN_URLS","urls":"a"}"#),
        Ok(Msg::OpenUrls(Vec::new()))
    );
    assert_eq!(
        decode_message(r#"{"type":"OPEN_URLS"}"#),
        Ok(Msg::OpenUrls(Vec::new()))
    );
}

#[test]
fn unknown_and_malformed_messages_are_rejected() {
    assert_eq!(
        decode_message(r#"{"type":"SELF_DESTRUCT"}"#),
        Err(WireError::UnknownType("SELF_DESTRUCT".to_string()))
    );
    assert!(matches!(
        decode_message("not json"),
        Err(WireError::Malformed(_))
    ));
    assert!(matches!(
        decode_message(r#"{"type":"LISTINGS_COUNT","count":"many"}"#),
        Err(WireError::Malformed(_))
    ));
}

#[test]
fn replies_serialize_like_the_extension() {
    let device = Reply::DeviceId {
        device_id: Some("dev-1".to_string()),
    };
    assert_eq!(
        serde_json::to_string(&device).unwrap(),
        r#"{"deviceId":"dev-1"}"#
    );
    assert_eq!(
        serde_json::to_string(&Reply::category_done()).unwrap(),
        r#"{"status":"done"}"#
    );
}

#[test]
fn category_accepts_underscore_id_and_keeps_extra_fields() {
    let raw = r#"{"_id":"64f","categoryUrl":"https://l/x","categoryName":"Villas","site":"bayut"}"#;
    let category: Category = serde_json::from_str(raw).unwrap();
    assert_eq!(category.id, "64f");
    assert_eq!(category.category_name.as_deref(), Some("Villas"));
    assert_eq!(category.extra.get("site").and_then(|v| v.as_str()), Some("bayut"));

    let plain: Category = serde_json::from_str(r#"{"id":"7","categoryUrl":"https://l/y"}"#).unwrap();
    assert_eq!(plain.id, "7");
}

#[test]
fn progress_counts_and_percent() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut progress = Progress::started("c1", now);
    progress.set_total_listings(3, now);
    progress.record(Outcome::Scraped, now);
    progress.record(Outcome::Failed, now);

    assert_eq!(progress.completed(), 2);
    assert_eq!(progress.percent(), 67);

    progress.record(Outcome::Scraped, now);
    progress.record(Outcome::Scraped, now);
    assert_eq!(progress.percent(), 100);

    progress.mark_done(now);
    assert_eq!(progress.status, ProgressStatus::Done);
}

#[test]
fn flags_serialize_with_camel_case_keys() {
    let json = serde_json::to_string(&ScraperFlags::stopped()).unwrap();
    assert_eq!(json, r#"{"isPaused":false,"isStopped":true}"#);
    let empty: ScraperFlags = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, ScraperFlags::running());
}

#[test]
fn status_view_prefers_flags_over_progress_status() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let progress = Progress::started("c1", now);
    let category = Category::new("c1", "https://l/c1").with_name("Villas");
    let paused = ScraperFlags {
        is_paused: true,
        is_stopped: false,
    };

    let view = StatusView::build(&Lifecycle::Idle, paused, Some(&progress), Some(&category));
    assert_eq!(view.status, "paused");
    assert_eq!(view.category_name.as_deref(), Some("Villas"));

    let view = StatusView::build(
        &Lifecycle::Idle,
        ScraperFlags::running(),
        Some(&progress),
        None,
    );
    assert_eq!(view.status, "running");

    let view = StatusView::build(&Lifecycle::Idle, ScraperFlags::running(), None, None);
    assert_eq!(view.status, "N/A");
    assert_eq!(view.percent, 0);
}
