//! Refresh cycles end to end over fake backends

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use transync_content::{
    CacheConfig, ContentResolver, Grid, ManualClock, OriginError, ResponseCache, SheetsBackend,
};
use transync_core::state::{save_draft, save_submission};
use transync_core::{
    ChangeDetector, ContentHashStore, DirectoryConfig, DirectoryFetcher, DraftPrompt,
    EffectiveStatus, MemoryStateStore, ProtectionState, SubmissionRecord, SyncConfig, SyncError,
    SyncServices, TaskId,
};
use transync_test_utils::{directory_grid, FakeSheets, RowFixture, ScriptedHttp};

const DIRECTORY: &str = "1DirectoryAbCdEfGhIj";

fn config() -> SyncConfig {
    SyncConfig::new().with_directory(DirectoryConfig::new(DIRECTORY))
}

fn rows() -> Vec<RowFixture> {
    vec![
        RowFixture::new(5, "Ep 5").source("https://cdn.example.com/ep5.txt"),
        RowFixture::new(6, "Ep 6").source("https://cdn.example.com/ep6.txt"),
    ]
}

struct Setup {
    services: SyncServices,
    sheets: Arc<FakeSheets>,
    state: Arc<MemoryStateStore>,
    clock: Arc<ManualClock>,
}

fn setup() -> Setup {
    let sheets = FakeSheets::new();
    sheets.set_tab(DIRECTORY, "Tasks", directory_grid(&rows()));
    let state = Arc::new(MemoryStateStore::new());
    let clock = Arc::new(ManualClock::default());
    let services = SyncServices::build(
        &config(),
        ScriptedHttp::new(),
        sheets.clone(),
        state.clone(),
        clock.clone(),
    );
    Setup {
        services,
        sheets,
        state,
        clock,
    }
}

#[tokio::test]
async fn first_refresh_adds_every_row() {
    let s = setup();
    let list = s.services.sync.refresh(false).await.unwrap();

    assert_eq!(list.tasks.len(), 2);
    assert_eq!(list.summary.added, 2);
    assert!(list.merged);
    assert_eq!(list.get(TaskId(5)).map(|t| t.record.title.as_str()), Some("Ep 5"));
    assert_eq!(s.services.sync.current(), Some(list));
}

#[tokio::test]
async fn forced_refresh_keeps_submitted_title() {
    let s = setup();
    s.services.sync.refresh(false).await.unwrap();
    save_submission(s.state.as_ref(), TaskId(5), &SubmissionRecord::default()).unwrap();

    let renamed = vec![
        RowFixture::new(5, "Ep 5 renamed").source("https://cdn.example.com/ep5.txt"),
        RowFixture::new(6, "Ep 6 renamed").source("https://cdn.example.com/ep6.txt"),
    ];
    s.sheets.set_tab(DIRECTORY, "Tasks", directory_grid(&renamed));
    s.clock.advance(Duration::from_secs(2));

    let list = s.services.sync.refresh(true).await.unwrap();

    let five = list.get(TaskId(5)).unwrap();
    assert_eq!(five.record.title, "Ep 5");
    assert_eq!(five.status, EffectiveStatus::Complete);
    assert_eq!(five.protection, ProtectionState::Submitted);
    assert_eq!(list.get(TaskId(6)).unwrap().record.title, "Ep 6 renamed");
    assert_eq!(list.summary.protected, 1);
    assert_eq!(list.summary.updated, 1);
}

#[tokio::test]
async fn unchanged_directory_skips_merge_but_reannotates() {
    let s = setup();
    s.services.sync.refresh(false).await.unwrap();
    save_draft(
        s.state.as_ref(),
        TaskId(6),
        &DraftPrompt {
            guide_prompt: "formal register".into(),
            ..DraftPrompt::default()
        },
    )
    .unwrap();

    let list = s.services.sync.refresh(false).await.unwrap();

    assert!(!list.merged);
    assert_eq!(list.get(TaskId(6)).unwrap().status, EffectiveStatus::InProgress);
    assert_eq!(list.get(TaskId(5)).unwrap().status, EffectiveStatus::Waiting);
}

#[tokio::test]
async fn malformed_directory_keeps_previous_list() {
    let s = setup();
    let before = s.services.sync.refresh(false).await.unwrap();

    s.sheets.set_tab(DIRECTORY, "Tasks", vec![vec!["notes only".to_string()]]);
    s.clock.advance(Duration::from_secs(2));
    let err = s.services.sync.refresh(true).await.unwrap_err();

    assert!(matches!(err, SyncError::MalformedDirectory { .. }));
    assert!(err.aborts_cycle());
    assert_eq!(s.services.sync.current(), Some(before));
}

#[tokio::test]
async fn origin_failure_keeps_previous_list() {
    let s = setup();
    let before = s.services.sync.refresh(false).await.unwrap();

    s.sheets.fail_with(Some(OriginError::transport(DIRECTORY, "connection reset")));
    s.clock.advance(Duration::from_secs(2));
    let err = s.services.sync.refresh(true).await.unwrap_err();

    assert!(matches!(err, SyncError::Content(_)));
    assert_eq!(s.services.sync.current(), Some(before));
}

#[tokio::test(start_paused = true)]
async fn directory_5xx_is_retried_once() {
    let s = setup();
    s.sheets.fail_with(Some(OriginError::ServerError {
        status: 503,
        url: DIRECTORY.to_string(),
    }));

    let err = s.services.sync.refresh(false).await.unwrap_err();

    assert!(matches!(err, SyncError::Content(ref e) if e.is_server_error()));
    assert_eq!(s.sheets.value_calls(), 2);
}

/// Backend that parks the first directory read until released
#[derive(Debug)]
struct ParkedSheets {
    inner: Arc<FakeSheets>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SheetsBackend for ParkedSheets {
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, OriginError> {
        self.inner.sheet_titles(spreadsheet_id).await
    }

    async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, OriginError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.values(spreadsheet_id, range).await
    }
}

#[tokio::test]
async fn scheduled_tick_is_skipped_during_manual_refresh() {
    let inner = FakeSheets::new();
    inner.set_tab(DIRECTORY, "Tasks", directory_grid(&rows()));
    let parked = Arc::new(ParkedSheets {
        inner,
        entered: Notify::new(),
        release: Notify::new(),
    });
    let services = SyncServices::build(
        &config(),
        ScriptedHttp::new(),
        parked.clone(),
        Arc::new(MemoryStateStore::new()),
        Arc::new(ManualClock::default()),
    );
    let sync = services.sync;

    let (manual, scheduled) = tokio::join!(sync.refresh(false), async {
        parked.entered.notified().await;
        let outcome = sync.refresh_scheduled().await;
        parked.release.notify_one();
        outcome
    });

    assert!(scheduled.is_none());
    assert_eq!(manual.unwrap().tasks.len(), 2);
}

fn detector_over(sheets: Arc<FakeSheets>, resolver: ContentResolver, clock: Arc<ManualClock>) -> ChangeDetector {
    ChangeDetector::new(
        DirectoryFetcher::new(
            sheets,
            ResponseCache::with_clock(CacheConfig::default(), clock),
            config().directory,
        ),
        resolver,
        ContentHashStore::new(),
    )
}

#[tokio::test]
async fn directory_change_is_seen_through_a_fresh_cache() {
    let s = setup();
    let known = s.services.sync.refresh(false).await.unwrap().records();
    let clock = Arc::new(ManualClock::default());
    let detector = detector_over(s.sheets.clone(), s.services.resolver.clone(), clock.clone());
    assert!(!detector.has_directory_changed(&known).await.unwrap());

    let edited = vec![
        RowFixture::new(5, "Ep 5").source("https://cdn.example.com/ep5-final.txt"),
        RowFixture::new(6, "Ep 6").source("https://cdn.example.com/ep6.txt"),
    ];
    s.sheets.set_tab(DIRECTORY, "Tasks", directory_grid(&edited));

    // inside the pacing window the stored grid is compared again
    assert!(!detector.has_directory_changed(&known).await.unwrap());
    clock.advance(Duration::from_secs(2));
    assert!(detector.has_directory_changed(&known).await.unwrap());
}

#[tokio::test]
async fn directory_checks_at_one_instant_hit_origin_once() {
    let s = setup();
    let known = s.services.sync.refresh(false).await.unwrap().records();
    let detector = detector_over(
        s.sheets.clone(),
        s.services.resolver.clone(),
        Arc::new(ManualClock::default()),
    );
    let before = s.sheets.value_calls();

    for _ in 0..5 {
        assert!(!detector.has_directory_changed(&known).await.unwrap());
    }

    assert_eq!(s.sheets.value_calls() - before, 1);
}

#[tokio::test]
async fn unforced_refresh_sees_status_edit_inside_cache_ttl() {
    let s = setup();
    s.services.sync.refresh(false).await.unwrap();

    let edited = vec![
        RowFixture::new(5, "Ep 5").source("https://cdn.example.com/ep5.txt"),
        RowFixture::new(6, "Ep 6").source("https://cdn.example.com/ep6.txt").status("완료"),
    ];
    s.sheets.set_tab(DIRECTORY, "Tasks", directory_grid(&edited));
    s.clock.advance(Duration::from_secs(2));

    let list = s.services.sync.refresh(false).await.unwrap();

    assert!(list.merged);
    assert_eq!(list.summary.unchanged, 2);
    let six = list.get(TaskId(6)).unwrap();
    assert_eq!(six.record.status, "완료");
    assert_eq!(six.status, EffectiveStatus::Complete);
}

#[tokio::test]
async fn protection_holds_across_service_instances() {
    let s = setup();
    s.services.sync.refresh(false).await.unwrap();
    save_submission(s.state.as_ref(), TaskId(5), &SubmissionRecord::default()).unwrap();

    let renamed = vec![
        RowFixture::new(5, "Ep 5 renamed").source("https://cdn.example.com/ep5.txt"),
        RowFixture::new(6, "Ep 6 renamed").source("https://cdn.example.com/ep6.txt"),
    ];
    s.sheets.set_tab(DIRECTORY, "Tasks", directory_grid(&renamed));

    let next_run = SyncServices::build(
        &config(),
        ScriptedHttp::new(),
        s.sheets.clone(),
        s.state.clone(),
        Arc::new(ManualClock::default()),
    );
    assert_eq!(next_run.sync.current(), None);
    let list = next_run.sync.refresh(true).await.unwrap();

    assert_eq!(list.summary.added, 0);
    assert_eq!(list.summary.protected, 1);
    assert_eq!(list.summary.updated, 1);
    assert_eq!(list.get(TaskId(5)).unwrap().record.title, "Ep 5");
    assert_eq!(list.get(TaskId(6)).unwrap().record.title, "Ep 6 renamed");
}
