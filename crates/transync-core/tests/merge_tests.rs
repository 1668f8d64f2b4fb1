//! Merge/protection engine against scripted origins

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use transync_content::{CacheConfig, ContentResolver, ManualClock, ResolverConfig, ResponseCache};
use transync_core::state::{save_draft, save_marker, save_submission, submission_key};
use transync_core::{
    ChangeDetector, ContentHashStore, DirectoryConfig, DirectoryFetcher, DraftPrompt, MergeDecision,
    MergeEngine, MergeSummary, MemoryStateStore, ProtectionState, RefKind, StateError, StateStore,
    SubmissionRecord, SyncError, TaskContentLoader, TaskId, TaskRecord,
};
use transync_test_utils::{FakeSheets, ScriptedHttp};

const EP1: &str = "https://cdn.example.com/ep1.txt";
const EP2: &str = "https://cdn.example.com/ep2.txt";
const EP3: &str = "https://cdn.example.com/ep3.txt";

const EP1_TEXT: &str = "1화 원문. 민수가 처음으로 마을에 도착한다.";
const EP2_TEXT: &str = "2화 원문. 민수가 오래된 지도를 발견한다.";
const EP2_EDITED: &str = "2화 원문 (수정). 민수가 오래된 지도를 잃어버린다.";
const EP3_TEXT: &str = "3화 원문. 마을 사람들이 축제를 준비한다.";

const SETTINGS: &str = "https://cdn.example.com/settings.txt";
const SETTINGS_TEXT: &str = "세계관 설정: 민수는 열두 살, 마을은 바닷가에 있다.";
const SETTINGS_EDITED: &str = "세계관 설정 (개정): 민수는 열세 살, 마을은 산골에 있다.";

struct Harness {
    http: Arc<ScriptedHttp>,
    clock: Arc<ManualClock>,
    state: Arc<MemoryStateStore>,
    engine: MergeEngine,
    loader: TaskContentLoader,
    hashes: ContentHashStore,
}

fn harness() -> Harness {
    let http = ScriptedHttp::new();
    let clock = Arc::new(ManualClock::default());
    let state = Arc::new(MemoryStateStore::new());

    let resolver = ContentResolver::new(
        http.clone(),
        ResponseCache::with_clock(CacheConfig::default(), clock.clone()),
        ResolverConfig::default(),
    );
    let directory = DirectoryFetcher::new(
        FakeSheets::new(),
        ResponseCache::with_clock(CacheConfig::default(), clock.clone()),
        DirectoryConfig::new("directory"),
    );
    let hashes = ContentHashStore::with_clock(clock.clone());
    let detector = ChangeDetector::new(directory, resolver.clone(), hashes.clone());
    let engine = MergeEngine::new(detector, state.clone(), 4);
    let loader = TaskContentLoader::new(resolver, hashes.clone());

    Harness {
        http,
        clock,
        state,
        engine,
        loader,
        hashes,
    }
}

fn engine_over(state: Arc<dyn StateStore>) -> MergeEngine {
    let resolver = ContentResolver::new(
        ScriptedHttp::new(),
        ResponseCache::new(CacheConfig::default()),
        ResolverConfig::default(),
    );
    let directory = DirectoryFetcher::new(
        FakeSheets::new(),
        ResponseCache::new(CacheConfig::default()),
        DirectoryConfig::new("directory"),
    );
    let detector = ChangeDetector::new(directory, resolver, ContentHashStore::new());
    MergeEngine::new(detector, state, 4)
}

fn task(id: u64, title: &str, source: &str) -> TaskRecord {
    TaskRecord::new(TaskId(id), title).with_ref(RefKind::Source, source)
}

fn three_tasks() -> Vec<TaskRecord> {
    vec![task(1, "Ep 1", EP1), task(2, "Ep 2", EP2), task(3, "Ep 3", EP3)]
}

#[tokio::test]
async fn content_hash_change_updates_only_that_task() {
    let h = harness();
    h.http.respond_text(EP1, EP1_TEXT);
    h.http.respond_text(EP2, EP2_TEXT).respond_text(EP2, EP2_EDITED);
    h.http.respond_text(EP3, EP3_TEXT);

    let existing = three_tasks();
    for t in &existing {
        h.loader.load(t).await;
    }
    assert_eq!(h.hashes.len(), 3);

    // past the origin pacing window, inside the cache TTL
    h.clock.advance(Duration::from_secs(2));
    let outcome = h.engine.merge(&existing, three_tasks(), false).await.unwrap();

    assert_eq!(
        outcome.summary,
        MergeSummary {
            updated: 1,
            unchanged: 2,
            protected: 0,
            ..MergeSummary::default()
        }
    );
    assert!(outcome.decisions.contains(&(TaskId(2), MergeDecision::Updated)));
    assert!(h.hashes.get(TaskId(2), RefKind::Source).is_none());
    assert!(h.hashes.get(TaskId(1), RefKind::Source).is_some());
}

#[tokio::test]
async fn no_recorded_hash_means_unchanged() {
    let h = harness();
    let existing = three_tasks();

    let outcome = h.engine.merge(&existing, three_tasks(), false).await.unwrap();

    assert_eq!(outcome.summary.unchanged, 3);
    assert_eq!(h.http.call_count(), 0);
}

#[tokio::test]
async fn edited_reference_is_detected_without_content() {
    let h = harness();
    let existing = three_tasks();
    let mut fresh = three_tasks();
    fresh[2].refs.source = "https://cdn.example.com/ep3-v2.txt".to_string();

    let outcome = h.engine.merge(&existing, fresh, false).await.unwrap();

    assert_eq!(outcome.summary.updated, 1);
    assert_eq!(outcome.tasks[2].refs.source, "https://cdn.example.com/ep3-v2.txt");
    assert_eq!(h.http.call_count(), 0);
}

#[tokio::test]
async fn submitted_task_keeps_original_title_under_force() {
    let h = harness();
    save_submission(h.state.as_ref(), TaskId(5), &SubmissionRecord::default()).unwrap();

    let existing = vec![task(5, "Original", EP1), task(6, "Six", EP2)];
    let fresh = vec![task(5, "Renamed", EP1), task(6, "Six renamed", EP2)];
    let outcome = h.engine.merge(&existing, fresh, true).await.unwrap();

    assert_eq!(outcome.tasks[0].title, "Original");
    assert_eq!(outcome.tasks[1].title, "Six renamed");
    assert!(outcome
        .decisions
        .contains(&(TaskId(5), MergeDecision::Protected(ProtectionState::Submitted))));
}

#[tokio::test]
async fn in_progress_is_kept_unless_forced() {
    let h = harness();
    save_marker(h.state.as_ref(), TaskId(1), "진행중").unwrap();
    let existing = vec![task(1, "Before", EP1)];

    let kept = h.engine.merge(&existing, vec![task(1, "After", EP1)], false).await.unwrap();
    assert_eq!(kept.tasks[0].title, "Before");
    assert_eq!(kept.summary.protected, 1);

    let forced = h.engine.merge(&existing, vec![task(1, "After", EP1)], true).await.unwrap();
    assert_eq!(forced.tasks[0].title, "After");
    assert_eq!(forced.summary.updated, 1);
}

#[tokio::test]
async fn local_only_tasks_survive_when_protected() {
    let h = harness();
    save_draft(
        h.state.as_ref(),
        TaskId(9),
        &DraftPrompt {
            custom_prompt: "keep the pun".into(),
            ..DraftPrompt::default()
        },
    )
    .unwrap();

    let existing = vec![task(1, "One", EP1), task(8, "Eight", EP2), task(9, "Nine", EP3)];
    let fresh = vec![task(1, "One", EP1), task(10, "Ten", "")];
    let outcome = h.engine.merge(&existing, fresh, false).await.unwrap();

    let ids: Vec<_> = outcome.tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TaskId(1), TaskId(10), TaskId(9)]);
    assert_eq!(outcome.summary.added, 1);
    assert_eq!(outcome.summary.removed, 1);
    assert_eq!(outcome.summary.protected, 1);
}

#[tokio::test]
async fn merge_of_own_output_is_a_no_op() {
    let h = harness();
    h.http.respond_text(EP1, EP1_TEXT);
    h.http.respond_text(EP2, EP2_TEXT);
    h.http.respond_text(EP3, EP3_TEXT);
    for t in &three_tasks() {
        h.loader.load(t).await;
    }

    let first = h.engine.merge(&[], three_tasks(), false).await.unwrap();
    h.clock.advance(Duration::from_secs(2));
    let second = h.engine.merge(&first.tasks, first.tasks.clone(), false).await.unwrap();

    assert_eq!(second.tasks, first.tasks);
    assert_eq!(second.summary.unchanged, 3);
    assert!(!second.summary.changed_anything());
}

#[tokio::test]
async fn shared_document_edit_updates_every_task() {
    let h = harness();
    h.http.with_latency(Duration::from_millis(30));
    h.http.respond_text(EP1, EP1_TEXT);
    h.http.respond_text(EP2, EP2_TEXT);
    h.http.respond_text(EP3, EP3_TEXT);
    h.http.respond_text(SETTINGS, SETTINGS_TEXT).respond_text(SETTINGS, SETTINGS_EDITED);

    let existing: Vec<TaskRecord> = three_tasks()
        .into_iter()
        .map(|t| t.with_ref(RefKind::Settings, SETTINGS))
        .collect();
    for t in &existing {
        h.loader.load(t).await;
    }
    assert_eq!(h.hashes.len(), 6);

    h.clock.advance(Duration::from_secs(2));
    let outcome = h.engine.merge(&existing, existing.clone(), false).await.unwrap();

    assert_eq!(outcome.summary.updated, 3);
    assert_eq!(h.http.calls_to(SETTINGS), 2);
}

#[tokio::test]
async fn shared_reference_within_a_task_loads_once() {
    let h = harness();
    h.http.with_latency(Duration::from_millis(30));
    h.http.respond_text(EP1, EP1_TEXT);
    h.http.respond_text(SETTINGS, SETTINGS_TEXT);

    let t = task(1, "Ep 1", EP1)
        .with_ref(RefKind::Settings, SETTINGS)
        .with_ref(RefKind::Context, SETTINGS);
    let content = h.loader.load(&t).await;

    assert!(content.unresolved.is_empty());
    assert_eq!(content.text(RefKind::Settings), SETTINGS_TEXT);
    assert_eq!(content.text(RefKind::Context), SETTINGS_TEXT);
    assert_eq!(h.http.calls_to(SETTINGS), 1);
}

#[tokio::test]
async fn backend_status_change_is_adopted_without_update() {
    let h = harness();
    let existing = vec![task(1, "Ep 1", EP1).with_status("대기")];
    let fresh = vec![task(1, "Ep 1", EP1)
        .with_status("완료")
        .with_ref(RefKind::GuidePrompt, "https://cdn.example.com/guide.txt")];

    let outcome = h.engine.merge(&existing, fresh.clone(), false).await.unwrap();

    assert_eq!(outcome.summary.unchanged, 1);
    assert_eq!(outcome.tasks, fresh);
    assert_eq!(h.http.call_count(), 0);
}

/// Store whose submission for task 5 appears after the first read
#[derive(Debug, Default)]
struct LateSubmission {
    reads: AtomicUsize,
}

impl StateStore for LateSubmission {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        if key != submission_key(TaskId(5)) {
            return Ok(None);
        }
        let seen = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok((seen > 0).then(|| "{}".to_string()))
    }

    fn set(&self, _key: &str, _value: String) -> Result<(), StateError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StateError> {
        Ok(())
    }
}

#[tokio::test]
async fn submission_saved_mid_merge_does_not_abort_it() {
    let state = Arc::new(LateSubmission::default());
    let engine = engine_over(state.clone());

    let outcome = engine
        .merge(&[task(5, "Original", EP1)], vec![task(5, "Renamed", EP1)], false)
        .await
        .unwrap();

    assert_eq!(outcome.tasks[0].title, "Renamed");
    assert_eq!(outcome.decisions, vec![(TaskId(5), MergeDecision::Updated)]);
    assert_eq!(state.reads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.protection_of(TaskId(5)), ProtectionState::Submitted);
}

#[test]
fn verify_protection_flags_altered_submission() {
    let h = harness();
    save_submission(h.state.as_ref(), TaskId(5), &SubmissionRecord::default()).unwrap();

    let existing = vec![task(5, "Original", EP1)];
    let altered = vec![task(5, "Altered", EP1)];
    assert!(matches!(
        h.engine.verify_protection(&existing, &altered),
        Err(SyncError::ProtectionViolation { task_id: TaskId(5) })
    ));
    assert!(h.engine.verify_protection(&existing, &existing).is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn submitted_tasks_never_change(
        fresh_title in "[A-Za-z0-9 ]{0,12}",
        fresh_source in "(https://cdn\\.example\\.com/[a-z]{1,6}\\.txt)?",
        fresh_phase in 1u8..=4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let h = harness();
        save_submission(h.state.as_ref(), TaskId(5), &SubmissionRecord::default()).unwrap();

        let existing = vec![task(5, "Original", EP1)];
        let mut fresh = task(5, &fresh_title, &fresh_source);
        fresh.step_order = fresh_phase;

        let outcome = runtime.block_on(h.engine.merge(&existing, vec![fresh], true)).unwrap();
        prop_assert_eq!(&outcome.tasks, &existing);
    }
}
