use async_trait::async_trait;
use relevance_annotator::error::ConfigError;
use relevance_annotator::models::item::{REASON_INCOMPLETE, REASON_INSUFFICIENT};
use relevance_annotator::{
    AppError, App, ChatBackend, CheckpointStore, Config, Item, ItemId, LlmError, OutputRow,
    ScoreResult, Verdict,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 按标题打分的模拟后端：标题 `T07` 得 7 % 5 + 1 分
struct TitleScoringBackend {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    titles: Mutex<Vec<String>>,
    delay: Duration,
}

impl TitleScoringBackend {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            titles: Mutex::new(Vec::new()),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen_titles(&self) -> BTreeSet<String> {
        self.titles.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl ChatBackend for TitleScoringBackend {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let titles: Vec<String> = user
            .lines()
            .filter_map(|line| line.strip_prefix("Title: "))
            .map(str::to_string)
            .collect();

        let elements: Vec<serde_json::Value> = titles
            .iter()
            .enumerate()
            .map(|(position, title)| {
                serde_json::json!({
                    "id": position + 1,
                    "score": score_for(title),
                    "reason": format!("scored {}", title),
                })
            })
            .collect();

        self.titles.lock().unwrap().extend(titles);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(format!("```json\n{}\n```", serde_json::Value::Array(elements)))
    }

    fn model_name(&self) -> &str {
        "title-scoring"
    }
}

/// 永远返回非 JSON 的后端
struct GarbageBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatBackend for GarbageBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Sorry, I cannot rate these papers.".to_string())
    }

    fn model_name(&self) -> &str {
        "garbage"
    }
}

fn score_for(title: &str) -> i64 {
    let n: i64 = title.trim_start_matches('T').parse().unwrap_or(0);
    n % 5 + 1
}

fn items(n: usize) -> Vec<Item> {
    (0..n).map(|i| Item::new(i, format!("T{:02}", i))).collect()
}

fn config_in(dir: &Path) -> Config {
    Config {
        batch_size: 5,
        max_workers: 3,
        base_delay: Duration::ZERO,
        content_dir: dir.join("abstracts"),
        output_path: dir.join("analysis.json"),
        warn_file: dir.join("warn.txt"),
        ..Default::default()
    }
}

fn read_rows(path: &Path) -> Vec<OutputRow> {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn row<'a>(rows: &'a [OutputRow], id: usize) -> &'a OutputRow {
    let id = ItemId::from(id);
    rows.iter().find(|r| r.item_id == id).unwrap()
}

#[tokio::test]
async fn resumes_from_checkpoint_and_only_requests_pending_items() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    // 模拟上一次运行在第一个批次落盘后中断
    let store = CheckpointStore::open(config.checkpoint_path(), true).await;
    let earlier: Vec<ScoreResult> = (0..5usize)
        .map(|i| ScoreResult::new(ItemId::from(i), Verdict::new(4, "from checkpoint")))
        .collect();
    store.merge_and_save(&earlier).await.unwrap();

    let backend = TitleScoringBackend::new(Duration::ZERO);
    let app = App::with_backend(config.clone(), backend.clone()).unwrap();
    let summary = app.run_items(items(12)).await.unwrap();

    let expected: BTreeSet<String> = (5..12).map(|i| format!("T{:02}", i)).collect();
    assert_eq!(backend.seen_titles(), expected);
    assert_eq!(backend.calls(), 2);
    assert_eq!(summary.already_resolved, 5);
    assert_eq!(summary.dispatched_batches, 2);
    assert_eq!(summary.succeeded_batches, 2);

    let rows = read_rows(&config.output_path);
    assert_eq!(rows.len(), 12);
    for i in 0..5 {
        assert_eq!(row(&rows, i).reason, "from checkpoint");
        assert_eq!(row(&rows, i).score, 4);
    }
    assert_eq!(row(&rows, 7).score, 3);
    assert!(rows.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn second_run_makes_no_calls_and_rewrites_same_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let backend = TitleScoringBackend::new(Duration::ZERO);
    let app = App::with_backend(config.clone(), backend.clone()).unwrap();
    app.run_items(items(11)).await.unwrap();
    assert_eq!(backend.calls(), 3);
    let first = std::fs::read_to_string(&config.output_path).unwrap();

    let again = TitleScoringBackend::new(Duration::ZERO);
    let app = App::with_backend(config.clone(), again.clone()).unwrap();
    let summary = app.run_items(items(11)).await.unwrap();

    assert_eq!(again.calls(), 0);
    assert_eq!(summary.dispatched_batches, 0);
    assert_eq!(summary.already_resolved, 11);
    assert_eq!(std::fs::read_to_string(&config.output_path).unwrap(), first);
}

#[tokio::test]
async fn prior_output_alone_counts_as_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let backend = TitleScoringBackend::new(Duration::ZERO);
    App::with_backend(config.clone(), backend)
        .unwrap()
        .run_items(items(6))
        .await
        .unwrap();
    std::fs::remove_file(config.checkpoint_path()).unwrap();

    let again = TitleScoringBackend::new(Duration::ZERO);
    App::with_backend(config.clone(), again.clone())
        .unwrap()
        .run_items(items(8))
        .await
        .unwrap();

    let expected: BTreeSet<String> = ["T06", "T07"].iter().map(|s| s.to_string()).collect();
    assert_eq!(again.seen_titles(), expected);
    assert_eq!(read_rows(&config.output_path).len(), 8);
}

#[tokio::test]
async fn resume_disabled_starts_from_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());

    let backend = TitleScoringBackend::new(Duration::ZERO);
    App::with_backend(config.clone(), backend)
        .unwrap()
        .run_items(items(5))
        .await
        .unwrap();

    config.resume = false;
    let again = TitleScoringBackend::new(Duration::ZERO);
    let summary = App::with_backend(config, again.clone())
        .unwrap()
        .run_items(items(5))
        .await
        .unwrap();

    assert_eq!(again.calls(), 1);
    assert_eq!(summary.already_resolved, 0);
}

#[tokio::test]
async fn malformed_responses_still_produce_a_complete_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let backend = Arc::new(GarbageBackend {
        calls: AtomicUsize::new(0),
    });
    let app = App::with_backend(config.clone(), backend.clone()).unwrap();
    let summary = app.run_items(items(7)).await.unwrap();

    // 格式错误不重试：每个批次只调用一次
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.degraded_batches, 2);

    let rows = read_rows(&config.output_path);
    assert_eq!(rows.len(), 7);
    assert!(rows
        .iter()
        .all(|r| r.score == 0 && r.reason == REASON_INSUFFICIENT));
    assert!(rows.iter().all(|r| r.reason != REASON_INCOMPLETE));

    // 原始顺序保持不变（全部同分）
    let order: Vec<String> = rows.iter().map(|r| r.item_id.to_string()).collect();
    assert_eq!(order, (0..7).map(|i| i.to_string()).collect::<Vec<_>>());

    let warn = std::fs::read_to_string(&config.warn_file).unwrap();
    assert_eq!(warn.lines().count(), 7);
}

#[tokio::test]
async fn worker_pool_bounds_concurrent_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        batch_size: 1,
        max_workers: 2,
        ..config_in(dir.path())
    };

    let backend = TitleScoringBackend::new(Duration::from_millis(20));
    let summary = App::with_backend(config, backend.clone())
        .unwrap()
        .run_items(items(6))
        .await
        .unwrap();

    assert_eq!(summary.succeeded_batches, 6);
    // 同时在途的调用数恰好等于工作单元数：既有上限，也确实并行
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn run_loads_items_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let items_path = dir.path().join("items.json");
    std::fs::write(
        &items_path,
        r#"[{"id": 1, "title": "T01"}, {"id": "2", "title": "T02"}]"#,
    )
    .unwrap();
    let config = Config {
        items_path,
        ..config_in(dir.path())
    };

    let backend = TitleScoringBackend::new(Duration::ZERO);
    let summary = App::with_backend(config.clone(), backend)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total_items, 2);
    let rows = read_rows(&config.output_path);
    assert_eq!(rows[0].item_id, ItemId::from("2"));
    assert_eq!(rows[0].score, 3);
}

#[test]
fn missing_credentials_fail_before_any_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let err = App::initialize(config).err().unwrap();
    assert!(matches!(
        err,
        AppError::Config(ConfigError::MissingCredentials { .. })
    ));
}

#[tokio::test]
async fn unwritable_checkpoint_is_counted_but_output_is_complete() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = Config {
        checkpoint_path: Some(blocker.join("run.ckpt.json")),
        ..config_in(dir.path())
    };

    let backend = TitleScoringBackend::new(Duration::ZERO);
    let summary = App::with_backend(config.clone(), backend)
        .unwrap()
        .run_items(items(7))
        .await
        .unwrap();

    assert_eq!(summary.dispatched_batches, 2);
    assert_eq!(summary.unpersisted_batches, 2);
    let rows = read_rows(&config.output_path);
    assert_eq!(rows.len(), 7);
    assert!(rows.iter().all(|r| r.reason.starts_with("scored")));
}
