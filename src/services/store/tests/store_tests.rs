use crate::services::assets::{RandomSource, Tier};
use crate::services::config::{PinKind, StoreConfig, UrlMode};
use crate::services::store::{NyaFileStore, PinnedValue};
use crate::test_utils::{build_pack, init_logger};
use crate::types::AssetError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Returns scripted indices, then 0 forever.
struct ScriptedRandom {
    picks: Mutex<VecDeque<usize>>,
}

impl ScriptedRandom {
    fn new(picks: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            picks: Mutex::new(picks.iter().copied().collect()),
        })
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&self, _len: usize) -> usize {
        self.picks.lock().unwrap().pop_front().unwrap_or(0)
    }
}

/// Parks the first pick after `arm` until the release channel fires.
struct GatedRandom {
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedRandom {
    fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Self {
            armed: AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (gate, entered_rx, release_tx)
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl RandomSource for GatedRandom {
    fn pick(&self, _len: usize) -> usize {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
        }
        0
    }
}

fn object_url_config() -> StoreConfig {
    StoreConfig {
        url_mode: UrlMode::ObjectUrl,
        ..StoreConfig::default()
    }
}

fn default_pack() -> Vec<u8> {
    build_pack(&[
        ("spinner/1.png", b"spin-1"),
        ("spinner/2.gif", b"spin-2"),
        ("title.png", b"title-default"),
        ("logo.png", b"logo-default"),
        ("config.json", br#"{"a":1}"#),
        ("broken.json", b"not json"),
        ("binary.txt", &[0xC3, 0x28]),
    ])
}

#[tokio::test]
async fn test_scripted_random_selects_exact_candidate() {
    init_logger();
    let store =
        NyaFileStore::with_random_source(StoreConfig::default(), ScriptedRandom::new(&[1, 0, 1]));
    store.load(default_pack(), true).await.unwrap();

    assert_eq!(store.lookup("spinner").unwrap().path(), "spinner/2.gif");
    assert_eq!(store.lookup("spinner").unwrap().path(), "spinner/1.png");
    assert_eq!(store.lookup("spinner").unwrap().path(), "spinner/2.gif");
}

#[tokio::test]
async fn test_out_of_range_pick_is_clamped() {
    let store =
        NyaFileStore::with_random_source(StoreConfig::default(), ScriptedRandom::new(&[99]));
    store.load(default_pack(), true).await.unwrap();

    assert_eq!(store.lookup("spinner").unwrap().path(), "spinner/2.gif");
}

#[tokio::test]
async fn test_representations() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    assert_eq!(store.get_type("title").unwrap(), "image/png");
    assert_eq!(&*store.get_text("config").await.unwrap(), r#"{"a":1}"#);
    assert_eq!(
        store.get_json("config").await.unwrap(),
        serde_json::json!({ "a": 1 })
    );

    let blob = store.get_blob("logo").await.unwrap();
    assert_eq!(blob.mime, "image/png");
    assert_eq!(&*blob.data, b"logo-default");

    let url = store.get_url("logo").await.unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_text_and_json_errors_propagate() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    assert!(matches!(
        store.get_json("broken").await,
        Err(AssetError::Parse(_))
    ));
    assert!(matches!(
        store.get_text("binary").await,
        Err(AssetError::TextDecode(_))
    ));
    assert!(matches!(
        store.get_json("binary").await,
        Err(AssetError::TextDecode(_))
    ));
}

#[tokio::test]
async fn test_missing_key_fails_everywhere() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();
    let missing = AssetError::NotFound("nope".to_string());

    assert_eq!(store.lookup("nope").unwrap_err(), missing);
    assert_eq!(store.get_type("nope").unwrap_err(), missing);
    assert_eq!(store.get_blob("nope").await.unwrap_err(), missing);
    assert_eq!(store.get_text("nope").await.unwrap_err(), missing);
    assert_eq!(store.get_json("nope").await.unwrap_err(), missing);
    assert_eq!(store.get_url("nope").await.unwrap_err(), missing);
}

#[tokio::test]
async fn test_empty_store_has_nothing() {
    let store = NyaFileStore::default();
    assert!(store.list_keys().is_empty());
    assert!(matches!(store.lookup("title"), Err(AssetError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_load_keeps_last_good_state() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();
    store
        .load(build_pack(&[("title.png", b"title-skin")]), false)
        .await
        .unwrap();

    let result = store.load(b"garbage".to_vec(), false).await;
    assert!(matches!(result, Err(AssetError::Decode(_))));
    let result = store.load(Vec::new(), true).await;
    assert!(matches!(result, Err(AssetError::Decode(_))));

    assert_eq!(&*store.get_blob("title").await.unwrap().data, b"title-skin");
    assert_eq!(&*store.get_blob("logo").await.unwrap().data, b"logo-default");
}

#[tokio::test]
async fn test_load_summary_counts() {
    let store = NyaFileStore::default();
    let summary = store.load(default_pack(), true).await.unwrap();

    assert_eq!(summary.tier, Tier::Default);
    assert_eq!(summary.entries, 7);
    assert_eq!(summary.keys, 6);
    assert_eq!(summary.released_handles, 0);
    assert_eq!(summary.pinned, 0);
    assert_eq!(summary.refresh_error, None);
}

#[tokio::test]
async fn test_list_files_is_union_of_paths() {
    let store = NyaFileStore::default();
    store
        .load(build_pack(&[("b.png", b"1"), ("a.png", b"2")]), true)
        .await
        .unwrap();
    store
        .load(build_pack(&[("a.png", b"3"), ("c/1.gif", b"4")]), false)
        .await
        .unwrap();

    assert_eq!(store.list_files(), vec!["a.png", "b.png", "c/1.gif"]);
    assert_eq!(store.list_keys(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_pinned_value_is_stable_across_rerolls() {
    let store = NyaFileStore::with_random_source(
        StoreConfig::default(),
        ScriptedRandom::new(&[0, 1, 1, 1]),
    );
    store.load(default_pack(), true).await.unwrap();

    store.pin_as("spinner", PinKind::Text);
    store.await_all().await.unwrap();

    // First pick (index 0) is frozen; later lookups roll index 1
    assert_eq!(store.get_pinned("spinner").unwrap().as_str(), "spin-1");
    assert_eq!(store.lookup("spinner").unwrap().path(), "spinner/2.gif");
    assert_eq!(store.get_pinned("spinner").unwrap().as_str(), "spin-1");
}

#[tokio::test]
async fn test_get_pinned_before_pin_is_not_cached() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    assert_eq!(
        store.get_pinned("title"),
        Err(AssetError::NotCached("title".to_string()))
    );
    assert!(matches!(
        store.get_pinned_json("config"),
        Err(AssetError::NotCached(_))
    ));
}

#[tokio::test]
async fn test_pinned_json() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    store.pin_as("config", PinKind::Text);
    store.pin_as("broken", PinKind::Text);
    let _ = store.await_all().await;

    assert_eq!(
        store.get_pinned_json("config").unwrap(),
        serde_json::json!({ "a": 1 })
    );
    assert!(matches!(
        store.get_pinned_json("broken"),
        Err(AssetError::Parse(_))
    ));
}

#[tokio::test]
async fn test_pin_of_missing_key_reports_not_found() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    store.pin("ghost");
    store.pin("title");
    assert_eq!(
        store.await_all().await,
        Err(AssetError::NotFound("ghost".to_string()))
    );
    assert!(matches!(store.get_pinned("title"), Ok(PinnedValue::Url(_))));
}

#[tokio::test]
async fn test_default_pin_kind_comes_from_config() {
    let config = StoreConfig {
        default_pin_kind: PinKind::Text,
        ..StoreConfig::default()
    };
    let store = NyaFileStore::new(config);
    store.load(default_pack(), true).await.unwrap();

    store.pin("config");
    store.await_all().await.unwrap();
    assert_eq!(
        store.get_pinned("config").unwrap(),
        PinnedValue::Text(Arc::from(r#"{"a":1}"#))
    );
}

#[tokio::test]
async fn test_cached_accessors_pin_on_first_use() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();

    let text = store.get_text_cached("config").await.unwrap();
    assert_eq!(&*text, r#"{"a":1}"#);
    assert_eq!(store.pinned_keys(), vec![("config".to_string(), PinKind::Text)]);

    // A URL request for a text pin does not clobber the pin
    let url = store.get_url_cached("config").await.unwrap();
    assert!(url.starts_with("data:application/json;base64,"));
    assert_eq!(store.pinned_keys(), vec![("config".to_string(), PinKind::Text)]);

    assert!(store.unpin("config"));
    assert!(store.pinned_keys().is_empty());
}

#[tokio::test]
async fn test_load_repins_against_new_tier() {
    let store = NyaFileStore::default();
    store.load(default_pack(), true).await.unwrap();
    store.pin_as("title", PinKind::Text);
    store.await_all().await.unwrap();
    assert_eq!(store.get_pinned("title").unwrap().as_str(), "title-default");

    let summary = store
        .load(build_pack(&[("title.png", b"title-skin")]), false)
        .await
        .unwrap();

    assert_eq!(summary.pinned, 1);
    assert_eq!(summary.refresh_error, None);
    assert_eq!(store.get_pinned("title").unwrap().as_str(), "title-skin");
}

#[tokio::test]
async fn test_refresh_error_is_reported_in_summary() {
    let store = NyaFileStore::default();
    store
        .load(build_pack(&[("only_skin.json", b"{}")]), false)
        .await
        .unwrap();
    store.pin_as("only_skin", PinKind::Text);
    store.await_all().await.unwrap();

    let summary = store
        .load(build_pack(&[("other.png", b"x")]), false)
        .await
        .unwrap();

    assert_eq!(
        summary.refresh_error,
        Some(AssetError::NotFound("only_skin".to_string()))
    );
    assert_eq!(store.list_keys(), vec!["other"]);
}

#[tokio::test]
async fn test_object_url_reload_releases_old_handles() {
    init_logger();
    let store = NyaFileStore::new(object_url_config());
    store.load(default_pack(), true).await.unwrap();
    store
        .load(build_pack(&[("title.png", b"skin-1")]), false)
        .await
        .unwrap();

    let old_url = store.get_url("title").await.unwrap();
    assert!(old_url.starts_with("blob:nyafile/"));
    assert_eq!(store.get_url("title").await.unwrap(), old_url, "one handle per record");
    let default_url = store.get_url("logo").await.unwrap();
    assert_eq!(store.object_urls().live_count(), 2);

    let summary = store
        .load(build_pack(&[("title.png", b"skin-2")]), false)
        .await
        .unwrap();

    assert_eq!(summary.released_handles, 1);
    assert!(store.object_urls().resolve(&old_url).is_none());
    assert!(store.object_urls().resolve(&default_url).is_some());

    let new_url = store.get_url("title").await.unwrap();
    assert_ne!(new_url, old_url);
    let blob = store.object_urls().resolve(&new_url).unwrap();
    assert_eq!(&*blob.data, b"skin-2");
    assert_eq!(store.object_urls().live_count(), 2);
}

#[tokio::test]
async fn test_orphaned_record_derivation_completes_harmlessly() {
    let store = NyaFileStore::new(object_url_config());
    store
        .load(build_pack(&[("title.png", b"old")]), false)
        .await
        .unwrap();
    let orphan = store.lookup("title").unwrap();

    store
        .load(build_pack(&[("title.png", b"new")]), false)
        .await
        .unwrap();

    // Released record refuses a new handle; the store falls back to a data URL
    assert!(orphan.object_url(store.object_urls()).is_none());
    assert_eq!(&*orphan.text().unwrap(), "old");
    assert!(orphan.data_url().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_dispose_releases_everything() {
    let store = NyaFileStore::new(object_url_config());
    store.load(default_pack(), true).await.unwrap();
    store
        .load(build_pack(&[("title.png", b"skin")]), false)
        .await
        .unwrap();
    store.get_url("title").await.unwrap();
    store.get_url("logo").await.unwrap();
    store.pin("spinner");
    store.await_all().await.unwrap();
    assert_eq!(store.object_urls().live_count(), 3);

    assert_eq!(store.dispose(), 3);
    assert_eq!(store.object_urls().live_count(), 0);
    assert!(store.list_keys().is_empty());
    assert!(store.pinned_keys().is_empty());
    assert_eq!(store.dispose(), 0, "nothing left to release");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_of_same_tier_serialize() {
    let store = Arc::new(NyaFileStore::default());

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let pack = build_pack(&[("title.png", &[i]), ("marker.json", &[b'0' + i])]);
            store.load(pack, false).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whatever won, the table is one whole pack, never a mix of two
    let title = store.get_blob("title").await.unwrap();
    let marker = store.get_blob("marker").await.unwrap();
    assert_eq!(marker.data[0], b'0' + title.data[0]);
    assert!(!store.is_loading(Tier::Skin));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_skin_repin_cannot_overwrite_newer_default_pin() {
    init_logger();
    let (gate, entered, release) = GatedRandom::new();
    let store = Arc::new(NyaFileStore::with_random_source(
        StoreConfig::default(),
        gate.clone(),
    ));
    store
        .load(build_pack(&[("config.txt", b"old-default")]), true)
        .await
        .unwrap();
    store.pin_as("config", PinKind::Text);
    store.await_all().await.unwrap();

    // The skin load's repin stops inside its lookup of the old default record
    gate.arm();
    let skin = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .load(build_pack(&[("title.png", b"skin")]), false)
                .await
        })
    };
    tokio::task::spawn_blocking(move || entered.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(store.is_loading(Tier::Skin));
    assert!(!store.is_loading(Tier::Default));

    let default = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .load(build_pack(&[("config.txt", b"new-default")]), true)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.send(()).unwrap();

    skin.await.unwrap().unwrap();
    default.await.unwrap().unwrap();
    store.await_all().await.unwrap();

    assert!(!store.is_loading(Tier::Skin));
    assert_eq!(&*store.get_text("config").await.unwrap(), "new-default");
    assert_eq!(
        store.get_pinned("config").unwrap(),
        PinnedValue::Text("new-default".into())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pin_racing_a_load_ends_on_the_new_table() {
    let (gate, entered, release) = GatedRandom::new();
    let store = Arc::new(NyaFileStore::with_random_source(
        StoreConfig::default(),
        gate.clone(),
    ));
    store
        .load(build_pack(&[("config.txt", b"old-default")]), true)
        .await
        .unwrap();

    gate.arm();
    let pin = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            store.pin_as("config", PinKind::Text);
        })
    };
    tokio::task::spawn_blocking(move || entered.recv())
        .await
        .unwrap()
        .unwrap();

    let default = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .load(build_pack(&[("config.txt", b"new-default")]), true)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.send(()).unwrap();

    pin.await.unwrap();
    default.await.unwrap().unwrap();
    store.await_all().await.unwrap();

    assert_eq!(
        store.get_pinned("config").unwrap(),
        PinnedValue::Text("new-default".into())
    );
}
