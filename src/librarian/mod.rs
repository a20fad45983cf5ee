//! The librarian service.
//!
//! [`Librarian`] ties the pieces together: it owns the live
//! [`IndexSnapshot`], serves resolve and compile requests against it, keeps
//! the bundle cache, and turns change events into cache invalidations and
//! index refreshes.
//!
//! # Concurrency
//!
//! - **Readers** take the snapshot lock only long enough to clone the
//!   `Arc<IndexSnapshot>`, then resolve and compile on the blocking pool
//!   against that immutable copy.
//! - **Refresh** builds a new snapshot on the blocking pool without holding
//!   the snapshot lock, then swaps the pointer under a short write lock.
//!   Refreshes are serialised by their own mutex; a failed build leaves the
//!   previous snapshot live.
//! - **Cache epoch**: every snapshot is published with its generation. A
//!   compile only touches the cache while the epoch still equals the
//!   generation of the snapshot it compiled against; refresh advances the
//!   epoch and clears the cache under the epoch's write lock, so no bundle
//!   from an older snapshot survives a refresh.
//! - **Refresh requests** are coalesced: any number of
//!   [`request_refresh`](Librarian::request_refresh) calls made before the
//!   worker wakes result in one rebuild.
//! - **Events** are processed one batch at a time, in arrival order.
//!
//! ```rust,no_run
//! use pagelib::config::LibrarianConfig;
//! use pagelib::content::FsContentTree;
//! use pagelib::core::AssetType;
//! use pagelib::librarian::Librarian;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tree = Arc::new(FsContentTree::new("./repository")?);
//! let librarian = Librarian::start(LibrarianConfig::default(), tree).await?;
//! let css = librarian.compile("/content/home", AssetType::Css, None).await?;
//! println!("{css}");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock, Weak};
use std::time::Instant;
use tokio::sync::{Mutex, Notify, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::config::LibrarianConfig;
use crate::content::ContentTree;
use crate::core::{AssetType, CompilationError, LibraryError, Result};
use crate::events::{BatchPlan, ChangeEvent, EventBatcher, EventClassifier, EventContext};
use crate::index::IndexSnapshot;
use crate::library::Library;
use crate::preprocessor::Preprocessor;
use crate::resolver::{DependencyGraph, GraphExport, Resolver};

/// Long-lived library service over one content tree.
pub struct Librarian {
    config: Arc<LibrarianConfig>,
    tree: Arc<dyn ContentTree>,
    preprocessor: Arc<dyn Preprocessor>,
    cache: Arc<CacheManager>,
    classifier: EventClassifier,

    snapshot: RwLock<Published>,
    epoch: Arc<StdRwLock<u64>>,
    generation_tx: watch::Sender<u64>,
    refresh_lock: Mutex<()>,
    refresh_requested: AtomicBool,
    refresh_notify: Arc<Notify>,
    worker_started: AtomicBool,
    batcher: Mutex<EventBatcher>,
}

/// A snapshot together with the generation it was published as.
#[derive(Debug, Clone)]
struct Published {
    generation: u64,
    snapshot: Arc<IndexSnapshot>,
}

impl std::fmt::Debug for Librarian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Librarian")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl Librarian {
    /// Build the initial snapshot and create the service.
    ///
    /// No refresh worker runs until [`spawn_refresh_worker`](Self::spawn_refresh_worker)
    /// is called; [`start`](Self::start) does both.
    pub async fn new(
        config: LibrarianConfig,
        tree: Arc<dyn ContentTree>,
        preprocessor: Arc<dyn Preprocessor>,
        cache: CacheManager,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let snapshot = build_snapshot(Arc::clone(&tree), Arc::clone(&config)).await?;
        let (generation_tx, _) = watch::channel(0);

        Ok(Self {
            config,
            tree,
            preprocessor,
            cache: Arc::new(cache),
            classifier: EventClassifier::default(),
            snapshot: RwLock::new(Published {
                generation: 0,
                snapshot: Arc::new(snapshot),
            }),
            epoch: Arc::new(StdRwLock::new(0)),
            generation_tx,
            refresh_lock: Mutex::new(()),
            refresh_requested: AtomicBool::new(false),
            refresh_notify: Arc::new(Notify::new()),
            worker_started: AtomicBool::new(false),
            batcher: Mutex::new(EventBatcher::new()),
        })
    }

    /// Create a service whose preprocessor and cache come from `config`, and
    /// start its refresh worker.
    pub async fn start(config: LibrarianConfig, tree: Arc<dyn ContentTree>) -> anyhow::Result<Arc<Self>> {
        let preprocessor = Arc::new(config.preprocessor.preprocessor());
        let cache = config.cache.manager()?;
        let librarian = Arc::new(Self::new(config, tree, preprocessor, cache).await?);
        librarian.spawn_refresh_worker();
        Ok(librarian)
    }

    /// Replace the event classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: EventClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &LibrarianConfig {
        &self.config
    }

    /// The bundle cache.
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.published().await.snapshot
    }

    async fn published(&self) -> Published {
        self.snapshot.read().await.clone()
    }

    /// Number of successful refreshes so far.
    pub fn generation(&self) -> u64 {
        *self.epoch.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Watch the refresh generation; it changes after every successful refresh.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Rebuild the index now.
    ///
    /// On failure the previous snapshot stays live and the error is returned.
    /// A successful refresh clears the cache: cached bundles never outlive
    /// the snapshot they were compiled against.
    pub async fn refresh(&self) -> Result<Arc<IndexSnapshot>> {
        let _guard = self.refresh_lock.lock().await;
        let started = Instant::now();

        let snapshot = match build_snapshot(Arc::clone(&self.tree), Arc::clone(&self.config)).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!(target: "librarian", "Index refresh failed, keeping previous snapshot: {}", e);
                return Err(match e {
                    e @ LibraryError::IndexRefresh { .. } => e,
                    other => LibraryError::IndexRefresh {
                        reason: other.to_string(),
                    },
                });
            }
        };

        let generation = {
            let mut current = self.snapshot.write().await;
            let generation = current.generation + 1;
            *current = Published {
                generation,
                snapshot: Arc::clone(&snapshot),
            };
            generation
        };

        {
            let mut epoch = self.epoch.write().unwrap_or_else(PoisonError::into_inner);
            *epoch = generation;
            if let Err(e) = self.cache.clear_cache() {
                warn!(target: "librarian", "Failed to clear cache after refresh: {}", e);
            }
        }
        self.generation_tx.send_replace(generation);

        info!(
            target: "librarian",
            "Refreshed index in {:?}: {} libraries, {} components",
            started.elapsed(),
            snapshot.library_count(),
            snapshot.components().len()
        );
        Ok(snapshot)
    }

    /// Ask the refresh worker for a rebuild. Requests made before the worker
    /// wakes are coalesced into one.
    pub fn request_refresh(&self) {
        if !self.refresh_requested.swap(true, Ordering::AcqRel) {
            debug!(target: "librarian", "Refresh requested");
            self.refresh_notify.notify_one();
        }
    }

    /// Spawn the task that serves [`request_refresh`](Self::request_refresh).
    ///
    /// Only one worker ever runs; later calls return `None`. The worker stops
    /// once the librarian is dropped.
    pub fn spawn_refresh_worker(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.worker_started.swap(true, Ordering::AcqRel) {
            return None;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let notify = Arc::clone(&self.refresh_notify);

        Some(tokio::spawn(async move {
            loop {
                notify.notified().await;
                let Some(librarian) = weak.upgrade() else {
                    break;
                };
                if librarian.refresh_requested.swap(false, Ordering::AcqRel) {
                    // Failures are logged by refresh().
                    let _ = librarian.refresh().await;
                }
            }
            debug!(target: "librarian", "Refresh worker stopped");
        }))
    }

    /// Number of indexed libraries.
    pub async fn library_count(&self) -> usize {
        self.snapshot().await.library_count()
    }

    /// Libraries carrying `category`, in discovery order.
    pub async fn libraries_for_category(&self, category: &str) -> Result<Vec<Arc<Library>>> {
        Ok(self.snapshot().await.libraries_for_category(category)?.to_vec())
    }

    /// All libraries grouped by category.
    pub async fn libraries_by_category(&self) -> BTreeMap<String, Vec<Arc<Library>>> {
        self.snapshot().await.libraries_by_category()
    }

    /// Ordered libraries for `root`, dependencies first.
    pub async fn resolve(&self, root: &str, brand: Option<&str>) -> Result<Vec<Arc<Library>>> {
        let (root, brand) = (root.to_string(), brand.map(str::to_string));
        self.with_resolver(move |resolver, _| resolver.resolve(&root, brand.as_deref()))
            .await
    }

    /// Filtered inclusion graph for `root`.
    pub async fn dependency_graph(
        &self,
        root: &str,
        brand: Option<&str>,
    ) -> Result<DependencyGraph<Arc<Library>>> {
        let (root, brand) = (root.to_string(), brand.map(str::to_string));
        self.with_resolver(move |resolver, _| resolver.dependency_graph(&root, brand.as_deref()))
            .await
    }

    /// Component/category/library graph of `root` for export.
    pub async fn graph_export(&self, root: &str, brand: Option<&str>) -> Result<GraphExport> {
        let (root, brand) = (root.to_string(), brand.map(str::to_string));
        self.with_resolver(move |resolver, _| GraphExport::build(resolver, &root, brand.as_deref()))
            .await
    }

    /// Compile the bundle of `asset_type` for `root`.
    ///
    /// The cache is consulted first; a lookup fault falls back to a live
    /// compile. A fresh bundle is written back best-effort: a write fault is
    /// logged and the bundle is still returned.
    pub async fn compile(&self, root: &str, asset_type: AssetType, brand: Option<&str>) -> Result<String> {
        let (root, brand) = (root.to_string(), brand.map(str::to_string));
        let cache = Arc::clone(&self.cache);
        let epoch = Arc::clone(&self.epoch);

        self.with_resolver(move |resolver, generation| {
            let root = resolver.canonical_root(&root)?;
            let brand = brand.as_deref();

            {
                let current = epoch.read().unwrap_or_else(PoisonError::into_inner);
                if *current == generation {
                    match cache.cached_library(&root, asset_type, brand) {
                        Ok(Some(text)) => return Ok(text),
                        Ok(None) => {}
                        Err(e) => warn!(target: "librarian", "Cache lookup failed, compiling: {}", e),
                    }
                }
            }

            let text = resolver.compile(&root, asset_type, brand)?;

            let current = epoch.read().unwrap_or_else(PoisonError::into_inner);
            if *current != generation {
                debug!(target: "librarian", "Index changed while compiling {}, not caching", root);
            } else if let Err(e) = cache.cache_library(&root, asset_type, brand, &text) {
                warn!(target: "librarian", "Failed to cache {} bundle for {}: {}", asset_type, root, e);
            }
            Ok(text)
        })
        .await
    }

    /// Feed change events. Complete batches are classified against the
    /// current snapshot and applied; the applied plans are returned.
    pub async fn apply_events(&self, events: &[ChangeEvent]) -> Vec<BatchPlan> {
        let mut batcher = self.batcher.lock().await;
        let batches = batcher.push(events.iter().cloned());

        let mut plans = Vec::with_capacity(batches.len());
        for batch in batches {
            let snapshot = self.snapshot().await;
            let plan = {
                let ctx = EventContext {
                    snapshot: &snapshot,
                    tree: &*self.tree,
                    library_roots: &self.config.library_roots,
                };
                self.classifier.plan(&ctx, &batch)
            };
            debug!(target: "librarian", "Batch of {} events: {:?}", batch.len(), plan);
            self.apply_plan(&plan).await;
            plans.push(plan);
        }
        plans
    }

    async fn apply_plan(&self, plan: &BatchPlan) {
        if plan.is_empty() {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let cache_plan = plan.clone();
        let applied = tokio::task::spawn_blocking(move || {
            if cache_plan.clear_cache {
                if let Err(e) = cache.clear_cache() {
                    warn!(target: "librarian", "Failed to clear cache: {}", e);
                }
                return;
            }
            for path in &cache_plan.invalidate {
                if let Err(e) = cache.invalidate_containing(path) {
                    warn!(target: "librarian", "Failed to invalidate {}: {}", path, e);
                }
            }
        })
        .await;
        if let Err(e) = applied {
            warn!(target: "librarian", "Cache update task failed: {}", e);
        }

        if plan.refresh_index {
            self.request_refresh();
        }
    }

    /// Spawn a task applying events from `events` in arrival order.
    pub fn spawn_event_listener(self: &Arc<Self>, mut events: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let librarian = Arc::clone(self);
        tokio::spawn(async move {
            let mut buffer = Vec::with_capacity(64);
            while events.recv_many(&mut buffer, 64).await > 0 {
                librarian.apply_events(&buffer).await;
                buffer.clear();
            }
            debug!(target: "librarian", "Event channel closed");
        })
    }

    /// Run `f` on the blocking pool with a resolver over the current
    /// snapshot and that snapshot's generation.
    async fn with_resolver<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Resolver<'_>, u64) -> Result<T> + Send + 'static,
    {
        let Published { generation, snapshot } = self.published().await;
        let tree = Arc::clone(&self.tree);
        let preprocessor = Arc::clone(&self.preprocessor);
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || {
            let resolver = Resolver::new(&*tree, &snapshot, &config.run_modes)
                .with_preprocessor(&*preprocessor);
            f(&resolver, generation)
        })
        .await
        .map_err(|e| LibraryError::Compilation(CompilationError::new(format!("Resolver task failed: {e}"))))?
    }
}

impl Drop for Librarian {
    fn drop(&mut self) {
        // Wake the worker so it sees the librarian is gone.
        self.refresh_notify.notify_one();
    }
}

async fn build_snapshot(tree: Arc<dyn ContentTree>, config: Arc<LibrarianConfig>) -> Result<IndexSnapshot> {
    tokio::task::spawn_blocking(move || IndexSnapshot::build(&*tree, &config))
        .await
        .map_err(|e| LibraryError::IndexRefresh {
            reason: format!("Index build task failed: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::constants::{COMPONENT_TYPE, LIBRARY_FOLDER_TYPE};
    use crate::content::{ContentNode, MemoryContentTree};
    use crate::events::EventKind;
    use crate::preprocessor::PassthroughPreprocessor;
    use std::time::Duration;

    fn site() -> Arc<MemoryContentTree> {
        Arc::new(
            MemoryContentTree::new()
                .with(ContentNode::new("/libs/base", LIBRARY_FOLDER_TYPE).with_property("categories", ["base"]))
                .with_file("/libs/base/css.txt", "base.css")
                .with_file("/libs/base/base.css", "body{}")
                .with(
                    ContentNode::new("/apps/site/clientlibs", LIBRARY_FOLDER_TYPE)
                        .with_property("categories", ["site"])
                        .with_property("dependencies", ["base"]),
                )
                .with_file("/apps/site/clientlibs/css.txt", "site.css")
                .with_file("/apps/site/clientlibs/site.css", ".site{}")
                .with(ContentNode::new("/apps/site/page", COMPONENT_TYPE).with_property("dependencies", ["site"]))
                .with(
                    ContentNode::new("/content/a/jcr:content", "cq:PageContent")
                        .with_property("sling:resourceType", "site/page"),
                )
                .with(
                    ContentNode::new("/content/b/jcr:content", "cq:PageContent")
                        .with_property("sling:resourceType", "site/page"),
                ),
        )
    }

    async fn librarian(tree: Arc<MemoryContentTree>) -> Arc<Librarian> {
        crate::test_utils::init_test_logging(None);
        let librarian = Librarian::new(
            LibrarianConfig::default(),
            tree,
            Arc::new(PassthroughPreprocessor),
            CacheManager::new(Arc::new(MemoryCacheStore::new())),
        )
        .await
        .unwrap();
        Arc::new(librarian)
    }

    async fn wait_for_generation(librarian: &Librarian, generation: u64) {
        let mut rx = librarian.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|g| *g >= generation))
            .await
            .expect("refresh did not complete")
            .unwrap();
    }

    #[tokio::test]
    async fn test_compile_is_cached_and_stable() {
        let librarian = librarian(site()).await;
        let first = librarian.compile("/content/a", AssetType::Css, None).await.unwrap();
        let second = librarian.compile("/content/a", AssetType::Css, None).await.unwrap();
        assert_eq!(first, "body{}\n.site{}");
        assert_eq!(first, second);

        let stats = librarian.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_content_event_invalidates_one_root() {
        let librarian = librarian(site()).await;
        for root in ["/content/a", "/content/b"] {
            librarian.compile(root, AssetType::Css, None).await.unwrap();
        }

        let plans = librarian
            .apply_events(&[
                ChangeEvent::new(EventKind::PropertyChanged, "/content/a/jcr:content/title"),
                ChangeEvent::transaction_end(),
            ])
            .await;
        assert_eq!(plans.len(), 1);

        let cache = librarian.cache();
        assert!(cache.cached_library("/content/a/jcr:content", AssetType::Css, None).unwrap().is_none());
        assert!(cache.cached_library("/content/b/jcr:content", AssetType::Css, None).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_events_wait_for_transaction_end() {
        let librarian = librarian(site()).await;
        librarian.compile("/content/a", AssetType::Css, None).await.unwrap();

        let event = ChangeEvent::new(EventKind::NodeAdded, "/content/a/jcr:content/par");
        assert!(librarian.apply_events(&[event]).await.is_empty());
        let cache = librarian.cache();
        assert!(cache.cached_library("/content/a/jcr:content", AssetType::Css, None).unwrap().is_some());

        let plans = librarian.apply_events(&[ChangeEvent::transaction_end()]).await;
        assert_eq!(plans[0].invalidate.len(), 1);
        assert!(cache.cached_library("/content/a/jcr:content", AssetType::Css, None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_library_change_clears_and_refreshes() {
        let tree = site();
        let librarian = librarian(Arc::clone(&tree)).await;
        librarian.spawn_refresh_worker();
        for root in ["/content/a", "/content/b"] {
            librarian.compile(root, AssetType::Css, None).await.unwrap();
        }

        tree.set_property("/apps/site/clientlibs", "dependencies", Vec::<String>::new());
        let plans = librarian
            .apply_events(&[
                ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/clientlibs/dependencies"),
                ChangeEvent::transaction_end(),
            ])
            .await;
        assert!(plans[0].clear_cache && plans[0].refresh_index);
        assert!(librarian.cache().store().keys().unwrap().is_empty());

        wait_for_generation(&librarian, 1).await;
        let css = librarian.compile("/content/b", AssetType::Css, None).await.unwrap();
        assert_eq!(css, ".site{}");
    }

    #[tokio::test]
    async fn test_refresh_requests_coalesce() {
        let librarian = librarian(site()).await;
        for _ in 0..10 {
            librarian.request_refresh();
        }
        librarian.spawn_refresh_worker();
        assert!(librarian.spawn_refresh_worker().is_none());

        wait_for_generation(&librarian, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(librarian.generation(), 1);
    }

    #[tokio::test]
    async fn test_event_listener_applies_in_order() {
        let librarian = librarian(site()).await;
        librarian.compile("/content/a", AssetType::Js, None).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let listener = librarian.spawn_event_listener(rx);
        tx.send(ChangeEvent::new(EventKind::NodeRemoved, "/content/a/jcr:content/par")).await.unwrap();
        tx.send(ChangeEvent::transaction_end()).await.unwrap();
        drop(tx);
        listener.await.unwrap();

        let cached = librarian.cache().cached_library("/content/a/jcr:content", AssetType::Js, None);
        assert!(cached.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_library_queries() {
        let librarian = librarian(site()).await;
        assert_eq!(librarian.library_count().await, 2);
        assert_eq!(librarian.libraries_for_category("base").await.unwrap().len(), 1);
        assert!(matches!(
            librarian.libraries_for_category("nope").await,
            Err(LibraryError::InvalidCategory { .. })
        ));
        let by_category = librarian.libraries_by_category().await;
        assert_eq!(by_category.keys().collect::<Vec<_>>(), vec!["base", "site"]);

        let resolved = librarian.resolve("/content/a", None).await.unwrap();
        let paths: Vec<_> = resolved.iter().map(|l| l.path()).collect();
        assert_eq!(paths, vec!["/libs/base", "/apps/site/clientlibs"]);
    }

    #[derive(Debug)]
    struct FlakyTree {
        inner: Arc<MemoryContentTree>,
        failing: AtomicBool,
    }

    impl ContentTree for FlakyTree {
        fn node(&self, path: &str) -> Result<Option<ContentNode>> {
            if self.failing.load(Ordering::Acquire) {
                return Err(LibraryError::ContentAccess {
                    path: path.to_string(),
                    reason: "repository offline".to_string(),
                });
            }
            self.inner.node(path)
        }

        fn children(&self, path: &str) -> Result<Vec<ContentNode>> {
            if self.failing.load(Ordering::Acquire) {
                return Err(LibraryError::ContentAccess {
                    path: path.to_string(),
                    reason: "repository offline".to_string(),
                });
            }
            self.inner.children(path)
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let tree = Arc::new(FlakyTree {
            inner: site(),
            failing: AtomicBool::new(false),
        });
        let librarian = Librarian::new(
            LibrarianConfig::default(),
            Arc::clone(&tree) as Arc<dyn ContentTree>,
            Arc::new(PassthroughPreprocessor),
            CacheManager::default(),
        )
        .await
        .unwrap();
        let before = librarian.snapshot().await;

        tree.failing.store(true, Ordering::Release);
        let error = librarian.refresh().await.unwrap_err();
        assert!(matches!(error, LibraryError::IndexRefresh { .. }));
        assert!(Arc::ptr_eq(&before, &librarian.snapshot().await));
        assert_eq!(librarian.generation(), 0);

        tree.failing.store(false, Ordering::Release);
        librarian.refresh().await.unwrap();
        assert_eq!(librarian.generation(), 1);
        assert_eq!(librarian.library_count().await, 2);
    }

    /// Refreshes the librarian, after dropping the `site` category, the
    /// first time a compile looks up `/content/a/jcr:content`.
    #[derive(Debug)]
    struct RefreshingTree {
        inner: Arc<MemoryContentTree>,
        librarian: std::sync::OnceLock<Weak<Librarian>>,
        fired: AtomicBool,
    }

    impl ContentTree for RefreshingTree {
        fn node(&self, path: &str) -> Result<Option<ContentNode>> {
            if path == "/content/a/jcr:content"
                && let Some(librarian) = self.librarian.get().and_then(Weak::upgrade)
                && !self.fired.swap(true, Ordering::AcqRel)
            {
                self.inner.set_property("/apps/site/clientlibs", "categories", ["gone"]);
                tokio::runtime::Handle::current().block_on(librarian.refresh())?;
            }
            self.inner.node(path)
        }

        fn children(&self, path: &str) -> Result<Vec<ContentNode>> {
            self.inner.children(path)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_refresh_during_compile_leaves_no_stale_bundle() {
        crate::test_utils::init_test_logging(None);
        let tree = Arc::new(RefreshingTree {
            inner: site(),
            librarian: std::sync::OnceLock::new(),
            fired: AtomicBool::new(false),
        });
        let librarian = Arc::new(
            Librarian::new(
                LibrarianConfig::default(),
                Arc::clone(&tree) as Arc<dyn ContentTree>,
                Arc::new(PassthroughPreprocessor),
                CacheManager::new(Arc::new(MemoryCacheStore::new())),
            )
            .await
            .unwrap(),
        );
        tree.librarian.set(Arc::downgrade(&librarian)).unwrap();

        // Compiled against the snapshot taken before the refresh
        let racing = librarian.compile("/content/a", AssetType::Css, None).await.unwrap();
        assert_eq!(racing, "body{}\n.site{}");
        assert_eq!(librarian.generation(), 1);

        let cached = librarian.cache().cached_library("/content/a/jcr:content", AssetType::Css, None);
        assert!(cached.unwrap().is_none());
        assert_eq!(librarian.compile("/content/a", AssetType::Css, None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_concurrent_compiles_agree() {
        let librarian = librarian(site()).await;
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let librarian = Arc::clone(&librarian);
            let root = if i % 2 == 0 { "/content/a" } else { "/content/b" };
            tasks.spawn(async move { librarian.compile(root, AssetType::Css, None).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), "body{}\n.site{}");
        }
    }
}
