//! Change events against an on-disk repository: cache invalidation and
//! index refresh as seen through the librarian.

mod common;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use pagelib::cache::{CacheManager, FsCacheStore};
use pagelib::config::LibrarianConfig;
use pagelib::content::FsContentTree;
use pagelib::core::AssetType;
use pagelib::events::{ChangeEvent, EventKind};
use pagelib::librarian::Librarian;
use pagelib::preprocessor::PassthroughPreprocessor;
use pagelib::test_utils::init_test_logging;

use common::{TestRepository, cached_entries};

const HOME: &str = "/content/home";
const HOME_ROOT: &str = "/content/home/jcr:content";
const ABOUT_ROOT: &str = "/content/about/jcr:content";

async fn start(repo: &TestRepository) -> Result<Arc<Librarian>> {
    init_test_logging(None);
    let tree = FsContentTree::new(repo.content_dir())?;
    Ok(Librarian::start(LibrarianConfig::default(), Arc::new(tree)).await?)
}

fn cached_roots(librarian: &Librarian) -> Result<Vec<String>> {
    let mut roots: Vec<String> = librarian
        .cache()
        .store()
        .keys()?
        .into_iter()
        .map(|key| key.root)
        .collect();
    roots.dedup();
    Ok(roots)
}

async fn wait_for_refresh(mut generation: tokio::sync::watch::Receiver<u64>) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), generation.changed()).await??;
    Ok(())
}

#[tokio::test]
async fn test_source_edit_clears_cache() -> Result<()> {
    let repo = TestRepository::sample()?;
    let librarian = start(&repo).await?;

    let css = librarian.compile(HOME, AssetType::Css, None).await?;
    assert_eq!(css, "body { margin: 0; }\n.site { color: red; }");

    repo.write("/libs/base/base.css", "body { margin: 2px; }")?;
    // Not yet told: the cached bundle is served
    assert_eq!(librarian.compile(HOME, AssetType::Css, None).await?, css);

    let plans = librarian
        .apply_events(&[
            ChangeEvent::new(EventKind::PropertyChanged, "/libs/base/base.css/jcr:content/jcr:data"),
            ChangeEvent::transaction_end(),
        ])
        .await;
    assert_eq!(plans.len(), 1);
    assert!(plans[0].clear_cache);
    assert!(!plans[0].refresh_index);
    assert!(cached_roots(&librarian)?.is_empty());

    assert_eq!(
        librarian.compile(HOME, AssetType::Css, None).await?,
        "body { margin: 2px; }\n.site { color: red; }"
    );
    Ok(())
}

#[tokio::test]
async fn test_edit_of_shared_source_clears_cache() -> Result<()> {
    let repo = TestRepository::sample()?;
    repo.write("/libs/shared/normalize.css", "html { margin: 0; }")?;
    repo.write("/apps/site/clientlibs/css.txt", "site.less\n/libs/shared/normalize.css\n")?;
    let librarian = start(&repo).await?;

    let css = librarian.compile(HOME, AssetType::Css, None).await?;
    assert!(css.ends_with("html { margin: 0; }"));

    repo.write("/libs/shared/normalize.css", "html { margin: 1px; }")?;
    let plans = librarian
        .apply_events(&[
            ChangeEvent::new(EventKind::PropertyChanged, "/libs/shared/normalize.css/jcr:content/jcr:data"),
            ChangeEvent::transaction_end(),
        ])
        .await;
    assert!(plans[0].clear_cache);
    assert!(cached_roots(&librarian)?.is_empty());

    let css = librarian.compile(HOME, AssetType::Css, None).await?;
    assert!(css.ends_with("html { margin: 1px; }"));
    Ok(())
}

#[tokio::test]
async fn test_library_definition_change_refreshes_and_clears_every_root() -> Result<()> {
    let repo = TestRepository::sample()?;
    let librarian = start(&repo).await?;

    librarian.compile(HOME, AssetType::Js, None).await?;
    librarian.compile("/content/about", AssetType::Js, None).await?;
    assert_eq!(cached_roots(&librarian)?, vec![ABOUT_ROOT, HOME_ROOT]);

    repo.write(
        "/libs/base/.content.toml",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"base\"]\n",
    )?;
    let refreshed = librarian.subscribe();
    let plans = librarian
        .apply_events(&[
            ChangeEvent::new(EventKind::PropertyRemoved, "/libs/base/embed"),
            ChangeEvent::transaction_end(),
        ])
        .await;
    assert!(plans[0].clear_cache && plans[0].refresh_index);
    assert!(cached_roots(&librarian)?.is_empty());

    wait_for_refresh(refreshed).await?;
    assert_eq!(
        librarian.compile(HOME, AssetType::Js, None).await?,
        "var base = 1;\nvar site = 1;"
    );
    Ok(())
}

#[tokio::test]
async fn test_component_dependency_change_refreshes() -> Result<()> {
    let repo = TestRepository::sample()?;
    let librarian = start(&repo).await?;
    librarian.compile(HOME, AssetType::Css, None).await?;

    repo.write(
        "/apps/site/components/page/.content.toml",
        "\"jcr:primaryType\" = \"cq:Component\"\ndependencies = [\"base\"]\nembed = [\"header:site/components/header\"]\n",
    )?;
    let refreshed = librarian.subscribe();
    librarian
        .apply_events(&[
            ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/components/page/dependencies"),
            ChangeEvent::transaction_end(),
        ])
        .await;
    wait_for_refresh(refreshed).await?;

    assert_eq!(librarian.compile(HOME, AssetType::Css, None).await?, "body { margin: 0; }");
    Ok(())
}

#[tokio::test]
async fn test_content_edit_invalidates_only_its_root() -> Result<()> {
    let repo = TestRepository::sample()?;
    let librarian = start(&repo).await?;
    librarian.compile(HOME, AssetType::Css, None).await?;
    librarian.compile("/content/about", AssetType::Css, None).await?;

    let plans = librarian
        .apply_events(&[
            ChangeEvent::new(EventKind::PropertyChanged, "/content/home/jcr:content/par/text/text"),
            ChangeEvent::transaction_end(),
        ])
        .await;
    assert!(plans[0].invalidate.contains(HOME_ROOT));
    assert!(!plans[0].clear_cache);
    assert_eq!(cached_roots(&librarian)?, vec![ABOUT_ROOT]);
    assert_eq!(librarian.generation(), 0);
    Ok(())
}

#[tokio::test]
async fn test_events_wait_for_transaction_end() -> Result<()> {
    let repo = TestRepository::sample()?;
    let librarian = start(&repo).await?;
    librarian.compile(HOME, AssetType::Css, None).await?;

    let plans = librarian
        .apply_events(&[ChangeEvent::new(EventKind::NodeRemoved, "/content/home/jcr:content/par")])
        .await;
    assert!(plans.is_empty());
    assert_eq!(cached_roots(&librarian)?, vec![HOME_ROOT]);

    librarian.apply_events(&[ChangeEvent::transaction_end()]).await;
    assert!(cached_roots(&librarian)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_listener_with_filesystem_cache() -> Result<()> {
    init_test_logging(None);
    let repo = TestRepository::sample()?;
    let cache_dir = repo.scratch("cache");
    let cache = CacheManager::new(Arc::new(FsCacheStore::new(&cache_dir)?));
    let tree = Arc::new(FsContentTree::new(repo.content_dir())?);
    let librarian = Arc::new(
        Librarian::new(
            LibrarianConfig::default(),
            tree,
            Arc::new(PassthroughPreprocessor),
            cache,
        )
        .await?,
    );

    librarian.compile(HOME, AssetType::Css, None).await?;
    librarian.compile(HOME, AssetType::Css, Some("x")).await?;
    librarian.compile("/content/about", AssetType::Js, None).await?;
    assert_eq!(
        cached_entries(&cache_dir),
        vec![
            "content/about/jcr:content/default/js/library",
            "content/home/jcr:content/default/css/library",
            "content/home/jcr:content/x/css/library",
        ]
    );

    let (tx, rx) = mpsc::channel(16);
    let listener = librarian.spawn_event_listener(rx);
    tx.send(ChangeEvent::moved("/content/home/jcr:content/par/a", "/content/home/jcr:content/par/b"))
        .await?;
    tx.send(ChangeEvent::transaction_end()).await?;
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), listener).await??;

    assert_eq!(
        cached_entries(&cache_dir),
        vec!["content/about/jcr:content/default/js/library"]
    );
    Ok(())
}
