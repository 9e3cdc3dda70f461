//! Integration tests for the crawler
//!
//! Most tests drive the coordinator against an in-memory site so crawl
//! behaviour can be scripted page by page. The last ones use wiremock to run
//! the full cycle through the HTTP navigator.

use async_trait::async_trait;
use site_gleaner::config::Config;
use site_gleaner::crawler::{
    BrowserLauncher, Coordinator, Navigator, PageHandle, ReadableTextExtractor,
};
use site_gleaner::session::{reap_expired, ManualClock, SessionId};
use site_gleaner::NavigationError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: &str = "https://example.com";

#[derive(Default, Clone)]
struct Page {
    links: Vec<String>,
    markup: String,
    hang: bool,
}

/// In-memory website shared by every navigator it launches
#[derive(Default)]
struct StaticSite {
    pages: HashMap<String, Page>,
    failures: Mutex<HashMap<String, u32>>,
    loads: Mutex<Vec<String>>,
    launches: AtomicUsize,
    closes: AtomicUsize,
}

impl StaticSite {
    fn page(mut self, path: &str, links: &[&str]) -> Self {
        self.pages.insert(
            format!("{}{}", ORIGIN, path),
            Page {
                links: links.iter().map(|l| format!("{}{}", ORIGIN, l)).collect(),
                markup: format!("<html><body><p>Content of {}</p></body></html>", path),
                hang: false,
            },
        );
        self
    }

    fn markup(mut self, path: &str, markup: &str) -> Self {
        let page = self.pages.entry(format!("{}{}", ORIGIN, path)).or_default();
        page.markup = markup.to_string();
        self
    }

    fn hanging(mut self, path: &str) -> Self {
        let page = self.pages.entry(format!("{}{}", ORIGIN, path)).or_default();
        page.hang = true;
        self
    }

    fn flaky(self, path: &str, failures: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{}{}", ORIGIN, path), failures);
        self
    }

    fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn wait_for_load(&self, url: &str) {
        for _ in 0..200 {
            if self.loads().iter().any(|loaded| loaded == url) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} was never loaded", url);
    }
}

/// Launcher and navigator over a shared [`StaticSite`]
#[derive(Clone)]
struct SiteNavigator(Arc<StaticSite>);

#[async_trait]
impl BrowserLauncher for SiteNavigator {
    async fn launch(&self) -> Result<Arc<dyn Navigator>, NavigationError> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Navigator for SiteNavigator {
    async fn load(&self, url: &Url, _timeout: Duration) -> Result<PageHandle, NavigationError> {
        let key = url.as_str().trim_end_matches('/').to_string();
        self.0.loads.lock().unwrap().push(key.clone());

        if let Some(remaining) = self.0.failures.lock().unwrap().get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NavigationError::EmptyResponse { url: key });
            }
        }

        let Some(page) = self.0.pages.get(&key).cloned() else {
            return Err(NavigationError::HttpStatus {
                url: key,
                status: 404,
            });
        };

        if page.hang {
            std::future::pending::<()>().await;
        }
        Ok(PageHandle::new(url.clone(), page.markup))
    }

    async fn extract_outbound_links(
        &self,
        page: &PageHandle,
    ) -> Result<Vec<String>, NavigationError> {
        let key = page.url.as_str().trim_end_matches('/');
        Ok(self
            .0
            .pages
            .get(key)
            .map(|p| p.links.clone())
            .unwrap_or_default())
    }

    async fn raw_markup(&self, page: &PageHandle) -> Result<String, NavigationError> {
        Ok(page.markup.clone())
    }

    async fn close(&self) {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Creates a test configuration with short delays
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.retry_delay_ms = 10;
    config.crawler.request_timeout_ms = 2_000;
    config.extraction.request_timeout_ms = 2_000;
    config.crawler.max_requests_per_minute = 6_000;
    config.extraction.max_requests_per_minute = 6_000;
    config
}

fn coordinator_for(site: &Arc<StaticSite>, config: Config) -> Arc<Coordinator> {
    Arc::new(Coordinator::with_collaborators(
        config,
        Arc::new(SiteNavigator(Arc::clone(site))),
        Arc::new(ReadableTextExtractor),
    ))
}

fn url(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

#[tokio::test]
async fn test_discovery_stops_at_total_pages() {
    let site = Arc::new(StaticSite::default().page(
        "",
        &[
            "/login",
            "/blog/1",
            "/pricing",
            "/blog/2",
            "/blog/3",
            "/blog/4",
            "/blog/5",
            "/blog/6",
            "/blog/7",
            "/blog/8",
        ],
    ));
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();

    assert_eq!(
        report.internal_links,
        vec![
            url("/blog/1"),
            url("/blog/2"),
            url("/blog/3"),
            url("/blog/4"),
            url("/blog/5")
        ]
    );
    assert!(report.session_id.as_str().starts_with("session_"));
    assert_eq!(site.launches.load(Ordering::SeqCst), 1);
    assert_eq!(site.closes(), 1);
}

#[tokio::test]
async fn test_total_pages_never_overshoots_under_concurrency() {
    let mut site = StaticSite::default();
    let mut seeds = Vec::new();
    for seed in 0..10 {
        let links: Vec<String> = (0..20).map(|i| format!("/s{}/p{}", seed, i)).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        site = site.page(&format!("/s{}", seed), &link_refs);
        seeds.push(url(&format!("/s{}", seed)));
    }
    let site = Arc::new(site);

    let mut config = create_test_config();
    config.crawler.total_pages = 7;
    let coordinator = coordinator_for(&site, config);

    let report = coordinator.discover_links(&seeds, None, None).await.unwrap();

    assert_eq!(report.internal_links.len(), 7);
    let session = coordinator.sessions().get(&report.session_id).unwrap();
    assert!(session.is_stopped());
}

#[tokio::test]
async fn test_depth_limit_is_respected() {
    let site = Arc::new(
        StaticSite::default()
            .page("", &["/l1"])
            .page("/l1", &["/l2"])
            .page("/l2", &["/l3"])
            .page("/l3", &["/l4"]),
    );
    let mut config = create_test_config();
    config.crawler.total_pages = 10;
    let coordinator = coordinator_for(&site, config);

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();

    let loads = site.loads();
    assert!(loads.contains(&url("/l2")));
    assert!(!loads.contains(&url("/l3")));
    assert_eq!(report.internal_links, vec![url("/l1"), url("/l2"), url("/l3")]);
}

#[tokio::test]
async fn test_failed_pages_are_recorded_not_fatal() {
    let site = Arc::new(
        StaticSite::default()
            .page("", &["/missing", "/present"])
            .page("/present", &[]),
    );
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();

    assert_eq!(report.internal_links, vec![url("/missing"), url("/present")]);
    assert_eq!(
        report.errors,
        vec![format!(
            "Failed request: {} - HTTP 404 for {}",
            url("/missing"),
            url("/missing")
        )]
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let site = Arc::new(
        StaticSite::default()
            .page("", &["/flaky"])
            .page("/flaky", &["/after"])
            .flaky("/flaky", 2),
    );
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();

    let flaky_loads = site.loads().iter().filter(|l| **l == url("/flaky")).count();
    assert_eq!(flaky_loads, 3);
    assert!(report.internal_links.contains(&url("/after")));
    assert!(report.errors.iter().all(|e| !e.contains("/flaky")));
}

#[tokio::test]
async fn test_abort_stops_crawl_and_releases_once() {
    let site = Arc::new(
        StaticSite::default()
            .page("", &["/a", "/b"])
            .hanging("/a")
            .hanging("/b"),
    );
    let coordinator = coordinator_for(&site, create_test_config());
    let cancel = CancellationToken::new();

    let running = {
        let coordinator = Arc::clone(&coordinator);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            coordinator
                .discover_links(&[ORIGIN.to_string()], None, Some(cancel))
                .await
        })
    };

    site.wait_for_load(&url("/a")).await;
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("crawl did not stop after abort")
        .unwrap()
        .unwrap();

    assert_eq!(report.internal_links, vec![url("/a"), url("/b")]);
    assert_eq!(site.closes(), 1);

    // State is kept for the caller until cleanup
    let session = coordinator.sessions().get(&report.session_id).unwrap();
    assert!(session.is_aborted());
    assert!(!coordinator.stop_session(&report.session_id).await);
    assert_eq!(site.closes(), 1);
}

#[tokio::test]
async fn test_stop_session_from_outside() {
    let site = Arc::new(StaticSite::default().page("", &["/slow"]).hanging("/slow"));
    let coordinator = coordinator_for(&site, create_test_config());
    let id = SessionId::new("stoppable");

    let running = {
        let coordinator = Arc::clone(&coordinator);
        let id = id.clone();
        tokio::spawn(async move {
            coordinator
                .discover_links(&[ORIGIN.to_string()], Some(id), None)
                .await
        })
    };

    site.wait_for_load(&url("/slow")).await;
    assert!(coordinator.stop_session(&id).await);

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.internal_links, vec![url("/slow")]);
    assert_eq!(site.closes(), 1);
}

#[tokio::test]
async fn test_reusing_session_id_stops_previous_crawl() {
    let site = Arc::new(
        StaticSite::default()
            .page("/first", &["/slow"])
            .hanging("/slow")
            .page("/second", &["/fresh"])
            .page("/fresh", &[]),
    );
    let coordinator = coordinator_for(&site, create_test_config());
    let id = SessionId::new("shared");

    let first = {
        let coordinator = Arc::clone(&coordinator);
        let id = id.clone();
        tokio::spawn(async move {
            coordinator
                .discover_links(&[url("/first")], Some(id), None)
                .await
        })
    };
    site.wait_for_load(&url("/slow")).await;

    let second = coordinator
        .discover_links(&[url("/second")], Some(id.clone()), None)
        .await
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .expect("first crawl was not stopped")
        .unwrap()
        .unwrap();

    assert_eq!(first.session_id, id);
    assert_eq!(second.session_id, id);
    assert_eq!(first.internal_links, vec![url("/slow")]);
    assert_eq!(second.internal_links, vec![url("/fresh")]);

    let session = coordinator.sessions().get(&id).unwrap();
    assert!(!session.is_visited(&url("/first")));
    assert!(session.is_visited(&url("/second")));
    assert_eq!(coordinator.sessions().len(), 1);
    assert_eq!(site.closes(), 2);
}

#[tokio::test]
async fn test_cleanup_removes_all_trace() {
    let site = Arc::new(StaticSite::default().page("", &["/a"]).page("/a", &[]));
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();
    assert_eq!(coordinator.sessions().len(), 1);

    coordinator.cleanup_session(&report.session_id).await;
    coordinator.cleanup_session(&report.session_id).await;

    assert!(coordinator.sessions().get(&report.session_id).is_none());
    assert!(coordinator.sessions().session_ids().is_empty());
}

#[tokio::test]
async fn test_reaper_expires_finished_sessions() {
    let site = Arc::new(StaticSite::default().page("", &[]));
    let coordinator = coordinator_for(&site, create_test_config());
    let clock = ManualClock::new(tokio::time::Instant::now());

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, None)
        .await
        .unwrap();

    assert!(reap_expired(coordinator.sessions(), &clock).await.is_empty());

    clock.advance(coordinator.config().session.timeout() + Duration::from_secs(1));
    let reaped = reap_expired(coordinator.sessions(), &clock).await;

    assert_eq!(reaped, vec![report.session_id.clone()]);
    assert!(coordinator.sessions().is_empty());
}

#[tokio::test]
async fn test_extraction_of_empty_page() {
    let site = Arc::new(
        StaticSite::default()
            .markup("/empty", "<html><body></body></html>")
            .markup(
                "/post",
                "<html><body><article><h1>Title</h1>\n<p>Some   text.</p></article></body></html>",
            ),
    );
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .extract_content(&[url("/empty"), url("/post")], false, None, None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[&url("/post")], "Title Some text.");
    assert_eq!(
        report.errors,
        vec![format!(
            "Could not extract readable content from: {}",
            url("/empty")
        )]
    );
    assert!(report.processing_times[&url("/empty")].end.is_none());
    assert!(report.processing_times[&url("/post")].end.is_some());
    assert_eq!(site.closes(), 1);
}

#[tokio::test]
async fn test_extraction_follows_links() {
    let site = Arc::new(
        StaticSite::default()
            .page("", &["/guide", "/careers"])
            .page("/guide", &[]),
    );
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .extract_content(&[ORIGIN.to_string()], true, None, None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[&url("/guide")], "Content of /guide");
    assert!(!site.loads().contains(&url("/careers")));
}

#[tokio::test]
async fn test_extraction_continues_past_link_target() {
    let followed: Vec<String> = (1..=8).map(|i| format!("/p{}", i)).collect();
    let followed_refs: Vec<&str> = followed.iter().map(String::as_str).collect();
    let mut site = StaticSite::default().page("", &followed_refs);
    for path in followed.iter().map(String::as_str).chain(["/s1", "/s2", "/s3"]) {
        site = site.page(path, &[]);
    }
    let site = Arc::new(site);

    let mut config = create_test_config();
    config.extraction.max_concurrency = 1;
    let coordinator = coordinator_for(&site, config);

    let seeds = vec![ORIGIN.to_string(), url("/s1"), url("/s2"), url("/s3")];
    let report = coordinator
        .extract_content(&seeds, true, None, None)
        .await
        .unwrap();

    let mut expected: Vec<String> = seeds.clone();
    expected.extend((1..=5).map(|i| url(&format!("/p{}", i))));
    expected.sort();
    let extracted: Vec<String> = report.results.keys().cloned().collect();

    assert_eq!(extracted, expected);
    assert_eq!(report.results[&url("/s2")], "Content of /s2");
    assert!(report.errors.is_empty());
    assert!(!site.loads().contains(&url("/p6")));

    let session = coordinator.sessions().get(&report.session_id).unwrap();
    assert!(!session.is_halted());
}

#[tokio::test]
async fn test_cancelled_before_start_returns_ok() {
    let site = Arc::new(StaticSite::default().page("", &["/a"]));
    let coordinator = coordinator_for(&site, create_test_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = coordinator
        .discover_links(&[ORIGIN.to_string()], None, Some(cancel))
        .await
        .unwrap();

    assert!(report.internal_links.is_empty());
    assert!(report.errors.is_empty());
    assert!(site.loads().is_empty());
    assert_eq!(site.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extraction_failure_recorded_once() {
    let site = Arc::new(StaticSite::default());
    let coordinator = coordinator_for(&site, create_test_config());

    let report = coordinator
        .extract_content(&[url("/gone")], false, None, None)
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(
        report.errors,
        vec![format!(
            "Failed to scrape {}: HTTP 404 for {}",
            url("/gone"),
            url("/gone")
        )]
    );
}

#[tokio::test]
async fn test_full_cycle_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="/blog/first-post">First</a>
                    <a href="{}/blog/second-post/">Second</a>
                    <a href="/login">Log in</a>
                    <a href="/blog/first-post#comments">Comments</a>
                    <a href="https://elsewhere.test/page">Elsewhere</a>
                    </body></html>"#,
                    base_url
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/blog/first-post"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>First</title></head><body>
                    <nav>Menu</nav>
                    <article><p>The first post.</p></article>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let coordinator = Coordinator::new(create_test_config()).unwrap();

    let links = coordinator
        .discover_links(&[base_url.clone()], None, None)
        .await
        .unwrap();
    assert_eq!(
        links.internal_links,
        vec![
            format!("{}/blog/first-post", base_url),
            format!("{}/blog/second-post", base_url)
        ]
    );
    // The second post is not mocked, so it fails without failing the crawl
    assert_eq!(links.errors.len(), 1);
    assert!(links.errors[0].starts_with("Failed request: "));

    let first_post = format!("{}/blog/first-post", base_url);
    let content = coordinator
        .extract_content(&[first_post.clone()], false, None, None)
        .await
        .unwrap();
    assert_eq!(content.results[&first_post], "The first post.");
    assert!(content.errors.is_empty());

    let json = serde_json::to_value(&content).unwrap();
    assert!(json["processingTimes"][&first_post]["end"].is_string());
}
