use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use quakefeed_core::error::AppError;
use quakefeed_core::models::RawBlock;
use quakefeed_core::traits::MessageSource;
use serde::Deserialize;

use crate::blocks::HtmlBlockParser;

/// Timing for page loads and scrolls.
///
/// Every wait is `base + uniform[0, jitter]` so scrolling does not happen
/// on a fixed beat.
#[derive(Debug, Clone)]
pub struct ScrollPacing {
    pub initial_wait: Duration,
    pub initial_jitter: Duration,
    pub pause: Duration,
    pub pause_jitter: Duration,
}

impl Default for ScrollPacing {
    /// 8–12 s for the first load, 2.5–4.5 s between scrolls.
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(8),
            initial_jitter: Duration::from_secs(4),
            pause: Duration::from_millis(2500),
            pause_jitter: Duration::from_secs(2),
        }
    }
}

impl ScrollPacing {
    fn initial(&self) -> Duration {
        let jitter = rand_jitter_ms(self.initial_jitter.as_millis() as u64);
        self.initial_wait + Duration::from_millis(jitter)
    }

    fn between_scrolls(&self) -> Duration {
        let jitter = rand_jitter_ms(self.pause_jitter.as_millis() as u64);
        self.pause + Duration::from_millis(jitter)
    }

    /// Fraction of the viewport to scroll, in [0.7, 1.1).
    fn scroll_factor() -> f64 {
        0.7 + rand_jitter_ms(400) as f64 / 1000.0
    }
}

/// Page metrics used to decide whether a scroll revealed anything.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct PageMetrics {
    height: f64,
    articles: f64,
}

const METRICS_SCRIPT: &str =
    "({ height: document.body.scrollHeight, articles: document.querySelectorAll('article').length })";

/// Headless-browser message source using Chromium via the Chrome DevTools Protocol.
///
/// Opens one tab on the target timeline and keeps it for the whole run.
/// A capture reads the rendered DOM. A scroll moves the viewport down and
/// waits for lazy-loaded posts.
pub struct BrowserSource {
    // Held so the Chromium process lives as long as the page.
    _browser: Browser,
    page: Page,
    parser: HtmlBlockParser,
    pacing: ScrollPacing,
}

impl BrowserSource {
    /// Launch headless Chromium and open `url`, waiting at most
    /// `navigation_timeout` for the first render.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH`,
    /// `$CHROME_BIN`, or one of the usual install locations.
    pub async fn launch(
        url: &str,
        parser: HtmlBlockParser,
        pacing: ScrollPacing,
        navigation_timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags (--headless, --disable-gpu, …).
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--window-size=1280,2000")
            .build()
            .map_err(|e| AppError::SourceUnavailable(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        tracing::info!("Navigating to {}", url);
        let page = tokio::time::timeout(navigation_timeout, async {
            let page = browser.new_page(url).await.map_err(|e| {
                AppError::SourceUnavailable(format!("Failed to navigate to {url}: {e}"))
            })?;
            page.find_element("body").await.map_err(|e| {
                AppError::SourceUnavailable(format!("Page did not render body: {e}"))
            })?;
            Ok::<Page, AppError>(page)
        })
        .await
        .map_err(|_| AppError::Timeout(navigation_timeout.as_secs()))??;

        let wait = pacing.initial();
        tracing::info!("Waiting {:.2} seconds for page to load...", wait.as_secs_f64());
        tokio::time::sleep(wait).await;

        Ok(Self {
            _browser: browser,
            page,
            parser,
            pacing,
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// `$CHROME_BIN` wins. Otherwise the snap-internal binary is checked
    /// before the usual system paths. `None` lets `chromiumoxide` do its own
    /// lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn metrics(&self) -> Result<PageMetrics, AppError> {
        self.page
            .evaluate(METRICS_SCRIPT)
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to read page metrics: {e}")))?
            .into_value::<PageMetrics>()
            .map_err(|e| AppError::SourceUnavailable(format!("Unexpected page metrics: {e}")))
    }
}

impl MessageSource for BrowserSource {
    async fn capture_visible_blocks(&self) -> Result<Vec<RawBlock>, AppError> {
        let html = self
            .page
            .content()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to read page content: {e}")))?;
        Ok(self.parser.parse(&html))
    }

    async fn scroll_further(&self) -> Result<bool, AppError> {
        let before = self.metrics().await?;

        let script = format!(
            "window.scrollBy({{ top: window.innerHeight * {:.3}, left: 0, behavior: 'smooth' }})",
            ScrollPacing::scroll_factor()
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to scroll: {e}")))?;

        tokio::time::sleep(self.pacing.between_scrolls()).await;

        let after = self.metrics().await?;
        let loaded = after.height > before.height || after.articles != before.articles;
        tracing::debug!(?before, ?after, %loaded, "Scroll settled");
        Ok(loaded)
    }

    async fn reload(&self) -> Result<(), AppError> {
        self.page
            .reload()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to reload page: {e}")))?;
        tokio::time::sleep(self.pacing.initial()).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Jitter based on std; avoids pulling in the `rand` crate.
// Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
