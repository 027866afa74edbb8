use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use catalog::ScrapedProduct;

/// Turns a source reference (usually a listing url) into a structured snapshot.
///
/// Recoverable fetch or parse failures are reported as `None`, never as an
/// error: the caller treats them as "nothing to ingest this cycle".
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, source_ref: &str) -> Option<ScrapedProduct>;
}

/// Scraper for listing feeds that already serve the snapshot as JSON.
///
/// Page parsing is the feed's job; this client only fetches and decodes.
#[derive(Clone)]
pub struct HttpScraper {
    http: Client,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http })
    }

    async fn fetch(&self, source_ref: &str) -> Result<ScrapedProduct, reqwest::Error> {
        let resp = self.http.get(source_ref).send().await?.error_for_status()?;
        resp.json::<ScrapedProduct>().await
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    #[instrument(skip(self), fields(source_ref = %source_ref), level = "debug")]
    async fn scrape(&self, source_ref: &str) -> Option<ScrapedProduct> {
        match self.fetch(source_ref).await {
            Ok(mut snapshot) => {
                if snapshot.url.trim().is_empty() {
                    snapshot.url = source_ref.to_string();
                }

                debug!(url = %snapshot.url, price = %snapshot.current_price, "listing scraped");
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "scrape failed; skipping this cycle");
                None
            }
        }
    }
}
