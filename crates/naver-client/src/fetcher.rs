use analysis_core::{Page, PageEncoding, PageFetcher, ScanError};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";
const ACCEPT_LANGUAGE_VALUE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

/// Request policy for [`HttpPageFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    /// Lower bound of the randomized pause before every request
    pub delay_min: Duration,
    /// Upper bound of the randomized pause before every request
    pub delay_max: Duration,
    /// Maximum requests per minute across all tasks sharing the fetcher
    pub rate_limit: usize,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
    /// Retries for 429 and 5xx responses
    pub max_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            delay_min: Duration::from_millis(200),
            delay_max: Duration::from_millis(800),
            rate_limit: 120,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
            max_retries: 2,
        }
    }
}

impl FetcherConfig {
    /// Read overrides from `NAVER_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(env_or("NAVER_TIMEOUT_SECS", defaults.timeout.as_secs())),
            delay_min: Duration::from_millis(env_or(
                "NAVER_DELAY_MIN_MS",
                defaults.delay_min.as_millis() as u64,
            )),
            delay_max: Duration::from_millis(env_or(
                "NAVER_DELAY_MAX_MS",
                defaults.delay_max.as_millis() as u64,
            )),
            rate_limit: env_or("NAVER_RATE_LIMIT", defaults.rate_limit),
            user_agent: std::env::var("NAVER_USER_AGENT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            accept_invalid_certs: env_or("NAVER_ACCEPT_INVALID_CERTS", defaults.accept_invalid_certs),
            max_retries: env_or("NAVER_MAX_RETRIES", defaults.max_retries),
        }
        .normalized()
    }

    /// Repair settings that would stall or break every request.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.timeout.is_zero() {
            tracing::warn!("Request timeout of 0s is not allowed, using {}s", defaults.timeout.as_secs());
            self.timeout = defaults.timeout;
        }
        if self.rate_limit == 0 {
            tracing::warn!("Rate limit of 0 req/min is not allowed, using {}", defaults.rate_limit);
            self.rate_limit = defaults.rate_limit;
        }
        if self.delay_min > self.delay_max {
            tracing::warn!(
                "Delay bounds reversed ({}ms > {}ms), swapping",
                self.delay_min.as_millis(),
                self.delay_max.as_millis()
            );
            std::mem::swap(&mut self.delay_min, &mut self.delay_max);
        }
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for a request slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// reqwest-backed [`PageFetcher`] with jittered pacing, a shared rate limit and
/// per-endpoint text decoding.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
    config: FetcherConfig,
    rate_limiter: RateLimiter,
}

impl HttpPageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, ScanError> {
        let config = config.normalized();

        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ScanError::FetchFailure(format!("Invalid user agent header: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ScanError::FetchFailure(format!("Cannot build HTTP client: {}", e)))?;

        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled for page fetches");
        }

        Ok(Self {
            rate_limiter: RateLimiter::new(config.rate_limit, Duration::from_secs(60)),
            client,
            config,
        })
    }

    pub fn from_env() -> Result<Self, ScanError> {
        Self::new(FetcherConfig::from_env())
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn jitter(&self) -> Duration {
        let min = self.config.delay_min.as_millis() as u64;
        let max = self.config.delay_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn describe(&self, url: &str, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("{} timed out after {}s", url, self.config.timeout.as_secs())
        } else if err.is_connect() {
            format!("{} connection failed: {}", url, err)
        } else {
            format!("{}: {}", url, err)
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Decode a response body with the encoding the endpoint is known to use.
/// Undecodable bytes become U+FFFD rather than failing the page.
pub fn decode_body(bytes: &[u8], encoding: PageEncoding) -> String {
    match encoding {
        PageEncoding::EucKr => {
            let (text, had_errors) = encoding_rs::EUC_KR.decode_without_bom_handling(bytes);
            if had_errors {
                tracing::debug!("EUC-KR body contained undecodable bytes");
            }
            text.into_owned()
        }
        PageEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str, encoding: PageEncoding) -> Result<Page, ScanError> {
        let mut attempt = 0u32;

        loop {
            tokio::time::sleep(self.jitter()).await;
            self.rate_limiter.acquire().await;

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ScanError::FetchFailure(self.describe(url, &e)))?;

            let status = response.status();
            if status.is_success() {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ScanError::FetchFailure(self.describe(url, &e)))?;
                tracing::debug!(url, bytes = bytes.len(), "Fetched page");
                return Ok(Page {
                    url: url.to_string(),
                    body: decode_body(&bytes, encoding),
                });
            }

            if is_retryable(status) && attempt < self.config.max_retries {
                attempt += 1;
                let wait = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    url,
                    "HTTP {}, waiting {}s before retry {}/{}",
                    status.as_u16(),
                    wait.as_secs(),
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return Err(ScanError::FetchFailure(format!("{} returned HTTP {}", url, status)));
        }
    }
}
