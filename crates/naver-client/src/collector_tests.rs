#[cfg(test)]
mod tests {
    use crate::history::StopReason;
    use crate::{HistoricalPriceCollector, NaverEndpoints, RankedSymbolCollector, SymbolMetadataFetcher};
    use analysis_core::{AnalysisWindow, Market, Page, PageEncoding, PageFetcher, ScanError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// In-memory listing source: URL -> HTML, with optional panicking URLs
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        panics: HashSet<String>,
        requests: Mutex<Vec<(String, PageEncoding)>>,
    }

    impl StaticFetcher {
        fn with_page(mut self, url: String, body: String) -> Self {
            self.pages.insert(url, body);
            self
        }

        fn with_panic(mut self, url: String) -> Self {
            self.panics.insert(url);
            self
        }

        fn requested_urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }

        fn encodings(&self) -> Vec<PageEncoding> {
            self.requests.lock().unwrap().iter().map(|(_, e)| *e).collect()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch_page(&self, url: &str, encoding: PageEncoding) -> Result<Page, ScanError> {
            self.requests.lock().unwrap().push((url.to_string(), encoding));
            if self.panics.contains(url) {
                panic!("fixture panic for {}", url);
            }
            self.pages
                .get(url)
                .map(|body| Page {
                    url: url.to_string(),
                    body: body.clone(),
                })
                .ok_or_else(|| ScanError::FetchFailure(format!("no fixture for {}", url)))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn endpoints() -> NaverEndpoints {
        NaverEndpoints::default()
    }

    fn pager(last_page: Option<u32>) -> String {
        match last_page {
            Some(n) => format!(
                r#"<table class="Nnavi"><tr><td class="pgRR"><a href="/listing?x=1&amp;page={}">last</a></td></tr></table>"#,
                n
            ),
            None => String::new(),
        }
    }

    fn ranking_html(rows: &[(&str, &str)], last_page: Option<u32>) -> String {
        let body: String = rows
            .iter()
            .map(|(name, code)| {
                format!(
                    r#"<tr><td class="no">1</td><td><a href="/item/main.naver?code={}" class="tltle">{}</a></td><td class="number">1,000</td></tr>"#,
                    code, name
                )
            })
            .collect();
        format!(
            r#"<html><body><table class="type_2"><tbody>{}</tbody></table>{}</body></html>"#,
            body,
            pager(last_page)
        )
    }

    /// Day listing rows as (date, close, low); open and high mirror the close.
    fn day_html(rows: &[(NaiveDate, f64, f64)], last_page: Option<u32>) -> String {
        let body: String = rows
            .iter()
            .map(|(d, close, low)| {
                format!(
                    r#"<tr><td align="center"><span class="tah p10 gray03">{}</span></td><td class="num"><span>{}</span></td><td class="num"><span>0</span></td><td class="num"><span>{}</span></td><td class="num"><span>{}</span></td><td class="num"><span>{}</span></td></tr>"#,
                    d.format("%Y.%m.%d"),
                    close,
                    close,
                    close,
                    low
                )
            })
            .collect();
        format!(
            r#"<html><body><table class="type2">{}</table>{}</body></html>"#,
            body,
            pager(last_page)
        )
    }

    fn ranking_url(page: u32) -> String {
        endpoints().ranking_url(Market::Kospi, page)
    }

    fn day_url(code: &str, page: u32) -> String {
        endpoints().day_prices_url(code, page)
    }

    fn two_page_ranking() -> StaticFetcher {
        StaticFetcher::default()
            .with_page(
                ranking_url(1),
                ranking_html(
                    &[
                        ("삼성전자", "005930"),
                        ("KODEX 200", "069500"),
                        ("SK하이닉스", "000660"),
                        ("삼성전자", "005930"),
                        ("미래에셋비전스팩1호", "412930"),
                    ],
                    Some(2),
                ),
            )
            .with_page(
                ranking_url(2),
                ranking_html(
                    &[
                        ("LG에너지솔루션", "373220"),
                        ("TIGER 미국S&P500", "360750"),
                        ("현대차", "005380"),
                        ("기아", "000270"),
                    ],
                    Some(2),
                ),
            )
    }

    // ---------------------------------------------------------------
    // RankedSymbolCollector
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_ranking_collects_distinct_codes_in_order() {
        let fetcher = Arc::new(two_page_ranking());
        let collector = RankedSymbolCollector::new(fetcher.clone(), endpoints());

        let ranked = collector.collect(4, Market::Kospi).await;
        assert_eq!(ranked.codes(), vec!["005930", "000660", "373220", "005380"]);
        assert_eq!(ranked.rank_of("373220"), Some(3));
        assert_eq!(fetcher.requested_urls(), vec![ranking_url(1), ranking_url(2)]);
        assert!(fetcher.encodings().iter().all(|e| *e == PageEncoding::EucKr));
    }

    #[tokio::test]
    async fn test_ranking_stops_once_target_reached() {
        let fetcher = Arc::new(two_page_ranking());
        let collector = RankedSymbolCollector::new(fetcher.clone(), endpoints());

        let ranked = collector.collect(2, Market::Kospi).await;
        assert_eq!(ranked.codes(), vec!["005930", "000660"]);
        assert_eq!(fetcher.requested_urls(), vec![ranking_url(1)]);
    }

    #[tokio::test]
    async fn test_ranking_never_returns_excluded_names() {
        let fetcher = Arc::new(two_page_ranking());
        let collector = RankedSymbolCollector::new(fetcher, endpoints());

        let ranked = collector.collect(100, Market::Kospi).await;
        assert_eq!(ranked.len(), 5);
        for symbol in ranked.iter() {
            assert!(!collector.is_excluded(&symbol.display_name), "{} leaked", symbol.display_name);
        }
    }

    #[tokio::test]
    async fn test_ranking_extra_exclusions() {
        let fetcher = Arc::new(two_page_ranking());
        let collector = RankedSymbolCollector::new(fetcher, endpoints()).with_exclusions(vec!["현대".to_string()]);

        let ranked = collector.collect(10, Market::Kospi).await;
        assert_eq!(ranked.codes(), vec!["005930", "000660", "373220", "000270"]);
    }

    #[tokio::test]
    async fn test_ranking_fetch_failure_returns_partial() {
        let fetcher = Arc::new(StaticFetcher::default().with_page(
            ranking_url(1),
            ranking_html(&[("삼성전자", "005930"), ("SK하이닉스", "000660")], Some(3)),
        ));
        let collector = RankedSymbolCollector::new(fetcher.clone(), endpoints());

        let ranked = collector.collect(10, Market::Kospi).await;
        assert_eq!(ranked.codes(), vec!["005930", "000660"]);
        // Page 2 failed, so page 3 is never tried
        assert_eq!(fetcher.requested_urls(), vec![ranking_url(1), ranking_url(2)]);
    }

    #[tokio::test]
    async fn test_ranking_unreachable_listing_is_empty() {
        let fetcher = Arc::new(StaticFetcher::default());
        let collector = RankedSymbolCollector::new(fetcher, endpoints());

        assert!(collector.collect(10, Market::Kosdaq).await.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_without_pager_reads_single_page() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(ranking_url(1), ranking_html(&[("삼성전자", "005930")], None))
                .with_page(ranking_url(2), ranking_html(&[("현대차", "005380")], None)),
        );
        let collector = RankedSymbolCollector::new(fetcher.clone(), endpoints());

        let ranked = collector.collect(5, Market::Kospi).await;
        assert_eq!(ranked.codes(), vec!["005930"]);
        assert_eq!(fetcher.requested_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_ranking_malformed_page_stops() {
        let fetcher = Arc::new(
            StaticFetcher::default().with_page(ranking_url(1), "<html><body>점검 중</body></html>".to_string()),
        );
        let collector = RankedSymbolCollector::new(fetcher, endpoints());

        assert!(collector.collect(3, Market::Kospi).await.is_empty());
    }

    // ---------------------------------------------------------------
    // HistoricalPriceCollector
    // ---------------------------------------------------------------

    fn march_window() -> AnalysisWindow {
        AnalysisWindow::new(date(2024, 3, 1), date(2024, 3, 10))
    }

    #[tokio::test]
    async fn test_history_exits_at_window_start() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(
                    day_url("005930", 1),
                    day_html(
                        &[
                            (date(2024, 3, 12), 99.0, 99.0),
                            (date(2024, 3, 8), 10.0, 9.0),
                            (date(2024, 3, 7), 11.0, 10.0),
                        ],
                        Some(40),
                    ),
                )
                .with_page(
                    day_url("005930", 2),
                    day_html(
                        &[
                            (date(2024, 3, 6), 12.0, 11.0),
                            (date(2024, 3, 5), 13.0, 12.0),
                            (date(2024, 2, 29), 14.0, 13.0),
                        ],
                        Some(40),
                    ),
                )
                .with_page(
                    day_url("005930", 3),
                    day_html(&[(date(2024, 2, 28), 15.0, 14.0)], Some(40)),
                ),
        );
        let collector = HistoricalPriceCollector::new(fetcher.clone(), endpoints());

        let series = collector.collect("005930", march_window()).await.unwrap();
        assert_eq!(
            series.keys().copied().collect::<Vec<_>>(),
            vec![date(2024, 3, 5), date(2024, 3, 6), date(2024, 3, 7), date(2024, 3, 8)]
        );
        assert!(series.keys().all(|d| *d >= march_window().start));
        assert_eq!(fetcher.requested_urls(), vec![day_url("005930", 1), day_url("005930", 2)]);
        assert!(fetcher.encodings().iter().all(|e| *e == PageEncoding::Utf8));
    }

    #[tokio::test]
    async fn test_history_stops_on_last_page_marker() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(day_url("A", 1), day_html(&[(date(2024, 3, 8), 10.0, 9.0)], Some(1)))
                .with_page(day_url("A", 2), day_html(&[(date(2024, 3, 7), 10.0, 9.0)], Some(1))),
        );
        let collector = HistoricalPriceCollector::new(fetcher.clone(), endpoints());

        let series = collector.collect("A", march_window()).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(fetcher.requested_urls(), vec![day_url("A", 1)]);
    }

    #[tokio::test]
    async fn test_history_stops_on_empty_page() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(day_url("A", 1), day_html(&[(date(2024, 3, 8), 10.0, 9.0)], None))
                .with_page(day_url("A", 2), day_html(&[], None))
                .with_page(day_url("A", 3), day_html(&[(date(2024, 3, 6), 10.0, 9.0)], None)),
        );
        let collector = HistoricalPriceCollector::new(fetcher.clone(), endpoints());

        let series = collector.collect("A", march_window()).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(fetcher.requested_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_history_stops_on_repeated_page() {
        let echoed = day_html(&[(date(2024, 3, 8), 10.0, 9.0), (date(2024, 3, 7), 10.0, 9.0)], None);
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(day_url("A", 1), echoed.clone())
                .with_page(day_url("A", 2), echoed),
        );
        let collector = HistoricalPriceCollector::new(fetcher.clone(), endpoints());

        let series = collector.collect("A", march_window()).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(fetcher.requested_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_history_first_page_failure_is_error() {
        let fetcher = Arc::new(StaticFetcher::default());
        let collector = HistoricalPriceCollector::new(fetcher, endpoints());

        let err = collector.collect("A", march_window()).await.unwrap_err();
        assert!(matches!(err, ScanError::FetchFailure(_)));
    }

    #[tokio::test]
    async fn test_history_later_page_failure_keeps_rows() {
        let fetcher = Arc::new(
            StaticFetcher::default().with_page(day_url("A", 1), day_html(&[(date(2024, 3, 8), 10.0, 9.0)], Some(9))),
        );
        let collector = HistoricalPriceCollector::new(fetcher, endpoints());

        let series = collector.collect("A", march_window()).await.unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_stop_reason_is_comparable() {
        assert_ne!(StopReason::LastPage, StopReason::EmptyPage);
    }

    fn multi_symbol_fetcher(codes: &[&str]) -> StaticFetcher {
        let mut fetcher = StaticFetcher::default();
        for (i, code) in codes.iter().enumerate() {
            let base = 100.0 + i as f64;
            fetcher = fetcher
                .with_page(
                    day_url(code, 1),
                    day_html(&[(date(2024, 3, 9), base, base - 1.0), (date(2024, 3, 8), base + 1.0, base - 2.0)], None),
                )
                .with_page(
                    day_url(code, 2),
                    day_html(&[(date(2024, 3, 4), base + 2.0, base - 3.0), (date(2024, 2, 27), 1.0, 1.0)], None),
                );
        }
        fetcher
    }

    #[tokio::test]
    async fn test_collect_many_isolates_failures() {
        let fetcher = multi_symbol_fetcher(&["GOOD"])
            .with_panic(day_url("BOOM", 1))
            .with_page(day_url("STALE", 1), day_html(&[(date(2023, 1, 2), 5.0, 5.0)], None));
        let collector = HistoricalPriceCollector::new(Arc::new(fetcher), endpoints());

        let codes: Vec<String> = ["GOOD", "MISSING", "BOOM", "STALE"].iter().map(|s| s.to_string()).collect();
        let results = collector.collect_many(&codes, march_window()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results["GOOD"].len(), 3);
    }

    #[tokio::test]
    async fn test_collect_many_is_concurrency_independent() {
        let codes = ["A", "B", "C", "D", "E", "F"];
        let owned: Vec<String> = codes.iter().map(|s| s.to_string()).collect();

        let sequential = HistoricalPriceCollector::new(Arc::new(multi_symbol_fetcher(&codes)), endpoints())
            .with_concurrency(1)
            .collect_many(&owned, march_window())
            .await;
        let pooled = HistoricalPriceCollector::new(Arc::new(multi_symbol_fetcher(&codes)), endpoints())
            .with_concurrency(4)
            .collect_many(&owned, march_window())
            .await;

        assert_eq!(sequential.len(), codes.len());
        assert_eq!(sequential, pooled);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let collector = HistoricalPriceCollector::new(Arc::new(StaticFetcher::default()), endpoints()).with_concurrency(0);
        assert_eq!(collector.concurrency(), 1);
    }

    // ---------------------------------------------------------------
    // SymbolMetadataFetcher
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_metadata_is_best_effort() {
        let info = |body: &str| format!(r#"<table><tr><th>발행주식수/유동주식비율</th><td>{}</td></tr></table>"#, body);
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(endpoints().company_info_url("005930"), info("5,969,782,550주 / 75.84%"))
                .with_page(endpoints().company_info_url("000660"), info("정보 없음")),
        );
        let metadata = SymbolMetadataFetcher::new(fetcher.clone(), endpoints());

        let codes: Vec<String> = ["005930", "000660", "373220"].iter().map(|s| s.to_string()).collect();
        let results = metadata.fetch_all(&codes).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results["005930"].outstanding_shares, 5_969_782_550);
        // Sequential: one request per symbol in input order
        assert_eq!(
            fetcher.requested_urls(),
            codes.iter().map(|c| endpoints().company_info_url(c)).collect::<Vec<_>>()
        );
    }
}
