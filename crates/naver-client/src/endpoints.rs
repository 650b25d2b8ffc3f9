use analysis_core::Market;

pub const FINANCE_BASE_URL: &str = "https://finance.naver.com";
pub const COMPANY_INFO_BASE_URL: &str = "https://comp.wisereport.co.kr";

/// URL catalog for the listing pages the collectors walk
#[derive(Debug, Clone)]
pub struct NaverEndpoints {
    pub finance_base: String,
    pub company_info_base: String,
}

impl Default for NaverEndpoints {
    fn default() -> Self {
        Self {
            finance_base: FINANCE_BASE_URL.to_string(),
            company_info_base: COMPANY_INFO_BASE_URL.to_string(),
        }
    }
}

impl NaverEndpoints {
    /// Market-cap ranking listing (served as EUC-KR)
    pub fn ranking_url(&self, market: Market, page: u32) -> String {
        format!(
            "{}/sise/sise_market_sum.naver?sosok={}&page={}",
            self.finance_base,
            market.listing_code(),
            page
        )
    }

    /// Reverse-chronological daily price listing
    pub fn day_prices_url(&self, code: &str, page: u32) -> String {
        format!("{}/item/sise_day.naver?code={}&page={}", self.finance_base, code, page)
    }

    /// Company overview carrying the share count / float ratio field
    pub fn company_info_url(&self, code: &str) -> String {
        format!("{}/company/c1010001.aspx?cmp_cd={}", self.company_info_base, code)
    }
}
