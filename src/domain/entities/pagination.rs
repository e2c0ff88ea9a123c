use serde::Deserialize;

use crate::settings::AppConfig;

/// `?page=&page_size=` as sent by clients; both optional.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl PageLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        PageLimits {
            default_size: config.default_page_size,
            max_size: config.max_page_size,
        }
    }
}

/// A resolved 1-based page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    /// Missing values take the defaults; sizes are clamped to `1..=max_size`.
    pub fn resolve(query: &PageQuery, limits: PageLimits) -> Self {
        Page {
            page: query.page.unwrap_or(1).max(1),
            page_size: query
                .page_size
                .unwrap_or(limits.default_size)
                .clamp(1, limits.max_size.max(1)),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: PageLimits = PageLimits { default_size: 20, max_size: 100 };

    #[test]
    fn defaults_apply_to_missing_values() {
        let page = Page::resolve(&PageQuery::default(), LIMITS);
        assert_eq!(page, Page { page: 1, page_size: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn sizes_are_clamped() {
        let big = Page::resolve(&PageQuery { page: Some(3), page_size: Some(500) }, LIMITS);
        assert_eq!(big.page_size, 100);
        assert_eq!(big.offset(), 200);

        let zero = Page::resolve(&PageQuery { page: Some(0), page_size: Some(0) }, LIMITS);
        assert_eq!(zero, Page { page: 1, page_size: 1 });
    }
}
