use serde::Deserialize;

/// Pagination window for list endpoints. Query parameters are 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl Page {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based() {
        let page = Page {
            page: 3,
            page_size: 20,
        };
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn page_zero_clamps_to_first() {
        let page = Page {
            page: 0,
            page_size: 10,
        };
        assert_eq!(page.offset(), 0);
    }
}
