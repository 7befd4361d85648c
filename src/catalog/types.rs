use serde::Deserialize;

use crate::store::{RemotePage, RemoteTitle};

// ============================================================================
// Wire Types
// ============================================================================

/// One page of the catalog API's paged-list JSON shape.
///
/// `page`/`total_pages` drive the derived adjacent-page tokens; items the
/// server pads with nulls decode through the `Option` fields.
#[derive(Debug, Deserialize)]
pub(crate) struct WirePage {
    pub page: i64,
    pub total_pages: i64,
    #[serde(default)]
    pub results: Vec<WireTitle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTitle {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub popularity: f64,
}

impl WirePage {
    /// Convert to the store's page shape, deriving prev/next tokens from the
    /// page counters. `None` marks the corresponding edge of the list.
    pub(crate) fn into_remote_page(self) -> RemotePage {
        let prev_page = (self.page > 1).then(|| self.page - 1);
        let next_page = (self.page < self.total_pages).then(|| self.page + 1);

        RemotePage {
            titles: self
                .results
                .into_iter()
                .map(|t| RemoteTitle {
                    id: t.id,
                    title: t.title,
                    overview: t.overview,
                    poster_path: t.poster_path,
                    release_date: t.release_date,
                    vote_average: t.vote_average,
                    popularity: t.popularity,
                })
                .collect(),
            prev_page,
            next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_no_prev() {
        let wire = WirePage {
            page: 1,
            total_pages: 3,
            results: vec![],
        };
        let page = wire.into_remote_page();
        assert_eq!(page.prev_page, None);
        assert_eq!(page.next_page, Some(2));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let wire = WirePage {
            page: 3,
            total_pages: 3,
            results: vec![],
        };
        let page = wire.into_remote_page();
        assert_eq!(page.prev_page, Some(2));
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_single_page_list_is_terminal_both_ways() {
        let wire = WirePage {
            page: 1,
            total_pages: 1,
            results: vec![],
        };
        let page = wire.into_remote_page();
        assert_eq!(page.prev_page, None);
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_decode_tolerates_missing_optionals() {
        let json = r#"{
            "page": 1,
            "total_pages": 1,
            "results": [{"id": 7, "title": "Solaris"}]
        }"#;
        let wire: WirePage = serde_json::from_str(json).unwrap();
        let page = wire.into_remote_page();
        assert_eq!(page.titles.len(), 1);
        assert_eq!(page.titles[0].id, 7);
        assert!(page.titles[0].overview.is_none());
        assert_eq!(page.titles[0].vote_average, 0.0);
    }
}
