//! Filter, search, sort, and paginate listings.
//!
//! Pure functions over a snapshot from [`ListingStore::list_all`](super::ListingStore::list_all);
//! the HTTP layer deserializes [`BrowseQuery`] straight from the query string.

use serde::{Deserialize, Serialize};

use super::{Listing, ListingStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Available,
    Reserved,
    Sold,
    /// No status filtering.
    Any,
}

impl StatusFilter {
    fn matches(self, status: ListingStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Available => status == ListingStatus::Available,
            StatusFilter::Reserved => status == ListingStatus::Reserved,
            StatusFilter::Sold => status == ListingStatus::Sold,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowseQuery {
    pub category: Option<String>,
    pub status: StatusFilter,
    /// Case-insensitive substring over title and description.
    pub q: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub seller_id: Option<String>,
    pub sort: SortOrder,
    /// 1-based; `0` is treated as `1`.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
    pub total_pages: u32,
}

pub fn browse(listings: Vec<Listing>, query: &BrowseQuery) -> Page<Listing> {
    let category = non_blank(query.category.as_deref());
    let seller = non_blank(query.seller_id.as_deref());
    let needle = non_blank(query.q.as_deref()).map(str::to_lowercase);

    let mut matched: Vec<Listing> = listings
        .into_iter()
        .filter(|l| query.status.matches(l.status))
        .filter(|l| category.is_none_or(|c| l.category == c))
        .filter(|l| seller.is_none_or(|s| l.seller_id == s))
        .filter(|l| query.min_price.is_none_or(|min| l.price_cents >= min))
        .filter(|l| query.max_price.is_none_or(|max| l.price_cents <= max))
        .filter(|l| {
            needle.as_deref().is_none_or(|n| {
                l.title.to_lowercase().contains(n) || l.description.to_lowercase().contains(n)
            })
        })
        .collect();

    match query.sort {
        SortOrder::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
        SortOrder::Oldest => matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
        SortOrder::PriceAsc => matched.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then(a.id.cmp(&b.id))),
        SortOrder::PriceDesc => matched.sort_by(|a, b| b.price_cents.cmp(&a.price_cents).then(a.id.cmp(&b.id))),
    }

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let total = matched.len();
    let total_pages = total.div_ceil(page_size as usize) as u32;

    let start = (page as usize - 1).saturating_mul(page_size as usize);
    let items = matched.into_iter().skip(start).take(page_size as usize).collect();

    Page { items, page, page_size, total, total_pages }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn listing(n: u8, title: &str, category: &str, price_cents: u64, status: ListingStatus) -> Listing {
        Listing {
            id: Uuid::from_u128(n as u128),
            title: title.into(),
            description: format!("item number {n}"),
            price_cents,
            category: category.into(),
            image_url: None,
            seller_id: if n % 2 == 0 { "even".into() } else { "odd".into() },
            created_at: Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap() + Duration::hours(n as i64),
            status,
        }
    }

    fn fixture() -> Vec<Listing> {
        use ListingStatus::*;
        vec![
            listing(1, "Linear Algebra textbook", "Books", 2500, Available),
            listing(2, "Mini fridge", "Furniture", 6000, Available),
            listing(3, "USB-C charger", "Electronics", 900, Sold),
            listing(4, "Winter jacket", "Clothing", 3000, Available),
            listing(5, "Graphing calculator", "Electronics", 4500, Reserved),
            listing(6, "Bookshelf", "Furniture", 2000, Available),
        ]
    }

    fn ids(page: &Page<Listing>) -> Vec<u128> {
        page.items.iter().map(|l| l.id.as_u128()).collect()
    }

    #[test]
    fn defaults_to_available_newest_first() {
        let page = browse(fixture(), &BrowseQuery::default());
        assert_eq!(ids(&page), vec![6, 4, 2, 1]);
        assert_eq!(page.total, 4);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn status_any_includes_everything() {
        let q = BrowseQuery { status: StatusFilter::Any, sort: SortOrder::Oldest, ..Default::default() };
        assert_eq!(ids(&browse(fixture(), &q)), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn filters_by_category_and_status() {
        let q = BrowseQuery {
            category: Some("Electronics".into()),
            status: StatusFilter::Sold,
            ..Default::default()
        };
        assert_eq!(ids(&browse(fixture(), &q)), vec![3]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let q = BrowseQuery { q: Some("BOOK".into()), ..Default::default() };
        assert_eq!(ids(&browse(fixture(), &q)), vec![6, 1]);

        let q = BrowseQuery { q: Some("number 4".into()), ..Default::default() };
        assert_eq!(ids(&browse(fixture(), &q)), vec![4]);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let q = BrowseQuery { q: Some("  ".into()), category: Some("".into()), ..Default::default() };
        assert_eq!(browse(fixture(), &q).total, 4);
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let q = BrowseQuery {
            min_price: Some(2000),
            max_price: Some(3000),
            sort: SortOrder::PriceAsc,
            ..Default::default()
        };
        assert_eq!(ids(&browse(fixture(), &q)), vec![6, 1, 4]);
    }

    #[test]
    fn price_desc_and_seller_filter() {
        let q = BrowseQuery {
            seller_id: Some("even".into()),
            sort: SortOrder::PriceDesc,
            ..Default::default()
        };
        assert_eq!(ids(&browse(fixture(), &q)), vec![2, 4, 6]);
    }

    #[test]
    fn paginates_and_reports_totals() {
        let q = BrowseQuery { page: Some(2), page_size: Some(3), ..Default::default() };
        let page = browse(fixture(), &q);
        assert_eq!(ids(&page), vec![1]);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn page_past_end_is_empty_with_totals() {
        let q = BrowseQuery { page: Some(9), page_size: Some(2), ..Default::default() };
        let page = browse(fixture(), &q);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn page_zero_and_oversized_page_size_are_clamped() {
        let q = BrowseQuery { page: Some(0), page_size: Some(10_000), ..Default::default() };
        let page = browse(fixture(), &q);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);

        let q = BrowseQuery { page_size: Some(0), ..Default::default() };
        assert_eq!(browse(fixture(), &q).page_size, 1);
    }

    #[test]
    fn empty_input_has_zero_pages() {
        let page = browse(Vec::new(), &BrowseQuery::default());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }
}
