use mcat_types::FieldErrors;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Order;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound for `page`, exclusive.
pub const PAGE_LIMIT: i64 = 10_000_000;
/// Upper bound for `page_size`, exclusive.
pub const PAGE_SIZE_LIMIT: i64 = 100;
pub const MAX_TITLE_LENGTH: usize = 500;
const DEFAULT_SORT: &str = "id";

/// Validated paging and ordering of a listing.
///
/// Can only be obtained through validation, so the sort column it carries is
/// always a member of the allow-list it was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    page: u32,
    page_size: u32,
    order: Order,
}

impl Filter {
    pub fn new(
        page: i64,
        page_size: i64,
        sort: &str,
        sort_safe_list: &[&'static str],
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let filter = validate_filter(&mut errors, page, page_size, sort, sort_safe_list);
        match filter {
            Some(filter) if errors.is_valid() => Ok(filter),
            _ => Err(errors),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size.into()
    }
}

fn validate_filter(
    errors: &mut FieldErrors,
    page: i64,
    page_size: i64,
    sort: &str,
    sort_safe_list: &[&'static str],
) -> Option<Filter> {
    errors.check(page > 0, "page", "must be greater than zero");
    errors.check(page < PAGE_LIMIT, "page", "maximum is 10 million");
    errors.check(page_size > 0, "page_size", "must be greater than zero");
    errors.check(page_size < PAGE_SIZE_LIMIT, "page_size", "maximum is 100");
    let order = Order::parse(sort, sort_safe_list);
    errors.check(order.is_some(), "sort", "invalid sort value");

    Some(Filter {
        page: u32::try_from(page).ok()?,
        page_size: u32::try_from(page_size).ok()?,
        order: order?,
    })
}

/// Everything a movie listing needs: search terms plus a validated filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSearch {
    pub title: String,
    pub genres: Vec<String>,
    pub filter: Filter,
}

impl MovieSearch {
    pub fn new(title: impl Into<String>, genres: Vec<String>, filter: Filter) -> Self {
        Self {
            title: title.into(),
            genres,
            filter,
        }
    }

    pub fn all(filter: Filter) -> Self {
        Self::new("", Vec::new(), filter)
    }
}

/// Raw listing parameters as they come from a query string.
///
/// Numbers are kept as text so that malformed values end up as field errors
/// next to any other problems instead of failing the whole request early.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub title: Option<String>,
    pub genres: Option<String>,
}

impl FilterParams {
    pub fn normalize(
        self,
        sort_safe_list: &[&'static str],
        default_page_size: u32,
    ) -> Result<MovieSearch, FieldErrors> {
        let mut errors = FieldErrors::new();

        let page = parse_int(&mut errors, "page", self.page.as_deref(), 1);
        let page_size = parse_int(
            &mut errors,
            "page_size",
            self.page_size.as_deref(),
            default_page_size.into(),
        );
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_SORT,
            Some(sort) => sort,
        };
        // unparsable numbers are already recorded, use neutral values so the
        // remaining checks still run
        let filter = validate_filter(
            &mut errors,
            page.unwrap_or(1),
            page_size.unwrap_or(1),
            sort,
            sort_safe_list,
        );

        let title = self.title.unwrap_or_default().trim().to_string();
        errors.check(
            title.chars().count() <= MAX_TITLE_LENGTH,
            "title",
            "must not be more than 500 characters",
        );

        let genres = self.genres.as_deref().map(split_genres).unwrap_or_default();

        match filter {
            Some(filter) if errors.is_valid() => Ok(MovieSearch {
                title,
                genres,
                filter,
            }),
            _ => {
                debug!("Invalid listing parameters: {errors}");
                Err(errors)
            }
        }
    }
}

fn parse_int(errors: &mut FieldErrors, key: &str, raw: Option<&str>, default: i64) -> Option<i64> {
    match raw.map(str::trim) {
        None | Some("") => Some(default),
        Some(value) => match value.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                errors.add(key, "must be an integer number");
                None
            }
        },
    }
}

/// Comma separated genres, blank entries are dropped.
pub fn split_genres(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub current_page: u32,
    pub last_page: u64,
    pub total: u64,
}

impl MetaData {
    pub fn calculate(total: u64, filter: &Filter) -> Self {
        let last_page = if total == 0 {
            0
        } else {
            total.div_ceil(filter.page_size().into())
        };
        MetaData {
            current_page: filter.page(),
            last_page,
            total,
        }
    }
}
