use serde::{Deserialize, Serialize};

use super::error::{Error, HtmlError};
use crate::constants::MAX_PAGE_SIZE;

const INVALID_PAGE: &str = "Invalid page.";

/// Raw query string pairs, order preserved and keys repeatable (`?tags=a&tags=b`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Parses `key` as a non-negative integer, ignoring malformed values
    pub fn get_limit(&self, key: &str) -> Option<i64> {
        self.get(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
    }

    fn with_page(&self, page: i64) -> String {
        let mut pairs: Vec<String> = self
            .pairs
            .iter()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect();

        if page > 1 {
            pairs.push(format!("page={page}"));
        }

        pairs.join("&")
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    offset: i64,
    base_url: String,
    query: Query,
}

impl PageRequest {
    pub fn from_query(query: &Query, default_limit: i64, base_url: String) -> Result<Self, Error> {
        let page = match query.get("page") {
            Some(page) => page
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| HtmlError::NotFound.new(INVALID_PAGE))?,
            None => 1,
        };

        let limit = query
            .get("limit")
            .and_then(|limit| limit.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE);

        // Pages whose offset does not fit a BIGINT can never hold rows
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| HtmlError::NotFound.new(INVALID_PAGE))?;

        Ok(Self {
            page,
            limit,
            offset,
            base_url,
            query: query.clone(),
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    fn link(&self, page: i64) -> String {
        let query = self.query.with_page(page);
        if query.is_empty() {
            return self.base_url.to_owned();
        }
        format!("{}?{}", self.base_url, query)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Builds the page from rows fetched with `LIMIT request.limit OFFSET request.offset()`.
    /// An empty page past the first one is an invalid page.
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: &PageRequest) -> Result<Self, Error> {
        if rows.is_empty() && request.page > 1 {
            return Err(HtmlError::NotFound.new(INVALID_PAGE));
        }

        let has_next = request.offset().saturating_add(rows.len() as i64) < total_rows;
        let next = has_next.then(|| request.link(request.page.saturating_add(1)));
        let previous = (request.page > 1).then(|| request.link(request.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

fn encode_component(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Query {
        Query::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn request(pairs: &[(&str, &str)]) -> PageRequest {
        PageRequest::from_query(
            &query(pairs),
            6,
            String::from("http://localhost/api/recipes/"),
        )
        .unwrap()
    }

    #[test]
    fn defaults_to_first_page() {
        let request = request(&[]);
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 6);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn malformed_limit_falls_back() {
        assert_eq!(request(&[("limit", "abc")]).limit, 6);
        assert_eq!(request(&[("limit", "0")]).limit, 6);
        assert_eq!(request(&[("limit", "3"), ("page", "2")]).offset(), 3);
    }

    #[test]
    fn invalid_page_is_not_found() {
        for page in ["0", "-1", "first"] {
            let err = PageRequest::from_query(&query(&[("page", page)]), 6, String::new())
                .unwrap_err();
            assert_eq!(err.code, 404);
        }
    }

    #[test]
    fn huge_pages_are_not_found() {
        let err = PageRequest::from_query(
            &query(&[("page", i64::MAX.to_string().as_str())]),
            6,
            String::new(),
        )
        .unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.info.as_deref(), Some("Invalid page."));

        let page = (i64::MAX / 100).to_string();
        let request = request(&[("page", page.as_str()), ("limit", "100")]);
        assert_eq!(request.offset(), (i64::MAX / 100 - 1) * 100);
        assert!(Page::<i32>::from_rows(vec![], 3, &request).is_err());
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(request(&[("limit", "1000000")]).limit, MAX_PAGE_SIZE);
        assert_eq!(
            request(&[("limit", i64::MAX.to_string().as_str())]).limit,
            MAX_PAGE_SIZE
        );
    }

    #[test]
    fn links_keep_filters() {
        let request = request(&[("tags", "lunch"), ("page", "2"), ("limit", "2")]);
        let page = Page::from_rows(vec![3, 4], 5, &request).unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost/api/recipes/?tags=lunch&limit=2&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://localhost/api/recipes/?tags=lunch&limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let request = request(&[("page", "2"), ("limit", "3")]);
        let page = Page::from_rows(vec![4, 5], 5, &request).unwrap();

        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("http://localhost/api/recipes/?limit=3")
        );
    }

    #[test]
    fn empty_first_page_is_valid() {
        let page: Page<i32> = Page::from_rows(vec![], 0, &request(&[])).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none() && page.previous.is_none());

        let err = Page::<i32>::from_rows(vec![], 0, &request(&[("page", "3")])).unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn repeated_keys_are_kept() {
        let query = query(&[("tags", "a"), ("tags", "b c")]);
        assert_eq!(query.get_all("tags"), vec!["a", "b c"]);
        assert_eq!(query.with_page(2), "tags=a&tags=b%20c&page=2");
    }
}
