use serde::{Deserialize, Serialize};

use crate::{
    constants::{MAX_PAGE_SIZE, PAGE_SIZE},
    error::{Error, HtmlError},
};

use super::form::Form;

/// Requested page plus the request path and query it came from, used to build links.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    path: String,
    form: Form,
}

impl PageRequest {
    /// Reads `page` and `limit`; `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn from_form(path: &str, form: &Form) -> Result<Self, Error> {
        let page = form.get_number::<i64>("page")?.unwrap_or(1);
        if page < 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }
        let limit = form
            .get_number::<i64>("limit")?
            .map(|limit| limit.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(PAGE_SIZE);
        if page.checked_sub(1).and_then(|p| p.checked_mul(limit)).is_none() {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }

        Ok(Self {
            page,
            limit,
            path: path.to_string(),
            form: form.clone(),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Page 1 is linked without a `page` parameter.
    fn link(&self, page: i64) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.form.encode_without("page") {
            serializer.append_pair(&key, &value);
        }
        if page > 1 {
            serializer.append_pair("page", &page.to_string());
        }

        let query = serializer.finish();
        if query.is_empty() {
            self.path.to_owned()
        } else {
            format!("{}?{query}", self.path)
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: &PageRequest) -> Result<Self, Error> {
        if rows.is_empty() {
            if request.page > 1 {
                return Err(HtmlError::NotFound.new("Invalid page."));
            }
            return Ok(Self::no_rows());
        }

        let next = (request.offset().saturating_add(request.limit) < total_rows)
            .then(|| request.link(request.page + 1));
        let previous = (request.page > 1).then(|| request.link(request.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn request_defaults_and_clamps() {
        let request = PageRequest::from_form("/api/users/", &form(&[])).unwrap();
        assert_eq!((request.page, request.limit), (1, PAGE_SIZE));

        let request =
            PageRequest::from_form("/api/users/", &form(&[("page", "3"), ("limit", "1000")]))
                .unwrap();
        assert_eq!(request.limit, MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 2 * MAX_PAGE_SIZE);

        let request = PageRequest::from_form("/api/users/", &form(&[("limit", "0")])).unwrap();
        assert_eq!(request.limit, 1);
    }

    #[test]
    fn request_rejects_page_zero() {
        let err = PageRequest::from_form("/api/users/", &form(&[("page", "0")])).unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn request_rejects_pages_past_any_offset() {
        let page = i64::MAX.to_string();
        let form = form(&[("page", page.as_str()), ("limit", "100")]);
        let err = PageRequest::from_form("/api/users/", &form).unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.info.as_deref(), Some("Invalid page."));
    }

    #[test]
    fn last_representable_page_has_no_next() {
        let page = (i64::MAX / 2 + 1).to_string();
        let request =
            PageRequest::from_form("/api/users/", &form(&[("page", page.as_str()), ("limit", "2")]))
                .unwrap();
        let context = PageContext::from_rows(vec![1], i64::MAX, &request).unwrap();
        assert!(context.next.is_none());
    }

    #[test]
    fn middle_page_links_both_ways_and_keeps_filters() {
        let form = form(&[("page", "2"), ("limit", "2"), ("tags", "lunch")]);
        let request = PageRequest::from_form("/api/recipes/", &form).unwrap();
        let page = PageContext::from_rows(vec![3, 4], 5, &request).unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?limit=2&tags=lunch&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?limit=2&tags=lunch")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let form = form(&[("page", "3"), ("limit", "2")]);
        let request = PageRequest::from_form("/api/users/", &form).unwrap();
        let page = PageContext::from_rows(vec![5], 5, &request).unwrap();

        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2&page=2"));
    }

    #[test]
    fn empty_first_page_is_valid_but_later_pages_are_not() {
        let first = PageRequest::from_form("/api/users/", &form(&[])).unwrap();
        let page = PageContext::<i32>::from_rows(vec![], 0, &first).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none() && page.previous.is_none());

        let second = PageRequest::from_form("/api/users/", &form(&[("page", "2")])).unwrap();
        let err = PageContext::<i32>::from_rows(vec![], 0, &second).unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn map_keeps_links() {
        let request = PageRequest::from_form("/api/tags/", &form(&[("limit", "1")])).unwrap();
        let page = PageContext::from_rows(vec![1], 2, &request)
            .unwrap()
            .map(|n| n * 10);
        assert_eq!(page.results, vec![10]);
        assert_eq!(page.next.as_deref(), Some("/api/tags/?limit=1&page=2"));
    }
}
