use crate::error::ApiError;
use actix_web::HttpRequest;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Request URL with its `page` parameter replaced.
fn page_url(base_url: &str, req: &HttpRequest, page: usize) -> String {
    let mut params: Vec<&str> = req
        .query_string()
        .split('&')
        .filter(|param| !param.is_empty() && !param.starts_with("page="))
        .collect();
    let page_param = format!("page={}", page);
    params.push(&page_param);
    format!("{}{}?{}", base_url, req.path(), params.join("&"))
}

/// Page-number pagination over an already filtered and ordered list.
/// `page` is 1-based; any page past the last one, other than the first, is rejected.
pub fn paginate<T>(
    items: Vec<T>,
    page: Option<usize>,
    limit: Option<usize>,
    default_limit: usize,
    base_url: &str,
    req: &HttpRequest,
) -> Result<Page<T>, ApiError> {
    let limit = limit.filter(|limit| *limit > 0).unwrap_or(default_limit);
    let page = page.unwrap_or(1);
    let count = items.len();
    let pages = (count / limit + usize::from(count % limit != 0)).max(1);
    if page == 0 || page > pages {
        return Err(ApiError::NotFound("Неверная страница.".to_owned()));
    }
    let results = items
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect();
    Ok(Page {
        count,
        next: if page < pages {
            Some(page_url(base_url, req, page + 1))
        } else {
            None
        },
        previous: if page > 1 {
            Some(page_url(base_url, req, page - 1))
        } else {
            None
        },
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn slices_and_links_pages() {
        let req = TestRequest::get()
            .uri("/api/recipes/?author=3&page=2&limit=2")
            .to_http_request();
        let page = paginate((1..=5).collect(), Some(2), Some(2), 6, "http://host", &req).unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.results, [3, 4]);
        assert_eq!(
            page.next.as_deref(),
            Some("http://host/api/recipes/?author=3&limit=2&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://host/api/recipes/?author=3&limit=2&page=1")
        );
    }

    #[test]
    fn empty_first_page_is_allowed_but_overflow_is_not() {
        let req = TestRequest::get().uri("/api/users/").to_http_request();
        let page = paginate(Vec::<u8>::new(), None, None, 6, "", &req).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none() && page.previous.is_none());
        assert!(paginate(vec![1, 2], Some(2), None, 6, "", &req).is_err());
        assert!(paginate(vec![1, 2], Some(0), None, 6, "", &req).is_err());
    }

    #[test]
    fn huge_limit_fits_everything_on_one_page() {
        let req = TestRequest::get()
            .uri("/api/users/?limit=18446744073709551615")
            .to_http_request();
        let page = paginate(vec![1, 2, 3], None, Some(usize::MAX), 6, "", &req).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.results, [1, 2, 3]);
        assert!(page.next.is_none() && page.previous.is_none());
        assert!(paginate(vec![1, 2, 3], Some(2), Some(usize::MAX), 6, "", &req).is_err());
    }
}
