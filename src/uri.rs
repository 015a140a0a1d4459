use std::collections::HashMap;
use url::Url;

/// Merges `parameters` into the query string of `url`, keeping any
/// pairs the URL already carries. A bare trailing `?` is treated the
/// same as no query at all.
pub(crate) fn append_query(url: &mut Url, parameters: &HashMap<String, String>) {
    if parameters.is_empty() {
        return;
    }
    if let Some("") = url.query() {
        url.set_query(None);
    }
    url.query_pairs_mut().extend_pairs(parameters.iter());
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(key: &str, value: &str) -> HashMap<String, String> {
        let mut parameters = HashMap::new();
        parameters.insert(key.to_string(), value.to_string());
        parameters
    }

    #[test]
    fn test_append_to_bare_url() {
        let mut url = Url::parse("http://example.com").unwrap();
        append_query(&mut url, &single("q", "x"));
        assert_eq!(url.as_str(), "http://example.com/?q=x");
    }

    #[test]
    fn test_append_to_url_with_trailing_question_mark() {
        let mut url = Url::parse("http://example.com/search?").unwrap();
        append_query(&mut url, &single("q", "x"));
        assert_eq!(url.as_str(), "http://example.com/search?q=x");
    }

    #[test]
    fn test_existing_query_is_kept() {
        let mut url = Url::parse("http://example.com/?a=1").unwrap();
        append_query(&mut url, &single("b", "2"));
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_values_are_encoded() {
        let mut url = Url::parse("http://example.com").unwrap();
        append_query(&mut url, &single("q", "hello world"));
        assert_eq!(url.query(), Some("q=hello+world"));
    }

    #[test]
    fn test_no_parameters_leaves_url_alone() {
        let mut url = Url::parse("http://example.com/search?").unwrap();
        append_query(&mut url, &HashMap::new());
        assert_eq!(url.as_str(), "http://example.com/search?");
    }
}
