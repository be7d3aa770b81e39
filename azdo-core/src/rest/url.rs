//! URL composition and body normalization helpers.

use crate::error::AzdoResult;
use url::Url;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Build a request URL from a base, path segments and query pairs.
///
/// Each segment is percent-encoded on its own; empty segments are dropped so
/// the result never carries `//`. Any `api-version` in `query` is discarded in
/// favour of `api_version`, which is always appended last and exactly once.
pub fn compose_url(
    base: &Url,
    segments: &[String],
    query: &[(String, String)],
    api_version: Option<&str>,
) -> AzdoResult<Url> {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        path.pop_if_empty();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            path.push(segment);
        }
    }

    let pairs: Vec<&(String, String)> = query
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("api-version"))
        .collect();

    if !pairs.is_empty() || api_version.is_some() {
        let mut qp = url.query_pairs_mut();
        for (k, v) in pairs {
            qp.append_pair(k, v);
        }
        if let Some(version) = api_version {
            qp.append_pair("api-version", version);
        }
    }
    Ok(url)
}

/// Strip a leading UTF-8 byte order mark.
pub fn trim_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(UTF8_BOM).unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_url_joins_segments() {
        let base = Url::parse("https://dev.azure.com/contoso/").unwrap();
        let url = compose_url(
            &base,
            &segs(&["proj", "_apis", "distributedtask", "environments", "7"]),
            &[],
            Some("7.0"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/contoso/proj/_apis/distributedtask/environments/7?api-version=7.0"
        );
    }

    #[test]
    fn test_compose_url_encodes_each_segment() {
        let base = Url::parse("https://dev.azure.com/contoso").unwrap();
        let url = compose_url(&base, &segs(&["My Project", "a/b", "100%"]), &[], Some("7.0")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/contoso/My%20Project/a%2Fb/100%25?api-version=7.0"
        );
    }

    #[test]
    fn test_compose_url_api_version_exactly_once() {
        let base = Url::parse("https://dev.azure.com/contoso?api-version=1.0").unwrap();
        let query = vec![
            ("api-version".to_string(), "2.0".to_string()),
            ("$depth".to_string(), "2".to_string()),
        ];
        let url = compose_url(&base, &segs(&["_apis", "projects"]), &query, Some("7.0")).unwrap();
        let s = url.as_str();
        assert_eq!(s.matches('?').count(), 1);
        assert_eq!(s.matches("api-version").count(), 1);
        assert!(s.ends_with("%24depth=2&api-version=7.0"));
    }

    #[test]
    fn test_compose_url_skips_empty_segments() {
        let base = Url::parse("https://dev.azure.com/contoso/").unwrap();
        let url = compose_url(&base, &segs(&["", "_apis", "", "projects"]), &[], Some("7.0")).unwrap();
        assert!(!url.path().contains("//"));
        assert_eq!(url.path(), "/contoso/_apis/projects");
    }

    #[test]
    fn test_trim_bom() {
        let with_bom = [0xEF, 0xBB, 0xBF, b'{', b'}'];
        assert_eq!(trim_bom(&with_bom), b"{}");
        assert_eq!(trim_bom(b"{}"), b"{}");
        assert_eq!(trim_bom(b""), b"");
    }
}
