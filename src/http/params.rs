//! Query and form parameters.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// One decoded request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebParameter {
    pub name: String,
    pub value: String,
    /// Came from an urlencoded request body rather than the query string.
    pub is_form: bool,
    /// Multipart file part. Always false until multipart parsing exists.
    pub is_file: bool,
    pub size: usize,
}

impl WebParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>, is_form: bool) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            size: value.len(),
            value,
            is_form,
            is_file: false,
        }
    }
}

/// Percent-decode a form component, treating `+` as a space.
pub fn url_decode(input: &str) -> String {
    let spaced: Cow<'_, str> = if input.contains('+') {
        Cow::Owned(input.replace('+', " "))
    } else {
        Cow::Borrowed(input)
    };
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Split `a=1&b=2` into parameters. Empty pairs are skipped; a bare key
/// yields an empty value.
pub fn parse_urlencoded(input: &str, is_form: bool) -> Vec<WebParameter> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            WebParameter::new(url_decode(name), url_decode(value), is_form)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world%21"), "hello world!");
        assert_eq!(url_decode("a%2Fb"), "a/b");
        assert_eq!(url_decode("plain"), "plain");
    }

    #[test]
    fn test_parse_pairs() {
        let params = parse_urlencoded("name=J%C3%BCrgen&flag&&empty=", false);
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].value, "Jürgen");
        assert_eq!(params[0].size, "Jürgen".len());
        assert_eq!(params[1], WebParameter::new("flag", "", false));
        assert_eq!(params[2].value, "");
        assert!(params.iter().all(|p| !p.is_form && !p.is_file));
    }
}
