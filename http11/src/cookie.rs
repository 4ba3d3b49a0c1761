//! A minimal cookie jar: path-prefix relevance matching and the
//! descending-path-length sort order used when composing a `Cookie:`
//! request header (more specific paths are listed first).

use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct Cookie {
    pub key: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            key: key.into(),
            value: value.into(),
            path: None,
            domain: None,
            expires: None,
            http_only: false,
        }
    }

    pub fn as_header(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    fn same_identity(&self, other: &Cookie) -> bool {
        self.key == other.key && self.path == other.path && self.domain == other.domain
    }

    /// Whether this cookie should be sent for a request to `path`: not
    /// expired, and either path-less (applies everywhere), a request for
    /// `/`, or `path` is prefixed by this cookie's own path.
    pub fn is_relevant(&self, path: &str) -> bool {
        if let Some(expires) = self.expires {
            if expires < Utc::now() {
                return false;
            }
        }
        match &self.path {
            None => true,
            Some(_) if path == "/" => true,
            Some(p) => path.len() >= p.len() && path[..p.len()].eq_ignore_ascii_case(p),
        }
    }

    fn path_len(&self) -> usize {
        self.path.as_deref().map(str::len).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    pub fn add(&mut self, cookie: Cookie) {
        if let Some(existing) = self
            .cookies
            .iter_mut()
            .find(|c| c.same_identity(&cookie))
        {
            *existing = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }

    /// Parse one `Set-Cookie:` header value into this jar.
    pub fn parse_set_cookie(&mut self, header: &str) {
        let mut parts = header.split(';').map(str::trim);
        let first = match parts.next() {
            Some(p) => p,
            None => return,
        };
        let mut eq = first.splitn(2, '=');
        let key = match eq.next() {
            Some(k) => k,
            None => return,
        };
        let value = eq.next().unwrap_or("");
        let mut cookie = Cookie::new(key, value);
        for attr in parts {
            if attr.eq_ignore_ascii_case("HttpOnly") {
                cookie.http_only = true;
                continue;
            }
            let mut kv = attr.splitn(2, '=');
            let k = match kv.next() {
                Some(k) => k,
                None => continue,
            };
            let v = kv.next().unwrap_or("").to_owned();
            match k.to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(v),
                "domain" => cookie.domain = Some(v),
                "expires" => {
                    cookie.expires =
                        DateTime::parse_from_rfc2822(&v).ok().map(|dt| dt.with_timezone(&Utc));
                }
                _ => {}
            }
        }
        self.add(cookie);
    }

    /// Build the `Cookie:` header value to send for a request to `path`,
    /// or `None` if no cookie applies.
    pub fn header_for(&self, path: &str) -> Option<String> {
        let mut matched: Vec<&Cookie> = self.cookies.iter().filter(|c| c.is_relevant(path)).collect();
        if matched.is_empty() {
            return None;
        }
        matched.sort_by(|a, b| b.path_len().cmp(&a.path_len()).then_with(|| a.key.cmp(&b.key)));
        Some(
            matched
                .iter()
                .map(|c| c.as_header())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_prefix_matching() {
        let mut jar = CookieJar::new();
        let mut c = Cookie::new("session", "abc");
        c.path = Some("/stream".to_owned());
        jar.add(c);
        assert!(jar.header_for("/stream/seg1.ts").is_some());
        assert!(jar.header_for("/other").is_none());
    }

    #[test]
    fn descending_path_length_order() {
        let mut jar = CookieJar::new();
        let mut a = Cookie::new("a", "1");
        a.path = Some("/".to_owned());
        let mut b = Cookie::new("b", "2");
        b.path = Some("/stream".to_owned());
        jar.add(a);
        jar.add(b);
        let header = jar.header_for("/stream/x").unwrap();
        assert_eq!(header, "b=2; a=1");
    }

    #[test]
    fn updating_existing_cookie_replaces_value() {
        let mut jar = CookieJar::new();
        jar.add(Cookie::new("session", "old"));
        jar.add(Cookie::new("session", "new"));
        assert_eq!(jar.get("session"), Some("new"));
    }
}
