//! Synthetic browser identities.
//!
//! The upstream is noticeably friendlier to requests that look like they come
//! from a desktop browser. A session picks one bundle at construction and
//! keeps it for its whole life so cookies and headers stay consistent.

use rand::seq::IndexedRandom;

/// A fixed header bundle imitating one desktop browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserIdentity {
    /// Short label for logs.
    pub name: &'static str,
    /// `User-Agent`.
    pub user_agent: &'static str,
    /// `Accept`.
    pub accept: &'static str,
    /// `Accept-Language`.
    pub accept_language: &'static str,
    /// `sec-ch-ua`, sent by Chromium-based browsers only.
    pub sec_ch_ua: Option<&'static str>,
    /// `sec-ch-ua-platform`, sent by Chromium-based browsers only.
    pub sec_ch_ua_platform: Option<&'static str>,
}

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Every identity a session may pick from.
pub const CATALOG: &[BrowserIdentity] = &[
    BrowserIdentity {
        name: "chrome-windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: Some("\"Chromium\";v=\"130\", \"Google Chrome\";v=\"130\", \"Not?A_Brand\";v=\"99\""),
        sec_ch_ua_platform: Some("\"Windows\""),
    },
    BrowserIdentity {
        name: "chrome-macos",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: Some("\"Chromium\";v=\"130\", \"Google Chrome\";v=\"130\", \"Not?A_Brand\";v=\"99\""),
        sec_ch_ua_platform: Some("\"macOS\""),
    },
    BrowserIdentity {
        name: "edge-windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: Some("\"Chromium\";v=\"130\", \"Microsoft Edge\";v=\"130\", \"Not?A_Brand\";v=\"99\""),
        sec_ch_ua_platform: Some("\"Windows\""),
    },
    BrowserIdentity {
        name: "firefox-windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.5",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
    },
    BrowserIdentity {
        name: "safari-macos",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
    },
];

impl BrowserIdentity {
    /// Pick one identity uniformly at random.
    #[must_use]
    pub fn random() -> &'static Self {
        CATALOG.choose(&mut rand::rng()).unwrap_or(&CATALOG[0])
    }

    /// Look an identity up by its label.
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static Self> {
        CATALOG.iter().find(|b| b.name == name)
    }

    /// Header pairs to send with every request.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        let mut out = vec![
            ("user-agent", self.user_agent),
            ("accept", self.accept),
            ("accept-language", self.accept_language),
        ];
        if let Some(v) = self.sec_ch_ua {
            out.push(("sec-ch-ua", v));
            out.push(("sec-ch-ua-mobile", "?0"));
        }
        if let Some(v) = self.sec_ch_ua_platform {
            out.push(("sec-ch-ua-platform", v));
        }
        out
    }
}
