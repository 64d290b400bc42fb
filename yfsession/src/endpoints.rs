//! Endpoint catalog: URL templates, hosts and parameter rules.

use std::collections::BTreeMap;

use yfsession_core::{ApiHosts, HttpRequest, YfError};

/// Largest number of symbols sent in one multi-symbol request.
pub const MAX_SYMBOLS_PER_REQUEST: usize = 50;

/// Which API host serves an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// `query1`
    Query1,
    /// `query2`
    Query2,
}

/// Splits one list-valued parameter over several requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Parameter holding the list.
    pub param: &'static str,
    /// Separator used both to read and to rejoin the list.
    pub separator: char,
    /// Items per request.
    pub chunk_size: usize,
}

/// Known upstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Per-symbol module bundle (`/v10/finance/quoteSummary/{symbol}`).
    QuoteSummary,
    /// Multi-symbol quote snapshot (`/v7/finance/quote`).
    Quote,
    /// Price history (`/v8/finance/chart/{symbol}`).
    Chart,
    /// Symbol and news search (`/v1/finance/search`).
    Search,
    /// Option chain (`/v7/finance/options/{symbol}`).
    Options,
}

/// Parameters for one endpoint call, including path parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a parameter only when a value is given.
    #[must_use]
    pub fn set_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Current value of a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl Endpoint {
    /// Path template; `{name}` segments are filled from the parameters.
    #[must_use]
    pub const fn path_template(self) -> &'static str {
        match self {
            Self::QuoteSummary => "/v10/finance/quoteSummary/{symbol}",
            Self::Quote => "/v7/finance/quote",
            Self::Chart => "/v8/finance/chart/{symbol}",
            Self::Search => "/v1/finance/search",
            Self::Options => "/v7/finance/options/{symbol}",
        }
    }

    /// Serving host.
    #[must_use]
    pub const fn host(self) -> Host {
        match self {
            Self::Quote => Host::Query1,
            Self::QuoteSummary | Self::Chart | Self::Search | Self::Options => Host::Query2,
        }
    }

    /// Parameters that must be present (path parameters included).
    #[must_use]
    pub const fn required(self) -> &'static [&'static str] {
        match self {
            Self::QuoteSummary => &["symbol", "modules"],
            Self::Quote => &["symbols"],
            Self::Chart | Self::Options => &["symbol"],
            Self::Search => &["q"],
        }
    }

    /// Query defaults applied when the caller does not set them.
    #[must_use]
    pub const fn defaults(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::QuoteSummary => &[("formatted", "false"), ("corsDomain", "finance.yahoo.com")],
            Self::Quote => &[("formatted", "false")],
            Self::Chart => &[
                ("range", "1mo"),
                ("interval", "1d"),
                ("includePrePost", "false"),
                ("events", "div|split"),
            ],
            Self::Search => &[("quotesCount", "10"), ("newsCount", "0"), ("enableFuzzyQuery", "false")],
            Self::Options => &[],
        }
    }

    /// Whether the call must carry the crumb.
    #[must_use]
    pub const fn needs_token(self) -> bool {
        matches!(self, Self::QuoteSummary | Self::Quote | Self::Options)
    }

    /// Multi-value splitting rule, if any.
    #[must_use]
    pub const fn fan_out(self) -> Option<FanOut> {
        match self {
            Self::Quote => Some(FanOut {
                param: "symbols",
                separator: ',',
                chunk_size: MAX_SYMBOLS_PER_REQUEST,
            }),
            _ => None,
        }
    }

    /// Build the GET request(s) for this endpoint. Fan-out endpoints yield one
    /// request per chunk, in input order; everything else yields exactly one.
    ///
    /// # Errors
    /// Returns `InvalidArg` when a required parameter is missing or empty.
    pub fn requests(self, hosts: &ApiHosts, params: &Params) -> Result<Vec<HttpRequest>, YfError> {
        for key in self.required() {
            if params.get(key).is_none_or(|v| v.trim().is_empty()) {
                return Err(YfError::invalid_arg(format!("{self:?}: missing required parameter `{key}`")));
            }
        }

        let base = match self.host() {
            Host::Query1 => hosts.query1.trim_end_matches('/'),
            Host::Query2 => hosts.query2.trim_end_matches('/'),
        };

        let mut path = self.path_template().to_string();
        let mut query: BTreeMap<&str, &str> = BTreeMap::new();
        for (k, v) in self.defaults() {
            query.insert(k, v);
        }
        for (k, v) in &params.0 {
            let placeholder = format!("{{{k}}}");
            if path.contains(&placeholder) {
                let encoded: String = url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
                path = path.replace(&placeholder, &encoded);
            } else {
                query.insert(k, v);
            }
        }
        let url = format!("{base}{path}");

        let Some(fan) = self.fan_out() else {
            return Ok(vec![HttpRequest::get(url).with_query(query)]);
        };

        let items: Vec<&str> = query
            .get(fan.param)
            .copied()
            .unwrap_or_default()
            .split(fan.separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let sep = fan.separator.to_string();
        Ok(items
            .chunks(fan.chunk_size)
            .map(|chunk| {
                let joined = chunk.join(sep.as_str());
                let q = query
                    .iter()
                    .map(|(k, v)| if *k == fan.param { (*k, joined.as_str()) } else { (*k, *v) });
                HttpRequest::get(url.clone()).with_query(q)
            })
            .collect())
    }
}
