use futures::future::join_all;
use serde_json::{Map, Value};

use yfsession_core::{HttpRequest, YfError};

use crate::endpoints::{Endpoint, Params};
use crate::reshape::{self, Candle};
use crate::session::{RequestOptions, Session};

/// Fields reported as epoch seconds in quote snapshots.
const QUOTE_TIME_FIELDS: &[&str] = &[
    "regularMarketTime",
    "postMarketTime",
    "preMarketTime",
    "dividendDate",
    "earningsTimestamp",
];

/// Typed entry points over a [`Session`].
///
/// An error envelope inside a `200` body becomes [`YfError::Api`] after the
/// session has already returned, so it is reported as-is: no token refresh
/// and no retry, even when its code is `Unauthorized`.
#[derive(Debug, Clone)]
pub struct YfClient {
    session: Session,
}

impl YfClient {
    /// Wrap an existing session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    fn options_for(&self, endpoint: Endpoint) -> RequestOptions {
        let cfg = self.session.config();
        let opts = RequestOptions::new()
            .query("lang", cfg.lang.clone())
            .query("region", cfg.region.clone());
        if endpoint.needs_token() {
            opts
        } else {
            opts.without_token()
        }
    }

    async fn call_one(&self, endpoint: Endpoint, req: HttpRequest) -> Result<Value, YfError> {
        let resp = self.session.execute(req, self.options_for(endpoint)).await?;
        resp.json()
    }

    /// Issue every request for `endpoint` concurrently; results keep request order.
    async fn call(&self, endpoint: Endpoint, params: &Params) -> Result<Vec<Value>, YfError> {
        let requests = endpoint.requests(&self.session.config().hosts, params)?;
        join_all(requests.into_iter().map(|r| self.call_one(endpoint, r)))
            .await
            .into_iter()
            .collect()
    }

    async fn call_single(&self, endpoint: Endpoint, params: &Params) -> Result<Value, YfError> {
        self.call(endpoint, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| YfError::Data(format!("{endpoint:?}: no response")))
    }

    /// Selected quoteSummary modules for one symbol, keyed by module name.
    ///
    /// # Errors
    /// `InvalidArg` for an empty module list, `Api` for upstream error envelopes,
    /// plus any session error.
    pub async fn quote_summary(&self, symbol: &str, modules: &[&str]) -> Result<Map<String, Value>, YfError> {
        let params = Params::new()
            .set("symbol", symbol)
            .set("modules", modules.join(","));
        reshape::flatten_modules(self.call_single(Endpoint::QuoteSummary, &params).await?)
    }

    /// Quote snapshots for many symbols, in response order per chunk.
    ///
    /// Symbols are sent in chunks of at most
    /// [`MAX_SYMBOLS_PER_REQUEST`](crate::endpoints::MAX_SYMBOLS_PER_REQUEST),
    /// all chunks in flight at once.
    ///
    /// # Errors
    /// `InvalidArg` for an empty symbol list; the first failing chunk's error otherwise.
    pub async fn quotes(&self, symbols: &[&str]) -> Result<Vec<Value>, YfError> {
        let params = Params::new().set("symbols", symbols.join(","));
        let mut out = Vec::with_capacity(symbols.len());
        for page in self.call(Endpoint::Quote, &params).await? {
            let result = reshape::unwrap_result(page, "quoteResponse")?;
            if let Value::Array(items) = result {
                out.extend(items.into_iter().map(|mut q| {
                    reshape::epoch_to_rfc3339(&mut q, QUOTE_TIME_FIELDS);
                    q
                }));
            }
        }
        Ok(out)
    }

    /// Price bars for `symbol` (`range` like `"1mo"`, `interval` like `"1d"`).
    ///
    /// # Errors
    /// `Api` for upstream error envelopes, `Data` for a malformed chart, plus any session error.
    pub async fn chart(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Candle>, YfError> {
        let params = Params::new()
            .set("symbol", symbol)
            .set("range", range)
            .set("interval", interval);
        reshape::chart_candles(self.call_single(Endpoint::Chart, &params).await?)
    }

    /// Raw search response with value envelopes unwrapped.
    ///
    /// # Errors
    /// `InvalidArg` for an empty query, plus any session error.
    pub async fn search(&self, query: &str) -> Result<Value, YfError> {
        let params = Params::new().set("q", query);
        Ok(reshape::unwrap_raw(self.call_single(Endpoint::Search, &params).await?))
    }

    /// Option chain for `symbol`, optionally for one expiration (epoch seconds).
    ///
    /// # Errors
    /// `Api` for upstream error envelopes, `Data` when there is no result, plus any session error.
    pub async fn options(&self, symbol: &str, expiration: Option<i64>) -> Result<Value, YfError> {
        let params = Params::new()
            .set("symbol", symbol)
            .set_opt("date", expiration.map(|d| d.to_string()));
        let result = reshape::unwrap_result(self.call_single(Endpoint::Options, &params).await?, "optionChain")?;
        match result {
            Value::Array(mut items) if !items.is_empty() => Ok(reshape::unwrap_raw(items.swap_remove(0))),
            _ => Err(YfError::Data(format!("optionChain: no result for {symbol}"))),
        }
    }
}
