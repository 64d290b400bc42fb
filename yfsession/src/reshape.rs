//! Reshaping of raw upstream JSON into simpler values.
//!
//! The upstream wraps numbers in `{raw, fmt, longFmt}` envelopes, nests every
//! payload in `{<root>: {result, error}}`, and reports time as epoch seconds.
//! These helpers strip that away without imposing a full schema.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use yfsession_core::YfError;

const ENVELOPE_KEYS: &[&str] = &["raw", "fmt", "longFmt"];

/// Replace `{raw, fmt, longFmt}` envelopes by their `raw` value and empty
/// objects by `null`, recursively.
#[must_use]
pub fn unwrap_raw(value: Value) -> Value {
    match value {
        Value::Object(map) if map.is_empty() => Value::Null,
        Value::Object(mut map)
            if map.contains_key("raw") && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            map.remove("raw").map_or(Value::Null, unwrap_raw)
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, unwrap_raw(v))).collect()),
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_raw).collect()),
        other => other,
    }
}

/// Rewrite integer epoch seconds under any of `fields` (at any depth) as RFC 3339 UTC strings.
pub fn epoch_to_rfc3339(value: &mut Value, fields: &[&str]) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if fields.contains(&k.as_str())
                    && let Some(ts) = v.as_i64().and_then(|s| DateTime::from_timestamp(s, 0))
                {
                    *v = Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true));
                } else {
                    epoch_to_rfc3339(v, fields);
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                epoch_to_rfc3339(v, fields);
            }
        }
        _ => {}
    }
}

/// Open a `{<root>: {result, error}}` envelope.
///
/// # Errors
/// `Api` when `error` is non-null, `Data` when `root` is absent.
pub fn unwrap_result(mut value: Value, root: &str) -> Result<Value, YfError> {
    let Some(mut envelope) = value.get_mut(root).map(Value::take) else {
        return Err(YfError::Data(format!("response has no `{root}` object")));
    };
    match envelope.get("error") {
        None | Some(Value::Null) => {}
        Some(err) => {
            let field = |k: &str| err.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
            let code = field("code");
            let description = if err.is_string() {
                err.as_str().unwrap_or_default().to_string()
            } else {
                field("description")
            };
            return Err(YfError::api(code, description));
        }
    }
    Ok(envelope.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

/// First element of an array result, or `Data` when there is none.
fn first_result(result: Value, what: &str) -> Result<Value, YfError> {
    match result {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        _ => Err(YfError::Data(format!("{what}: empty result"))),
    }
}

/// `quoteSummary.result[0]` as a module map, envelopes unwrapped.
///
/// # Errors
/// `Api` for an upstream error envelope, `Data` when there is no result object.
pub fn flatten_modules(value: Value) -> Result<Map<String, Value>, YfError> {
    let first = first_result(unwrap_result(value, "quoteSummary")?, "quoteSummary")?;
    match unwrap_raw(first) {
        Value::Object(map) => Ok(map),
        _ => Err(YfError::Data("quoteSummary: result is not an object".into())),
    }
}

/// One price bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar start (UTC).
    pub ts: DateTime<Utc>,
    /// Open.
    pub open: Option<f64>,
    /// High.
    pub high: Option<f64>,
    /// Low.
    pub low: Option<f64>,
    /// Close.
    pub close: f64,
    /// Dividend/split adjusted close, when provided.
    pub adj_close: Option<f64>,
    /// Volume.
    pub volume: Option<u64>,
}

fn series<'a>(obj: Option<&'a Value>, key: &str) -> &'a [Value] {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Zip a chart result's timestamps with its OHLCV arrays. Rows without a
/// close are skipped.
///
/// # Errors
/// `Data` when the timestamp array is missing or a timestamp is out of range.
pub fn chart_rows(result: &Value) -> Result<Vec<Candle>, YfError> {
    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .ok_or_else(|| YfError::Data("chart: missing timestamp array".into()))?;
    let quote = result.pointer("/indicators/quote/0");
    let adj = result.pointer("/indicators/adjclose/0");

    let opens = series(quote, "open");
    let highs = series(quote, "high");
    let lows = series(quote, "low");
    let closes = series(quote, "close");
    let volumes = series(quote, "volume");
    let adjcloses = series(adj, "adjclose");
    let at = |s: &[Value], i: usize| s.get(i).and_then(Value::as_f64);

    let mut out = Vec::with_capacity(timestamps.len());
    for (i, t) in timestamps.iter().enumerate() {
        let Some(close) = at(closes, i) else {
            continue;
        };
        let ts = t
            .as_i64()
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .ok_or_else(|| YfError::Data(format!("chart: bad timestamp {t}")))?;
        out.push(Candle {
            ts,
            open: at(opens, i),
            high: at(highs, i),
            low: at(lows, i),
            close,
            adj_close: at(adjcloses, i),
            volume: volumes.get(i).and_then(Value::as_u64),
        });
    }
    Ok(out)
}

/// `chart.result[0]` rows.
///
/// # Errors
/// As [`unwrap_result`] and [`chart_rows`].
pub fn chart_candles(value: Value) -> Result<Vec<Candle>, YfError> {
    let first = first_result(unwrap_result(value, "chart")?, "chart")?;
    chart_rows(&first)
}
