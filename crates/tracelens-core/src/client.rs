//! Client-side timings posted back by the browser as flat form fields.
//!
//! Recognized field names:
//!
//! - `clientPerformance[timing][navigationStart]`: baseline for all other
//!   timestamps.
//! - `clientPerformance[timing][<x>Start]` and `[<x>End]`: one span `<x>`.
//! - `clientPerformance[timing][<x>]`: a point-in-time mark.
//! - `clientPerformance[navigation][redirectCount]`: redirect count.
//! - `clientProbes[<i>][n]` and `clientProbes[<i>][d]`: name and timestamp of
//!   a probe. Two probes with the same name form one span.
//!
//! Parsing is best-effort. Fields that cannot be interpreted are skipped and
//! counted, never fatal.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const TIMING_PREFIX: &str = "clientPerformance[timing][";
const NAVIGATION_START_KEY: &str = "clientPerformance[timing][navigationStart]";
const REDIRECT_COUNT_KEY: &str = "clientPerformance[navigation][redirectCount]";
const PROBES_PREFIX: &str = "clientProbes[";

/// A single browser-side timing, relative to navigation start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTimingEntry {
    /// Raw name, e.g. `domContentLoadedEvent`.
    pub name: String,
    /// Milliseconds after navigation start.
    pub start_ms: i64,
    /// Span length in milliseconds; `None` for marks and unterminated spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl ClientTimingEntry {
    fn new(name: impl Into<String>, start_ms: i64) -> Self {
        Self {
            name: name.into(),
            start_ms,
            duration_ms: None,
        }
    }

    /// Human-readable name: `domContentLoadedEvent` becomes
    /// `Dom Content Loaded Event`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 4);
        for (i, c) in self.name.chars().enumerate() {
            if i == 0 {
                out.extend(c.to_uppercase());
            } else {
                if c.is_uppercase() {
                    out.push(' ');
                }
                out.push(c);
            }
        }
        out
    }
}

/// Structured client timings, in the order their fields were posted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTimings {
    /// Number of redirects before the page loaded.
    #[serde(default)]
    pub redirect_count: u32,
    /// Parsed entries.
    #[serde(default)]
    pub entries: Vec<ClientTimingEntry>,
    /// Fields that could not be interpreted.
    #[serde(skip)]
    pub skipped: usize,
}

impl ClientTimings {
    /// Build from flat form fields.
    ///
    /// Duplicate keys keep the position of their first occurrence and the
    /// value of their last.
    pub fn from_form<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let form: IndexMap<String, String> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        let baseline = form
            .get(NAVIGATION_START_KEY)
            .and_then(|value| parse_millis(value))
            .unwrap_or(0);

        let mut builder = Builder::new(baseline);
        for (key, value) in &form {
            match parse_field(key, value) {
                Ok(field) => builder.apply(field),
                Err(err) => {
                    debug!(%err, "Skipping client timing field");
                    builder.skipped += 1;
                }
            }
        }
        builder.finish()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up an entry by raw name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClientTimingEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Parse flat form fields posted by the browser.
pub fn parse_client_timings<I, K, V>(fields: I) -> ClientTimings
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    ClientTimings::from_form(fields)
}

/// Why a posted field was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientFieldError {
    #[error("unrecognized field `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("invalid probe index in `{0}`")]
    InvalidProbe(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientField<'a> {
    NavigationStart,
    RedirectCount(u32),
    Mark { name: &'a str, at: i64 },
    SpanStart { name: &'a str, at: i64 },
    SpanEnd { name: &'a str, at: i64 },
    ProbeName { id: u32, name: &'a str },
    ProbeTime { id: u32, at: i64 },
}

fn parse_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i64)
    })
}

fn parse_field<'a>(key: &'a str, value: &'a str) -> Result<ClientField<'a>, ClientFieldError> {
    let invalid_value = || ClientFieldError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    if key == REDIRECT_COUNT_KEY {
        return value
            .trim()
            .parse()
            .map(ClientField::RedirectCount)
            .map_err(|_| invalid_value());
    }

    if let Some(name) = key
        .strip_prefix(TIMING_PREFIX)
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty())
    {
        let at = parse_millis(value).ok_or_else(invalid_value)?;
        if name == "navigationStart" {
            return Ok(ClientField::NavigationStart);
        }
        return Ok(match (name.strip_suffix("Start"), name.strip_suffix("End")) {
            (Some(span), _) if !span.is_empty() => ClientField::SpanStart { name: span, at },
            (_, Some(span)) if !span.is_empty() => ClientField::SpanEnd { name: span, at },
            _ => ClientField::Mark { name, at },
        });
    }

    if let Some(rest) = key.strip_prefix(PROBES_PREFIX) {
        let (index, tail) = rest
            .split_once("][")
            .ok_or_else(|| ClientFieldError::UnknownKey(key.to_string()))?;
        let id = index
            .parse()
            .map_err(|_| ClientFieldError::InvalidProbe(key.to_string()))?;
        return match tail {
            "n]" => Ok(ClientField::ProbeName { id, name: value }),
            "d]" => parse_millis(value)
                .map(|at| ClientField::ProbeTime { id, at })
                .ok_or_else(invalid_value),
            _ => Err(ClientFieldError::UnknownKey(key.to_string())),
        };
    }

    Err(ClientFieldError::UnknownKey(key.to_string()))
}

#[derive(Default)]
struct PendingProbe<'a> {
    name: Option<&'a str>,
    at: Option<i64>,
}

struct Builder<'a> {
    baseline: i64,
    redirect_count: u32,
    entries: Vec<ClientTimingEntry>,
    /// Spans waiting for their end, by name.
    open_spans: HashMap<&'a str, usize>,
    /// Ends that arrived before their start, by name.
    early_ends: HashMap<&'a str, i64>,
    probes: HashMap<u32, PendingProbe<'a>>,
    /// Probes waiting for a partner with the same name.
    open_probes: HashMap<&'a str, usize>,
    skipped: usize,
}

impl<'a> Builder<'a> {
    fn new(baseline: i64) -> Self {
        Self {
            baseline,
            redirect_count: 0,
            entries: Vec::new(),
            open_spans: HashMap::new(),
            early_ends: HashMap::new(),
            probes: HashMap::new(),
            open_probes: HashMap::new(),
            skipped: 0,
        }
    }

    /// Offset from navigation start; non-positive offsets are irrelevant.
    fn relative(&self, at: i64) -> Option<i64> {
        Some(at.saturating_sub(self.baseline)).filter(|&offset| offset > 0)
    }

    fn apply(&mut self, field: ClientField<'a>) {
        match field {
            ClientField::NavigationStart => {}
            ClientField::RedirectCount(count) => self.redirect_count = count,
            ClientField::Mark { name, at } => {
                if let Some(start) = self.relative(at) {
                    self.entries.push(ClientTimingEntry::new(name, start));
                }
            }
            ClientField::SpanStart { name, at } => {
                let Some(start) = self.relative(at) else {
                    return;
                };
                let mut entry = ClientTimingEntry::new(name, start);
                if let Some(end) = self.early_ends.remove(name) {
                    entry.duration_ms = Some(end.saturating_sub(start));
                } else {
                    self.open_spans.insert(name, self.entries.len());
                }
                self.entries.push(entry);
            }
            ClientField::SpanEnd { name, at } => {
                let Some(end) = self.relative(at) else {
                    return;
                };
                match self.open_spans.remove(name) {
                    Some(index) => {
                        let entry = &mut self.entries[index];
                        entry.duration_ms = Some(end.saturating_sub(entry.start_ms));
                    }
                    None => {
                        self.early_ends.insert(name, end);
                    }
                }
            }
            ClientField::ProbeName { id, name } => {
                self.probes.entry(id).or_default().name = Some(name);
                self.complete_probe(id);
            }
            ClientField::ProbeTime { id, at } => {
                if let Some(at) = self.relative(at) {
                    self.probes.entry(id).or_default().at = Some(at);
                    self.complete_probe(id);
                }
            }
        }
    }

    fn complete_probe(&mut self, id: u32) {
        let Some(&PendingProbe {
            name: Some(name),
            at: Some(at),
        }) = self.probes.get(&id)
        else {
            return;
        };
        self.probes.remove(&id);

        match self.open_probes.remove(name) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.duration_ms = Some(at.saturating_sub(entry.start_ms));
            }
            None => {
                self.open_probes.insert(name, self.entries.len());
                self.entries.push(ClientTimingEntry::new(name, at));
            }
        }
    }

    fn finish(self) -> ClientTimings {
        // Probes only count in pairs.
        let unpaired: HashSet<usize> = self.open_probes.into_values().collect();
        let entries = self
            .entries
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !unpaired.contains(index))
            .map(|(_, entry)| entry)
            .collect();

        ClientTimings {
            redirect_count: self.redirect_count,
            entries,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(name: &str) -> String {
        format!("{TIMING_PREFIX}{name}]")
    }

    #[test]
    fn empty_form_yields_empty_timings() {
        let timings = parse_client_timings(Vec::<(String, String)>::new());
        assert!(timings.is_empty());
        assert_eq!(timings.redirect_count, 0);
        assert_eq!(timings.skipped, 0);
    }

    #[test]
    fn preserves_field_order() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "1000"),
            (timing("domLoading"), "1010"),
            (timing("responseStart"), "1005"),
            (timing("responseEnd"), "1008"),
            (timing("fetchStart"), "1002"),
        ]);

        let names: Vec<&str> = timings.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["domLoading", "response", "fetch"]);

        let response = timings.get("response").unwrap();
        assert_eq!(response.start_ms, 5);
        assert_eq!(response.duration_ms, Some(3));
        assert_eq!(timings.get("domLoading").unwrap().duration_ms, None);
        assert_eq!(timings.get("fetch").unwrap().start_ms, 2);
    }

    #[test]
    fn span_end_before_start_still_pairs() {
        let timings = parse_client_timings([
            (timing("loadEventEnd"), "1500"),
            (timing("navigationStart"), "1000"),
            (timing("loadEventStart"), "1400"),
        ]);

        assert_eq!(
            timings.entries,
            [ClientTimingEntry {
                name: "loadEvent".into(),
                start_ms: 400,
                duration_ms: Some(100),
            }]
        );
    }

    #[test]
    fn malformed_fields_are_skipped() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "1000"),
            (timing("domLoading"), "soon"),
            ("somethingElse".to_string(), "1"),
            ("clientProbes[x][n]".to_string(), "render"),
            (timing("domInteractive"), "1020"),
        ]);

        assert_eq!(timings.skipped, 3);
        assert_eq!(timings.len(), 1);
        assert_eq!(timings.entries[0].name, "domInteractive");
        assert_eq!(timings.entries[0].start_ms, 20);
    }

    #[test]
    fn non_positive_offsets_are_ignored() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "1000"),
            (timing("unloadEventStart"), "0"),
            (timing("unloadEventEnd"), "0"),
            (timing("domLoading"), "1001"),
        ]);

        assert_eq!(timings.skipped, 0);
        let names: Vec<&str> = timings.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["domLoading"]);
    }

    #[test]
    fn probes_pair_by_name() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "1000"),
            ("clientProbes[0][n]".to_string(), "render"),
            ("clientProbes[0][d]".to_string(), "1100"),
            ("clientProbes[1][d]".to_string(), "1150"),
            ("clientProbes[1][n]".to_string(), "render"),
            ("clientProbes[2][n]".to_string(), "lonely"),
            ("clientProbes[2][d]".to_string(), "1200"),
        ]);

        assert_eq!(
            timings.entries,
            [ClientTimingEntry {
                name: "render".into(),
                start_ms: 100,
                duration_ms: Some(50),
            }]
        );
    }

    #[test]
    fn pairs_recorded_before_navigation_start_are_ignored() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "1000"),
            ("clientProbes[0][n]".to_string(), "early"),
            ("clientProbes[0][d]".to_string(), "500"),
            ("clientProbes[1][n]".to_string(), "early"),
            ("clientProbes[1][d]".to_string(), "600"),
        ]);

        assert!(timings.is_empty());
        assert_eq!(timings.skipped, 0);
    }

    #[test]
    fn extreme_timestamps_saturate() {
        let timings = parse_client_timings([
            (timing("navigationStart"), "-5"),
            ("clientProbes[0][n]".to_string(), "a"),
            ("clientProbes[0][d]".to_string(), "1"),
            ("clientProbes[1][n]".to_string(), "a"),
            ("clientProbes[1][d]".to_string(), "9223372036854775807"),
            (timing("loadEventStart"), "1"),
            (timing("loadEventEnd"), "9223372036854775807"),
        ]);

        let probe = timings.get("a").unwrap();
        assert_eq!(probe.start_ms, 6);
        assert_eq!(probe.duration_ms, Some(i64::MAX - 6));

        let load = timings.get("loadEvent").unwrap();
        assert_eq!(load.start_ms, 6);
        assert_eq!(load.duration_ms, Some(i64::MAX - 6));
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let timings = parse_client_timings([
            (timing("domLoading"), "1010"),
            (timing("domInteractive"), "1020"),
            (timing("domLoading"), "1030"),
        ]);

        let names: Vec<&str> = timings.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["domLoading", "domInteractive"]);
        assert_eq!(timings.entries[0].start_ms, 1030);
    }

    #[test]
    fn redirect_count_and_fractional_values() {
        let timings = parse_client_timings([
            ("clientPerformance[navigation][redirectCount]", "2"),
            ("clientPerformance[timing][navigationStart]", "1000.4"),
            ("clientPerformance[timing][firstPaint]", "1012.6"),
        ]);

        assert_eq!(timings.redirect_count, 2);
        assert_eq!(timings.entries[0].start_ms, 13);
    }

    #[test]
    fn display_name_is_sentence_cased() {
        let entry = ClientTimingEntry::new("domContentLoadedEvent", 1);
        assert_eq!(entry.display_name(), "Dom Content Loaded Event");
        assert_eq!(ClientTimingEntry::new("", 1).display_name(), "");
    }
}
