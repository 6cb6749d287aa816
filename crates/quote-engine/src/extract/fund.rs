//! Fund page extraction.
//!
//! The page is worked through two ordered strategy lists: one for the fund
//! name, one for net-value candidates. The first name strategy that yields a
//! real name wins; for values, the first strategy that yields any candidate
//! fires and the most recent of its candidates is kept.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

use super::date::find_date;
use super::value::{find_net_value, parse_net_value};
use super::ParseOutcome;

const NET_VALUE_LABELS: [&str; 4] = ["单位净值", "unit net value", "net value", "nav"];
const ACCUMULATED_MARKERS: [&str; 3] = ["累计", "accumulated", "cumulative"];
const DATE_LABELS: [&str; 2] = ["日期", "date"];
const NAME_MARKERS: [&str; 4] = ["基金", "净值", "fund", "net value"];

/// Characters scanned before a net-value label in free text.
const WINDOW_BEFORE: usize = 80;
/// Characters scanned after a net-value label in free text.
const WINDOW_AFTER: usize = 160;
/// Characters before a label checked for an accumulated-value marker.
const EXCLUSION_LOOKBEHIND: usize = 12;

lazy_static! {
    static ref TITLE_SEPARATOR: Regex = Regex::new(r"[_|—]").expect("Invalid regex pattern");

    static ref PARENTHETICAL: Regex =
        Regex::new(r"\([^)]*\)|（[^）]*）").expect("Invalid regex pattern");

    static ref TRAILING_LABEL: Regex =
        Regex::new(r"(?i)(?:单位净值|基金净值|净值|unit net value|net value|nav)\s*$")
            .expect("Invalid regex pattern");

    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("Invalid regex pattern");

    static ref LABEL_IN_TEXT: Regex =
        Regex::new(r"(?i)单位净值|unit net value|net value|\bnav\b").expect("Invalid regex pattern");

    /// Any net-value label, accumulated variants included
    static ref NEXT_LABEL: Regex =
        Regex::new(r"(?i)单位净值|累计|accumulated|cumulative|unit net value|net value|\bnav\b")
            .expect("Invalid regex pattern");
}

/// Name used for a fund whose page did not yield a real name.
pub fn placeholder_name(code: &str) -> String {
    format!("Fund {}", code)
}

/// What the fund path recovered from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct FundSnapshot {
    pub name: String,
    pub net_value: Option<Decimal>,
    /// `None` when neither the winning candidate nor the page had a date
    pub date: Option<NaiveDate>,
    /// A real name and a positive net value were both found
    pub has_valid_data: bool,
}

impl FundSnapshot {
    /// The net value, if this snapshot is usable as the fund's price.
    pub fn accepted_net_value(&self) -> Option<Decimal> {
        self.net_value.filter(|_| self.has_valid_data)
    }
}

/// A net value found on the page, with the date it was published for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetValueCandidate {
    pub value: Decimal,
    pub date: Option<NaiveDate>,
}

/// Strategy recovering the fund name.
pub trait NameStrategy: Send + Sync {
    fn id(&self) -> &'static str;

    fn extract(&self, document: &Html) -> ParseOutcome<String>;
}

/// Strategy recovering net-value candidates.
pub trait NetValueStrategy: Send + Sync {
    fn id(&self) -> &'static str;

    fn extract(
        &self,
        document: &Html,
        page_text: &str,
        today: NaiveDate,
    ) -> ParseOutcome<Vec<NetValueCandidate>>;
}

/// Name from the text of the first qualifying element matching a selector.
pub struct ElementTextName {
    id: &'static str,
    selector: &'static str,
}

impl ElementTextName {
    pub const fn title() -> Self {
        Self {
            id: "title",
            selector: "title",
        }
    }

    pub const fn heading() -> Self {
        Self {
            id: "heading",
            selector: "h1",
        }
    }
}

impl NameStrategy for ElementTextName {
    fn id(&self) -> &'static str {
        self.id
    }

    fn extract(&self, document: &Html) -> ParseOutcome<String> {
        let selector = match Selector::parse(self.selector) {
            Ok(selector) => selector,
            Err(e) => {
                return ParseOutcome::Malformed(format!("selector {}: {:?}", self.selector, e))
            }
        };

        document
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .filter(|text| contains_any(text, &NAME_MARKERS))
            .find_map(|text| clean_name(&text))
            .map_or(ParseOutcome::NoMatch, ParseOutcome::Parsed)
    }
}

/// Net values read column-wise from tables with a net-value header.
pub struct TableValue;

impl NetValueStrategy for TableValue {
    fn id(&self) -> &'static str {
        "table"
    }

    fn extract(
        &self,
        document: &Html,
        _page_text: &str,
        today: NaiveDate,
    ) -> ParseOutcome<Vec<NetValueCandidate>> {
        let (Ok(tables), Ok(rows), Ok(cells)) = (
            Selector::parse("table"),
            Selector::parse("tr"),
            Selector::parse("th, td"),
        ) else {
            return ParseOutcome::Malformed("invalid table selectors".to_string());
        };

        let mut candidates = Vec::new();
        for table in document.select(&tables) {
            // (value column, date column) once the header row is found
            let mut columns: Option<(usize, Option<usize>)> = None;

            for row in table.select(&rows) {
                let texts: Vec<String> = row.select(&cells).map(cell_text).collect();

                let Some((value_col, date_col)) = columns else {
                    if let Some(value_col) = texts.iter().position(|t| is_value_header(t)) {
                        let date_col = texts.iter().position(|t| contains_any(t, &DATE_LABELS));
                        columns = Some((value_col, date_col));
                    }
                    continue;
                };

                let Some(value) = texts.get(value_col).and_then(|t| parse_net_value(t)) else {
                    continue;
                };
                let date = date_col
                    .and_then(|col| texts.get(col))
                    .and_then(|t| find_date(t, today))
                    .or_else(|| texts.iter().find_map(|t| find_date(t, today)));

                candidates.push(NetValueCandidate { value, date });
            }
        }

        if candidates.is_empty() {
            ParseOutcome::NoMatch
        } else {
            ParseOutcome::Parsed(candidates)
        }
    }
}

/// Net values found in a text window around each net-value label.
pub struct KeywordWindowValue;

impl NetValueStrategy for KeywordWindowValue {
    fn id(&self) -> &'static str {
        "keyword-window"
    }

    fn extract(
        &self,
        _document: &Html,
        page_text: &str,
        today: NaiveDate,
    ) -> ParseOutcome<Vec<NetValueCandidate>> {
        let mut candidates = Vec::new();

        for label in LABEL_IN_TEXT.find_iter(page_text) {
            let lookbehind = chars_before(page_text, label.start(), EXCLUSION_LOOKBEHIND);
            if contains_any(&page_text[lookbehind..label.start()], &ACCUMULATED_MARKERS) {
                continue;
            }

            let start = chars_before(page_text, label.start(), WINDOW_BEFORE);
            let end = chars_after(page_text, label.end(), WINDOW_AFTER);
            // a value belongs to the nearest preceding label
            let value_end = NEXT_LABEL
                .find(&page_text[label.end()..end])
                .map_or(end, |next| label.end() + next.start());

            let Some(value) = find_net_value(&page_text[label.end()..value_end]) else {
                continue;
            };
            let date = find_date(&page_text[start..end], today);
            candidates.push(NetValueCandidate { value, date });
        }

        if candidates.is_empty() {
            ParseOutcome::NoMatch
        } else {
            ParseOutcome::Parsed(candidates)
        }
    }
}

/// Runs the name and net-value strategies over a fund page.
pub struct FundPageExtractor {
    names: Vec<Box<dyn NameStrategy>>,
    values: Vec<Box<dyn NetValueStrategy>>,
}

impl FundPageExtractor {
    pub fn new() -> Self {
        Self::with_strategies(
            vec![
                Box::new(ElementTextName::title()),
                Box::new(ElementTextName::heading()),
            ],
            vec![Box::new(TableValue), Box::new(KeywordWindowValue)],
        )
    }

    pub fn with_strategies(
        names: Vec<Box<dyn NameStrategy>>,
        values: Vec<Box<dyn NetValueStrategy>>,
    ) -> Self {
        Self { names, values }
    }

    /// Extract a snapshot for fund `code` from its page.
    pub fn extract(&self, code: &str, html: &str, today: NaiveDate) -> FundSnapshot {
        let document = Html::parse_document(html);
        let placeholder = placeholder_name(code);

        let name = self
            .names
            .iter()
            .find_map(|strategy| match strategy.extract(&document) {
                ParseOutcome::Parsed(name) if name != placeholder => {
                    debug!("Fund {}: name from {} strategy", code, strategy.id());
                    Some(name)
                }
                ParseOutcome::Malformed(reason) => {
                    debug!("Fund {}: {} strategy failed: {}", code, strategy.id(), reason);
                    None
                }
                ParseOutcome::Parsed(_) | ParseOutcome::NoMatch => None,
            })
            .unwrap_or_else(|| placeholder.clone());

        let page_text = page_text(&document);
        let candidates = self
            .values
            .iter()
            .find_map(|strategy| match strategy.extract(&document, &page_text, today) {
                ParseOutcome::Parsed(candidates) if !candidates.is_empty() => {
                    debug!(
                        "Fund {}: {} net value candidates from {} strategy",
                        code,
                        candidates.len(),
                        strategy.id()
                    );
                    Some(candidates)
                }
                ParseOutcome::Malformed(reason) => {
                    debug!("Fund {}: {} strategy failed: {}", code, strategy.id(), reason);
                    None
                }
                ParseOutcome::Parsed(_) | ParseOutcome::NoMatch => None,
            })
            .unwrap_or_default();

        let winner = most_recent(candidates);
        let net_value = winner.as_ref().map(|c| c.value);
        let date = winner.and_then(|c| c.date.or_else(|| find_date(&page_text, today)));

        FundSnapshot {
            has_valid_data: name != placeholder
                && net_value.is_some_and(|value| value > Decimal::ZERO),
            name,
            net_value,
            date,
        }
    }
}

impl Default for FundPageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Most recent dated candidate; the first candidate when none is dated.
fn most_recent(candidates: Vec<NetValueCandidate>) -> Option<NetValueCandidate> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(best) if best.date >= candidate.date => Some(best),
        _ => Some(candidate),
    })
}

/// First title segment, without parenthetical qualifiers or a trailing
/// net-value label.
fn clean_name(raw: &str) -> Option<String> {
    let segment = TITLE_SEPARATOR.split(raw).next()?;
    let segment = PARENTHETICAL.replace_all(segment, "");
    let mut name = WHITESPACE.replace_all(segment.trim(), " ").into_owned();

    loop {
        let stripped = TRAILING_LABEL.replace(&name, "").trim().to_string();
        if stripped == name {
            break;
        }
        name = stripped;
    }

    (!name.is_empty()).then_some(name)
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

fn is_value_header(text: &str) -> bool {
    contains_any(text, &NET_VALUE_LABELS)
        && !contains_any(text, &ACCUMULATED_MARKERS)
        && !contains_any(text, &DATE_LABELS)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let text = cell.text().collect::<String>();
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Visible text of the page with whitespace collapsed; script and style
/// contents are skipped.
fn page_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_code = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|element| matches!(element.name(), "script" | "style"));
        let text = text.trim();
        if !in_code && !text.is_empty() {
            parts.push(text);
        }
    }
    WHITESPACE.replace_all(&parts.join(" "), " ").into_owned()
}

/// Byte offset `chars` characters before `at`, clamped to the start.
fn chars_before(text: &str, at: usize, chars: usize) -> usize {
    if chars == 0 {
        return at;
    }
    text[..at]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map_or(0, |(index, _)| index)
}

/// Byte offset `chars` characters after `at`, clamped to the end.
fn chars_after(text: &str, at: usize, chars: usize) -> usize {
    text[at..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| at + index)
}
