//! As-of date recognition in scraped text.
//!
//! Date families are tried in a fixed order; the first match that forms a
//! real calendar date no earlier than 2000 and no later than today wins.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

const MIN_YEAR: i32 = 2000;

lazy_static! {
    static ref ISO_DATE: Regex =
        Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").expect("Invalid regex pattern");

    static ref CJK_DATE: Regex = Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日")
        .expect("Invalid regex pattern");

    static ref LABELLED_DATE: Regex = Regex::new(
        r"(?i)(?:更新时间|净值日期|update time|nav date)\s*[:：]?\s*(?:(\d{4})[-/.年](\d{1,2})[-/.月](\d{1,2})|(\d{1,2})[-/.月](\d{1,2}))"
    )
    .expect("Invalid regex pattern");

    static ref MONTH_DAY: Regex =
        Regex::new(r"(?:^|[^\d./-])(\d{1,2})[-/](\d{1,2})(?:$|[^\d./-])")
            .expect("Invalid regex pattern");

    static ref EIGHT_DIGITS: Regex =
        Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:$|\D)").expect("Invalid regex pattern");
}

type Family = fn(&str, NaiveDate) -> Option<NaiveDate>;

const FAMILIES: [Family; 5] = [
    iso_date,
    cjk_date,
    labelled_date,
    month_day_date,
    eight_digit_date,
];

/// Find the first plausible date in `text`.
///
/// Returns `None` when nothing matches; callers decide what an unresolved
/// date means.
pub fn find_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    FAMILIES.iter().find_map(|family| family(text, today))
}

fn is_sane(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() >= MIN_YEAR && date <= today
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

fn full_date(caps: &Captures<'_>, groups: [usize; 3], today: NaiveDate) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(
        number(caps, groups[0])?,
        number(caps, groups[1])?,
        number(caps, groups[2])?,
    )?;
    is_sane(date, today).then_some(date)
}

/// Month and day without a year: this year, or last year if that would be
/// in the future.
fn inferred_year_date(
    caps: &Captures<'_>,
    groups: [usize; 2],
    today: NaiveDate,
) -> Option<NaiveDate> {
    let month: u32 = number(caps, groups[0])?;
    let day: u32 = number(caps, groups[1])?;
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)
        .filter(|date| *date <= today)
        .or_else(|| NaiveDate::from_ymd_opt(today.year() - 1, month, day))?;
    is_sane(date, today).then_some(date)
}

fn iso_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    ISO_DATE
        .captures_iter(text)
        .find_map(|caps| full_date(&caps, [1, 2, 3], today))
}

fn cjk_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    CJK_DATE
        .captures_iter(text)
        .find_map(|caps| full_date(&caps, [1, 2, 3], today))
}

fn labelled_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    LABELLED_DATE.captures_iter(text).find_map(|caps| {
        if caps.get(1).is_some() {
            full_date(&caps, [1, 2, 3], today)
        } else {
            inferred_year_date(&caps, [4, 5], today)
        }
    })
}

fn month_day_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    MONTH_DAY
        .captures_iter(text)
        .find_map(|caps| inferred_year_date(&caps, [1, 2], today))
}

fn eight_digit_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    EIGHT_DIGITS
        .captures_iter(text)
        .find_map(|caps| full_date(&caps, [1, 2, 3], today))
}
