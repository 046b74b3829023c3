use super::evaluation;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Offset, SecondsFormat, Utc};
use chrono_tz::Tz;
use eventflow_core::{PluginError, PluginValue, SimplePlugin};
use std::fmt::Write;

/// `dateTime([pattern], [zone])`: the current time as text.
///
/// `pattern` is a strftime pattern; empty or `iso` selects ISO-8601. `zone` is `UTC`, `local`,
/// a region id such as `Asia/Tokyo`, or a fixed offset such as `+08:00`. Defaults are ISO-8601 in the system zone.
pub struct DateTimeNow;

const NAME: &str = "dateTime";

impl SimplePlugin for DateTimeNow {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        if args.len() > 2 {
            return Err(super::arity(NAME, "at most 2", args.len()));
        }
        let pattern = args.first().map(PluginValue::to_text).unwrap_or_default();
        let zone = args.get(1).map(PluginValue::to_text).unwrap_or_default();

        let now = now_in(&zone)?;
        format_time(&now, pattern.trim()).map(PluginValue::Text)
    }
}

fn now_in(zone: &str) -> Result<DateTime<FixedOffset>, PluginError> {
    let zone = zone.trim();
    if zone.is_empty() || zone.eq_ignore_ascii_case("local") {
        let now = Local::now();
        return Ok(now.with_timezone(now.offset()));
    }
    if zone.eq_ignore_ascii_case("utc") || zone == "Z" {
        let now = Utc::now();
        return Ok(now.with_timezone(&now.offset().fix()));
    }
    if let Ok(region) = zone.parse::<Tz>() {
        let now = Utc::now().with_timezone(&region);
        return Ok(now.with_timezone(&now.offset().fix()));
    }
    let offset =
        parse_offset(zone).ok_or_else(|| evaluation(NAME, format!("unknown zone '{zone}'")))?;
    Ok(Utc::now().with_timezone(&offset))
}

/// `+08:00`, `-0530` or `+8`
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_char_boundary(2) => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: u8 = hours.parse().ok()?;
    let minutes: u8 = minutes.parse().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (i32::from(hours) * 3600 + i32::from(minutes) * 60))
}

fn format_time(time: &DateTime<FixedOffset>, pattern: &str) -> Result<String, PluginError> {
    if pattern.is_empty() || pattern.eq_ignore_ascii_case("iso") {
        return Ok(time.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(evaluation(NAME, format!("invalid pattern '{pattern}'")));
    }
    let mut out = String::new();
    write!(out, "{}", time.format_with_items(items.into_iter()))
        .map_err(|_| evaluation(NAME, format!("unable to format with '{pattern}'")))?;
    Ok(out)
}
