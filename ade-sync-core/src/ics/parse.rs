//! iCalendar feed parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};
use tracing::{debug, warn};

use crate::error::{CoreResult, SyncError};
use crate::event::CanonicalEvent;

const UNTITLED: &str = "(No title)";

/// Parse every VEVENT of an iCalendar document.
///
/// Floating times and all-day dates are read in `zone`. Events without a
/// modification stamp get `fetched_at`. Cancelled events are left out.
pub fn parse_feed(
    content: &str,
    zone: Tz,
    fetched_at: DateTime<Utc>,
) -> CoreResult<Vec<CanonicalEvent>> {
    if !content.contains("BEGIN:VCALENDAR") {
        return Err(SyncError::SourceFormat(
            "document is not an iCalendar feed".into(),
        ));
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| SyncError::SourceFormat(format!("invalid iCalendar document: {e}")))?;

    let mut events = Vec::new();
    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        if let Some(event) = parse_vevent(vevent, zone, fetched_at)? {
            events.push(event);
        }
    }
    Ok(events)
}

fn parse_vevent(
    vevent: &Component<'_>,
    zone: Tz,
    fetched_at: DateTime<Utc>,
) -> CoreResult<Option<CanonicalEvent>> {
    let uid = text(vevent, "UID")
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| SyncError::SourceFormat("VEVENT without UID".into()))?;

    if vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"))
    {
        debug!(external_id = %uid, "Skipping cancelled event");
        return Ok(None);
    }

    let start = required_time(vevent, "DTSTART", &uid, zone)?;
    let end = event_end(vevent, &uid, zone, start)?;

    if vevent.find_prop("RRULE").is_some() {
        warn!(external_id = %uid, "Recurring event is synced as its first occurrence only");
    }

    let last_modified = optional_time(vevent, "LAST-MODIFIED", zone)
        .or_else(|| optional_time(vevent, "DTSTAMP", zone))
        .unwrap_or(fetched_at);

    let title = text(vevent, "SUMMARY")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut event = CanonicalEvent::new(uid, title, start, end)?.with_last_modified(last_modified);
    if let Some(location) = text(vevent, "LOCATION") {
        event = event.with_location(location);
    }
    if let Some(description) = text(vevent, "DESCRIPTION") {
        event = event.with_description(description.trim().to_string());
    }

    Ok(Some(event))
}

fn text(vevent: &Component<'_>, name: &str) -> Option<String> {
    vevent
        .find_prop(name)
        .map(|p| unescape_ics_value(p.val.as_ref()))
}

fn required_time(
    vevent: &Component<'_>,
    name: &str,
    uid: &str,
    zone: Tz,
) -> CoreResult<DateTime<Utc>> {
    let prop = vevent
        .find_prop(name)
        .ok_or_else(|| SyncError::SourceFormat(format!("event '{uid}' has no {name}")))?;
    DatePerhapsTime::try_from(prop)
        .ok()
        .and_then(|value| to_utc(value, zone))
        .ok_or_else(|| {
            SyncError::SourceFormat(format!(
                "event '{uid}' has an invalid {name}: {}",
                prop.val.as_ref()
            ))
        })
}

/// End of an event: `DTEND`, else `DTSTART + DURATION`, else one day for
/// all-day events.
fn event_end(
    vevent: &Component<'_>,
    uid: &str,
    zone: Tz,
    start: DateTime<Utc>,
) -> CoreResult<DateTime<Utc>> {
    if vevent.find_prop("DTEND").is_some() {
        return required_time(vevent, "DTEND", uid, zone);
    }

    if let Some(prop) = vevent.find_prop("DURATION") {
        let value = prop.val.as_ref();
        return parse_duration(value)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| {
                SyncError::SourceFormat(format!("event '{uid}' has an invalid DURATION: {value}"))
            });
    }

    let start_date = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok());
    if let Some(DatePerhapsTime::Date(date)) = start_date {
        if let Some(end) = date
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .and_then(|midnight| local_to_utc(midnight, zone))
        {
            return Ok(end);
        }
    }

    Err(SyncError::SourceFormat(format!(
        "event '{uid}' has neither DTEND nor DURATION"
    )))
}

/// RFC 5545 duration (`PT1H30M`, `P1D`, `-PT15M`).
fn parse_duration(value: &str) -> Option<Duration> {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.trim_start_matches('+')),
    };
    let length: std::time::Duration = iso8601::duration(unsigned).ok()?.into();
    let length = Duration::from_std(length).ok()?;
    Some(if negative { -length } else { length })
}

fn optional_time(vevent: &Component<'_>, name: &str, zone: Tz) -> Option<DateTime<Utc>> {
    vevent
        .find_prop(name)
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|value| to_utc(value, zone))
}

/// Resolve an iCalendar date or date-time to an instant.
fn to_utc(value: DatePerhapsTime, zone: Tz) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::Date(date) => local_to_utc(date.and_hms_opt(0, 0, 0)?, zone),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => local_to_utc(naive, zone),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let tz = tzid.parse::<Tz>().unwrap_or_else(|_| {
                warn!(%tzid, fallback = %zone, "Unknown TZID");
                zone
            });
            local_to_utc(date_time, tz)
        }
    }
}

/// Local wall time to UTC. Ambiguous times take the earlier instant; times
/// skipped by a DST jump are shifted forward by an hour.
fn local_to_utc(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reverses RFC 5545 text escaping: `\,` `\;` `\\` and `\n`.
fn unescape_ics_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(',') | Some(';') | Some('\\') => {
                    result.extend(chars.next());
                }
                Some('n') | Some('N') => {
                    result.push('\n');
                    chars.next();
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 6, 0, 0).unwrap()
    }

    fn calendar(events: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//ADE//Export//FR\r\n{events}END:VCALENDAR\r\n"
        )
    }

    #[test]
    fn test_parse_utc_event() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:ADE-1234\r\n\
             DTSTAMP:20250901T050000Z\r\n\
             LAST-MODIFIED:20250830T120000Z\r\n\
             DTSTART:20250915T070000Z\r\n\
             DTEND:20250915T090000Z\r\n\
             SUMMARY:Math 101\r\n\
             LOCATION:Room 5\\, Building A\r\n\
             DESCRIPTION:\\nGroup 1\\nProf. Martin\\n\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_feed(&ics, Tz::UTC, fetched_at()).unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.external_id(), "ADE-1234");
        assert_eq!(event.title(), "Math 101");
        assert_eq!(event.location(), Some("Room 5, Building A"));
        assert_eq!(event.description(), Some("Group 1\nProf. Martin"));
        assert_eq!(event.start_time(), Utc.with_ymd_and_hms(2025, 9, 15, 7, 0, 0).unwrap());
        assert_eq!(event.end_time(), Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap());
        assert_eq!(event.last_modified(), Utc.with_ymd_and_hms(2025, 8, 30, 12, 0, 0).unwrap());
        assert_eq!(event.sync_tag(), None);
    }

    #[test]
    fn test_zoned_and_floating_times() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:zoned\r\n\
             DTSTART;TZID=Europe/Paris:20250915T090000\r\n\
             DTEND;TZID=Europe/Paris:20250915T100000\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:floating\r\n\
             DTSTART:20251215T090000\r\n\
             DTEND:20251215T100000\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_feed(&ics, chrono_tz::Europe::Paris, fetched_at()).unwrap();

        // CEST is UTC+2, CET is UTC+1
        assert_eq!(events[0].start_time(), Utc.with_ymd_and_hms(2025, 9, 15, 7, 0, 0).unwrap());
        assert_eq!(events[1].start_time(), Utc.with_ymd_and_hms(2025, 12, 15, 8, 0, 0).unwrap());
        assert_eq!(events[1].title(), "(No title)");
        assert_eq!(events[1].last_modified(), fetched_at());
    }

    #[test]
    fn test_all_day_event_spans_local_midnights() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:holiday\r\n\
             DTSTART;VALUE=DATE:20251101\r\n\
             DTEND;VALUE=DATE:20251102\r\n\
             SUMMARY:Toussaint\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_feed(&ics, chrono_tz::Europe::Paris, fetched_at()).unwrap();

        assert_eq!(events[0].start_time(), Utc.with_ymd_and_hms(2025, 10, 31, 23, 0, 0).unwrap());
        assert_eq!(events[0].end_time(), Utc.with_ymd_and_hms(2025, 11, 1, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_cancelled_events_are_dropped() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:gone\r\n\
             STATUS:CANCELLED\r\n\
             DTSTART:20250915T070000Z\r\n\
             DTEND:20250915T090000Z\r\n\
             END:VEVENT\r\n",
        );

        assert!(parse_feed(&ics, Tz::UTC, fetched_at()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_dtend_is_format_error() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:open-ended\r\n\
             DTSTART:20250915T070000Z\r\n\
             END:VEVENT\r\n",
        );

        let err = parse_feed(&ics, Tz::UTC, fetched_at()).unwrap_err();
        assert!(matches!(err, SyncError::SourceFormat(ref msg) if msg.contains("DTEND")));
    }

    #[test]
    fn test_duration_instead_of_dtend() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:fixed\r\n\
             DTSTART:20250915T070000Z\r\n\
             DTEND:20250915T090000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:dur\r\n\
             DTSTART:20250915T100000Z\r\n\
             DURATION:PT1H30M\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_feed(&ics, Tz::UTC, fetched_at()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].external_id(), "dur");
        assert_eq!(events[1].start_time(), Utc.with_ymd_and_hms(2025, 9, 15, 10, 0, 0).unwrap());
        assert_eq!(events[1].end_time(), Utc.with_ymd_and_hms(2025, 9, 15, 11, 30, 0).unwrap());
    }

    #[test]
    fn test_all_day_event_without_end_lasts_one_day() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:exam-day\r\n\
             DTSTART;VALUE=DATE:20251110\r\n\
             END:VEVENT\r\n",
        );

        let events = parse_feed(&ics, chrono_tz::Europe::Paris, fetched_at()).unwrap();

        assert_eq!(events[0].start_time(), Utc.with_ymd_and_hms(2025, 11, 9, 23, 0, 0).unwrap());
        assert_eq!(events[0].end_time(), Utc.with_ymd_and_hms(2025, 11, 10, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_duration_is_format_error() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:odd\r\n\
             DTSTART:20250915T100000Z\r\n\
             DURATION:soon\r\n\
             END:VEVENT\r\n",
        );

        let err = parse_feed(&ics, Tz::UTC, fetched_at()).unwrap_err();
        assert!(matches!(err, SyncError::SourceFormat(ref msg) if msg.contains("DURATION")));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("PT1H30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("P1W"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_inverted_times_are_format_error() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:backwards\r\n\
             DTSTART:20250915T090000Z\r\n\
             DTEND:20250915T070000Z\r\n\
             END:VEVENT\r\n",
        );

        assert!(matches!(
            parse_feed(&ics, Tz::UTC, fetched_at()),
            Err(SyncError::SourceFormat(_))
        ));
    }

    #[test]
    fn test_garbage_is_format_error() {
        assert!(matches!(
            parse_feed("<html>Service unavailable</html>", Tz::UTC, fetched_at()),
            Err(SyncError::SourceFormat(_))
        ));
    }

    #[test]
    fn test_unescape_ics_value() {
        assert_eq!(unescape_ics_value(r"a\, b\; c\\d\Ne"), "a, b; c\\d\ne");
        assert_eq!(unescape_ics_value(r"C:\temp"), r"C:\temp");
    }
}
