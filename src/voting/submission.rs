use crate::db::{Actor, NewTopic};
use crate::error::{VotingError, VotingResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

pub const DESTINATION_MIN_CHARS: usize = 2;
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("valid HH:MM pattern"));

/// A student's "request a new bus" form.
#[derive(Debug, Clone, Deserialize)]
pub struct BusRequest {
    pub destination: String,
    pub description: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// 24-hour `HH:MM`.
    pub time: String,
}

/// Turns a bus request into the fields of a new topic. `date` and `time`
/// are read as campus-local time in `offset`. A target in the past is
/// accepted.
pub fn format_request(
    request: &BusRequest,
    creator: &Actor,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> VotingResult<NewTopic> {
    let destination = request.destination.trim();
    let description = request.description.trim();

    if destination.chars().count() < DESTINATION_MIN_CHARS {
        return Err(VotingError::validation(format!(
            "destination must be at least {DESTINATION_MIN_CHARS} characters"
        )));
    }

    let description_len = description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
        return Err(VotingError::validation(format!(
            "description must be {DESCRIPTION_MIN_CHARS} to {DESCRIPTION_MAX_CHARS} characters"
        )));
    }

    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
        .map_err(|_| VotingError::validation("date must be YYYY-MM-DD"))?;
    let end_at = target_instant(date, &request.time, offset)?;
    if end_at <= now {
        debug!(%end_at, "bus requested for a time that has already passed");
    }

    Ok(NewTopic {
        title: format!("Additional Bus to {destination}"),
        description: description.to_string(),
        destination: destination.to_string(),
        start_at: now,
        end_at,
        region: creator.region.clone(),
        creator_id: creator.id.clone(),
    })
}

fn target_instant(date: NaiveDate, time: &str, offset: FixedOffset) -> VotingResult<DateTime<Utc>> {
    let captures = TIME_OF_DAY
        .captures(time)
        .ok_or_else(|| VotingError::validation("time must be HH:MM (24-hour)"))?;

    let hour: u32 = captures[1]
        .parse()
        .map_err(|_| VotingError::validation("time must be HH:MM (24-hour)"))?;
    let minute: u32 = captures[2]
        .parse()
        .map_err(|_| VotingError::validation("time must be HH:MM (24-hour)"))?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| VotingError::validation("time must be HH:MM (24-hour)"))?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| VotingError::validation("date and time do not form a valid instant"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn request(destination: &str, description: &str, time: &str) -> BusRequest {
        BusRequest {
            destination: destination.into(),
            description: description.into(),
            date: "2026-10-17".into(),
            time: time.into(),
        }
    }

    #[test]
    fn builds_title_and_deadline() {
        let now = Utc::now();
        let creator = Actor::new("s-1", "Hubli");
        let topic = format_request(
            &request("Dharwad", "Need an evening bus", "18:30"),
            &creator,
            ist(),
            now,
        )
        .unwrap();

        assert_eq!(topic.title, "Additional Bus to Dharwad");
        assert_eq!(topic.destination, "Dharwad");
        assert_eq!(topic.start_at, now);
        assert_eq!(topic.region, creator.region);
        assert_eq!(topic.creator_id, "s-1");
        // 18:30 IST is 13:00 UTC.
        assert_eq!(topic.end_at.to_rfc3339(), "2026-10-17T13:00:00+00:00");
    }

    #[test]
    fn time_must_be_strict_24_hour() {
        let creator = Actor::new("s-1", "Hubli");
        for bad in ["6:30", "24:00", "18:60", "18:30:00", "1830", " 18:30", "ab:cd", ""] {
            let result = format_request(
                &request("Dharwad", "Need an evening bus", bad),
                &creator,
                ist(),
                Utc::now(),
            );
            assert!(
                matches!(result, Err(VotingError::Validation(_))),
                "accepted {bad:?}"
            );
        }
        for good in ["00:00", "09:05", "23:59"] {
            assert!(
                format_request(
                    &request("Dharwad", "Need an evening bus", good),
                    &creator,
                    ist(),
                    Utc::now()
                )
                .is_ok()
            );
        }
    }

    #[test]
    fn field_lengths_are_checked() {
        let creator = Actor::new("s-1", "Hubli");
        let too_long = "x".repeat(201);
        for (destination, description) in [
            ("D", "Need an evening bus"),
            ("Dharwad", "Too short"),
            ("Dharwad", too_long.as_str()),
            ("  ", "Need an evening bus"),
        ] {
            let result = format_request(
                &request(destination, description, "18:30"),
                &creator,
                ist(),
                Utc::now(),
            );
            assert!(matches!(result, Err(VotingError::Validation(_))));
        }

        let exactly_max = "x".repeat(200);
        assert!(
            format_request(
                &request("Dharwad", &exactly_max, "18:30"),
                &creator,
                ist(),
                Utc::now()
            )
            .is_ok()
        );
    }

    #[test]
    fn date_must_be_a_calendar_day() {
        let creator = Actor::new("s-1", "Hubli");
        for bad in ["tomorrow", "17-10-2026", "2026-02-30", "2026/10/17", ""] {
            let mut bus = request("Dharwad", "Need an evening bus", "18:30");
            bus.date = bad.into();
            let result = format_request(&bus, &creator, ist(), Utc::now());
            assert!(
                matches!(result, Err(VotingError::Validation(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn past_target_is_accepted() {
        let now = Utc::now();
        let yesterday = (now - Duration::days(1)).date_naive();
        let mut past = request("Dharwad", "Need an evening bus", "06:00");
        past.date = yesterday.to_string();

        let topic = format_request(&past, &Actor::new("s-1", "Hubli"), ist(), now).unwrap();
        assert!(topic.end_at < now);
    }
}
