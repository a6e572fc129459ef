use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::model::RoomType;

/// One of the six things a booking needs, in the order guests are asked for
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingField {
    Name,
    Email,
    CheckIn,
    CheckOut,
    RoomType,
    Guests,
}

impl BookingField {
    pub const ALL: [BookingField; 6] = [
        BookingField::Name,
        BookingField::Email,
        BookingField::CheckIn,
        BookingField::CheckOut,
        BookingField::RoomType,
        BookingField::Guests,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BookingField::Name => "name",
            BookingField::Email => "email",
            BookingField::CheckIn => "check-in date",
            BookingField::CheckOut => "check-out date",
            BookingField::RoomType => "room type",
            BookingField::Guests => "number of guests",
        }
    }
}

impl fmt::Display for BookingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Booking fields recovered from a message. `None` means absent, given as a
/// null marker, or not parseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub room_type: Option<RoomType>,
    pub guests: Option<u32>,
}

impl ExtractedFields {
    fn has(&self, field: BookingField) -> bool {
        match field {
            BookingField::Name => self.name.is_some(),
            BookingField::Email => self.email.is_some(),
            BookingField::CheckIn => self.check_in.is_some(),
            BookingField::CheckOut => self.check_out.is_some(),
            BookingField::RoomType => self.room_type.is_some(),
            BookingField::Guests => self.guests.is_some(),
        }
    }

    pub fn missing(&self) -> Vec<BookingField> {
        BookingField::ALL
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        BookingField::ALL.iter().all(|f| !self.has(*f))
    }

    /// Fill the gaps in `self` from `newer`; values in `newer` win.
    pub fn merge(self, newer: ExtractedFields) -> ExtractedFields {
        ExtractedFields {
            name: newer.name.or(self.name),
            email: newer.email.or(self.email),
            check_in: newer.check_in.or(self.check_in),
            check_out: newer.check_out.or(self.check_out),
            room_type: newer.room_type.or(self.room_type),
            guests: newer.guests.or(self.guests),
        }
    }
}

const NULL_MARKERS: &[&str] = &["", "null", "none", "nil", "n/a", "na", "-", "?", "unknown", "[name]", "[email]"];

fn present(raw: &str) -> Option<&str> {
    let v = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if NULL_MARKERS.iter().any(|m| v.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(v)
    }
}

fn parse_name(raw: &str) -> Option<String> {
    present(raw).map(str::to_string)
}

fn parse_email(raw: &str) -> Option<String> {
    let v = present(raw)?;
    let (local, domain) = v.split_once('@')?;
    (!local.is_empty() && domain.contains('.') && !v.contains(char::is_whitespace)).then(|| v.to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let v = present(raw)?;
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(v, fmt).ok())
}

fn parse_room_type(raw: &str) -> Option<RoomType> {
    present(raw)?.parse().ok()
}

fn parse_guests(raw: &str) -> Option<u32> {
    let v = present(raw)?;
    let digits: String = v
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Deterministic parser for the two formats guests are told about:
///
/// ```text
/// Book: Ada Lovelace, ada@example.com, 2031-03-01, 2031-03-03, double, 2
/// ```
///
/// and one `field: value` pair per line.
pub fn parse_booking_fields(text: &str) -> ExtractedFields {
    let trimmed = text.trim();
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "book:") {
        let parts: Vec<&str> = rest.split(',').collect();
        return if parts.len() == BookingField::ALL.len() {
            positional(&parts)
        } else {
            by_shape(&parts)
        };
    }

    let mut fields = ExtractedFields::default();
    for line in trimmed.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "name" | "guestname" | "fullname" => fields.name = parse_name(value).or(fields.name),
            "email" | "mail" | "emailaddress" => fields.email = parse_email(value).or(fields.email),
            "checkin" | "checkindate" | "arrival" => fields.check_in = parse_date(value).or(fields.check_in),
            "checkout" | "checkoutdate" | "departure" => {
                fields.check_out = parse_date(value).or(fields.check_out)
            }
            "roomtype" | "room" | "type" => fields.room_type = parse_room_type(value).or(fields.room_type),
            "guests" | "numberofguests" | "guestcount" | "people" => {
                fields.guests = parse_guests(value).or(fields.guests)
            }
            _ => {}
        }
    }
    fields
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn positional(parts: &[&str]) -> ExtractedFields {
    ExtractedFields {
        name: parse_name(parts[0]),
        email: parse_email(parts[1]),
        check_in: parse_date(parts[2]),
        check_out: parse_date(parts[3]),
        room_type: parse_room_type(parts[4]),
        guests: parse_guests(parts[5]),
    }
}

/// Classify each part by what it looks like. The first date is the
/// check-in, the second the check-out, the first bare text the name.
fn by_shape(parts: &[&str]) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    for part in parts {
        let Some(v) = present(part) else {
            continue;
        };
        if let Some(email) = parse_email(v) {
            fields.email.get_or_insert(email);
        } else if let Some(date) = parse_date(v) {
            if fields.check_in.is_none() {
                fields.check_in = Some(date);
            } else {
                fields.check_out.get_or_insert(date);
            }
        } else if let Some(t) = parse_room_type(v) {
            fields.room_type.get_or_insert(t);
        } else if let Some(n) = parse_guests(v) {
            fields.guests.get_or_insert(n);
        } else if !v.contains('@') {
            fields.name.get_or_insert_with(|| v.to_string());
        }
    }
    fields
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFields {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    email: Option<Value>,
    #[serde(default, alias = "check_in")]
    check_in: Option<Value>,
    #[serde(default, alias = "check_out")]
    check_out: Option<Value>,
    #[serde(default, alias = "room_type")]
    room_type: Option<Value>,
    #[serde(default, alias = "numberOfGuests", alias = "number_of_guests")]
    guests: Option<Value>,
}

fn value_text(v: Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Read the JSON object a model answered with. The object may be wrapped in
/// prose or a code fence. `None` if there is no parseable object.
pub fn parse_fields_json(reply: &str) -> Option<ExtractedFields> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    let raw: RawFields = serde_json::from_str(reply.get(start..=end)?).ok()?;
    Some(ExtractedFields {
        name: parse_name(&value_text(raw.name)),
        email: parse_email(&value_text(raw.email)),
        check_in: parse_date(&value_text(raw.check_in)),
        check_out: parse_date(&value_text(raw.check_out)),
        room_type: parse_room_type(&value_text(raw.room_type)),
        guests: parse_guests(&value_text(raw.guests)),
    })
}
