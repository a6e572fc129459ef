use std::fmt::Write;

use chrono::NaiveDate;

use crate::model::{Amount, HotelSnapshot};

/// Tag the model puts first in its reply when the guest wants to book.
pub const BOOKING_INTENT_TAG: &str = "[BOOK]";

pub const BOOKING_FORMAT: &str = "Book: [name], [email], [check-in], [check-out], [room-type], [guests]";

pub fn money(amount: Amount) -> String {
    format!("${}.{:02}", amount / 100, amount % 100)
}

/// Conversational prompt, grounded in what the hotel can offer right now.
pub fn conversation(snapshot: &HotelSnapshot, message: &str) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "A guest has sent the following message:\n{message}\n");
    let _ = writeln!(p, "Today is {}. What the hotel offers:", snapshot.today);
    if snapshot.rooms.is_empty() {
        let _ = writeln!(p, "- No rooms are open for booking at the moment.");
    }
    for room in &snapshot.rooms {
        let _ = writeln!(
            p,
            "- {} rooms from {}/night, up to {} guests, {} free tonight",
            room.room_type,
            money(room.price_from),
            room.max_capacity,
            room.available_tonight
        );
    }
    for service in &snapshot.services {
        let _ = write!(p, "- {} ({}): {} per guest", service.name, service.service_type, money(service.price));
        for offer in &service.offers {
            let _ = write!(p, "; offer \"{}\" {}% off", offer.name, offer.discount);
        }
        let _ = writeln!(p);
    }
    let _ = writeln!(p, "- Booking format: {BOOKING_FORMAT}");
    let _ = writeln!(
        p,
        "\nRespond naturally and helpfully. Keep responses concise but informative. \
         If they ask about rooms, include pricing information. \
         If they want to make a reservation, guide them to the booking format and \
         start your reply with {BOOKING_INTENT_TAG}."
    );
    p
}

/// Strict extraction prompt: JSON only, nulls for anything not stated.
pub fn extraction(message: &str, today: NaiveDate) -> String {
    format!(
        "Extract hotel booking details from the guest message below. Today is {today}.\n\
         Answer with only a JSON object with the keys name, email, checkIn, checkOut, \
         roomType, guests. Dates are YYYY-MM-DD, roomType is one of single, double, suite, \
         guests is a number. Use null for anything the guest did not state explicitly.\n\n\
         Message:\n{message}"
    )
}

/// Split the intent tag off a conversational reply.
pub fn strip_intent(reply: &str) -> (bool, &str) {
    let trimmed = reply.trim_start();
    match trimmed.strip_prefix(BOOKING_INTENT_TAG) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, reply.trim()),
    }
}
