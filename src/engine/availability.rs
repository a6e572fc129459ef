use std::cmp::Ordering;

use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Free windows of a room inside `query`: the window minus every active
/// reservation, merged.
pub fn free_windows(rs: &RoomState, query: &Span) -> Vec<Span> {
    let mut taken: Vec<Span> = rs
        .active_overlapping(query)
        .map(|r| {
            let span = r.span();
            Span::new(span.start.max(query.start), span.end.min(query.end))
        })
        .collect();
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_intervals(&[*query], &taken)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Sweep line: the largest number of guests present at any one instant of
/// `window`, given `(slot, guests)` loads.
pub fn peak_load(loads: &[(Span, u32)], window: &Span) -> u32 {
    let mut events: Vec<(Ms, i64)> = Vec::with_capacity(loads.len() * 2);
    for (span, guests) in loads {
        let start = span.start.max(window.start);
        let end = span.end.min(window.end);
        if start < end {
            events.push((start, i64::from(*guests)));
            events.push((end, -i64::from(*guests)));
        }
    }
    // Ends sort before starts at the same instant: slots are half-open.
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current: i64 = 0;
    let mut peak: i64 = 0;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    u32::try_from(peak).unwrap_or(u32::MAX)
}

/// Candidate order for rooms: cheapest first, then room number, then id.
pub(crate) fn room_order(a: &Room, b: &Room) -> Ordering {
    a.price_per_night
        .cmp(&b.price_per_night)
        .then_with(|| a.room_number.cmp(&b.room_number))
        .then_with(|| a.id.cmp(&b.id))
}

/// Candidate order for services: cheapest first, then name, then id.
pub(crate) fn service_order(a: &Service, b: &Service) -> Ordering {
    a.price
        .cmp(&b.price)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}
