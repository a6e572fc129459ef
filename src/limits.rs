use crate::model::Ms;

// ── Entity counts ───────────────────────────────────────────────

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_SERVICES: usize = 1_000;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 10_000;
pub const MAX_BOOKINGS_PER_SERVICE: usize = 50_000;
pub const MAX_ADD_ONS: usize = 32;
pub const MAX_SPECIAL_OFFERS: usize = 64;
pub const MAX_AMENITIES: usize = 64;

// ── Field sizes ─────────────────────────────────────────────────

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 4_096;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
pub const MAX_MESSAGE_LEN: usize = 4_096;
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

// ── Stays and slots ─────────────────────────────────────────────

pub const MAX_STAY_NIGHTS: i64 = 365;
pub const MAX_PARTY_SIZE: u32 = 50;
pub const MAX_SERVICE_SLOT_MS: Ms = 24 * 3_600_000;
pub const MAX_QUERY_WINDOW_DAYS: i64 = 2 * 366;

/// 2000-01-01T00:00:00Z and 2200-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
