//! Conversational booking intake.
//!
//! Each inbound chat message (text or a voice note) becomes exactly one
//! reply. Booking details are pulled out of the message, and when all six are
//! present the booking goes through the engine exactly like an API booking.
//! Otherwise the guest is asked for what is missing. Collaborator failures
//! turn into a fixed apology and never escape [`IntakePipeline::handle`].

mod fields;
mod nlu;
mod prompt;
mod session;
mod transcribe;

pub use fields::{parse_booking_fields, parse_fields_json, BookingField, ExtractedFields};
pub use nlu::{ChatCompletionsClient, Nlu};
pub use prompt::money;
pub use session::SessionStore;
pub use transcribe::{HttpMediaSource, MediaSource, Transcriber, WhisperClient, VOICE_NOTE_SAMPLE_RATE_HZ};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::engine::{today, Engine, EngineError};
use crate::limits::MAX_MESSAGE_LEN;
use crate::model::{BookingRequest, Guest, RoomTarget};
use crate::observability;

pub const APOLOGY: &str = "Sorry, there was an error processing your request. Please try again.";
pub const TRANSCRIPTION_APOLOGY: &str =
    "Sorry, I couldn't understand your voice message. Could you please type it instead?";
const GREETING: &str = "Hello! How can I help you with your stay?";

#[derive(Debug)]
pub enum IntakeError {
    TranscriptionFailed(String),
    ExternalServiceError(String),
    Timeout(&'static str),
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::TranscriptionFailed(msg) => write!(f, "transcription failed: {msg}"),
            IntakeError::ExternalServiceError(msg) => write!(f, "external service error: {msg}"),
            IntakeError::Timeout(what) => write!(f, "{what} timed out"),
        }
    }
}

impl std::error::Error for IntakeError {}

#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub url: String,
    pub content_type: String,
}

impl MediaAttachment {
    pub fn is_audio(&self) -> bool {
        self.content_type.starts_with("audio/")
    }
}

#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Transport address of the sender, e.g. `whatsapp:+15550100`.
    pub from: String,
    pub text: String,
    /// Transport message id; repeated deliveries carry the same id.
    pub message_id: Option<String>,
    pub media: Option<MediaAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Conversation,
    Booked(Ulid),
    MissingFields(Vec<BookingField>),
    BookingRejected,
    Apology,
}

impl IntakeOutcome {
    fn label(&self) -> &'static str {
        match self {
            IntakeOutcome::Conversation => "conversation",
            IntakeOutcome::Booked(_) => "booked",
            IntakeOutcome::MissingFields(_) => "missing_fields",
            IntakeOutcome::BookingRejected => "rejected",
            IntakeOutcome::Apology => "apology",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeReply {
    pub text: String,
    pub outcome: IntakeOutcome,
}

impl IntakeReply {
    fn new(text: impl Into<String>, outcome: IntakeOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }

    fn apology() -> Self {
        Self::new(APOLOGY, IntakeOutcome::Apology)
    }
}

/// Phone number of a transport address (`whatsapp:+1555…` → `+1555…`).
pub fn sender_phone(from: &str) -> &str {
    let from = from.trim();
    from.split_once(':').map_or(from, |(_, number)| number)
}

pub struct IntakePipeline {
    engine: Arc<Engine>,
    nlu: Arc<dyn Nlu>,
    voice: Option<(Arc<dyn MediaSource>, Arc<dyn Transcriber>)>,
    sessions: Option<SessionStore>,
    timeout: Duration,
}

impl IntakePipeline {
    pub fn new(engine: Arc<Engine>, nlu: Arc<dyn Nlu>, timeout: Duration) -> Self {
        Self {
            engine,
            nlu,
            voice: None,
            sessions: None,
            timeout,
        }
    }

    pub fn with_transcription(mut self, media: Arc<dyn MediaSource>, transcriber: Arc<dyn Transcriber>) -> Self {
        self.voice = Some((media, transcriber));
        self
    }

    /// Remember partial bookings per sender for `ttl`.
    pub fn with_sessions(mut self, ttl: Duration) -> Self {
        self.sessions = Some(SessionStore::new(ttl));
        self
    }

    pub fn sessions(&self) -> Option<&SessionStore> {
        self.sessions.as_ref()
    }

    pub async fn handle(&self, msg: InboundMessage) -> IntakeReply {
        let started = Instant::now();
        let reply = self.respond(&msg).await;
        metrics::counter!(observability::INTAKE_MESSAGES_TOTAL, "outcome" => reply.outcome.label()).increment(1);
        metrics::histogram!(observability::INTAKE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!("intake reply to {} ({})", msg.from, reply.outcome.label());
        reply
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T, IntakeError>>,
    ) -> Result<T, IntakeError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| IntakeError::Timeout(what))?
    }

    async fn respond(&self, msg: &InboundMessage) -> IntakeReply {
        let mut text = msg.text.trim().to_string();
        if let Some(media) = msg.media.as_ref().filter(|m| m.is_audio()) {
            match self.transcribe(media).await {
                Ok(transcript) => {
                    info!("voice note from {} transcribed ({} chars)", msg.from, transcript.len());
                    text = if text.is_empty() {
                        transcript
                    } else {
                        format!("{text}\n{transcript}")
                    };
                }
                Err(e) => {
                    warn!("voice note from {}: {e}", msg.from);
                    return IntakeReply::new(TRANSCRIPTION_APOLOGY, IntakeOutcome::Apology);
                }
            }
        }
        if text.is_empty() {
            return IntakeReply::new(GREETING, IntakeOutcome::Conversation);
        }
        if text.len() > MAX_MESSAGE_LEN {
            let mut cut = MAX_MESSAGE_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        let snapshot = self.engine.hotel_snapshot(today()).await;
        let chat_prompt = prompt::conversation(&snapshot, &text);
        let (chat, fields) = tokio::join!(
            self.bounded("nlu", self.nlu.generate(&chat_prompt)),
            self.extract(&text),
        );
        let (intent, chat) = match &chat {
            Ok(reply) => {
                let (intent, body) = prompt::strip_intent(reply);
                (intent, Some(body.to_string()))
            }
            Err(e) => {
                warn!("conversational reply for {} failed: {e}", msg.from);
                (false, None)
            }
        };
        let intent = intent || starts_with_book(&text);

        // Only this message decides whether we are booking; a pending session
        // does not turn small talk into slot filling.
        if !intent && fields.is_empty() {
            return match chat {
                Some(body) if !body.is_empty() => IntakeReply::new(body, IntakeOutcome::Conversation),
                _ => IntakeReply::apology(),
            };
        }

        let sender = sender_phone(&msg.from);
        let fields = match &self.sessions {
            Some(sessions) => sessions.merged(sender, fields),
            None => fields,
        };

        let missing = fields.missing();
        if !missing.is_empty() {
            if let Some(sessions) = &self.sessions {
                sessions.remember(sender, fields);
            }
            return missing_fields_reply(missing);
        }
        let reply = self.book(msg, fields).await;
        if let (Some(sessions), IntakeOutcome::Booked(_)) = (&self.sessions, &reply.outcome) {
            sessions.forget(sender);
        }
        reply
    }

    async fn transcribe(&self, media: &MediaAttachment) -> Result<String, IntakeError> {
        let Some((source, transcriber)) = &self.voice else {
            return Err(IntakeError::TranscriptionFailed("transcription is not configured".into()));
        };
        let audio = self.bounded("media download", source.fetch(&media.url)).await?;
        self.bounded(
            "transcription",
            transcriber.transcribe(audio, VOICE_NOTE_SAMPLE_RATE_HZ),
        )
        .await
    }

    /// Strict pass: ask the model for JSON, fall back to the local parser.
    async fn extract(&self, text: &str) -> ExtractedFields {
        let local = parse_booking_fields(text);
        let strict = prompt::extraction(text, today());
        match self.bounded("nlu", self.nlu.generate(&strict)).await {
            Ok(reply) => match parse_fields_json(&reply) {
                Some(model) => local.merge(model),
                None => {
                    debug!("extraction reply was not JSON, using local parser");
                    local
                }
            },
            Err(e) => {
                warn!("field extraction degraded to local parser: {e}");
                local
            }
        }
    }

    async fn book(&self, msg: &InboundMessage, fields: ExtractedFields) -> IntakeReply {
        let (Some(name), Some(email), Some(check_in), Some(check_out), Some(room_type), Some(guests)) = (
            fields.name,
            fields.email,
            fields.check_in,
            fields.check_out,
            fields.room_type,
            fields.guests,
        ) else {
            return IntakeReply::apology();
        };
        let req = BookingRequest {
            guest: Guest {
                name,
                email,
                phone: sender_phone(&msg.from).to_string(),
                address: None,
                special_requests: None,
            },
            target: RoomTarget::Type(room_type),
            check_in,
            check_out,
            number_of_guests: guests,
            add_ons: Vec::new(),
            idempotency_key: msg.message_id.as_ref().map(|sid| format!("msg:{sid}")),
        };

        match self.engine.book(req).await {
            Ok(r) => {
                let room = self
                    .engine
                    .get_room(&r.room_id)
                    .await
                    .map(|room| format!(" in room {}", room.room_number))
                    .unwrap_or_default();
                IntakeReply::new(
                    format!(
                        "Your booking is confirmed, {}! {} room{room} from {} to {} for {} guest{}. \
                         Total: {}. Reservation id: {}.",
                        r.guest.name,
                        capitalized(room_type.as_str()),
                        r.check_in,
                        r.check_out,
                        r.number_of_guests,
                        if r.number_of_guests == 1 { "" } else { "s" },
                        money(r.total_amount),
                        r.id
                    ),
                    IntakeOutcome::Booked(r.id),
                )
            }
            Err(e) if e.is_internal() => {
                error!("booking from {} failed: {e}", msg.from);
                IntakeReply::apology()
            }
            Err(e) => IntakeReply::new(rejection_text(&e), IntakeOutcome::BookingRejected),
        }
    }
}

fn starts_with_book(text: &str) -> bool {
    text.trim_start()
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("book"))
}

fn capitalized(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn missing_fields_reply(missing: Vec<BookingField>) -> IntakeReply {
    let labels: Vec<&str> = missing.iter().map(|f| f.label()).collect();
    IntakeReply::new(
        format!("Happy to book that for you! I still need your {}.", labels.join(", ")),
        IntakeOutcome::MissingFields(missing),
    )
}

fn rejection_text(e: &EngineError) -> String {
    match e {
        EngineError::InvalidRange(reason) => format!("Sorry, those dates don't work: {reason}."),
        EngineError::NoRoomAvailable | EngineError::RoomUnavailable(_) => {
            "Sorry, we have no room of that type free for those dates. Would other dates or another room type work?"
                .to_string()
        }
        EngineError::Invalid(reason) | EngineError::LimitExceeded(reason) => {
            format!("Sorry, I couldn't book that: {reason}.")
        }
        _ => "Sorry, I couldn't complete that booking. Please check the details and try again.".to_string(),
    }
}
