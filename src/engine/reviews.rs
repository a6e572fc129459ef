use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::booking::validate_contact;
use super::conflict::now_ms;
use super::{Engine, EngineError};

fn validate_rating(rating: u8) -> Result<(), EngineError> {
    if !(1..=5).contains(&rating) {
        return Err(EngineError::Invalid("ratings must be between 1 and 5"));
    }
    Ok(())
}

fn validate_review_body(rating: u8, comment: &str, categories: Option<&CategoryRatings>) -> Result<(), EngineError> {
    validate_rating(rating)?;
    if comment.trim().is_empty() {
        return Err(EngineError::Invalid("review comment is required"));
    }
    if comment.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("review comment too long"));
    }
    if let Some(categories) = categories {
        for rating in categories.all().into_iter().flatten() {
            validate_rating(rating)?;
        }
    }
    Ok(())
}

impl Engine {
    /// Review a stay. Only the guest who made the reservation (matched by
    /// email, ignoring case) may review it, once.
    ///
    /// Runs under the reservation's room lock so it serializes with check-out
    /// (which verifies reviews) and with reservation deletion.
    pub async fn create_review(&self, new: NewReview) -> Result<Review, EngineError> {
        validate_review_body(new.rating, &new.comment, new.categories.as_ref())?;
        validate_contact(&new.guest.name, &new.guest.email)?;

        let guard = self.resolve_reservation_write(&new.reservation).await?;
        let reservation = guard
            .reservation(&new.reservation)
            .ok_or(EngineError::NotFound(new.reservation))?;
        if !reservation.guest.email.trim().eq_ignore_ascii_case(new.guest.email.trim()) {
            return Err(EngineError::Forbidden("reviewer email does not match the reservation"));
        }
        if self.store.review_for_reservation(&reservation.id).is_some() {
            return Err(EngineError::DuplicateReview(reservation.id));
        }

        let now = now_ms();
        let review = Review {
            id: Ulid::new(),
            reservation_id: reservation.id,
            rating: new.rating,
            comment: new.comment.trim().to_string(),
            guest: Reviewer {
                name: new.guest.name.trim().to_string(),
                email: new.guest.email.trim().to_string(),
            },
            categories: new.categories,
            response: None,
            is_verified: reservation.status == ReservationStatus::CheckedOut,
            created_at: now,
            updated_at: now,
        };
        let event = Event::ReviewCreated {
            review: review.clone(),
        };
        self.wal_append(&event).await?;
        self.store.apply_review_event(&event);
        info!("review {} created for reservation {}", review.id, review.reservation_id);
        Ok(review)
    }

    /// Edit a review's rating, comment or categories, or attach the hotel's
    /// response.
    pub async fn update_review(&self, id: Ulid, patch: ReviewPatch) -> Result<Review, EngineError> {
        let reservation_id = self.get_review(&id)?.reservation_id;
        let _guard = self.resolve_reservation_write(&reservation_id).await?;
        let mut review = self.get_review(&id)?;

        let now = now_ms();
        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if let Some(comment) = patch.comment {
            review.comment = comment.trim().to_string();
        }
        if let Some(categories) = patch.categories {
            review.categories = Some(categories);
        }
        if let Some(response) = patch.response {
            if response.comment.trim().is_empty() || response.responded_by.trim().is_empty() {
                return Err(EngineError::Invalid("response needs a comment and an author"));
            }
            if response.comment.len() > MAX_TEXT_LEN || response.responded_by.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("response too long"));
            }
            review.response = Some(HotelResponse {
                comment: response.comment.trim().to_string(),
                responded_by: response.responded_by.trim().to_string(),
                responded_at: now,
            });
        }
        validate_review_body(review.rating, &review.comment, review.categories.as_ref())?;
        review.updated_at = now;

        let event = Event::ReviewUpdated {
            review: review.clone(),
        };
        self.wal_append(&event).await?;
        self.store.apply_review_event(&event);
        Ok(review)
    }

    pub async fn delete_review(&self, id: Ulid) -> Result<(), EngineError> {
        let reservation_id = self.get_review(&id)?.reservation_id;
        let _guard = self.resolve_reservation_write(&reservation_id).await?;
        self.get_review(&id)?;

        let event = Event::ReviewDeleted { id, reservation_id };
        self.wal_append(&event).await?;
        self.store.apply_review_event(&event);
        info!("review {id} deleted");
        Ok(())
    }
}
