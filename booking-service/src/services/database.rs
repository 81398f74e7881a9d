//! Database service for booking-service.
//!
//! Owns every query the engine runs. The one-confirmed-booking-per-slot
//! invariant lives in the `uq_bookings_slot_once` constraint; a violation on
//! booking insert is how a lost race between two settlements is detected.

use crate::models::{
    normalize_court_field, Booking, BookingStatus, Court, CreateCourt, CreatePayment, CreateSlot,
    ListSlotsFilter, Payment, PaymentStatus, Slot,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveTime;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const COURT_COLUMNS: &str = "court_id, name, location, description, name_normalized, location_normalized, status, owner_user_id, is_active, created_utc";
const SLOT_COLUMNS: &str = "slot_id, court_id, start_utc, end_utc, price, is_active, created_utc";
const BOOKING_COLUMNS: &str =
    "booking_id, user_id, slot_id, status, cancelled_utc, cancel_reason, created_utc";
const PAYMENT_COLUMNS: &str = "payment_id, booking_id, slot_id, provider, amount, currency, status, gateway_session_id, created_utc, paid_utc";

/// How a completion event was resolved against the booking ledger.
#[derive(Debug)]
pub enum SettlementOutcome {
    /// The booking was materialized and the payment marked PAID.
    Confirmed(Booking),
    /// Another checkout secured the slot first; the payment is now FAILED.
    SlotTaken,
    /// A concurrent delivery already settled this payment; nothing changed.
    AlreadySettled,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "booking-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Begin a transaction for a multi-statement mutation.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))
    }

    // =========================================================================
    // Catalog: courts
    // =========================================================================

    /// Register a court. Starts PENDING; verification is an external workflow.
    #[instrument(skip(self, input), fields(owner_user_id = %input.owner_user_id))]
    pub async fn create_court(&self, input: &CreateCourt) -> Result<Court, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_court"])
            .start_timer();

        let court_id = Uuid::new_v4();
        let court = sqlx::query_as::<_, Court>(&format!(
            r#"
            INSERT INTO courts (court_id, name, location, description, name_normalized, location_normalized, owner_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COURT_COLUMNS}
            "#,
        ))
        .bind(court_id)
        .bind(&input.name)
        .bind(&input.location)
        .bind(&input.description)
        .bind(normalize_court_field(&input.name))
        .bind(normalize_court_field(&input.location))
        .bind(input.owner_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Court already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create court: {}", e)),
        })?;

        timer.observe_duration();
        info!(court_id = %court.court_id, name = %court.name, "Court registered");

        Ok(court)
    }

    /// Get a court by ID.
    pub async fn get_court(&self, court_id: Uuid) -> Result<Option<Court>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_court"])
            .start_timer();

        let court = sqlx::query_as::<_, Court>(&format!(
            "SELECT {COURT_COLUMNS} FROM courts WHERE court_id = $1",
        ))
        .bind(court_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get court: {}", e)))?;

        timer.observe_duration();

        Ok(court)
    }

    // =========================================================================
    // Catalog: slots
    // =========================================================================

    /// Create a slot on a court.
    #[instrument(skip(self, input), fields(court_id = %input.court_id))]
    pub async fn create_slot(&self, input: &CreateSlot) -> Result<Slot, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_slot"])
            .start_timer();

        let slot_id = Uuid::new_v4();
        let slot = sqlx::query_as::<_, Slot>(&format!(
            r#"
            INSERT INTO slots (slot_id, court_id, start_utc, end_utc, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SLOT_COLUMNS}
            "#,
        ))
        .bind(slot_id)
        .bind(input.court_id)
        .bind(input.start_utc)
        .bind(input.end_utc)
        .bind(input.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Slot already exists for that court and time"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create slot: {}", e)),
        })?;

        timer.observe_duration();
        info!(slot_id = %slot.slot_id, "Slot created");

        Ok(slot)
    }

    /// Get a slot by ID.
    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_slot"])
            .start_timer();

        let slot = sqlx::query_as::<_, Slot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE slot_id = $1",
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get slot: {}", e)))?;

        timer.observe_duration();

        Ok(slot)
    }

    /// Deactivate a slot so it stops appearing in listings.
    #[instrument(skip(self), fields(slot_id = %slot_id))]
    pub async fn deactivate_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_slot"])
            .start_timer();

        let slot = sqlx::query_as::<_, Slot>(&format!(
            r#"
            UPDATE slots
            SET is_active = FALSE
            WHERE slot_id = $1
            RETURNING {SLOT_COLUMNS}
            "#,
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate slot: {}", e)))?;

        timer.observe_duration();

        Ok(slot)
    }

    /// List active slots on verified, active courts, optionally filtered by
    /// court and UTC day.
    #[instrument(skip(self, filter))]
    pub async fn list_open_slots(&self, filter: &ListSlotsFilter) -> Result<Vec<Slot>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open_slots"])
            .start_timer();

        let (day_start, day_end) = match filter.date {
            Some(date) => {
                let start = date.and_time(NaiveTime::MIN).and_utc();
                (Some(start), Some(start + chrono::Duration::days(1)))
            }
            None => (None, None),
        };

        let slots = sqlx::query_as::<_, Slot>(&format!(
            r#"
            SELECT s.slot_id, s.court_id, s.start_utc, s.end_utc, s.price, s.is_active, s.created_utc
            FROM slots s
            JOIN courts c ON s.court_id = c.court_id
            WHERE s.is_active = TRUE
              AND c.status = 'VERIFIED'
              AND c.is_active = TRUE
              AND ($1::uuid IS NULL OR s.court_id = $1)
              AND ($2::timestamptz IS NULL OR (s.start_utc >= $2 AND s.start_utc < $3))
            ORDER BY s.start_utc ASC
            "#,
        ))
        .bind(filter.court_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list slots: {}", e)))?;

        timer.observe_duration();

        Ok(slots)
    }

    /// Slot ids among `slot_ids` that currently hold a CONFIRMED booking.
    ///
    /// Availability is always derived from this, never cached.
    pub async fn confirmed_slot_ids(&self, slot_ids: &[Uuid]) -> Result<HashSet<Uuid>, AppError> {
        if slot_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirmed_slot_ids"])
            .start_timer();

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT slot_id FROM bookings
            WHERE status = 'CONFIRMED' AND slot_id = ANY($1)
            "#,
        )
        .bind(slot_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check booked slots: {}", e))
        })?;

        timer.observe_duration();

        Ok(ids.into_iter().collect())
    }

    // =========================================================================
    // Booking ledger
    // =========================================================================

    /// Get a booking by ID.
    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_booking"])
            .start_timer();

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1",
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get booking: {}", e)))?;

        timer.observe_duration();

        Ok(booking)
    }

    /// The CONFIRMED booking holding a slot, if any.
    pub async fn confirmed_booking_for_slot(
        &self,
        slot_id: Uuid,
    ) -> Result<Option<Booking>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirmed_booking_for_slot"])
            .start_timer();

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE slot_id = $1 AND status = 'CONFIRMED'",
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check slot booking: {}", e))
        })?;

        timer.observe_duration();

        Ok(booking)
    }

    // =========================================================================
    // Payment tracker
    // =========================================================================

    /// Get a payment by ID.
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1",
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// Get a payment by its gateway session id.
    pub async fn get_payment_by_session(
        &self,
        gateway_session_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment_by_session"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_session_id = $1",
        ))
        .bind(gateway_session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// Delete a payment unless it already settled. Returns whether a row was
    /// removed; a PAID payment is never touched.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn delete_unpaid_payment(&self, payment_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_unpaid_payment"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM payments
            WHERE payment_id = $1 AND status <> 'PAID'
            "#,
        )
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Checkout attempt (transactional pieces; the gateway call happens between
    // insert and session attach, so the caller owns the transaction)
    // =========================================================================

    /// Remove a stale payment/booking pair left behind by an earlier attempt.
    /// The payment goes first so the booking is never orphaned by a partial
    /// failure.
    pub async fn discard_attempt_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        booking: &Booking,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM payments WHERE booking_id = $1")
            .bind(booking.booking_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete stale payment: {}", e))
            })?;

        sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(booking.booking_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete stale booking: {}", e))
            })?;

        Ok(())
    }

    /// Insert a fresh INIT payment for a checkout attempt.
    pub async fn insert_payment_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        input: &CreatePayment,
    ) -> Result<Payment, AppError> {
        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (payment_id, slot_id, provider, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, '{init}')
            RETURNING {PAYMENT_COLUMNS}
            "#,
            init = PaymentStatus::Init.as_str(),
        ))
        .bind(payment_id)
        .bind(input.slot_id)
        .bind(&input.provider)
        .bind(input.amount)
        .bind(&input.currency)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create payment: {}", e)))?;

        Ok(payment)
    }

    /// Persist the gateway session id on a payment. The id is unique across
    /// all payments; a collision is reported as a server error, never
    /// retried silently.
    pub async fn attach_gateway_session_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        payment_id: Uuid,
        gateway_session_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET gateway_session_id = $2
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .bind(gateway_session_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::InternalError(anyhow::anyhow!(
                    "Gateway session id collision for session {}",
                    gateway_session_id
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to attach session: {}", e)),
        })?;

        Ok(())
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Resolve a completion event: materialize the booking and mark the
    /// payment PAID, or mark it FAILED when the slot was secured by someone
    /// else first.
    ///
    /// The booking insert and the PAID transition share one transaction; a
    /// unique violation on the insert means the race was lost after our
    /// availability check, and is handled, not propagated. Status guards on
    /// the payment updates turn concurrent duplicate deliveries into
    /// `AlreadySettled` instead of double mutations.
    #[instrument(skip(self), fields(payment_id = %payment_id, slot_id = %slot_id))]
    pub async fn settle_completion(
        &self,
        payment_id: Uuid,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<SettlementOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["settle_completion"])
            .start_timer();

        let mut tx = self.begin().await?;

        let already_taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings WHERE slot_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(slot_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check slot booking: {}", e))
        })? > 0;

        if !already_taken {
            let insert = sqlx::query_as::<_, Booking>(&format!(
                r#"
                INSERT INTO bookings (booking_id, user_id, slot_id, status)
                VALUES ($1, $2, $3, '{confirmed}')
                RETURNING {BOOKING_COLUMNS}
                "#,
                confirmed = BookingStatus::Confirmed.as_str(),
            ))
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(slot_id)
            .fetch_one(&mut *tx)
            .await;

            match insert {
                Ok(booking) => {
                    let updated = sqlx::query(
                        r#"
                        UPDATE payments
                        SET status = 'PAID', booking_id = $2, paid_utc = now()
                        WHERE payment_id = $1 AND status = 'INIT'
                        "#,
                    )
                    .bind(payment_id)
                    .bind(booking.booking_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to mark payment paid: {}",
                            e
                        ))
                    })?;

                    if updated.rows_affected() == 0 {
                        // Concurrent delivery settled the payment first; the
                        // booking we just inserted belongs to that delivery's
                        // timeline, so take ours back.
                        tx.rollback().await.map_err(|e| {
                            AppError::DatabaseError(anyhow::anyhow!("Rollback failed: {}", e))
                        })?;
                        timer.observe_duration();
                        return Ok(SettlementOutcome::AlreadySettled);
                    }

                    tx.commit().await.map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!("Commit failed: {}", e))
                    })?;
                    timer.observe_duration();
                    info!(booking_id = %booking.booking_id, "Booking confirmed");
                    return Ok(SettlementOutcome::Confirmed(booking));
                }
                Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                    // Lost the race after the availability check. The failed
                    // insert aborted this transaction; fall through and mark
                    // the payment FAILED on its own.
                    drop(tx);
                }
                Err(e) => {
                    return Err(AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to create booking: {}",
                        e
                    )));
                }
            }
        } else {
            drop(tx);
        }

        let failed = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED'
            WHERE payment_id = $1 AND status = 'INIT'
            "#,
        )
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark payment failed: {}", e))
        })?;

        timer.observe_duration();

        if failed.rows_affected() == 0 {
            Ok(SettlementOutcome::AlreadySettled)
        } else {
            Ok(SettlementOutcome::SlotTaken)
        }
    }

    /// Resolve an expiry event: mark the attempt FAILED and remove it.
    /// Returns false when the payment already settled (or was already
    /// cleaned up) and nothing was changed.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn expire_payment(&self, payment_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["expire_payment"])
            .start_timer();

        let mut tx = self.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED'
            WHERE payment_id = $1 AND status <> 'PAID'
            "#,
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark payment failed: {}", e))
        })?;

        if marked.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Rollback failed: {}", e)))?;
            timer.observe_duration();
            return Ok(false);
        }

        sqlx::query("DELETE FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e))
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Commit failed: {}", e)))?;

        timer.observe_duration();

        Ok(true)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a CONFIRMED booking: mark it cancelled for the audit trail,
    /// fail and remove the trailing payment, then delete the booking row so
    /// the slot uniqueness constraint frees the slot. Returns false when the
    /// booking was not CONFIRMED (or vanished concurrently).
    #[instrument(skip(self, reason), fields(booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: Option<&str>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_booking"])
            .start_timer();

        let mut tx = self.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', cancelled_utc = now(), cancel_reason = $2
            WHERE booking_id = $1 AND status = 'CONFIRMED'
            "#,
        )
        .bind(booking_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark booking cancelled: {}", e))
        })?;

        if marked.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Rollback failed: {}", e)))?;
            timer.observe_duration();
            return Ok(false);
        }

        sqlx::query("UPDATE payments SET status = 'FAILED' WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to fail trailing payment: {}", e))
            })?;

        sqlx::query("DELETE FROM payments WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete trailing payment: {}", e))
            })?;

        sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete booking: {}", e))
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Commit failed: {}", e)))?;

        timer.observe_duration();

        Ok(true)
    }
}
