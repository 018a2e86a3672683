use async_trait::async_trait;
use chrono::Utc;
use slotgate_core::booking::{Booking, BookingDraft, BookingId};
use slotgate_core::error::BookingError;
use slotgate_core::ledger::BookingLedger;
use slotgate_core::rules::BookingRules;
use slotgate_core::slot::SlotKey;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

/// Postgres-backed booking ledger. All locking lives in the database so
/// correctness holds across multiple service instances; there is no
/// in-process mutex anywhere on this path.
pub struct PgBookingLedger {
    pool: PgPool,
    rules: BookingRules,
}

/// Upper bound on any single lock wait inside the booking transaction.
const LOCK_TIMEOUT: &str = "5s";

impl PgBookingLedger {
    pub fn new(pool: PgPool, rules: BookingRules) -> Self {
        Self { pool, rules }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    booking_id: String,
    username: String,
    email: String,
    identity_number: String,
    slot_time: chrono::NaiveDateTime,
    ticket_count: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl BookingRow {
    fn into_booking(self, passenger_names: Vec<String>) -> Result<Booking, BookingError> {
        let booking_id = BookingId::parse(&self.booking_id).ok_or_else(|| {
            BookingError::Unknown(format!("malformed booking id in store: {}", self.booking_id))
        })?;
        Ok(Booking {
            booking_id,
            username: self.username,
            email: self.email,
            identity_number: self.identity_number,
            slot: SlotKey::derive(self.slot_time),
            ticket_count: self.ticket_count as u32,
            passenger_names,
            created_at: self.created_at,
        })
    }
}

/// Generic sqlx error mapping. Call sites that can attribute a database
/// error more precisely (duplicate lock, id conflict) do so themselves.
fn map_store_err(e: sqlx::Error) -> BookingError {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // lock_not_available: a bounded lock wait expired
            Some("55P03") => BookingError::Timeout,
            _ => BookingError::Unknown(e.to_string()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            BookingError::StoreUnavailable(e.to_string())
        }
        _ => BookingError::Unknown(e.to_string()),
    }
}

/// Roll back and swallow the secondary error; the caller already has
/// the error that matters.
async fn abort(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        warn!("booking transaction rollback failed: {}", e);
    }
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn attempt_booking(&self, draft: &BookingDraft) -> Result<Booking, BookingError> {
        let slot_key = draft.slot.storage_key();
        let slot_time = draft.slot.as_naive();
        let count = draft.ticket_count as i64;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BookingError::StoreUnavailable(e.to_string()))?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{}'", LOCK_TIMEOUT))
            .execute(&mut *tx)
            .await
            .map_err(map_store_err)?;

        // Step 1: exclusive lock on the (identity, slot) pair. Advisory
        // xact locks release at transaction end, exactly the lifetime a
        // SlotLock needs, so a rolled-back attempt never blocks retries.
        let acquired: bool = sqlx::query_scalar(
            "SELECT pg_try_advisory_xact_lock(hashtext($1), hashtext($2))",
        )
        .bind(&draft.identity_number)
        .bind(&slot_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_store_err)?;

        if !acquired {
            abort(tx).await;
            return Err(BookingError::DuplicateInProgress);
        }

        // Step 2: in-flight marker row. The unique key doubles as a
        // cross-engine guard; a conflicting insert means another
        // transaction holds the pair.
        if let Err(e) = sqlx::query(
            "INSERT INTO slot_locks (identity_number, slot_time) VALUES ($1, $2)",
        )
        .bind(&draft.identity_number)
        .bind(slot_time)
        .execute(&mut *tx)
        .await
        {
            abort(tx).await;
            return Err(match &e {
                sqlx::Error::Database(db)
                    if matches!(db.code().as_deref(), Some("23505") | Some("55P03")) =>
                {
                    BookingError::DuplicateInProgress
                }
                _ => map_store_err(e),
            });
        }

        // Step 3: serialize all capacity accounting for this slot. The
        // wait is bounded by lock_timeout set above.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('slot_capacity'), hashtext($1))")
            .bind(&slot_key)
            .execute(&mut *tx)
            .await
            .map_err(map_store_err)?;

        let slot_total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(ticket_count), 0) FROM bookings WHERE slot_time = $1",
        )
        .bind(slot_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_store_err)?;

        if slot_total + count > self.rules.slot_capacity {
            abort(tx).await;
            return Err(BookingError::SlotFull);
        }

        let identity_total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(ticket_count), 0) FROM bookings \
             WHERE identity_number = $1 AND slot_time = $2",
        )
        .bind(&draft.identity_number)
        .bind(slot_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_store_err)?;

        if identity_total + count > self.rules.per_identity_limit {
            abort(tx).await;
            return Err(BookingError::PerIdentityLimitExceeded);
        }

        let booking_id = BookingId::generate();
        let created_at = Utc::now();

        if let Err(e) = sqlx::query(
            "INSERT INTO bookings \
             (booking_id, username, email, identity_number, slot_time, ticket_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(booking_id.as_str())
        .bind(&draft.username)
        .bind(&draft.email)
        .bind(&draft.identity_number)
        .bind(slot_time)
        .bind(draft.ticket_count as i32)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        {
            abort(tx).await;
            // An id collision is an insert conflict and stays fatal;
            // retrying with the same id would be worse than failing.
            return Err(map_store_err(e));
        }

        for name in &draft.passenger_names {
            if let Err(e) = sqlx::query(
                "INSERT INTO passengers (booking_id, passenger_name) VALUES ($1, $2)",
            )
            .bind(booking_id.as_str())
            .bind(name)
            .execute(&mut *tx)
            .await
            {
                abort(tx).await;
                return Err(map_store_err(e));
            }
        }

        // The marker row must not outlive the transaction that created
        // it, so it goes away before the commit makes anything durable.
        if let Err(e) = sqlx::query(
            "DELETE FROM slot_locks WHERE identity_number = $1 AND slot_time = $2",
        )
        .bind(&draft.identity_number)
        .bind(slot_time)
        .execute(&mut *tx)
        .await
        {
            abort(tx).await;
            return Err(map_store_err(e));
        }

        tx.commit()
            .await
            .map_err(|e| BookingError::StoreUnavailable(e.to_string()))?;

        info!(
            booking_id = %booking_id,
            slot = %draft.slot,
            tickets = draft.ticket_count,
            "booking committed"
        );

        Ok(Booking {
            booking_id,
            username: draft.username.clone(),
            email: draft.email.clone(),
            identity_number: draft.identity_number.clone(),
            slot: draft.slot,
            ticket_count: draft.ticket_count,
            passenger_names: draft.passenger_names.clone(),
            created_at,
        })
    }

    async fn latest_booking(
        &self,
        identity_number: &str,
        email: &str,
    ) -> Result<Option<Booking>, BookingError> {
        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT booking_id, username, email, identity_number, slot_time, ticket_count, created_at \
             FROM bookings WHERE identity_number = $1 AND email = $2 \
             ORDER BY slot_time DESC LIMIT 1",
        )
        .bind(identity_number)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let passenger_names: Vec<String> = sqlx::query_scalar(
            "SELECT passenger_name FROM passengers WHERE booking_id = $1 ORDER BY id",
        )
        .bind(&row.booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_err)?;

        row.into_booking(passenger_names).map(Some)
    }

    async fn slot_availability(&self, slot: SlotKey) -> Result<i64, BookingError> {
        let booked: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(ticket_count), 0) FROM bookings WHERE slot_time = $1",
        )
        .bind(slot.as_naive())
        .fetch_one(&self.pool)
        .await
        .map_err(map_store_err)?;

        Ok((self.rules.slot_capacity - booked).max(0))
    }
}
