//! Pin aggregate root and its execution bookkeeping.

use super::{PinId, PinName, PinQuery, PinResults};
use crate::target::domain::TargetId;
use crate::version::Version;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use mockable::Clock;

/// Thresholds deciding whether a pin may be claimed for execution.
///
/// A pin is claimable when its last execution started before
/// `started_before` (or it never ran) and it is either unreserved or its
/// reservation predates `reserved_before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimCutoffs {
    /// Latest acceptable `query_started_at`.
    pub started_before: DateTime<Utc>,
    /// Reservations older than this are considered abandoned.
    pub reserved_before: DateTime<Utc>,
}

impl ClaimCutoffs {
    /// Derives the cutoffs for `now` from the refresh interval and the
    /// reservation liveness timeout.
    #[must_use]
    pub fn at(now: DateTime<Utc>, refresh: TimeDelta, reservation_timeout: TimeDelta) -> Self {
        Self {
            started_before: window_start(now, refresh),
            reserved_before: window_start(now, reservation_timeout),
        }
    }
}

/// Returns `now - window`, saturating at the earliest representable instant.
#[must_use]
pub fn window_start(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A named query bound to one target, plus its latest execution outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    id: PinId,
    name: PinName,
    target_id: TargetId,
    query: PinQuery,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
    query_started_at: Option<DateTime<Utc>>,
    query_finished_at: Option<DateTime<Utc>>,
    results: Option<PinResults>,
    reserved_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: Version,
}

/// Parameter object for reconstructing a persisted pin.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPinData {
    /// Persisted identifier.
    pub id: PinId,
    /// Persisted name.
    pub name: PinName,
    /// Referenced target.
    pub target_id: TargetId,
    /// Query text.
    pub query: PinQuery,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last scheduling timestamp.
    pub scheduled_at: DateTime<Utc>,
    /// Start of the last execution attempt.
    pub query_started_at: Option<DateTime<Utc>>,
    /// Completion of the last committed execution.
    pub query_finished_at: Option<DateTime<Utc>>,
    /// Outcome of the last committed execution.
    pub results: Option<PinResults>,
    /// Reservation marker held by a worker.
    pub reserved_at: Option<DateTime<Utc>>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: Version,
}

impl Pin {
    /// Creates a never-executed pin scheduled at the current time.
    #[must_use]
    pub fn new(name: PinName, target_id: TargetId, query: PinQuery, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: PinId::new(),
            name,
            target_id,
            query,
            created_at: timestamp,
            updated_at: timestamp,
            scheduled_at: timestamp,
            query_started_at: None,
            query_finished_at: None,
            results: None,
            reserved_at: None,
            deleted_at: None,
            version: Version::INITIAL,
        }
    }

    /// Reconstructs a pin from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedPinData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            target_id: data.target_id,
            query: data.query,
            created_at: data.created_at,
            updated_at: data.updated_at,
            scheduled_at: data.scheduled_at,
            query_started_at: data.query_started_at,
            query_finished_at: data.query_finished_at,
            results: data.results,
            reserved_at: data.reserved_at,
            deleted_at: data.deleted_at,
            version: data.version,
        }
    }

    /// Returns the pin identifier.
    #[must_use]
    pub const fn id(&self) -> PinId {
        self.id
    }

    /// Returns the pin name.
    #[must_use]
    pub const fn name(&self) -> &PinName {
        &self.name
    }

    /// Returns the referenced target.
    #[must_use]
    pub const fn target_id(&self) -> TargetId {
        self.target_id
    }

    /// Returns the query text.
    #[must_use]
    pub const fn query(&self) -> &PinQuery {
        &self.query
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the last scheduling timestamp.
    #[must_use]
    pub const fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Returns when the last execution attempt started.
    #[must_use]
    pub const fn query_started_at(&self) -> Option<DateTime<Utc>> {
        self.query_started_at
    }

    /// Returns when the last execution was committed.
    ///
    /// `None` means the pin has not finished an execution since it was
    /// created or since its latest attempt started. An attempt that aborted
    /// leaves it `None` beside the previous results until the next commit.
    #[must_use]
    pub const fn query_finished_at(&self) -> Option<DateTime<Utc>> {
        self.query_finished_at
    }

    /// Returns the outcome of the last committed execution.
    #[must_use]
    pub const fn results(&self) -> Option<&PinResults> {
        self.results.as_ref()
    }

    /// Returns the reservation marker.
    #[must_use]
    pub const fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    /// Returns the soft-delete timestamp.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns the version this copy was read at.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns whether the pin has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns whether a worker may claim the pin under `cutoffs`.
    #[must_use]
    pub fn is_claimable(&self, cutoffs: ClaimCutoffs) -> bool {
        let idle = self
            .query_started_at
            .is_none_or(|started| started < cutoffs.started_before);
        let unreserved = self
            .reserved_at
            .is_none_or(|reserved| reserved < cutoffs.reserved_before);
        !self.is_deleted() && idle && unreserved
    }

    /// Replaces the pin name.
    pub fn rename(&mut self, name: PinName) {
        self.name = name;
    }

    /// Replaces the query text.
    pub fn set_query(&mut self, query: PinQuery) {
        self.query = query;
    }

    /// Points the pin at a different target.
    pub const fn retarget(&mut self, target_id: TargetId) {
        self.target_id = target_id;
    }

    pub(crate) fn reschedule(&mut self, clock: &impl Clock) {
        self.scheduled_at = clock.utc();
    }

    /// Sets the reservation marker and returns it as the holder's token.
    ///
    /// The token is truncated to microseconds, the precision `TIMESTAMPTZ`
    /// keeps, so it still equals the stored marker after a round trip.
    pub(crate) fn reserve(&mut self, clock: &impl Clock) -> DateTime<Utc> {
        let token = clock.utc().trunc_subsecs(6);
        self.reserved_at = Some(token);
        token
    }

    pub(crate) const fn release(&mut self) {
        self.reserved_at = None;
    }

    /// Records the start of an attempt.
    ///
    /// The previous outcome stays readable; its completion time is cleared so
    /// that `query_finished_at` never precedes `query_started_at`.
    pub(crate) fn mark_started(&mut self, clock: &impl Clock) {
        self.query_started_at = Some(clock.utc());
        self.query_finished_at = None;
    }

    pub(crate) fn record_results(&mut self, results: PinResults, clock: &impl Clock) {
        let finished = clock.utc();
        self.query_finished_at = Some(
            self.query_started_at
                .map_or(finished, |started| started.max(finished)),
        );
        self.results = Some(results);
    }

    pub(crate) fn mark_deleted(&mut self, clock: &impl Clock) {
        self.deleted_at = Some(clock.utc());
    }

    /// Produces the revision that a successful update will store.
    pub(crate) fn into_next_revision(mut self, clock: &impl Clock) -> Self {
        self.version = self.version.next();
        self.updated_at = clock.utc();
        self
    }
}
