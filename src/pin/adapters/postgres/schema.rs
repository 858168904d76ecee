//! Diesel schema for pin persistence.

diesel::table! {
    /// Pins and their latest execution state.
    pins (id) {
        /// Pin identifier.
        id -> Uuid,
        /// Slug name, unique among live rows.
        #[max_length = 255]
        name -> Varchar,
        /// Referenced target.
        target_id -> Uuid,
        /// Query text.
        query -> Text,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Last scheduling timestamp.
        scheduled_at -> Timestamptz,
        /// Start of the last execution attempt.
        query_started_at -> Nullable<Timestamptz>,
        /// Completion of the last committed execution.
        query_finished_at -> Nullable<Timestamptz>,
        /// Column names of the last successful execution.
        results_fields -> Nullable<Jsonb>,
        /// Rows of the last successful execution.
        results_rows -> Nullable<Jsonb>,
        /// Error message of the last failed execution.
        results_error -> Nullable<Text>,
        /// Reservation marker.
        reserved_at -> Nullable<Timestamptz>,
        /// Soft-delete timestamp.
        deleted_at -> Nullable<Timestamptz>,
        /// Optimistic-locking version.
        version -> Int8,
    }
}
