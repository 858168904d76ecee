//! Diesel schema for target persistence.

diesel::table! {
    /// Registered target databases.
    targets (id) {
        /// Target identifier.
        id -> Uuid,
        /// Slug name, unique among live rows.
        #[max_length = 255]
        name -> Varchar,
        /// Connection URL sealed by the configured cipher.
        url_encrypted -> Bytea,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Soft-delete timestamp.
        deleted_at -> Nullable<Timestamptz>,
        /// Optimistic-locking version.
        version -> Int8,
    }
}
