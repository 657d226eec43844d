//! Diesel schema definitions for Evolve server.

diesel::table! {
    evolution_logs (id) {
        id -> Text,
        repository_id -> Text,
        suggestion_text -> Text,
        status -> Text,
        pr_url -> Nullable<Text>,
        diff_content -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}
