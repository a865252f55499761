diesel::table! {
    facts (tag_id, time) {
        tag_id -> Integer,
        time -> Timestamp,
        val -> Double,
    }
}

diesel::table! {
    logs (id) {
        id -> Nullable<Integer>,
        time -> Timestamp,
        message -> Text,
        level -> Text,
        daemon_id -> Integer,
    }
}
