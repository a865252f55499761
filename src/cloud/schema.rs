diesel::table! {
    daemons (id) {
        id -> Integer,
        config_key -> Text,
        active -> Bool,
        last_communication -> Nullable<Timestamp>,
    }
}

diesel::table! {
    sources (id) {
        id -> Integer,
        daemon_id -> Integer,
        active -> Bool,
        address -> Text,
        driver -> Text,
        last_communication -> Nullable<Timestamp>,
    }
}

diesel::table! {
    tags (id) {
        id -> Integer,
        name -> Text,
        data_type_name -> Text,
        source_id -> Integer,
        monitor -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    facts (tag_id, time) {
        tag_id -> Integer,
        time -> Timestamp,
        val -> Double,
    }
}

diesel::table! {
    logs (time, daemon_id) {
        time -> Timestamp,
        message -> Text,
        level -> Text,
        daemon_id -> Integer,
    }
}

diesel::joinable!(sources -> daemons (daemon_id));
diesel::joinable!(tags -> sources (source_id));
diesel::allow_tables_to_appear_in_same_query!(daemons, sources, tags, facts, logs);
