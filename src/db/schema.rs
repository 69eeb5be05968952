diesel::table! {
    games (id) {
        id -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        status -> Text,
        config -> Text,
        current_turn -> Integer,
        final_outcome -> Nullable<Text>,
        metadata -> Text,
    }
}

diesel::table! {
    game_states (id) {
        id -> Text,
        game_id -> Text,
        turn_number -> Integer,
        state_blob -> Text,
        created_at -> Timestamp,
        checksum -> Text,
    }
}

diesel::table! {
    players (id) {
        id -> Text,
        game_id -> Text,
        seat_id -> Text,
        agent_type -> Text,
        agent_config -> Text,
        role -> Text,
        allegiance -> Text,
        alive -> Bool,
    }
}

diesel::table! {
    actions (id) {
        id -> Text,
        game_id -> Text,
        turn_number -> Integer,
        actor_id -> Text,
        kind -> Text,
        params -> Text,
        is_valid -> Nullable<Bool>,
        error -> Nullable<Text>,
        processing_ms -> Nullable<Integer>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    events (id) {
        id -> Text,
        game_id -> Text,
        turn_number -> Integer,
        #[sql_name = "type"]
        event_type -> Text,
        actor_id -> Nullable<Text>,
        payload -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> Text,
        game_id -> Text,
        turn_number -> Integer,
        speaker_id -> Text,
        message -> Text,
        phase -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    agent_metrics (id) {
        id -> Text,
        game_id -> Text,
        actor_id -> Text,
        turn_number -> Integer,
        tokens -> Nullable<Integer>,
        response_ms -> Nullable<Integer>,
        invalid_attempts -> Integer,
        state_size -> Nullable<Integer>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(game_states -> games (game_id));
diesel::joinable!(players -> games (game_id));
diesel::joinable!(actions -> games (game_id));
diesel::joinable!(events -> games (game_id));
diesel::joinable!(chat_messages -> games (game_id));
diesel::joinable!(agent_metrics -> games (game_id));

diesel::allow_tables_to_appear_in_same_query!(
    games,
    game_states,
    players,
    actions,
    events,
    chat_messages,
    agent_metrics,
);
