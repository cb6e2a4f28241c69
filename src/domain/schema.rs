table! {
    bug (id) {
        id -> Int4,
        bug_id -> Int4,
        summary -> Varchar,
        component -> Varchar,
        status -> Varchar,
        first_comment -> Varchar,
        council_vote_requested -> Bool,
        updated_at -> Timestamptz,
    }
}

table! {
    group_membership (fk_user, fk_group) {
        fk_user -> Int4,
        fk_group -> Int4,
    }
}

table! {
    poll (id) {
        id -> Int4,
        name -> Varchar,
        slug -> Varchar,
        description -> Varchar,
        poll_start -> Timestamptz,
        poll_end -> Timestamptz,
        fk_valid_group -> Int4,
        created_on -> Timestamptz,
        fk_created_by -> Int4,
        automated_poll -> Bool,
        fk_bug -> Nullable<Int4>,
        task_start_id -> Nullable<Varchar>,
        task_end_id -> Nullable<Varchar>,
    }
}

table! {
    poll_comment (id) {
        id -> Int4,
        fk_poll -> Int4,
        fk_user -> Int4,
        created_on -> Timestamptz,
        comment -> Varchar,
    }
}

table! {
    radio_poll (id) {
        id -> Int4,
        fk_poll -> Int4,
        question -> Varchar,
    }
}

table! {
    radio_poll_choice (id) {
        id -> Int4,
        fk_radio_poll -> Int4,
        answer -> Varchar,
        votes -> Int4,
    }
}

table! {
    range_poll (id) {
        id -> Int4,
        fk_poll -> Int4,
        name -> Varchar,
    }
}

table! {
    range_poll_choice (id) {
        id -> Int4,
        fk_range_poll -> Int4,
        fk_nominee -> Int4,
        votes -> Int4,
    }
}

table! {
    remo_group (id) {
        id -> Int4,
        name -> Varchar,
    }
}

table! {
    remo_user (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        registration_complete -> Bool,
    }
}

table! {
    scheduled_task (id) {
        id -> Int4,
        handle -> Varchar,
        kind -> Varchar,
        fk_poll -> Int4,
        run_at -> Timestamptz,
        revoked -> Bool,
        done -> Bool,
    }
}

table! {
    vote (id) {
        id -> Int4,
        fk_poll -> Int4,
        fk_user -> Int4,
        date_voted -> Timestamptz,
    }
}

joinable!(group_membership -> remo_group (fk_group));
joinable!(group_membership -> remo_user (fk_user));
joinable!(poll -> bug (fk_bug));
joinable!(poll -> remo_group (fk_valid_group));
joinable!(poll -> remo_user (fk_created_by));
joinable!(poll_comment -> poll (fk_poll));
joinable!(poll_comment -> remo_user (fk_user));
joinable!(radio_poll -> poll (fk_poll));
joinable!(radio_poll_choice -> radio_poll (fk_radio_poll));
joinable!(range_poll -> poll (fk_poll));
joinable!(range_poll_choice -> range_poll (fk_range_poll));
joinable!(range_poll_choice -> remo_user (fk_nominee));
joinable!(scheduled_task -> poll (fk_poll));
joinable!(vote -> poll (fk_poll));
joinable!(vote -> remo_user (fk_user));

allow_tables_to_appear_in_same_query!(
    bug,
    group_membership,
    poll,
    poll_comment,
    radio_poll,
    radio_poll_choice,
    range_poll,
    range_poll_choice,
    remo_group,
    remo_user,
    scheduled_task,
    vote,
);
