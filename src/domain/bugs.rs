use chrono::{DateTime, Utc};

use super::schema::*;

#[derive(AsChangeset, Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "bug"]
pub struct NewBug<'a> {
    pub bug_id: i32,
    pub summary: &'a str,
    pub component: &'a str,
    pub status: &'a str,
    pub first_comment: &'a str,
    pub council_vote_requested: bool,
    pub updated_at: DateTime<Utc>,
}

/// Local mirror of a bug-tracker record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct Bug {
    pub id: i32,
    pub bug_id: i32,
    pub summary: String,
    pub component: String,
    pub status: String,
    pub first_comment: String,
    pub council_vote_requested: bool,
    pub updated_at: DateTime<Utc>,
}
