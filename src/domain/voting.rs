use chrono::{DateTime, Utc};

use super::people::User;
use super::schema::*;

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "poll"]
pub struct NewPoll<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
    pub poll_start: DateTime<Utc>,
    pub poll_end: DateTime<Utc>,
    pub fk_valid_group: i32,
    pub created_on: DateTime<Utc>,
    pub fk_created_by: i32,
    pub automated_poll: bool,
    pub fk_bug: Option<i32>,
}

/// The fields an edit may change; creator, slug and bug link are fixed at
/// creation.
#[derive(AsChangeset, Clone, Debug, Eq, PartialEq)]
#[table_name = "poll"]
pub struct PollChanges<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub poll_start: DateTime<Utc>,
    pub poll_end: DateTime<Utc>,
    pub fk_valid_group: i32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct Poll {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub poll_start: DateTime<Utc>,
    pub poll_end: DateTime<Utc>,
    pub fk_valid_group: i32,
    pub created_on: DateTime<Utc>,
    pub fk_created_by: i32,
    pub automated_poll: bool,
    pub fk_bug: Option<i32>,
    pub task_start_id: Option<String>,
    pub task_end_id: Option<String>,
}

/// Where an instant falls relative to a poll's `[start, end)` window.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Future,
    Current,
    Past,
}

impl Poll {
    pub fn phase(&self, now: DateTime<Utc>) -> PollPhase {
        if now >= self.poll_end {
            PollPhase::Past
        } else if now < self.poll_start {
            PollPhase::Future
        } else {
            PollPhase::Current
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct RangePoll {
    pub id: i32,
    pub fk_poll: i32,
    pub name: String,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "range_poll"]
pub struct NewRangePoll<'a> {
    pub fk_poll: i32,
    pub name: &'a str,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct RangePollChoice {
    pub id: i32,
    pub fk_range_poll: i32,
    pub fk_nominee: i32,
    pub votes: i32,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "range_poll_choice"]
pub struct NewRangePollChoice {
    pub fk_range_poll: i32,
    pub fk_nominee: i32,
    pub votes: i32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct RadioPoll {
    pub id: i32,
    pub fk_poll: i32,
    pub question: String,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "radio_poll"]
pub struct NewRadioPoll<'a> {
    pub fk_poll: i32,
    pub question: &'a str,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct RadioPollChoice {
    pub id: i32,
    pub fk_radio_poll: i32,
    pub answer: String,
    pub votes: i32,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "radio_poll_choice"]
pub struct NewRadioPollChoice<'a> {
    pub fk_radio_poll: i32,
    pub answer: &'a str,
    pub votes: i32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct Vote {
    pub id: i32,
    pub fk_poll: i32,
    pub fk_user: i32,
    pub date_voted: DateTime<Utc>,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "vote"]
pub struct NewVote {
    pub fk_poll: i32,
    pub fk_user: i32,
    pub date_voted: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct PollComment {
    pub id: i32,
    pub fk_poll: i32,
    pub fk_user: i32,
    pub created_on: DateTime<Utc>,
    pub comment: String,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "poll_comment"]
pub struct NewPollComment<'a> {
    pub fk_poll: i32,
    pub fk_user: i32,
    pub created_on: DateTime<Utc>,
    pub comment: &'a str,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Queryable, Serialize)]
pub struct ScheduledTask {
    pub id: i32,
    pub handle: String,
    pub kind: String,
    pub fk_poll: i32,
    pub run_at: DateTime<Utc>,
    pub revoked: bool,
    pub done: bool,
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq)]
#[table_name = "scheduled_task"]
pub struct NewScheduledTask<'a> {
    pub handle: &'a str,
    pub kind: &'a str,
    pub fk_poll: i32,
    pub run_at: DateTime<Utc>,
    pub revoked: bool,
    pub done: bool,
}

//==============================================================================
// Aggregates
//==============================================================================

/// A range item with its choices and the nominee behind each choice.
#[derive(Clone, Debug, Serialize)]
pub struct RangeItem {
    pub poll: RangePoll,
    pub choices: Vec<(RangePollChoice, User)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RadioItem {
    pub poll: RadioPoll,
    pub choices: Vec<RadioPollChoice>,
}

/// Every ballot item of a poll, in creation order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Ballot {
    pub range_polls: Vec<RangeItem>,
    pub radio_polls: Vec<RadioItem>,
}

impl Ballot {
    pub fn is_empty(&self) -> bool {
        self.range_polls.is_empty() && self.radio_polls.is_empty()
    }
}

/// Desired item structure of a poll as submitted through the poll form.
/// Items with an `id` update that item; stored items missing from the draft
/// are deleted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BallotDraft {
    pub range_polls: Vec<RangePollDraft>,
    pub radio_polls: Vec<RadioPollDraft>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangePollDraft {
    pub id: Option<i32>,
    pub name: String,
    pub nominees: Vec<i32>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RadioPollDraft {
    pub id: Option<i32>,
    pub question: String,
    pub answers: Vec<String>,
}

/// A validated ballot ready to be recorded for one voter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CastBallot {
    pub fk_poll: i32,
    pub fk_user: i32,
    /// (range choice id, score)
    pub range_scores: Vec<(i32, i32)>,
    /// radio choice ids
    pub radio_choices: Vec<i32>,
    pub comment: Option<String>,
    pub cast_at: DateTime<Utc>,
}
