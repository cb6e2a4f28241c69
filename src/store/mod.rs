//! Persistence boundary of the voting application.
//!
//! Every multi-row write is atomic: `save_poll` stores a poll together with
//! its items, and `record_ballot` stores the tallies, the comment and the
//! vote marker in one unit, refusing with `DashError::Conflict` when the
//! voter already has a vote on the poll.

use chrono::{DateTime, Utc};

use crate::domain::bugs::{Bug, NewBug};
use crate::domain::people::{Group, User};
use crate::domain::voting::*;
use crate::error::DashResult;

#[cfg(test)]
pub mod memory;
pub mod pg;

/// Poll fields as written by the create/edit workflow and the automated
/// trigger. `slug`, `fk_created_by`, `automated_poll`, `fk_bug` and
/// `created_on` are only used when creating.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollFields {
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
}

impl PollFields {
    pub fn as_new(&self) -> NewPoll<'_> {
        NewPoll {
            name: &self.name,
            slug: &self.slug,
            description: &self.description,
            poll_start: self.poll_start,
            poll_end: self.poll_end,
            fk_valid_group: self.fk_valid_group,
            created_on: self.created_on,
            fk_created_by: self.fk_created_by,
            automated_poll: self.automated_poll,
            fk_bug: self.fk_bug,
        }
    }

    pub fn as_changes(&self) -> PollChanges<'_> {
        PollChanges {
            name: &self.name,
            description: &self.description,
            poll_start: self.poll_start,
            poll_end: self.poll_end,
            fk_valid_group: self.fk_valid_group,
        }
    }
}

pub trait Store: Send + Sync {
    // users and groups
    fn user_by_username(&self, username: &str) -> DashResult<Option<User>>;
    fn groups_of(&self, user_id: i32) -> DashResult<Vec<Group>>;
    fn groups(&self) -> DashResult<Vec<Group>>;
    fn group_by_name(&self, name: &str) -> DashResult<Option<Group>>;
    fn group_members(&self, group_id: i32) -> DashResult<Vec<User>>;

    // polls
    fn polls(&self) -> DashResult<Vec<Poll>>;
    fn poll_by_slug(&self, slug: &str) -> DashResult<Option<Poll>>;
    fn poll_by_id(&self, id: i32) -> DashResult<Option<Poll>>;
    fn poll_for_bug(&self, fk_bug: i32) -> DashResult<Option<Poll>>;
    fn slug_taken(&self, slug: &str) -> DashResult<bool>;
    /// Creates (`id` is `None`) or updates a poll. When `draft` is given the
    /// poll's items are brought in line with it in the same transaction.
    fn save_poll(&self, id: Option<i32>, fields: &PollFields, draft: Option<&BallotDraft>)
        -> DashResult<Poll>;
    fn set_poll_tasks(&self, poll_id: i32, start: Option<&str>, end: Option<&str>) -> DashResult<()>;
    /// Deletes the poll with its items, votes, comments and tasks.
    fn delete_poll(&self, poll_id: i32) -> DashResult<()>;
    fn ballot(&self, poll_id: i32) -> DashResult<Ballot>;

    // votes
    fn has_voted(&self, poll_id: i32, user_id: i32) -> DashResult<bool>;
    fn voter_ids(&self, poll_id: i32) -> DashResult<Vec<i32>>;
    fn record_ballot(&self, cast: &CastBallot) -> DashResult<()>;
    fn comments(&self, poll_id: i32) -> DashResult<Vec<(PollComment, User)>>;

    // bug mirror
    /// Inserts the bug or updates the record with the same external id.
    fn save_bug(&self, bug: &NewBug<'_>) -> DashResult<Bug>;

    // deferred tasks
    fn schedule_task(&self, task: &NewScheduledTask<'_>) -> DashResult<ScheduledTask>;
    fn revoke_task(&self, handle: &str) -> DashResult<()>;
    /// Every task of the poll, in scheduling order.
    fn poll_tasks(&self, poll_id: i32) -> DashResult<Vec<ScheduledTask>>;
    fn due_tasks(&self, now: DateTime<Utc>) -> DashResult<Vec<ScheduledTask>>;
    fn finish_task(&self, task_id: i32) -> DashResult<()>;
}
