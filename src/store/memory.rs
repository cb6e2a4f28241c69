//! In-memory `Store` used by the workflow and route tests. It keeps the
//! uniqueness rules of the SQL schema: one vote per (poll, user), one poll
//! per bug, one bug per external id, unique slugs.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{PollFields, Store};
use crate::domain::bugs::{Bug, NewBug};
use crate::domain::people::{Group, User};
use crate::domain::voting::*;
use crate::error::{DashError, DashResult};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    groups: Vec<Group>,
    memberships: Vec<(i32, i32)>,
    polls: Vec<Poll>,
    range_polls: Vec<RangePoll>,
    range_choices: Vec<RangePollChoice>,
    radio_polls: Vec<RadioPoll>,
    radio_choices: Vec<RadioPollChoice>,
    votes: Vec<Vote>,
    comments: Vec<PollComment>,
    bugs: Vec<Bug>,
    tasks: Vec<ScheduledTask>,
    faults: Vec<(&'static str, usize)>,
}

impl Tables {
    fn id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn take_fault(&mut self, op: &str) -> bool {
        let mut hit = false;
        for (_, countdown) in self.faults.iter_mut().filter(|(name, _)| *name == op) {
            *countdown -= 1;
            hit |= *countdown == 0;
        }
        self.faults.retain(|(_, countdown)| *countdown > 0);
        hit
    }

    fn user(&self, id: i32) -> DashResult<User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| misc!("no user {}", id))
    }

    fn sync_range_polls(&mut self, poll_id: i32, drafts: &[RangePollDraft]) {
        let stale: Vec<i32> = self
            .range_polls
            .iter()
            .filter(|rp| rp.fk_poll == poll_id && !drafts.iter().any(|d| d.id == Some(rp.id)))
            .map(|rp| rp.id)
            .collect();
        self.range_polls.retain(|rp| !stale.contains(&rp.id));
        self.range_choices.retain(|c| !stale.contains(&c.fk_range_poll));

        for draft in drafts {
            let existing = draft
                .id
                .filter(|id| self.range_polls.iter().any(|rp| rp.id == *id && rp.fk_poll == poll_id));
            let item_id = match existing {
                Some(id) => {
                    if let Some(rp) = self.range_polls.iter_mut().find(|rp| rp.id == id) {
                        rp.name = draft.name.clone();
                    }
                    id
                }
                None => {
                    let id = self.id();
                    self.range_polls.push(RangePoll { id, fk_poll: poll_id, name: draft.name.clone() });
                    id
                }
            };

            self.range_choices
                .retain(|c| c.fk_range_poll != item_id || draft.nominees.contains(&c.fk_nominee));
            for &nominee in &draft.nominees {
                let present = self
                    .range_choices
                    .iter()
                    .any(|c| c.fk_range_poll == item_id && c.fk_nominee == nominee);
                if !present {
                    let id = self.id();
                    self.range_choices.push(RangePollChoice {
                        id,
                        fk_range_poll: item_id,
                        fk_nominee: nominee,
                        votes: 0,
                    });
                }
            }
        }
    }

    fn sync_radio_polls(&mut self, poll_id: i32, drafts: &[RadioPollDraft]) {
        let stale: Vec<i32> = self
            .radio_polls
            .iter()
            .filter(|rp| rp.fk_poll == poll_id && !drafts.iter().any(|d| d.id == Some(rp.id)))
            .map(|rp| rp.id)
            .collect();
        self.radio_polls.retain(|rp| !stale.contains(&rp.id));
        self.radio_choices.retain(|c| !stale.contains(&c.fk_radio_poll));

        for draft in drafts {
            let existing = draft
                .id
                .filter(|id| self.radio_polls.iter().any(|rp| rp.id == *id && rp.fk_poll == poll_id));
            let item_id = match existing {
                Some(id) => {
                    if let Some(rp) = self.radio_polls.iter_mut().find(|rp| rp.id == id) {
                        rp.question = draft.question.clone();
                    }
                    id
                }
                None => {
                    let id = self.id();
                    self.radio_polls.push(RadioPoll {
                        id,
                        fk_poll: poll_id,
                        question: draft.question.clone(),
                    });
                    id
                }
            };

            self.radio_choices
                .retain(|c| c.fk_radio_poll != item_id || draft.answers.contains(&c.answer));
            for answer in &draft.answers {
                let present = self
                    .radio_choices
                    .iter()
                    .any(|c| c.fk_radio_poll == item_id && &c.answer == answer);
                if !present {
                    let id = self.id();
                    self.radio_choices.push(RadioPollChoice {
                        id,
                        fk_radio_poll: item_id,
                        answer: answer.clone(),
                        votes: 0,
                    });
                }
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_group(&self, name: &str) -> Group {
        let mut t = self.lock();
        let group = Group { id: t.id(), name: name.to_string() };
        t.groups.push(group.clone());
        group
    }

    pub fn add_user(&self, username: &str, groups: &[&Group]) -> User {
        let mut t = self.lock();
        let user = User {
            id: t.id(),
            username: username.to_string(),
            email: format!("{}@example.org", username),
            first_name: username.to_string(),
            last_name: "Rep".to_string(),
            registration_complete: true,
        };
        t.users.push(user.clone());
        for group in groups {
            t.memberships.push((user.id, group.id));
        }
        user
    }

    pub fn votes(&self, poll_id: i32) -> Vec<Vote> {
        self.lock().votes.iter().filter(|v| v.fk_poll == poll_id).cloned().collect()
    }

    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.lock().tasks.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.lock().polls.len()
    }

    /// Makes the `nth` next `op` call misbehave: `schedule_task` fails and
    /// `slug_taken` answers `false` whatever the stored slugs are.
    pub fn fail_call(&self, op: &'static str, nth: usize) {
        self.lock().faults.push((op, nth));
    }
}

impl Store for MemoryStore {
    fn user_by_username(&self, username: &str) -> DashResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    fn groups_of(&self, user_id: i32) -> DashResult<Vec<Group>> {
        let t = self.lock();
        let mut groups: Vec<Group> = t
            .groups
            .iter()
            .filter(|g| t.memberships.contains(&(user_id, g.id)))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    fn groups(&self) -> DashResult<Vec<Group>> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    fn group_by_name(&self, name: &str) -> DashResult<Option<Group>> {
        Ok(self.lock().groups.iter().find(|g| g.name == name).cloned())
    }

    fn group_members(&self, group_id: i32) -> DashResult<Vec<User>> {
        let t = self.lock();
        let mut members: Vec<User> = t
            .users
            .iter()
            .filter(|u| t.memberships.contains(&(u.id, group_id)))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(members)
    }

    fn polls(&self) -> DashResult<Vec<Poll>> {
        let mut polls = self.lock().polls.clone();
        polls.sort_by(|a, b| b.poll_start.cmp(&a.poll_start));
        Ok(polls)
    }

    fn poll_by_slug(&self, slug: &str) -> DashResult<Option<Poll>> {
        Ok(self.lock().polls.iter().find(|p| p.slug == slug).cloned())
    }

    fn poll_by_id(&self, id: i32) -> DashResult<Option<Poll>> {
        Ok(self.lock().polls.iter().find(|p| p.id == id).cloned())
    }

    fn poll_for_bug(&self, fk_bug: i32) -> DashResult<Option<Poll>> {
        Ok(self.lock().polls.iter().find(|p| p.fk_bug == Some(fk_bug)).cloned())
    }

    fn slug_taken(&self, slug: &str) -> DashResult<bool> {
        let mut t = self.lock();
        if t.take_fault("slug_taken") {
            return Ok(false);
        }
        Ok(t.polls.iter().any(|p| p.slug == slug))
    }

    fn save_poll(
        &self,
        id: Option<i32>,
        fields: &PollFields,
        draft: Option<&BallotDraft>,
    ) -> DashResult<Poll> {
        let mut t = self.lock();
        let saved = match id {
            Some(id) => {
                let poll = t
                    .polls
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| misc!("no poll {}", id))?;
                poll.name = fields.name.clone();
                poll.description = fields.description.clone();
                poll.poll_start = fields.poll_start;
                poll.poll_end = fields.poll_end;
                poll.fk_valid_group = fields.fk_valid_group;
                poll.clone()
            }
            None => {
                if t.polls.iter().any(|p| p.slug == fields.slug) {
                    return Err(DashError::Conflict(format!("slug {} exists", fields.slug)));
                }
                if fields.fk_bug.is_some() && t.polls.iter().any(|p| p.fk_bug == fields.fk_bug) {
                    return Err(DashError::Conflict("bug already has a poll".to_string()));
                }
                let poll = Poll {
                    id: t.id(),
                    name: fields.name.clone(),
                    slug: fields.slug.clone(),
                    description: fields.description.clone(),
                    poll_start: fields.poll_start,
                    poll_end: fields.poll_end,
                    fk_valid_group: fields.fk_valid_group,
                    created_on: fields.created_on,
                    fk_created_by: fields.fk_created_by,
                    automated_poll: fields.automated_poll,
                    fk_bug: fields.fk_bug,
                    task_start_id: None,
                    task_end_id: None,
                };
                t.polls.push(poll.clone());
                poll
            }
        };

        if let Some(draft) = draft {
            t.sync_range_polls(saved.id, &draft.range_polls);
            t.sync_radio_polls(saved.id, &draft.radio_polls);
        }

        Ok(saved)
    }

    fn set_poll_tasks(&self, poll_id: i32, start: Option<&str>, end: Option<&str>) -> DashResult<()> {
        let mut t = self.lock();
        if let Some(poll) = t.polls.iter_mut().find(|p| p.id == poll_id) {
            poll.task_start_id = start.map(String::from);
            poll.task_end_id = end.map(String::from);
        }
        Ok(())
    }

    fn delete_poll(&self, poll_id: i32) -> DashResult<()> {
        let mut t = self.lock();
        let range_ids: Vec<i32> = t.range_polls.iter().filter(|r| r.fk_poll == poll_id).map(|r| r.id).collect();
        let radio_ids: Vec<i32> = t.radio_polls.iter().filter(|r| r.fk_poll == poll_id).map(|r| r.id).collect();
        t.range_choices.retain(|c| !range_ids.contains(&c.fk_range_poll));
        t.radio_choices.retain(|c| !radio_ids.contains(&c.fk_radio_poll));
        t.range_polls.retain(|r| r.fk_poll != poll_id);
        t.radio_polls.retain(|r| r.fk_poll != poll_id);
        t.votes.retain(|v| v.fk_poll != poll_id);
        t.comments.retain(|c| c.fk_poll != poll_id);
        t.tasks.retain(|task| task.fk_poll != poll_id);
        t.polls.retain(|p| p.id != poll_id);
        Ok(())
    }

    fn ballot(&self, poll_id: i32) -> DashResult<Ballot> {
        let t = self.lock();
        let mut ballot = Ballot::default();
        for item in t.range_polls.iter().filter(|r| r.fk_poll == poll_id) {
            let mut choices = Vec::new();
            for choice in t.range_choices.iter().filter(|c| c.fk_range_poll == item.id) {
                choices.push((choice.clone(), t.user(choice.fk_nominee)?));
            }
            ballot.range_polls.push(RangeItem { poll: item.clone(), choices });
        }
        for item in t.radio_polls.iter().filter(|r| r.fk_poll == poll_id) {
            let choices = t
                .radio_choices
                .iter()
                .filter(|c| c.fk_radio_poll == item.id)
                .cloned()
                .collect();
            ballot.radio_polls.push(RadioItem { poll: item.clone(), choices });
        }
        Ok(ballot)
    }

    fn has_voted(&self, poll_id: i32, user_id: i32) -> DashResult<bool> {
        Ok(self.lock().votes.iter().any(|v| v.fk_poll == poll_id && v.fk_user == user_id))
    }

    fn voter_ids(&self, poll_id: i32) -> DashResult<Vec<i32>> {
        Ok(self.lock().votes.iter().filter(|v| v.fk_poll == poll_id).map(|v| v.fk_user).collect())
    }

    fn record_ballot(&self, cast: &CastBallot) -> DashResult<()> {
        let mut t = self.lock();
        if t.votes.iter().any(|v| v.fk_poll == cast.fk_poll && v.fk_user == cast.fk_user) {
            return Err(DashError::Conflict("vote exists".to_string()));
        }
        for &(choice_id, score) in &cast.range_scores {
            if let Some(choice) = t.range_choices.iter_mut().find(|c| c.id == choice_id) {
                choice.votes += score;
            }
        }
        for &choice_id in &cast.radio_choices {
            if let Some(choice) = t.radio_choices.iter_mut().find(|c| c.id == choice_id) {
                choice.votes += 1;
            }
        }
        if let Some(ref comment) = cast.comment {
            let id = t.id();
            t.comments.push(PollComment {
                id,
                fk_poll: cast.fk_poll,
                fk_user: cast.fk_user,
                created_on: cast.cast_at,
                comment: comment.clone(),
            });
        }
        let id = t.id();
        t.votes.push(Vote {
            id,
            fk_poll: cast.fk_poll,
            fk_user: cast.fk_user,
            date_voted: cast.cast_at,
        });
        Ok(())
    }

    fn comments(&self, poll_id: i32) -> DashResult<Vec<(PollComment, User)>> {
        let t = self.lock();
        let mut comments = Vec::new();
        for comment in t.comments.iter().filter(|c| c.fk_poll == poll_id) {
            comments.push((comment.clone(), t.user(comment.fk_user)?));
        }
        Ok(comments)
    }

    fn save_bug(&self, record: &NewBug<'_>) -> DashResult<Bug> {
        let mut t = self.lock();
        let existing = t.bugs.iter().find(|b| b.bug_id == record.bug_id).map(|b| b.id);
        let id = match existing {
            Some(id) => id,
            None => t.id(),
        };
        let bug = Bug {
            id,
            bug_id: record.bug_id,
            summary: record.summary.to_string(),
            component: record.component.to_string(),
            status: record.status.to_string(),
            first_comment: record.first_comment.to_string(),
            council_vote_requested: record.council_vote_requested,
            updated_at: record.updated_at,
        };
        t.bugs.retain(|b| b.bug_id != record.bug_id);
        t.bugs.push(bug.clone());
        Ok(bug)
    }

    fn schedule_task(&self, task: &NewScheduledTask<'_>) -> DashResult<ScheduledTask> {
        let mut t = self.lock();
        if t.take_fault("schedule_task") {
            return Err(misc!("scheduler unavailable"));
        }
        if t.tasks.iter().any(|existing| existing.handle == task.handle) {
            return Err(DashError::Conflict(format!("task {} exists", task.handle)));
        }
        let task = ScheduledTask {
            id: t.id(),
            handle: task.handle.to_string(),
            kind: task.kind.to_string(),
            fk_poll: task.fk_poll,
            run_at: task.run_at,
            revoked: task.revoked,
            done: task.done,
        };
        t.tasks.push(task.clone());
        Ok(task)
    }

    fn revoke_task(&self, handle: &str) -> DashResult<()> {
        let mut t = self.lock();
        for task in t.tasks.iter_mut().filter(|task| task.handle == handle) {
            task.revoked = true;
        }
        Ok(())
    }

    fn poll_tasks(&self, poll_id: i32) -> DashResult<Vec<ScheduledTask>> {
        Ok(self.lock().tasks.iter().filter(|task| task.fk_poll == poll_id).cloned().collect())
    }

    fn due_tasks(&self, now: DateTime<Utc>) -> DashResult<Vec<ScheduledTask>> {
        let mut due: Vec<ScheduledTask> = self
            .lock()
            .tasks
            .iter()
            .filter(|task| task.run_at <= now && !task.revoked && !task.done)
            .cloned()
            .collect();
        due.sort_by_key(|task| task.run_at);
        Ok(due)
    }

    fn finish_task(&self, task_id: i32) -> DashResult<()> {
        let mut t = self.lock();
        for task in t.tasks.iter_mut().filter(|task| task.id == task_id) {
            task.done = true;
        }
        Ok(())
    }
}
