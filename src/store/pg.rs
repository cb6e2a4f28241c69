use chrono::{DateTime, Utc};
use diesel;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use super::{PollFields, Store};
use crate::domain::bugs::{Bug, NewBug};
use crate::domain::people::{Group, User};
use crate::domain::schema::*;
use crate::domain::voting::*;
use crate::error::{DashError, DashResult};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// `Store` backed by PostgreSQL. The schema lives in `migrations/`; deleting a
/// poll relies on its `ON DELETE CASCADE` foreign keys.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    fn conn(&self) -> DashResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

impl Store for PgStore {
    fn user_by_username(&self, username: &str) -> DashResult<Option<User>> {
        let conn = &*self.conn()?;
        Ok(remo_user::table
            .filter(remo_user::username.eq(username))
            .first::<User>(conn)
            .optional()?)
    }

    fn groups_of(&self, user_id: i32) -> DashResult<Vec<Group>> {
        let conn = &*self.conn()?;
        Ok(group_membership::table
            .inner_join(remo_group::table)
            .filter(group_membership::fk_user.eq(user_id))
            .select(remo_group::all_columns)
            .order(remo_group::name)
            .load::<Group>(conn)?)
    }

    fn groups(&self) -> DashResult<Vec<Group>> {
        let conn = &*self.conn()?;
        Ok(remo_group::table.order(remo_group::name).load::<Group>(conn)?)
    }

    fn group_by_name(&self, name: &str) -> DashResult<Option<Group>> {
        let conn = &*self.conn()?;
        Ok(remo_group::table
            .filter(remo_group::name.eq(name))
            .first::<Group>(conn)
            .optional()?)
    }

    fn group_members(&self, group_id: i32) -> DashResult<Vec<User>> {
        let conn = &*self.conn()?;
        Ok(group_membership::table
            .inner_join(remo_user::table)
            .filter(group_membership::fk_group.eq(group_id))
            .select(remo_user::all_columns)
            .order(remo_user::username)
            .load::<User>(conn)?)
    }

    fn polls(&self) -> DashResult<Vec<Poll>> {
        let conn = &*self.conn()?;
        Ok(poll::table.order(poll::poll_start.desc()).load::<Poll>(conn)?)
    }

    fn poll_by_slug(&self, slug: &str) -> DashResult<Option<Poll>> {
        let conn = &*self.conn()?;
        Ok(poll::table.filter(poll::slug.eq(slug)).first::<Poll>(conn).optional()?)
    }

    fn poll_by_id(&self, id: i32) -> DashResult<Option<Poll>> {
        let conn = &*self.conn()?;
        Ok(poll::table.find(id).first::<Poll>(conn).optional()?)
    }

    fn poll_for_bug(&self, fk_bug: i32) -> DashResult<Option<Poll>> {
        let conn = &*self.conn()?;
        Ok(poll::table
            .filter(poll::fk_bug.eq(fk_bug))
            .first::<Poll>(conn)
            .optional()?)
    }

    fn slug_taken(&self, slug: &str) -> DashResult<bool> {
        let conn = &*self.conn()?;
        Ok(diesel::select(exists(poll::table.filter(poll::slug.eq(slug)))).get_result::<bool>(conn)?)
    }

    fn save_poll(
        &self,
        id: Option<i32>,
        fields: &PollFields,
        draft: Option<&BallotDraft>,
    ) -> DashResult<Poll> {
        let conn = &*self.conn()?;
        conn.transaction::<_, DashError, _>(|| {
            let saved = match id {
                Some(id) => diesel::update(poll::table.find(id))
                    .set(&fields.as_changes())
                    .get_result::<Poll>(conn)?,
                None => diesel::insert_into(poll::table)
                    .values(&fields.as_new())
                    .get_result::<Poll>(conn)?,
            };

            if let Some(draft) = draft {
                sync_range_polls(conn, saved.id, &draft.range_polls)?;
                sync_radio_polls(conn, saved.id, &draft.radio_polls)?;
            }

            Ok(saved)
        })
    }

    fn set_poll_tasks(&self, poll_id: i32, start: Option<&str>, end: Option<&str>) -> DashResult<()> {
        let conn = &*self.conn()?;
        diesel::update(poll::table.find(poll_id))
            .set((poll::task_start_id.eq(start), poll::task_end_id.eq(end)))
            .execute(conn)?;
        Ok(())
    }

    fn delete_poll(&self, poll_id: i32) -> DashResult<()> {
        let conn = &*self.conn()?;
        diesel::delete(poll::table.find(poll_id)).execute(conn)?;
        Ok(())
    }

    fn ballot(&self, poll_id: i32) -> DashResult<Ballot> {
        let conn = &*self.conn()?;
        let mut ballot = Ballot::default();

        let range_polls = range_poll::table
            .filter(range_poll::fk_poll.eq(poll_id))
            .order(range_poll::id)
            .load::<RangePoll>(conn)?;

        for item in range_polls {
            let choices = range_poll_choice::table
                .inner_join(remo_user::table)
                .filter(range_poll_choice::fk_range_poll.eq(item.id))
                .order(range_poll_choice::id)
                .load::<(RangePollChoice, User)>(conn)?;
            ballot.range_polls.push(RangeItem { poll: item, choices });
        }

        let radio_polls = radio_poll::table
            .filter(radio_poll::fk_poll.eq(poll_id))
            .order(radio_poll::id)
            .load::<RadioPoll>(conn)?;

        for item in radio_polls {
            let choices = radio_poll_choice::table
                .filter(radio_poll_choice::fk_radio_poll.eq(item.id))
                .order(radio_poll_choice::id)
                .load::<RadioPollChoice>(conn)?;
            ballot.radio_polls.push(RadioItem { poll: item, choices });
        }

        Ok(ballot)
    }

    fn has_voted(&self, poll_id: i32, user_id: i32) -> DashResult<bool> {
        let conn = &*self.conn()?;
        Ok(diesel::select(exists(
            vote::table
                .filter(vote::fk_poll.eq(poll_id))
                .filter(vote::fk_user.eq(user_id)),
        ))
        .get_result::<bool>(conn)?)
    }

    fn voter_ids(&self, poll_id: i32) -> DashResult<Vec<i32>> {
        let conn = &*self.conn()?;
        Ok(vote::table
            .filter(vote::fk_poll.eq(poll_id))
            .select(vote::fk_user)
            .load::<i32>(conn)?)
    }

    fn record_ballot(&self, cast: &CastBallot) -> DashResult<()> {
        let conn = &*self.conn()?;
        // the vote marker goes last; a unique violation on it rolls the
        // tallies back
        conn.transaction::<_, DashError, _>(|| {
            for &(choice_id, score) in &cast.range_scores {
                diesel::update(range_poll_choice::table.find(choice_id))
                    .set(range_poll_choice::votes.eq(range_poll_choice::votes + score))
                    .execute(conn)?;
            }

            for &choice_id in &cast.radio_choices {
                diesel::update(radio_poll_choice::table.find(choice_id))
                    .set(radio_poll_choice::votes.eq(radio_poll_choice::votes + 1))
                    .execute(conn)?;
            }

            if let Some(ref comment) = cast.comment {
                let comment = NewPollComment {
                    fk_poll: cast.fk_poll,
                    fk_user: cast.fk_user,
                    created_on: cast.cast_at,
                    comment,
                };
                diesel::insert_into(poll_comment::table)
                    .values(&comment)
                    .execute(conn)?;
            }

            let marker = NewVote {
                fk_poll: cast.fk_poll,
                fk_user: cast.fk_user,
                date_voted: cast.cast_at,
            };
            diesel::insert_into(vote::table).values(&marker).execute(conn)?;

            Ok(())
        })
    }

    fn comments(&self, poll_id: i32) -> DashResult<Vec<(PollComment, User)>> {
        let conn = &*self.conn()?;
        Ok(poll_comment::table
            .inner_join(remo_user::table)
            .filter(poll_comment::fk_poll.eq(poll_id))
            .order(poll_comment::created_on)
            .load::<(PollComment, User)>(conn)?)
    }

    fn save_bug(&self, record: &NewBug<'_>) -> DashResult<Bug> {
        let conn = &*self.conn()?;
        Ok(diesel::insert_into(bug::table)
            .values(record)
            .on_conflict(bug::bug_id)
            .do_update()
            .set(record)
            .get_result::<Bug>(conn)?)
    }

    fn schedule_task(&self, task: &NewScheduledTask<'_>) -> DashResult<ScheduledTask> {
        let conn = &*self.conn()?;
        Ok(diesel::insert_into(scheduled_task::table)
            .values(task)
            .get_result::<ScheduledTask>(conn)?)
    }

    fn revoke_task(&self, handle: &str) -> DashResult<()> {
        let conn = &*self.conn()?;
        diesel::update(scheduled_task::table.filter(scheduled_task::handle.eq(handle)))
            .set(scheduled_task::revoked.eq(true))
            .execute(conn)?;
        Ok(())
    }

    fn poll_tasks(&self, poll_id: i32) -> DashResult<Vec<ScheduledTask>> {
        let conn = &*self.conn()?;
        Ok(scheduled_task::table
            .filter(scheduled_task::fk_poll.eq(poll_id))
            .order(scheduled_task::id)
            .load::<ScheduledTask>(conn)?)
    }

    fn due_tasks(&self, now: DateTime<Utc>) -> DashResult<Vec<ScheduledTask>> {
        let conn = &*self.conn()?;
        Ok(scheduled_task::table
            .filter(scheduled_task::run_at.le(now))
            .filter(scheduled_task::revoked.eq(false))
            .filter(scheduled_task::done.eq(false))
            .order(scheduled_task::run_at)
            .load::<ScheduledTask>(conn)?)
    }

    fn finish_task(&self, task_id: i32) -> DashResult<()> {
        let conn = &*self.conn()?;
        diesel::update(scheduled_task::table.find(task_id))
            .set(scheduled_task::done.eq(true))
            .execute(conn)?;
        Ok(())
    }
}

fn sync_range_polls(conn: &PgConnection, poll_id: i32, drafts: &[RangePollDraft]) -> DashResult<()> {
    let stored = range_poll::table
        .filter(range_poll::fk_poll.eq(poll_id))
        .load::<RangePoll>(conn)?;

    let stale: Vec<i32> = stored
        .iter()
        .map(|item| item.id)
        .filter(|id| !drafts.iter().any(|d| d.id == Some(*id)))
        .collect();
    diesel::delete(range_poll::table.filter(range_poll::id.eq_any(stale))).execute(conn)?;

    for draft in drafts {
        let item_id = match draft.id.filter(|id| stored.iter().any(|item| item.id == *id)) {
            Some(id) => {
                diesel::update(range_poll::table.find(id))
                    .set(range_poll::name.eq(&draft.name))
                    .execute(conn)?;
                id
            }
            None => diesel::insert_into(range_poll::table)
                .values(&NewRangePoll { fk_poll: poll_id, name: &draft.name })
                .returning(range_poll::id)
                .get_result::<i32>(conn)?,
        };

        // choices of nominees that stay keep their tallies
        let choices = range_poll_choice::table
            .filter(range_poll_choice::fk_range_poll.eq(item_id))
            .load::<RangePollChoice>(conn)?;
        let dropped: Vec<i32> = choices
            .iter()
            .filter(|c| !draft.nominees.contains(&c.fk_nominee))
            .map(|c| c.id)
            .collect();
        diesel::delete(range_poll_choice::table.filter(range_poll_choice::id.eq_any(dropped)))
            .execute(conn)?;

        let added: Vec<NewRangePollChoice> = draft
            .nominees
            .iter()
            .filter(|&&nominee| !choices.iter().any(|c| c.fk_nominee == nominee))
            .map(|&nominee| NewRangePollChoice {
                fk_range_poll: item_id,
                fk_nominee: nominee,
                votes: 0,
            })
            .collect();
        if !added.is_empty() {
            diesel::insert_into(range_poll_choice::table)
                .values(&added)
                .execute(conn)?;
        }
    }

    Ok(())
}

fn sync_radio_polls(conn: &PgConnection, poll_id: i32, drafts: &[RadioPollDraft]) -> DashResult<()> {
    let stored = radio_poll::table
        .filter(radio_poll::fk_poll.eq(poll_id))
        .load::<RadioPoll>(conn)?;

    let stale: Vec<i32> = stored
        .iter()
        .map(|item| item.id)
        .filter(|id| !drafts.iter().any(|d| d.id == Some(*id)))
        .collect();
    diesel::delete(radio_poll::table.filter(radio_poll::id.eq_any(stale))).execute(conn)?;

    for draft in drafts {
        let item_id = match draft.id.filter(|id| stored.iter().any(|item| item.id == *id)) {
            Some(id) => {
                diesel::update(radio_poll::table.find(id))
                    .set(radio_poll::question.eq(&draft.question))
                    .execute(conn)?;
                id
            }
            None => diesel::insert_into(radio_poll::table)
                .values(&NewRadioPoll { fk_poll: poll_id, question: &draft.question })
                .returning(radio_poll::id)
                .get_result::<i32>(conn)?,
        };

        let choices = radio_poll_choice::table
            .filter(radio_poll_choice::fk_radio_poll.eq(item_id))
            .load::<RadioPollChoice>(conn)?;
        let dropped: Vec<i32> = choices
            .iter()
            .filter(|c| !draft.answers.contains(&c.answer))
            .map(|c| c.id)
            .collect();
        diesel::delete(radio_poll_choice::table.filter(radio_poll_choice::id.eq_any(dropped)))
            .execute(conn)?;

        let added: Vec<NewRadioPollChoice<'_>> = draft
            .answers
            .iter()
            .filter(|answer| !choices.iter().any(|c| &c.answer == *answer))
            .map(|answer| NewRadioPollChoice {
                fk_radio_poll: item_id,
                answer,
                votes: 0,
            })
            .collect();
        if !added.is_empty() {
            diesel::insert_into(radio_poll_choice::table)
                .values(&added)
                .execute(conn)?;
        }
    }

    Ok(())
}
