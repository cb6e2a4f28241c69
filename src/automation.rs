use chrono::Duration;

use crate::dates::whole_seconds;
use crate::domain::bugs::Bug;
use crate::domain::voting::{BallotDraft, Poll, RadioPollDraft};
use crate::error::DashResult;
use crate::store::PollFields;
use crate::tasks::{self, TaskKind};
use crate::voting::{unique_slug, Ctx};

const SAVE_ATTEMPTS: usize = 3;

/// Does this bug ask the council for a vote?
pub fn qualifies(ctx: &Ctx<'_>, bug: &Bug) -> bool {
    bug.council_vote_requested && ctx.settings.is_automated_component(&bug.component)
}

/// Creates the council poll for a bug that requests one, unless the bug
/// already has a poll. Safe to call on every save of the bug: a repeated
/// event also finishes the notification setup of a poll whose first event
/// failed half way.
pub fn handle_bug_event(ctx: &Ctx<'_>, bug: &Bug) -> DashResult<Option<Poll>> {
    if !qualifies(ctx, bug) {
        return Ok(None);
    }
    if let Some(existing) = ctx.store.poll_for_bug(bug.id)? {
        debug!("bug {} already has poll {}", bug.bug_id, existing.slug);
        complete_notifications(ctx, &existing)?;
        return Ok(None);
    }

    let settings = ctx.settings;
    let council = ctx
        .store
        .group_by_name(&settings.council_group)?
        .ok_or_else(|| misc!("council group {} does not exist", settings.council_group))?;
    let bot = ctx
        .store
        .user_by_username(&settings.bot_username)?
        .ok_or_else(|| misc!("bot user {} does not exist", settings.bot_username))?;

    let now = whole_seconds(ctx.now);
    let mut fields = PollFields {
        name: bug.summary.clone(),
        slug: unique_slug(ctx.store, &bug.summary)?,
        description: bug.first_comment.clone(),
        poll_start: now + Duration::hours(settings.automated_polls.start_delay_hours),
        poll_end: now + Duration::hours(settings.automated_polls.duration_hours),
        fk_valid_group: council.id,
        created_on: now,
        fk_created_by: bot.id,
        automated_poll: true,
        fk_bug: Some(bug.id),
    };
    let draft = BallotDraft {
        range_polls: vec![],
        radio_polls: vec![RadioPollDraft {
            id: None,
            question: settings.automated_polls.question.clone(),
            answers: settings.automated_polls.answers.clone(),
        }],
    };

    // both the bug reference and the slug are unique, only the latter is worth a retry
    let mut attempts = 1;
    let poll = loop {
        match ctx.store.save_poll(None, &fields, Some(&draft)) {
            Ok(poll) => break poll,
            Err(ref why) if why.is_conflict() => {
                if ctx.store.poll_for_bug(bug.id)?.is_some() {
                    info!("poll for bug {} was created concurrently: {}", bug.bug_id, why);
                    return Ok(None);
                }
                if attempts >= SAVE_ATTEMPTS {
                    throw!(misc!("no free slug for bug {} after {} attempts", bug.bug_id, attempts));
                }
                debug!("slug {} was claimed concurrently: {}", fields.slug, why);
                attempts += 1;
                fields.slug = unique_slug(ctx.store, &bug.summary)?;
            }
            Err(why) => return Err(why),
        }
    };
    info!("created automated poll {} for bug {}", poll.slug, bug.bug_id);

    Ok(Some(complete_notifications(ctx, &poll)?))
}

/// Makes sure the poll has its start and reminder tasks and that the
/// council mail was queued once. A poll without task handles never got
/// past scheduling, so its unreferenced tasks are revoked before
/// scheduling anew.
fn complete_notifications(ctx: &Ctx<'_>, poll: &Poll) -> DashResult<Poll> {
    let existing = ctx.store.poll_tasks(poll.id)?;
    let council_mail = TaskKind::AutomatedPollCreated.as_str();

    let poll = if poll.task_start_id.is_none() || poll.task_end_id.is_none() {
        if !existing.is_empty() {
            warn!("finishing the notification setup of poll {}", poll.slug);
        }
        for orphan in existing
            .iter()
            .filter(|t| t.kind != council_mail && !t.revoked && !t.done)
        {
            ctx.store.revoke_task(&orphan.handle)?;
        }
        tasks::schedule_poll_notifications(ctx, poll, None)?
    } else {
        poll.clone()
    };

    if !existing.iter().any(|t| t.kind == council_mail) {
        tasks::notify_council(ctx, &poll)?;
    }
    Ok(poll)
}
