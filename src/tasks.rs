//! Deferred notification mails. Tasks are rows with an opaque handle that
//! the poll keeps, so an edit or a deletion can revoke them; a background
//! thread sends whatever is due.

use std::cmp;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};

use crate::dates::format_notice;
use crate::domain::voting::{NewScheduledTask, Poll};
use crate::error::DashResult;
use crate::mail::{Mail, Mailer};
use crate::settings::Settings;
use crate::store::Store;
use crate::utils::spawn_thread;
use crate::voting::Ctx;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskKind {
    VotingStarted,
    VotingEnding,
    AutomatedPollCreated,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::VotingStarted => "voting_started",
            TaskKind::VotingEnding => "voting_ending",
            TaskKind::AutomatedPollCreated => "automated_poll_created",
        }
    }

    pub fn parse(kind: &str) -> Option<TaskKind> {
        match kind {
            "voting_started" => Some(TaskKind::VotingStarted),
            "voting_ending" => Some(TaskKind::VotingEnding),
            "automated_poll_created" => Some(TaskKind::AutomatedPollCreated),
            _ => None,
        }
    }
}

/// 128 random bits, hex encoded.
pub fn new_handle() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// When the "voting ends soon" reminder goes out.
pub fn reminder_at(poll: &Poll, settings: &Settings) -> DateTime<Utc> {
    cmp::max(poll.poll_start, poll.poll_end - settings.end_reminder())
}

fn schedule(store: &dyn Store, kind: TaskKind, poll_id: i32, run_at: DateTime<Utc>) -> DashResult<String> {
    let handle = new_handle();
    store.schedule_task(&NewScheduledTask {
        handle: &handle,
        kind: kind.as_str(),
        fk_poll: poll_id,
        run_at,
        revoked: false,
        done: false,
    })?;
    debug!("scheduled {} for poll {} at {}", kind.as_str(), poll_id, run_at);
    Ok(handle)
}

/// Schedules the start and reminder mails of a freshly saved poll, replacing
/// the ones whose time moved since `previous`. Returns the poll with its
/// current task handles.
pub fn schedule_poll_notifications(ctx: &Ctx<'_>, poll: &Poll, previous: Option<&Poll>) -> DashResult<Poll> {
    let reminder = reminder_at(poll, ctx.settings);
    let start_moved = previous.map_or(true, |p| p.poll_start != poll.poll_start);
    let reminder_moved = previous.map_or(true, |p| reminder_at(p, ctx.settings) != reminder);

    let mut updated = poll.clone();
    if start_moved || updated.task_start_id.is_none() {
        if let Some(old) = &updated.task_start_id {
            ctx.store.revoke_task(old)?;
        }
        updated.task_start_id = Some(schedule(ctx.store, TaskKind::VotingStarted, poll.id, poll.poll_start)?);
    }
    if reminder_moved || updated.task_end_id.is_none() {
        if let Some(old) = &updated.task_end_id {
            ctx.store.revoke_task(old)?;
        }
        updated.task_end_id = Some(schedule(ctx.store, TaskKind::VotingEnding, poll.id, reminder)?);
    }

    if updated.task_start_id != poll.task_start_id || updated.task_end_id != poll.task_end_id {
        ctx.store.set_poll_tasks(
            poll.id,
            updated.task_start_id.as_deref(),
            updated.task_end_id.as_deref(),
        )?;
    }
    Ok(updated)
}

/// Queues the immediate "new automated voting" mail to the council.
pub fn notify_council(ctx: &Ctx<'_>, poll: &Poll) -> DashResult<()> {
    schedule(ctx.store, TaskKind::AutomatedPollCreated, poll.id, ctx.now)?;
    Ok(())
}

pub fn revoke_poll_notifications(ctx: &Ctx<'_>, poll: &Poll) -> DashResult<()> {
    for handle in poll.task_start_id.iter().chain(poll.task_end_id.iter()) {
        ctx.store.revoke_task(handle)?;
    }
    Ok(())
}

fn compose(ctx: &Ctx<'_>, kind: TaskKind, poll: &Poll) -> DashResult<Option<Mail>> {
    let link = ctx.settings.voting_url(&poll.slug)?;

    let mail = match kind {
        TaskKind::VotingStarted => {
            if ctx.now >= poll.poll_end {
                return Ok(None);
            }
            let to = ctx
                .store
                .group_members(poll.fk_valid_group)?
                .into_iter()
                .map(|u| u.email)
                .collect();
            Mail {
                to,
                subject: format!("[Voting] Voting \"{}\" has started", poll.name),
                body: format!(
                    "The voting \"{}\" is now open until {} UTC.\n\nCast your vote at {}\n",
                    poll.name,
                    format_notice(poll.poll_end),
                    link
                ),
            }
        }
        TaskKind::VotingEnding => {
            if ctx.now >= poll.poll_end {
                return Ok(None);
            }
            let voted = ctx.store.voter_ids(poll.id)?;
            let to = ctx
                .store
                .group_members(poll.fk_valid_group)?
                .into_iter()
                .filter(|u| !voted.contains(&u.id))
                .map(|u| u.email)
                .collect();
            Mail {
                to,
                subject: format!("[Voting] Voting \"{}\" ends soon", poll.name),
                body: format!(
                    "You have not yet voted on \"{}\". The voting closes on {} UTC.\n\nCast your vote at {}\n",
                    poll.name,
                    format_notice(poll.poll_end),
                    link
                ),
            }
        }
        TaskKind::AutomatedPollCreated => Mail {
            to: vec![ctx.settings.council_alias.clone()],
            subject: format!("[Voting] New automated voting: {}", poll.name),
            body: format!(
                "A new voting was created for \"{}\".\n\nIt opens on {} UTC and closes on {} UTC.\n\n{}\n",
                poll.name,
                format_notice(poll.poll_start),
                format_notice(poll.poll_end),
                link
            ),
        },
    };
    Ok(Some(mail))
}

/// Sends every due task and marks it done. A task that fails stays pending
/// for the next run. Returns how many tasks were completed.
pub fn run_due_tasks(ctx: &Ctx<'_>, mailer: &dyn Mailer) -> DashResult<usize> {
    let mut completed = 0;
    for task in ctx.store.due_tasks(ctx.now)? {
        let kind = match TaskKind::parse(&task.kind) {
            Some(kind) => kind,
            None => {
                warn!("dropping task {} of unknown kind {}", task.handle, task.kind);
                ctx.store.finish_task(task.id)?;
                continue;
            }
        };
        let poll = match ctx.store.poll_by_id(task.fk_poll)? {
            Some(poll) => poll,
            None => {
                info!("dropping task {}, its poll is gone", task.handle);
                ctx.store.finish_task(task.id)?;
                continue;
            }
        };

        let mail = ok_or_continue!(compose(ctx, kind, &poll), why =>
            error!("unable to compose {} for poll {}: {:?}", task.kind, poll.slug, why));
        if let Some(mail) = mail {
            ok_or_continue!(mailer.send(&mail), why =>
                error!("unable to send {} for poll {}: {:?}", task.kind, poll.slug, why));
        }

        ctx.store.finish_task(task.id)?;
        completed += 1;
    }
    Ok(completed)
}

pub fn start_worker(
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    settings: Settings,
    interval_minutes: u64,
) -> JoinHandle<()> {
    spawn_thread("notification", cmp::max(interval_minutes, 1), move || {
        let ctx = Ctx {
            store: &*store,
            settings: &settings,
            now: Utc::now(),
        };
        let completed = run_due_tasks(&ctx, &*mailer)?;
        if completed > 0 {
            info!("completed {} notification task(s)", completed);
        }
        Ok(())
    })
}
