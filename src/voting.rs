//! The voting workflow: listing, creating and editing, casting and deleting.
//!
//! Every operation takes a `Ctx` carrying the store, the settings and the
//! current instant, and answers with a page to render or a redirect.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::auth::CurrentUser;
use crate::dates::format_notice;
use crate::domain::people::User;
use crate::domain::voting::{Ballot, CastBallot, Poll, PollPhase};
use crate::error::DashResult;
use crate::forms::ballot::*;
use crate::forms::poll::{PollAddForm, PollEditForm, PollFormContext, PollFormView, PollSubmission};
use crate::forms::RawForm;
use crate::settings::{Permission, Settings};
use crate::store::{PollFields, Store};
use crate::tasks;
use crate::utils::slugify;

const PERMISSION_DENIED: &str = "Permission denied.";

/// Slugs taken by fixed routes under `/voting`.
const RESERVED_SLUGS: &[&str] = &["new", "past_votings"];
const MAX_SLUG_LEN: usize = 200;

#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub store: &'a dyn Store,
    pub settings: &'a Settings,
    pub now: DateTime<Utc>,
}

//==============================================================================
// Replies
//==============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// A one-shot message shown on the page a redirect lands on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Option<Notice> {
        Some(Notice { level: Level::Success, message: message.into() })
    }

    fn warning(message: impl Into<String>) -> Option<Notice> {
        Some(Notice { level: Level::Warning, message: message.into() })
    }

    fn error(message: impl Into<String>) -> Option<Notice> {
        Some(Notice { level: Level::Error, message: message.into() })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    Listing,
    EditVoting(String),
}

#[derive(Debug)]
pub enum Reply<T> {
    Render(T),
    Redirect(Destination, Option<Notice>),
    NotFound,
}

//==============================================================================
// Pages
//==============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct PollSummary {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub automated: bool,
    pub phase: PollPhase,
}

impl PollSummary {
    fn new(poll: &Poll, now: DateTime<Utc>) -> Self {
        PollSummary {
            name: poll.name.clone(),
            slug: poll.slug.clone(),
            description: poll.description.clone(),
            start: format_notice(poll.poll_start),
            end: format_notice(poll.poll_end),
            automated: poll.automated_poll,
            phase: poll.phase(now),
        }
    }
}

/// One page of a longer list.
#[derive(Clone, Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: usize,
    pub next: usize,
}

/// Picks page `requested` of `items`. Anything that is not an integer
/// selects the first page, integers out of range select the last one.
pub fn paginate<T>(items: Vec<T>, per_page: usize, requested: Option<&str>) -> Paginated<T> {
    let per_page = per_page.max(1);
    let num_pages = ((items.len() + per_page - 1) / per_page).max(1);
    let number = match requested.map(|p| p.trim().parse::<i64>()) {
        None | Some(Err(_)) => 1,
        Some(Ok(n)) if n >= 1 && n as usize <= num_pages => n as usize,
        Some(Ok(_)) => num_pages,
    };

    let items = items
        .into_iter()
        .skip((number - 1) * per_page)
        .take(per_page)
        .collect();
    Paginated {
        items,
        number,
        num_pages,
        has_previous: number > 1,
        has_next: number < num_pages,
        previous: number.saturating_sub(1),
        next: number + 1,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ListPage {
    pub past: Paginated<PollSummary>,
    pub current: Vec<PollSummary>,
    pub future: Vec<PollSummary>,
    pub can_add: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PastPage {
    pub past: Paginated<PollSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EditPage {
    pub creating: bool,
    pub slug: Option<String>,
    pub current_voting_edit: bool,
    pub can_delete: bool,
    pub form: PollFormView,
}

#[derive(Clone, Debug, Serialize)]
pub struct BallotPage {
    pub poll: PollSummary,
    pub range_polls: Vec<RangeVoteView>,
    pub radio_polls: Vec<RadioVoteView>,
    pub comment: CommentView,
    pub all_group_voters: usize,
    pub users_voted: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultsPage {
    pub poll: PollSummary,
    pub range_polls: Vec<RangeResult>,
    pub radio_polls: Vec<RadioResult>,
    pub comments: Vec<CommentResult>,
    pub all_group_voters: usize,
    pub users_voted: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RangeResult {
    pub name: String,
    pub choices: Vec<Tally>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RadioResult {
    pub question: String,
    pub answers: Vec<Tally>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Tally {
    pub label: String,
    pub votes: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentResult {
    pub author: String,
    pub created_on: String,
    pub comment: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VotingPage {
    Ballot(BallotPage),
    Results(ResultsPage),
}

//==============================================================================
// Listing
//==============================================================================

fn visible_polls(ctx: &Ctx<'_>, user: &CurrentUser) -> DashResult<Vec<Poll>> {
    let polls = ctx.store.polls()?;
    if user.is_admin(ctx.settings) {
        return Ok(polls);
    }
    Ok(polls
        .into_iter()
        .filter(|p| user.in_group(p.fk_valid_group))
        .collect())
}

fn past_page(ctx: &Ctx<'_>, polls: &[Poll], page: Option<&str>) -> Paginated<PollSummary> {
    let past = polls
        .iter()
        .filter(|p| p.phase(ctx.now) == PollPhase::Past)
        .sorted_by_key(|p| Reverse(p.poll_end))
        .map(|p| PollSummary::new(p, ctx.now))
        .collect();
    paginate(past, ctx.settings.items_per_page, page)
}

pub fn list_votings(ctx: &Ctx<'_>, user: &CurrentUser, page: Option<&str>) -> DashResult<ListPage> {
    let polls = visible_polls(ctx, user)?;

    let current = polls
        .iter()
        .filter(|p| p.phase(ctx.now) == PollPhase::Current)
        .sorted_by_key(|p| p.poll_end)
        .map(|p| PollSummary::new(p, ctx.now))
        .collect();
    let future = polls
        .iter()
        .filter(|p| p.phase(ctx.now) == PollPhase::Future)
        .sorted_by_key(|p| p.poll_start)
        .map(|p| PollSummary::new(p, ctx.now))
        .collect();

    Ok(ListPage {
        past: past_page(ctx, &polls, page),
        current,
        future,
        can_add: user.has_perms(ctx.settings, &[Permission::AddPoll, Permission::ChangePoll]),
    })
}

pub fn list_votings_past(ctx: &Ctx<'_>, user: &CurrentUser, page: Option<&str>) -> DashResult<PastPage> {
    let polls = visible_polls(ctx, user)?;
    Ok(PastPage {
        past: past_page(ctx, &polls, page),
    })
}

//==============================================================================
// Create / edit
//==============================================================================

/// A free slug derived from `name`, suffixed with `-1`, `-2`... when taken.
/// Never longer than `MAX_SLUG_LEN`, suffix included.
pub fn unique_slug(store: &dyn Store, name: &str) -> DashResult<String> {
    let base = slugify(name);

    let mut candidate = fit_slug(&base, "");
    let mut suffix = 0;
    while RESERVED_SLUGS.contains(&candidate.as_str()) || store.slug_taken(&candidate)? {
        suffix += 1;
        candidate = fit_slug(&base, &format!("-{}", suffix));
    }
    Ok(candidate)
}

fn fit_slug(base: &str, suffix: &str) -> String {
    // slugify only emits ascii, any byte index is a char boundary
    let room = MAX_SLUG_LEN - suffix.len();
    let stem = match base[..base.len().min(room)].trim_end_matches('-') {
        "" => "voting",
        trimmed => trimmed,
    };
    format!("{}{}", stem, suffix)
}

fn nominees(ctx: &Ctx<'_>) -> DashResult<Vec<User>> {
    let group = match ctx.store.group_by_name(&ctx.settings.nominee_group)? {
        Some(group) => group,
        None => {
            warn!("nominee group {} does not exist", ctx.settings.nominee_group);
            return Ok(Vec::new());
        }
    };
    Ok(ctx
        .store
        .group_members(group.id)?
        .into_iter()
        .filter(|u| u.registration_complete)
        .collect())
}

fn save_poll(
    ctx: &Ctx<'_>,
    user: &CurrentUser,
    existing: Option<&Poll>,
    submission: &PollSubmission,
) -> DashResult<Poll> {
    let saved = match existing {
        Some(poll) => {
            let fields = PollFields {
                name: submission.name.clone(),
                slug: poll.slug.clone(),
                description: submission.description.clone(),
                poll_start: submission.poll_start,
                poll_end: submission.poll_end,
                fk_valid_group: submission.fk_valid_group,
                created_on: poll.created_on,
                fk_created_by: poll.fk_created_by,
                automated_poll: poll.automated_poll,
                fk_bug: poll.fk_bug,
            };
            ctx.store.save_poll(Some(poll.id), &fields, submission.draft.as_ref())?
        }
        None => {
            let mut fields = PollFields {
                name: submission.name.clone(),
                slug: unique_slug(ctx.store, &submission.name)?,
                description: submission.description.clone(),
                poll_start: submission.poll_start,
                poll_end: submission.poll_end,
                fk_valid_group: submission.fk_valid_group,
                created_on: ctx.now,
                fk_created_by: user.id(),
                automated_poll: false,
                fk_bug: None,
            };
            // another request may claim the slug between the check and the insert
            let mut attempts = 0;
            loop {
                match ctx.store.save_poll(None, &fields, submission.draft.as_ref()) {
                    Err(ref why) if why.is_conflict() && attempts < 3 => {
                        attempts += 1;
                        fields.slug = unique_slug(ctx.store, &submission.name)?;
                    }
                    saved => break saved?,
                }
            }
        }
    };

    info!("{} saved poll {}", user.user.username, saved.slug);
    tasks::schedule_poll_notifications(ctx, &saved, existing)
}

pub fn edit_voting(
    ctx: &Ctx<'_>,
    user: &CurrentUser,
    slug: Option<&str>,
    submission: Option<&RawForm>,
) -> DashResult<Reply<EditPage>> {
    if !user.has_perms(ctx.settings, &[Permission::AddPoll, Permission::ChangePoll]) {
        return Ok(Reply::Redirect(Destination::Listing, Notice::error(PERMISSION_DENIED)));
    }

    let poll = match slug {
        Some(slug) => match ctx.store.poll_by_slug(slug)? {
            Some(poll) => Some(poll),
            None => return Ok(Reply::NotFound),
        },
        None => None,
    };
    let ballot = match &poll {
        Some(poll) => ctx.store.ballot(poll.id)?,
        None => Ballot::default(),
    };
    let groups = ctx.store.groups()?;
    let offset = ctx.settings.local_offset();
    let creating = poll.is_none();
    let can_delete = !creating && user.has_perm(ctx.settings, Permission::DeletePoll);
    let saved_notice = if creating {
        "Voting successfully created."
    } else {
        "Voting successfully edited."
    };

    let running = poll
        .as_ref()
        .map_or(false, |p| p.phase(ctx.now) == PollPhase::Current);

    let (form, current_voting_edit) = match (&poll, running) {
        (Some(current), true) => {
            let mut form = PollEditForm::new(current, offset);
            if let Some(raw) = submission {
                if form.bind(raw, offset) {
                    if let Some(cleaned) = form.cleaned() {
                        let saved = save_poll(ctx, user, Some(current), cleaned)?;
                        return Ok(Reply::Redirect(
                            Destination::EditVoting(saved.slug),
                            Notice::success(saved_notice),
                        ));
                    }
                }
            }
            (form.view(&groups, offset), true)
        }
        _ => {
            let extra = if creating || ballot.is_empty() { 1 } else { 0 };
            let nominees = nominees(ctx)?;
            let mut form = PollAddForm::new(poll.as_ref(), &ballot, extra, offset);
            if let Some(raw) = submission {
                let form_ctx = PollFormContext {
                    offset,
                    groups: &groups,
                    nominees: &nominees,
                    ballot: &ballot,
                    automated: poll.as_ref().map_or(false, |p| p.automated_poll),
                };
                if form.bind(raw, &form_ctx) {
                    if let Some(cleaned) = form.cleaned() {
                        let saved = save_poll(ctx, user, poll.as_ref(), cleaned)?;
                        return Ok(Reply::Redirect(
                            Destination::EditVoting(saved.slug),
                            Notice::success(saved_notice),
                        ));
                    }
                }
            }
            (form.view(&groups, &nominees), false)
        }
    };

    Ok(Reply::Render(EditPage {
        creating,
        slug: poll.map(|p| p.slug),
        current_voting_edit,
        can_delete,
        form,
    }))
}

//==============================================================================
// View / cast
//==============================================================================

fn results(ctx: &Ctx<'_>, poll: &Poll) -> DashResult<ResultsPage> {
    let ballot = ctx.store.ballot(poll.id)?;

    let range_polls = ballot
        .range_polls
        .into_iter()
        .map(|item| RangeResult {
            name: item.poll.name,
            choices: item
                .choices
                .into_iter()
                .map(|(choice, nominee)| Tally { label: nominee.full_name(), votes: choice.votes })
                .sorted_by_key(|t| Reverse(t.votes))
                .collect(),
        })
        .collect();
    let radio_polls = ballot
        .radio_polls
        .into_iter()
        .map(|item| RadioResult {
            question: item.poll.question,
            answers: item
                .choices
                .into_iter()
                .map(|choice| Tally { label: choice.answer, votes: choice.votes })
                .sorted_by_key(|t| Reverse(t.votes))
                .collect(),
        })
        .collect();

    let comments = if poll.automated_poll {
        ctx.store
            .comments(poll.id)?
            .into_iter()
            .map(|(comment, author)| CommentResult {
                author: author.full_name(),
                created_on: format_notice(comment.created_on),
                comment: comment.comment,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(ResultsPage {
        poll: PollSummary::new(poll, ctx.now),
        range_polls,
        radio_polls,
        comments,
        all_group_voters: ctx.store.group_members(poll.fk_valid_group)?.len(),
        users_voted: ctx.store.voter_ids(poll.id)?.len(),
    })
}

fn already_voted(poll: &Poll) -> Reply<VotingPage> {
    Reply::Redirect(
        Destination::Listing,
        Notice::warning(format!(
            "You have already cast your vote for this voting. Come back to see the results on {} UTC.",
            format_notice(poll.poll_end)
        )),
    )
}

pub fn view_voting(
    ctx: &Ctx<'_>,
    user: &CurrentUser,
    slug: &str,
    submission: Option<&RawForm>,
) -> DashResult<Reply<VotingPage>> {
    let poll = match ctx.store.poll_by_slug(slug)? {
        Some(poll) => poll,
        None => return Ok(Reply::NotFound),
    };

    let is_admin = user.is_admin(ctx.settings);
    if !(user.in_group(poll.fk_valid_group) || is_admin) {
        return Ok(Reply::Redirect(
            Destination::Listing,
            Notice::error("You do not have the permissions to vote on this voting."),
        ));
    }

    match poll.phase(ctx.now) {
        PollPhase::Past => return Ok(Reply::Render(VotingPage::Results(results(ctx, &poll)?))),
        PollPhase::Future if is_admin => {
            return Ok(Reply::Redirect(Destination::EditVoting(poll.slug), None));
        }
        PollPhase::Future => {
            return Ok(Reply::Redirect(
                Destination::Listing,
                Notice::warning(format!(
                    "This vote has not yet begun. You can cast your vote on {} UTC.",
                    format_notice(poll.poll_start)
                )),
            ));
        }
        PollPhase::Current => (),
    }

    if ctx.store.has_voted(poll.id, user.id())? {
        return Ok(already_voted(&poll));
    }

    let ballot = ctx.store.ballot(poll.id)?;
    let mut range_forms: Vec<_> = ballot
        .range_polls
        .into_iter()
        .map(RangePollChoiceVoteForm::new)
        .collect();
    let mut radio_forms: Vec<_> = ballot
        .radio_polls
        .into_iter()
        .map(RadioPollChoiceVoteForm::new)
        .collect();
    let mut comment_form = PollCommentForm::new(poll.automated_poll);

    if let Some(raw) = submission {
        let mut valid = true;
        for form in &mut range_forms {
            valid &= form.bind(raw);
        }
        for form in &mut radio_forms {
            valid &= form.bind(raw);
        }
        if poll.automated_poll {
            valid &= comment_form.bind(raw);
        }

        if valid {
            let cast = CastBallot {
                fk_poll: poll.id,
                fk_user: user.id(),
                range_scores: range_forms
                    .iter()
                    .flat_map(|f| f.scores().iter().cloned())
                    .collect(),
                radio_choices: radio_forms.iter().filter_map(|f| f.selection()).collect(),
                comment: if poll.automated_poll {
                    comment_form.comment().map(String::from)
                } else {
                    None
                },
                cast_at: ctx.now,
            };

            return match ctx.store.record_ballot(&cast) {
                Ok(()) => {
                    info!("{} voted on {}", user.user.username, poll.slug);
                    Ok(Reply::Redirect(
                        Destination::Listing,
                        Notice::success("Your vote has been successfully registered."),
                    ))
                }
                Err(ref why) if why.is_conflict() => {
                    warn!("duplicate ballot from {} on {}", user.user.username, poll.slug);
                    Ok(already_voted(&poll))
                }
                Err(why) => Err(why),
            };
        }
    }

    Ok(Reply::Render(VotingPage::Ballot(BallotPage {
        range_polls: range_forms.iter().map(|f| f.view()).collect(),
        radio_polls: radio_forms.iter().map(|f| f.view()).collect(),
        comment: comment_form.view(),
        all_group_voters: ctx.store.group_members(poll.fk_valid_group)?.len(),
        users_voted: ctx.store.voter_ids(poll.id)?.len(),
        poll: PollSummary::new(&poll, ctx.now),
    })))
}

//==============================================================================
// Delete
//==============================================================================

/// Deletes the poll when `confirmed` (a POST); otherwise only redirects.
pub fn delete_voting(ctx: &Ctx<'_>, user: &CurrentUser, slug: &str, confirmed: bool) -> DashResult<Reply<!>> {
    if !user.has_perm(ctx.settings, Permission::DeletePoll) {
        return Ok(Reply::Redirect(Destination::Listing, Notice::error(PERMISSION_DENIED)));
    }
    if !confirmed {
        return Ok(Reply::Redirect(Destination::Listing, None));
    }

    let poll = match ctx.store.poll_by_slug(slug)? {
        Some(poll) => poll,
        None => return Ok(Reply::NotFound),
    };
    tasks::revoke_poll_notifications(ctx, &poll)?;
    ctx.store.delete_poll(poll.id)?;
    info!("{} deleted poll {}", user.user.username, poll.slug);

    Ok(Reply::Redirect(
        Destination::Listing,
        Notice::success("Voting successfully deleted."),
    ))
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::domain::people::Group;
    use crate::domain::voting::{BallotDraft, RadioPollDraft, RangePollDraft};
    use crate::forms::test::raw;
    use crate::settings::test::test_settings;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        settings: Settings,
        reps: Group,
        admin: CurrentUser,
        council: CurrentUser,
        rep: CurrentUser,
        other_rep: CurrentUser,
        outsider: CurrentUser,
        nominee: User,
    }

    fn now() -> DateTime<Utc> {
        Utc.ymd(2026, 10, 18).and_hms(12, 0, 0)
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            let admin_group = store.add_group("Admin");
            let council_group = store.add_group("Council");
            let reps = store.add_group("Rep");
            let mentors = store.add_group("Mentor");
            let nominee = store.add_user("nominee", &[&reps]);
            store.add_user("admin", &[&admin_group]);
            store.add_user("counselor", &[&council_group, &reps]);
            store.add_user("rep", &[&reps]);
            store.add_user("other", &[&reps]);
            store.add_user("mentor", &[&mentors]);

            let load = |name: &str| CurrentUser::load(&store, name).unwrap().unwrap();
            Fixture {
                admin: load("admin"),
                council: load("counselor"),
                rep: load("rep"),
                other_rep: load("other"),
                outsider: load("mentor"),
                settings: test_settings(),
                reps,
                nominee,
                store,
            }
        }

        fn ctx(&self) -> Ctx<'_> {
            self.at(now())
        }

        fn at(&self, now: DateTime<Utc>) -> Ctx<'_> {
            Ctx { store: &self.store, settings: &self.settings, now }
        }

        /// A rep poll running from `start` for three days with one range
        /// and one radio item.
        fn poll(&self, name: &str, start: DateTime<Utc>, automated: bool) -> Poll {
            let fields = PollFields {
                name: name.to_string(),
                slug: unique_slug(&self.store, name).unwrap(),
                description: String::new(),
                poll_start: start,
                poll_end: start + Duration::days(3),
                fk_valid_group: self.reps.id,
                created_on: now(),
                fk_created_by: self.admin.id(),
                automated_poll: automated,
                fk_bug: None,
            };
            let draft = BallotDraft {
                range_polls: vec![RangePollDraft {
                    id: None,
                    name: "Seat".into(),
                    nominees: vec![self.nominee.id, self.rep.id()],
                }],
                radio_polls: vec![RadioPollDraft {
                    id: None,
                    question: "Budget?".into(),
                    answers: vec!["Yes".into(), "No".into()],
                }],
            };
            self.store.save_poll(None, &fields, Some(&draft)).unwrap()
        }

        fn ballot_form(&self, poll: &Poll, comment: &str) -> RawForm {
            let ballot = self.store.ballot(poll.id).unwrap();
            let mut pairs = Vec::new();
            for item in &ballot.range_polls {
                for (i, (choice, _)) in item.choices.iter().enumerate() {
                    pairs.push((format!("range_poll__{}", choice.id), (i + 1).to_string()));
                }
            }
            for item in &ballot.radio_polls {
                pairs.push((format!("radio_poll__{}", item.poll.id), item.choices[0].id.to_string()));
            }
            pairs.push(("comment".to_string(), comment.to_string()));
            RawForm::new(pairs)
        }
    }

    fn redirect<T: std::fmt::Debug>(reply: Reply<T>) -> (Destination, Option<Notice>) {
        match reply {
            Reply::Redirect(to, notice) => (to, notice),
            other => panic!("expected a redirect, got {:?}", other),
        }
    }

    fn message(notice: Option<Notice>) -> String {
        notice.map(|n| n.message).unwrap_or_default()
    }

    #[test]
    fn pagination_clamps() {
        let items: Vec<i32> = (1..=5).collect();
        assert_eq!(paginate(items.clone(), 2, None).items, vec![1, 2]);
        assert_eq!(paginate(items.clone(), 2, Some("2")).items, vec![3, 4]);
        assert_eq!(paginate(items.clone(), 2, Some("abc")).number, 1);
        assert_eq!(paginate(items.clone(), 2, Some("99")).items, vec![5]);
        assert_eq!(paginate(items.clone(), 2, Some("0")).number, 3);
        assert_eq!(paginate(items.clone(), 2, Some("-4")).number, 3);

        let empty = paginate(Vec::<i32>::new(), 2, Some("7"));
        assert_eq!((empty.number, empty.num_pages), (1, 1));
        assert!(!empty.has_next && !empty.has_previous);
    }

    #[test]
    fn slugs_stay_unique() {
        let f = Fixture::new();
        assert_eq!(unique_slug(&f.store, "New").unwrap(), "new-1");
        assert_eq!(unique_slug(&f.store, "Past votings").unwrap(), "past-votings");
        assert_eq!(unique_slug(&f.store, "!!!").unwrap(), "voting");

        f.poll("Council 2026", now(), false);
        assert_eq!(unique_slug(&f.store, "Council 2026").unwrap(), "council-2026-1");
        f.poll("Council 2026", now(), false);
        assert_eq!(unique_slug(&f.store, "council  2026").unwrap(), "council-2026-2");
    }

    #[test]
    fn long_slugs_leave_room_for_the_suffix() {
        let f = Fixture::new();
        let name = "budget ".repeat(40);

        let first = f.poll(&name, now(), false);
        assert_eq!(first.slug.len(), MAX_SLUG_LEN);
        assert!(!first.slug.ends_with('-'));

        let second = unique_slug(&f.store, &name).unwrap();
        assert!(second.len() <= MAX_SLUG_LEN, "{} is too long", second.len());
        assert!(second.ends_with("-1"));
        assert!(!second.contains("--"));
        f.poll(&name, now(), false);

        for _ in 0..10 {
            f.poll(&name, now(), false);
        }
        let next = unique_slug(&f.store, &name).unwrap();
        assert!(next.len() <= MAX_SLUG_LEN);
        assert!(next.ends_with("-12"));
    }

    #[test]
    fn listing_partitions_by_time() {
        let f = Fixture::new();
        f.poll("Old", now() - Duration::days(10), false);
        f.poll("Older", now() - Duration::days(20), false);
        f.poll("Oldest", now() - Duration::days(30), false);
        f.poll("Running late", now() - Duration::days(1), false);
        f.poll("Running", now() - Duration::days(2), false);
        f.poll("Later", now() + Duration::days(9), false);
        f.poll("Soon", now() + Duration::days(1), false);

        let page = list_votings(&f.ctx(), &f.rep, None).unwrap();
        let names = |polls: &[PollSummary]| polls.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&page.current), vec!["Running", "Running late"]);
        assert_eq!(names(&page.future), vec!["Soon", "Later"]);
        assert_eq!(names(&page.past.items), vec!["Old", "Older"]);
        assert_eq!(page.past.num_pages, 2);
        assert!(!page.can_add);

        let last = list_votings_past(&f.ctx(), &f.rep, Some("12")).unwrap();
        assert_eq!(names(&last.past.items), vec!["Oldest"]);

        // not a member of the poll group
        let page = list_votings(&f.ctx(), &f.outsider, None).unwrap();
        assert!(page.current.is_empty() && page.future.is_empty() && page.past.items.is_empty());

        let page = list_votings(&f.ctx(), &f.admin, None).unwrap();
        assert_eq!(page.current.len(), 2);
        assert!(page.can_add);
    }

    #[test]
    fn boundaries_follow_phase() {
        let f = Fixture::new();
        let poll = f.poll("Edge", now(), false);

        // running at its start instant
        let page = list_votings(&f.ctx(), &f.rep, None).unwrap();
        assert_eq!(page.current.len(), 1);
        match view_voting(&f.ctx(), &f.rep, &poll.slug, None).unwrap() {
            Reply::Render(VotingPage::Ballot(_)) => (),
            other => panic!("expected the ballot, got {:?}", other),
        }

        // over at its end instant
        let ended = f.at(poll.poll_end);
        assert_eq!(list_votings(&ended, &f.rep, None).unwrap().past.items.len(), 1);
        match view_voting(&ended, &f.rep, &poll.slug, None).unwrap() {
            Reply::Render(VotingPage::Results(_)) => (),
            other => panic!("expected the results, got {:?}", other),
        }
    }

    #[test]
    fn casting_a_vote() {
        let f = Fixture::new();
        let poll = f.poll("Council", now() - Duration::hours(1), false);
        let ctx = f.ctx();

        match view_voting(&ctx, &f.rep, &poll.slug, None).unwrap() {
            Reply::Render(VotingPage::Ballot(page)) => {
                assert_eq!(page.all_group_voters, 4);
                assert_eq!(page.users_voted, 0);
                assert_eq!(page.range_polls[0].choices.len(), 2);
                assert!(!page.comment.required);
            }
            other => panic!("expected the ballot, got {:?}", other),
        }

        let form = f.ballot_form(&poll, "");
        let (to, notice) = redirect(view_voting(&ctx, &f.rep, &poll.slug, Some(&form)).unwrap());
        assert_eq!(to, Destination::Listing);
        assert_eq!(message(notice), "Your vote has been successfully registered.");

        let ballot = f.store.ballot(poll.id).unwrap();
        let range_votes: Vec<i32> = ballot.range_polls[0].choices.iter().map(|(c, _)| c.votes).collect();
        assert_eq!(range_votes, vec![1, 2]);
        assert_eq!(ballot.radio_polls[0].choices[0].votes, 1);
        assert_eq!(f.store.votes(poll.id).len(), 1);
        assert!(f.store.comments(poll.id).unwrap().is_empty());

        // a second attempt changes nothing
        let (_, notice) = redirect(view_voting(&ctx, &f.rep, &poll.slug, Some(&form)).unwrap());
        assert_eq!(
            message(notice),
            "You have already cast your vote for this voting. Come back to see the results on 2026 October 21, 11:00 UTC."
        );
        assert_eq!(f.store.ballot(poll.id).unwrap().radio_polls[0].choices[0].votes, 1);
        assert_eq!(f.store.votes(poll.id).len(), 1);
    }

    #[test]
    fn duplicate_ballots_are_refused() {
        let f = Fixture::new();
        let poll = f.poll("Council", now() - Duration::hours(1), false);
        let ctx = f.ctx();
        let form = f.ballot_form(&poll, "");

        // the store refuses a second ballot even without the workflow's check
        f.store
            .record_ballot(&CastBallot {
                fk_poll: poll.id,
                fk_user: f.rep.id(),
                range_scores: vec![],
                radio_choices: vec![],
                comment: None,
                cast_at: now(),
            })
            .unwrap();
        let err = f.store.record_ballot(&CastBallot {
            fk_poll: poll.id,
            fk_user: f.rep.id(),
            range_scores: vec![(1, 1)],
            radio_choices: vec![],
            comment: None,
            cast_at: now(),
        });
        assert!(err.unwrap_err().is_conflict());

        let (_, notice) = redirect(view_voting(&ctx, &f.rep, &poll.slug, Some(&form)).unwrap());
        assert!(message(notice).starts_with("You have already cast your vote"));
        assert_eq!(f.store.votes(poll.id).len(), 1);
    }

    #[test]
    fn invalid_ballot_reports_every_item() {
        let f = Fixture::new();
        let poll = f.poll("Council", now() - Duration::hours(1), false);

        let form = raw(&[("range_poll__999", "1")]);
        match view_voting(&f.ctx(), &f.rep, &poll.slug, Some(&form)).unwrap() {
            Reply::Render(VotingPage::Ballot(page)) => {
                assert!(page.range_polls[0].has_errors);
                assert_eq!(page.radio_polls[0].errors, vec!["You must select a valid choice."]);
            }
            other => panic!("expected the ballot, got {:?}", other),
        }
        assert!(f.store.votes(poll.id).is_empty());
    }

    #[test]
    fn automated_polls_need_a_comment() {
        let f = Fixture::new();
        let poll = f.poll("Swag for FOSDEM", now() - Duration::hours(1), true);
        let ctx = f.ctx();

        match view_voting(&ctx, &f.rep, &poll.slug, Some(&f.ballot_form(&poll, " "))).unwrap() {
            Reply::Render(VotingPage::Ballot(page)) => assert_eq!(page.comment.errors, vec!["This field is required."]),
            other => panic!("expected the ballot, got {:?}", other),
        }
        assert!(f.store.votes(poll.id).is_empty());
        assert_eq!(f.store.ballot(poll.id).unwrap().radio_polls[0].choices[0].votes, 0);

        let form = f.ballot_form(&poll, "Worth it.");
        redirect(view_voting(&ctx, &f.rep, &poll.slug, Some(&form)).unwrap());
        let comments = f.store.comments(poll.id).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].0.comment, "Worth it.");
        assert_eq!(comments[0].1.username, "rep");

        match view_voting(&f.at(poll.poll_end), &f.other_rep, &poll.slug, None).unwrap() {
            Reply::Render(VotingPage::Results(page)) => {
                assert_eq!(page.comments[0].comment, "Worth it.");
                assert_eq!(page.users_voted, 1);
                assert_eq!(page.radio_polls[0].answers[0], Tally { label: "Yes".into(), votes: 1 });
            }
            other => panic!("expected the results, got {:?}", other),
        }
    }

    #[test]
    fn results_sorted_by_votes() {
        let f = Fixture::new();
        let poll = f.poll("Council", now() - Duration::hours(1), false);
        let form = f.ballot_form(&poll, "");
        redirect(view_voting(&f.ctx(), &f.rep, &poll.slug, Some(&form)).unwrap());

        match view_voting(&f.at(poll.poll_end), &f.rep, &poll.slug, None).unwrap() {
            Reply::Render(VotingPage::Results(page)) => {
                let votes: Vec<i32> = page.range_polls[0].choices.iter().map(|t| t.votes).collect();
                assert_eq!(votes, vec![2, 1]);
                assert_eq!(page.range_polls[0].choices[0].label, "rep Rep");
                assert!(page.comments.is_empty());
            }
            other => panic!("expected the results, got {:?}", other),
        }
    }

    #[test]
    fn gatekeeping() {
        let f = Fixture::new();
        let future = f.poll("Future", now() + Duration::days(1), false);
        let ctx = f.ctx();

        let (to, notice) = redirect(view_voting(&ctx, &f.outsider, &future.slug, None).unwrap());
        assert_eq!(to, Destination::Listing);
        assert_eq!(message(notice), "You do not have the permissions to vote on this voting.");

        let (to, notice) = redirect(view_voting(&ctx, &f.rep, &future.slug, None).unwrap());
        assert_eq!(to, Destination::Listing);
        assert_eq!(
            message(notice),
            "This vote has not yet begun. You can cast your vote on 2026 October 19, 12:00 UTC."
        );

        let (to, notice) = redirect(view_voting(&ctx, &f.admin, &future.slug, None).unwrap());
        assert_eq!(to, Destination::EditVoting(future.slug.clone()));
        assert!(notice.is_none());

        assert!(matches!(view_voting(&ctx, &f.rep, "missing", None).unwrap(), Reply::NotFound));
    }

    #[test]
    fn outsiders_never_see_a_ballot_or_results() {
        let f = Fixture::new();
        let current = f.poll("Current", now() - Duration::days(1), false);
        let past = f.poll("Past", now() - Duration::days(10), false);
        let ctx = f.ctx();

        for poll in &[&current, &past] {
            let (to, notice) = redirect(view_voting(&ctx, &f.outsider, &poll.slug, None).unwrap());
            assert_eq!(to, Destination::Listing);
            assert_eq!(message(notice), "You do not have the permissions to vote on this voting.");
        }

        let submitted = f.ballot_form(&current, "");
        let (to, _) = redirect(view_voting(&ctx, &f.outsider, &current.slug, Some(&submitted)).unwrap());
        assert_eq!(to, Destination::Listing);
        assert!(f.store.votes(current.id).is_empty());
    }

    fn new_poll_form(nominee: i32, group: i32) -> RawForm {
        let (nominee, group) = (nominee.to_string(), group.to_string());
        RawForm::new(
            vec![
                ("name", "Council elections"),
                ("description", "Yearly."),
                ("start", "2026-11-01 10:00"),
                ("end", "2026-11-05 10:00"),
                ("valid_group", group.as_str()),
                ("range_polls-TOTAL_FORMS", "1"),
                ("range_polls-0-name", "Seat"),
                ("range_polls-0-nominees", nominee.as_str()),
                ("radio_polls-TOTAL_FORMS", "1"),
                ("radio_polls-0-question", ""),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        )
    }

    #[test]
    fn creating_a_poll() {
        let f = Fixture::new();
        let ctx = f.ctx();

        let (to, notice) = redirect(edit_voting(&ctx, &f.rep, None, None).unwrap());
        assert_eq!(to, Destination::Listing);
        assert_eq!(message(notice), "Permission denied.");

        match edit_voting(&ctx, &f.council, None, None).unwrap() {
            Reply::Render(page) => {
                assert!(page.creating);
                assert!(!page.can_delete);
                assert_eq!(page.form.range_total, 1);
                assert_eq!(page.form.radio_total, 1);
                // the nominee group's registered members
                assert_eq!(page.form.range_polls[0].nominees.len(), 4);
            }
            other => panic!("expected the form, got {:?}", other),
        }

        let form = new_poll_form(f.nominee.id, f.reps.id);
        let (to, notice) = redirect(edit_voting(&ctx, &f.council, None, Some(&form)).unwrap());
        assert_eq!(to, Destination::EditVoting("council-elections".into()));
        assert_eq!(message(notice), "Voting successfully created.");

        let poll = f.store.poll_by_slug("council-elections").unwrap().unwrap();
        assert_eq!(poll.fk_created_by, f.council.id());
        assert_eq!(poll.poll_start, Utc.ymd(2026, 11, 1).and_hms(10, 0, 0));
        assert!(poll.task_start_id.is_some() && poll.task_end_id.is_some());
        let ballot = f.store.ballot(poll.id).unwrap();
        assert_eq!(ballot.range_polls.len(), 1);
        assert!(ballot.radio_polls.is_empty());

        // the same name again gets a fresh slug
        let (to, _) = redirect(edit_voting(&ctx, &f.council, None, Some(&form)).unwrap());
        assert_eq!(to, Destination::EditVoting("council-elections-1".into()));
    }

    #[test]
    fn invalid_poll_persists_nothing() {
        let f = Fixture::new();
        let form = RawForm::new(vec![("name".to_string(), "Council".to_string())]);
        match edit_voting(&f.ctx(), &f.admin, None, Some(&form)).unwrap() {
            Reply::Render(page) => {
                assert_eq!(page.form.errors["start"], vec!["This field is required."]);
                assert_eq!(page.form.non_field_errors, vec!["At least one range or radio poll is required."]);
            }
            other => panic!("expected the form, got {:?}", other),
        }
        assert_eq!(f.store.poll_count(), 0);
        assert!(f.store.tasks().is_empty());
    }

    #[test]
    fn editing_polls() {
        let f = Fixture::new();
        let ctx = f.ctx();
        let future = f.poll("Future", now() + Duration::days(1), false);
        let future = tasks::schedule_poll_notifications(&ctx, &future, None).unwrap();

        assert!(matches!(edit_voting(&ctx, &f.admin, Some("missing"), None).unwrap(), Reply::NotFound));

        match edit_voting(&ctx, &f.admin, Some(&future.slug), None).unwrap() {
            Reply::Render(page) => {
                assert!(!page.creating && !page.current_voting_edit && page.can_delete);
                // no blank rows once items exist
                assert_eq!(page.form.range_total, 1);
                assert_eq!(page.form.radio_total, 1);
            }
            other => panic!("expected the form, got {:?}", other),
        }
        match edit_voting(&ctx, &f.council, Some(&future.slug), None).unwrap() {
            Reply::Render(page) => assert!(!page.can_delete),
            other => panic!("expected the form, got {:?}", other),
        }

        // running polls only take metadata
        let running = f.poll("Running", now() - Duration::hours(1), false);
        let form = raw(&[
            ("name", "Running renamed"),
            ("end", "2026-10-25 12:00"),
            ("range_polls-TOTAL_FORMS", "0"),
            ("radio_polls-TOTAL_FORMS", "0"),
        ]);
        let (to, notice) = redirect(edit_voting(&ctx, &f.admin, Some(&running.slug), Some(&form)).unwrap());
        assert_eq!(to, Destination::EditVoting("running".into()));
        assert_eq!(message(notice), "Voting successfully edited.");
        let saved = f.store.poll_by_slug("running").unwrap().unwrap();
        assert_eq!(saved.name, "Running renamed");
        assert_eq!(saved.poll_end, Utc.ymd(2026, 10, 25).and_hms(12, 0, 0));
        assert_eq!(saved.poll_start, running.poll_start);
        let ballot = f.store.ballot(saved.id).unwrap();
        assert_eq!((ballot.range_polls.len(), ballot.radio_polls.len()), (1, 1));
    }

    #[test]
    fn deleting_polls() {
        let f = Fixture::new();
        let ctx = f.ctx();
        let poll = f.poll("Doomed", now() + Duration::days(1), false);
        let poll = tasks::schedule_poll_notifications(&ctx, &poll, None).unwrap();

        let (_, notice) = redirect(delete_voting(&ctx, &f.council, &poll.slug, true).unwrap());
        assert_eq!(message(notice), "Permission denied.");

        let (to, notice) = redirect(delete_voting(&ctx, &f.admin, &poll.slug, false).unwrap());
        assert_eq!(to, Destination::Listing);
        assert!(notice.is_none());
        assert_eq!(f.store.poll_count(), 1);

        let (_, notice) = redirect(delete_voting(&ctx, &f.admin, &poll.slug, true).unwrap());
        assert_eq!(message(notice), "Voting successfully deleted.");
        assert_eq!(f.store.poll_count(), 0);
        assert!(f.store.poll_by_slug(&poll.slug).unwrap().is_none());

        assert!(matches!(delete_voting(&ctx, &f.admin, &poll.slug, true).unwrap(), Reply::NotFound));
    }
}
