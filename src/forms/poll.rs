//! The poll create/edit form and its inline range/radio item formsets.
//!
//! Formset fields follow the `<prefix>-<index>-<field>` layout with a
//! `<prefix>-TOTAL_FORMS` counter, so the page can add rows client side.

use chrono::{DateTime, FixedOffset, Utc};

use crate::dates::{format_field, parse_local_datetime};
use crate::domain::people::{Group, User};
use crate::domain::voting::{Ballot, BallotDraft, Poll, RadioPollDraft, RangePollDraft};

use super::{push_error, FieldErrors, RawForm, REQUIRED};

const INVALID_DATE: &str = "Date chosen is invalid.";
const INVALID_GROUP: &str = "Select a valid group.";
const START_AFTER_END: &str = "Start date should come before end date.";
const NO_ITEMS: &str = "At least one range or radio poll is required.";
const NO_NOMINEES: &str = "Select at least one nominee.";
const INVALID_NOMINEE: &str = "Select a valid nominee.";
const FEW_ANSWERS: &str = "Provide at least two answers.";
const UNKNOWN_ITEM: &str = "Select a valid choice. That choice is not one of the available choices.";

const RANGE_PREFIX: &str = "range_polls";
const RADIO_PREFIX: &str = "radio_polls";
/// Upper bound on submitted formset rows.
const MAX_ROWS: usize = 1000;

/// What a poll form is validated against.
pub struct PollFormContext<'a> {
    pub offset: FixedOffset,
    pub groups: &'a [Group],
    /// Users that may be nominated in range items.
    pub nominees: &'a [User],
    /// Items currently stored for the poll; rows may only refer to these.
    pub ballot: &'a Ballot,
    pub automated: bool,
}

/// The cleaned result of a valid poll form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollSubmission {
    pub name: String,
    pub description: String,
    pub poll_start: DateTime<Utc>,
    pub poll_end: DateTime<Utc>,
    pub fk_valid_group: i32,
    /// `None` when the item structure was not part of the form.
    pub draft: Option<BallotDraft>,
}

//==============================================================================
// Rendering
//==============================================================================

#[derive(Clone, Debug, Default, Serialize)]
pub struct PollFormView {
    pub metadata_only: bool,
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub groups: Vec<OptionView>,
    pub range_polls: Vec<RangeRowView>,
    pub radio_polls: Vec<RadioRowView>,
    pub range_total: usize,
    pub radio_total: usize,
    pub errors: FieldErrors,
    pub non_field_errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OptionView {
    pub id: i32,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RangeRowView {
    pub index: usize,
    pub id: Option<i32>,
    pub name: String,
    pub nominees: Vec<OptionView>,
    pub delete: bool,
    pub errors: FieldErrors,
}

#[derive(Clone, Debug, Serialize)]
pub struct RadioRowView {
    pub index: usize,
    pub id: Option<i32>,
    pub question: String,
    pub answers: String,
    pub delete: bool,
    pub errors: FieldErrors,
}

//==============================================================================
// Formset rows
//==============================================================================

#[derive(Clone, Debug, Default)]
struct RangeRow {
    id: Option<i32>,
    raw_id: String,
    name: String,
    nominees: Vec<String>,
    delete: bool,
    errors: FieldErrors,
}

#[derive(Clone, Debug, Default)]
struct RadioRow {
    id: Option<i32>,
    raw_id: String,
    question: String,
    answers: String,
    delete: bool,
    errors: FieldErrors,
}

fn row_field(prefix: &str, index: usize, field: &str) -> String {
    format!("{}-{}-{}", prefix, index, field)
}

fn total_rows(form: &RawForm, prefix: &str) -> usize {
    form.text(&format!("{}-TOTAL_FORMS", prefix))
        .parse::<usize>()
        .unwrap_or(0)
        .min(MAX_ROWS)
}

/// Resolves a submitted item id against the stored items, `Err` when it
/// names an item of another poll.
fn resolve_id(raw: &str, known: &[i32]) -> Result<Option<i32>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i32>() {
        Ok(id) if known.contains(&id) => Ok(Some(id)),
        _ => Err(()),
    }
}

/// Non-blank answer lines, first occurrence wins.
fn answer_lines(answers: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in answers.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !lines.iter().any(|l| l == line) {
            lines.push(line.to_string());
        }
    }
    lines
}

impl RangeRow {
    fn bind(form: &RawForm, index: usize, known: &[i32]) -> Self {
        let raw_id = form.text(&row_field(RANGE_PREFIX, index, "id"));
        let mut row = RangeRow {
            id: None,
            name: form.text(&row_field(RANGE_PREFIX, index, "name")),
            nominees: form
                .get_all(&row_field(RANGE_PREFIX, index, "nominees"))
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            delete: form.flag(&row_field(RANGE_PREFIX, index, "DELETE")),
            raw_id,
            errors: FieldErrors::new(),
        };
        match resolve_id(&row.raw_id, known) {
            Ok(id) => row.id = id,
            Err(()) => push_error(&mut row.errors, "id", UNKNOWN_ITEM),
        }
        row
    }

    fn is_blank(&self) -> bool {
        self.raw_id.is_empty() && self.name.is_empty() && self.nominees.is_empty()
    }

    fn clean(&mut self, nominees: &[User]) -> Option<RangePollDraft> {
        if self.name.is_empty() {
            push_error(&mut self.errors, "name", REQUIRED);
        }
        let mut picked = Vec::new();
        if self.nominees.is_empty() {
            push_error(&mut self.errors, "nominees", NO_NOMINEES);
        }
        for value in &self.nominees {
            match value.parse::<i32>() {
                Ok(id) if nominees.iter().any(|u| u.id == id) => {
                    if !picked.contains(&id) {
                        picked.push(id);
                    }
                }
                _ => {
                    push_error(&mut self.errors, "nominees", INVALID_NOMINEE);
                    break;
                }
            }
        }
        if !self.errors.is_empty() {
            return None;
        }
        Some(RangePollDraft {
            id: self.id,
            name: self.name.clone(),
            nominees: picked,
        })
    }

    fn view(&self, index: usize, nominees: &[User]) -> RangeRowView {
        RangeRowView {
            index,
            id: self.id,
            name: self.name.clone(),
            nominees: nominees
                .iter()
                .map(|u| OptionView {
                    id: u.id,
                    label: u.full_name(),
                    selected: self.nominees.contains(&u.id.to_string()),
                })
                .collect(),
            delete: self.delete,
            errors: self.errors.clone(),
        }
    }
}

impl RadioRow {
    fn bind(form: &RawForm, index: usize, known: &[i32]) -> Self {
        let raw_id = form.text(&row_field(RADIO_PREFIX, index, "id"));
        let mut row = RadioRow {
            id: None,
            question: form.text(&row_field(RADIO_PREFIX, index, "question")),
            answers: form.text(&row_field(RADIO_PREFIX, index, "answers")),
            delete: form.flag(&row_field(RADIO_PREFIX, index, "DELETE")),
            raw_id,
            errors: FieldErrors::new(),
        };
        match resolve_id(&row.raw_id, known) {
            Ok(id) => row.id = id,
            Err(()) => push_error(&mut row.errors, "id", UNKNOWN_ITEM),
        }
        row
    }

    fn is_blank(&self) -> bool {
        self.raw_id.is_empty() && self.question.is_empty() && self.answers.is_empty()
    }

    fn clean(&mut self) -> Option<RadioPollDraft> {
        if self.question.is_empty() {
            push_error(&mut self.errors, "question", REQUIRED);
        }
        let answers = answer_lines(&self.answers);
        if answers.len() < 2 {
            push_error(&mut self.errors, "answers", FEW_ANSWERS);
        }
        if !self.errors.is_empty() {
            return None;
        }
        Some(RadioPollDraft {
            id: self.id,
            question: self.question.clone(),
            answers,
        })
    }

    fn view(&self, index: usize) -> RadioRowView {
        RadioRowView {
            index,
            id: self.id,
            question: self.question.clone(),
            answers: self.answers.clone(),
            delete: self.delete,
            errors: self.errors.clone(),
        }
    }
}

//==============================================================================
// Full poll form
//==============================================================================

/// Creates a poll or edits one that has not started or has ended, including
/// its ballot items.
#[derive(Clone, Debug, Default)]
pub struct PollAddForm {
    name: String,
    description: String,
    start: String,
    end: String,
    valid_group: String,
    range_rows: Vec<RangeRow>,
    radio_rows: Vec<RadioRow>,
    errors: FieldErrors,
    non_field_errors: Vec<String>,
    cleaned: Option<PollSubmission>,
}

impl PollAddForm {
    /// An unbound form showing `poll` and its items, plus `extra` blank rows
    /// of each item kind.
    pub fn new(poll: Option<&Poll>, ballot: &Ballot, extra: usize, offset: FixedOffset) -> Self {
        let mut form = PollAddForm::default();
        if let Some(poll) = poll {
            form.name = poll.name.clone();
            form.description = poll.description.clone();
            form.start = format_field(poll.poll_start, offset);
            form.end = format_field(poll.poll_end, offset);
            form.valid_group = poll.fk_valid_group.to_string();
        }

        form.range_rows = ballot
            .range_polls
            .iter()
            .map(|item| RangeRow {
                id: Some(item.poll.id),
                raw_id: item.poll.id.to_string(),
                name: item.poll.name.clone(),
                nominees: item.choices.iter().map(|(c, _)| c.fk_nominee.to_string()).collect(),
                ..RangeRow::default()
            })
            .collect();
        form.range_rows.extend((0..extra).map(|_| RangeRow::default()));

        form.radio_rows = ballot
            .radio_polls
            .iter()
            .map(|item| RadioRow {
                id: Some(item.poll.id),
                raw_id: item.poll.id.to_string(),
                question: item.poll.question.clone(),
                answers: item
                    .choices
                    .iter()
                    .map(|c| c.answer.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                ..RadioRow::default()
            })
            .collect();
        form.radio_rows.extend((0..extra).map(|_| RadioRow::default()));

        form
    }

    pub fn bind(&mut self, form: &RawForm, ctx: &PollFormContext<'_>) -> bool {
        self.name = form.text("name");
        self.description = form.text("description");
        self.start = form.text("start");
        self.end = form.text("end");
        self.valid_group = form.text("valid_group");
        self.errors.clear();
        self.non_field_errors.clear();
        self.cleaned = None;

        if self.name.is_empty() {
            push_error(&mut self.errors, "name", REQUIRED);
        }
        let start = clean_date(&mut self.errors, "start", &self.start, ctx.offset);
        let end = clean_date(&mut self.errors, "end", &self.end, ctx.offset);
        let group = clean_group(&mut self.errors, &self.valid_group, ctx.groups);
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                self.non_field_errors.push(START_AFTER_END.to_string());
            }
        }

        let range_ids: Vec<i32> = ctx.ballot.range_polls.iter().map(|i| i.poll.id).collect();
        let radio_ids: Vec<i32> = ctx.ballot.radio_polls.iter().map(|i| i.poll.id).collect();
        self.range_rows = (0..total_rows(form, RANGE_PREFIX))
            .map(|i| RangeRow::bind(form, i, &range_ids))
            .collect();
        self.radio_rows = (0..total_rows(form, RADIO_PREFIX))
            .map(|i| RadioRow::bind(form, i, &radio_ids))
            .collect();

        let mut draft = BallotDraft::default();
        let mut rows_valid = true;
        for row in &mut self.range_rows {
            if !row.errors.is_empty() {
                rows_valid = false;
            } else if row.delete || row.is_blank() {
                continue;
            } else {
                match row.clean(ctx.nominees) {
                    Some(item) => draft.range_polls.push(item),
                    None => rows_valid = false,
                }
            }
        }
        for row in &mut self.radio_rows {
            if !row.errors.is_empty() {
                rows_valid = false;
            } else if row.delete || row.is_blank() {
                continue;
            } else {
                match row.clean() {
                    Some(item) => draft.radio_polls.push(item),
                    None => rows_valid = false,
                }
            }
        }
        if rows_valid && !ctx.automated && draft.range_polls.is_empty() && draft.radio_polls.is_empty() {
            self.non_field_errors.push(NO_ITEMS.to_string());
        }

        if !(self.errors.is_empty() && self.non_field_errors.is_empty() && rows_valid) {
            return false;
        }
        match (start, end, group) {
            (Some(poll_start), Some(poll_end), Some(fk_valid_group)) => {
                self.cleaned = Some(PollSubmission {
                    name: self.name.clone(),
                    description: self.description.clone(),
                    poll_start,
                    poll_end,
                    fk_valid_group,
                    draft: Some(draft),
                });
                true
            }
            _ => false,
        }
    }

    pub fn cleaned(&self) -> Option<&PollSubmission> {
        self.cleaned.as_ref()
    }

    pub fn view(&self, groups: &[Group], nominees: &[User]) -> PollFormView {
        PollFormView {
            metadata_only: false,
            name: self.name.clone(),
            description: self.description.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            groups: group_options(groups, &self.valid_group),
            range_polls: self
                .range_rows
                .iter()
                .enumerate()
                .map(|(i, row)| row.view(i, nominees))
                .collect(),
            radio_polls: self
                .radio_rows
                .iter()
                .enumerate()
                .map(|(i, row)| row.view(i))
                .collect(),
            range_total: self.range_rows.len(),
            radio_total: self.radio_rows.len(),
            errors: self.errors.clone(),
            non_field_errors: self.non_field_errors.clone(),
        }
    }
}

//==============================================================================
// Running poll form
//==============================================================================

/// Edits a running poll: name, description and end only.
#[derive(Clone, Debug)]
pub struct PollEditForm {
    poll: Poll,
    name: String,
    description: String,
    end: String,
    errors: FieldErrors,
    non_field_errors: Vec<String>,
    cleaned: Option<PollSubmission>,
}

impl PollEditForm {
    pub fn new(poll: &Poll, offset: FixedOffset) -> Self {
        PollEditForm {
            poll: poll.clone(),
            name: poll.name.clone(),
            description: poll.description.clone(),
            end: format_field(poll.poll_end, offset),
            errors: FieldErrors::new(),
            non_field_errors: Vec::new(),
            cleaned: None,
        }
    }

    pub fn bind(&mut self, form: &RawForm, offset: FixedOffset) -> bool {
        self.name = form.text("name");
        self.description = form.text("description");
        self.end = form.text("end");
        self.errors.clear();
        self.non_field_errors.clear();
        self.cleaned = None;

        if self.name.is_empty() {
            push_error(&mut self.errors, "name", REQUIRED);
        }
        let end = clean_date(&mut self.errors, "end", &self.end, offset);
        if let Some(end) = end {
            if self.poll.poll_start >= end {
                self.non_field_errors.push(START_AFTER_END.to_string());
            }
        }

        match end {
            Some(poll_end) if self.errors.is_empty() && self.non_field_errors.is_empty() => {
                self.cleaned = Some(PollSubmission {
                    name: self.name.clone(),
                    description: self.description.clone(),
                    poll_start: self.poll.poll_start,
                    poll_end,
                    fk_valid_group: self.poll.fk_valid_group,
                    draft: None,
                });
                true
            }
            _ => false,
        }
    }

    pub fn cleaned(&self) -> Option<&PollSubmission> {
        self.cleaned.as_ref()
    }

    pub fn view(&self, groups: &[Group], offset: FixedOffset) -> PollFormView {
        PollFormView {
            metadata_only: true,
            name: self.name.clone(),
            description: self.description.clone(),
            start: format_field(self.poll.poll_start, offset),
            end: self.end.clone(),
            groups: group_options(groups, &self.poll.fk_valid_group.to_string()),
            errors: self.errors.clone(),
            non_field_errors: self.non_field_errors.clone(),
            ..PollFormView::default()
        }
    }
}

//==============================================================================
// Field helpers
//==============================================================================

fn clean_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        push_error(errors, field, REQUIRED);
        return None;
    }
    let parsed = parse_local_datetime(value, offset);
    if parsed.is_none() {
        push_error(errors, field, INVALID_DATE);
    }
    parsed
}

fn clean_group(errors: &mut FieldErrors, value: &str, groups: &[Group]) -> Option<i32> {
    if value.is_empty() {
        push_error(errors, "valid_group", REQUIRED);
        return None;
    }
    let group = value
        .parse::<i32>()
        .ok()
        .filter(|id| groups.iter().any(|g| g.id == *id));
    if group.is_none() {
        push_error(errors, "valid_group", INVALID_GROUP);
    }
    group
}

fn group_options(groups: &[Group], selected: &str) -> Vec<OptionView> {
    groups
        .iter()
        .map(|g| OptionView {
            id: g.id,
            label: g.name.clone(),
            selected: g.id.to_string() == selected,
        })
        .collect()
}
