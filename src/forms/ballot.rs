//! Per-item vote forms of the ballot page. Each form only reads its own
//! fields; the workflow decides what to do with the combined result.

use crate::domain::voting::{RadioItem, RangeItem};

use super::{push_error, FieldErrors, RawForm, REQUIRED};

const INVALID_RADIO: &str = "You must select a valid choice.";

fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {} is not one of the available choices.", value)
}

//==============================================================================
// Range items
//==============================================================================

/// Scores every nominee of a range item with `0..=n`, `n` being the number
/// of nominees.
#[derive(Clone, Debug)]
pub struct RangePollChoiceVoteForm {
    item: RangeItem,
    values: Vec<String>,
    scores: Vec<(i32, i32)>,
    errors: FieldErrors,
}

#[derive(Clone, Debug, Serialize)]
pub struct RangeVoteView {
    pub id: i32,
    pub name: String,
    pub choices: Vec<RangeChoiceView>,
    pub has_errors: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RangeChoiceView {
    pub field: String,
    pub nominee: String,
    pub options: Vec<ScoreOption>,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreOption {
    pub value: i32,
    pub selected: bool,
}

impl RangePollChoiceVoteForm {
    pub fn new(item: RangeItem) -> Self {
        let values = vec![String::new(); item.choices.len()];
        RangePollChoiceVoteForm {
            item,
            values,
            scores: Vec::new(),
            errors: FieldErrors::new(),
        }
    }

    pub fn field(choice_id: i32) -> String {
        format!("range_poll__{}", choice_id)
    }

    pub fn bind(&mut self, form: &RawForm) -> bool {
        let max = self.item.choices.len() as i32;
        self.values.clear();
        self.scores.clear();
        self.errors.clear();

        for (choice, _) in &self.item.choices {
            let field = Self::field(choice.id);
            let value = form.text(&field);
            if value.is_empty() {
                push_error(&mut self.errors, &field, REQUIRED);
            } else {
                match value.parse::<i32>() {
                    Ok(score) if score >= 0 && score <= max => self.scores.push((choice.id, score)),
                    _ => push_error(&mut self.errors, &field, invalid_choice(&value)),
                }
            }
            self.values.push(value);
        }

        self.errors.is_empty()
    }

    /// (choice id, score) pairs of a successfully bound form.
    pub fn scores(&self) -> &[(i32, i32)] {
        &self.scores
    }

    #[cfg(test)]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn view(&self) -> RangeVoteView {
        let max = self.item.choices.len() as i32;
        let choices = self
            .item
            .choices
            .iter()
            .zip(&self.values)
            .map(|((choice, nominee), value)| {
                let field = Self::field(choice.id);
                RangeChoiceView {
                    nominee: nominee.full_name(),
                    options: (0..=max)
                        .map(|score| ScoreOption {
                            value: score,
                            selected: *value == score.to_string(),
                        })
                        .collect(),
                    errors: self.errors.get(&field).cloned().unwrap_or_default(),
                    field,
                }
            })
            .collect();

        RangeVoteView {
            id: self.item.poll.id,
            name: self.item.poll.name.clone(),
            choices,
            has_errors: !self.errors.is_empty(),
        }
    }
}

//==============================================================================
// Radio items
//==============================================================================

/// Picks one answer of a radio item.
#[derive(Clone, Debug)]
pub struct RadioPollChoiceVoteForm {
    item: RadioItem,
    value: String,
    selection: Option<i32>,
    errors: FieldErrors,
}

#[derive(Clone, Debug, Serialize)]
pub struct RadioVoteView {
    pub id: i32,
    pub question: String,
    pub field: String,
    pub answers: Vec<AnswerOption>,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnswerOption {
    pub value: i32,
    pub answer: String,
    pub selected: bool,
}

impl RadioPollChoiceVoteForm {
    pub fn new(item: RadioItem) -> Self {
        RadioPollChoiceVoteForm {
            item,
            value: String::new(),
            selection: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn field(item_id: i32) -> String {
        format!("radio_poll__{}", item_id)
    }

    pub fn bind(&mut self, form: &RawForm) -> bool {
        let field = Self::field(self.item.poll.id);
        self.value = form.text(&field);
        self.selection = None;
        self.errors.clear();

        if self.value.is_empty() || self.value == "None" {
            push_error(&mut self.errors, &field, INVALID_RADIO);
        } else {
            let choice = self.value.parse::<i32>().ok().and_then(|id| {
                self.item.choices.iter().find(|c| c.id == id).map(|c| c.id)
            });
            match choice {
                Some(id) => self.selection = Some(id),
                None => push_error(&mut self.errors, &field, invalid_choice(&self.value)),
            }
        }

        self.errors.is_empty()
    }

    /// The chosen answer's id once bound successfully.
    pub fn selection(&self) -> Option<i32> {
        self.selection
    }

    #[cfg(test)]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn view(&self) -> RadioVoteView {
        let field = Self::field(self.item.poll.id);
        RadioVoteView {
            id: self.item.poll.id,
            question: self.item.poll.question.clone(),
            answers: self
                .item
                .choices
                .iter()
                .map(|c| AnswerOption {
                    value: c.id,
                    answer: c.answer.clone(),
                    selected: self.value == c.id.to_string(),
                })
                .collect(),
            errors: self.errors.get(&field).cloned().unwrap_or_default(),
            field,
        }
    }
}

//==============================================================================
// Comments
//==============================================================================

/// The voter's comment, mandatory on automated polls only.
#[derive(Clone, Debug)]
pub struct PollCommentForm {
    required: bool,
    comment: String,
    errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentView {
    pub required: bool,
    pub comment: String,
    pub errors: Vec<String>,
}

impl PollCommentForm {
    pub const FIELD: &'static str = "comment";

    pub fn new(required: bool) -> Self {
        PollCommentForm {
            required,
            comment: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn bind(&mut self, form: &RawForm) -> bool {
        self.comment = form.text(Self::FIELD);
        self.errors.clear();
        if self.required && self.comment.is_empty() {
            self.errors.push(REQUIRED.to_string());
        }
        self.errors.is_empty()
    }

    pub fn comment(&self) -> Option<&str> {
        if self.comment.is_empty() {
            None
        } else {
            Some(&self.comment)
        }
    }

    pub fn view(&self) -> CommentView {
        CommentView {
            required: self.required,
            comment: self.comment.clone(),
            errors: self.errors.clone(),
        }
    }
}
