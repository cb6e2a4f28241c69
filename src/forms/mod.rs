//! Form binding and validation for the voting pages.
//!
//! Rocket's derived forms need the field names up front, but the ballot and
//! poll pages name their fields after database ids (`range_poll__12`,
//! `radio_polls-3-question`). Submissions are therefore collected into a
//! `RawForm` and each form picks its own fields out of it.

use std::collections::BTreeMap;

use rocket::request::{FormItems, FromForm};

pub mod ballot;
pub mod poll;

pub const REQUIRED: &str = "This field is required.";

/// Field name → validation messages, in field order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Every decoded key/value pair of a submitted form, in submission order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawForm {
    fields: Vec<(String, String)>,
}

impl RawForm {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        RawForm { fields }
    }

    /// The first value submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value submitted for `key`, as sent by multiple selects.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The trimmed value of `key`, empty when absent.
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(str::trim).unwrap_or_default().to_string()
    }

    /// Checkbox semantics: present and not an explicit false.
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key).map(str::trim) {
            None | Some("") | Some("off") | Some("false") | Some("0") => false,
            Some(_) => true,
        }
    }
}

impl<'f> FromForm<'f> for RawForm {
    type Error = ();

    fn from_form(items: &mut FormItems<'f>, _strict: bool) -> Result<Self, ()> {
        let fields = items.map(|item| item.key_value_decoded()).collect();
        Ok(RawForm { fields })
    }
}
