use chrono::{Duration, FixedOffset};
use toml;
use url::Url;

use crate::error::*;

//==============================================================================
// Public API
//==============================================================================

/// Domain settings of the voting application, read from `voting.toml`.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub items_per_page: usize,
    pub admin_group: String,
    pub council_group: String,
    pub nominee_group: String,
    pub council_alias: String,
    pub bot_username: String,
    pub site_url: String,
    pub utc_offset_minutes: i32,
    pub end_reminder_hours: i64,
    pub automated_polls: AutomatedPolls,
    pub permissions: Permissions,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AutomatedPolls {
    pub components: Vec<String>,
    pub start_delay_hours: i64,
    pub duration_hours: i64,
    pub question: String,
    pub answers: Vec<String>,
}

/// Groups granted each poll permission. Administrators hold all of them.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub add_poll: Vec<String>,
    #[serde(default)]
    pub change_poll: Vec<String>,
    #[serde(default)]
    pub delete_poll: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Permission {
    AddPoll,
    ChangePoll,
    DeletePoll,
}

impl Settings {
    pub fn local_offset(&self) -> FixedOffset {
        // validated in `check`
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| FixedOffset::east(0))
    }

    pub fn end_reminder(&self) -> Duration {
        Duration::hours(self.end_reminder_hours)
    }

    /// Is `component` one of the bug components that request council votes?
    pub fn is_automated_component(&self, component: &str) -> bool {
        self.automated_polls.components.iter().any(|c| c == component)
    }

    /// The groups holding `perm`.
    pub fn groups_with(&self, perm: Permission) -> &[String] {
        match perm {
            Permission::AddPoll => &self.permissions.add_poll,
            Permission::ChangePoll => &self.permissions.change_poll,
            Permission::DeletePoll => &self.permissions.delete_poll,
        }
    }

    /// Absolute link to the vote page of `slug`.
    pub fn voting_url(&self, slug: &str) -> DashResult<Url> {
        Ok(Url::parse(&self.site_url)?.join(&format!("voting/{}", slug))?)
    }

    fn check(&self) -> DashResult<()> {
        if self.items_per_page == 0 {
            throw!(misc!("items_per_page must be positive"));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes * 60).is_none() {
            throw!(misc!("utc_offset_minutes {} is out of range", self.utc_offset_minutes));
        }
        if self.automated_polls.duration_hours <= self.automated_polls.start_delay_hours {
            throw!(misc!("automated polls must end after they start"));
        }
        if self.automated_polls.answers.len() < 2 {
            throw!(misc!("automated polls need at least two answers"));
        }
        Url::parse(&self.site_url)?;
        Ok(())
    }
}

/// Read the validated `voting.toml` compiled into the binary.
pub fn read_settings() -> Settings {
    read_settings_from(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/voting.toml")))
        .expect("couldn't parse voting.toml!")
}

//==============================================================================
// Implementation details
//==============================================================================

pub fn read_settings_from(input: &str) -> DashResult<Settings> {
    let settings: Settings = toml::from_str(input)?;
    settings.check()?;
    Ok(settings)
}

//==============================================================================
// Tests
//==============================================================================
