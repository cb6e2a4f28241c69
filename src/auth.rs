use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use rocket::{Outcome, State};

use crate::config::REMOTE_USER_HEADER;
use crate::domain::people::{Group, User};
use crate::error::DashResult;
use crate::server::Services;
use crate::settings::{Permission, Settings};
use crate::store::Store;

/// The user behind the current request, as authenticated by the SSO proxy.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub groups: Vec<Group>,
}

impl CurrentUser {
    pub fn load(store: &dyn Store, username: &str) -> DashResult<Option<CurrentUser>> {
        match store.user_by_username(username)? {
            Some(user) => {
                let groups = store.groups_of(user.id)?;
                Ok(Some(CurrentUser { user, groups }))
            }
            None => Ok(None),
        }
    }

    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn in_group(&self, group_id: i32) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    fn in_group_named(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    pub fn is_admin(&self, settings: &Settings) -> bool {
        self.in_group_named(&settings.admin_group)
    }

    pub fn has_perm(&self, settings: &Settings, perm: Permission) -> bool {
        self.is_admin(settings)
            || settings
                .groups_with(perm)
                .iter()
                .any(|name| self.in_group_named(name))
    }

    pub fn has_perms(&self, settings: &Settings, perms: &[Permission]) -> bool {
        perms.iter().all(|&perm| self.has_perm(settings, perm))
    }
}

impl<'a, 'r> FromRequest<'a, 'r> for CurrentUser {
    type Error = ();

    fn from_request(request: &'a Request<'r>) -> request::Outcome<Self, ()> {
        let username = match request.headers().get_one(REMOTE_USER_HEADER) {
            Some(username) if !username.trim().is_empty() => username.trim(),
            _ => return Outcome::Failure((Status::Unauthorized, ())),
        };

        let services = match request.guard::<State<'_, Services>>() {
            Outcome::Success(services) => services,
            _ => return Outcome::Failure((Status::InternalServerError, ())),
        };

        match CurrentUser::load(&*services.store, username) {
            Ok(Some(user)) => Outcome::Success(user),
            Ok(None) => {
                warn!("request from unknown user {}", username);
                Outcome::Failure((Status::Unauthorized, ()))
            }
            Err(why) => {
                error!("unable to load user {}: {:?}", username, why);
                Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}
