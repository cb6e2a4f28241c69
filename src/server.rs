use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::response::{content, Flash, Redirect};
use rocket::Rocket;
use rocket_contrib::templates::handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;

use crate::auth::CurrentUser;
use crate::error::DashResult;
use crate::settings::Settings;
use crate::store::Store;
use crate::voting::{Ctx, Destination, Reply};

/// Everything the request handlers share.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub settings: Settings,
    pub webhook_secrets: Vec<String>,
}

impl Services {
    pub fn ctx(&self) -> Ctx<'_> {
        Ctx {
            store: &*self.store,
            settings: &self.settings,
            now: Utc::now(),
        }
    }
}

pub fn rocket(services: Services) -> Rocket {
    rocket::ignite()
        .manage(services)
        .mount(
            "/voting",
            routes![
                html::list_votings,
                html::list_votings_past,
                html::new_voting,
                html::create_voting,
                html::edit_voting,
                html::save_voting,
                html::view_voting,
                html::cast_vote,
                html::delete_voting,
                html::confirm_delete_voting,
            ],
        )
        .mount("/api", routes![api::bug_webhook])
        .register(catchers![html::unauthorized])
}

pub fn serve(services: Services) {
    // in debug builds this will force an init, good enough for testing
    let _hbars = &*TEMPLATES;

    loop {
        let port = ::std::env::var("ROCKET_PORT").unwrap_or_else(|_| String::from("8000"));
        info!("Attempting to launch Rocket at port {}...", &port);
        let services = services.clone();
        let result = catch_unwind(AssertUnwindSafe(move || {
            let why = rocket(services).launch();
            error!("Rocket failed to launch: {}", why);
        }));

        ok_or!(result, why => error!("Rocket failed to ignite: {:?}", why));
    }
}

/// What a page handler answers with.
#[derive(Responder)]
pub enum Page {
    Html(content::Html<String>),
    Flash(Flash<Redirect>),
    Redirect(Redirect),
    Status(Status),
}

fn location(to: &Destination) -> String {
    match to {
        Destination::Listing => "/voting/".to_string(),
        Destination::EditVoting(slug) => format!("/voting/{}/edit", slug),
    }
}

fn render<T: Serialize>(
    template: &str,
    user: &CurrentUser,
    flash: Option<FlashMessage<'_, '_>>,
    model: &T,
) -> DashResult<content::Html<String>> {
    let flash = match flash {
        Some(flash) => json!({ "level": flash.name(), "message": flash.msg() }),
        None => Value::Null,
    };
    let context = json!({
        "user": {
            "username": user.user.username,
            "full_name": user.user.full_name(),
        },
        "flash": flash,
        "model": model,
    });
    Ok(content::Html(TEMPLATES.render(template, &context)?))
}

fn respond<T, F>(reply: Reply<T>, render_page: F) -> DashResult<Page>
where
    F: FnOnce(T) -> DashResult<content::Html<String>>,
{
    Ok(match reply {
        Reply::Render(model) => Page::Html(render_page(model)?),
        Reply::Redirect(to, None) => Page::Redirect(Redirect::to(location(&to))),
        Reply::Redirect(to, Some(notice)) => Page::Flash(Flash::new(
            Redirect::to(location(&to)),
            notice.level.as_str(),
            notice.message,
        )),
        Reply::NotFound => Page::Status(Status::NotFound),
    })
}

mod html {
    use rocket::request::{FlashMessage, Form};
    use rocket::response::content;
    use rocket::State;

    use super::{render, respond, Page, Services, TEMPLATES};
    use crate::auth::CurrentUser;
    use crate::error::DashResult;
    use crate::forms::RawForm;
    use crate::voting::{self, VotingPage};

    #[get("/?<page>")]
    pub fn list_votings(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        page: Option<String>,
    ) -> DashResult<content::Html<String>> {
        let model = voting::list_votings(&services.ctx(), &user, page.as_ref().map(String::as_str))?;
        render("list", &user, flash, &model)
    }

    #[get("/past_votings?<page>")]
    pub fn list_votings_past(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        page: Option<String>,
    ) -> DashResult<content::Html<String>> {
        let model = voting::list_votings_past(&services.ctx(), &user, page.as_ref().map(String::as_str))?;
        render("past", &user, flash, &model)
    }

    fn edit(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        slug: Option<&str>,
        form: Option<&RawForm>,
    ) -> DashResult<Page> {
        let reply = voting::edit_voting(&services.ctx(), &user, slug, form)?;
        respond(reply, |model| render("edit", &user, flash, &model))
    }

    #[get("/new")]
    pub fn new_voting(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
    ) -> DashResult<Page> {
        edit(user, services, flash, None, None)
    }

    #[post("/new", data = "<form>")]
    pub fn create_voting(user: CurrentUser, services: State<'_, Services>, form: Form<RawForm>) -> DashResult<Page> {
        edit(user, services, None, None, Some(&*form))
    }

    #[get("/<slug>/edit")]
    pub fn edit_voting(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        slug: String,
    ) -> DashResult<Page> {
        edit(user, services, flash, Some(&slug), None)
    }

    #[post("/<slug>/edit", data = "<form>")]
    pub fn save_voting(
        user: CurrentUser,
        services: State<'_, Services>,
        slug: String,
        form: Form<RawForm>,
    ) -> DashResult<Page> {
        edit(user, services, None, Some(&slug), Some(&*form))
    }

    fn view(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        slug: &str,
        form: Option<&RawForm>,
    ) -> DashResult<Page> {
        let reply = voting::view_voting(&services.ctx(), &user, slug, form)?;
        respond(reply, |model| match model {
            VotingPage::Ballot(_) => render("vote", &user, flash, &model),
            VotingPage::Results(_) => render("results", &user, flash, &model),
        })
    }

    #[get("/<slug>")]
    pub fn view_voting(
        user: CurrentUser,
        services: State<'_, Services>,
        flash: Option<FlashMessage<'_, '_>>,
        slug: String,
    ) -> DashResult<Page> {
        view(user, services, flash, &slug, None)
    }

    #[post("/<slug>", data = "<form>")]
    pub fn cast_vote(
        user: CurrentUser,
        services: State<'_, Services>,
        slug: String,
        form: Form<RawForm>,
    ) -> DashResult<Page> {
        view(user, services, None, &slug, Some(&*form))
    }

    #[get("/<slug>/delete")]
    pub fn delete_voting(user: CurrentUser, services: State<'_, Services>, slug: String) -> DashResult<Page> {
        let reply = voting::delete_voting(&services.ctx(), &user, &slug, false)?;
        respond(reply, |never| never)
    }

    #[post("/<slug>/delete")]
    pub fn confirm_delete_voting(
        user: CurrentUser,
        services: State<'_, Services>,
        slug: String,
    ) -> DashResult<Page> {
        let reply = voting::delete_voting(&services.ctx(), &user, &slug, true)?;
        respond(reply, |never| never)
    }

    #[catch(401)]
    pub fn unauthorized() -> content::Html<String> {
        let rendered = ok_or!(TEMPLATES.render("login", &json!({})), why => {
            error!("unable to render the login page: {:?}", why);
            String::from("Please log in to access the voting pages.")
        });
        content::Html(rendered)
    }
}

mod api {
    use rocket::State;

    use super::Services;
    use crate::automation;
    use crate::error::DashResult;
    use crate::webhooks::BugEvent;

    #[post("/bug-webhook", data = "<event>")]
    pub fn bug_webhook(event: BugEvent, services: State<'_, Services>) -> DashResult<()> {
        if !event.is_relevant() {
            info!("ignoring {} event for bug {}", event.action, event.bug.id);
            return Ok(());
        }

        let bug = services.store.save_bug(&event.bug.as_new())?;
        if let Some(poll) = automation::handle_bug_event(&services.ctx(), &bug)? {
            info!("bug {} opened voting {}", bug.bug_id, poll.slug);
        }
        Ok(())
    }
}

lazy_static! {
    static ref TEMPLATES: Handlebars = {
        let mut hbars = Handlebars::new();
        let root_template = include_str!("templates/index.html");

        let pages = [
            ("list", include_str!("templates/list.hbs")),
            ("past", include_str!("templates/past.hbs")),
            ("edit", include_str!("templates/edit.hbs")),
            ("vote", include_str!("templates/vote.hbs")),
            ("results", include_str!("templates/results.hbs")),
            ("login", include_str!("templates/login.hbs")),
        ];

        for (name, fragment) in pages.iter() {
            let template = root_template.replace("{{content}}", fragment);
            hbars
                .register_template_string(name, &template)
                .unwrap_or_else(|why| panic!("unable to register {} template: {}", name, why));
        }

        hbars
    };
}
