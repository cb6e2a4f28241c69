#![deny(rust_2018_idioms)]
#![feature(never_type)]
#![feature(proc_macro_hygiene, decl_macro)]
#![recursion_limit = "256"]

// BUG https://github.com/sgrif/pq-sys/issues/25
#[allow(unused_extern_crates)]
extern crate openssl;

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
#[cfg(test)]
#[macro_use]
extern crate maplit;

#[macro_use]
mod macros;

mod auth;
mod automation;
mod config;
mod dates;
mod domain;
mod error;
mod forms;
mod mail;
mod server;
mod settings;
mod store;
mod tasks;
mod utils;
mod voting;
mod webhooks;

use std::sync::Arc;

use chrono::Local;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;

use crate::config::CONFIG;
use crate::mail::{LogMailer, Mailer, RelayMailer};
use crate::server::Services;
use crate::store::pg::PgStore;
use crate::store::Store;

fn main() {
    use std::io::Write;

    // init environment variables, CLI, and logging
    dotenv::dotenv().ok();

    env_logger::Builder::new()
        .format(|buf, rec| {
            writeln!(
                buf,
                "[{} {}:{} {}] {}",
                rec.level(),
                rec.module_path().unwrap_or("<unnamed>"),
                rec.line().unwrap_or(0),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                rec.args()
            )
        })
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    debug!("Logging initialized.");
    let _ = CONFIG.check();
    let _ = DB_POOL.get().expect("Unable to test connection pool.");

    // we want to panic if the voting settings are unusable
    let settings = settings::read_settings();
    info!(
        "council group {:?}, automated components {:?}",
        settings.council_group, settings.automated_polls.components
    );

    let store: Arc<dyn Store> = Arc::new(PgStore::new(DB_POOL.clone()));
    let mailer: Arc<dyn Mailer> = match CONFIG.mail_relay_url {
        Some(ref relay) => Arc::new(RelayMailer::new(relay.clone(), CONFIG.mail_from.clone())),
        None => Arc::new(LogMailer),
    };

    let _worker = tasks::start_worker(
        store.clone(),
        mailer,
        settings.clone(),
        CONFIG.task_interval_mins,
    );

    server::serve(Services {
        store,
        settings,
        webhook_secrets: CONFIG.webhook_secrets.clone(),
    });
}

// initialize the database connection pool
lazy_static! {
    pub static ref DB_POOL: Pool<ConnectionManager<PgConnection>> = {
        info!("Initializing database connection pool.");

        let manager = ConnectionManager::<PgConnection>::new(CONFIG.db_url.clone());

        match Pool::builder().max_size(CONFIG.db_pool_size).build(manager) {
            Ok(p) => {
                info!("DB connection pool established.");
                p
            }
            Err(why) => {
                error!("Failed to establish DB connection pool: {}", why);
                panic!("Error creating connection pool.");
            }
        }
    };
}
