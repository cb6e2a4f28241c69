use std::collections::BTreeMap;
use std::env;

use url::Url;

pub const DB_URL: &str = "DATABASE_URL";
pub const DB_POOL_SIZE: &str = "DATABASE_POOL_SIZE";
pub const WEBHOOK_SECRETS: &str = "WEBHOOK_SECRETS";
pub const MAIL_RELAY_URL: &str = "MAIL_RELAY_URL";
pub const MAIL_FROM: &str = "MAIL_FROM";
pub const TASK_INTERVAL_MINS: &str = "TASK_INTERVAL_MINS";

/// Header carrying the username authenticated by the SSO proxy.
pub const REMOTE_USER_HEADER: &str = "X-Remo-User";

lazy_static! {
    pub static ref CONFIG: Config = {
        match init() {
            Ok(c) => {
                info!("Configuration parsed from environment variables.");
                c
            }
            Err(missing) => {
                error!("Unable to load environment variables {:?}", missing);
                panic!("Unable to load environment variables {:?}", missing);
            }
        }
    };
}

#[derive(Debug)]
pub struct Config {
    pub db_url: String,
    pub db_pool_size: u32,
    pub webhook_secrets: Vec<String>,
    pub mail_relay_url: Option<Url>,
    pub mail_from: String,
    pub task_interval_mins: u64,
}

impl Config {
    pub fn check(&self) -> bool {
        let ok = !self.db_url.is_empty() && !self.webhook_secrets.is_empty();
        if self.mail_relay_url.is_none() {
            warn!("{} is not set, notification mails will only be logged", MAIL_RELAY_URL);
        }
        ok
    }
}

pub fn init() -> Result<Config, Vec<&'static str>> {
    let mut vars: BTreeMap<&'static str, Result<String, _>> = BTreeMap::new();
    let keys = vec![DB_URL, DB_POOL_SIZE, WEBHOOK_SECRETS, MAIL_FROM, TASK_INTERVAL_MINS];

    for var in keys {
        vars.insert(var, env::var(var));
    }

    let all_found = vars.iter().all(|(_, v)| v.is_ok());
    if !all_found {
        return Err(vars
            .iter()
            .filter(|&(_, v)| v.is_err())
            .map(|(&k, _)| k)
            .collect());
    }

    let db_url = vars.remove(DB_URL).unwrap().unwrap();
    let db_pool_size = vars.remove(DB_POOL_SIZE).unwrap().unwrap();
    let db_pool_size = ok_or!(db_pool_size.parse::<u32>(), _e => return Err(vec![DB_POOL_SIZE]));

    let webhook_secrets = vars.remove(WEBHOOK_SECRETS).unwrap().unwrap();
    let webhook_secrets = webhook_secrets
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let mail_from = vars.remove(MAIL_FROM).unwrap().unwrap();

    let interval = vars.remove(TASK_INTERVAL_MINS).unwrap().unwrap();
    let task_interval_mins = ok_or!(interval.parse::<u64>(), _e => return Err(vec![TASK_INTERVAL_MINS]));

    let mail_relay_url = match env::var(MAIL_RELAY_URL) {
        Ok(raw) => Some(ok_or!(Url::parse(&raw), _e => return Err(vec![MAIL_RELAY_URL]))),
        Err(_) => None,
    };

    Ok(Config {
        db_url,
        db_pool_size,
        webhook_secrets,
        mail_relay_url,
        mail_from,
        task_interval_mins,
    })
}
