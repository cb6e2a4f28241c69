//! Bug-tracker webhook payloads and their HMAC-SHA256 authentication.

use std::io::Read;

use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use openssl::memcmp;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use rocket::data::{self, Data, FromDataSimple};
use rocket::http::Status;
use rocket::request::Request;
use rocket::{Outcome, State};

use crate::domain::bugs::NewBug;
use crate::error::DashResult;
use crate::server::Services;

/// Header carrying `sha256=<hex digest>` of the request body.
pub const SIGNATURE_HEADER: &str = "X-Remo-Signature";

const BODY_LIMIT: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct BugEvent {
    pub action: String,
    pub bug: BugPayload,
}

#[derive(Debug, Deserialize)]
pub struct BugPayload {
    pub id: i32,
    pub summary: String,
    pub component: String,
    pub status: String,
    #[serde(default)]
    pub first_comment: String,
    #[serde(default)]
    pub council_vote_requested: bool,
    pub last_change_time: DateTime<Utc>,
}

impl BugEvent {
    /// Only new and changed bugs are mirrored.
    pub fn is_relevant(&self) -> bool {
        self.action == "create" || self.action == "update"
    }
}

impl BugPayload {
    pub fn as_new(&self) -> NewBug<'_> {
        NewBug {
            bug_id: self.id,
            summary: &self.summary,
            component: &self.component,
            status: &self.status,
            first_comment: &self.first_comment,
            council_vote_requested: self.council_vote_requested,
            updated_at: self.last_change_time,
        }
    }
}

impl FromDataSimple for BugEvent {
    type Error = &'static str;

    fn from_data(request: &Request<'_>, data: Data) -> data::Outcome<Self, Self::Error> {
        let signature = match request.headers().get_one(SIGNATURE_HEADER) {
            Some(s) => s.to_string(),
            None => return Outcome::Failure((Status::BadRequest, "missing signature header")),
        };

        let services = match request.guard::<State<'_, Services>>() {
            Outcome::Success(services) => services,
            _ => return Outcome::Failure((Status::InternalServerError, "services unavailable")),
        };

        // the body has to be read before it can be authenticated
        let mut body = Vec::new();
        if let Err(why) = data.open().take(BODY_LIMIT).read_to_end(&mut body) {
            error!("unable to read webhook body: {:?}", why);
            return Outcome::Failure((Status::InternalServerError, "unable to read request body"));
        }

        let authenticated = services
            .webhook_secrets
            .iter()
            .any(|secret| authenticate(secret, &body, &signature));
        if !authenticated {
            warn!("received bug webhook with invalid signature");
            return Outcome::Failure((Status::Unauthorized, "unable to authenticate webhook"));
        }

        match parse_event(&body) {
            Ok(event) => {
                info!("received valid bug webhook ({} bug {})", event.action, event.bug.id);
                Outcome::Success(event)
            }
            Err(why) => {
                error!("unable to parse bug webhook: {}", why);
                Outcome::Failure((Status::BadRequest, "unable to parse webhook payload"))
            }
        }
    }
}

pub fn parse_event(body: &[u8]) -> DashResult<BugEvent> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}

fn hmac_sha256(secret: &str, payload: &[u8]) -> DashResult<Vec<u8>> {
    let key = PKey::hmac(secret.as_bytes())?;
    let mut signer = Signer::new(MessageDigest::sha256(), &key)?;
    signer.update(payload)?;
    Ok(signer.sign_to_vec()?)
}

/// The signature header value for `payload` under `secret`.
pub fn sign(secret: &str, payload: &[u8]) -> DashResult<String> {
    Ok(format!("sha256={}", hex::encode(hmac_sha256(secret, payload)?)))
}

pub fn authenticate(secret: &str, payload: &[u8], signature: &str) -> bool {
    let provided = match signature
        .strip_prefix("sha256=")
        .and_then(|digest| hex::decode(digest).ok())
    {
        Some(provided) => provided,
        None => return false,
    };

    match hmac_sha256(secret, payload) {
        // memcmp::eq panics on length mismatch
        Ok(expected) => expected.len() == provided.len() && memcmp::eq(&expected, &provided),
        Err(why) => {
            error!("unable to compute webhook signature: {:?}", why);
            false
        }
    }
}
