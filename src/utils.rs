use crate::error::DashResult;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) fn spawn_thread<F>(name: &'static str, interval_minutes: u64, f: F) -> JoinHandle<()>
where
    F: Fn() -> DashResult<()> + Send + 'static,
{
    let duration = Duration::from_secs(interval_minutes * 60);
    thread::spawn(move || loop {
        if let Err(err) = f() {
            error!("the {} thread failed an iteration: {:?}", name, err);
        }
        debug!(
            "{} thread sleeping for {} seconds",
            name,
            duration.as_secs()
        );
        thread::sleep(duration);
    })
}

/// Lowercases `input` and joins its alphanumeric runs with dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod test {
    use super::slugify;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Council Elections 2026!"), "council-elections-2026");
        assert_eq!(slugify("  Budget -- Request #42 "), "budget-request-42");
        assert_eq!(slugify("Ünïcode only"), "n-code-only");
        assert_eq!(slugify("???"), "");
    }
}
