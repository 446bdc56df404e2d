//! Account iterator: one sequential session cycle per configured account.
//!
//! Accounts run strictly in input order. A failure inside one account's
//! cycle ends that cycle only; the session is torn down and the batch moves
//! on after the usual pause.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserError, BrowserSession, BrowserSessionConfig, ForumActions};
use crate::{Account, AppConfig};

/// Seconds of idle time between two account cycles.
pub const ACCOUNT_PAUSE_SECS: (f64, f64) = (60.0, 180.0);

/// Process every account in the configuration, in order.
pub async fn run_all(config: &AppConfig) {
    let mut rng = StdRng::from_entropy();
    run_all_with_rng(config, &mut rng).await;
}

/// Same as [`run_all`] but with a caller-supplied random source, so tests and
/// dry runs can pin the seed.
pub async fn run_all_with_rng<R: Rng>(config: &AppConfig, rng: &mut R) {
    let total = config.accounts.len();

    for (index, account) in config.accounts.iter().enumerate() {
        if !account.is_complete() {
            warn!(
                "Skipping account due to missing username or password (username: {:?})",
                account.username
            );
            continue;
        }

        info!("Starting process for {}", account.username);
        match run_account(config, account, rng).await {
            Ok(()) => info!("Finished process for {}", account.username),
            Err(BrowserError::AuthenticationFailed(username)) => {
                warn!("Login failed for {}; moving on to the next account", username);
            }
            Err(e) => error!("Account {} cycle aborted: {}", account.username, e),
        }

        if index + 1 < total {
            let pause = ForumActions::pause_between(rng, ACCOUNT_PAUSE_SECS);
            debug!("Waiting {}s before the next account", pause.as_secs());
            tokio::time::sleep(pause).await;
        }
    }
}

/// Run one account's full cycle. The session is closed exactly once on every
/// path out of here; the cycle result is only propagated afterwards.
async fn run_account<R: Rng>(
    config: &AppConfig,
    account: &Account,
    rng: &mut R,
) -> Result<(), BrowserError> {
    let session_config = BrowserSessionConfig::for_account(&account.username)
        .headless(config.headless)
        .chrome_path(config.chrome_path.clone());

    let session = BrowserSession::new(session_config).await?;
    let outcome = ForumActions::run(&session, account, rng).await;

    info!(
        "Session {} done (topics: {}, likes: {})",
        session.id(),
        session.topics_visited(),
        session.likes_given()
    );
    if let Err(e) = session.close().await {
        warn!("Session {} close failed: {}", session.id(), e);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str, password: &str) -> Account {
        Account {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn only_complete_accounts_are_attempted() {
        let accounts = vec![
            account("a", "p1"),
            account("b", ""),
            account("", "p3"),
            account("d", "p4"),
        ];

        let attempted: Vec<&str> = accounts
            .iter()
            .filter(|a| a.is_complete())
            .map(|a| a.username.as_str())
            .collect();

        assert_eq!(attempted, vec!["a", "d"]);
    }

    #[test]
    fn example_list_runs_exactly_one_cycle() {
        let accounts =
            crate::parse_accounts(r#"[{"username":"a","password":"p1"},{"username":"b"}]"#)
                .unwrap();

        let attempted: Vec<&Account> = accounts.iter().filter(|a| a.is_complete()).collect();

        assert_eq!(attempted.len(), 1);
        assert_eq!(attempted[0].username, "a");
    }
}
