//! Forum automation actions for linux.do
//!
//! Simulates a real member's daily visit:
//! 1. Log in from the home page
//! 2. Read a random sample of listed topics, pausing like a human reader
//! 3. Occasionally like a topic while reading it
//! 4. Fetch the Connect status table and print it

use std::time::Duration;
use chromiumoxide::Page;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};
use url::Url;

use crate::status::{render_table, StatusRow};
use crate::Account;
use super::{BrowserError, BrowserSession};

/// linux.do DOM contract. A markup change on the site breaks these and there
/// is nothing this side can do about it.
mod selectors {
    pub const LOGIN_TRIGGER: &str = ".login-button .d-button-label";
    pub const USERNAME_INPUT: &str = "#login-account-name";
    pub const PASSWORD_INPUT: &str = "#login-account-password";
    pub const LOGIN_SUBMIT: &str = "#login-button";
    pub const CURRENT_USER: &str = "#current-user";
    pub const TOPIC_LINKS: &str = "#list-area .title";
    pub const REACTION_TRIGGER: &str = ".discourse-reactions-reaction-button";
}

/// Topics sampled per browse round (capped by what the listing shows).
pub const TOPICS_PER_ROUND: usize = 30;
/// Probability of liking a topic while reading it.
pub const LIKE_PROBABILITY: f64 = 0.02;
/// Browse rounds per account cycle.
pub const BROWSE_ROUNDS: u32 = 3;
/// Seconds spent "reading" one topic before releasing its tab.
pub const TOPIC_PAUSE_SECS: (f64, f64) = (5.0, 15.0);
/// Seconds of rest between browse rounds.
pub const ROUND_PAUSE_SECS: (f64, f64) = (30.0, 60.0);
/// How long to wait for the identity element after submitting credentials.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A topic link discovered on the listing page. Identified by its href; the
/// title is only used for log lines.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Topic {
    pub href: String,
    #[serde(default)]
    pub title: String,
}

impl Topic {
    /// Absolute URL of the topic (listing hrefs are site-relative).
    pub fn absolute_url(&self) -> Result<Url, BrowserError> {
        Url::parse(crate::HOME_URL)
            .and_then(|base| base.join(&self.href))
            .map_err(|e| {
                BrowserError::NavigationFailed(format!("bad topic href {}: {}", self.href, e))
            })
    }
}

/// Browser actions for one authenticated forum session
pub struct ForumActions;

impl ForumActions {
    /// Log in from the home page and wait for the identity element.
    ///
    /// Absence of the identity element within [`LOGIN_TIMEOUT`] means the
    /// credentials were rejected (or the site changed); the caller aborts
    /// this account's cycle and moves on to the next account.
    pub async fn login(session: &BrowserSession, account: &Account) -> Result<(), BrowserError> {
        info!("Session {} logging in", session.id());

        session.navigate(crate::HOME_URL).await?;
        session.click(selectors::LOGIN_TRIGGER).await?;
        session
            .type_into(selectors::USERNAME_INPUT, &account.username)
            .await?;
        session
            .type_into(selectors::PASSWORD_INPUT, &account.password)
            .await?;
        session.click(selectors::LOGIN_SUBMIT).await?;

        match session
            .wait_for_selector(selectors::CURRENT_USER, LOGIN_TIMEOUT)
            .await
        {
            Ok(()) => {
                info!("Check in success for {}", account.username);
                Ok(())
            }
            Err(BrowserError::Timeout(_)) => {
                Err(BrowserError::AuthenticationFailed(account.username.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Collect all topic links currently shown on the listing page.
    pub async fn collect_topics(session: &BrowserSession) -> Result<Vec<Topic>, BrowserError> {
        let script = format!(
            r#"
            Array.from(document.querySelectorAll('{}'))
                .map(a => ({{ href: a.getAttribute('href') || '', title: (a.textContent || '').trim() }}))
                .filter(t => t.href.length > 0)
            "#,
            selectors::TOPIC_LINKS
        );

        let value = session.evaluate(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::JavaScriptError(format!("topic list malformed: {}", e)))
    }

    /// Uniform random subset of the listing, without replacement, sized
    /// min(TOPICS_PER_ROUND, available). No dedup across rounds: a topic may
    /// come up again in a later round.
    pub fn sample_topics<R: Rng + ?Sized>(topics: &[Topic], rng: &mut R) -> Vec<Topic> {
        topics
            .choose_multiple(rng, TOPICS_PER_ROUND.min(topics.len()))
            .cloned()
            .collect()
    }

    /// Roll the per-visit like decision.
    pub fn should_like<R: Rng + ?Sized>(rng: &mut R) -> bool {
        rng.gen_bool(LIKE_PROBABILITY)
    }

    /// Uniform random pause within the given seconds range.
    pub fn pause_between<R: Rng + ?Sized>(rng: &mut R, range: (f64, f64)) -> Duration {
        Duration::from_secs_f64(rng.gen_range(range.0..=range.1))
    }

    /// One browse round: sample the listing and read each picked topic in its
    /// own tab.
    pub async fn browse_round<R: Rng>(
        session: &BrowserSession,
        rng: &mut R,
    ) -> Result<(), BrowserError> {
        let topics = Self::collect_topics(session).await?;
        let picked = Self::sample_topics(&topics, rng);
        info!(
            "Session {} reading {} of {} listed topics",
            session.id(),
            picked.len(),
            topics.len()
        );

        for topic in &picked {
            // Draw the whole visit plan up front; no rng use across awaits.
            let like = Self::should_like(rng);
            let pause = Self::pause_between(rng, TOPIC_PAUSE_SECS);
            Self::visit_topic(session, topic, like, pause).await?;
        }

        Ok(())
    }

    /// Open one topic in a fresh tab, maybe like it, linger, then release the
    /// tab. The tab is closed on every exit path before the result propagates.
    async fn visit_topic(
        session: &BrowserSession,
        topic: &Topic,
        like: bool,
        pause: Duration,
    ) -> Result<(), BrowserError> {
        let url = topic.absolute_url()?;
        debug!("Session {} reading topic: {}", session.id(), topic.title);

        let page = session.open_page(url.as_str()).await?;
        let outcome = Self::read_topic(session, &page, like, pause).await;
        let _ = page.close().await;
        outcome
    }

    async fn read_topic(
        session: &BrowserSession,
        page: &Page,
        like: bool,
        pause: Duration,
    ) -> Result<(), BrowserError> {
        if like {
            Self::like(session, page).await?;
        }
        tokio::time::sleep(pause).await;
        session.record_topic_visit();
        Ok(())
    }

    /// Activate the first reaction trigger on an open topic page.
    ///
    /// Fire-and-forget: no verification that the reaction was recorded. A
    /// missing trigger is an element-not-found failure that ends this
    /// account's cycle.
    pub async fn like(session: &BrowserSession, page: &Page) -> Result<(), BrowserError> {
        let trigger = page
            .find_element(selectors::REACTION_TRIGGER)
            .await
            .map_err(|e| {
                BrowserError::ElementNotFound(format!("{}: {}", selectors::REACTION_TRIGGER, e))
            })?;

        trigger
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        session.record_like();
        info!("Like success for {}", session.id());
        Ok(())
    }

    /// Fetch the Connect status table in a fresh tab.
    pub async fn fetch_status(session: &BrowserSession) -> Result<Vec<StatusRow>, BrowserError> {
        let page = session.open_page(crate::CONNECT_URL).await?;
        let outcome = Self::scrape_status_table(&page).await;
        let _ = page.close().await;
        outcome
    }

    /// Read every table row after the header and hand the raw cell texts to
    /// the extraction rule.
    async fn scrape_status_table(page: &Page) -> Result<Vec<StatusRow>, BrowserError> {
        let result = page
            .evaluate(
                r#"
                Array.from(document.querySelectorAll('table tr'))
                    .slice(1)
                    .map(row => Array.from(row.querySelectorAll('td')).map(td => td.textContent || ''))
                "#,
            )
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        let raw: Vec<Vec<String>> = serde_json::from_value(
            result.value().cloned().unwrap_or(serde_json::Value::Null),
        )
        .map_err(|e| BrowserError::JavaScriptError(format!("status table malformed: {}", e)))?;

        Ok(crate::status::extract_rows(raw))
    }

    /// Drive one full account cycle: login, three browse rounds with rest in
    /// between, then the status report. Any failure ends the cycle; the
    /// caller still tears the session down.
    pub async fn run<R: Rng>(
        session: &BrowserSession,
        account: &Account,
        rng: &mut R,
    ) -> Result<(), BrowserError> {
        Self::login(session, account).await?;

        for round in 1..=BROWSE_ROUNDS {
            Self::browse_round(session, rng).await?;
            let pause = Self::pause_between(rng, ROUND_PAUSE_SECS);
            debug!(
                "Session {} resting {}s after round {}/{}",
                session.id(),
                pause.as_secs(),
                round,
                BROWSE_ROUNDS
            );
            tokio::time::sleep(pause).await;
        }

        let rows = Self::fetch_status(session).await?;
        info!("Connect info for {}", account.username);
        println!("{}", render_table(&rows));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn listing(count: usize) -> Vec<Topic> {
        (0..count)
            .map(|i| Topic {
                href: format!("/t/topic/{}", i),
                title: format!("topic {}", i),
            })
            .collect()
    }

    #[test]
    fn round_picks_at_most_thirty_unique_topics() {
        let topics = listing(120);
        let mut rng = StdRng::seed_from_u64(42);

        let picked = ForumActions::sample_topics(&topics, &mut rng);

        assert_eq!(picked.len(), TOPICS_PER_ROUND);
        let hrefs: HashSet<&str> = picked.iter().map(|t| t.href.as_str()).collect();
        assert_eq!(hrefs.len(), TOPICS_PER_ROUND, "duplicates within one round");
        assert!(picked.iter().all(|p| topics.contains(p)));
    }

    #[test]
    fn short_listing_is_read_in_full() {
        let topics = listing(5);
        let mut rng = StdRng::seed_from_u64(7);

        let picked = ForumActions::sample_topics(&topics, &mut rng);

        assert_eq!(picked.len(), 5);
        let hrefs: HashSet<&str> = picked.iter().map(|t| t.href.as_str()).collect();
        assert_eq!(hrefs.len(), 5);
    }

    #[test]
    fn empty_listing_yields_empty_round() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ForumActions::sample_topics(&[], &mut rng).is_empty());
    }

    #[test]
    fn like_rate_is_about_two_percent() {
        let mut rng = StdRng::seed_from_u64(99);
        let trials = 200_000;
        let likes = (0..trials)
            .filter(|_| ForumActions::should_like(&mut rng))
            .count();

        let rate = likes as f64 / trials as f64;
        assert!(
            (rate - LIKE_PROBABILITY).abs() < 0.002,
            "observed like rate {} too far from {}",
            rate,
            LIKE_PROBABILITY
        );
    }

    #[test]
    fn pauses_stay_inside_their_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let topic = ForumActions::pause_between(&mut rng, TOPIC_PAUSE_SECS);
            assert!(topic >= Duration::from_secs_f64(TOPIC_PAUSE_SECS.0));
            assert!(topic <= Duration::from_secs_f64(TOPIC_PAUSE_SECS.1));

            let round = ForumActions::pause_between(&mut rng, ROUND_PAUSE_SECS);
            assert!(round >= Duration::from_secs_f64(ROUND_PAUSE_SECS.0));
            assert!(round <= Duration::from_secs_f64(ROUND_PAUSE_SECS.1));
        }
    }

    #[test]
    fn topic_href_joins_onto_home_url() {
        let topic = Topic {
            href: "/t/some-topic/123".to_string(),
            title: String::new(),
        };
        assert_eq!(
            topic.absolute_url().unwrap().as_str(),
            "https://linux.do/t/some-topic/123"
        );
    }
}
