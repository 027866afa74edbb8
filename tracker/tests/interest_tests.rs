
use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use tokio::task::JoinSet;

use catalog::ProductId;
use mocks::Harness;
use tracker::error::TrackerError;
use tracker::interest::RegistrationOutcome;
use tracker::notify::DispatchReport;

const URL: &str = "https://shop.example/item/7";
const ALICE: &str = "alice@example.com";

#[tokio::test]
async fn first_registration_welcomes_second_is_silent() {
    let h = Harness::new();
    let p = h.seed(URL, 2500).await;

    let first = h.tracker.track_interest(p.id, ALICE).await.unwrap();
    assert_eq!(first.registration.outcome, RegistrationOutcome::NewlyRegistered);
    assert_eq!(first.dispatch, DispatchReport::Delivered);
    assert_eq!(h.notifier.count_for(ALICE), 1);

    let second = h.tracker.track_interest(p.id, ALICE).await.unwrap();
    assert_eq!(second.registration.outcome, RegistrationOutcome::AlreadyRegistered);
    assert_eq!(second.dispatch, DispatchReport::NotTriggered);
    assert_eq!(h.notifier.count_for(ALICE), 1);

    let stored = h.tracker.queries().get_product_by_id(p.id).await.unwrap().unwrap();
    assert_eq!(stored.emails(), vec![ALICE.to_string()]);
}

#[tokio::test]
async fn welcome_goes_only_to_the_new_user() {
    let h = Harness::new();
    let p = h.seed(URL, 2500).await;

    h.tracker.track_interest(p.id, ALICE).await.unwrap();
    h.tracker.track_interest(p.id, "bob@example.com").await.unwrap();

    let sent = h.notifier.sent.lock();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, vec!["bob@example.com".to_string()]);
}

#[tokio::test]
async fn email_match_is_case_sensitive() {
    let h = Harness::new();
    let p = h.seed(URL, 2500).await;

    let lower = h.tracker.track_interest(p.id, "a@example.com").await.unwrap();
    let upper = h.tracker.track_interest(p.id, "A@example.com").await.unwrap();

    assert_eq!(lower.registration.outcome, RegistrationOutcome::NewlyRegistered);
    assert_eq!(upper.registration.outcome, RegistrationOutcome::NewlyRegistered);
    assert_eq!(upper.registration.product.users.len(), 2);
}

#[tokio::test]
async fn unknown_product_is_not_found_and_nothing_changes() {
    let h = Harness::new();
    h.seed(URL, 2500).await;

    let before = h.store.snapshot().await;
    let writes = h.store.writes();
    let missing = ProductId::new_v4();

    let err = h.tracker.track_interest(missing, ALICE).await.unwrap_err();

    assert!(matches!(err, TrackerError::ProductNotFound(id) if id == missing));
    assert_eq!(h.store.snapshot().await, before);
    assert_eq!(h.store.writes(), writes);
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn store_failure_is_reported_without_notification() {
    let h = Harness::new();
    let p = h.seed(URL, 2500).await;
    h.store.set_failing(true);

    let err = h.tracker.track_interest(p.id, ALICE).await.unwrap_err();

    assert!(err.is_store());
    assert!(err.to_string().contains(&p.id.to_string()));
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn failed_delivery_keeps_registration() {
    let h = Harness::new();
    let p = h.seed(URL, 2500).await;
    h.notifier.set_failing(true);

    let report = h.tracker.track_interest(p.id, ALICE).await.unwrap();

    assert_eq!(report.registration.outcome, RegistrationOutcome::NewlyRegistered);
    assert!(matches!(report.dispatch, DispatchReport::Failed(_)));

    let stored = h.tracker.queries().get_product_by_id(p.id).await.unwrap().unwrap();
    assert!(stored.has_user(ALICE));

    // The failed welcome is not retried on a repeat registration.
    h.notifier.set_failing(false);
    let again = h.tracker.track_interest(p.id, ALICE).await.unwrap();
    assert_eq!(again.registration.outcome, RegistrationOutcome::AlreadyRegistered);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_user_registers_once() {
    const CALLERS: usize = 8;

    let h = Harness::new();
    h.store.set_slow(true);

    for round in 0..20 {
        let id = h.seed(&format!("https://shop.example/race/{round}"), 1000).await.id;

        let mut set = JoinSet::new();
        for _ in 0..CALLERS {
            let tracker = Arc::clone(&h.tracker);
            set.spawn(async move { tracker.track_interest(id, ALICE).await });
        }

        let mut newly = 0;
        while let Some(res) = set.join_next().await {
            let report = res.unwrap().unwrap();
            if report.registration.outcome == RegistrationOutcome::NewlyRegistered {
                newly += 1;
            }
        }
        assert_eq!(newly, 1, "round {round}");

        let stored = h.store.inner.snapshot().await;
        let stored = stored.iter().find(|s| s.id == id).unwrap();
        assert_eq!(stored.users.len(), 1, "round {round}");
    }

    assert_eq!(h.notifier.count_for(ALICE), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registration_and_ingestion_do_not_clobber_each_other() {
    const USERS: usize = 10;
    const SCRAPES: i64 = 10;

    let h = Harness::new();
    let id = h.seed(URL, 1000).await.id;
    h.store.set_slow(true);
    for i in 0..SCRAPES {
        h.scraper.push_price(URL, 900 + i);
    }

    let mut set = JoinSet::new();
    for i in 0..USERS {
        let tracker = Arc::clone(&h.tracker);
        set.spawn(async move {
            tracker
                .track_interest(id, &format!("user{i}@example.com"))
                .await
                .map(|_| ())
        });
    }
    for _ in 0..SCRAPES {
        let tracker = Arc::clone(&h.tracker);
        set.spawn(async move { tracker.scrape_and_store(URL).await.map(|_| ()) });
    }
    while let Some(res) = set.join_next().await {
        res.unwrap().unwrap();
    }

    let stored = h.store.inner.snapshot().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].users.len(), USERS);
    assert_eq!(stored[0].price_history.len(), 1 + SCRAPES as usize);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the interleaving, each distinct email ends up stored once and
    /// is welcomed once.
    #[test]
    fn interleaved_registrations_converge(picks in prop::collection::vec(0usize..4, 1..16)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let (stored_users, welcomes, newly) = rt.block_on(async {
            let h = Harness::new();
            let id = h.seed(URL, 1000).await.id;

            let mut set = JoinSet::new();
            for pick in &picks {
                let tracker = Arc::clone(&h.tracker);
                let email = format!("user{pick}@example.com");
                set.spawn(async move { tracker.track_interest(id, &email).await });
            }

            let mut newly = 0usize;
            while let Some(res) = set.join_next().await {
                if res.unwrap().unwrap().registration.outcome == RegistrationOutcome::NewlyRegistered {
                    newly += 1;
                }
            }

            let stored = h.store.inner.snapshot().await;
            (stored[0].emails(), h.notifier.count(), newly)
        });

        let distinct: HashSet<String> = picks.iter().map(|i| format!("user{i}@example.com")).collect();

        prop_assert_eq!(stored_users.len(), distinct.len());
        prop_assert_eq!(stored_users.into_iter().collect::<HashSet<_>>(), distinct.clone());
        prop_assert_eq!(welcomes, distinct.len());
        prop_assert_eq!(newly, distinct.len());
    }
}
