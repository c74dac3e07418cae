//! End-to-end club flows against the in-memory store
//!
//! Covers:
//! - Login for administrators, unlocked and not-yet-eligible participants
//! - Timeline states per viewer
//! - First-post fan-out and its one-shot behavior
//! - Administrative deletes and roster saves
//! - Persist failures surfacing as warnings

use std::sync::Arc;
use std::time::Duration;

use receipts::calendar::{Calendar, DayMonth};
use receipts::club::{Club, ClubSettings};
use receipts::model::{Participant, SharedDocument};
use receipts::notify::{MockNotifier, Template};
use receipts::registry::Registry;
use receipts::session::{Role, Session};
use receipts::store::MemoryStore;
use receipts::sync::PERSIST_WARNING;
use receipts::timeline::EntryState;
use receipts::ClubError;

const ADMIN: &str = "setup25";

fn with_secret(name: &str, anniversary: &str, email: Option<&str>, suffix: &str) -> Participant {
    let mut p = Participant::new(name, anniversary);
    p.email = email.map(str::to_string);
    p.suffix = Some(suffix.to_string());
    p.access_secret = Some(receipts::access_code::generate(name, anniversary, Some(suffix)));
    p
}

/// Ana 15/06, Bo 01/02 (both passed on 15/06), Cy 20/12 (locked), Dee 10/03
/// without an email.
fn seeded_doc() -> SharedDocument {
    let mut doc = SharedDocument::default();
    doc.participants = vec![
        with_secret("Ana", "15/06", Some("ana@example.com"), "aaa111"),
        with_secret("Bo", "01/02", Some("bo@example.com"), "bbb222"),
        with_secret("Cy", "20/12", Some("cy@example.com"), "ccc333"),
        with_secret("Dee", "10/03", None, "ddd444"),
    ];
    doc
}

struct Harness {
    club: Club,
    store: Arc<MemoryStore>,
    notifier: Arc<MockNotifier>,
}

async fn harness(doc: &SharedDocument, today: DayMonth) -> Harness {
    let store = Arc::new(MemoryStore::with_document(doc).unwrap());
    let notifier = Arc::new(MockNotifier::new());
    let club = Club::new(
        store.clone(),
        notifier.clone(),
        ClubSettings {
            admin_secret: ADMIN.to_string(),
            site_url: "https://club.example".to_string(),
            calendar: Calendar::pinned(today),
        },
    );
    club.load().await;
    Harness {
        club,
        store,
        notifier,
    }
}

fn june_15() -> DayMonth {
    DayMonth::new(15, 6)
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_admin_secret_always_logs_in() {
    let h = harness(&seeded_doc(), DayMonth::new(1, 1)).await;

    let outcome = h.club.login("  SETUP25 ").await.unwrap();
    assert_eq!(outcome.role, Role::Administrator);
    assert!(outcome.session.is_admin);
    assert_eq!(h.club.session(&outcome.token).await, Session::administrator());
}

#[tokio::test]
async fn test_participant_code_ignores_case_and_whitespace() {
    let h = harness(&seeded_doc(), june_15()).await;

    let outcome = h.club.login("ANA1506 - aaa111").await.unwrap();
    assert_eq!(outcome.role, Role::Participant);
    assert_eq!(outcome.session.current_user.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_code_before_anniversary_is_not_yet_eligible() {
    let h = harness(&seeded_doc(), june_15()).await;

    let err = h.club.login("cy2012-ccc333").await.unwrap_err();
    match err {
        ClubError::NotYetEligible {
            name,
            anniversary,
            today,
        } => {
            assert_eq!(name, "Cy");
            assert_eq!(anniversary, "20/12");
            assert_eq!(today, "15/06");
        }
        other => panic!("expected NotYetEligible, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_code_is_not_recognized() {
    let h = harness(&seeded_doc(), june_15()).await;
    assert_eq!(h.club.login("ana1506").await.unwrap_err(), ClubError::NotRecognized);
    assert_eq!(h.club.login("").await.unwrap_err(), ClubError::NotRecognized);
}

#[tokio::test]
async fn test_logout_drops_the_session() {
    let h = harness(&seeded_doc(), june_15()).await;
    let outcome = h.club.login("bo0102-bbb222").await.unwrap();

    assert!(h.club.logout(&outcome.token));
    assert_eq!(h.club.session(&outcome.token).await, Session::anonymous());
    assert!(!h.club.logout(&outcome.token));
}

#[tokio::test]
async fn test_session_ends_when_anniversary_moves_ahead() {
    let h = harness(&seeded_doc(), june_15()).await;
    let admin = Session::administrator();
    let outcome = h.club.login("ana1506-aaa111").await.unwrap();
    assert_eq!(h.club.session(&outcome.token).await, Session::participant("Ana"));

    let mut participants = h.club.roster(&admin).await.unwrap().into_participants();
    let ana = participants.iter_mut().find(|p| p.name == "Ana").unwrap();
    ana.anniversary = "20/12".to_string();
    h.club
        .save_roster(&admin, Registry::new(participants))
        .await
        .unwrap();

    assert_eq!(h.club.session(&outcome.token).await, Session::anonymous());
    assert!(!h.club.logout(&outcome.token));
}

#[tokio::test]
async fn test_sessions_expire_after_ttl() {
    let store = Arc::new(MemoryStore::with_document(&seeded_doc()).unwrap());
    let club = Club::new(
        store,
        Arc::new(MockNotifier::new()),
        ClubSettings {
            admin_secret: ADMIN.to_string(),
            site_url: "https://club.example".to_string(),
            calendar: Calendar::pinned(june_15()),
        },
    )
    .with_session_ttl(Duration::ZERO);
    club.load().await;

    let outcome = club.login("bo0102-bbb222").await.unwrap();
    assert_eq!(club.session(&outcome.token).await, Session::anonymous());
}

// =============================================================================
// Timeline
// =============================================================================

#[tokio::test]
async fn test_timeline_states_for_participant() {
    let mut doc = seeded_doc();
    doc.reflections.insert("Bo".into(), "bo wrote this".into());
    doc.reflections.insert("Cy".into(), "early secret".into());
    let h = harness(&doc, june_15()).await;

    let entries = h.club.timeline(&Session::participant("Ana")).await.unwrap();
    let states: Vec<(&str, &EntryState)> =
        entries.iter().map(|e| (e.name.as_str(), &e.state)).collect();

    assert_eq!(states[0], ("Ana", &EntryState::YourTurn));
    assert_eq!(
        states[1],
        (
            "Bo",
            &EntryState::Readable {
                preview: "bo wrote this".into()
            }
        )
    );
    assert_eq!(
        states[2],
        (
            "Cy",
            &EntryState::Locked {
                unlocks: "20/12".into()
            }
        )
    );
    assert_eq!(states[3], ("Dee", &EntryState::Waiting));
    assert!(entries[0].is_you);
}

#[tokio::test]
async fn test_timeline_requires_login() {
    let h = harness(&seeded_doc(), june_15()).await;
    assert_eq!(
        h.club.timeline(&Session::anonymous()).await.unwrap_err(),
        ClubError::NotAuthenticated
    );
}

#[tokio::test]
async fn test_locked_reflection_is_hidden_even_from_admin() {
    let mut doc = seeded_doc();
    doc.reflections.insert("Cy".into(), "early secret".into());
    let h = harness(&doc, june_15()).await;

    assert_eq!(
        h.club
            .read_reflection(&Session::administrator(), "Cy")
            .await
            .unwrap_err(),
        ClubError::Forbidden
    );
    assert_eq!(
        h.club
            .read_reflection(&Session::participant("Cy"), "Cy")
            .await
            .unwrap()
            .content,
        "early secret"
    );
}

// =============================================================================
// Reflections
// =============================================================================

#[tokio::test]
async fn test_first_post_fans_out_once() {
    let h = harness(&seeded_doc(), june_15()).await;
    let ana = Session::participant("Ana");

    let saved = h.club.save_reflection(&ana, "what a year").await.unwrap();
    assert!(saved.first_post);
    assert_eq!(saved.edit_count, 1);
    assert_eq!(saved.warning, None);

    let report = saved.fan_out.expect("first post fans out").await.unwrap();
    // Bo is unlocked with an email; Cy is locked; Dee has no email
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);

    let sent = h.notifier.sent_to("bo@example.com");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, Template::NewReflection);
    assert_eq!(sent[0].field("author_name"), Some("Ana"));

    let again = h.club.save_reflection(&ana, "what a year, edited").await.unwrap();
    assert!(!again.first_post);
    assert_eq!(again.edit_count, 2);
    assert!(again.fan_out.is_none());
    assert_eq!(h.notifier.call_count(), 1);
}

#[tokio::test]
async fn test_fan_out_failure_does_not_fail_the_save() {
    let h = harness(&seeded_doc(), june_15()).await;
    h.notifier.set_failing(true);

    let saved = h
        .club
        .save_reflection(&Session::participant("Ana"), "still saved")
        .await
        .unwrap();
    let report = saved.fan_out.unwrap().await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 1);

    let mine = h.club.my_reflection(&Session::participant("Ana")).await.unwrap();
    assert_eq!(mine.content.as_deref(), Some("still saved"));
}

#[tokio::test]
async fn test_blank_reflection_rejected() {
    let h = harness(&seeded_doc(), june_15()).await;
    let err = h
        .club
        .save_reflection(&Session::participant("Ana"), "   \n ")
        .await
        .unwrap_err();
    assert_eq!(err, ClubError::EmptyReflection);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_overthinking_from_third_edit() {
    let h = harness(&seeded_doc(), june_15()).await;
    let ana = Session::participant("Ana");

    for n in 0..2 {
        h.club.save_reflection(&ana, &format!("draft {n}")).await.unwrap();
    }
    let mine = h.club.my_reflection(&ana).await.unwrap();
    assert_eq!(mine.edit_count, 2);
    assert!(mine.overthinking.is_none());

    h.club.save_reflection(&ana, "draft 3").await.unwrap();
    let mine = h.club.my_reflection(&ana).await.unwrap();
    assert!(mine.overthinking.unwrap().contains("Ana"));
}

#[tokio::test]
async fn test_admin_cannot_write_a_reflection() {
    let h = harness(&seeded_doc(), june_15()).await;
    assert!(h
        .club
        .save_reflection(&Session::administrator(), "hello")
        .await
        .is_err());
}

#[tokio::test]
async fn test_delete_missing_reflection_changes_nothing() {
    let h = harness(&seeded_doc(), june_15()).await;
    let before = h.club.sync().snapshot().await;

    let err = h
        .club
        .delete_reflection(&Session::administrator(), "Bo")
        .await
        .unwrap_err();
    assert!(matches!(err, ClubError::NotFound(_)));
    assert_eq!(h.club.sync().snapshot().await, before);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_delete_all_resets_counters() {
    let h = harness(&seeded_doc(), june_15()).await;
    h.club
        .save_reflection(&Session::participant("Ana"), "one")
        .await
        .unwrap();
    h.club
        .save_reflection(&Session::participant("Bo"), "two")
        .await
        .unwrap();

    let cleared = h
        .club
        .delete_all_reflections(&Session::administrator())
        .await
        .unwrap();
    assert_eq!(cleared.value, 2);

    let doc = h.club.sync().snapshot().await;
    assert!(doc.reflections.is_empty());
    assert!(doc.edit_counts.is_empty());
    assert!(doc.has_posted_first.is_empty());
}

#[tokio::test]
async fn test_participant_cannot_delete() {
    let h = harness(&seeded_doc(), june_15()).await;
    assert_eq!(
        h.club
            .delete_all_reflections(&Session::participant("Ana"))
            .await
            .unwrap_err(),
        ClubError::Forbidden
    );
}

// =============================================================================
// Roster
// =============================================================================

#[tokio::test]
async fn test_empty_roster_offers_a_blank_row() {
    let h = harness(&SharedDocument::default(), june_15()).await;
    let roster = h.club.roster(&Session::administrator()).await.unwrap();
    assert_eq!(roster.participants(), &[Participant::blank()]);
}

#[tokio::test]
async fn test_roster_save_issues_codes_and_counts_missing_emails() {
    let h = harness(&SharedDocument::default(), june_15()).await;

    let draft = Registry::new(vec![
        Participant::new("Zed", "03/05").with_email("zed@example.com"),
        Participant::new("Amy", "15/06"),
        Participant::blank(),
    ]);
    let saved = h
        .club
        .save_roster(&Session::administrator(), draft)
        .await
        .unwrap();

    assert_eq!(saved.codes.len(), 2);
    // Sorted by anniversary: 03/05 before 15/06
    assert_eq!(saved.codes[0].name, "Zed");
    assert!(saved.codes[0].code.starts_with("zed0305-"));
    assert_eq!(saved.missing_emails, 1);
    assert_eq!(
        saved.notice.as_deref(),
        Some("1 people missing emails - they won't get notifications")
    );

    // The handed-out code logs in once the day has come
    let outcome = h.club.login(&saved.codes[0].code).await.unwrap();
    assert_eq!(outcome.session.current_user.as_deref(), Some("Zed"));
}

#[tokio::test]
async fn test_resaving_roster_keeps_existing_codes() {
    let h = harness(&seeded_doc(), june_15()).await;
    let admin = Session::administrator();

    let mut draft = h.club.roster(&admin).await.unwrap();
    draft.add(Participant::new("Eli", "01/01"));
    let saved = h.club.save_roster(&admin, draft).await.unwrap();

    let ana = saved.codes.iter().find(|c| c.name == "Ana").unwrap();
    assert_eq!(ana.code, "ana1506-aaa111");
    assert!(h.club.login("ana1506-aaa111").await.is_ok());
}

#[tokio::test]
async fn test_all_blank_roster_rejected() {
    let h = harness(&seeded_doc(), june_15()).await;
    let err = h
        .club
        .save_roster(
            &Session::administrator(),
            Registry::new(vec![Participant::blank()]),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ClubError::EmptyRoster);
    assert_eq!(h.club.sync().snapshot().await.participants.len(), 4);
}

#[tokio::test]
async fn test_add_and_remove_participant() {
    let h = harness(&seeded_doc(), june_15()).await;
    let admin = Session::administrator();

    assert_eq!(
        h.club
            .add_participant(&admin, Participant::new("", "01/01"))
            .await
            .unwrap_err(),
        ClubError::IncompleteParticipant
    );

    let saved = h
        .club
        .add_participant(&admin, Participant::new("Eli", "1/1"))
        .await
        .unwrap();
    assert_eq!(saved.codes.len(), 5);
    assert_eq!(saved.codes[0].name, "Eli");

    let removed = h.club.remove_participant(&admin, 0).await.unwrap();
    assert_eq!(removed.value.name, "Eli");
    assert_eq!(
        h.club.remove_participant(&admin, 99).await.unwrap_err(),
        ClubError::InvalidIndex(99)
    );
}

#[tokio::test]
async fn test_last_participant_cannot_be_removed() {
    let mut doc = SharedDocument::default();
    doc.participants = vec![with_secret("Ana", "15/06", None, "aaa111")];
    let h = harness(&doc, june_15()).await;

    assert_eq!(
        h.club
            .remove_participant(&Session::administrator(), 0)
            .await
            .unwrap_err(),
        ClubError::EmptyRoster
    );
    assert_eq!(h.store.write_count(), 0);
    let participants = h.club.sync().snapshot().await.participants;
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].name, "Ana");
}

// =============================================================================
// Persistence failures
// =============================================================================

#[tokio::test]
async fn test_persist_failure_keeps_change_and_warns() {
    let h = harness(&seeded_doc(), june_15()).await;
    h.store.set_unavailable(true);

    let saved = h
        .club
        .save_reflection(&Session::participant("Ana"), "offline words")
        .await
        .unwrap();
    assert_eq!(saved.warning, Some(PERSIST_WARNING));

    let mine = h.club.my_reflection(&Session::participant("Ana")).await.unwrap();
    assert_eq!(mine.content.as_deref(), Some("offline words"));
}

#[tokio::test]
async fn test_unreachable_store_starts_empty() {
    let store = Arc::new(MemoryStore::with_document(&seeded_doc()).unwrap());
    store.set_unavailable(true);
    let club = Club::new(
        store,
        Arc::new(MockNotifier::new()),
        ClubSettings {
            admin_secret: ADMIN.to_string(),
            site_url: "https://club.example".to_string(),
            calendar: Calendar::pinned(june_15()),
        },
    );

    assert_eq!(club.load().await, receipts::sync::LoadState::Failed);
    assert_eq!(club.login("ana1506-aaa111").await.unwrap_err(), ClubError::NotRecognized);
    assert!(club.login(ADMIN).await.is_ok());
}
