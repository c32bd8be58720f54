use chrono::{Duration, Utc};
use collectiva::config::Config;
use collectiva::db;
use collectiva::domain::{
    Direction, ItemRef, ItemStatus, LimitsConfig, MAX_DAYS, Module, ReasonKind,
    ReservationError, ReservationStatus, UpsertGenreLimitInput,
};
use collectiva::infrastructure::AppState;
use collectiva::models::{book, game, item_genre, patron, reservation};
use collectiva::services::notifications::{EventCode, ReservationEvent};
use collectiva::services::queue_index::is_gap_free;
use collectiva::services::{CreateReservation, NotificationDispatcher};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::mpsc::UnboundedReceiver;

// Helper to create a test app state; the receiver stands in for the worker
async fn setup_test_state() -> (AppState, UnboundedReceiver<ReservationEvent>) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let (notifier, rx) = NotificationDispatcher::new();
    (AppState::new(db, Config::default(), notifier), rx)
}

async fn create_test_patron(db: &DatabaseConnection, name: &str, is_active: bool) -> i32 {
    let now = Utc::now();
    let patron = patron::ActiveModel {
        name: Set(name.to_string()),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    patron.insert(db).await.expect("Failed to create patron").id
}

async fn tag_item(db: &DatabaseConnection, module: Module, item_id: i32, genres: &[i32]) {
    for genre_id in genres {
        item_genre::ActiveModel {
            module: Set(module),
            item_id: Set(item_id),
            genre_id: Set(*genre_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to tag item");
    }
}

// Helper to create a test book added `age_days` ago
async fn create_test_book(
    db: &DatabaseConnection,
    title: &str,
    age_days: i64,
    genres: &[i32],
) -> ItemRef {
    let now = Utc::now();
    let book = book::ActiveModel {
        title: Set(title.to_string()),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(age_days)),
        novelty_override: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let id = book.insert(db).await.expect("Failed to create book").id;
    tag_item(db, Module::Books, id, genres).await;
    ItemRef::new(Module::Books, id)
}

async fn create_test_game(db: &DatabaseConnection, title: &str) -> ItemRef {
    let now = Utc::now();
    let game = game::ActiveModel {
        title: Set(title.to_string()),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(365)),
        novelty_override: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let id = game.insert(db).await.expect("Failed to create game").id;
    ItemRef::new(Module::Games, id)
}

async fn update_limits(state: &AppState, module: Module, apply: impl FnOnce(&mut LimitsConfig)) {
    let mut limits = state
        .params
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.module == module)
        .expect("Settings row missing");
    apply(&mut limits);
    state.params.update(limits).await.unwrap();
}

async fn reserve(
    state: &AppState,
    patron_id: i32,
    item: ItemRef,
) -> Result<reservation::Model, ReservationError> {
    state
        .reservations
        .create(CreateReservation {
            patron_id,
            item,
            comment: None,
        })
        .await
        .map(|applied| applied.value)
}

async fn positions(state: &AppState, item: ItemRef) -> Vec<(i32, i32)> {
    state
        .reservations
        .queue(item)
        .await
        .unwrap()
        .reservations
        .into_iter()
        .map(|r| (r.id, r.queue_position))
        .collect()
}

async fn gap_free(state: &AppState, item: ItemRef) -> bool {
    is_gap_free(&state.reservations.queue(item).await.unwrap().reservations)
}

async fn item_status(state: &AppState, item: ItemRef) -> ItemStatus {
    state.reservations.queue(item).await.unwrap().item.status
}

fn denial_kinds(err: ReservationError) -> Vec<ReasonKind> {
    match err {
        ReservationError::Denied(reasons) => reasons.into_iter().map(|r| r.kind).collect(),
        other => panic!("Expected a denial, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_assigns_positions_and_reserves_item() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let alice = create_test_patron(&db, "Alice", true).await;
    let bob = create_test_patron(&db, "Bob", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let first = reserve(&state, alice, item).await.unwrap();
    let second = reserve(&state, bob, item).await.unwrap();

    assert_eq!(first.status, ReservationStatus::Waiting);
    assert_eq!(first.queue_position, 1);
    assert_eq!(second.queue_position, 2);
    assert_eq!(item_status(&state, item).await, ItemStatus::Reserved);
}

#[tokio::test]
async fn test_scenario_a_general_cap_reached() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    update_limits(&state, Module::Books, |l| l.general_cap = 2).await;

    let patron = create_test_patron(&db, "Alice", true).await;
    for title in ["One", "Two"] {
        let item = create_test_book(&db, title, 400, &[]).await;
        reserve(&state, patron, item).await.unwrap();
    }
    let third = create_test_book(&db, "Three", 400, &[]).await;

    let err = reserve(&state, patron, third).await.unwrap_err();
    match err {
        ReservationError::Denied(reasons) => {
            assert_eq!(reasons.len(), 1);
            assert_eq!(reasons[0].kind, ReasonKind::GeneralCapReached);
            assert_eq!(reasons[0].current, 2);
            assert_eq!(reasons[0].limit, 2);
        }
        other => panic!("Expected a denial, got {:?}", other),
    }

    // Caps are per module
    let game = create_test_game(&db, "Catan").await;
    assert!(reserve(&state, patron, game).await.is_ok());
}

#[tokio::test]
async fn test_scenario_b_novelty_cap_zero() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    update_limits(&state, Module::Books, |l| {
        l.novelty_cap = 0;
        l.novelty_window_days = 30;
        l.novelty_tracking_enabled = true;
    })
    .await;

    let patron = create_test_patron(&db, "Alice", true).await;
    let fresh = create_test_book(&db, "Fresh", 1, &[]).await;

    let err = reserve(&state, patron, fresh).await.unwrap_err();
    match err {
        ReservationError::Denied(reasons) => {
            assert_eq!(reasons[0].kind, ReasonKind::NoveltyCapReached);
            assert_eq!(reasons[0].limit, 0);
        }
        other => panic!("Expected a denial, got {:?}", other),
    }

    // An old item is not a novelty
    let old = create_test_book(&db, "Old", 90, &[]).await;
    assert!(reserve(&state, patron, old).await.is_ok());
}

#[tokio::test]
async fn test_novelty_tracking_disabled_ignores_cap() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    update_limits(&state, Module::Books, |l| {
        l.novelty_cap = 0;
        l.novelty_tracking_enabled = false;
    })
    .await;

    let patron = create_test_patron(&db, "Alice", true).await;
    let fresh = create_test_book(&db, "Fresh", 1, &[]).await;
    assert!(reserve(&state, patron, fresh).await.is_ok());
}

#[tokio::test]
async fn test_scenario_c_genre_cap_reached() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    state
        .genre_limits
        .upsert(UpsertGenreLimitInput {
            module: Module::Books,
            genre_id: 42,
            max_concurrent: 1,
            enabled: None,
        })
        .await
        .unwrap();

    let patron = create_test_patron(&db, "Alice", true).await;
    let first = create_test_book(&db, "Thriller 1", 400, &[42]).await;
    let second = create_test_book(&db, "Thriller 2", 400, &[42, 7]).await;
    reserve(&state, patron, first).await.unwrap();

    let err = reserve(&state, patron, second).await.unwrap_err();
    match err {
        ReservationError::Denied(reasons) => {
            assert_eq!(reasons.len(), 1);
            assert_eq!(reasons[0].kind, ReasonKind::GenreCapReached);
            assert_eq!(reasons[0].genre_id, Some(42));
            assert_eq!(reasons[0].current, 1);
            assert_eq!(reasons[0].limit, 1);
        }
        other => panic!("Expected a denial, got {:?}", other),
    }

    // A different patron is unaffected
    let other = create_test_patron(&db, "Bob", true).await;
    assert!(reserve(&state, other, second).await.is_ok());
}

#[tokio::test]
async fn test_disabled_genre_limit_is_ignored() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    state
        .genre_limits
        .upsert(UpsertGenreLimitInput {
            module: Module::Books,
            genre_id: 42,
            max_concurrent: 1,
            enabled: Some(false),
        })
        .await
        .unwrap();

    let patron = create_test_patron(&db, "Alice", true).await;
    let first = create_test_book(&db, "Thriller 1", 400, &[42]).await;
    let second = create_test_book(&db, "Thriller 2", 400, &[42]).await;
    reserve(&state, patron, first).await.unwrap();
    assert!(reserve(&state, patron, second).await.is_ok());
}

#[tokio::test]
async fn test_scenario_d_cancel_head_compacts_queue() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let mut ids = Vec::new();
    for name in ["Alice", "Bob", "Carol"] {
        let patron = create_test_patron(&db, name, true).await;
        ids.push(reserve(&state, patron, item).await.unwrap().id);
    }

    state.reservations.cancel(ids[0]).await.unwrap();

    assert_eq!(positions(&state, item).await, vec![(ids[1], 1), (ids[2], 2)]);
    assert!(gap_free(&state, item).await);
    // Promotion does not mark the new head ready
    let head = state.reservations.get(ids[1]).await.unwrap();
    assert_eq!(head.status, ReservationStatus::Waiting);
    assert_eq!(item_status(&state, item).await, ItemStatus::Reserved);
}

#[tokio::test]
async fn test_positions_stay_gap_free() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let patron = create_test_patron(&db, &format!("Patron {}", i), true).await;
        ids.push(reserve(&state, patron, item).await.unwrap().id);
    }

    state.reservations.cancel(ids[2]).await.unwrap();
    assert!(gap_free(&state, item).await);
    state.reservations.cancel(ids[0]).await.unwrap();
    assert!(gap_free(&state, item).await);
    let late = create_test_patron(&db, "Late", true).await;
    ids.push(reserve(&state, late, item).await.unwrap().id);
    state.reservations.cancel(ids[4]).await.unwrap();

    let line = positions(&state, item).await;
    let slots: Vec<i32> = line.iter().map(|(_, p)| *p).collect();
    assert_eq!(slots, vec![1, 2, 3]);
    let order: Vec<i32> = line.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![ids[1], ids[3], ids[5]]);
}

#[tokio::test]
async fn test_scenario_e_concurrent_create_same_patron_and_item() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let (first, second) = tokio::join!(
        reserve(&state, patron, item),
        reserve(&state, patron, item)
    );

    let results = [first, second];
    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);

    let failure = results.into_iter().find(|r| r.is_err()).unwrap();
    assert_eq!(
        denial_kinds(failure.unwrap_err()),
        vec![ReasonKind::AlreadyReserved]
    );
    assert_eq!(positions(&state, item).await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_create_different_patrons_get_distinct_slots() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let alice = create_test_patron(&db, "Alice", true).await;
    let bob = create_test_patron(&db, "Bob", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let (first, second) = tokio::join!(reserve(&state, alice, item), reserve(&state, bob, item));
    let mut slots = vec![first.unwrap().queue_position, second.unwrap().queue_position];
    slots.sort();
    assert_eq!(slots, vec![1, 2]);
}

#[tokio::test]
async fn test_inactive_and_unknown_patrons_are_rejected() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let lapsed = create_test_patron(&db, "Lapsed", false).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    assert!(matches!(
        reserve(&state, lapsed, item).await,
        Err(ReservationError::PatronInactive(id)) if id == lapsed
    ));
    assert!(matches!(
        reserve(&state, 9999, item).await,
        Err(ReservationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_missing_item_and_disabled_module_are_denied() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;

    let err = reserve(&state, patron, ItemRef::new(Module::Films, 404))
        .await
        .unwrap_err();
    assert_eq!(denial_kinds(err), vec![ReasonKind::ItemNotFound]);

    update_limits(&state, Module::Games, |l| l.enabled = false).await;
    let game = create_test_game(&db, "Catan").await;
    let err = reserve(&state, patron, game).await.unwrap_err();
    assert_eq!(denial_kinds(err), vec![ReasonKind::ModuleDisabled]);
}

#[tokio::test]
async fn test_double_cancel_is_rejected() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();

    let cancelled = state.reservations.cancel(r.id).await.unwrap();
    assert_eq!(cancelled.value.status, ReservationStatus::Cancelled);
    assert!(cancelled.warnings.is_empty());
    assert_eq!(item_status(&state, item).await, ItemStatus::Available);
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Cancelled);

    let again = state.reservations.cancel(r.id).await;
    assert!(matches!(again, Err(ReservationError::InvalidOperation(_))));
    assert!(rx.try_recv().is_err());
    assert_eq!(item_status(&state, item).await, ItemStatus::Available);
}

#[tokio::test]
async fn test_round_trip_to_loan() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();

    let ready = state.reservations.mark_ready(r.id).await.unwrap().value;
    assert_eq!(ready.status, ReservationStatus::Ready);
    assert!(ready.notified_at.is_some());
    let expires_at = ready.expires_at.unwrap();
    assert!(expires_at > Utc::now() + Duration::days(6));
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Ready);

    let extended = state.reservations.extend(r.id, 15).await.unwrap().value;
    assert_eq!(extended.status, ReservationStatus::Ready);
    assert!(extended.expires_at.unwrap() > Utc::now() + Duration::days(14));
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Extended);

    let conversion = state
        .reservations
        .convert_to_loan(r.id, None, Some("Counter pickup".to_string()))
        .await
        .unwrap()
        .value;
    assert_eq!(conversion.reservation.status, ReservationStatus::Converted);
    assert_eq!(conversion.reservation.loan_id, Some(conversion.loan.id));
    assert!(conversion.reservation.converted_at.is_some());
    assert_eq!(conversion.loan.item, item);
    assert_eq!(item_status(&state, item).await, ItemStatus::OnLoan);

    let converted: Vec<_> = reservation::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.status == ReservationStatus::Converted)
        .collect();
    assert_eq!(converted.len(), 1);
    assert!(converted[0].loan_id.is_some());

    // Nothing else queued, so the item goes back on the shelf
    let (loan, status) = state
        .reservations
        .return_loan(conversion.loan.id)
        .await
        .unwrap();
    assert_eq!(loan.status, "returned");
    assert_eq!(status, ItemStatus::Available);
}

#[tokio::test]
async fn test_invalid_transitions() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();

    let invalid = |res: Result<_, ReservationError>| {
        matches!(res, Err(ReservationError::InvalidOperation(_)))
    };

    assert!(invalid(state.reservations.convert_to_loan(r.id, None, None).await.map(|_| ())));
    assert!(invalid(state.reservations.extend(r.id, 5).await.map(|_| ())));
    assert!(invalid(state.reservations.notify(r.id).await.map(|_| ())));

    state.reservations.mark_ready(r.id).await.unwrap();
    assert!(invalid(state.reservations.mark_ready(r.id).await.map(|_| ())));
    assert!(invalid(
        state
            .reservations
            .reorder(r.id, Direction::Down)
            .await
            .map(|_| ())
    ));
    assert!(matches!(
        state.reservations.extend(r.id, 0).await,
        Err(ReservationError::Validation(_))
    ));
    assert!(matches!(
        state.reservations.mark_ready(9999).await,
        Err(ReservationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_convert_rejects_past_due_date() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();
    state.reservations.mark_ready(r.id).await.unwrap();

    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    let result = state
        .reservations
        .convert_to_loan(r.id, Some(yesterday), None)
        .await;
    assert!(matches!(result, Err(ReservationError::Validation(_))));

    // Nothing was applied
    let current = state.reservations.get(r.id).await.unwrap();
    assert_eq!(current.status, ReservationStatus::Ready);
    assert_eq!(item_status(&state, item).await, ItemStatus::Reserved);
}

#[tokio::test]
async fn test_reorder_swaps_neighbours() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let mut ids = Vec::new();
    for name in ["Alice", "Bob", "Carol"] {
        let patron = create_test_patron(&db, name, true).await;
        ids.push(reserve(&state, patron, item).await.unwrap().id);
    }

    let moved = state
        .reservations
        .reorder(ids[2], Direction::Up)
        .await
        .unwrap()
        .value;
    assert_eq!(moved.queue_position, 2);
    assert_eq!(
        positions(&state, item).await,
        vec![(ids[0], 1), (ids[2], 2), (ids[1], 3)]
    );

    let at_head = state.reservations.reorder(ids[0], Direction::Up).await;
    assert!(matches!(at_head, Err(ReservationError::InvalidOperation(_))));
    let at_tail = state.reservations.reorder(ids[1], Direction::Down).await;
    assert!(matches!(at_tail, Err(ReservationError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_reorder_past_ready_neighbour() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let alice = create_test_patron(&db, "Alice", true).await;
    let bob = create_test_patron(&db, "Bob", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let first = reserve(&state, alice, item).await.unwrap();
    let second = reserve(&state, bob, item).await.unwrap();
    state.reservations.mark_ready(first.id).await.unwrap();

    let moved = state
        .reservations
        .reorder(second.id, Direction::Up)
        .await
        .unwrap()
        .value;
    assert_eq!(moved.queue_position, 1);
    assert_eq!(moved.status, ReservationStatus::Waiting);
    assert_eq!(
        positions(&state, item).await,
        vec![(second.id, 1), (first.id, 2)]
    );
    assert!(gap_free(&state, item).await);

    // The held reservation keeps its status and deadline
    let held = state.reservations.get(first.id).await.unwrap();
    assert_eq!(held.status, ReservationStatus::Ready);
    assert!(held.expires_at.is_some());
}

#[tokio::test]
async fn test_create_on_loaned_item_keeps_it_on_loan() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let mut book: book::ActiveModel = book::Entity::find_by_id(item.item_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap()
        .into();
    book.status = Set(ItemStatus::OnLoan);
    book.update(&db).await.unwrap();

    let r = reserve(&state, patron, item).await.unwrap();
    assert_eq!(r.queue_position, 1);
    assert_eq!(r.status, ReservationStatus::Waiting);
    assert_eq!(item_status(&state, item).await, ItemStatus::OnLoan);

    // Cancelling does not put a loaned item back on the shelf
    state.reservations.cancel(r.id).await.unwrap();
    assert_eq!(item_status(&state, item).await, ItemStatus::OnLoan);
}

#[tokio::test]
async fn test_expiry_frees_slot_and_extend_revives_at_head() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    let alice = create_test_patron(&db, "Alice", true).await;
    let bob = create_test_patron(&db, "Bob", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let first = reserve(&state, alice, item).await.unwrap();
    let second = reserve(&state, bob, item).await.unwrap();
    state.reservations.mark_ready(first.id).await.unwrap();
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Ready);

    // Nothing is overdue yet
    let applied = state.reservations.expire_overdue(Utc::now()).await.unwrap();
    assert!(applied.value.is_empty());

    let later = Utc::now() + Duration::days(8);
    let applied = state.reservations.expire_overdue(later).await.unwrap();
    assert_eq!(applied.value.len(), 1);
    assert_eq!(applied.value[0].status, ReservationStatus::Expired);
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Expired);
    assert_eq!(positions(&state, item).await, vec![(second.id, 1)]);
    assert!(gap_free(&state, item).await);

    let revived = state.reservations.extend(first.id, 3).await.unwrap().value;
    assert_eq!(revived.status, ReservationStatus::Ready);
    assert_eq!(revived.queue_position, 1);
    assert_eq!(
        positions(&state, item).await,
        vec![(first.id, 1), (second.id, 2)]
    );
    assert!(gap_free(&state, item).await);
}

#[tokio::test]
async fn test_expiry_of_last_reservation_frees_item() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();
    state.reservations.mark_ready(r.id).await.unwrap();

    state
        .reservations
        .expire_overdue(Utc::now() + Duration::days(8))
        .await
        .unwrap();
    assert_eq!(item_status(&state, item).await, ItemStatus::Available);

    // An expired reservation may still be cancelled
    let cancelled = state.reservations.cancel(r.id).await.unwrap().value;
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn test_reminders_are_sent_once() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();
    state.reservations.mark_ready(r.id).await.unwrap();
    rx.try_recv().unwrap();

    // Expiry is 7 days out, reminders fire 2 days before
    let too_early = state.reservations.send_due_reminders(Utc::now()).await.unwrap();
    assert_eq!(too_early.value, 0);

    let in_window = Utc::now() + Duration::days(6);
    let sent = state.reservations.send_due_reminders(in_window).await.unwrap();
    assert_eq!(sent.value, 1);
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Reminder);

    let again = state.reservations.send_due_reminders(in_window).await.unwrap();
    assert_eq!(again.value, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_return_with_queue_keeps_item_reserved() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let alice = create_test_patron(&db, "Alice", true).await;
    let bob = create_test_patron(&db, "Bob", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;

    let first = reserve(&state, alice, item).await.unwrap();
    let second = reserve(&state, bob, item).await.unwrap();
    state.reservations.mark_ready(first.id).await.unwrap();
    let loan = state
        .reservations
        .convert_to_loan(first.id, None, None)
        .await
        .unwrap()
        .value
        .loan;

    assert_eq!(positions(&state, item).await, vec![(second.id, 1)]);

    let (_, status) = state.reservations.return_loan(loan.id).await.unwrap();
    assert_eq!(status, ItemStatus::Reserved);

    let twice = state.reservations.return_loan(loan.id).await;
    assert!(matches!(twice, Err(ReservationError::InvalidOperation(_))));
    assert_eq!(item_status(&state, item).await, ItemStatus::Reserved);

    let unknown = state.reservations.return_loan(9999).await;
    assert!(matches!(unknown, Err(ReservationError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_returns_close_the_loan_once() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();
    state.reservations.mark_ready(r.id).await.unwrap();
    let loan = state
        .reservations
        .convert_to_loan(r.id, None, None)
        .await
        .unwrap()
        .value
        .loan;

    let (first, second) = tokio::join!(
        state.reservations.return_loan(loan.id),
        state.reservations.return_loan(loan.id)
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ReservationError::InvalidOperation(_)))));
    assert_eq!(item_status(&state, item).await, ItemStatus::Available);
}

#[tokio::test]
async fn test_limits_summary_reports_usage() {
    let (state, _rx) = setup_test_state().await;
    let db = state.db().clone();
    state
        .genre_limits
        .upsert(UpsertGenreLimitInput {
            module: Module::Books,
            genre_id: 42,
            max_concurrent: 3,
            enabled: None,
        })
        .await
        .unwrap();

    let patron = create_test_patron(&db, "Alice", true).await;
    let fresh = create_test_book(&db, "Fresh", 2, &[42]).await;
    let old = create_test_book(&db, "Old", 400, &[]).await;
    reserve(&state, patron, fresh).await.unwrap();
    reserve(&state, patron, old).await.unwrap();

    let summary = state
        .reservations
        .limits_summary(patron, Module::Books)
        .await
        .unwrap();
    assert_eq!(summary.general.current, 2);
    assert_eq!(summary.general.limit, 5);
    assert_eq!(summary.novelty.current, 1);
    assert_eq!(summary.genres.len(), 1);
    assert_eq!(summary.genres[0].genre_id, 42);
    assert_eq!(summary.genres[0].current, 1);

    let verdict = state.reservations.validate(patron, old).await.unwrap();
    assert!(!verdict.allowed);
    assert!(verdict.has(ReasonKind::AlreadyReserved));
}

#[tokio::test]
async fn test_out_of_range_day_counts_are_rejected() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    let patron = create_test_patron(&db, "Alice", true).await;
    let item = create_test_book(&db, "Dune", 400, &[]).await;
    let r = reserve(&state, patron, item).await.unwrap();

    // Stored values bypass the settings endpoint's bounds
    update_limits(&state, Module::Books, |l| l.ready_expiry_days = u32::MAX).await;
    let result = state.reservations.mark_ready(r.id).await;
    assert!(matches!(result, Err(ReservationError::Validation(_))));
    let current = state.reservations.get(r.id).await.unwrap();
    assert_eq!(current.status, ReservationStatus::Waiting);
    assert!(rx.try_recv().is_err());

    update_limits(&state, Module::Books, |l| l.ready_expiry_days = 7).await;
    state.reservations.mark_ready(r.id).await.unwrap();
    rx.try_recv().unwrap();

    let result = state.reservations.extend(r.id, 4_000_000_000).await;
    assert!(matches!(result, Err(ReservationError::Validation(_))));
    let result = state.reservations.extend(r.id, MAX_DAYS + 1).await;
    assert!(matches!(result, Err(ReservationError::Validation(_))));
    assert!(state.reservations.extend(r.id, MAX_DAYS).await.is_ok());
    rx.try_recv().unwrap();

    update_limits(&state, Module::Books, |l| l.loan_duration_days = u32::MAX).await;
    let result = state.reservations.convert_to_loan(r.id, None, None).await;
    assert!(matches!(result, Err(ReservationError::Validation(_))));
    let current = state.reservations.get(r.id).await.unwrap();
    assert_eq!(current.status, ReservationStatus::Ready);
    assert_eq!(item_status(&state, item).await, ItemStatus::Reserved);
}

#[tokio::test]
async fn test_huge_windows_saturate_instead_of_failing() {
    let (state, mut rx) = setup_test_state().await;
    let db = state.db().clone();
    update_limits(&state, Module::Books, |l| {
        l.novelty_tracking_enabled = true;
        l.novelty_window_days = u32::MAX;
        l.reminder_days_before = u32::MAX;
    })
    .await;

    let patron = create_test_patron(&db, "Alice", true).await;
    let ancient = create_test_book(&db, "Ancient", 100_000, &[]).await;
    reserve(&state, patron, ancient).await.unwrap();

    // Every item falls inside an unbounded novelty window
    let summary = state
        .reservations
        .limits_summary(patron, Module::Books)
        .await
        .unwrap();
    assert_eq!(summary.novelty.current, 1);

    let r = state.reservations.queue(ancient).await.unwrap().reservations[0].clone();
    state.reservations.mark_ready(r.id).await.unwrap();
    rx.try_recv().unwrap();

    let sent = state
        .reservations
        .send_due_reminders(Utc::now())
        .await
        .unwrap();
    assert_eq!(sent.value, 1);
    assert_eq!(rx.try_recv().unwrap().code, EventCode::Reminder);
}
