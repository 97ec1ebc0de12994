//! Session-level scenarios across filter, selection, data source, and coordinator.

use std::sync::Arc;
use std::time::Duration;

use codedesk_api_models::{ActionKind, ActionTarget, FilterToggle};

use crate::test_support::{
    FakeApi, assigned, item_results, overview, page_of, page_response,
};
use crate::{
    ActionPayload, BulkActionKind, CodeId, CodesConsole, ConsoleConfig, CouponId, ExecuteError,
    ExecutionState, FetchError, PayloadError, RowActions, outcome_message,
};

fn console(api: &Arc<FakeApi>) -> CodesConsole<FakeApi> {
    CodesConsole::new(
        Arc::clone(api),
        CouponId::new("c1"),
        ConsoleConfig {
            debounce: Duration::ZERO,
            page_size: 10,
        },
    )
}

async fn open_unredeemed(api: &Arc<FakeApi>, session: &CodesConsole<FakeApi>) {
    api.push_page(page_response(&["X"]));
    session.open().await.unwrap();
    api.push_page(page_of(vec![
        assigned("A", "a@example.com"),
        assigned("B", "b@example.com"),
        assigned("C", "c@example.com"),
    ]));
    let ticket = session.set_filter(FilterToggle::Unredeemed).unwrap();
    session.load(ticket).await.unwrap();
}

#[tokio::test]
async fn assign_selected_page_refreshes_overview_and_clears_selection() {
    let api = Arc::new(FakeApi::default());
    api.set_overview(overview("c1", 3));
    api.push_page(page_response(&["A", "B", "C"]));
    let session = console(&api);
    session.open().await.unwrap();

    session.select_all_on_page();
    let actions = session.bulk_actions();
    assert!(actions.is_enabled(BulkActionKind::Assign));
    assert_eq!(actions.default, BulkActionKind::Assign);
    assert_eq!(session.snapshot().selection_count, 3);

    api.push_action(Ok(item_results(&[("A", true), ("B", true), ("C", true)])));
    let outcome = session
        .execute_bulk(
            BulkActionKind::Assign,
            ActionPayload::with_emails(["a@example.com", "b@example.com", "c@example.com"]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded_count, 3);
    assert_eq!(outcome.failed_count, 0);
    assert!(!outcome.failed);
    assert_eq!(outcome_message(&outcome), "Assigned 3 codes");

    let snapshot = session.snapshot();
    assert!(snapshot.selection.is_empty());
    assert_eq!(snapshot.refresh_token, 1);
    assert_eq!(snapshot.outcome, Some(outcome));
    assert_eq!(api.overview_calls(), 2);
    assert_eq!(api.fetch_calls().len(), 2);

    let request = &api.action_calls()[0];
    assert_eq!(
        request.target,
        ActionTarget::Codes {
            codes: vec!["A".into(), "B".into(), "C".into()]
        }
    );
    assert_eq!(request.emails.len(), 3);
}

#[tokio::test]
async fn remind_with_one_failed_item_settles_as_failed_and_clears_selection() {
    let api = Arc::new(FakeApi::default());
    let session = console(&api);
    open_unredeemed(&api, &session).await;
    session.select_all_on_page();
    assert_eq!(session.bulk_actions().default, BulkActionKind::Remind);

    api.push_action(Ok(item_results(&[("A", true), ("B", false), ("C", true)])));
    let outcome = session
        .execute_bulk(BulkActionKind::Remind, ActionPayload::default())
        .await
        .unwrap();

    assert!(outcome.failed);
    assert_eq!(outcome.succeeded_count, 2);
    assert_eq!(outcome.failed_count, 1);
    assert!(session.snapshot().selection.is_empty());
    assert!(matches!(
        session.execution_state(),
        ExecutionState::Failed(_)
    ));
    assert_eq!(api.overview_calls(), 1);
    assert_eq!(session.refresh_token(), 1);
}

#[tokio::test]
async fn later_page_request_wins_even_when_it_resolves_first() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["P0"]));
    let session = Arc::new(console(&api));
    session.open().await.unwrap();

    let gate = api.gate_next_fetch();
    api.push_page(page_response(&["P1"]));
    api.push_page(page_response(&["P2"]));
    let first = session.set_page(1);
    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.load(first).await }
    });
    api.wait_for_fetches(2).await;

    let second = session.set_page(2);
    let applied = session.load(second).await.unwrap().unwrap();
    assert_eq!(applied.page_index, 2);

    gate.send(()).unwrap();
    assert!(pending.await.unwrap().unwrap().is_none());
    let page = session.page().unwrap();
    assert_eq!(page.page_index, 2);
    assert_eq!(page.ids(), vec![CodeId::from("P2")]);
}

#[tokio::test]
async fn filter_change_resets_selection_before_the_new_page_arrives() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);
    session.open().await.unwrap();
    session.select_all_matching_filter();
    assert!(session.snapshot().selection.all_matching_filter_selected);

    let ticket = session.set_filter(FilterToggle::Redeemed).unwrap();
    let snapshot = session.snapshot();
    assert!(snapshot.selection.is_empty());
    assert!(!snapshot.selection.all_matching_filter_selected);
    assert_eq!(snapshot.selection_count, 0);
    assert!(session.page().is_none());
    assert!(!snapshot.actions.any_enabled());

    session.load(ticket).await.unwrap();
    assert_eq!(session.page().unwrap().filter, FilterToggle::Redeemed);
}

#[tokio::test]
async fn sort_and_paging_keep_the_selection() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);
    session.open().await.unwrap();
    session.toggle_record(&CodeId::from("A"));

    let ticket = session.set_sort(Some(codedesk_api_models::SortKey {
        field: "code".into(),
        descending: true,
    }));
    session.load(ticket).await.unwrap();
    let ticket = session.set_page(3);
    session.load(ticket).await.unwrap();

    assert!(
        session
            .snapshot()
            .selection
            .selected_ids
            .contains(&CodeId::from("A"))
    );
    let last = api.fetch_calls().pop().unwrap();
    assert_eq!(last.page_index, 3);
    assert_eq!(last.sort.unwrap().to_query(), "-code");
}

#[tokio::test]
async fn second_execute_while_pending_is_busy() {
    let api = Arc::new(FakeApi::default());
    let session = Arc::new(console(&api));
    open_unredeemed(&api, &session).await;
    session.select_all_on_page();

    let gate = api.gate_next_action();
    api.push_action(Ok(item_results(&[("A", true), ("B", true), ("C", true)])));
    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            session
                .execute_bulk(BulkActionKind::Remind, ActionPayload::default())
                .await
        }
    });
    api.wait_for_actions(1).await;

    let err = session
        .execute_bulk(BulkActionKind::Revoke, ActionPayload::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExecuteError::Busy {
            pending: ActionKind::Remind
        }
    );

    gate.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap().succeeded_count, 3);
    assert_eq!(api.action_calls().len(), 1);
}

#[tokio::test]
async fn ineligible_action_fails_fast_without_a_call() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A"]));
    let session = console(&api);
    session.open().await.unwrap();
    session.toggle_record(&CodeId::from("A"));

    let err = session
        .execute_bulk(BulkActionKind::Revoke, ActionPayload::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExecuteError::Ineligible {
            kind: ActionKind::Revoke
        }
    );
    assert!(api.action_calls().is_empty());
    assert_eq!(session.execution_state(), ExecutionState::Idle);
}

#[tokio::test]
async fn transport_failure_keeps_selection_for_retry() {
    let api = Arc::new(FakeApi::default());
    let session = console(&api);
    open_unredeemed(&api, &session).await;
    session.select_all_on_page();
    let fetches = api.fetch_calls().len();

    api.push_action(Err("503 service unavailable".into()));
    let outcome = session
        .execute_bulk(BulkActionKind::Revoke, ActionPayload::default())
        .await
        .unwrap();

    assert!(outcome.failed);
    assert_eq!(outcome.failed_count, 3);
    assert_eq!(session.snapshot().selection_count, 3);
    assert_eq!(session.refresh_token(), 0);
    assert_eq!(api.fetch_calls().len(), fetches);
    assert!(outcome_message(&outcome).starts_with("Could not revoke codes"));
}

#[tokio::test]
async fn fetch_failure_keeps_the_last_page() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);
    session.open().await.unwrap();

    api.fail_next_fetches(1);
    let ticket = session.refresh();
    assert!(session.load(ticket).await.is_err());
    assert_eq!(session.page().unwrap().records.len(), 2);
}

#[tokio::test]
async fn all_matching_remind_targets_the_filter() {
    let api = Arc::new(FakeApi::default());
    let session = console(&api);
    open_unredeemed(&api, &session).await;
    session.select_all_matching_filter();

    api.push_action(Ok(codedesk_api_models::ActionResponse::Summary(
        codedesk_api_models::ActionSummary {
            num_successful: Some(7),
            num_failed: Some(0),
            detail: None,
        },
    )));
    let outcome = session
        .execute_bulk(BulkActionKind::Remind, ActionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome.succeeded_count, 7);
    assert_eq!(
        api.action_calls()[0].target,
        ActionTarget::Filter {
            filter: FilterToggle::Unredeemed
        }
    );
}

#[tokio::test]
async fn assign_payload_is_validated_before_the_call() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A"]));
    let session = console(&api);
    session.open().await.unwrap();
    session.toggle_record(&CodeId::from("A"));

    let err = session
        .execute_bulk(BulkActionKind::Assign, ActionPayload::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExecuteError::InvalidPayload {
            source: PayloadError::MissingEmails
        }
    );

    let err = session
        .execute_bulk(
            BulkActionKind::Assign,
            ActionPayload::with_emails(["a@example.com", "b@example.com"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::InvalidPayload {
            source: PayloadError::InsufficientCapacity { .. }
        }
    ));
    assert!(api.action_calls().is_empty());
}

#[tokio::test]
async fn single_visibility_action_refreshes_page_and_overview() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A"]));
    let session = console(&api);
    session.open().await.unwrap();
    let id = CodeId::from("A");
    assert_eq!(session.visibility_action(&id), Some(ActionKind::MakePublic));

    api.push_action(Ok(item_results(&[("A", true)])));
    let outcome = session
        .execute_single(ActionKind::MakePublic, &id, ActionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome_message(&outcome), "Made public 1 code");
    assert_eq!(api.overview_calls(), 2);

    let err = session
        .execute_single(
            ActionKind::Remind,
            &CodeId::from("missing"),
            ActionPayload::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::UnknownRecord { .. }));
}

#[tokio::test]
async fn selection_change_dismisses_the_outcome() {
    let api = Arc::new(FakeApi::default());
    let session = console(&api);
    open_unredeemed(&api, &session).await;
    session.toggle_record(&CodeId::from("A"));
    api.push_action(Ok(item_results(&[("A", true)])));
    session
        .execute_single(ActionKind::Remind, &CodeId::from("A"), ActionPayload::default())
        .await
        .unwrap();
    assert!(session.snapshot().outcome.is_some());

    session.toggle_record(&CodeId::from("B"));
    let snapshot = session.snapshot();
    assert!(snapshot.outcome.is_none());
    assert_eq!(snapshot.execution, ExecutionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn rapid_filter_changes_fetch_once() {
    let api = Arc::new(FakeApi::default());
    let session = Arc::new(CodesConsole::new(
        Arc::clone(&api),
        CouponId::new("c1"),
        ConsoleConfig::default(),
    ));
    api.push_page(page_response(&["R1"]));

    let first = session.set_filter(FilterToggle::Unredeemed).unwrap();
    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.load(first).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = session.set_filter(FilterToggle::Redeemed).unwrap();

    let page = session.load(second).await.unwrap().unwrap();
    assert!(pending.await.unwrap().unwrap().is_none());
    assert_eq!(page.filter, FilterToggle::Redeemed);
    assert_eq!(api.fetch_calls().len(), 1);
}

#[tokio::test]
async fn code_dropped_by_the_refetch_is_no_longer_actionable() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);
    session.open().await.unwrap();
    let id = CodeId::from("A");

    api.push_action(Ok(item_results(&[("A", true)])));
    api.push_page(page_response(&["B"]));
    session
        .execute_single(
            ActionKind::Assign,
            &id,
            ActionPayload::with_emails(["a@example.com"]),
        )
        .await
        .unwrap();
    assert_eq!(session.page().unwrap().ids(), vec![CodeId::from("B")]);

    assert_eq!(session.row_actions(&id), None);
    assert_eq!(session.visibility_action(&id), None);
    let err = session
        .execute_single(
            ActionKind::Assign,
            &id,
            ActionPayload::with_emails(["a@example.com"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ExecuteError::UnknownRecord { id });
    assert_eq!(api.action_calls().len(), 1);
}

#[tokio::test]
async fn refetch_replaces_the_rows_of_its_page() {
    let api = Arc::new(FakeApi::default());
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);
    session.open().await.unwrap();
    assert!(session.row_actions(&CodeId::from("A")).is_some());

    api.push_page(page_of(vec![assigned("B", "b@example.com")]));
    let ticket = session.refresh();
    session.load(ticket).await.unwrap();

    assert_eq!(session.row_actions(&CodeId::from("A")), None);
    assert_eq!(
        session.row_actions(&CodeId::from("B")),
        Some(RowActions::RemindOrRevoke)
    );
}

#[tokio::test]
async fn overview_failure_still_loads_the_page_with_actions_disabled() {
    let api = Arc::new(FakeApi::default());
    api.fail_next_overviews(1);
    api.push_page(page_response(&["A", "B"]));
    let session = console(&api);

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, FetchError::Overview { .. }));
    assert_eq!(api.fetch_calls().len(), 1);
    assert_eq!(session.page().unwrap().records.len(), 2);
    assert!(!session.bulk_actions().any_enabled());
    assert_eq!(session.row_actions(&CodeId::from("A")), Some(RowActions::None));

    session.refresh_overview().await.unwrap();
    assert!(session.bulk_actions().is_enabled(BulkActionKind::Assign));
}
