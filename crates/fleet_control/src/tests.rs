use crate::error::ErrorCode;
use crate::messaging::payload::FieldValue;
use crate::persistence::{GroupStore, MemoryGroupStore};
use crate::state::{InstanceCommand, Proxy, ProxyChooseStrategy, ProxyGroup, Server, ServerGroup, WILDCARD};
use crate::*;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

fn setup() -> (RequestDispatcher, Arc<MemoryGroupStore>) {
    let store = Arc::new(MemoryGroupStore::new());
    let state = Arc::new(FleetState::new(store.clone()));
    (RequestDispatcher::new(state), store)
}

fn lobby_payload() -> Payload {
    Payload::new()
        .with("name", "lobby")
        .with("onlineAmount", 1)
        .with("maxAmount", 5)
        .with("ram", 512)
        .with("static", false)
        .with("priority", 1)
        .with("sortOutStates", Vec::<String>::new())
}

fn proxy_payload(strategy: &str) -> Payload {
    Payload::new()
        .with("name", "Proxy")
        .with("maxPlayerCountPerProxy", 100)
        .with("maxPlayerCount", 500)
        .with("keepFreeSlots", 10)
        .with("minAmount", 1)
        .with("maxAmount", 3)
        .with("ram", 256)
        .with("motd", "Welcome")
        .with("static", false)
        .with("priority", 1)
        .with("serverGroups", Vec::<String>::new())
        .with("proxyChooseStrategy", strategy)
        .with("hostNames", Vec::<String>::new())
}

fn set(request_type: RequestType, target: &str, value: impl Into<FieldValue>) -> ApiRequest {
    ApiRequest::targeted(request_type, target, Payload::new().with("value", value))
}

fn error_code(response: &ApiResponse) -> Option<u32> {
    response.error().map(|error| error.code)
}

async fn create_lobby(dispatcher: &RequestDispatcher) {
    let response = dispatcher
        .dispatch(ApiRequest::general(RequestType::CreateServerGroup, lobby_payload()))
        .await;
    assert!(response.is_success(), "{response:?}");
}

async fn create_proxy_group(dispatcher: &RequestDispatcher) {
    let response = dispatcher
        .dispatch(ApiRequest::general(
            RequestType::CreateProxyGroup,
            proxy_payload("ROUND_ROBIN"),
        ))
        .await;
    assert!(response.is_success(), "{response:?}");
}

#[tokio::test]
async fn test_create_server_group_persists_once() {
    let (dispatcher, store) = setup();

    let response = dispatcher
        .dispatch(ApiRequest::general(RequestType::CreateServerGroup, lobby_payload()))
        .await;

    assert!(response.is_success());
    assert_eq!(response.result().unwrap()["name"], "lobby");
    assert!(dispatcher.state().find_server_group("lobby").is_some());
    assert_eq!(store.server_saves(), 1);
    assert_eq!(store.proxy_saves(), 0);
    assert_eq!(store.saved_server_groups().len(), 1);
}

#[tokio::test]
async fn test_create_proxy_group_normalizes_wildcards() {
    let (dispatcher, store) = setup();
    create_proxy_group(&dispatcher).await;

    let group = dispatcher.state().find_proxy_group("Proxy").unwrap();
    assert_eq!(group.server_groups(), &BTreeSet::from([WILDCARD.to_string()]));
    assert_eq!(group.host_names(), &BTreeSet::from([WILDCARD.to_string()]));
    assert_eq!(group.proxy_choose_strategy(), ProxyChooseStrategy::RoundRobin);
    assert_eq!(store.proxy_saves(), 1);
}

#[tokio::test]
async fn test_unknown_strategy_creates_nothing() {
    let (dispatcher, store) = setup();

    let response = dispatcher
        .dispatch(ApiRequest::general(RequestType::CreateProxyGroup, proxy_payload("BOGUS")))
        .await;

    let error = response.error().expect("error response");
    assert_eq!(error.code, ErrorCode::UnknownProxyChooseStrategy.as_u32());
    assert!(error.message.contains("BOGUS"));
    assert!(response.result().is_none());
    assert!(dispatcher.state().find_proxy_group("Proxy").is_none());
    assert_eq!(store.proxy_saves(), 0);
}

#[tokio::test]
async fn test_creation_is_atomic_for_every_invalid_field() {
    let invalid: Vec<(&str, FieldValue, ErrorCode)> = vec![
        ("name", FieldValue::Null, ErrorCode::MissingValue),
        ("onlineAmount", FieldValue::Integer(-1), ErrorCode::BelowMinimum),
        ("maxAmount", FieldValue::Null, ErrorCode::MissingValue),
        ("ram", FieldValue::Integer(0), ErrorCode::BelowMinimum),
        ("static", FieldValue::Text("no".into()), ErrorCode::InvalidType),
        ("priority", FieldValue::Null, ErrorCode::MissingValue),
        ("sortOutStates", FieldValue::Null, ErrorCode::MissingValue),
    ];

    for (field, value, code) in invalid {
        let (dispatcher, store) = setup();
        let payload = lobby_payload().with(field, value);
        let response = dispatcher
            .dispatch(ApiRequest::general(RequestType::CreateServerGroup, payload))
            .await;

        assert_eq!(error_code(&response), Some(code.as_u32()), "field {field}");
        assert!(dispatcher.state().server_groups().is_empty(), "field {field}");
        assert_eq!(store.server_saves(), 0, "field {field}");
    }
}

#[tokio::test]
async fn test_proxy_group_creation_is_atomic_for_every_invalid_field() {
    let too_large = FieldValue::Integer(i64::from(u32::MAX) + 1);
    let invalid: Vec<(&str, FieldValue, ErrorCode)> = vec![
        ("name", FieldValue::Null, ErrorCode::MissingValue),
        ("maxPlayerCountPerProxy", FieldValue::Integer(-1), ErrorCode::BelowMinimum),
        ("maxPlayerCount", FieldValue::Null, ErrorCode::MissingValue),
        ("keepFreeSlots", FieldValue::Text("ten".into()), ErrorCode::InvalidType),
        ("minAmount", FieldValue::Integer(-1), ErrorCode::BelowMinimum),
        ("maxAmount", too_large, ErrorCode::AboveMaximum),
        ("ram", FieldValue::Integer(0), ErrorCode::BelowMinimum),
        ("motd", FieldValue::Null, ErrorCode::MissingValue),
        ("static", FieldValue::Null, ErrorCode::MissingValue),
        ("priority", FieldValue::Integer(i64::MAX), ErrorCode::OutOfRange),
        ("serverGroups", FieldValue::Null, ErrorCode::MissingValue),
        ("base", FieldValue::Integer(3), ErrorCode::InvalidType),
        ("proxyChooseStrategy", FieldValue::Text("BOGUS".into()), ErrorCode::UnknownProxyChooseStrategy),
        (
            "hostNames",
            FieldValue::List(vec![FieldValue::Integer(1)]),
            ErrorCode::InvalidType,
        ),
    ];
    for (field, value, code) in invalid {
        let (dispatcher, store) = setup();
        let payload = proxy_payload("RANDOM").with(field, value);
        let response = dispatcher
            .dispatch(ApiRequest::general(RequestType::CreateProxyGroup, payload))
            .await;

        assert_eq!(error_code(&response), Some(code.as_u32()), "field {field}");
        assert!(dispatcher.state().proxy_groups().is_empty(), "field {field}");
        assert_eq!(store.proxy_saves(), 0, "field {field}");
    }
}

#[tokio::test]
async fn test_duplicate_group_is_rejected() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;

    let response = dispatcher
        .dispatch(ApiRequest::general(RequestType::CreateServerGroup, lobby_payload()))
        .await;

    assert_eq!(error_code(&response), Some(ErrorCode::GroupAlreadyExists.as_u32()));
    assert_eq!(response.error().unwrap().context, vec![Value::from("lobby")]);
    assert_eq!(store.server_saves(), 1);
}

#[tokio::test]
async fn test_set_ram_below_minimum_keeps_value() {
    let (dispatcher, store) = setup();
    create_proxy_group(&dispatcher).await;

    let response = dispatcher.dispatch(set(RequestType::ProxyGroupSetRam, "Proxy", 0)).await;

    let error = response.error().unwrap();
    assert_eq!(error.code, ErrorCode::BelowMinimum.as_u32());
    assert_eq!(error.context, vec![Value::from(0), Value::from(1)]);
    assert_eq!(dispatcher.state().find_proxy_group("Proxy").unwrap().ram(), 256);
    assert_eq!(store.proxy_saves(), 1);
}

/// A setter request whose `value` is `None` omits the key entirely.
fn invalid_setter(request_type: RequestType, target: &str, value: Option<FieldValue>) -> ApiRequest {
    let data = match value {
        Some(value) => Payload::new().with("value", value),
        None => Payload::new(),
    };
    ApiRequest::targeted(request_type, target, data)
}

#[tokio::test]
async fn test_rejected_setters_keep_every_field() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;
    create_proxy_group(&dispatcher).await;
    let lobby = dispatcher.state().find_server_group("lobby").unwrap();
    let proxy = dispatcher.state().find_proxy_group("Proxy").unwrap();

    let server_group_cases: Vec<(RequestType, Option<FieldValue>, ErrorCode)> = vec![
        (RequestType::ServerGroupSetMaxAmount, Some(FieldValue::Null), ErrorCode::MissingValue),
        (RequestType::ServerGroupSetMaxAmount, Some(FieldValue::Integer(-1)), ErrorCode::BelowMinimum),
        (RequestType::ServerGroupSetRam, Some(FieldValue::Integer(0)), ErrorCode::BelowMinimum),
        (
            RequestType::ServerGroupSetRam,
            Some(FieldValue::Integer(i64::from(u32::MAX) + 1)),
            ErrorCode::AboveMaximum,
        ),
        (RequestType::ServerGroupSetStatic, Some(FieldValue::Text("yes".into())), ErrorCode::InvalidType),
        (RequestType::ServerGroupSetStatic, None, ErrorCode::MissingValue),
        (RequestType::ServerGroupSetPriority, Some(FieldValue::Integer(i64::MAX)), ErrorCode::OutOfRange),
        (RequestType::ServerGroupSetPriority, Some(FieldValue::Float(0.5)), ErrorCode::InvalidType),
        (RequestType::ServerGroupSetBase, None, ErrorCode::MissingField),
        (RequestType::ServerGroupSetBase, Some(FieldValue::Bool(true)), ErrorCode::InvalidType),
        (RequestType::ServerGroupSetOnlineAmount, Some(FieldValue::Integer(-3)), ErrorCode::BelowMinimum),
        (RequestType::ServerGroupSetSortOutStates, Some(FieldValue::Null), ErrorCode::MissingValue),
        (
            RequestType::ServerGroupSetSortOutStates,
            Some(FieldValue::List(vec![FieldValue::Integer(1)])),
            ErrorCode::InvalidType,
        ),
    ];
    for (request_type, value, code) in server_group_cases {
        let response = dispatcher.dispatch(invalid_setter(request_type, "lobby", value)).await;
        assert_eq!(error_code(&response), Some(code.as_u32()), "{request_type}");
        assert_eq!(dispatcher.state().find_server_group("lobby").unwrap(), lobby, "{request_type}");
    }

    let proxy_group_cases: Vec<(RequestType, Option<FieldValue>, ErrorCode)> = vec![
        (RequestType::ProxyGroupSetMaxPlayerCount, Some(FieldValue::Integer(-5)), ErrorCode::BelowMinimum),
        (RequestType::ProxyGroupSetMaxPlayerCountPerProxy, None, ErrorCode::MissingValue),
        (RequestType::ProxyGroupSetKeepFreeSlots, Some(FieldValue::Text("x".into())), ErrorCode::InvalidType),
        (RequestType::ProxyGroupSetMinAmount, Some(FieldValue::Float(1.5)), ErrorCode::InvalidType),
        (
            RequestType::ProxyGroupSetMaxAmount,
            Some(FieldValue::Integer(i64::from(u32::MAX) + 1)),
            ErrorCode::AboveMaximum,
        ),
        (RequestType::ProxyGroupSetRam, Some(FieldValue::Integer(0)), ErrorCode::BelowMinimum),
        (RequestType::ProxyGroupSetMotd, Some(FieldValue::Null), ErrorCode::MissingValue),
        (RequestType::ProxyGroupSetMotd, Some(FieldValue::Integer(7)), ErrorCode::InvalidType),
        (RequestType::ProxyGroupSetStatic, Some(FieldValue::Integer(1)), ErrorCode::InvalidType),
        (
            RequestType::ProxyGroupSetPriority,
            Some(FieldValue::Integer(i64::from(i32::MIN) - 1)),
            ErrorCode::OutOfRange,
        ),
        (RequestType::ProxyGroupSetBase, None, ErrorCode::MissingField),
        (
            RequestType::ProxyGroupSetProxyChooseStrategy,
            Some(FieldValue::Text("BOGUS".into())),
            ErrorCode::UnknownProxyChooseStrategy,
        ),
        (RequestType::ProxyGroupSetProxyChooseStrategy, None, ErrorCode::MissingValue),
        (RequestType::ProxyGroupSetHostNames, Some(FieldValue::Text("a.example.net".into())), ErrorCode::InvalidType),
        (RequestType::ProxyGroupSetHostNames, Some(FieldValue::Null), ErrorCode::MissingValue),
    ];
    for (request_type, value, code) in proxy_group_cases {
        let response = dispatcher.dispatch(invalid_setter(request_type, "Proxy", value)).await;
        assert_eq!(error_code(&response), Some(code.as_u32()), "{request_type}");
        assert_eq!(dispatcher.state().find_proxy_group("Proxy").unwrap(), proxy, "{request_type}");
    }

    // Only the two creates were ever saved.
    assert_eq!(store.server_saves(), 1);
    assert_eq!(store.proxy_saves(), 1);
}

#[tokio::test]
async fn test_delete_missing_server_group() {
    let (dispatcher, _store) = setup();

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ServerGroupDelete, "ghost", Payload::new()))
        .await;

    let error = response.error().unwrap();
    assert_eq!(error.code, 7);
    assert_eq!(error.context, vec![Value::from("ghost")]);
}

#[tokio::test]
async fn test_setting_sort_out_states_never_deletes() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;

    let response = dispatcher
        .dispatch(set(
            RequestType::ServerGroupSetSortOutStates,
            "lobby",
            vec!["INGAME", "RESTARTING"],
        ))
        .await;

    assert!(response.is_success());
    let group = dispatcher.state().find_server_group("lobby").expect("group still exists");
    assert!(group.sort_out_states().contains("INGAME"));
    assert_eq!(group.sort_out_states().len(), 2);
    assert_eq!(store.server_saves(), 2);
    assert_eq!(store.saved_server_groups().len(), 1);
}

#[tokio::test]
async fn test_no_setter_removes_its_group() {
    let (dispatcher, _store) = setup();
    create_lobby(&dispatcher).await;
    create_proxy_group(&dispatcher).await;

    let server_group_setters = [
        (RequestType::ServerGroupSetMaxAmount, FieldValue::Integer(10)),
        (RequestType::ServerGroupSetRam, FieldValue::Integer(1024)),
        (RequestType::ServerGroupSetStatic, FieldValue::Bool(true)),
        (RequestType::ServerGroupSetPriority, FieldValue::Integer(-2)),
        (RequestType::ServerGroupSetBase, FieldValue::Text("base-1".into())),
        (RequestType::ServerGroupSetOnlineAmount, FieldValue::Integer(2)),
    ];
    for (request_type, value) in server_group_setters {
        let response = dispatcher.dispatch(set(request_type, "lobby", value)).await;
        assert!(response.is_success(), "{request_type}: {response:?}");
        assert!(dispatcher.state().find_server_group("lobby").is_some(), "{request_type}");
    }

    let group = dispatcher.state().find_server_group("lobby").unwrap();
    assert_eq!(group.max_amount(), 10);
    assert_eq!(group.ram(), 1024);
    assert!(group.is_static());
    assert_eq!(group.priority(), -2);
    assert_eq!(group.base(), Some("base-1"));
    assert_eq!(group.online_amount(), 2);

    let proxy_group_setters = [
        (RequestType::ProxyGroupSetMaxPlayerCount, FieldValue::Integer(800)),
        (RequestType::ProxyGroupSetMaxPlayerCountPerProxy, FieldValue::Integer(200)),
        (RequestType::ProxyGroupSetKeepFreeSlots, FieldValue::Integer(20)),
        (RequestType::ProxyGroupSetMinAmount, FieldValue::Integer(2)),
        (RequestType::ProxyGroupSetMaxAmount, FieldValue::Integer(6)),
        (RequestType::ProxyGroupSetRam, FieldValue::Integer(512)),
        (RequestType::ProxyGroupSetMotd, FieldValue::Text("Hello".into())),
        (RequestType::ProxyGroupSetStatic, FieldValue::Bool(true)),
        (RequestType::ProxyGroupSetPriority, FieldValue::Integer(5)),
        (RequestType::ProxyGroupSetBase, FieldValue::Null),
        (RequestType::ProxyGroupSetProxyChooseStrategy, FieldValue::Text("balance".into())),
        (
            RequestType::ProxyGroupSetHostNames,
            FieldValue::List(vec![FieldValue::Text("play.example.net".into())]),
        ),
    ];
    for (request_type, value) in proxy_group_setters {
        let response = dispatcher.dispatch(set(request_type, "Proxy", value)).await;
        assert!(response.is_success(), "{request_type}: {response:?}");
        assert!(dispatcher.state().find_proxy_group("Proxy").is_some(), "{request_type}");
    }

    let group = dispatcher.state().find_proxy_group("Proxy").unwrap();
    assert_eq!(group.max_player_count(), 800);
    assert_eq!(group.max_player_count_per_proxy(), 200);
    assert_eq!(group.keep_free_slots(), 20);
    assert_eq!(group.min_amount(), 2);
    assert_eq!(group.max_amount(), 6);
    assert_eq!(group.ram(), 512);
    assert_eq!(group.motd(), "Hello");
    assert_eq!(group.priority(), 5);
    assert_eq!(group.base(), None);
    assert_eq!(group.proxy_choose_strategy(), ProxyChooseStrategy::Balance);
    assert_eq!(
        group.host_names(),
        &BTreeSet::from(["play.example.net".to_string()])
    );
}

#[tokio::test]
async fn test_empty_host_names_become_wildcard() {
    let (dispatcher, _store) = setup();
    create_proxy_group(&dispatcher).await;
    dispatcher
        .dispatch(set(RequestType::ProxyGroupSetHostNames, "Proxy", vec!["a.example.net"]))
        .await;

    let response = dispatcher
        .dispatch(set(RequestType::ProxyGroupSetHostNames, "Proxy", Vec::<String>::new()))
        .await;

    assert!(response.is_success());
    assert_eq!(response.result().unwrap()["hostNames"], serde_json::json!([WILDCARD]));
}

#[tokio::test]
async fn test_set_base_requires_value_key() {
    let (dispatcher, _store) = setup();
    create_lobby(&dispatcher).await;

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ServerGroupSetBase, "lobby", Payload::new()))
        .await;

    assert_eq!(error_code(&response), Some(ErrorCode::MissingField.as_u32()));
}

#[tokio::test]
async fn test_delete_removes_and_persists() {
    let (dispatcher, store) = setup();
    create_proxy_group(&dispatcher).await;

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ProxyGroupDelete, "Proxy", Payload::new()))
        .await;

    assert!(response.is_success());
    assert_eq!(response.result().unwrap()["name"], "Proxy");
    assert!(dispatcher.state().find_proxy_group("Proxy").is_none());
    assert_eq!(store.proxy_saves(), 2);
    assert!(store.saved_proxy_groups().is_empty());
}

#[tokio::test]
async fn test_not_found_for_every_scoped_operation() {
    let (dispatcher, store) = setup();

    for request_type in RequestType::ALL {
        let expected = match request_type.target_kind() {
            TargetKind::General => continue,
            TargetKind::ProxyGroup => ErrorCode::ProxyGroupNotFound,
            TargetKind::ServerGroup => ErrorCode::ServerGroupNotFound,
            TargetKind::Server => ErrorCode::ServerNotFound,
            TargetKind::Proxy => ErrorCode::ProxyNotFound,
        };

        let response = dispatcher.dispatch(set(request_type, "ghost", 1)).await;
        let error = response.error().expect("error response");
        assert_eq!(error.code, expected.as_u32(), "{request_type}");
        assert_eq!(error.context, vec![Value::from("ghost")], "{request_type}");
    }

    assert_eq!(store.server_saves(), 0);
    assert_eq!(store.proxy_saves(), 0);
}

#[tokio::test]
async fn test_missing_target_is_missing_value() {
    let (dispatcher, _store) = setup();

    let response = dispatcher
        .dispatch(ApiRequest::new(
            RequestType::ProxyGroupSetRam,
            None,
            Payload::new().with("value", 512),
        ))
        .await;

    let error = response.error().unwrap();
    assert_eq!(error.code, ErrorCode::MissingValue.as_u32());
    assert_eq!(error.context, vec![Value::from("ProxyGroupName")]);
}

#[tokio::test]
async fn test_server_operations_reach_supervisor() {
    let (dispatcher, store) = setup();
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher
        .state()
        .register_server(Server::new("Lobby-1", "lobby", tx));

    let response = dispatcher
        .dispatch(set(RequestType::ServerExecuteCommand, "Lobby-1", "say hi"))
        .await;
    assert!(response.is_success());
    assert_eq!(rx.try_recv().unwrap(), InstanceCommand::Execute("say hi".into()));

    let response = dispatcher.dispatch(set(RequestType::ServerSetState, "Lobby-1", "INGAME")).await;
    assert_eq!(response.result().unwrap()["state"], "INGAME");

    let response = dispatcher.dispatch(set(RequestType::ServerSetExtra, "Lobby-1", "map=dust")).await;
    assert_eq!(response.result().unwrap()["extra"], "map=dust");

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ServerStop, "Lobby-1", Payload::new()))
        .await;
    assert!(response.is_success());
    assert_eq!(rx.try_recv().unwrap(), InstanceCommand::Stop);

    let server = dispatcher.state().find_server("Lobby-1").expect("stop does not unregister");
    assert_eq!(server.state(), "INGAME");
    assert_eq!(store.server_saves(), 0);
}

#[tokio::test]
async fn test_proxy_stop_is_forwarded() {
    let (dispatcher, _store) = setup();
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.state().register_proxy(Proxy::new("Proxy-1", "Proxy", tx));

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ProxyExecuteCommand, "Proxy-1", Payload::new()))
        .await;
    assert_eq!(error_code(&response), Some(ErrorCode::MissingValue.as_u32()));
    assert!(rx.try_recv().is_err());

    let response = dispatcher
        .dispatch(ApiRequest::targeted(RequestType::ProxyStop, "Proxy-1", Payload::new()))
        .await;
    assert!(response.is_success());
    assert_eq!(rx.try_recv().unwrap(), InstanceCommand::Stop);
}

#[derive(Debug)]
struct PanickingStore;

#[async_trait]
impl GroupStore for PanickingStore {
    async fn load_server_groups(&self) -> Result<Vec<ServerGroup>, StoreError> {
        Ok(Vec::new())
    }

    async fn load_proxy_groups(&self) -> Result<Vec<ProxyGroup>, StoreError> {
        Ok(Vec::new())
    }

    async fn save_server_groups(&self, _groups: &[ServerGroup]) -> Result<(), StoreError> {
        panic!("disk on fire");
    }

    async fn save_proxy_groups(&self, _groups: &[ProxyGroup]) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_panics_become_unknown_errors() {
    let dispatcher = RequestDispatcher::new(Arc::new(FleetState::new(Arc::new(PanickingStore))));

    let response = dispatcher
        .dispatch(ApiRequest::general(RequestType::CreateServerGroup, lobby_payload()))
        .await;

    let error = response.error().expect("error response");
    assert_eq!(error.code, ErrorCode::Unknown.as_u32());
    assert!(error.message.contains("disk on fire"));
    assert!(dispatcher.state().find_server_group("lobby").is_none());

    // The dispatcher keeps working after a panic.
    let response = dispatcher
        .dispatch(ApiRequest::general(
            RequestType::CreateProxyGroup,
            proxy_payload("RANDOM"),
        ))
        .await;
    assert!(response.is_success());
}

#[tokio::test]
async fn test_persistence_failure_is_reported() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;
    store.set_fail_saves(true);

    let response = dispatcher.dispatch(set(RequestType::ServerGroupSetRam, "lobby", 2048)).await;

    let error = response.error().unwrap();
    assert_eq!(error.code, ErrorCode::Unknown.as_u32());
    assert!(error.message.contains("failed to persist"));
    assert_eq!(dispatcher.state().find_server_group("lobby").unwrap().ram(), 512);
}

#[tokio::test]
async fn test_failed_save_leaves_fleet_unchanged() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;
    create_proxy_group(&dispatcher).await;
    let lobby = dispatcher.state().find_server_group("lobby").unwrap();
    let proxy = dispatcher.state().find_proxy_group("Proxy").unwrap();
    store.set_fail_saves(true);

    let arena = ApiRequest::general(RequestType::CreateServerGroup, lobby_payload().with("name", "arena"));
    let requests = [
        arena.clone(),
        ApiRequest::general(
            RequestType::CreateProxyGroup,
            proxy_payload("RANDOM").with("name", "Proxy-2"),
        ),
        set(RequestType::ServerGroupSetRam, "lobby", 2048),
        set(RequestType::ServerGroupSetSortOutStates, "lobby", vec!["INGAME"]),
        set(RequestType::ProxyGroupSetMotd, "Proxy", "Changed"),
        set(RequestType::ProxyGroupSetHostNames, "Proxy", vec!["play.example.net"]),
        ApiRequest::targeted(RequestType::ServerGroupDelete, "lobby", Payload::new()),
        ApiRequest::targeted(RequestType::ProxyGroupDelete, "Proxy", Payload::new()),
    ];
    for request in requests {
        let request_type = request.request_type;
        let response = dispatcher.dispatch(request).await;
        assert_eq!(error_code(&response), Some(ErrorCode::Unknown.as_u32()), "{request_type}");
    }

    let state = dispatcher.state();
    assert!(state.find_server_group("arena").is_none());
    assert!(state.find_proxy_group("Proxy-2").is_none());
    assert_eq!(state.find_server_group("lobby").unwrap(), lobby);
    assert_eq!(state.find_proxy_group("Proxy").unwrap(), proxy);

    // Once the store recovers the same create goes through.
    store.set_fail_saves(false);
    let response = dispatcher.dispatch(arena).await;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(store.saved_server_groups().len(), 2);
    assert_eq!(store.server_saves(), 2);
}

#[tokio::test]
async fn test_handle_message_decodes_and_dispatches() {
    let (dispatcher, _store) = setup();
    create_lobby(&dispatcher).await;

    let response = dispatcher
        .handle_message(r#"{"type":"SG_SET_RAM","target":"lobby","data":{"value":1024}}"#)
        .await;

    assert!(response.is_success());
    assert_eq!(response.request.as_ref().unwrap().request_type, RequestType::ServerGroupSetRam);
    assert_eq!(dispatcher.state().find_server_group("lobby").unwrap().ram(), 1024);
}

#[tokio::test]
async fn test_oversized_numbers_are_above_maximum() {
    let (dispatcher, _store) = setup();
    create_proxy_group(&dispatcher).await;

    for value in ["18446744073709551615", "9223372036854775808.0", "4294967296"] {
        let text = format!(r#"{{"type":"PG_SET_RAM","target":"Proxy","data":{{"value":{value}}}}}"#);
        let response = dispatcher.handle_message(&text).await;
        assert_eq!(error_code(&response), Some(ErrorCode::AboveMaximum.as_u32()), "{value}");
    }
    assert_eq!(dispatcher.state().find_proxy_group("Proxy").unwrap().ram(), 256);
}

#[tokio::test]
async fn test_handle_message_rejects_malformed_input() {
    let (dispatcher, _store) = setup();

    for text in ["not json", r#"{"type":"SG_EXPLODE"}"#, r#"{"target":"lobby"}"#, "[]"] {
        let response = dispatcher.handle_message(text).await;
        assert_eq!(error_code(&response), Some(ErrorCode::MalformedRequest.as_u32()), "{text}");
        assert!(response.request.is_none());
    }

    let stats = dispatcher.stats().snapshot();
    assert_eq!(stats.failures.get(&ErrorCode::MalformedRequest.as_u32()), Some(&4));
}

#[tokio::test]
async fn test_wrong_payload_type_is_invalid_type() {
    let (dispatcher, _store) = setup();
    create_proxy_group(&dispatcher).await;

    let response = dispatcher
        .handle_message(r#"{"type":"PG_SET_STATIC","target":"Proxy","data":{"value":"yes"}}"#)
        .await;

    let error = response.error().unwrap();
    assert_eq!(error.code, ErrorCode::InvalidType.as_u32());
    assert_eq!(error.context, vec![Value::from("Static"), Value::from("boolean")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_setters_are_serialized() {
    let (dispatcher, store) = setup();
    create_lobby(&dispatcher).await;

    let mut tasks = Vec::new();
    for ram in 1..=32i64 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher.dispatch(set(RequestType::ServerGroupSetRam, "lobby", ram)).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_success());
    }

    let ram = dispatcher.state().find_server_group("lobby").unwrap().ram();
    assert!((1..=32).contains(&ram));
    assert_eq!(store.server_saves(), 33);
    assert_eq!(dispatcher.stats().snapshot().successes, 33);
}

#[tokio::test]
async fn test_control_server_round_trip() {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    let (dispatcher, _store) = setup();
    let server = Arc::new(ControlServer::new(ControlConfig::default(), dispatcher));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let (mut socket, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    socket
        .send(Message::Text(
            r#"{"type":"SG_DELETE","target":"ghost"}"#.to_string().into(),
        ))
        .await
        .unwrap();

    let reply = socket.next().await.expect("reply frame").unwrap();
    let text = reply.into_text().unwrap();
    let response: ApiResponse = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(error_code(&response), Some(ErrorCode::ServerGroupNotFound.as_u32()));
    assert_eq!(response.request.unwrap().target.as_deref(), Some("ghost"));

    server.shutdown();
    serving.await.unwrap().unwrap();
}
