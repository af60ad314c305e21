//! End-to-end tests for the registration flow.

mod common;

use common::{clock, flow, phone, registered, AuthCall, MockAuthApi, PHONE};
use otp_flow::{
    AuthApiError, FlowKind, KeyValueStore, MemoryStore, RegisterOtpRequest, Step, UserSnapshot,
    UserType,
};

#[tokio::test(start_paused = true)]
async fn test_register_happy_path() {
    let api = MockAuthApi::new()
        .with_token("reg1")
        .with_validation(registered("علی رضایی"));
    let store = MemoryStore::new();
    let clock = clock();
    let mut flow = flow(FlowKind::Register, &api, &store, &clock);

    flow.submit_phone(PHONE).await;
    assert_eq!(flow.step(), Step::UserInfo);
    assert_eq!(api.calls(), vec![AuthCall::CheckPhone(PHONE.to_string())]);

    flow.submit_user_info("  علی رضایی ", UserType::Employer).await;
    assert_eq!(flow.step(), Step::CodeEntry);
    assert_eq!(
        api.calls()[1],
        AuthCall::IssueRegister(RegisterOtpRequest {
            phone: phone(),
            full_name: "علی رضایی".to_string(),
            user_type: UserType::Employer,
        })
    );
    let session = flow.sessions().peek(&phone()).unwrap().unwrap();
    assert_eq!(
        session.user_snapshot,
        Some(UserSnapshot::new("علی رضایی", UserType::Employer))
    );

    flow.enter_code("654321").await;
    assert_eq!(
        api.calls()[2],
        AuthCall::Validate {
            kind: FlowKind::Register,
            token: "reg1".to_string(),
            code: "654321".to_string(),
        }
    );
    assert_eq!(flow.step(), Step::Completed);
    assert_eq!(flow.sessions().peek(&phone()).unwrap(), None);
    assert!(store.get("userData").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_existing_phone_is_rejected_before_user_info() {
    let api = MockAuthApi::new().with_phone_exists(true);
    let store = MemoryStore::new();
    let clock = clock();
    let mut flow = flow(FlowKind::Register, &api, &store, &clock);

    flow.submit_phone(PHONE).await;

    assert_eq!(flow.step(), Step::PhoneEntry);
    assert_eq!(
        flow.errors().phone.as_deref(),
        Some("این شماره تلفن قبلاً ثبت شده است")
    );
    assert_eq!(api.issue_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_reported_at_issuance_returns_to_phone_entry() {
    let api = MockAuthApi::new().with_issue_error(AuthApiError::DuplicatePhone);
    let store = MemoryStore::new();
    let clock = clock();
    let mut flow = flow(FlowKind::Register, &api, &store, &clock);

    flow.submit_phone(PHONE).await;
    flow.submit_user_info("مریم احمدی", UserType::JobSeeker).await;

    assert_eq!(flow.step(), Step::PhoneEntry);
    assert!(flow.errors().phone.is_some());
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_full_name_is_a_field_error() {
    let api = MockAuthApi::new();
    let store = MemoryStore::new();
    let clock = clock();
    let mut flow = flow(FlowKind::Register, &api, &store, &clock);
    flow.submit_phone(PHONE).await;

    flow.submit_user_info("ab", UserType::JobSeeker).await;

    assert_eq!(flow.step(), Step::UserInfo);
    assert!(flow.errors().full_name.is_some());
    assert_eq!(api.issue_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reload_restores_user_snapshot() {
    let api = MockAuthApi::new();
    let store = MemoryStore::new();
    let clock = clock();
    {
        let mut first = flow(FlowKind::Register, &api, &store, &clock);
        first.submit_phone(PHONE).await;
        first.submit_user_info("مریم احمدی", UserType::Employer).await;
        first.unmount();
    }
    clock.advance(chrono::Duration::seconds(15));

    let mut flow = flow(FlowKind::Register, &api, &store, &clock);
    flow.mount(Some(PHONE)).await;

    assert_eq!(flow.step(), Step::CodeEntry);
    assert_eq!(flow.remaining(), 105);
    assert_eq!(flow.machine().full_name(), "مریم احمدی");
    assert_eq!(flow.machine().user_type(), UserType::Employer);
    assert_eq!(api.issue_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resubmitting_user_info_reuses_live_session() {
    let api = MockAuthApi::new();
    let store = MemoryStore::new();
    let clock = clock();
    let mut flow = flow(FlowKind::Register, &api, &store, &clock);
    flow.submit_phone(PHONE).await;
    flow.submit_user_info("مریم احمدی", UserType::JobSeeker).await;

    flow.back().await;
    assert_eq!(flow.step(), Step::UserInfo);

    flow.submit_user_info("مریم احمدی", UserType::JobSeeker).await;
    assert_eq!(flow.step(), Step::CodeEntry);
    assert_eq!(api.issue_count(), 1);
    assert_eq!(flow.machine().token(), Some("tok1"));
}

#[tokio::test(start_paused = true)]
async fn test_login_and_register_sessions_do_not_collide() {
    let api = MockAuthApi::new();
    let store = MemoryStore::new();
    let clock = clock();
    let mut login = flow(FlowKind::Login, &api, &store, &clock);
    login.submit_phone(PHONE).await;

    let mut register = flow(FlowKind::Register, &api, &store, &clock);
    register.mount(Some(PHONE)).await;

    assert_eq!(register.step(), Step::PhoneEntry);
    assert!(store.get("login_otp_timer_09123456789").unwrap().is_some());
    assert!(store.get("register_otp_timer_09123456789").unwrap().is_none());
}
