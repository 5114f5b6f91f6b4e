//! React-native surface of the manager over the in-process bridge.

use std::sync::{Arc, Mutex};

use auth_session::bridge::{NativeApiRequest, NativeAuthEvent, NativeAuthStatus};
use auth_session::store::TokenStoreType;
use auth_session::{
    AuthManager, FakeNativeBridge, LogoutRequest, NativeBridge, Platform, ProviderKind,
};

fn native_manager(bridge: Arc<FakeNativeBridge>) -> AuthManager {
    AuthManager::builder()
        .provider_type(ProviderKind::Fake)
        .native_bridge(bridge)
        .build()
        .unwrap()
}

#[tokio::test]
async fn native_oauth_flow_drives_the_session() {
    let bridge = Arc::new(FakeNativeBridge::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let manager = native_manager(bridge.clone());
    manager
        .native_bridge()
        .unwrap()
        .add_listener(Arc::new(move |event: &NativeAuthEvent| {
            sink.lock().unwrap().push(event.status);
        }));

    assert_eq!(manager.platform(), Platform::ReactNative);
    assert_eq!(manager.is_native_bridge_available().await.into_data(), Some(true));
    assert_eq!(manager.is_authenticated().await.into_data(), Some(false));

    let started = manager.start_native_oauth(ProviderKind::Kakao).await;
    assert_eq!(started.into_data(), Some(true));

    let session = manager.get_native_session_info().await.into_data().unwrap();
    assert!(session.is_logged_in);
    assert_eq!(session.user_profile.unwrap().provider, ProviderKind::Kakao);
    assert_eq!(manager.is_authenticated().await.into_data(), Some(true));

    let api = manager
        .call_native_api(NativeApiRequest::get("/api/profile"))
        .await
        .into_data()
        .unwrap();
    assert_eq!(api.body["data"]["path"], "/api/profile");

    assert!(manager.logout(LogoutRequest::new(ProviderKind::Kakao)).await.is_success());
    assert_eq!(manager.is_authenticated().await.into_data(), Some(false));

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            NativeAuthStatus::Started,
            NativeAuthStatus::Success,
            NativeAuthStatus::SignedOut
        ]
    );
}

#[tokio::test]
async fn native_api_call_without_session_is_an_auth_error() {
    let manager = native_manager(Arc::new(FakeNativeBridge::new()));
    let resp = manager
        .call_native_api(NativeApiRequest::get("/api/profile"))
        .await;
    assert_eq!(resp.error_code(), Some("AUTH_ERROR"));
    assert_eq!(resp.message(), "not signed in");

    let logout = manager.logout(LogoutRequest::new(ProviderKind::Kakao)).await;
    assert_eq!(logout.error_code(), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn unavailable_bridge_is_reported() {
    let manager = native_manager(Arc::new(FakeNativeBridge::unavailable()));
    assert_eq!(manager.is_native_bridge_available().await.into_data(), Some(false));
}

#[tokio::test]
async fn native_store_type_without_bridge_fails_to_build() {
    let err = AuthManager::builder()
        .provider_type(ProviderKind::Fake)
        .token_store_type(TokenStoreType::ReactNative)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("native bridge"));
}

#[tokio::test]
async fn native_surface_is_unavailable_on_app() {
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Fake)
        .platform(Platform::App)
        .build()
        .unwrap();
    let resp = manager.get_native_session_info().await;
    assert_eq!(resp.error_code(), Some("PLATFORM_UNAVAILABLE"));
    assert!(manager.native_bridge().is_none());
}
