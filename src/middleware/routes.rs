use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use url::Url;

use super::config::SessionAuthConfig;
use super::cookies::CookieCredentialStore;
use super::state::AuthState;
use crate::api::AuthBackend;
use crate::event::{AuthEvent, BusTransport, EventTransport, SessionEventBus, AUTH_CHANNEL};
use crate::flow::{self, CallbackParams, ProviderCallbackParams};

/// Create the authentication router.
///
/// Mounts `login`, `callback`, and `logout` under the configured auth path,
/// plus `popup` and `popup/callback` when a provider URL is configured.
pub fn auth_routes<B: AuthBackend>(
    config: SessionAuthConfig,
    backend: B,
    bus: SessionEventBus,
) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let state = AuthState {
        backend: Arc::new(backend),
        bus,
        oauth: Arc::new(config.oauth),
        settings: config.settings,
    };

    let mut router = Router::new()
        .route(&format!("{auth_path}/login"), get(login::<B>))
        .route(&format!("{auth_path}/callback"), get(callback::<B>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<B>).post(logout::<B>),
        );

    if state.settings.provider_url.is_some() {
        router = router
            .route(&format!("{auth_path}/popup"), get(popup::<B>))
            .route(
                &format!("{auth_path}/popup/callback"),
                get(popup_callback::<B>),
            );
    }

    router.with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    return_to: Option<String>,
}

async fn login<B: AuthBackend>(
    State(state): State<AuthState<B>>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> (CookieJar, Redirect) {
    let store = CookieCredentialStore::new(jar, &state.settings);
    let authorize_url = flow::begin_login(&state.oauth, &store, params.return_to.as_deref());
    (store.into_jar(), Redirect::to(authorize_url.as_str()))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<B: AuthBackend>(
    State(state): State<AuthState<B>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let store = CookieCredentialStore::new(jar, &state.settings);

    match flow::complete_login(state.backend.as_ref(), &store, params).await {
        Ok(success) => {
            tracing::info!(nick = %success.user.nick, "OAuth login successful");
            let redirect = Redirect::to(&success.redirect_to);
            (store.into_jar(), redirect)
        }
        Err(e) => {
            let redirect = login_error(&state.settings.error_redirect, e.code());
            (store.into_jar(), redirect)
        }
    }
}

// ── Popup handshake ────────────────────────────────────────────────

/// Neutral loading page the opener points the popup at, so the user never
/// sees a cross-origin flash. Forwards to the provider after a brief delay.
async fn popup<B: AuthBackend>(State(state): State<AuthState<B>>) -> Response {
    let Some(provider_url) = &state.settings.provider_url else {
        // Route is only registered when a provider is configured.
        return Redirect::to(&state.settings.error_redirect).into_response();
    };

    let callback_url = popup_callback_url(state.oauth.redirect_uri(), &state.settings.auth_path);
    let mut target = provider_url.clone();
    target
        .query_pairs_mut()
        .append_pair("callback", callback_url.as_str());

    Html(loading_page(&target)).into_response()
}

async fn popup_callback<B: AuthBackend>(
    State(state): State<AuthState<B>>,
    jar: CookieJar,
    Query(params): Query<ProviderCallbackParams>,
) -> (CookieJar, Html<String>) {
    let store = CookieCredentialStore::new(jar, &state.settings);
    let transports: [Arc<dyn EventTransport>; 1] =
        [Arc::new(BusTransport::new(state.bus.clone()))];

    let event =
        flow::complete_provider_callback(state.backend.as_ref(), &store, &transports, params)
            .await;

    let page = close_page(&event, state.settings.popup_grace_ms);
    (store.into_jar(), Html(page))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<B: AuthBackend>(
    State(state): State<AuthState<B>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let store = CookieCredentialStore::new(jar, &state.settings);
    flow::logout(&store);
    tracing::info!("logout");
    (store.into_jar(), Redirect::to(&state.settings.logout_redirect))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, code: &str) -> Redirect {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}"))
}

/// Same-site absolute URL of the popup callback, derived from the OAuth
/// redirect URI's origin.
fn popup_callback_url(redirect_uri: &Url, auth_path: &str) -> Url {
    let mut url = redirect_uri.clone();
    url.set_path(&format!("{auth_path}/popup/callback"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn loading_page(target: &Url) -> String {
    // JSON-encoding the URL makes it a safe JS string literal.
    let target = escape_json(target.as_str());
    format!(
        "<!doctype html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>Signing in</title></head>\n\
         <body>\n\
         <p>Connecting to your identity provider&hellip;</p>\n\
         <script>\n\
         setTimeout(function () {{ window.location.replace({target}); }}, 150);\n\
         </script>\n\
         </body>\n\
         </html>\n"
    )
}

/// Terminal popup page: relays the auth event to every open context, then
/// closes itself after the grace delay so delivery can finish.
///
/// Two browser-side transports back up the in-process bus: the broadcast
/// channel reaches every same-origin tab, and the direct opener message covers
/// environments without one.
fn close_page(event: &AuthEvent, grace_ms: u64) -> String {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| {
        r#"{"type":"AUTH_ERROR","error":"event serialization failed"}"#.to_string()
    });
    // `</script>` can never appear in the inlined JSON.
    let payload = payload.replace('<', "\\u003c");
    let channel = escape_json(AUTH_CHANNEL);

    format!(
        "<!doctype html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>Signing in</title></head>\n\
         <body>\n\
         <p>Finishing sign-in&hellip; you can close this window.</p>\n\
         <script>\n\
         (function () {{\n\
           var event = {payload};\n\
           try {{ new BroadcastChannel({channel}).postMessage(event); }} catch (err) {{}}\n\
           if (window.opener) {{\n\
             try {{ window.opener.postMessage(event, window.location.origin); }} catch (err) {{}}\n\
           }}\n\
           setTimeout(function () {{ window.close(); }}, {grace_ms});\n\
         }})();\n\
         </script>\n\
         </body>\n\
         </html>\n"
    )
}

fn escape_json(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::error::Error;
    use crate::flow::OAuthConfig;
    use crate::types::{AuthPayload, ProviderProfile, Role, SessionToken, User, UserId};

    struct MockBackend {
        exchange_calls: AtomicUsize,
    }

    impl MockBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                exchange_calls: AtomicUsize::new(0),
            })
        }
    }

    impl AuthBackend for Arc<MockBackend> {
        async fn exchange_code(&self, code: &str) -> Result<AuthPayload, Error> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if code == "good-code" {
                Ok(payload())
            } else {
                Err(Error::Api {
                    operation: "code exchange",
                    status: Some(400),
                    detail: "invalid code".into(),
                })
            }
        }

        async fn verify_session(&self, _token: &SessionToken) -> Result<User, Error> {
            Ok(payload().user)
        }

        async fn provider_login(&self, profile: &ProviderProfile) -> Result<AuthPayload, Error> {
            if profile.email == "a@b.com" {
                Ok(payload())
            } else {
                Err(Error::Api {
                    operation: "provider login",
                    status: Some(403),
                    detail: "account suspended".into(),
                })
            }
        }
    }

    fn payload() -> AuthPayload {
        AuthPayload {
            token: SessionToken("sess123".into()),
            user: User::new(UserId("u1".into()), "a", Role::member()),
        }
    }

    fn test_config() -> SessionAuthConfig {
        let oauth = OAuthConfig::new(
            "kamus-web",
            "https://kamus.example/auth/callback".parse().unwrap(),
        );
        SessionAuthConfig::new(oauth)
            .with_provider_url("https://id.partner.example/login".parse().unwrap())
            .with_secure_cookies(false)
    }

    fn app(backend: Arc<MockBackend>, bus: SessionEventBus) -> Router {
        auth_routes(test_config(), backend, bus)
    }

    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn location(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn login_sets_state_cookie_matching_redirect() {
        let response = app(MockBackend::new(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/login?return_to=/topic/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = location(&response);
        assert!(location.starts_with("https://id.kamus.example/oauth/authorize?"));
        assert!(location.contains("response_type=code"));

        let state_in_url = location
            .split("state=")
            .nth(1)
            .map(|rest| rest.split('&').next().unwrap().to_string())
            .unwrap();

        let cookies = set_cookies(&response);
        let state_cookie = cookies
            .iter()
            .find(|c| c.starts_with("__kamus_state="))
            .unwrap();
        assert!(state_cookie.contains(&state_in_url));
        assert!(cookies.iter().any(|c| c.starts_with("__kamus_return=")));
    }

    #[tokio::test]
    async fn callback_without_nonce_redirects_home_without_exchange() {
        let backend = MockBackend::new();
        let response = app(backend.clone(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/callback?state=bogus&code=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?error=state_mismatch");
        assert_eq!(backend.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_with_matching_nonce_sets_token_and_redirects_back() {
        let backend = MockBackend::new();
        let response = app(backend.clone(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/callback?state=n1&code=good-code")
                    .header(
                        header::COOKIE,
                        "__kamus_state=n1; __kamus_return=/topic/42",
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/topic/42");
        assert_eq!(backend.exchange_calls.load(Ordering::SeqCst), 1);

        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("kamus_token=sess123")));
        // Flow cookies are cleared on the way out.
        assert!(cookies.iter().any(|c| c.starts_with("__kamus_state=;")));
        assert!(cookies.iter().any(|c| c.starts_with("__kamus_return=;")));
    }

    #[tokio::test]
    async fn failed_exchange_redirects_with_error_code() {
        let response = app(MockBackend::new(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/callback?state=n1&code=bad-code")
                    .header(header::COOKIE, "__kamus_state=n1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(location(&response), "/?error=exchange_failed");
        let cookies = set_cookies(&response);
        assert!(!cookies.iter().any(|c| c.starts_with("kamus_token=sess")));
    }

    #[tokio::test]
    async fn popup_page_forwards_to_provider_with_callback_param() {
        let response = app(MockBackend::new(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/popup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("https://id.partner.example/login?callback="));
        assert!(body.contains("popup%2Fcallback") || body.contains("popup/callback"));
    }

    #[tokio::test]
    async fn popup_callback_stores_token_and_publishes_success() {
        let bus = SessionEventBus::new();
        let mut opener = bus.subscribe();

        let response = app(MockBackend::new(), bus)
            .oneshot(
                Request::builder()
                    .uri("/auth/popup/callback?email=a@b.com&name=A&token=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("kamus_token=sess123")));

        assert!(matches!(
            opener.recv().await.unwrap(),
            AuthEvent::Success { .. }
        ));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("AUTH_SUCCESS"));
        assert!(body.contains("kamus_auth"));
        assert!(body.contains("window.close()"));
    }

    #[tokio::test]
    async fn popup_callback_with_missing_params_publishes_error() {
        let bus = SessionEventBus::new();
        let mut opener = bus.subscribe();

        let response = app(MockBackend::new(), bus)
            .oneshot(
                Request::builder()
                    .uri("/auth/popup/callback?email=a@b.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(matches!(
            opener.recv().await.unwrap(),
            AuthEvent::Error { .. }
        ));
        let cookies = set_cookies(&response);
        assert!(!cookies.iter().any(|c| c.starts_with("kamus_token=sess")));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("AUTH_ERROR"));
    }

    #[tokio::test]
    async fn logout_clears_token_cookie() {
        let response = app(MockBackend::new(), SessionEventBus::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .header(header::COOKIE, "kamus_token=sess123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("kamus_token=;")));
    }

    #[test]
    fn close_page_escapes_script_breakouts() {
        let event = AuthEvent::Error {
            error: "</script><script>alert(1)".into(),
        };
        let page = close_page(&event, 400);
        assert!(!page.contains("</script><script>alert"));
        assert!(page.contains("\\u003c/script"));
    }

    #[test]
    fn popup_callback_url_derives_from_redirect_uri() {
        let url = popup_callback_url(
            &"https://kamus.example/auth/callback".parse().unwrap(),
            "/auth",
        );
        assert_eq!(url.as_str(), "https://kamus.example/auth/popup/callback");
    }
}
