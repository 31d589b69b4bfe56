use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::{error, info, warn};

use super::AppState;
use crate::health::recovery::KeepaliveError;
use crate::health::{probe, report};

type JsonResponse = (StatusCode, Json<Value>);

/// `GET /api/diagnose-vite`
pub(super) async fn diagnose_vite(State(state): State<AppState>) -> JsonResponse {
    let Some(sandbox) = state.registry.get() else {
        return (
            StatusCode::NOT_FOUND,
            Json(report::no_sandbox_diagnostics_body()),
        );
    };

    let diagnostics = probe::diagnose(sandbox.as_ref(), state.command_timeout()).await;
    match report::diagnostics_body(&diagnostics) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => internal_error(&e.to_string()),
    }
}

/// `POST /api/sandbox-keepalive`
pub(super) async fn sandbox_keepalive(State(state): State<AppState>) -> JsonResponse {
    let Some(sandbox) = state.registry.get() else {
        return (
            StatusCode::NOT_FOUND,
            Json(report::no_sandbox_keepalive_body()),
        );
    };

    match state.controller.keepalive(sandbox.as_ref()).await {
        Ok(outcome) => {
            info!(
                "Keepalive for {}: {} (dev server running: {})",
                outcome.sandbox_id, outcome.message, outcome.vite_running
            );
            match report::keepalive_body(&outcome) {
                Ok(body) => (StatusCode::OK, Json(body)),
                Err(e) => internal_error(&e.to_string()),
            }
        }
        Err(e) => {
            let status = match &e {
                KeepaliveError::MetadataUnavailable => StatusCode::OK,
                KeepaliveError::Health(_) if e.should_recreate() => StatusCode::GONE,
                KeepaliveError::Health(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            warn!("Keepalive failed ({}): {}", status, e);
            (status, Json(report::keepalive_failure_body(&e)))
        }
    }
}

fn internal_error(message: &str) -> JsonResponse {
    error!("Failed to build response: {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(report::internal_error_body(message)),
    )
}

#[cfg(test)]
mod tests {
    use crate::config::RecoveryConfig;
    use crate::health::recovery::RecoveryController;
    use crate::sandbox::scripted::{Reply, ScriptedSandbox};
    use crate::sandbox::{CommandOutput, Sandbox, SandboxError, SandboxInfo, SessionRegistry};
    use crate::server::{build_router, AppState, DIAGNOSE_PATH, KEEPALIVE_PATH};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct PanickingSandbox;

    #[async_trait]
    impl Sandbox for PanickingSandbox {
        fn info(&self) -> Result<Option<SandboxInfo>, SandboxError> {
            panic!("metadata lookup exploded");
        }

        async fn run_command(&self, _command: &str) -> Result<CommandOutput, SandboxError> {
            panic!("exec exploded");
        }
    }

    /// Serves the app on an ephemeral port and returns its base URL.
    async fn spawn(registry: SessionRegistry) -> String {
        let controller = RecoveryController::new(RecoveryConfig::immediate()).unwrap();
        let app = build_router(AppState::new(registry, controller));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    async fn spawn_with(sandbox: impl Sandbox + 'static) -> String {
        let registry = SessionRegistry::new();
        registry.register(Arc::new(sandbox));
        spawn(registry).await
    }

    async fn get(url: String) -> (u16, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn post(url: String) -> (u16, Value) {
        let response = reqwest::Client::new().post(url).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_no_active_sandbox() {
        let base = spawn(SessionRegistry::new()).await;

        let (status, body) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(status, 404);
        assert_eq!(body, json!({"success": false, "error": "No active sandbox"}));

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 404);
        assert_eq!(
            body,
            json!({"success": false, "message": "No active sandbox to keep alive"})
        );
    }

    #[tokio::test]
    async fn test_cleared_session_is_not_found() {
        let registry = SessionRegistry::new();
        registry.register(Arc::new(ScriptedSandbox::named("sbx")));
        let base = spawn(registry.clone()).await;
        registry.clear();

        let (status, _) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_diagnostics_payload() {
        let sandbox = ScriptedSandbox::named("sbx")
            .on("pgrep", [Reply::out("not_running\n")])
            .on("lsof", [Reply::out("port_free\n")])
            .on("test -f", [Reply::out("exists\n")])
            .on("cat ", [Reply::out(r#"{"devDependencies": {"vite": "^5"}}"#)])
            .on("test -d", [Reply::out("exists\n")])
            .on("df -h", [Reply::out("overlay 20G 4G 16G 20% /\n")]);
        let base = spawn_with(sandbox).await;

        let (status, body) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);

        let diagnostics = &body["diagnostics"];
        assert!(diagnostics["timestamp"].is_string());
        assert_eq!(
            diagnostics["checks"]["viteProcess"],
            json!({"running": false, "pid": null})
        );
        assert_eq!(diagnostics["checks"]["port5173"]["inUse"], false);
        assert_eq!(diagnostics["checks"]["packageJsonContent"]["hasVite"], true);
        assert_eq!(diagnostics["checks"]["packageJsonContent"]["hasReact"], false);
        assert_eq!(
            diagnostics["recommendations"],
            json!(["Vite process is not running. Use /api/sandbox-keepalive to restart it."])
        );
    }

    #[tokio::test]
    async fn test_diagnostics_reports_probe_errors() {
        let sandbox = ScriptedSandbox::named("sbx").on("df -h", [Reply::error("exec failed")]);
        let base = spawn_with(sandbox).await;

        let (status, body) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(status, 200);
        assert_eq!(
            body["diagnostics"]["checks"]["diskSpace"],
            json!({"error": "exec failed"})
        );
        assert!(body["diagnostics"]["checks"]["packageJsonContent"].is_null());
    }

    #[tokio::test]
    async fn test_keepalive_healthy() {
        let sandbox = ScriptedSandbox::named("sbx-7").on("pgrep", [Reply::out("4242\n")]);
        let base = spawn_with(sandbox).await;

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["sandboxId"], "sbx-7");
        assert_eq!(body["viteRunning"], true);
        assert!(body["timestamp"].is_string());
        assert!(body.get("shouldRecreate").is_none());
    }

    #[tokio::test]
    async fn test_keepalive_exhausted_restart_is_still_success() {
        let sandbox = ScriptedSandbox::named("sbx")
            .on("pgrep", [Reply::out("not_running\n"), Reply::out("4242\n")])
            .on("tail -n 20", [Reply::out("> vite\n")]);
        let base = spawn_with(sandbox).await;

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["viteRunning"], false);
        assert_eq!(body["shouldRecreate"], false);
        assert_eq!(body["attempts"], 10);
    }

    #[tokio::test]
    async fn test_keepalive_metadata_unavailable() {
        let base = spawn_with(ScriptedSandbox::named("sbx").without_info()).await;

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Sandbox info unavailable",
                "shouldRecreate": false
            })
        );
    }

    #[tokio::test]
    async fn test_keepalive_transient_failure() {
        let sandbox = ScriptedSandbox::named("sbx").on("pgrep", [Reply::error("connection reset")]);
        let base = spawn_with(sandbox).await;

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 503);
        assert_eq!(body["message"], "Sandbox health check failed");
        assert_eq!(body["error"], "connection reset");
        assert_eq!(body["shouldRecreate"], false);
    }

    #[tokio::test]
    async fn test_keepalive_terminated_sandbox() {
        let base = spawn_with(ScriptedSandbox::named("sbx").with_info_error("Sandbox terminated"))
            .await;

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 410);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Sandbox unhealthy",
                "error": "Sandbox terminated",
                "shouldRecreate": true
            })
        );
    }

    #[tokio::test]
    async fn test_panics_become_internal_errors() {
        let base = spawn_with(PanickingSandbox).await;

        let (status, body) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(status, 500);
        assert_eq!(body, json!({"success": false, "error": "exec exploded"}));

        let (status, body) = post(format!("{base}{KEEPALIVE_PATH}")).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "metadata lookup exploded");
    }

    #[tokio::test]
    async fn test_diagnostics_is_repeatable() {
        let sandbox = ScriptedSandbox::named("sbx")
            .on("pgrep", [Reply::out("1234\n")])
            .on("test -f", [Reply::out("missing\n")]);
        let base = spawn_with(sandbox).await;

        let (_, first) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        let (_, second) = get(format!("{base}{DIAGNOSE_PATH}")).await;
        assert_eq!(first["diagnostics"]["checks"], second["diagnostics"]["checks"]);
        assert_eq!(
            first["diagnostics"]["recommendations"],
            second["diagnostics"]["recommendations"]
        );
    }
}
