//! End-to-end tests: full router, real child processes, fake obfuscator.
//!
//! The fake tool is a shell script saved as `cli.lua` and launched through
//! `sh`, so it receives the same argument list the real interpreter would:
//! `$1=--preset $2=<profile> $3=--out $4=<output> $5=<input>`.
#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use luaguard_core::InputLimits;
use luaguard_server::{AppConfig, NetworkConfig, NetworkModule, ToolConfig, WorkspaceConfig};
use tempfile::TempDir;
use tower::ServiceExt;

/// Copies the input to the output, except for a few trigger sources.
const FAKE_TOOL: &str = r#"
case "$(cat "$5")" in
  fail) printf 'parse error' >&2; exit 1 ;;
  "while true do end") echo $$ > "$PWD/pid"; exec sleep 30 ;;
  slow) sleep 0.3 ;;
  binary) printf 'a\377\376b' > "$4"; exit 0 ;;
  flood) head -c 8388608 /dev/zero | tr '\0' 'e' >&2; exit 1 ;;
esac
cp "$5" "$4"
"#;

struct Harness {
    router: Router,
    tool_dir: TempDir,
    workspace_root: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with(|_| {})
    }

    fn with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let tool_dir = tempfile::tempdir().unwrap();
        std::fs::write(tool_dir.path().join("cli.lua"), FAKE_TOOL).unwrap();
        let workspace_root = tempfile::tempdir().unwrap();

        let mut config = AppConfig {
            network: NetworkConfig::default(),
            limits: InputLimits::default(),
            tool: ToolConfig {
                working_dir: tool_dir.path().to_path_buf(),
                executable: "sh".to_string(),
                script: "./cli.lua".to_string(),
                timeout: Duration::from_millis(500),
                max_output_bytes: 1 << 20,
            },
            workspace: WorkspaceConfig {
                root: workspace_root.path().to_path_buf(),
                prefix: "luaguard-".to_string(),
            },
            max_concurrent_jobs: None,
        };
        customize(&mut config);

        let router = NetworkModule::new(config).build_router();
        Self {
            router,
            tool_dir,
            workspace_root,
        }
    }

    async fn post(&self, uri: &str, content_type: &str, body: impl Into<Body>) -> (StatusCode, String) {
        let (status, bytes) = self.post_raw(uri, content_type, body).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn post_raw(
        &self,
        uri: &str,
        content_type: &str,
        body: impl Into<Body>,
    ) -> (StatusCode, Vec<u8>) {
        let request = Request::post(uri)
            .header("content-type", content_type)
            .body(body.into())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn workspaces_left(&self) -> usize {
        count_entries(self.workspace_root.path())
    }
}

fn count_entries(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}

#[tokio::test]
async fn text_source_is_transformed() {
    let h = Harness::new();

    let (status, body) = h.post("/obfuscate?profile=Minify", "text/plain", "print('x')").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "print('x')");
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn json_source_is_transformed() {
    let h = Harness::new();

    let (status, body) = h
        .post(
            "/obfuscate",
            "application/json",
            r#"{"code":"local t = {1, 2}\nreturn t","profile":"Weak"}"#,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "local t = {1, 2}\nreturn t");
}

#[tokio::test]
async fn empty_source_without_profile_is_400() {
    let h = Harness::new();

    let (status, body) = h.post("/obfuscate", "text/plain", "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("text"), "{body}");
    assert!(body.contains(r#"{"code": "..."}"#), "{body}");
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let h = Harness::new();

    let (status, _) = h.post("/obfuscate", "application/json", "{\"code\":").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_source_is_413() {
    let h = Harness::with(|config| {
        config.network.max_body_bytes = 1 << 20;
    });

    let (status, body) = h.post("/obfuscate", "text/plain", "x".repeat(250_001)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body.contains("200000"), "{body}");
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn body_over_transport_limit_is_413() {
    let h = Harness::new();

    let (status, _) = h.post("/obfuscate", "text/plain", "x".repeat(300 * 1024)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unknown_profile_is_400_and_lists_profiles() {
    let h = Harness::new();

    let (status, body) = h.post("/obfuscate?profile=Ultra", "text/plain", "x").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Minify, Weak, Vmify, Medium, Strong"), "{body}");
}

#[tokio::test]
async fn tool_failure_is_500_with_stderr() {
    let h = Harness::new();

    let (status, body) = h.post("/obfuscate?profile=Strong", "text/plain", "fail").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "parse error");
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn output_is_returned_byte_for_byte() {
    let h = Harness::new();

    let (status, body) = h.post_raw("/obfuscate", "text/plain", "binary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, [b'a', 0xff, 0xfe, b'b']);
}

#[tokio::test]
async fn flooding_tool_gets_a_bounded_500() {
    let h = Harness::with(|config| {
        config.tool.max_output_bytes = 1024;
        config.tool.timeout = Duration::from_secs(20);
    });

    let (status, body) = h.post("/obfuscate", "text/plain", "flood").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.len(), 1024);
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn runaway_tool_is_killed_and_reported() {
    let h = Harness::new();

    let (status, body) = h
        .post("/obfuscate?profile=Medium", "text/plain", "while true do end")
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("timed out"), "{body}");
    assert_eq!(h.workspaces_left(), 0);

    let pid = std::fs::read_to_string(h.tool_dir.path().join("pid")).unwrap();
    let alive = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.trim())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!alive.success(), "tool process still running");
}

#[tokio::test]
async fn missing_interpreter_is_500() {
    let h = Harness::with(|config| {
        config.tool.executable = "luaguard-no-such-interpreter".to_string();
    });

    let (status, body) = h.post("/obfuscate", "text/plain", "print(1)").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("Failed to start transformer"), "{body}");
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let h = Harness::new();

    let mut set = tokio::task::JoinSet::new();
    for i in 0..8 {
        let router = h.router.clone();
        set.spawn(async move {
            let source = format!("return {i}");
            let request = Request::post("/obfuscate")
                .header("content-type", "text/plain")
                .body(Body::from(source.clone()))
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (source, status, String::from_utf8_lossy(&bytes).into_owned())
        });
    }

    while let Some(joined) = set.join_next().await {
        let (source, status, body) = joined.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, source);
    }
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn admission_limit_sheds_with_503() {
    let h = Harness::with(|config| {
        config.max_concurrent_jobs = Some(1);
    });

    let (first, second) = tokio::join!(
        h.post("/obfuscate", "text/plain", "slow"),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.post("/obfuscate", "text/plain", "print(2)").await
        }
    );

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(h.workspaces_left(), 0);
}

#[tokio::test]
async fn root_serves_usage() {
    let h = Harness::new();
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
