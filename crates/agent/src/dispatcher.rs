//! Tool dispatch: validate, fan out, fan in.
//!
//! Every request gets exactly one result, returned in request order. A
//! request naming an unknown tool or failing schema validation becomes a
//! failed result without touching its siblings; valid requests run
//! concurrently under a per-call timeout. No error crosses this boundary —
//! the reasoner sees failures as data.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use macrosage_core::error::{ToolError, UpstreamError};
use macrosage_core::tool::{Tool, ToolRegistry, ToolRequest, ToolResult};
use tracing::{debug, warn};

/// The outcome of dispatching one batch.
pub struct DispatchReport {
    /// One result per request, in request order
    pub results: Vec<ToolResult>,

    /// Names of tools that actually executed (passed validation), deduped,
    /// in first-use order. Upstream failures still count as dispatched.
    pub dispatched: Vec<String>,
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch a whole batch. The batch always runs to completion.
    pub async fn dispatch(&self, requests: &[ToolRequest]) -> DispatchReport {
        // Resolve and validate everything up front so invalid requests fail
        // fast without holding up the executable ones.
        let mut slots: Vec<Result<Arc<dyn Tool>, ToolResult>> = Vec::with_capacity(requests.len());
        let mut dispatched = Vec::new();

        for request in requests {
            match self.registry.get(&request.name) {
                None => {
                    warn!(tool = %request.name, "Requested tool is not registered");
                    slots.push(Err(ToolResult::fail(
                        &request.id,
                        &request.name,
                        &ToolError::NotFound(request.name.clone()),
                    )));
                }
                Some(tool) => match tool.spec().validate(&request.arguments) {
                    Err(e) => {
                        warn!(tool = %request.name, error = %e, "Tool arguments failed validation");
                        slots.push(Err(ToolResult::fail(&request.id, &request.name, &e)));
                    }
                    Ok(()) => {
                        if !dispatched.iter().any(|d| d == &request.name) {
                            dispatched.push(request.name.clone());
                        }
                        slots.push(Ok(tool));
                    }
                },
            }
        }

        let futures = requests.iter().zip(slots).map(|(request, slot)| {
            let timeout = self.call_timeout;
            async move {
                let tool = match slot {
                    Err(result) => return result,
                    Ok(tool) => tool,
                };

                let start = std::time::Instant::now();
                let outcome =
                    tokio::time::timeout(timeout, tool.execute(request.arguments.clone())).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(Ok(payload)) => {
                        debug!(tool = %request.name, duration_ms, "Tool executed");
                        ToolResult::ok(&request.id, &request.name, payload)
                    }
                    Ok(Err(e)) => {
                        warn!(tool = %request.name, duration_ms, error = %e, "Tool failed");
                        ToolResult::fail(&request.id, &request.name, &e)
                    }
                    Err(_) => {
                        warn!(tool = %request.name, duration_ms, "Tool call timed out");
                        ToolResult::fail(
                            &request.id,
                            &request.name,
                            &ToolError::Upstream(UpstreamError::Timeout {
                                timeout_secs: timeout.as_secs(),
                            }),
                        )
                    }
                }
            }
        });

        DispatchReport {
            results: join_all(futures).await,
            dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use macrosage_core::tool::{ParamKind, ParamSpec, ToolSpec};
    use serde_json::{Value, json};

    struct StaticTool {
        name: &'static str,
        payload: Value,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                self.name,
                "static test tool",
                vec![ParamSpec::optional("q", ParamKind::String, "")],
            )
        }
        async fn execute(&self, _: Value) -> Result<Value, ToolError> {
            Ok(self.payload.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("failing", "always fails", vec![])
        }
        async fn execute(&self, _: Value) -> Result<Value, ToolError> {
            Err(ToolError::Upstream(UpstreamError::RateLimited))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("slow", "sleeps forever", vec![])
        }
        async fn execute(&self, _: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(StaticTool {
            name: "alpha",
            payload: json!({"v": 1}),
        }));
        r.register(Arc::new(StaticTool {
            name: "beta",
            payload: json!({"v": 2}),
        }));
        r.register(Arc::new(FailingTool));
        r.register(Arc::new(SlowTool));
        Arc::new(r)
    }

    fn request(id: &str, name: &str, arguments: Value) -> ToolRequest {
        ToolRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn results_match_request_order() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_secs(5));
        let report = dispatcher
            .dispatch(&[
                request("r1", "beta", json!({})),
                request("r2", "alpha", json!({})),
            ])
            .await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].request_id, "r1");
        assert_eq!(report.results[0].payload["v"], 2);
        assert_eq!(report.results[1].request_id, "r2");
        assert_eq!(report.results[1].payload["v"], 1);
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_aborting_siblings() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_secs(5));
        let report = dispatcher
            .dispatch(&[
                request("r1", "nonexistent", json!({})),
                request("r2", "alpha", json!({})),
            ])
            .await;

        assert!(!report.results[0].success);
        assert_eq!(report.results[0].payload["error"]["kind"], "tool_not_found");
        assert!(report.results[1].success);
        assert_eq!(report.dispatched, vec!["alpha"]);
    }

    #[tokio::test]
    async fn invalid_arguments_fail_validation() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_secs(5));
        let report = dispatcher
            .dispatch(&[request("r1", "alpha", json!({"q": 42}))])
            .await;

        assert!(!report.results[0].success);
        assert_eq!(
            report.results[0].payload["error"]["kind"],
            "invalid_arguments"
        );
        assert!(report.dispatched.is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_becomes_failed_result_and_counts_as_dispatched() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_secs(5));
        let report = dispatcher.dispatch(&[request("r1", "failing", json!({}))]).await;

        assert!(!report.results[0].success);
        assert_eq!(report.results[0].payload["error"]["kind"], "rate_limited");
        assert_eq!(report.dispatched, vec!["failing"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_millis(100));
        let report = dispatcher.dispatch(&[request("r1", "slow", json!({}))]).await;

        assert!(!report.results[0].success);
        assert_eq!(report.results[0].payload["error"]["kind"], "timeout");
    }

    #[tokio::test]
    async fn dispatched_names_dedupe() {
        let dispatcher = ToolDispatcher::new(registry(), Duration::from_secs(5));
        let report = dispatcher
            .dispatch(&[
                request("r1", "alpha", json!({})),
                request("r2", "alpha", json!({})),
                request("r3", "beta", json!({})),
            ])
            .await;

        assert_eq!(report.dispatched, vec!["alpha", "beta"]);
        assert_eq!(report.results.len(), 3);
    }
}
