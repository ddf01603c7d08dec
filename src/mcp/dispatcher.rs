//! Tool dispatch: validate, connect, execute, report.
//!
//! [`GatewayDispatcher`] owns the process-wide state (policy tables, connection
//! settings, transport) and turns every tool invocation into a
//! [`ToolResponse`]. Failures never escape as `Err`; each one becomes an
//! `isError` response so the MCP session stays usable.
//!
//! The order inside `run_command` is fixed: the policy engine decides first and
//! a denied command never reaches the transport. Every accepted command opens
//! its own session, which is closed before the response is produced.
//!
//! At most `max_concurrent_sessions` sessions are open at once. A call that
//! cannot get a slot within the connect timeout fails instead of queueing.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::mcp::client::SshTransport;
use crate::mcp::config::{ConfigError, ConnectionConfig, GatewaySettings};
use crate::mcp::error::GatewayError;
use crate::mcp::message::{ExecutionReportBuilder, PolicyListingBuilder, truncate_command};
use crate::mcp::policy::{PolicyEngine, PolicyTables};
use crate::mcp::transport::{Transport, TransportSession};
use crate::mcp::types::{ExecutionResult, ToolResponse};

pub const RUN_COMMAND_TOOL: &str = "run_command";
pub const LIST_ALLOWED_COMMANDS_TOOL: &str = "list_allowed_commands";

/// Maximum command length shown in log lines.
const LOGGED_COMMAND_LEN: usize = 120;

/// Routes tool invocations and enforces policy before any remote activity.
pub struct GatewayDispatcher {
    policy: Arc<PolicyEngine>,
    connection: Arc<ConnectionConfig>,
    transport: Arc<dyn Transport>,
    settings: GatewaySettings,
    sessions: Semaphore,
}

impl GatewayDispatcher {
    pub fn new(
        policy: Arc<PolicyEngine>,
        connection: Arc<ConnectionConfig>,
        transport: Arc<dyn Transport>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            policy,
            connection,
            transport,
            sessions: Semaphore::new(settings.max_concurrent_sessions.max(1)),
            settings,
        }
    }

    /// Build a dispatcher backed by real SSH from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tables = PolicyTables::load()?;
        let connection = ConnectionConfig::from_env()?;
        let settings = GatewaySettings::from_env();

        info!(
            "Gateway targets {}@{} ({} allowed prefixes, {} blocked patterns)",
            connection.username,
            connection.address(),
            tables.allowed_commands.len(),
            tables.blocked_patterns.len()
        );

        Ok(Self::new(
            Arc::new(PolicyEngine::new(Arc::new(tables))),
            Arc::new(connection),
            Arc::new(SshTransport),
            settings,
        ))
    }

    /// Generic entry point keyed by tool name.
    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> ToolResponse {
        match name {
            RUN_COMMAND_TOOL => match args.get("command") {
                Some(Value::String(command)) => self.run_command(command).await,
                Some(_) => error_response(GatewayError::InvalidArguments(
                    "'command' must be a string".to_string(),
                )),
                None => error_response(GatewayError::InvalidArguments(
                    "missing required argument 'command'".to_string(),
                )),
            },
            LIST_ALLOWED_COMMANDS_TOOL => self.list_allowed_commands(),
            other => {
                warn!("Rejected call to unknown tool '{}'", other);
                error_response(GatewayError::UnknownTool(other.to_string()))
            }
        }
    }

    /// Validate and, if allowed, execute `command` on the configured host.
    pub async fn run_command(&self, command: &str) -> ToolResponse {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("run_command", %invocation_id);
        self.run_command_inner(command).instrument(span).await
    }

    async fn run_command_inner(&self, command: &str) -> ToolResponse {
        let shown = truncate_command(command, LOGGED_COMMAND_LEN);
        let decision = self.policy.validate(command);

        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "command rejected".to_string());
            warn!(command = %shown.escape_debug(), "Denied: {}", reason);
            return error_response(GatewayError::PolicyViolation(reason));
        }

        info!(
            command = %shown.escape_debug(),
            prefix = decision.matched_prefix.as_deref().unwrap_or_default(),
            "Allowed"
        );

        // Sessions can be held indefinitely (`tail -f`), so waiting is bounded
        let wait = self.connection.connect_timeout;
        let _permit = match tokio::time::timeout(wait, self.sessions.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return error_response(GatewayError::Execution(
                    "session limiter is closed".to_string(),
                ));
            }
            Err(_) => {
                let e = GatewayError::Connection(format!(
                    "too many concurrent sessions (all {} busy for {:?})",
                    self.settings.max_concurrent_sessions, wait
                ));
                warn!("Command not started: {}", e);
                return ToolResponse::error(format!("SSH Error: {}", e));
            }
        };

        match self.execute(command).await {
            Ok(result) => {
                info!(
                    exit_code = result.exit_code,
                    signal = result.signal.as_deref().unwrap_or_default(),
                    stdout_bytes = result.stdout.len(),
                    stderr_bytes = result.stderr.len(),
                    "Command finished"
                );
                ToolResponse::text(
                    ExecutionReportBuilder::new(&result)
                        .with_output_limit(self.settings.max_output_bytes)
                        .build(),
                )
            }
            Err(e) => {
                error!("Command failed: {}", e);
                ToolResponse::error(format!("SSH Error: {}", e))
            }
        }
    }

    async fn execute(&self, command: &str) -> Result<ExecutionResult, GatewayError> {
        let session = TransportSession::connect(
            self.transport.as_ref(),
            &self.connection,
            self.settings.max_output_bytes,
        )
        .await?;
        debug!("Session established");
        session.execute(command).await
    }

    /// Describe the active policy. Never touches the network.
    pub fn list_allowed_commands(&self) -> ToolResponse {
        ToolResponse::text(PolicyListingBuilder::new(self.policy.tables()).build())
    }
}

fn error_response(err: GatewayError) -> ToolResponse {
    if err.is_pre_network() {
        debug!("Rejected without connecting: {}", err);
    }
    ToolResponse::error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::OutputEvent;
    use crate::mcp::transport::testing::{MockTransport, Script, test_config};
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher_with(mock: MockTransport) -> (GatewayDispatcher, Arc<MockTransport>) {
        dispatcher_with_settings(mock, GatewaySettings::default())
    }

    fn dispatcher_with_settings(
        mock: MockTransport,
        settings: GatewaySettings,
    ) -> (GatewayDispatcher, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        let dispatcher = GatewayDispatcher::new(
            Arc::new(PolicyEngine::new(Arc::new(PolicyTables::default()))),
            Arc::new(test_config()),
            mock.clone(),
            settings,
        );
        (dispatcher, mock)
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn ok_events() -> Vec<OutputEvent> {
        vec![
            OutputEvent::Stdout(b"CONTAINER ID\n".to_vec()),
            OutputEvent::Closed {
                exit_code: Some(0),
                signal: None,
            },
        ]
    }

    mod policy_gate {
        use super::*;

        #[tokio::test]
        async fn test_denied_command_never_connects() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.run_command("rm -rf /").await;

            assert!(response.is_error);
            assert!(response.joined_text().starts_with("Security Block: "));
            assert!(response.joined_text().contains("not in allow-list"));
            assert_eq!(mock.log.connects(), 0);
        }

        #[tokio::test]
        async fn test_chained_command_reports_blocked_pattern() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.run_command("ls; rm -rf /").await;

            assert!(response.is_error);
            assert!(response.joined_text().contains("blocked pattern"));
            assert_eq!(mock.log.connects(), 0);
        }

        #[tokio::test]
        async fn test_empty_command_never_connects() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.run_command("   ").await;

            assert!(response.is_error);
            assert_eq!(mock.log.connects(), 0);
        }

        #[tokio::test]
        async fn test_allowed_command_reaches_transport_verbatim() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.run_command("docker ps -a").await;

            assert!(!response.is_error);
            assert_eq!(mock.log.connects(), 1);
            assert_eq!(
                *mock.log.commands.lock().unwrap(),
                vec!["docker ps -a".to_string()]
            );
        }
    }

    mod execution {
        use super::*;

        #[tokio::test]
        async fn test_successful_run_reports_output_and_closes() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.run_command("docker ps").await;
            let text = response.joined_text();

            assert!(!response.is_error);
            assert!(text.contains("Output:\nCONTAINER ID"));
            assert!(text.contains("Errors:\n(none)"));
            assert!(text.contains("Exit code: 0"));
            assert_eq!(mock.log.closes(), 1);
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_not_an_error_response() {
            let (dispatcher, _mock) = dispatcher_with(MockTransport::events(vec![
                OutputEvent::Stderr(b"cat: /nope: No such file or directory\n".to_vec()),
                OutputEvent::Closed {
                    exit_code: Some(1),
                    signal: None,
                },
            ]));

            let response = dispatcher.run_command("cat /nope").await;
            let text = response.joined_text();

            assert!(!response.is_error);
            assert!(text.contains("No such file or directory"));
            assert!(text.contains("Exit code: 1"));
        }

        #[tokio::test]
        async fn test_connection_failure_is_error_without_exec() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::new(Script::ConnectFails(
                "host unreachable".to_string(),
            )));

            let response = dispatcher.run_command("uptime").await;

            assert!(response.is_error);
            assert!(response.joined_text().starts_with("SSH Error: "));
            assert!(response.joined_text().contains("host unreachable"));
            assert_eq!(mock.log.execs(), 0);
            assert_eq!(mock.log.closes(), 0);
        }

        #[tokio::test]
        async fn test_exec_failure_closes_session() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::new(Script::ExecFails(
                "channel refused".to_string(),
            )));

            let response = dispatcher.run_command("uptime").await;

            assert!(response.is_error);
            assert!(response.joined_text().contains("channel refused"));
            assert_eq!(mock.log.closes(), 1);
        }

        #[tokio::test]
        async fn test_each_call_opens_a_fresh_session() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            dispatcher.run_command("pwd").await;
            dispatcher.run_command("whoami").await;

            assert_eq!(mock.log.connects(), 2);
            assert_eq!(mock.log.closes(), 2);
        }

        #[tokio::test]
        async fn test_truncated_output_is_flagged() {
            let settings = GatewaySettings {
                max_output_bytes: 4,
                ..Default::default()
            };
            let (dispatcher, _mock) = dispatcher_with_settings(
                MockTransport::events(vec![
                    OutputEvent::Stdout(b"0123456789".to_vec()),
                    OutputEvent::Closed {
                        exit_code: Some(0),
                        signal: None,
                    },
                ]),
                settings,
            );

            let text = dispatcher.run_command("cat big.log").await.joined_text();

            assert!(text.contains("Output:\n0123\n"));
            assert!(text.contains("[stdout truncated after 4 bytes]"));
        }
    }

    mod concurrency {
        use super::*;

        #[tokio::test]
        async fn test_open_sessions_never_exceed_limit() {
            let mut mock = MockTransport::events(ok_events());
            mock.event_delay = Some(Duration::from_millis(20));
            let settings = GatewaySettings {
                max_concurrent_sessions: 2,
                ..Default::default()
            };
            let (dispatcher, mock) = dispatcher_with_settings(mock, settings);

            let calls = (0..6).map(|_| dispatcher.run_command("uptime"));
            let responses = futures::future::join_all(calls).await;

            assert!(responses.iter().all(|r| !r.is_error));
            assert_eq!(mock.log.connects(), 6);
            assert_eq!(mock.log.closes(), 6);
            assert!(mock.log.max_open() <= 2);
        }

        #[tokio::test]
        async fn test_saturated_limiter_answers_instead_of_waiting_forever() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::new(Script::Hangs));
            let dispatcher = Arc::new(dispatcher);
            let slots = GatewaySettings::default().max_concurrent_sessions;

            let followers: Vec<_> = (0..slots)
                .map(|_| {
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.run_command("tail -f /var/log/syslog").await
                    })
                })
                .collect();
            for _ in 0..100 {
                if mock.log.connects() == slots {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(mock.log.connects(), slots);

            let response = tokio::time::timeout(
                Duration::from_secs(3),
                dispatcher.run_command("uptime"),
            )
            .await
            .expect("a call beyond the session limit must still get a response");

            assert!(response.is_error);
            assert!(response.joined_text().starts_with("SSH Error: "));
            assert!(response.joined_text().contains("too many concurrent sessions"));
            assert_eq!(mock.log.connects(), slots);

            for follower in followers {
                follower.abort();
            }
        }
    }

    mod invoke {
        use super::*;

        #[tokio::test]
        async fn test_unknown_tool() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.invoke("drop_tables", &Map::new()).await;

            assert!(response.is_error);
            assert_eq!(response.joined_text(), "Unknown tool: drop_tables");
            assert_eq!(mock.log.connects(), 0);
        }

        #[tokio::test]
        async fn test_missing_command_argument() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher.invoke(RUN_COMMAND_TOOL, &Map::new()).await;

            assert!(response.is_error);
            assert!(response.joined_text().contains("'command'"));
            assert_eq!(mock.log.connects(), 0);
        }

        #[tokio::test]
        async fn test_non_string_command_argument() {
            let (dispatcher, _mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher
                .invoke(RUN_COMMAND_TOOL, &args(json!({"command": 42})))
                .await;

            assert!(response.is_error);
        }

        #[tokio::test]
        async fn test_run_command_by_name() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::events(ok_events()));

            let response = dispatcher
                .invoke(RUN_COMMAND_TOOL, &args(json!({"command": "git status"})))
                .await;

            assert!(!response.is_error);
            assert_eq!(mock.log.execs(), 1);
        }

        #[tokio::test]
        async fn test_list_allowed_commands_is_local() {
            let (dispatcher, mock) = dispatcher_with(MockTransport::new(Script::ConnectFails(
                "must not be called".to_string(),
            )));

            let response = dispatcher
                .invoke(LIST_ALLOWED_COMMANDS_TOOL, &Map::new())
                .await;
            let text = response.joined_text();

            assert!(!response.is_error);
            assert!(text.contains("Allowed:"));
            assert!(text.contains("docker logs"));
            assert!(text.contains("Blocked Patterns:"));
            assert_eq!(mock.log.connects(), 0);
        }
    }
}
