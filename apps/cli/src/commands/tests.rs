use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sessionlock_application::{LockSettings, LockStore, SessionBlobStore, SessionStorageService};
use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{LeaseDuration, LockKey};
use sessionlock_infrastructure::InMemorySessionStore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{Command, CommandOutput, run_command};

/// In-memory store whose compare-and-delete never answers.
#[derive(Default)]
struct StuckReleaseStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl SessionBlobStore for StuckReleaseStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], expiration: Duration) -> AppResult<()> {
        self.inner.set(key, value, expiration).await
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        self.inner.del(key).await
    }

    async fn ping(&self) -> AppResult<()> {
        SessionBlobStore::ping(&self.inner).await
    }
}

#[async_trait]
impl LockStore for StuckReleaseStore {
    async fn create_if_absent(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        self.inner.create_if_absent(key, token, lease).await
    }

    async fn refresh_if_owner(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        self.inner.refresh_if_owner(key, token, lease).await
    }

    async fn delete_if_owner(&self, _key: &str, _token: &[u8]) -> AppResult<bool> {
        std::future::pending().await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn health_check(&self) -> AppResult<()> {
        self.inner.health_check().await
    }
}

fn settings(lease_ms: u64) -> LockSettings {
    LockSettings {
        acquire_timeout: Duration::from_millis(300),
        ..LockSettings::new(LeaseDuration::from_millis(lease_ms).unwrap_or_else(|_| unreachable!()))
    }
}

fn service(lease_ms: u64) -> SessionStorageService {
    let store = Arc::new(InMemorySessionStore::new());
    SessionStorageService::new(store.clone(), store, settings(lease_ms))
        .unwrap_or_else(|_| unreachable!())
}

async fn run(service: &SessionStorageService, command: Command) -> Vec<CommandOutput> {
    let mut outputs = Vec::new();
    let cancel = CancellationToken::new();
    let result = run_command(service, &cancel, command, |output| outputs.push(output)).await;
    assert!(result.is_ok());
    outputs
}

#[test]
fn parses_every_command() {
    assert_eq!(Command::parse(["ping"]).ok(), Some(Command::Ping));
    assert_eq!(
        Command::parse(["set", "42", "blob", "60"]).ok(),
        Some(Command::Set {
            key: "42".to_owned(),
            value: "blob".to_owned(),
            ttl: Duration::from_secs(60),
        })
    );
    assert_eq!(
        Command::parse(["lock", "session:42", "1500"]).ok(),
        Some(Command::Lock {
            key: "session:42".to_owned(),
            hold: Duration::from_millis(1_500),
        })
    );
    assert_eq!(
        Command::parse(["peek", "session:42"]).ok(),
        Some(Command::Peek {
            key: "session:42".to_owned()
        })
    );
}

#[test]
fn rejects_unknown_or_malformed_commands() {
    assert!(matches!(
        Command::parse(Vec::<String>::new()),
        Err(AppError::Validation(_))
    ));
    assert!(Command::parse(["get"]).is_err());
    assert!(Command::parse(["set", "42", "blob", "soon"]).is_err());
    assert!(Command::parse(["unlock", "42"]).is_err());
}

#[test]
fn outputs_serialize_as_tagged_json() {
    let line = serde_json::to_string(&CommandOutput::Peeked {
        key: "session:42".to_owned(),
        held: true,
    })
    .unwrap_or_default();
    assert_eq!(line, r#"{"event":"peeked","key":"session:42","held":true}"#);

    let line = serde_json::to_string(&CommandOutput::Pong).unwrap_or_default();
    assert_eq!(line, r#"{"event":"pong"}"#);
}

#[tokio::test]
async fn session_commands_round_trip() {
    let service = service(5_000);

    assert_eq!(run(&service, Command::Ping).await, vec![CommandOutput::Pong]);
    run(
        &service,
        Command::Set {
            key: "42".to_owned(),
            value: "blob".to_owned(),
            ttl: Duration::from_secs(60),
        },
    )
    .await;

    assert_eq!(
        run(
            &service,
            Command::Get {
                key: "42".to_owned()
            }
        )
        .await,
        vec![CommandOutput::Session {
            key: "42".to_owned(),
            value: Some("blob".to_owned()),
        }]
    );

    run(
        &service,
        Command::Del {
            key: "42".to_owned(),
        },
    )
    .await;
    assert_eq!(
        run(
            &service,
            Command::Get {
                key: "42".to_owned()
            }
        )
        .await,
        vec![CommandOutput::Session {
            key: "42".to_owned(),
            value: None,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn lock_command_refreshes_while_holding_and_releases() {
    let service = service(1_000);

    let outputs = run(
        &service,
        Command::Lock {
            key: "session:42".to_owned(),
            hold: Duration::from_millis(2_200),
        },
    )
    .await;

    assert_eq!(outputs.len(), 2);
    assert!(matches!(
        &outputs[0],
        CommandOutput::Acquired { lease_ms: 1_000, .. }
    ));
    // Refreshes land at 500ms, 1000ms, 1500ms and 2000ms.
    assert!(matches!(
        &outputs[1],
        CommandOutput::Released { refreshes: 4, .. }
    ));

    let peeked = run(
        &service,
        Command::Peek {
            key: "session:42".to_owned(),
        },
    )
    .await;
    assert_eq!(
        peeked,
        vec![CommandOutput::Peeked {
            key: "session:42".to_owned(),
            held: false,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn lock_command_reports_timeout_when_key_is_held() {
    let service = service(60_000);
    let cancel = CancellationToken::new();
    let mut holder = service.lock(LockKey::new("session:7").unwrap_or_else(|_| unreachable!()));
    assert!(holder.obtain(&cancel).await.is_ok());

    let outputs = run(
        &service,
        Command::Lock {
            key: "session:7".to_owned(),
            hold: Duration::from_millis(100),
        },
    )
    .await;

    assert_eq!(
        outputs,
        vec![CommandOutput::TimedOut {
            key: "session:7".to_owned()
        }]
    );
    assert!(holder.refresh(&cancel).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn cancelled_hold_still_releases_the_lock() {
    let service = service(1_000);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        trigger.cancel();
    });

    let mut outputs = Vec::new();
    let result = run_command(
        &service,
        &cancel,
        Command::Lock {
            key: "session:9".to_owned(),
            hold: Duration::from_secs(10),
        },
        |output| outputs.push(output),
    )
    .await;

    assert!(matches!(result, Err(AppError::Cancelled(_))));
    assert_eq!(outputs.len(), 1);

    let lock = service.lock(LockKey::new("session:9").unwrap_or_else(|_| unreachable!()));
    assert!(matches!(
        lock.peek(&CancellationToken::new()).await,
        Ok(false)
    ));
}

#[tokio::test(start_paused = true)]
async fn unanswered_release_does_not_keep_the_command_running() {
    let store = Arc::new(StuckReleaseStore::default());
    let service = SessionStorageService::new(store.clone(), store, settings(1_000))
        .unwrap_or_else(|_| unreachable!());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut outputs = Vec::new();
    let result = tokio::time::timeout(
        Duration::from_secs(60),
        run_command(
            &service,
            &cancel,
            Command::Lock {
                key: "session:stuck".to_owned(),
                hold: Duration::from_secs(10),
            },
            |output| outputs.push(output),
        ),
    )
    .await;

    assert!(matches!(result, Ok(Err(AppError::Cancelled(_)))));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1_700));
    assert!(waited < Duration::from_millis(1_800));
    assert_eq!(outputs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_release_after_a_full_hold_is_reported() {
    let store = Arc::new(StuckReleaseStore::default());
    let service = SessionStorageService::new(store.clone(), store, settings(1_000))
        .unwrap_or_else(|_| unreachable!());
    let cancel = CancellationToken::new();

    let mut outputs = Vec::new();
    let result = run_command(
        &service,
        &cancel,
        Command::Lock {
            key: "session:stuck".to_owned(),
            hold: Duration::from_millis(200),
        },
        |output| outputs.push(output),
    )
    .await;

    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert!(matches!(outputs.as_slice(), [CommandOutput::Acquired { .. }]));
}
