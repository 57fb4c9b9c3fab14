use std::time::Duration;

use serde::Serialize;
use sessionlock_application::SessionStorageService;
use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{LockKey, SessionKey};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const USAGE: &str = "usage: sessionlock <command>\n\
\n\
commands:\n\
  ping                            check that the store answers\n\
  get <key>                       print one session blob\n\
  set <key> <value> <ttl_seconds> store one session blob\n\
  del <key>                       delete one session blob\n\
  lock <key> <hold_ms>            acquire, hold while refreshing, then release\n\
  peek <key>                      report whether the lock is held";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Del {
        key: String,
    },
    Lock {
        key: String,
        hold: Duration,
    },
    Peek {
        key: String,
    },
}

impl Command {
    pub fn parse<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let words: Vec<&str> = args.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["ping"] => Ok(Self::Ping),
            ["get", key] => Ok(Self::Get {
                key: (*key).to_owned(),
            }),
            ["set", key, value, ttl_seconds] => Ok(Self::Set {
                key: (*key).to_owned(),
                value: (*value).to_owned(),
                ttl: Duration::from_secs(parse_number("ttl_seconds", ttl_seconds)?),
            }),
            ["del", key] => Ok(Self::Del {
                key: (*key).to_owned(),
            }),
            ["lock", key, hold_ms] => Ok(Self::Lock {
                key: (*key).to_owned(),
                hold: Duration::from_millis(parse_number("hold_ms", hold_ms)?),
            }),
            ["peek", key] => Ok(Self::Peek {
                key: (*key).to_owned(),
            }),
            _ => Err(AppError::Validation(USAGE.to_owned())),
        }
    }
}

fn parse_number(name: &str, value: &str) -> AppResult<u64> {
    value
        .parse::<u64>()
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}

/// One JSON line written to stdout.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandOutput {
    Pong,
    Session {
        key: String,
        value: Option<String>,
    },
    Stored {
        key: String,
        ttl_seconds: u64,
    },
    Deleted {
        key: String,
    },
    Acquired {
        key: String,
        token: String,
        lease_ms: u64,
    },
    TimedOut {
        key: String,
    },
    Released {
        key: String,
        held_ms: u64,
        refreshes: u32,
    },
    Peeked {
        key: String,
        held: bool,
    },
}

pub async fn run_command(
    service: &SessionStorageService,
    cancel: &CancellationToken,
    command: Command,
    mut emit: impl FnMut(CommandOutput),
) -> AppResult<()> {
    match command {
        Command::Ping => {
            service.ping(cancel).await?;
            emit(CommandOutput::Pong);
        }
        Command::Get { key } => {
            let value = service.get(cancel, &SessionKey::new(key.as_str())?).await?;
            emit(CommandOutput::Session {
                key,
                value: value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            });
        }
        Command::Set { key, value, ttl } => {
            service
                .set(cancel, &SessionKey::new(key.as_str())?, value.as_bytes(), ttl)
                .await?;
            emit(CommandOutput::Stored {
                key,
                ttl_seconds: ttl.as_secs(),
            });
        }
        Command::Del { key } => {
            service.del(cancel, &SessionKey::new(key.as_str())?).await?;
            emit(CommandOutput::Deleted { key });
        }
        Command::Lock { key, hold } => {
            hold_lock(service, cancel, key, hold, &mut emit).await?;
        }
        Command::Peek { key } => {
            let held = service
                .lock(LockKey::new(key.as_str())?)
                .peek(cancel)
                .await?;
            emit(CommandOutput::Peeked { key, held });
        }
    }

    Ok(())
}

async fn hold_lock(
    service: &SessionStorageService,
    cancel: &CancellationToken,
    key: String,
    hold: Duration,
    emit: &mut impl FnMut(CommandOutput),
) -> AppResult<()> {
    let mut lock = service.lock(LockKey::new(key.as_str())?);
    if !lock.acquire(cancel).await? {
        emit(CommandOutput::TimedOut { key });
        return Ok(());
    }

    let token = lock
        .owner_token()
        .map(|token| token.to_string())
        .unwrap_or_default();
    emit(CommandOutput::Acquired {
        key: key.clone(),
        token,
        lease_ms: lock.lease().as_millis(),
    });

    let started = Instant::now();
    let deadline = started.checked_add(hold).unwrap_or(started);
    let refresh_every = (lock.lease().as_duration() / 2).max(Duration::from_millis(1));
    let mut refreshes = 0_u32;

    let held = loop {
        let now = Instant::now();
        if now >= deadline {
            break Ok(());
        }

        let pause = refresh_every.min(deadline.saturating_duration_since(now));
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(AppError::Cancelled(format!("holding lock '{key}'"))),
            () = tokio::time::sleep(pause) => {}
        }

        if Instant::now() < deadline {
            if let Err(error) = lock.refresh(cancel).await {
                break Err(error);
            }
            refreshes = refreshes.saturating_add(1);
        }
    };

    // Release on a fresh token so Ctrl-C still frees the key. The lease
    // bounds the wait: past it the key has expired anyway.
    let release_limit = lock.lease();
    let release_cancel = CancellationToken::new();
    let released = match tokio::time::timeout(
        release_limit.as_duration(),
        lock.release(&release_cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreUnavailable(format!(
            "release of lock '{key}' did not finish within {}ms",
            release_limit.as_millis()
        ))),
    };
    if let Err(error) = &released {
        warn!(key = key.as_str(), error = %error, "failed to release lock, leaving it to expire");
    }
    held?;
    released?;

    emit(CommandOutput::Released {
        key,
        held_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        refreshes,
    });

    Ok(())
}

#[cfg(test)]
mod tests;
