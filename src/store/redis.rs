//! Redis-backed [`KvClient`].
//!
//! Uses a single synchronous connection guarded by a mutex. The connection is
//! dialed lazily on first use and re-dialed after connection-level failures,
//! which are retried up to `max_retries` times.

use super::{KvClient, ScanPage, StoreResult, Ttl};
use crate::config::ResolvedClientConfig;
use parking_lot::Mutex;
use redis::{
    Client, Cmd, Connection, ConnectionInfo, ErrorKind, FromRedisValue, IntoConnectionInfo,
    RedisError, RedisResult,
};
use std::time::Duration;

/// Redis client honoring the resolved timeouts and retry count.
pub struct RedisStore {
    name: String,
    client: Client,
    conn: Mutex<Option<Connection>>,
    max_retries: u32,
    dial_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .field("dial_timeout", &self.dial_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Builds a client from resolved settings. No connection is made yet.
    pub fn connect(config: &ResolvedClientConfig) -> StoreResult<Self> {
        let client = Client::open(connection_info(config)?)?;

        log::info!(
            "Configured redis client {:?} for {} db {}",
            config.name,
            config.addr,
            config.db
        );

        Ok(Self {
            name: config.name.clone(),
            client,
            conn: Mutex::new(None),
            max_retries: config.max_retries,
            dial_timeout: config.dial_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        })
    }

    fn dial(&self) -> RedisResult<Connection> {
        let conn = self.client.get_connection_with_timeout(self.dial_timeout)?;
        conn.set_read_timeout(Some(self.read_timeout))?;
        conn.set_write_timeout(Some(self.write_timeout))?;
        log::debug!("Dialed redis connection for {:?}", self.name);
        Ok(conn)
    }

    fn connection<'a>(&self, slot: &'a mut Option<Connection>) -> RedisResult<&'a mut Connection> {
        if slot.is_none() {
            *slot = Some(self.dial()?);
        }
        slot.as_mut().ok_or_else(|| {
            RedisError::from((ErrorKind::ClientError, "redis connection unavailable"))
        })
    }

    /// Runs a command, re-dialing and retrying on connection failures.
    fn run<T: FromRedisValue>(&self, cmd: &Cmd) -> StoreResult<T> {
        let mut slot = self.conn.lock();
        let mut attempt = 0;

        loop {
            let result = self.connection(&mut slot).and_then(|conn| cmd.query::<T>(conn));
            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_connection_error(&e) => {
                    *slot = None;
                    if attempt >= self.max_retries {
                        return Err(e.into());
                    }
                    attempt += 1;
                    log::debug!(
                        "Redis connection for {:?} failed, retrying ({}/{})",
                        self.name,
                        attempt,
                        self.max_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Builds connection info from `addr`, `db` and `password`.
pub fn connection_info(config: &ResolvedClientConfig) -> RedisResult<ConnectionInfo> {
    let mut info = format!("redis://{}/{}", config.addr, config.db).into_connection_info()?;
    info.redis.password = config.password.clone();
    Ok(info)
}

fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_timeout()
        || err.is_connection_refusal()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Millisecond expiry for a non-zero TTL, never rounded down to 0.
fn expiry_millis(ttl: Duration) -> u64 {
    millis(ttl).max(1)
}

/// `SET key value [PX ms]`. A zero or missing TTL stores without expiry.
fn set_cmd(key: &str, value: &[u8], ttl: Option<Duration>) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
        cmd.arg("PX").arg(expiry_millis(ttl));
    }
    cmd
}

/// `PEXPIRE key ms`. A zero TTL expires the key immediately.
fn expire_cmd(key: &str, ttl: Duration) -> Cmd {
    let ms = if ttl.is_zero() { 0 } else { expiry_millis(ttl) };
    let mut cmd = redis::cmd("PEXPIRE");
    cmd.arg(key).arg(ms);
    cmd
}

impl KvClient for RedisStore {
    fn exists(&self, key: &str) -> StoreResult<u64> {
        self.run(redis::cmd("EXISTS").arg(key))
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        self.run(redis::cmd("DEL").arg(key))
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.run(redis::cmd("GET").arg(key))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.run(&set_cmd(key, value, ttl))
    }

    fn ttl(&self, key: &str) -> StoreResult<Option<Ttl>> {
        let ms: i64 = self.run(redis::cmd("PTTL").arg(key))?;
        Ok(match ms {
            -2 => None,
            -1 => Some(Ttl::Persistent),
            ms => Some(Ttl::Expires(Duration::from_millis(ms.max(0) as u64))),
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.run(&expire_cmd(key, ttl))
    }

    fn persist(&self, key: &str) -> StoreResult<bool> {
        self.run(redis::cmd("PERSIST").arg(key))
    }

    fn scan(&self, cursor: u64, pattern: &str, page_size: usize) -> StoreResult<ScanPage> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern);
        if page_size > 0 {
            cmd.arg("COUNT").arg(page_size);
        }
        let (cursor, keys): (u64, Vec<String>) = self.run(&cmd)?;
        Ok(ScanPage { cursor, keys })
    }

    fn ping(&self) -> StoreResult<()> {
        let _: String = self.run(&redis::cmd("PING"))?;
        Ok(())
    }
}
