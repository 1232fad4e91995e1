use std::time::Duration;

/// Default byte limit for coalescing small text writes.
pub const DEFAULT_AGGREGATE_THRESHOLD: usize = 1024;

/// Default size of the scratch buffer the TLS pump pulls into.
pub const DEFAULT_TLS_SCRATCH_SIZE: usize = 4096;

/// Default limit for a message head (request/status line plus headers).
pub const DEFAULT_MAX_HEAD_SIZE: usize = 64 * 1024;

/// Idle timeout servers install on accepted transports.
pub const DEFAULT_SERVER_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Engine configuration.
///
/// Handed to each client, server and TLS pump when it is constructed. There is
/// no global state; two connections with different configs can live side by side.
///
/// ```
/// use std::time::Duration;
/// use h1_mux::Config;
///
/// let config = Config::default()
///     .aggregate_threshold(0)
///     .idle_timeout(Some(Duration::from_secs(5)));
///
/// assert_eq!(config.get_aggregate_threshold(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    aggregate_threshold: usize,
    idle_timeout: Option<Duration>,
    max_retries: usize,
    tls_scratch_size: usize,
    max_head_size: usize,
    check_continue: bool,
    accept_upgrade: bool,
    keep_alive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            aggregate_threshold: DEFAULT_AGGREGATE_THRESHOLD,
            idle_timeout: None,
            max_retries: 3,
            tls_scratch_size: DEFAULT_TLS_SCRATCH_SIZE,
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            check_continue: false,
            accept_upgrade: false,
            keep_alive: true,
        }
    }
}

impl Config {
    /// Defaults for a server connection, with the idle watchdog armed.
    pub fn server() -> Self {
        Config {
            idle_timeout: Some(DEFAULT_SERVER_IDLE_TIMEOUT),
            ..Default::default()
        }
    }

    /// Byte limit for coalescing consecutive text writes into one transport write.
    ///
    /// `0` turns coalescing off; every write becomes its own frame.
    pub fn aggregate_threshold(mut self, v: usize) -> Self {
        self.aggregate_threshold = v;
        self
    }

    /// Idle watchdog handed to [`Transport::set_timeout`](crate::Transport::set_timeout).
    pub fn idle_timeout(mut self, v: Option<Duration>) -> Self {
        self.idle_timeout = v;
        self
    }

    /// How many times the client silently retransmits a request whose transport
    /// ended before any body byte was sent.
    pub fn max_retries(mut self, v: usize) -> Self {
        self.max_retries = v;
        self
    }

    /// Size of the buffer the TLS pump pulls engine output into.
    pub fn tls_scratch_size(mut self, v: usize) -> Self {
        self.tls_scratch_size = v.max(1);
        self
    }

    /// Largest accepted message head.
    pub fn max_head_size(mut self, v: usize) -> Self {
        self.max_head_size = v;
        self
    }

    /// Let the server consumer decide on `Expect: 100-continue`.
    ///
    /// When `false` the server answers `100 Continue` by itself.
    pub fn check_continue(mut self, v: bool) -> Self {
        self.check_continue = v;
        self
    }

    /// Whether the consumer takes over upgraded connections.
    ///
    /// When `false` an upgrade request destroys the connection.
    pub fn accept_upgrade(mut self, v: bool) -> Self {
        self.accept_upgrade = v;
        self
    }

    /// Whether client requests ask for keep-alive when the headers allow it.
    pub fn keep_alive(mut self, v: bool) -> Self {
        self.keep_alive = v;
        self
    }

    /// Current coalescing threshold.
    pub fn get_aggregate_threshold(&self) -> usize {
        self.aggregate_threshold
    }

    /// Current idle timeout.
    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Current retry limit.
    pub fn get_max_retries(&self) -> usize {
        self.max_retries
    }

    /// Current TLS scratch size.
    pub fn get_tls_scratch_size(&self) -> usize {
        self.tls_scratch_size
    }

    /// Current head size limit.
    pub fn get_max_head_size(&self) -> usize {
        self.max_head_size
    }

    /// Whether `Expect: 100-continue` is surfaced to the consumer.
    pub fn get_check_continue(&self) -> bool {
        self.check_continue
    }

    /// Whether upgrades are handed to the consumer.
    pub fn get_accept_upgrade(&self) -> bool {
        self.accept_upgrade
    }

    /// Whether client requests ask for keep-alive.
    pub fn get_keep_alive(&self) -> bool {
        self.keep_alive
    }
}
