//! Process-wide defaults, overridable via environment variables (§7A).

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7420;

/// Overrides [`DEFAULT_BIND_ADDRESS`]:[`DEFAULT_PORT`], e.g. `"0.0.0.0:7420"`.
pub const LISTEN_ADDR_ENV: &str = "AGENTLENS_LISTEN_ADDR";

/// When set to `"true"`, spans older than 30 days are rewritten to
/// yesterday's date at ingest time (§6, §9 — a migration aid, not a
/// guarantee, and off by default).
pub const REWRITE_STALE_SPANS_ENV: &str = "AGENTLENS_REWRITE_STALE_SPANS";

/// Spans older than this are eligible for the stale-span rewrite.
pub const STALE_SPAN_AGE_DAYS: i64 = 30;
