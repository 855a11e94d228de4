use std::path::PathBuf;

const INTERVAL_ENV: &str = "HOSTFETCHD_INTERVAL_SECS";

pub fn get_interval_override() -> Option<u64> {
    let interval_from_env = std::env::var(INTERVAL_ENV);
    interval_from_env.ok().and_then(|res| res.parse().ok())
}

const HISTORY_ENV: &str = "HOSTFETCHD_HISTORY";

pub fn get_history_override() -> Option<PathBuf> {
    let history_from_env = std::env::var(HISTORY_ENV);
    history_from_env.ok().map(PathBuf::from)
}
