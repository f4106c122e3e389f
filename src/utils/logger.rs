use env_logger::{Builder, Env, Target};

/// Log to stderr so the status line on stdout is left alone.
/// `RUST_LOG` overrides the default `info` level.
pub fn init() {
    init_with_level("info");
}

pub fn init_with_level(default_level: &str) {
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Stderr)
        .format_timestamp_secs()
        .try_init();
}
