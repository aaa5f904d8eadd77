use std::{env, path::Path};

use log::info;

// -----------------
// init_logger
// -----------------
pub fn init_logger_for_test_path(full_path_to_test_file: &str) {
    // Logs of the test file itself are only shown if its module is part of
    // the RUST_LOG filter
    let mut rust_log = env::var(env_logger::DEFAULT_FILTER_ENV)
        .ok()
        .unwrap_or_default();
    if rust_log.ends_with(',') || rust_log.is_empty() {
        if let Some(file) = Path::new(full_path_to_test_file)
            .file_stem()
            .and_then(|stem| stem.to_str())
        {
            let test_level =
                env::var("RUST_TEST_LOG").unwrap_or("info".to_string());
            rust_log.push_str(&format!("{file}={test_level}"));
            env::set_var(env_logger::DEFAULT_FILTER_ENV, rust_log);
        }
    }

    let _ = env_logger::builder()
        .format_timestamp_micros()
        .is_test(true)
        .try_init();
}

#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::diagnostics::init_logger_for_test_path(::std::file!());
    };
}

// -----------------
// Program Logs
// -----------------
/// Prints the log messages a transaction produced.
pub fn log_program_logs(log_messages: &[String]) {
    info!("");
    info!("=============== Logs ===============");
    for log in log_messages {
        info!("> {log}");
    }
    info!("");
}
