use std::{env, env::VarError};

/// The worker takes no arguments. Any arguments print the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 8] = [
        "RUST_LOG",
        "BILLING_DATABASE_URL",
        "BILLING_ACCOUNTING_CURRENCY",
        "BILLING_ACCEPT_WINDOW_HOURS",
        "BILLING_AUTO_ACCEPT_INTERVAL_SECS",
        "BILLING_REPORT_INTERVAL_SECS",
        "BILLING_RATE_TIMEOUT_MS",
        "BILLING_GENERATE_REPORTS",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
