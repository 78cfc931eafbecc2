use std::env;

const HELP: &str = include_str!("./cli-help.txt");

// Secrets are left off this list on purpose
const NON_SECRET_VARS: [&str; 9] = [
    "RUST_LOG",
    "DPS_HOST",
    "DPS_PORT",
    "DPS_DATABASE_URL",
    "DPS_RAZORPAY_KEY_ID",
    "DPS_RAZORPAY_API_URL",
    "DPS_RAZORPAY_HMAC_CHECKS",
    "DPS_STALE_PENDING_AGE",
    "DPS_CURRENCY",
];

/// The server takes no arguments. If any are given, print the help text and the current non-secret configuration,
/// and return `true` so that the caller exits instead of starting the server.
pub fn handle_command_line_args() -> bool {
    if env::args_os().len() <= 1 {
        return false;
    }
    println!("\n{HELP}\n");
    println!("Current environment (secrets are not shown):");
    for name in NON_SECRET_VARS {
        println!("  {name:<30} {}", describe_var(name));
    }
    true
}

fn describe_var(name: &str) -> String {
    match env::var_os(name) {
        None => "Not set".into(),
        Some(val) => match val.into_string() {
            Ok(s) => s,
            Err(raw) => format!("Invalid value: {}", raw.to_string_lossy()),
        },
    }
}
