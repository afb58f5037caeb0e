use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "CPG_HOST",
        "CPG_PORT",
        "CPG_DATABASE_URL",
        "CPG_GATEWAY_ENVIRONMENT",
        "CPG_GATEWAY_BASE_URL",
        "CPG_PAYMENT_SERVICE_URL",
        "CPG_USER_SERVICE_URL",
        "CPG_PRODUCT_SERVICE_URL",
        "CPG_HTTP_TIMEOUT",
        "CPG_VALIDATION_TIMEOUT",
        "CPG_VALIDATION_SWEEP_INTERVAL",
        "CPG_EXPIRY_SWEEP_INTERVAL",
        "CPG_STALE_PAYMENT_AGE",
        "CPG_READ_WORKERS",
        "CPG_READ_QUEUE_MULTIPLIER",
        "CPG_READ_TIMEOUT",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
