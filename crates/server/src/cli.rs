//! CLI argument parsing and subcommand dispatch.

use tracing::error;

use wecker_core::Config;

/// Dispatch non-serve subcommands.
///
/// Returns `Ok(true)` if a subcommand was handled, `Ok(false)` if
/// `serve` should be started (handled by the caller).
pub async fn dispatch(config: &Config, args: &[String]) -> anyhow::Result<bool> {
    match args.get(1).map(|s| s.as_str()) {
        Some("migrate") => {
            if let Err(e) = config.validate() {
                error!("fatal config error: {e}");
                std::process::exit(1);
            }
            let pool = match wecker_store::init_pool(&config.postgres).await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("store unreachable: {e}");
                    std::process::exit(2);
                }
            };
            wecker_store::run_migrations(&pool).await?;
            Ok(true)
        }
        Some("serve") | None => Ok(false),
        _ => {
            print_usage();
            Ok(true)
        }
    }
}

fn print_usage() {
    println!("wecker-server v0.1.0");
    println!("Usage: wecker-server [command]");
    println!("  serve     Start the alarm scheduling service (default)");
    println!("  migrate   Apply database migrations and exit");
}
