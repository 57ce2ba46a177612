//! Daily quota command handlers.

use anyhow::Result;

use super::common::{load_config, open_quota, open_storage};
use super::QuotaSubcommand;

/// Handle `tokki quota` subcommands.
pub(crate) fn cmd_quota(action: QuotaSubcommand) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage();
    let quota = open_quota(&storage, &config);

    match action {
        QuotaSubcommand::Status => {
            let status = quota.status();
            println!(
                "{} of {} generations used today, {} remaining",
                status.count,
                quota.daily_max(),
                status.remaining
            );
            println!("{}", status.reset_description);
        }
        QuotaSubcommand::Reset => {
            quota.reset();
            println!("Daily quota record removed.");
        }
    }

    Ok(())
}
