//! Default freeze logger: writes reports through the process log.

use freezemon_common::UiFreezeEvent;
use log::{error, warn};

use super::{format_report, FreezeLogger};

/// Logs every freeze through the `log` facade.
///
/// Probable deadlocks are logged at `error`, completed freezes at `warn`.
#[derive(Debug, Default)]
pub struct DefaultUiFreezeEventLogger;

impl DefaultUiFreezeEventLogger {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FreezeLogger for DefaultUiFreezeEventLogger {
    fn log(&self, event: &UiFreezeEvent) -> anyhow::Result<()> {
        let report = format_report(event);
        if event.still_running {
            error!(target: "freezemon", "{report}");
        } else {
            warn!(target: "freezemon", "{report}");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "default"
    }
}
