use clap::Parser;

use crate::app::{AppContext, Result};
use crate::digest::ReadRequest;

#[derive(Debug, Parser)]
#[command(name = "hys", version, about = "Once-a-day terminal feed digest")]
pub struct Cli {
    /// Groups to read, in display order
    pub groups: Vec<String>,

    /// Ad-hoc feed URLs; read without touching any state
    #[arg(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Read every group on disk
    #[arg(long)]
    pub all: bool,

    /// Ignore the interval gate and fetch now
    #[arg(long)]
    pub reset: bool,

    /// Re-render yesterday's digest without fetching
    #[arg(long, conflicts_with = "offset")]
    pub yesterday: bool,

    /// Re-render the run at this offset (0 latest, -1 previous)
    #[arg(long, allow_hyphen_values = true, value_name = "N")]
    pub offset: Option<i64>,

    /// Accepted for interface compatibility; output always goes to stdout
    #[arg(long = "no-pager")]
    pub no_pager: bool,

    /// Disable ANSI colors
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Cli {
    /// Resolves the effective group list: `--all` enumerates the disk,
    /// no arguments means the default group.
    pub fn resolve_groups(&self, ctx: &AppContext) -> Result<Vec<String>> {
        if !self.urls.is_empty() {
            return Ok(Vec::new());
        }
        if self.all {
            return ctx.groups.list();
        }
        if self.groups.is_empty() {
            return Ok(vec!["main".to_string()]);
        }
        Ok(self.groups.clone())
    }

    pub fn to_request(&self, groups: Vec<String>) -> ReadRequest {
        ReadRequest {
            groups,
            ad_hoc_urls: self.urls.clone(),
            reset: self.reset,
        }
    }

    /// Historical-render mode, when requested.
    pub fn day_offset(&self) -> Option<i64> {
        if self.yesterday {
            Some(-1)
        } else {
            self.offset
        }
    }
}
