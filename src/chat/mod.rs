//! In-game chat query surface.
//!
//! Players talk to a bot dialog to browse their archived raids. Commands are
//! plain text: the first whitespace-separated token names the command, the
//! rest are `key value` pairs (`list limit 5 page 2`). Every handler returns
//! a complete reply string; errors become readable messages rather than
//! bubbling out, since the other end is a game client chat window.

use log::{info, warn};

use crate::config::ChatConfig;
use crate::host::PriceCatalog;
use crate::record::archive::{self, RecheckReport};
use crate::record::errors::RecordError;
use crate::record::store::{ArchiveSelector, RecordStore};
use crate::record::types::RaidArchive;

/// Default number of rows per `list` page.
const DEFAULT_PAGE_LIMIT: usize = 10;

/// Command dialog bound to one [`ChatConfig`].
pub struct ChatCommands {
    config: ChatConfig,
}

impl ChatCommands {
    pub fn new(config: ChatConfig) -> Self {
        Self { config }
    }

    pub fn bot_name(&self) -> &str {
        &self.config.bot_name
    }

    /// Handle one message from `player_id` and produce the reply text.
    pub async fn handle<C: PriceCatalog>(
        &self,
        store: &mut RecordStore,
        catalog: &C,
        player_id: &str,
        text: &str,
    ) -> String {
        let mut tokens = text.split_whitespace();
        let Some(command) = tokens.next() else {
            return "No command given. Send 'help' for the command list.".to_string();
        };
        let params = match Params::parse(tokens) {
            Ok(params) => params,
            Err(msg) => return msg,
        };

        info!("chat command '{}' from {}", command, player_id);
        let result = match command {
            "help" => Ok(self.help_reply()),
            "list" => self.list_reply(store, player_id, &params).await,
            "info" => self.info_reply(store, player_id, &params).await,
            "check" => self.check_reply(store, catalog, player_id, &params).await,
            "cls" => Ok(
                "Dialog history lives in your game client and cannot be cleared from here."
                    .to_string(),
            ),
            other => Ok(format!(
                "Unknown command '{}'. Send 'help' for the command list.",
                other
            )),
        };
        result.unwrap_or_else(|e| {
            warn!("chat command '{}' from {} failed: {}", command, player_id, e);
            format!("Command failed: {}", e)
        })
    }

    fn help_reply(&self) -> String {
        let mut msg = String::from(
            "Available commands (parameters are key value pairs, [brackets] mean optional):",
        );
        msg.push_str("\n - help: this message");
        msg.push_str(&format!(
            "\n - list [limit int] [page int]: page through your raid history (limit 1..{})",
            self.config.page_limit_max
        ));
        msg.push_str("\n - info [raid string] [index int]: full details of one raid");
        msg.push_str("\n - check [raid string] [index int]: re-verify profit/loss of one raid");
        msg.push_str("\n - cls: clear the dialog history");
        msg
    }

    async fn list_reply(
        &self,
        store: &mut RecordStore,
        player_id: &str,
        params: &Params,
    ) -> Result<String, RecordError> {
        let limit = params
            .get_usize("limit")?
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, self.config.page_limit_max);
        let page = params.get_usize("page")?.unwrap_or(1).max(1);

        let archives = store.list_archives(player_id).await?;
        if archives.is_empty() {
            return Ok("No raid history yet. Come back after your first raid.".to_string());
        }

        let first = limit * (page - 1);
        if first >= archives.len() {
            return Ok(format!(
                "Page {} is out of range: you have {} archived raid(s).",
                page,
                archives.len()
            ));
        }
        let slice = &archives[first..(first + limit).min(archives.len())];

        let mut msg = format!(
            "Raid history ({}-{} of {}):\n - index | raid | entry value | gross profit | losses | time | result",
            first + 1,
            first + slice.len(),
            archives.len()
        );
        for (offset, archive) in slice.iter().enumerate() {
            let result = archive
                .outcome
                .as_ref()
                .and_then(|o| o.result.as_deref())
                .unwrap_or("unknown");
            let play_time = archive
                .outcome
                .as_ref()
                .map(|o| o.play_time_secs)
                .unwrap_or(0);
            msg.push_str(&format!(
                "\n - {} | {} | {} | {} | {} | {} | {}",
                first + offset,
                archive.raid_id,
                archive.entry_value,
                archive.gross_profit,
                archive.combat_losses,
                time_string(play_time),
                result
            ));
        }
        Ok(msg)
    }

    async fn info_reply(
        &self,
        store: &mut RecordStore,
        player_id: &str,
        params: &Params,
    ) -> Result<String, RecordError> {
        let selector = params.selector()?;
        let archive = store.get_archive(player_id, &selector).await?;
        Ok(self.archive_details(&archive))
    }

    fn archive_details(&self, archive: &RaidArchive) -> String {
        let mut msg = format!(
            "{} raid {} ({}, {})",
            archive.created_at.format("%Y-%m-%d %H:%M:%S"),
            archive.raid_id,
            map_name(&archive.raid_id),
            archive.status
        );
        msg.push_str(&format!(
            "\nEntry value: {} (equipment {}, secured container {})",
            archive.entry_value, archive.equipment_value, archive.secured_value
        ));
        msg.push_str(&format!(
            "\nGross profit: {}, combat losses: {}, net: {}",
            archive.gross_profit,
            archive.combat_losses,
            archive.gross_profit - archive.combat_losses
        ));

        if let Some(outcome) = archive.outcome.as_ref() {
            msg.push_str(&format!(
                "\nResult: {}, exit: {}, survival time: {}",
                outcome.result.as_deref().unwrap_or("unknown"),
                outcome.exit_name.as_deref().unwrap_or("none"),
                time_string(outcome.play_time_secs)
            ));
        }
        if let Some(stats) = archive.stats.as_ref() {
            if let Some(class) = stats.survivor_class.as_deref() {
                msg.push_str(&format!("\nPlay style: {}", class));
            }
            if self.config.log_victims && !stats.victims.is_empty() {
                msg.push_str("\nKills this raid:");
                for victim in &stats.victims {
                    msg.push_str(&format!(
                        "\n - {} (level {}, {}) with {} to the {} at {}m",
                        victim.name,
                        victim.level,
                        victim.side.as_deref().unwrap_or("unknown side"),
                        victim.weapon.as_deref().unwrap_or("unknown weapon"),
                        victim.body_part.as_deref().unwrap_or("body"),
                        victim.distance as i64
                    ));
                }
            }
            if let Some(aggressor) = stats.aggressor.as_ref() {
                msg.push_str(&format!(
                    "\nEliminated by {} ({}) with {} to the {}",
                    aggressor.name,
                    aggressor.side.as_deref().unwrap_or("unknown side"),
                    aggressor.weapon.as_deref().unwrap_or("unknown weapon"),
                    aggressor.body_part.as_deref().unwrap_or("body")
                ));
            }
        }
        msg
    }

    async fn check_reply<C: PriceCatalog>(
        &self,
        store: &mut RecordStore,
        catalog: &C,
        player_id: &str,
        params: &Params,
    ) -> Result<String, RecordError> {
        let selector = params.selector()?;
        let report: RecheckReport = store
            .update_archive(player_id, &selector, |archive| {
                archive::recheck(archive, catalog)
            })
            .await?;
        if report.corrected {
            Ok(format!(
                "Profit/loss drifted and was corrected: gross profit {} -> {}, combat losses {} -> {}.",
                report.old_gross_profit,
                report.new_gross_profit,
                report.old_combat_losses,
                report.new_combat_losses
            ))
        } else {
            Ok("Checked: no significant drift in profit or losses.".to_string())
        }
    }
}

/// Parsed `key value` pairs following the command token.
struct Params(Vec<(String, String)>);

impl Params {
    fn parse<'a, I: Iterator<Item = &'a str>>(mut tokens: I) -> Result<Self, String> {
        let mut pairs = Vec::new();
        while let Some(key) = tokens.next() {
            let Some(value) = tokens.next() else {
                return Err(format!(
                    "Parameter '{}' is missing a value. Parameters are key value pairs.",
                    key
                ));
            };
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self(pairs))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_usize(&self, key: &str) -> Result<Option<usize>, RecordError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    RecordError::InvalidParameter(format!("'{}' is not a valid {}", raw, key))
                })
            })
            .transpose()
    }

    /// Build the archive selector from `raid`/`index`, raid id taking
    /// precedence when both are present.
    fn selector(&self) -> Result<ArchiveSelector, RecordError> {
        if let Some(raid_id) = self.get("raid") {
            return Ok(ArchiveSelector::RaidId(raid_id.to_string()));
        }
        if let Some(index) = self.get_usize("index")? {
            return Ok(ArchiveSelector::Index(index));
        }
        Err(RecordError::InvalidSelector(
            "need either 'raid <id>' or 'index <number>'".to_string(),
        ))
    }
}

/// Map name embedded in the raid id, which the host formats as
/// `<map>.<timestamp>`.
fn map_name(raid_id: &str) -> &str {
    match raid_id.split_once('.') {
        Some((map, _)) if !map.is_empty() => map,
        _ => "unknown map",
    }
}

/// Elapsed seconds as `1h 02m 03s`, dropping leading zero units.
fn time_string(secs: i64) -> String {
    let secs = secs.max(0);
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
