//! Replays a CSV command stream against a [`TokenLedger`].
//!
//! This is the host side of the ledger: it owns the post directory, resolves
//! who gets paid for a like, and logs what the ledger rejected. Commands are
//! applied in file order; a rejected command is logged and skipped.

use crate::command::{CommandKind, CommandRecord, ParsedCommand};
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ledger::TokenLedger;
use crate::posts::PostDirectory;
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::io::{Read, Write};

pub struct LedgerReplay {
    ledger: TokenLedger,
    posts: PostDirectory,
}

impl LedgerReplay {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_ledger(TokenLedger::new(config))
    }

    /// Replays on top of an existing ledger (e.g. one with a manual clock).
    pub fn with_ledger(ledger: TokenLedger) -> Self {
        LedgerReplay {
            ledger,
            posts: PostDirectory::new(),
        }
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn posts(&self) -> &PostDirectory {
        &self.posts
    }

    /// Processes commands from a CSV reader in streaming fashion.
    ///
    /// Invalid records and rejected commands are logged at warn level and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse() {
                    Some(command) => {
                        if let Err(e) = self.apply(command, row_num) {
                            warn!("Row {}: {}", row_num, e);
                        }
                    }
                    None => warn!("Row {}: Failed to parse command record", row_num),
                },
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        Ok(())
    }

    /// Applies a single parsed command.
    pub fn apply(&mut self, command: ParsedCommand, row: usize) -> Result<()> {
        let user = command.user;

        match command.kind {
            CommandKind::Register => {
                let account = self.ledger.register(user)?;
                debug!("Row {}: Registered user {} with {}", row, user, account.balance);
            }
            CommandKind::Post { post, reshare_of } => {
                if self.posts.publish(post, user, reshare_of) {
                    debug!("Row {}: User {} published post {}", row, user, post);
                } else {
                    warn!("Row {}: Post {} already exists, ignoring", row, post);
                }
            }
            CommandKind::Like(post) => {
                let owner = self.posts.credit_recipient(post)?;
                let receipt = self.ledger.like(post, user, owner)?;
                if receipt.transfer.is_partial() {
                    warn!(
                        "Row {}: Author {} of post {} has no account, like fee was not credited",
                        row, owner, post
                    );
                }
                debug!(
                    "Row {}: User {} liked post {}, paid {} to user {}",
                    row, user, post, self.ledger.config().like_fee, owner
                );
            }
            CommandKind::Unlike(post) => {
                self.ledger.unlike(post, user)?;
                debug!("Row {}: User {} unliked post {} (no refund)", row, user, post);
            }
            CommandKind::Purchase(amount) => {
                let credit = self.ledger.purchase(user, amount)?;
                debug!(
                    "Row {}: User {} purchased {}, balance {}",
                    row, user, amount, credit.account.balance
                );
            }
            CommandKind::Reward => {
                let credit = self.ledger.claim_daily_reward(user)?;
                debug!(
                    "Row {}: User {} claimed daily reward, balance {}",
                    row, user, credit.account.balance
                );
            }
        }

        Ok(())
    }

    /// Writes final balances to CSV, sorted by user id.
    pub fn write_accounts<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["user", "balance"])?;

        for account in self.ledger.accounts()? {
            csv_writer.write_record([account.user_id.to_string(), account.balance.to_string()])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes every journal entry to CSV in append order.
    pub fn write_journal<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "id",
            "user",
            "amount",
            "kind",
            "reference",
            "description",
            "created_at",
        ])?;

        for entry in self.ledger.journal()? {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.user_id.to_string(),
                entry.amount.to_string(),
                entry.kind.to_string(),
                entry.reference_id.map(|r| r.to_string()).unwrap_or_default(),
                entry.description,
                entry.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for LedgerReplay {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay_csv_str(csv: &str) -> LedgerReplay {
        let mut replay = LedgerReplay::default();
        replay.process_csv(Cursor::new(csv)).unwrap();
        replay
    }

    fn balance(replay: &LedgerReplay, user: u64) -> String {
        replay.ledger().get_balance(user).unwrap().balance.to_string()
    }

    #[test]
    fn test_like_moves_fee_to_author() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
register,2,,,
post,2,100,,
like,1,100,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "9.9000");
        assert_eq!(balance(&replay, 2), "10.1000");
        assert!(replay.ledger().has_liked(100, 1).unwrap());
        assert_eq!(replay.ledger().journal().unwrap().len(), 2);
    }

    #[test]
    fn test_double_like_is_skipped() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
register,2,,,
post,2,100,,
like,1,100,,
like,1,100,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "9.9000");
        assert_eq!(replay.ledger().like_count(100).unwrap(), 1);
    }

    #[test]
    fn test_reshare_like_pays_original_author() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
register,2,,,
register,3,,,
post,2,100,,
post,3,101,100,
like,1,101,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 2), "10.1000");
        assert_eq!(balance(&replay, 3), "10.0000");
    }

    #[test]
    fn test_like_of_unknown_post_is_skipped() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
like,1,404,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "10.0000");
        assert!(replay.ledger().journal().unwrap().is_empty());
    }

    #[test]
    fn test_author_without_account_gets_nothing() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
post,2,100,,
like,1,100,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "9.9000");
        assert!(replay.ledger().get_balance(2).is_err());
        assert_eq!(replay.ledger().journal().unwrap().len(), 1);
    }

    #[test]
    fn test_purchase_and_reward() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
purchase,1,,,2.5
reward,1,,,
reward,1,,,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "13.0000");
    }

    #[test]
    fn test_oversized_purchase_is_skipped() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
purchase,1,,,79228162514264337593543950335
purchase,1,,,7000000000000000000000000
purchase,1,,,7000000000000000000000000"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "7000000000000000000000010.0000");
        assert_eq!(replay.ledger().journal().unwrap().len(), 1);

        let mut output = Vec::new();
        replay.write_accounts(&mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,balance\n1,7000000000000000000000010.0000\n"
        );
    }

    #[test]
    fn test_whitespace_handling() {
        let csv = r#"type, user, post, reshare_of, amount
register, 1, , ,
register, 2, , ,
post, 2, 100, ,
like, 1, 100, ,"#;

        let replay = replay_csv_str(csv);
        assert_eq!(balance(&replay, 1), "9.9000");
    }

    #[test]
    fn test_accounts_output_format() {
        let csv = r#"type,user,post,reshare_of,amount
register,2,,,
register,1,,,"#;

        let replay = replay_csv_str(csv);
        let mut output = Vec::new();
        replay.write_accounts(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str, "user,balance\n1,10.0000\n2,10.0000\n");
    }

    #[test]
    fn test_journal_output_format() {
        let csv = r#"type,user,post,reshare_of,amount
register,1,,,
register,2,,,
post,2,100,,
like,1,100,,"#;

        let replay = replay_csv_str(csv);
        let mut output = Vec::new();
        replay.write_journal(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines[0], "id,user,amount,kind,reference,description,created_at");
        assert!(lines[1].starts_with("1,1,-0.1000,like_debit,100,Like fee for post 100,"));
        assert!(lines[2].starts_with("2,2,0.1000,like_credit,100,Like fee for post 100,"));
        assert_eq!(lines.len(), 3);
    }
}
