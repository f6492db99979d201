//! Privat24 chat exports.
//!
//! The export is a sequence of messages separated by blank lines. A header
//! line `PrivatBank, [M/D/YYYY H:MM AM|PM]` dates the messages that follow
//! it. A message looks like:
//!
//! ```text
//! 1100.00USD Переказ зі своєї карти
//! 4*59 22:40
//! Курс 41.50 USD/UAH
//! Бал. 1.21USD
//! ```
//!
//! The first line carries the amount, operation currency and description,
//! the second the masked card and the local time. Cards are resolved through
//! their `4*59` style identifier.
//!
//! A move between two own cards arrives as two messages. [`pair_match`]
//! decides whether two messages are the halves of one transfer.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use engine::{
    Account, CreateTransactionRequest, DepositCmd, ImportItem, TransferCmd, TxMeta, WithdrawalCmd,
};
use regex::{Captures, Regex};
use rust_decimal::Decimal;

use crate::{
    AccountMap, ImportError, Importer, ParseRequest, ParseResponse, ResultImport,
    util::{KeyCounter, dedup_key, parse_amount},
};

pub const SOURCE: &str = "privat24";

/// Largest distance between the two halves of a transfer.
const PAIR_WINDOW: Duration = Duration::minutes(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    CardExpense,
    CreditCardExpense,
    RemoteTransfer,
    IncomingCardTransfer,
    IncomeTransfer,
    PartialRefund,
    /// Own transfer, outgoing half.
    InternalTransferTo,
    /// Own transfer, incoming half.
    InternalTransferFrom,
}

impl Kind {
    fn is_outgoing(self) -> bool {
        matches!(
            self,
            Self::CardExpense
                | Self::CreditCardExpense
                | Self::RemoteTransfer
                | Self::InternalTransferTo
        )
    }
}

/// Why two messages were merged into one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairMatch {
    /// Both halves in the same currency and amount.
    OwnCards,
    /// Own cards in different currencies; each side keeps its own amount.
    OwnCardsConverted,
    /// A transfer to a card number that turned out to be one of ours.
    RemoteToOwnCard,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub index: usize,
    pub kind: Kind,
    /// Absolute amount in the operation currency.
    pub amount: Decimal,
    pub currency: String,
    /// Absolute amount in the card currency.
    pub card_amount: Decimal,
    pub description: String,
    pub card: String,
    pub account: Account,
    pub at: DateTime<Utc>,
    /// Another card named in the message text.
    pub mention: Option<String>,
    pub key: String,
}

impl Message {
    fn meta(&self) -> TxMeta {
        TxMeta::new(self.at)
            .title(self.description.as_str())
            .extra("card", self.card.as_str())
    }

    fn request(&self) -> CreateTransactionRequest {
        let account = &self.account;
        if self.kind.is_outgoing() {
            let mut cmd = WithdrawalCmd::new(
                account.id,
                -self.card_amount,
                account.currency.as_str(),
                self.meta(),
            );
            if self.currency != account.currency {
                cmd = cmd.fx(-self.amount, self.currency.as_str());
            }
            cmd.into()
        } else {
            DepositCmd::new(
                account.id,
                self.card_amount,
                account.currency.as_str(),
                self.meta(),
            )
            .into()
        }
    }
}

/// Decide whether `out` and `incoming` are the two halves of one transfer.
pub fn pair_match(out: &Message, incoming: &Message) -> Option<PairMatch> {
    if out.card == incoming.card || (out.at - incoming.at).abs() > PAIR_WINDOW {
        return None;
    }
    let names_other = |message: &Message, other: &Message| {
        message
            .mention
            .as_ref()
            .is_none_or(|mention| *mention == other.card)
    };
    if !names_other(out, incoming) || !names_other(incoming, out) {
        return None;
    }
    let same_value = out.currency == incoming.currency && out.amount == incoming.amount;
    match (out.kind, incoming.kind) {
        (Kind::InternalTransferTo, Kind::InternalTransferFrom) if same_value => {
            Some(PairMatch::OwnCards)
        }
        (Kind::InternalTransferTo, Kind::InternalTransferFrom)
            if out.account.currency != incoming.account.currency =>
        {
            Some(PairMatch::OwnCardsConverted)
        }
        (Kind::RemoteTransfer, Kind::IncomingCardTransfer) if same_value => {
            Some(PairMatch::RemoteToOwnCard)
        }
        _ => None,
    }
}

/// What a parsed message becomes.
#[derive(Clone, Debug)]
pub enum Planned<'a> {
    Single(&'a Message),
    Transfer {
        reason: PairMatch,
        out: &'a Message,
        incoming: &'a Message,
    },
}

/// Pair messages into transfers. Unpaired messages stay single; output keeps
/// the position of the earlier half.
pub fn plan(messages: &[Message]) -> Vec<Planned<'_>> {
    let mut used = vec![false; messages.len()];
    let mut planned = Vec::with_capacity(messages.len());
    for at in 0..messages.len() {
        if used[at] {
            continue;
        }
        used[at] = true;
        let current = &messages[at];
        let found = messages.iter().enumerate().find_map(|(index, other)| {
            if used[index] {
                return None;
            }
            if let Some(reason) = pair_match(current, other) {
                return Some((index, reason, current, other));
            }
            pair_match(other, current).map(|reason| (index, reason, other, current))
        });
        match found {
            Some((index, reason, out, incoming)) => {
                used[index] = true;
                planned.push(Planned::Transfer {
                    reason,
                    out,
                    incoming,
                });
            }
            None => planned.push(Planned::Single(current)),
        }
    }
    planned
}

#[derive(Debug)]
pub struct Privat24Importer {
    header: Regex,
    operation: Regex,
    card: Regex,
    rate: Regex,
    balance: Regex,
    available: Regex,
    mention: Regex,
    kinds: Vec<(Regex, Kind)>,
}

impl Privat24Importer {
    pub fn new() -> ResultImport<Self> {
        let kinds = [
            (r"^(Переказ зі своєї карти|Переказ на свою карт)", Kind::InternalTransferTo),
            (
                r"^Зарахування переказу (на картку|зі своєї карти)",
                Kind::InternalTransferFrom,
            ),
            (
                r"^(Зарахування переказу з картки|Переказ від)",
                Kind::IncomingCardTransfer,
            ),
            (r"^Переказ", Kind::RemoteTransfer),
            (r"^(Часткове повернення|Повернення)", Kind::PartialRefund),
            (r"^(Зарахування|Надходження)", Kind::IncomeTransfer),
        ]
        .into_iter()
        .map(|(pattern, kind)| Ok((Regex::new(pattern)?, kind)))
        .collect::<ResultImport<Vec<_>>>()?;

        Ok(Self {
            header: Regex::new(
                r"^PrivatBank, \[(\d{1,2})/(\d{1,2})/(\d{4}) (\d{1,2}):(\d{2}) ?(AM|PM)\]$",
            )?,
            operation: Regex::new(
                r"^(?P<amount>\d+(?:[.,]\d+)?) ?(?P<currency>[A-Z]{3}) (?P<description>.+)$",
            )?,
            card: Regex::new(r"^(?P<card>\d\*\d{2})(?: (?P<time>\d{1,2}:\d{2}))?(?:\s+(?P<rest>.*))?$")?,
            rate: Regex::new(
                r"Курс (?P<rate>\d+(?:[.,]\d+)?) (?P<from>[A-Z]{3})/(?P<to>[A-Z]{3})",
            )?,
            balance: Regex::new(r"^Бал\. (?P<amount>-?\d+(?:[.,]\d+)?) ?(?P<currency>[A-Z]{3})")?,
            available: Regex::new(r"^Дост\. ")?,
            mention: Regex::new(r"\d\*\d{2}")?,
            kinds,
        })
    }

    fn header_time(&self, line: &str) -> Option<DateTime<Utc>> {
        let caps = self.header.captures(line.trim())?;
        let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
        let date = NaiveDate::from_ymd_opt(number(3)? as i32, number(1)?, number(2)?)?;
        let hour = number(4)? % 12 + if &caps[6] == "PM" { 12 } else { 0 };
        let time = NaiveTime::from_hms_opt(hour, number(5)?, 0)?;
        Some(date.and_time(time).and_utc())
    }

    fn classify(&self, description: &str, lines: &[&str]) -> Kind {
        let kind = self
            .kinds
            .iter()
            .find(|(pattern, _)| pattern.is_match(description))
            .map_or(Kind::CardExpense, |(_, kind)| *kind);
        if kind == Kind::CardExpense && lines.iter().any(|line| self.available.is_match(line)) {
            Kind::CreditCardExpense
        } else {
            kind
        }
    }

    /// `Some` for transaction messages, `None` for anything else the bank
    /// sends to the chat.
    fn message(
        &self,
        index: usize,
        header: DateTime<Utc>,
        lines: &[&str],
        accounts: &AccountMap,
    ) -> ResultImport<Option<Message>> {
        let Some(operation) = lines.first().and_then(|line| self.operation.captures(line)) else {
            tracing::debug!(message = index, "privat24 message skipped");
            return Ok(None);
        };
        let card_line = lines
            .get(1)
            .and_then(|line| self.card.captures(line))
            .ok_or_else(|| ImportError::row(index, "card line missing"))?;

        let amount = parse_amount(&operation["amount"], index)?;
        let currency = operation["currency"].to_string();
        let description = operation["description"].trim().to_string();
        let card = card_line["card"].to_string();
        let account = accounts.require(&card, index)?.clone();
        let at = local_time(header, card_line.name("time").map(|m| m.as_str()));

        if let Some(balance) = lines.iter().find_map(|line| self.balance.captures(line))
            && balance["currency"] != account.currency
        {
            return Err(ImportError::row(
                index,
                format!(
                    "balance in {} but card {card} is in {}",
                    &balance["currency"], account.currency
                ),
            ));
        }

        let card_amount = if currency == account.currency {
            amount
        } else {
            let rate = lines
                .iter()
                .find_map(|line| self.rate.captures(line))
                .ok_or_else(|| {
                    ImportError::row(index, format!("no rate for {currency} on card {card}"))
                })?;
            convert(&rate, amount, &currency, &account.currency, index)?
        };

        let mention = std::iter::once(description.as_str())
            .chain(card_line.name("rest").map(|m| m.as_str()))
            .flat_map(|text| self.mention.find_iter(text))
            .map(|m| m.as_str().to_string())
            .find(|other| *other != card);

        let key = dedup_key(&[
            amount.to_string().as_str(),
            currency.as_str(),
            card.as_str(),
            account.currency.as_str(),
            at.to_rfc3339().as_str(),
            description.as_str(),
        ]);
        Ok(Some(Message {
            index,
            kind: self.classify(&description, lines),
            amount,
            currency,
            card_amount,
            description,
            card,
            account,
            at,
            mention,
            key,
        }))
    }

    pub fn messages(&self, text: &str, accounts: &AccountMap) -> ResultImport<Vec<Message>> {
        let mut messages = Vec::new();
        let mut keys = KeyCounter::default();
        let mut header = None;
        let mut index = 0;
        for block in blocks(text) {
            let mut lines = block.as_slice();
            if let Some(at) = lines.first().and_then(|line| self.header_time(line)) {
                header = Some(at);
                lines = &lines[1..];
            }
            if lines.is_empty() {
                continue;
            }
            index += 1;
            let at = header.ok_or_else(|| ImportError::row(index, "message without header"))?;
            if let Some(mut message) = self.message(index, at, lines, accounts)? {
                message.key = keys.unique(std::mem::take(&mut message.key));
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

/// Non-empty lines grouped by blank-line separators.
fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = vec![Vec::new()];
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            blocks.push(Vec::new());
        } else if let Some(current) = blocks.last_mut() {
            current.push(line);
        }
    }
    blocks.retain(|block| !block.is_empty());
    blocks
}

/// Put the message-local time on the header's day. A time far after the
/// header belongs to the day before.
fn local_time(header: DateTime<Utc>, time: Option<&str>) -> DateTime<Utc> {
    let Some(time) = time.and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok()) else {
        return header;
    };
    let at = header.date_naive().and_time(time).and_utc();
    if at - header > Duration::hours(12) {
        at - Duration::days(1)
    } else {
        at
    }
}

/// Card-side amount from a `Курс R FROM/TO` clause, where one `FROM` is `R`
/// `TO`.
fn convert(
    rate: &Captures<'_>,
    amount: Decimal,
    currency: &str,
    card_currency: &str,
    index: usize,
) -> ResultImport<Decimal> {
    let value = parse_amount(&rate["rate"], index)?;
    if value.is_zero() {
        return Err(ImportError::row(index, "zero exchange rate"));
    }
    let converted = match (&rate["from"], &rate["to"]) {
        (from, to) if from == currency && to == card_currency => amount * value,
        (from, to) if from == card_currency && to == currency => amount / value,
        (from, to) => {
            return Err(ImportError::row(
                index,
                format!("rate {from}/{to} does not convert {currency} to {card_currency}"),
            ));
        }
    };
    Ok(converted.round_dp(2))
}

impl Importer for Privat24Importer {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse> {
        let data = request
            .data
            .strip_prefix(b"\xEF\xBB\xBF")
            .unwrap_or(request.data);
        let text = std::str::from_utf8(data)
            .map_err(|err| ImportError::row(0, format!("export is not UTF-8: {err}")))?;
        let messages = self.messages(text, request.accounts)?;

        let mut response = ParseResponse::default();
        for planned in plan(&messages) {
            let item = match planned {
                Planned::Single(message) => ImportItem {
                    request: message.request(),
                    dedup_keys: vec![message.key.clone()],
                },
                Planned::Transfer {
                    reason,
                    out,
                    incoming,
                } => {
                    tracing::debug!(
                        ?reason,
                        out = out.index,
                        incoming = incoming.index,
                        "privat24 messages merged"
                    );
                    response.merged += 1;
                    ImportItem {
                        request: TransferCmd::new(
                            (out.account.id, -out.card_amount, out.account.currency.as_str()),
                            (
                                incoming.account.id,
                                incoming.card_amount,
                                incoming.account.currency.as_str(),
                            ),
                            out.meta().extra("pair", format!("{reason:?}")),
                        )
                        .into(),
                        dedup_keys: vec![out.key.clone(), incoming.key.clone()],
                    }
                }
            };
            response.items.push(item);
        }
        tracing::debug!(
            rows = response.items.len(),
            merged = response.merged,
            "privat24 export parsed"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use engine::AccountType;
    use rust_decimal_macros::dec;

    use super::*;

    fn accounts() -> AccountMap {
        let list = [(1, "4*59", "USD"), (2, "4*71", "USD"), (3, "4*67", "UAH")].map(
            |(id, card, currency)| {
                let mut account =
                    Account::new(&format!("Card {card}"), currency, AccountType::Asset)
                        .account_number(card);
                account.id = id;
                account
            },
        );
        AccountMap::new(list).unwrap()
    }

    fn parse(text: &str) -> ResultImport<ParseResponse> {
        let accounts = accounts();
        let empty = HashMap::new();
        Privat24Importer::new()?.parse(&ParseRequest {
            data: text.as_bytes(),
            accounts: &accounts,
            tags: &empty,
            categories: &empty,
        })
    }

    const OWN_TRANSFER: &str = "PrivatBank, [1/15/2024 10:41 PM]\n\
        1100.00USD Переказ зі своєї карти\n\
        4*59 22:40\n\
        Бал. 1.21USD\n\
        \n\
        1100.00USD Зарахування переказу на картку\n\
        4*71 22:40\n\
        Бал. 1.60USD\n";

    #[test]
    fn own_card_halves_become_one_transfer() {
        let response = parse(OWN_TRANSFER).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.merged, 1);
        let CreateTransactionRequest::Transfer(cmd) = &response.items[0].request else {
            panic!("expected transfer");
        };
        assert_eq!((cmd.source_account_id, cmd.destination_account_id), (1, 2));
        assert_eq!(cmd.source_amount, dec!(-1100.00));
        assert_eq!(cmd.destination_amount, dec!(1100.00));
        assert_eq!(cmd.source_currency, "USD");
        assert_eq!(response.items[0].dedup_keys.len(), 2);
        assert_eq!(
            cmd.meta.transaction_date.map(|d| d.to_rfc3339()),
            Some("2024-01-15T22:40:00+00:00".to_string())
        );
    }

    #[test]
    fn halves_too_far_apart_stay_single() {
        let text = "PrivatBank, [1/15/2024 10:41 PM]\n\
            100.00USD Переказ зі своєї карти\n\
            4*59 22:30\n\
            \n\
            100.00USD Зарахування переказу на картку\n\
            4*71 22:40\n";
        let response = parse(text).unwrap();
        assert_eq!(response.merged, 0);
        assert!(matches!(response.items[0].request, CreateTransactionRequest::Withdrawal(_)));
        assert!(matches!(response.items[1].request, CreateTransactionRequest::Deposit(_)));
    }

    #[test]
    fn foreign_purchase_converts_with_the_rate() {
        let text = "PrivatBank, [2/3/2024 9:15 AM]\n\
            10.00USD Оплата Steam\n\
            4*67 09:14\n\
            Курс 41.50 USD/UAH\n\
            Бал. 1000.00UAH\n";
        let response = parse(text).unwrap();
        let CreateTransactionRequest::Withdrawal(cmd) = &response.items[0].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(cmd.source_account_id, 3);
        assert_eq!(cmd.source_amount, dec!(-415.00));
        assert_eq!(cmd.source_currency, "UAH");
        assert_eq!(cmd.fx_source_amount, Some(dec!(-10.00)));
    }

    #[test]
    fn inverse_rate_divides() {
        let text = "PrivatBank, [2/3/2024 9:15 AM]\n\
            830.00UAH Оплата карткою\n\
            4*59 09:14\n\
            Курс 41.50 USD/UAH\n";
        let response = parse(text).unwrap();
        let CreateTransactionRequest::Withdrawal(cmd) = &response.items[0].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(cmd.source_amount, dec!(-20.00));
    }

    #[test]
    fn balance_currency_must_match_the_card() {
        let text = "PrivatBank, [2/3/2024 9:15 AM]\n\
            5.00USD Кава\n\
            4*59 09:14\n\
            Бал. 100.00UAH\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ImportError::Row { row: 1, .. }));
    }

    #[test]
    fn refunds_and_credit_purchases_are_classified() {
        let importer = Privat24Importer::new().unwrap();
        assert_eq!(
            importer.classify("Часткове повернення коштів", &[]),
            Kind::PartialRefund
        );
        assert_eq!(
            importer.classify("Оплата АЗС", &["Дост. 5000.00UAH"]),
            Kind::CreditCardExpense
        );
        assert_eq!(importer.classify("Переказ на картку 5168", &[]), Kind::RemoteTransfer);
    }

    #[test]
    fn mention_of_a_third_card_prevents_the_pair() {
        let accounts = accounts();
        let importer = Privat24Importer::new().unwrap();
        let text = "PrivatBank, [1/15/2024 10:41 PM]\n\
            50.00USD Переказ зі своєї карти 4*67\n\
            4*59 22:40\n\
            \n\
            50.00USD Зарахування переказу на картку\n\
            4*71 22:41\n";
        let messages = importer.messages(text, &accounts).unwrap();
        assert_eq!(messages[0].mention.as_deref(), Some("4*67"));
        assert_eq!(pair_match(&messages[0], &messages[1]), None);
    }

    #[test]
    fn late_time_belongs_to_the_previous_day() {
        let header = NaiveDate::from_ymd_opt(2024, 1, 16)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap()
            .and_utc();
        let at = local_time(header, Some("23:58"));
        assert_eq!(at.to_rfc3339(), "2024-01-15T23:58:00+00:00");
    }

    #[test]
    fn repeated_purchases_in_one_minute_keep_distinct_keys() {
        let text = "PrivatBank, [2/3/2024 9:15 AM]\n\
            5.00USD Кава\n\
            4*59 09:14\n\
            \n\
            5.00USD Кава\n\
            4*59 09:14\n";
        let response = parse(text).unwrap();
        assert_eq!(response.items.len(), 2);
        assert_ne!(response.items[0].dedup_keys, response.items[1].dedup_keys);
    }

    #[test]
    fn chat_noise_is_ignored() {
        let text = "PrivatBank, [1/15/2024 10:41 PM]\nВаш пароль: 1234\n";
        assert!(parse(text).unwrap().items.is_empty());
    }
}
