//! Lookup of the user's accounts by the identifiers statements use.
//!
//! `Account::account_number` holds a comma separated list of identifiers:
//! masked cards (`4*59`), IBANs, or virtual names such as `revolut_EUR`.
//! Identifiers are compared without whitespace and case.

use std::collections::HashMap;

use engine::Account;

use crate::{ImportError, ResultImport};

fn normalize(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

#[derive(Clone, Debug, Default)]
pub struct AccountMap {
    by_identifier: HashMap<String, Account>,
    by_name: HashMap<String, Vec<Account>>,
}

impl AccountMap {
    /// Index `accounts`. Deleted accounts are ignored; an identifier that
    /// appears on two accounts is a conflict.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> ResultImport<Self> {
        let mut map = Self::default();
        for account in accounts {
            if account.deleted_at.is_some() {
                continue;
            }
            for identifier in account.account_numbers() {
                let key = normalize(identifier);
                if let Some(other) = map.by_identifier.get(&key)
                    && other.id != account.id
                {
                    return Err(ImportError::Conflict(format!(
                        "identifier \"{identifier}\" is used by accounts {} and {}",
                        other.id, account.id
                    )));
                }
                map.by_identifier.insert(key, account.clone());
            }
            map.by_name
                .entry(account.name.clone())
                .or_default()
                .push(account);
        }
        Ok(map)
    }

    pub fn get(&self, identifier: &str) -> Option<&Account> {
        self.by_identifier.get(&normalize(identifier))
    }

    /// Like [`get`](Self::get) but reports a missing identifier as a row error.
    pub fn require(&self, identifier: &str, row: usize) -> ResultImport<&Account> {
        self.get(identifier).ok_or_else(|| {
            ImportError::row(row, format!("no account with identifier \"{identifier}\""))
        })
    }

    /// Account with exactly this name.
    pub fn by_name(&self, name: &str, row: usize) -> ResultImport<&Account> {
        match self.by_name.get(name.trim()).map(Vec::as_slice) {
            Some([account]) => Ok(account),
            Some([]) | None => Err(ImportError::row(
                row,
                format!("no account named \"{}\"", name.trim()),
            )),
            Some(_) => Err(ImportError::Conflict(format!(
                "account name \"{}\" is ambiguous",
                name.trim()
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
