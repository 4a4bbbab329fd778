//! Persistent ledger storage over RocksDB.
//!
//! Each registry lives in its own column family; records are bincode-encoded
//! except for counters, which are stored as little-endian u64. Mutations are
//! staged into a [`WriteBatch`] by the lifecycle engine and committed with a
//! single atomic write.

use crate::{cf, keys, Error, Result};
use bitkoin_primitives::{Address, Config, Token, TokenId, ADDRESS_LEN};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::path::Path;

/// Storage key for a token record: the decimal id as bytes.
fn token_key(token_id: &TokenId) -> Vec<u8> {
    token_id.to_string().into_bytes()
}

/// Parse a token key back to its id; non-canonical keys yield `None`.
fn key_to_token_id(key: &[u8]) -> Option<TokenId> {
    std::str::from_utf8(key).ok()?.parse().ok()
}

/// Storage key for an operator approval: owner || operator.
fn operator_key(owner: &Address, operator: &Address) -> [u8; ADDRESS_LEN * 2] {
    let mut key = [0u8; ADDRESS_LEN * 2];
    key[..ADDRESS_LEN].copy_from_slice(owner.as_bytes());
    key[ADDRESS_LEN..].copy_from_slice(operator.as_bytes());
    key
}

/// The persistent state of the collections ledger.
///
/// The supply counter is cached in memory and refreshed only by
/// [`CollectionsStore::commit_with_supply`], so reads never touch disk for
/// it.
pub struct CollectionsStore {
    /// RocksDB instance.
    db: DB,
    /// Cached total supply, persisted under the meta column family.
    supply: RwLock<u64>,
}

impl CollectionsStore {
    /// Open or create the ledger at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(cf::CONFIG, Options::default()),
            ColumnFamilyDescriptor::new(cf::TOKENS, Options::default()),
            ColumnFamilyDescriptor::new(cf::BALANCES, Options::default()),
            ColumnFamilyDescriptor::new(cf::APPROVALS, Options::default()),
            ColumnFamilyDescriptor::new(cf::OPERATOR_APPROVALS, Options::default()),
            ColumnFamilyDescriptor::new(cf::META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        let supply = Self::load_supply(&db)?;

        tracing::info!("Opened collections store, supply: {supply}");

        Ok(Self {
            db,
            supply: RwLock::new(supply),
        })
    }

    /// Current total supply.
    pub fn supply(&self) -> u64 {
        *self.supply.read()
    }

    /// Persisted contract configuration, defaulting when never written.
    pub fn config(&self) -> Result<Config> {
        let cf = self.db.cf_handle(cf::CONFIG).ok_or(Error::NotInitialized)?;
        match self.db.get_cf(cf, keys::CONFIG)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Config::default()),
        }
    }

    /// Look up a token record.
    pub fn token(&self, token_id: &TokenId) -> Result<Option<Token>> {
        let cf = self.db.cf_handle(cf::TOKENS).ok_or(Error::NotInitialized)?;
        match self.db.get_cf(cf, token_key(token_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of tokens currently owned by `account`, zero for unseen
    /// accounts.
    pub fn balance_of(&self, account: &Address) -> Result<u64> {
        let cf = self
            .db
            .cf_handle(cf::BALANCES)
            .ok_or(Error::NotInitialized)?;
        match self.db.get_cf(cf, account.as_bytes())? {
            Some(bytes) if bytes.len() == 8 => Ok(u64::from_le_bytes(
                bytes.try_into().expect("length checked above; qed"),
            )),
            _ => Ok(0),
        }
    }

    /// The live per-token approval, if any.
    pub fn token_approval(&self, token_id: &TokenId) -> Result<Option<Address>> {
        let cf = self
            .db
            .cf_handle(cf::APPROVALS)
            .ok_or(Error::NotInitialized)?;
        match self.db.get_cf(cf, token_key(token_id))? {
            Some(bytes) => Ok(Address::from_slice(&bytes)),
            None => Ok(None),
        }
    }

    /// The persisted operator approval for `(owner, operator)`, `None` when
    /// never written.
    pub fn operator_approval(&self, owner: &Address, operator: &Address) -> Result<Option<bool>> {
        let cf = self
            .db
            .cf_handle(cf::OPERATOR_APPROVALS)
            .ok_or(Error::NotInitialized)?;
        match self.db.get_cf(cf, operator_key(owner, operator))? {
            Some(bytes) => Ok(Some(bytes.first().copied() == Some(1))),
            None => Ok(None),
        }
    }

    // --- Staging. The engine collects writes here and commits them with a
    // single atomic `db.write`.

    pub fn stage_config(&self, batch: &mut WriteBatch, config: &Config) -> Result<()> {
        let cf = self.db.cf_handle(cf::CONFIG).ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, keys::CONFIG, bincode::serialize(config)?);
        Ok(())
    }

    pub fn stage_token(&self, batch: &mut WriteBatch, token_id: &TokenId, token: &Token) -> Result<()> {
        let cf = self.db.cf_handle(cf::TOKENS).ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, token_key(token_id), bincode::serialize(token)?);
        Ok(())
    }

    pub fn stage_balance(&self, batch: &mut WriteBatch, account: &Address, balance: u64) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf::BALANCES)
            .ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, account.as_bytes(), balance.to_le_bytes());
        Ok(())
    }

    pub fn stage_token_approval(
        &self,
        batch: &mut WriteBatch,
        token_id: &TokenId,
        approved: &Address,
    ) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf::APPROVALS)
            .ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, token_key(token_id), approved.as_bytes());
        Ok(())
    }

    pub fn stage_clear_token_approval(&self, batch: &mut WriteBatch, token_id: &TokenId) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf::APPROVALS)
            .ok_or(Error::NotInitialized)?;
        batch.delete_cf(cf, token_key(token_id));
        Ok(())
    }

    pub fn stage_operator_approval(
        &self,
        batch: &mut WriteBatch,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf::OPERATOR_APPROVALS)
            .ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, operator_key(owner, operator), [u8::from(approved)]);
        Ok(())
    }

    pub fn stage_supply(&self, batch: &mut WriteBatch, supply: u64) -> Result<()> {
        let cf = self.db.cf_handle(cf::META).ok_or(Error::NotInitialized)?;
        batch.put_cf(cf, keys::SUPPLY, supply.to_le_bytes());
        Ok(())
    }

    /// Atomically commit a staged batch.
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    /// Atomically commit a staged batch and refresh the cached supply.
    pub fn commit_with_supply(&self, batch: WriteBatch, new_supply: u64) -> Result<()> {
        self.db.write(batch)?;
        *self.supply.write() = new_supply;
        Ok(())
    }

    /// Iterate over all token records in lexicographic key order.
    pub fn iter_tokens(&self) -> TokenIterator<'_> {
        TokenIterator::new(&self.db)
    }

    /// Audit the balance ledger against the token registry.
    ///
    /// Recomputes per-account ownership counts from the token records and
    /// compares them with the incrementally maintained balances. Returns
    /// whether the two agree; every mismatch is logged.
    pub fn verify_balances(&self) -> Result<bool> {
        let mut recomputed: HashMap<Address, u64> = HashMap::new();
        for (_, token) in self.iter_tokens() {
            *recomputed.entry(token.owner).or_default() += 1;
        }

        let cf = self
            .db
            .cf_handle(cf::BALANCES)
            .ok_or(Error::NotInitialized)?;
        let mut iter = self.db.raw_iterator_cf(cf);
        iter.seek_to_first();

        let mut consistent = true;
        while iter.valid() {
            if let (Some(key), Some(value)) = (iter.key(), iter.value()) {
                if let Some(account) = Address::from_slice(key) {
                    let stored = if value.len() == 8 {
                        u64::from_le_bytes(value.try_into().expect("length checked above; qed"))
                    } else {
                        0
                    };
                    let expected = recomputed.remove(&account).unwrap_or(0);
                    if stored != expected {
                        tracing::warn!(
                            "Balance mismatch for {account}: stored {stored}, expected {expected}"
                        );
                        consistent = false;
                    }
                }
            }
            iter.next();
        }

        // Owners with token records but no balance entry at all.
        for (account, expected) in recomputed {
            if expected != 0 {
                tracing::warn!("Balance mismatch for {account}: stored 0, expected {expected}");
                consistent = false;
            }
        }

        Ok(consistent)
    }

    fn load_supply(db: &DB) -> Result<u64> {
        let Some(cf) = db.cf_handle(cf::META) else {
            return Ok(0);
        };

        match db.get_cf(cf, keys::SUPPLY)? {
            Some(bytes) if bytes.len() == 8 => Ok(u64::from_le_bytes(
                bytes.try_into().expect("length checked above; qed"),
            )),
            _ => Ok(0),
        }
    }
}

/// Iterator over all token records.
///
/// Yields (TokenId, Token) pairs in lexicographic order by token key.
pub struct TokenIterator<'a> {
    iter: rocksdb::DBRawIterator<'a>,
}

impl<'a> TokenIterator<'a> {
    fn new(db: &'a DB) -> Self {
        let cf = db
            .cf_handle(cf::TOKENS)
            .expect("TOKENS column family must exist");
        let mut iter = db.raw_iterator_cf(cf);
        iter.seek_to_first();
        Self { iter }
    }
}

impl Iterator for TokenIterator<'_> {
    type Item = (TokenId, Token);

    fn next(&mut self) -> Option<Self::Item> {
        while self.iter.valid() {
            if let (Some(key), Some(value)) = (self.iter.key(), self.iter.value()) {
                if let Some(token_id) = key_to_token_id(key) {
                    let token = bincode::deserialize(value).ok()?;
                    self.iter.next();
                    return Some((token_id, token));
                }
            }
            self.iter.next();
        }
        None
    }
}
