//! # RocksDB Read Store
//!
//! Durable read store. Every projection is one `WriteBatch`, so contract
//! rows, audit entries and the applied watermark move together.
//!
//! ## Column Families
//!
//! - `contracts` - id text → bincode(`ContractRecord`)
//! - `audit` - sequence (8-byte big-endian) → bincode(`AuditEntry`)
//! - `meta` - `applied_sequence` → u64 big-endian

use std::collections::BTreeSet;
use std::path::Path;

use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use shared_types::{AuditEntry, ContractId, ContractRecord, Sequence};
use tracing::info;

use crate::domain::{Projection, StoreError, StoreWrite};
use crate::ports::{checked_sum, ReadStore};

pub const CF_CONTRACTS: &str = "contracts";
pub const CF_AUDIT: &str = "audit";
pub const CF_META: &str = "meta";

/// All column families used by the read store
pub const COLUMN_FAMILIES: &[&str] = &[CF_CONTRACTS, CF_AUDIT, CF_META];

const APPLIED_KEY: &[u8] = b"applied_sequence";

/// RocksDB tuning for the read store.
#[derive(Debug, Clone)]
pub struct RocksDbStoreConfig {
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// fsync every batch (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbStoreConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: 16 * 1024 * 1024,
            block_cache_size: 32 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbStoreConfig {
    /// Small buffers, no fsync.
    pub fn for_testing() -> Self {
        Self {
            write_buffer_size: 1024 * 1024,
            block_cache_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbReadStore {
    db: DB,
    config: RocksDbStoreConfig,
}

fn backend(context: &str) -> impl FnOnce(rocksdb::Error) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("{context}: {e}"))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Corrupted(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Corrupted(e.to_string()))
}

impl RocksDbReadStore {
    pub fn open(path: impl AsRef<Path>, config: RocksDbStoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(backend("open"))?;
        info!(path = %path.as_ref().display(), "Opened RocksDB read store");
        Ok(Self { db, config })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family {name}")))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts).map_err(backend("batch write"))
    }

    fn contract_key(id: &ContractId) -> &[u8] {
        id.as_str().as_bytes()
    }

    fn scan_contracts(&self) -> Result<Vec<(ContractId, ContractRecord)>, StoreError> {
        let cf = self.cf(CF_CONTRACTS)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(backend("scan contracts"))?;
            let text = std::str::from_utf8(&key)
                .map_err(|e| StoreError::Corrupted(format!("contract key: {e}")))?;
            let id = ContractId::parse(text)
                .map_err(|e| StoreError::Corrupted(format!("contract key: {e}")))?;
            out.push((id, decode(&value)?));
        }
        Ok(out)
    }
}

impl ReadStore for RocksDbReadStore {
    fn upsert_balance(&self, id: &ContractId, balance: i64) -> Result<(), StoreError> {
        let mut record = self
            .get_contract(id)?
            .ok_or_else(|| StoreError::MissingContract(id.clone()))?;
        record.balance = balance;
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_CONTRACTS)?, Self::contract_key(id), encode(&record)?);
        self.write(batch)
    }

    fn insert_contract(
        &self,
        id: &ContractId,
        public_key: &[u8],
        shared_secret: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        if self.get_contract(id)?.is_some() {
            return Ok(());
        }
        let record = ContractRecord::new(public_key.to_vec(), shared_secret.map(<[u8]>::to_vec));
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_CONTRACTS)?, Self::contract_key(id), encode(&record)?);
        self.write(batch)
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_AUDIT)?, entry.sequence.to_be_bytes(), encode(entry)?);
        self.write(batch)
    }

    fn sum_balances(&self, ids: &[ContractId]) -> Result<i64, StoreError> {
        let unique: BTreeSet<&ContractId> = ids.iter().collect();
        let mut balances = Vec::with_capacity(unique.len());
        for id in unique {
            if let Some(record) = self.get_contract(id)? {
                balances.push(record.balance);
            }
        }
        checked_sum(balances)
    }

    fn sum_all(&self) -> Result<i64, StoreError> {
        checked_sum(self.scan_contracts()?.into_iter().map(|(_, r)| r.balance))
    }

    fn list_all(&self) -> Result<Vec<(ContractId, ContractRecord)>, StoreError> {
        self.scan_contracts()
    }

    fn get_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, StoreError> {
        self.db
            .get_cf(self.cf(CF_CONTRACTS)?, Self::contract_key(id))
            .map_err(backend("get contract"))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn audit_for(&self, id: &ContractId) -> Result<Vec<AuditEntry>, StoreError> {
        let cf = self.cf(CF_AUDIT)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(backend("scan audit"))?;
            let entry: AuditEntry = decode(&value)?;
            if entry.involves(id) {
                out.push(entry);
            }
        }
        Ok(out)
    }

    fn applied_sequence(&self) -> Result<Sequence, StoreError> {
        match self
            .db
            .get_cf(self.cf(CF_META)?, APPLIED_KEY)
            .map_err(backend("get watermark"))?
        {
            None => Ok(0),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corrupted(format!("watermark of {} bytes", bytes.len()))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
        }
    }

    fn apply_projection(&self, projection: &Projection) -> Result<bool, StoreError> {
        if projection.sequence <= self.applied_sequence()? {
            return Ok(false);
        }

        let contracts = self.cf(CF_CONTRACTS)?;
        let mut batch = WriteBatch::default();
        // Records touched by this batch, so a later write sees an earlier one.
        let mut staged: Vec<(ContractId, ContractRecord)> = Vec::new();

        for write in &projection.writes {
            match write {
                StoreWrite::InsertContract {
                    id,
                    public_key,
                    shared_secret,
                } => {
                    if staged.iter().any(|(s, _)| s == id) || self.get_contract(id)?.is_some() {
                        continue;
                    }
                    let record = ContractRecord::new(public_key.clone(), shared_secret.clone());
                    batch.put_cf(contracts, Self::contract_key(id), encode(&record)?);
                    staged.push((id.clone(), record));
                }
                StoreWrite::UpsertBalance { id, balance } => {
                    let mut record = match staged.iter().rev().find(|(s, _)| s == id) {
                        Some((_, record)) => record.clone(),
                        None => self
                            .get_contract(id)?
                            .ok_or_else(|| StoreError::MissingContract(id.clone()))?,
                    };
                    record.balance = *balance;
                    batch.put_cf(contracts, Self::contract_key(id), encode(&record)?);
                    staged.push((id.clone(), record));
                }
                StoreWrite::AppendAudit(entry) => {
                    batch.put_cf(self.cf(CF_AUDIT)?, entry.sequence.to_be_bytes(), encode(entry)?);
                }
            }
        }
        batch.put_cf(self.cf(CF_META)?, APPLIED_KEY, projection.sequence.to_be_bytes());
        self.write(batch)?;
        Ok(true)
    }

    fn rebase(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<bool, StoreError> {
        if sequence <= self.applied_sequence()? {
            return Ok(false);
        }
        let cf = self.cf(CF_CONTRACTS)?;
        let mut batch = WriteBatch::default();
        for (id, _) in self.scan_contracts()? {
            batch.delete_cf(cf, Self::contract_key(&id));
        }
        for (id, record) in contracts {
            batch.put_cf(cf, Self::contract_key(id), encode(record)?);
        }
        batch.put_cf(self.cf(CF_META)?, APPLIED_KEY, sequence.to_be_bytes());
        self.write(batch)?;
        info!(sequence, contracts = contracts.len(), "Read store rebased");
        Ok(true)
    }

    fn rewind(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<(), StoreError> {
        let cf = self.cf(CF_CONTRACTS)?;
        let audit = self.cf(CF_AUDIT)?;
        let mut batch = WriteBatch::default();
        for (id, _) in self.scan_contracts()? {
            batch.delete_cf(cf, Self::contract_key(&id));
        }
        for (id, record) in contracts {
            batch.put_cf(cf, Self::contract_key(id), encode(record)?);
        }
        let from = sequence.saturating_add(1).to_be_bytes();
        let mut dropped = 0usize;
        for item in self
            .db
            .iterator_cf(audit, IteratorMode::From(&from, Direction::Forward))
        {
            let (key, _) = item.map_err(backend("scan audit"))?;
            batch.delete_cf(audit, key);
            dropped += 1;
        }
        batch.put_cf(self.cf(CF_META)?, APPLIED_KEY, sequence.to_be_bytes());
        self.write(batch)?;
        info!(sequence, dropped_audit = dropped, "Read store rewound");
        Ok(())
    }
}
