//! Wrapped transaction with host-derived fields.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use embercore_types::{Address, H256};

use crate::traits::{MempoolHost, Transaction};

/// A transaction together with the fields the cache derives from it once.
///
/// The derived fields (fee, transferred value, fee payer, price per gas unit)
/// are populated by the façade before the wrapper is shared with any other
/// component; nothing mutates a wrapped transaction after insertion.
pub struct WrappedTransaction {
    tx: Arc<dyn Transaction>,
    tx_hash: H256,
    size: u64,

    // Derived by precompute_fields, immutable afterwards.
    fee: u128,
    transferred_value: u128,
    fee_payer: Address,
    price_per_gas_unit: u128,
}

impl WrappedTransaction {
    /// Wraps a transaction, recording its unique hash and serialized size.
    ///
    /// The derived fields stay zeroed until the cache populates them on add.
    pub fn new(tx: Arc<dyn Transaction>, tx_hash: H256, size: u64) -> Self {
        Self {
            tx,
            tx_hash,
            size,
            fee: 0,
            transferred_value: 0,
            fee_payer: Address::ZERO,
            price_per_gas_unit: 0,
        }
    }

    /// Populates the derived fields using the host.
    ///
    /// Deterministic given the transaction fields, so recomputing is harmless.
    pub(crate) fn precompute_fields(&mut self, host: &dyn MempoolHost) {
        let fee = host.compute_tx_fee(self.tx.as_ref());
        let gas_limit = self.tx.gas_limit();

        self.fee = fee;
        self.transferred_value = host.transferred_value(self.tx.as_ref());
        self.fee_payer = self.tx.relayer().unwrap_or_else(|| self.tx.sender());
        self.price_per_gas_unit = if gas_limit == 0 {
            0
        } else {
            fee / gas_limit as u128
        };
    }

    /// The underlying transaction.
    pub fn tx(&self) -> &Arc<dyn Transaction> {
        &self.tx
    }

    /// Unique transaction hash.
    pub fn tx_hash(&self) -> H256 {
        self.tx_hash
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Fee charged to the fee payer.
    pub fn fee(&self) -> u128 {
        self.fee
    }

    /// Value debited from the sender.
    pub fn transferred_value(&self) -> u128 {
        self.transferred_value
    }

    /// Address charged the fee (the relayer for relayed transactions,
    /// otherwise the sender).
    pub fn fee_payer(&self) -> Address {
        self.fee_payer
    }

    /// Fee per gas unit, the primary score in eviction and selection.
    pub fn price_per_gas_unit(&self) -> u128 {
        self.price_per_gas_unit
    }

    // ==========================================================================
    // Forwarding methods for convenience
    // ==========================================================================

    /// Sender nonce.
    pub fn nonce(&self) -> u64 {
        self.tx.nonce()
    }

    /// Sender address.
    pub fn sender(&self) -> Address {
        self.tx.sender()
    }

    /// Gas limit.
    pub fn gas_limit(&self) -> u64 {
        self.tx.gas_limit()
    }

    /// Gas price.
    pub fn gas_price(&self) -> u64 {
        self.tx.gas_price()
    }
}

impl fmt::Debug for WrappedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedTransaction")
            .field("tx_hash", &self.tx_hash)
            .field("sender", &self.tx.sender())
            .field("nonce", &self.tx.nonce())
            .field("size", &self.size)
            .field("fee", &self.fee)
            .field("price_per_gas_unit", &self.price_per_gas_unit)
            .finish()
    }
}

/// Ranks two transactions by desirability for the network.
///
/// `Ordering::Greater` means `a` should be selected before `b` (and evicted
/// after it): higher price per gas unit first, then lower sender address,
/// then lower hash. Total over distinct transactions, which makes both the
/// selection and the eviction heap deterministic.
pub(crate) fn rank_for_selection(a: &WrappedTransaction, b: &WrappedTransaction) -> Ordering {
    a.price_per_gas_unit
        .cmp(&b.price_per_gas_unit)
        .then_with(|| b.sender().cmp(&a.sender()))
        .then_with(|| b.tx_hash.cmp(&a.tx_hash))
}
