//! Mock collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use embercore_types::Address;
use parking_lot::RwLock;

use crate::traits::{AccountState, MempoolHost, SelectionSession, Transaction};
use crate::{MempoolError, Result};

/// A transaction with directly settable fields.
#[derive(Debug, Clone)]
pub struct MockTransaction {
    sender: Address,
    nonce: u64,
    gas_limit: u64,
    gas_price: u64,
    data: Vec<u8>,
    value: u128,
    relayer: Option<Address>,
}

impl MockTransaction {
    /// Creates a plain transfer with the default gas settings.
    pub fn new(sender: Address, nonce: u64) -> Self {
        Self {
            sender,
            nonce,
            gas_limit: 50_000,
            gas_price: 1_000_000_000,
            data: Vec::new(),
            value: 1,
            relayer: None,
        }
    }

    /// Sets the gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the gas price.
    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Sets the payload data.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets the transferred value.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Marks the transaction as relayed.
    pub fn with_relayer(mut self, relayer: Address) -> Self {
        self.relayer = Some(relayer);
        self
    }
}

impl Transaction for MockTransaction {
    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn sender(&self) -> Address {
        self.sender
    }

    fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn gas_price(&self) -> u64 {
        self.gas_price
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn value(&self) -> u128 {
        self.value
    }

    fn relayer(&self) -> Option<Address> {
        self.relayer
    }
}

/// A host with a simple movement/processing fee model.
///
/// For a dataless transaction at the base gas limit the fee works out to
/// `gas_price * gas_limit`, so the price per gas unit equals the gas price —
/// convenient when tests reason about selection order.
pub struct MockMempoolHost {
    min_gas_limit: u64,
    gas_per_data_byte: u64,
    gas_price_modifier: f64,
    fixed_fee: Option<u128>,
}

impl MockMempoolHost {
    /// Creates a host with the default fee parameters.
    pub fn new() -> Self {
        Self {
            min_gas_limit: 50_000,
            gas_per_data_byte: 1_500,
            gas_price_modifier: 0.01,
            fixed_fee: None,
        }
    }

    /// Makes the host report the given fee for every transaction.
    pub fn with_fixed_fee(mut self, fee: u128) -> Self {
        self.fixed_fee = Some(fee);
        self
    }
}

impl Default for MockMempoolHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MempoolHost for MockMempoolHost {
    fn compute_tx_fee(&self, tx: &dyn Transaction) -> u128 {
        if let Some(fee) = self.fixed_fee {
            return fee;
        }

        let data_length = tx.data().len() as u64;
        let gas_price_for_movement = tx.gas_price();
        let gas_price_for_processing =
            (gas_price_for_movement as f64 * self.gas_price_modifier) as u64;

        let gas_limit_for_movement =
            (self.min_gas_limit + data_length * self.gas_per_data_byte).min(tx.gas_limit());
        let gas_limit_for_processing = tx.gas_limit() - gas_limit_for_movement;

        u128::from(gas_price_for_movement) * u128::from(gas_limit_for_movement)
            + u128::from(gas_price_for_processing) * u128::from(gas_limit_for_processing)
    }

    fn transferred_value(&self, tx: &dyn Transaction) -> u128 {
        tx.value()
    }
}

const DEFAULT_BALANCE: u128 = 1_000_000_000_000_000_000;

/// A session with settable per-address nonces, balances, and guard state.
///
/// Unknown addresses report nonce zero and a large default balance.
pub struct MockSelectionSession {
    account_states: RwLock<HashMap<Address, AccountState>>,
    failing_addresses: RwLock<HashSet<Address>>,
    incorrectly_guarded_senders: RwLock<HashSet<Address>>,
    num_calls_account_state: AtomicUsize,
}

impl MockSelectionSession {
    /// Creates a session with no configured accounts.
    pub fn new() -> Self {
        Self {
            account_states: RwLock::new(HashMap::new()),
            failing_addresses: RwLock::new(HashSet::new()),
            incorrectly_guarded_senders: RwLock::new(HashSet::new()),
            num_calls_account_state: AtomicUsize::new(0),
        }
    }

    fn default_state() -> AccountState {
        AccountState {
            nonce: 0,
            balance: DEFAULT_BALANCE,
        }
    }

    /// Sets the nonce reported for an address.
    pub fn set_nonce(&self, address: &Address, nonce: u64) {
        self.account_states
            .write()
            .entry(*address)
            .or_insert_with(Self::default_state)
            .nonce = nonce;
    }

    /// Sets the balance reported for an address.
    pub fn set_balance(&self, address: &Address, balance: u128) {
        self.account_states
            .write()
            .entry(*address)
            .or_insert_with(Self::default_state)
            .balance = balance;
    }

    /// Makes account state retrieval fail for an address.
    pub fn set_failing(&self, address: &Address) {
        self.failing_addresses.write().insert(*address);
    }

    /// Marks every transaction of the given sender as incorrectly guarded.
    pub fn set_incorrectly_guarded(&self, sender: &Address) {
        self.incorrectly_guarded_senders.write().insert(*sender);
    }

    /// How many times the session was asked for an account state.
    pub fn num_calls_account_state(&self) -> usize {
        self.num_calls_account_state.load(Ordering::SeqCst)
    }
}

impl Default for MockSelectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSession for MockSelectionSession {
    fn account_state(&self, address: &Address) -> Result<AccountState> {
        self.num_calls_account_state.fetch_add(1, Ordering::SeqCst);

        if self.failing_addresses.read().contains(address) {
            return Err(MempoolError::AccountStateUnavailable(address.to_string()));
        }

        Ok(self
            .account_states
            .read()
            .get(address)
            .copied()
            .unwrap_or_else(Self::default_state))
    }

    fn is_incorrectly_guarded(&self, tx: &dyn Transaction) -> bool {
        self.incorrectly_guarded_senders
            .read()
            .contains(&tx.sender())
    }
}
