//! Per-selection caching wrapper over the selection session.

use std::collections::HashMap;

use embercore_types::Address;
use tracing::debug;

use crate::traits::{SelectionSession, Transaction};
use crate::tx::WrappedTransaction;

/// Account state cached for the duration of one selection pass.
pub(crate) struct AccountRecord {
    pub initial_nonce: u64,
    pub initial_balance: u128,
    pub consumed_balance: u128,
}

/// Caches per-address state the first time it is consulted and accumulates
/// the balance consumed by selected transactions.
///
/// Owned by a single selection call; no synchronization needed.
pub(crate) struct SelectionSessionWrapper<'a> {
    session: &'a dyn SelectionSession,
    records_by_address: HashMap<Address, AccountRecord>,
}

impl<'a> SelectionSessionWrapper<'a> {
    pub fn new(session: &'a dyn SelectionSession) -> Self {
        Self {
            session,
            records_by_address: HashMap::new(),
        }
    }

    fn record(&mut self, address: &Address) -> &mut AccountRecord {
        self.records_by_address
            .entry(*address)
            .or_insert_with(|| match self.session.account_state(address) {
                Ok(state) => AccountRecord {
                    initial_nonce: state.nonce,
                    initial_balance: state.balance,
                    consumed_balance: 0,
                },
                Err(err) => {
                    debug!(address = %address, %err, "could not retrieve account state");
                    AccountRecord {
                        initial_nonce: 0,
                        initial_balance: 0,
                        consumed_balance: 0,
                    }
                }
            })
    }

    /// Initial nonce of the account, as of the start of the pass.
    pub fn nonce(&mut self, address: &Address) -> u64 {
        self.record(address).initial_nonce
    }

    /// Charges the transaction against its sender and fee payer.
    pub fn accumulate_consumed_balance(&mut self, tx: &WrappedTransaction) {
        let transferred_value = tx.transferred_value();
        if transferred_value > 0 {
            let sender_record = self.record(&tx.sender());
            sender_record.consumed_balance =
                sender_record.consumed_balance.saturating_add(transferred_value);
        }

        let fee = tx.fee();
        if fee > 0 {
            let fee_payer_record = self.record(&tx.fee_payer());
            fee_payer_record.consumed_balance =
                fee_payer_record.consumed_balance.saturating_add(fee);
        }
    }

    /// Whether charging this transaction's fee would take the fee payer past
    /// its initial balance. An eventual transfer of value is not considered
    /// here; only the capacity to pay the fee matters.
    pub fn will_fee_exceed_balance(&mut self, tx: &WrappedTransaction) -> bool {
        let fee = tx.fee();
        if fee == 0 {
            return false;
        }

        let record = self.record(&tx.fee_payer());
        record.consumed_balance.saturating_add(fee) > record.initial_balance
    }

    pub fn is_incorrectly_guarded(&self, tx: &dyn Transaction) -> bool {
        self.session.is_incorrectly_guarded(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMempoolHost, MockSelectionSession, MockTransaction};
    use crate::tx::WrappedTransaction;
    use embercore_types::H256;
    use std::sync::Arc;

    fn wrapped(tx: MockTransaction) -> WrappedTransaction {
        let mut wrapped = WrappedTransaction::new(Arc::new(tx), H256::from([1u8; 32]), 128);
        wrapped.precompute_fields(&MockMempoolHost::new());
        wrapped
    }

    #[test]
    fn test_records_are_cached() {
        let session = MockSelectionSession::new();
        let alice = Address::from([1u8; 20]);
        session.set_nonce(&alice, 7);

        let mut wrapper = SelectionSessionWrapper::new(&session);
        assert_eq!(wrapper.nonce(&alice), 7);
        assert_eq!(wrapper.nonce(&alice), 7);
        assert_eq!(session.num_calls_account_state(), 1);
    }

    #[test]
    fn test_session_error_defaults_to_zero_record() {
        let session = MockSelectionSession::new();
        let alice = Address::from([1u8; 20]);
        session.set_failing(&alice);

        let mut wrapper = SelectionSessionWrapper::new(&session);
        assert_eq!(wrapper.nonce(&alice), 0);

        // Zero balance: any fee exceeds it.
        let tx = wrapped(MockTransaction::new(alice, 0));
        assert!(wrapper.will_fee_exceed_balance(&tx));
    }

    #[test]
    fn test_consumed_balance_accumulates() {
        let session = MockSelectionSession::new();
        let alice = Address::from([1u8; 20]);
        session.set_nonce(&alice, 0);
        session.set_balance(&alice, 150);

        let host = MockMempoolHost::new().with_fixed_fee(60);
        let mut tx = WrappedTransaction::new(
            Arc::new(MockTransaction::new(alice, 0).with_value(0)),
            H256::from([1u8; 32]),
            128,
        );
        tx.precompute_fields(&host);

        let mut wrapper = SelectionSessionWrapper::new(&session);
        assert!(!wrapper.will_fee_exceed_balance(&tx));
        wrapper.accumulate_consumed_balance(&tx);
        assert!(!wrapper.will_fee_exceed_balance(&tx));
        wrapper.accumulate_consumed_balance(&tx);
        // 120 consumed; a third fee of 60 would exceed the balance of 150.
        assert!(wrapper.will_fee_exceed_balance(&tx));
    }
}
