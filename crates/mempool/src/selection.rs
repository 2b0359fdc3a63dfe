//! Selection of the best executable transactions for block construction.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::sender_list::TxListForSender;
use crate::session::SelectionSessionWrapper;
use crate::tx::{rank_for_selection, WrappedTransaction};

/// One sender's position in the selection.
///
/// The cursor walks the sender's nonce-ascending snapshot; the heap ranks
/// cursors by their current transaction, so the top of the heap is always the
/// transaction the selection wants next.
struct SenderCursor {
    bunch: Vec<Arc<WrappedTransaction>>,
    index: usize,
    initial_nonce: u64,
    num_selected: u64,
}

impl SenderCursor {
    fn current(&self) -> &Arc<WrappedTransaction> {
        &self.bunch[self.index]
    }

    fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.bunch.len()
    }

    fn expected_nonce(&self) -> u64 {
        self.initial_nonce + self.num_selected
    }
}

impl PartialEq for SenderCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SenderCursor {}

impl PartialOrd for SenderCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SenderCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: the most valuable current transaction surfaces first.
        rank_for_selection(self.current(), other.current())
    }
}

/// Produces a gas-bounded, count-bounded, time-bounded sequence of
/// transactions, nonce-continuous per sender. Does not mutate cache state.
pub(crate) fn select_transactions(
    session_wrapper: &mut SelectionSessionWrapper<'_>,
    senders: Vec<Arc<TxListForSender>>,
    gas_requested: u64,
    max_num: usize,
    max_duration: Duration,
) -> (Vec<Arc<WrappedTransaction>>, u64) {
    let deadline = Instant::now() + max_duration;

    let mut heap = BinaryHeap::with_capacity(senders.len());

    for sender_list in &senders {
        let bunch = sender_list.txs();
        if bunch.is_empty() {
            continue;
        }

        let initial_nonce = session_wrapper.nonce(&sender_list.sender());

        // Position past transactions already spent by the account.
        let index = bunch.partition_point(|tx| tx.nonce() < initial_nonce);
        if index == bunch.len() {
            continue;
        }
        if bunch[index].nonce() > initial_nonce {
            // Initial gap; nothing of this sender is executable now.
            trace!(
                sender = %sender_list.sender(),
                initial_nonce,
                lowest_nonce = bunch[index].nonce(),
                "selection: skipping sender with initial nonce gap"
            );
            continue;
        }

        heap.push(SenderCursor {
            bunch,
            index,
            initial_nonce,
            num_selected: 0,
        });
    }

    let mut selected: Vec<Arc<WrappedTransaction>> = Vec::new();
    let mut accumulated_gas = 0u64;

    loop {
        if selected.len() >= max_num {
            break;
        }
        if Instant::now() >= deadline {
            debug!(
                num_selected = selected.len(),
                "selection: deadline reached, returning partial result"
            );
            break;
        }
        let Some(mut cursor) = heap.pop() else {
            break;
        };

        let tx = Arc::clone(cursor.current());

        if accumulated_gas.saturating_add(tx.gas_limit()) > gas_requested {
            break;
        }

        if tx.nonce() != cursor.expected_nonce() {
            // Duplicate nonce or a gap in the middle of the sequence; the
            // transaction is skipped, the sender stays in play.
            if cursor.advance() {
                heap.push(cursor);
            }
            continue;
        }

        if session_wrapper.is_incorrectly_guarded(tx.tx().as_ref()) {
            // The sender is dropped for the rest of the pass.
            trace!(sender = %tx.sender(), "selection: dropping incorrectly guarded sender");
            continue;
        }

        if session_wrapper.will_fee_exceed_balance(&tx) {
            trace!(
                tx_hash = %tx.tx_hash(),
                fee_payer = %tx.fee_payer(),
                "selection: dropping sender, fee exceeds balance"
            );
            continue;
        }

        session_wrapper.accumulate_consumed_balance(&tx);
        accumulated_gas += tx.gas_limit();
        selected.push(tx);
        cursor.num_selected += 1;

        if cursor.advance() {
            heap.push(cursor);
        }
    }

    (selected, accumulated_gas)
}
