//! Miner implementation.

use crate::{BlockTemplate, MinerResult, MINE_ALL};
use cinder_evm::{AccountState, BlockEnv, Evm, EvmStep, ExecOptions, VmError};
use cinder_mempool::{PooledTransaction, PriceOrdering, SenderQueue};
use cinder_trie::ordered_trie_root;
use cinder_types::{Address, Gas, Receipt, Transaction, H256, EMPTY_TRIE_ROOT};
use parking_lot::Mutex;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A transaction the miner skipped, with the reason.
#[derive(Debug, Clone)]
pub struct TxFailure {
    pub hash: H256,
    pub error: VmError,
}

/// Everything the coordinator needs to assemble and persist a block.
#[derive(Debug, Clone)]
pub struct MinedBlock {
    /// Included transactions in execution order.
    pub transactions: Vec<Transaction>,
    /// Receipts aligned with `transactions`.
    pub receipts: Vec<Receipt>,
    /// Total gas consumed.
    pub gas_used: Gas,
    /// Trie root of the transactions indexed by position.
    pub transactions_trie: H256,
    /// Trie root of the receipts indexed by position.
    pub receipt_trie: H256,
    /// Timestamp carried over from the template.
    pub timestamp: u64,
    /// Transactions rejected during execution; consumed but not included.
    pub failures: Vec<TxFailure>,
}

impl MinedBlock {
    fn empty(timestamp: u64) -> Self {
        Self {
            transactions: Vec::new(),
            receipts: Vec::new(),
            gas_used: 0,
            transactions_trie: EMPTY_TRIE_ROOT,
            receipt_trie: EMPTY_TRIE_ROOT,
            timestamp,
            failures: Vec::new(),
        }
    }

    /// Hashes of every transaction the pool should forget: included and
    /// failed alike.
    pub fn consumed_hashes(&self) -> impl Iterator<Item = H256> + '_ {
        self.transactions
            .iter()
            .map(Transaction::hash)
            .chain(self.failures.iter().map(|failure| failure.hash))
    }
}

/// The block producer.
pub struct Miner {
    evm: Arc<Evm>,
    state: Arc<Mutex<AccountState>>,
}

impl Miner {
    pub fn new(evm: Arc<Evm>, state: Arc<Mutex<AccountState>>) -> Self {
        Self { evm, state }
    }

    /// Fill `template` from the executable runs.
    ///
    /// `max_transactions` of [`MINE_ALL`] mines everything that fits; a
    /// positive value caps the count; `0` is a no-op probe.
    ///
    /// The world state ends at the post-execution root. A transaction that
    /// fails is unwound alone, reported in the outcome, and drops its
    /// sender's remaining run for this block, since the nonce chain broke.
    pub fn mine(
        &self,
        executables: Vec<SenderQueue>,
        template: &BlockTemplate,
        max_transactions: i64,
        mut on_step: Option<&mut dyn FnMut(&EvmStep)>,
    ) -> MinerResult<MinedBlock> {
        if max_transactions == 0 {
            return Ok(MinedBlock::empty(template.timestamp));
        }
        let limit = if max_transactions == MINE_ALL {
            usize::MAX
        } else {
            max_transactions as usize
        };

        let mut queues: HashMap<Address, VecDeque<PooledTransaction>> = executables
            .into_iter()
            .map(|queue| (queue.sender, queue.transactions.into()))
            .collect();
        let mut heap: BinaryHeap<PriceOrdering> = queues
            .iter()
            .filter_map(|(sender, queue)| {
                queue
                    .front()
                    .map(|head| PriceOrdering::new(head.tx.gas_price, head.arrival, *sender))
            })
            .collect();

        let env = BlockEnv {
            number: template.number,
            coinbase: template.coinbase,
            timestamp: template.timestamp,
            gas_limit: template.gas_limit,
        };

        let mut block = MinedBlock::empty(template.timestamp);
        let mut state = self.state.lock();
        state.checkpoint();
        let result = self.fill(
            &mut state,
            &mut block,
            &mut queues,
            &mut heap,
            &env,
            limit,
            &mut on_step,
        );
        match result {
            Ok(()) => state.commit_checkpoint()?,
            Err(err) => {
                // leave the trie exactly where the previous block put it
                let _ = state.revert_checkpoint();
                return Err(err);
            }
        }
        drop(state);

        block.transactions_trie =
            ordered_trie_root(block.transactions.iter().map(|tx| rlp::encode(tx).to_vec()));
        block.receipt_trie =
            ordered_trie_root(block.receipts.iter().map(|receipt| receipt.serialize(true)));

        info!(
            number = template.number,
            included = block.transactions.len(),
            failed = block.failures.len(),
            gas_used = block.gas_used,
            "Block mined"
        );
        Ok(block)
    }

    #[allow(clippy::too_many_arguments)]
    fn fill(
        &self,
        state: &mut AccountState,
        block: &mut MinedBlock,
        queues: &mut HashMap<Address, VecDeque<PooledTransaction>>,
        heap: &mut BinaryHeap<PriceOrdering>,
        env: &BlockEnv,
        limit: usize,
        on_step: &mut Option<&mut dyn FnMut(&EvmStep)>,
    ) -> MinerResult<()> {
        while block.transactions.len() < limit {
            let Some(head) = heap.pop() else {
                break;
            };
            let queue = queues
                .get_mut(&head.sender)
                .expect("heap entries track live queues");
            let pooled = queue.pop_front().expect("heap entries track queue heads");
            let tx = pooled.tx;

            if block.gas_used + tx.gas_limit > env.gas_limit {
                // leave the whole run in the pool; the nonce chain cannot
                // be reordered around the oversized head
                debug!(sender = ?head.sender, "Sender run does not fit remaining block gas");
                queues.remove(&head.sender);
                continue;
            }

            let mut opts = ExecOptions::default();
            if let Some(listener) = on_step.as_mut() {
                opts.step_listener = Some(&mut **listener);
            }
            let outcome = self.evm.run_tx(state, &tx, env, &mut opts)?;
            match outcome.error {
                Some(error) => {
                    warn!(tx = ?tx.hash(), %error, "Transaction failed, block continues");
                    block.failures.push(TxFailure {
                        hash: tx.hash(),
                        error,
                    });
                    queues.remove(&head.sender);
                }
                None => {
                    block.gas_used += outcome.gas_used;
                    block.receipts.push(Receipt {
                        status: outcome.status,
                        gas_used: outcome.gas_used,
                        cumulative_gas_used: block.gas_used,
                        contract_address: outcome.contract_address,
                        logs: outcome.logs,
                    });
                    block.transactions.push(tx);
                    if let Some(next) = queue.front() {
                        heap.push(PriceOrdering::new(
                            next.tx.gas_price,
                            next.arrival,
                            head.sender,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
