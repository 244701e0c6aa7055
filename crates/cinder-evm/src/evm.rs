//! The transaction executor.

use crate::{AccountState, EvmError, EvmResult, VmError};
use cinder_types::{keccak, Account, Address, BlockHeader, Gas, Log, Transaction, H256};
use rlp::RlpStream;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Base cost of any transaction.
const GAS_TX: Gas = 21_000;
/// Additional base cost of a contract creation.
const GAS_TX_CREATE: Gas = 32_000;
/// Cost per zero byte of calldata.
const GAS_TX_DATA_ZERO: Gas = 4;
/// Deployed code size cap (EIP-170).
const MAX_CODE_SIZE: usize = 24_576;

/// EVM rule-set identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Hardfork {
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    MuirGlacier,
    Berlin,
    London,
}

impl Hardfork {
    /// Cost per non-zero byte of calldata (EIP-2028 reduced it).
    fn nonzero_data_gas(&self) -> Gas {
        if *self >= Hardfork::Istanbul {
            16
        } else {
            68
        }
    }
}

impl Default for Hardfork {
    fn default() -> Self {
        Hardfork::MuirGlacier
    }
}

impl FromStr for Hardfork {
    type Err = EvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "byzantium" => Ok(Hardfork::Byzantium),
            "constantinople" => Ok(Hardfork::Constantinople),
            "petersburg" => Ok(Hardfork::Petersburg),
            "istanbul" => Ok(Hardfork::Istanbul),
            "muirglacier" => Ok(Hardfork::MuirGlacier),
            "berlin" => Ok(Hardfork::Berlin),
            "london" => Ok(Hardfork::London),
            other => Err(EvmError::UnknownHardfork(other.to_string())),
        }
    }
}

/// Block context a transaction executes in.
#[derive(Debug, Clone)]
pub struct BlockEnv {
    pub number: u64,
    pub coinbase: Address,
    pub timestamp: u64,
    pub gas_limit: Gas,
}

/// Hook resolving historical block headers by number (BLOCKHASH support).
pub type GetBlockFn = Arc<dyn Fn(u64) -> Option<BlockHeader> + Send + Sync>;

/// One interpreter step, reported through the step listener.
#[derive(Debug, Clone)]
pub struct EvmStep {
    pub pc: u64,
    pub opcode: &'static str,
    pub depth: u32,
    pub gas_left: Gas,
}

/// Per-call execution switches.
#[derive(Default)]
pub struct ExecOptions<'a> {
    /// Do not require the sender to cover the upfront cost.
    pub skip_balance: bool,
    /// Do not require the transaction nonce to match the account nonce.
    pub skip_nonce: bool,
    /// Invoked for every interpreter step.
    pub step_listener: Option<&'a mut dyn FnMut(&EvmStep)>,
}

/// Result of executing one transaction.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// 1 on success, 0 on failure.
    pub status: u64,
    /// Gas consumed.
    pub gas_used: Gas,
    /// Logs emitted.
    pub logs: Vec<Log>,
    /// Created contract address, for creation transactions.
    pub contract_address: Option<Address>,
    /// The failure, when `status` is 0. Failed transactions leave the world
    /// state untouched.
    pub error: Option<VmError>,
}

impl ExecOutcome {
    fn failed(error: VmError) -> Self {
        Self {
            status: 0,
            gas_used: 0,
            logs: Vec::new(),
            contract_address: None,
            error: Some(error),
        }
    }
}

/// The executor. Configuration and hooks only; the world state is passed
/// per call so callers control locking and forking.
pub struct Evm {
    chain_id: u64,
    hardfork: Hardfork,
    allow_unlimited_contract_size: bool,
    get_block: GetBlockFn,
}

impl Evm {
    pub fn new(
        chain_id: u64,
        hardfork: Hardfork,
        allow_unlimited_contract_size: bool,
        get_block: GetBlockFn,
    ) -> Self {
        Self {
            chain_id,
            hardfork,
            allow_unlimited_contract_size,
            get_block,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    /// Resolve a historical block header through the configured hook.
    pub fn block_by_number(&self, number: u64) -> Option<BlockHeader> {
        (self.get_block)(number)
    }

    /// Execute `tx` against `state` in the context of `env`.
    ///
    /// Transaction-level failures are reported in the outcome with the state
    /// untouched; `Err` is reserved for storage corruption.
    pub fn run_tx(
        &self,
        state: &mut AccountState,
        tx: &Transaction,
        env: &BlockEnv,
        opts: &mut ExecOptions<'_>,
    ) -> EvmResult<ExecOutcome> {
        let intrinsic = self.intrinsic_gas(tx);
        if tx.gas_limit < intrinsic {
            return Ok(ExecOutcome::failed(VmError::IntrinsicGas {
                limit: tx.gas_limit,
                required: intrinsic,
            }));
        }

        let sender = state.account_or_default(&tx.from())?;
        if !opts.skip_nonce && tx.nonce != sender.nonce {
            return Ok(ExecOutcome::failed(VmError::NonceMismatch {
                expected: sender.nonce,
                actual: tx.nonce,
            }));
        }
        if !opts.skip_balance {
            let required = tx.upfront_cost();
            if sender.balance < required {
                return Ok(ExecOutcome::failed(VmError::InsufficientFunds {
                    balance: sender.balance,
                    required,
                }));
            }
        }
        if tx.to.is_none()
            && !self.allow_unlimited_contract_size
            && tx.data.len() > MAX_CODE_SIZE
        {
            return Ok(ExecOutcome::failed(VmError::CodeSizeExceeded {
                size: tx.data.len(),
                max: MAX_CODE_SIZE,
            }));
        }

        let gas_used = intrinsic;
        state.checkpoint();
        match self.apply(state, tx, env, opts, sender, gas_used) {
            Ok(contract_address) => {
                state.commit_checkpoint()?;
                debug!(
                    tx = ?tx.hash(),
                    gas_used,
                    contract = ?contract_address,
                    "Transaction executed"
                );
                Ok(ExecOutcome {
                    status: 1,
                    gas_used,
                    logs: Vec::new(),
                    contract_address,
                    error: None,
                })
            }
            Err(err) => {
                // unwind this transaction's writes only
                let _ = state.revert_checkpoint();
                Err(err)
            }
        }
    }

    fn apply(
        &self,
        state: &mut AccountState,
        tx: &Transaction,
        env: &BlockEnv,
        opts: &mut ExecOptions<'_>,
        mut sender: Account,
        gas_used: Gas,
    ) -> EvmResult<Option<Address>> {
        let fee = tx.gas_price.saturating_mul(gas_used.into());
        sender.nonce += 1;
        sender.balance = sender
            .balance
            .saturating_sub(tx.value.saturating_add(fee));
        state.put_account(&tx.from(), &sender)?;

        let contract_address = match tx.to {
            Some(to) => {
                state.add_balance(&to, tx.value)?;
                self.report_step(opts, "CALL", tx.gas_limit - gas_used);
                None
            }
            None => {
                let address = create_address(&tx.from(), tx.nonce);
                let mut created = state.account_or_default(&address)?;
                created.balance = created.balance.saturating_add(tx.value);
                created.code_hash = keccak(&tx.data);
                state.put_account(&address, &created)?;
                self.report_step(opts, "CREATE", tx.gas_limit - gas_used);
                Some(address)
            }
        };

        state.add_balance(&env.coinbase, fee)?;
        Ok(contract_address)
    }

    fn report_step(&self, opts: &mut ExecOptions<'_>, opcode: &'static str, gas_left: Gas) {
        if let Some(listener) = opts.step_listener.as_mut() {
            listener(&EvmStep {
                pc: 0,
                opcode,
                depth: 0,
                gas_left,
            });
        }
    }

    fn intrinsic_gas(&self, tx: &Transaction) -> Gas {
        let mut gas = GAS_TX;
        if tx.to.is_none() {
            gas += GAS_TX_CREATE;
        }
        let nonzero = tx.data.iter().filter(|b| **b != 0).count() as Gas;
        let zero = tx.data.len() as Gas - nonzero;
        gas + nonzero * self.hardfork.nonzero_data_gas() + zero * GAS_TX_DATA_ZERO
    }
}

/// Address of a contract created by `sender` at `nonce`:
/// the low 20 bytes of `keccak256(rlp([sender, nonce]))`.
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender).append(&nonce);
    let digest: H256 = keccak(stream.out());
    Address::from_slice(&digest.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_storage::MemoryDatabase;
    use cinder_trie::MerkleTrie;
    use cinder_types::{UnsignedTransaction, U256};

    fn secret(fill: u8) -> libsecp256k1::SecretKey {
        libsecp256k1::SecretKey::parse(&[fill; 32]).unwrap()
    }

    fn address_for(key: &libsecp256k1::SecretKey) -> Address {
        cinder_types::address_of(&libsecp256k1::PublicKey::from_secret_key(key))
    }

    fn evm() -> Evm {
        Evm::new(1337, Hardfork::default(), false, Arc::new(|_| None))
    }

    fn env() -> BlockEnv {
        BlockEnv {
            number: 1,
            coinbase: Address::repeat_byte(0xc0),
            timestamp: 1_577_836_800,
            gas_limit: 6_000_000,
        }
    }

    fn funded_state(address: &Address, balance: u64) -> AccountState {
        let mut state =
            AccountState::new(MerkleTrie::empty(Arc::new(MemoryDatabase::new())));
        state
            .put_account(address, &Account::new(U256::from(balance), 0))
            .unwrap();
        state
    }

    #[test]
    fn transfer_moves_value_and_pays_fee() {
        let key = secret(0x01);
        let from = address_for(&key);
        let to = Address::repeat_byte(0x02);
        let mut state = funded_state(&from, 100_000);

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(to),
            value: U256::from(10u64),
            data: Vec::new(),
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert_eq!(outcome.status, 1);
        assert_eq!(outcome.gas_used, 21_000);

        assert_eq!(
            state.balance(&from).unwrap(),
            U256::from(100_000u64 - 10 - 21_000)
        );
        assert_eq!(state.balance(&to).unwrap(), U256::from(10u64));
        assert_eq!(
            state.balance(&env().coinbase).unwrap(),
            U256::from(21_000u64)
        );
        assert_eq!(state.nonce(&from).unwrap(), 1);
    }

    #[test]
    fn insufficient_funds_leaves_state_untouched() {
        let key = secret(0x03);
        let from = address_for(&key);
        let mut state = funded_state(&from, 1_000);
        let root = state.root();

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x04)),
            value: U256::from(10u64),
            data: Vec::new(),
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert_eq!(outcome.status, 0);
        assert!(matches!(
            outcome.error,
            Some(VmError::InsufficientFunds { .. })
        ));
        assert_eq!(state.root(), root);
    }

    #[test]
    fn nonce_mismatch_is_rejected_unless_skipped() {
        let key = secret(0x05);
        let from = address_for(&key);
        let mut state = funded_state(&from, 100_000);

        let tx = UnsignedTransaction {
            nonce: 5,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x06)),
            value: U256::zero(),
            data: Vec::new(),
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert!(matches!(outcome.error, Some(VmError::NonceMismatch { .. })));

        let mut opts = ExecOptions {
            skip_nonce: true,
            ..Default::default()
        };
        let outcome = evm().run_tx(&mut state, &tx, &env(), &mut opts).unwrap();
        assert_eq!(outcome.status, 1);
    }

    #[test]
    fn creation_derives_contract_address() {
        let key = secret(0x07);
        let from = address_for(&key);
        let mut state = funded_state(&from, 10_000_000);

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 100_000,
            to: None,
            value: U256::from(1u64),
            data: vec![0x60, 0x60, 0x00],
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert_eq!(outcome.status, 1);
        let created = outcome.contract_address.unwrap();
        assert_eq!(created, create_address(&from, 0));
        assert_eq!(state.balance(&created).unwrap(), U256::one());
        assert!(outcome.gas_used > GAS_TX + GAS_TX_CREATE);
    }

    #[test]
    fn oversized_creation_is_capped() {
        let key = secret(0x08);
        let from = address_for(&key);
        let mut state = funded_state(&from, u64::MAX);

        let unsigned = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 10_000_000,
            to: None,
            value: U256::zero(),
            data: vec![1u8; MAX_CODE_SIZE + 1],
        };
        let tx = unsigned.clone().sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert!(matches!(
            outcome.error,
            Some(VmError::CodeSizeExceeded { .. })
        ));

        let permissive = Evm::new(1337, Hardfork::default(), true, Arc::new(|_| None));
        let tx = unsigned.sign(&key);
        let outcome = permissive
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert_eq!(outcome.status, 1);
    }

    #[test]
    fn step_listener_observes_execution() {
        let key = secret(0x09);
        let from = address_for(&key);
        let mut state = funded_state(&from, 100_000);

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x0a)),
            value: U256::zero(),
            data: Vec::new(),
        }
        .sign(&key);

        let mut steps = Vec::new();
        let mut listener = |step: &EvmStep| steps.push(step.opcode);
        let mut opts = ExecOptions {
            step_listener: Some(&mut listener),
            ..Default::default()
        };
        evm().run_tx(&mut state, &tx, &env(), &mut opts).unwrap();
        assert_eq!(steps, vec!["CALL"]);
    }

    #[test]
    fn intrinsic_gas_counts_calldata() {
        let key = secret(0x0b);
        let from = address_for(&key);
        let mut state = funded_state(&from, u64::MAX);

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 22_000,
            to: Some(Address::repeat_byte(0x0c)),
            value: U256::zero(),
            data: vec![0x00, 0x01, 0x02],
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        // 21000 + 4 (zero byte) + 2 * 16 (non-zero bytes)
        assert_eq!(outcome.gas_used, 21_036);
    }

    #[test]
    fn gas_limit_below_intrinsic_fails() {
        let key = secret(0x0d);
        let from = address_for(&key);
        let mut state = funded_state(&from, u64::MAX);

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 20_000,
            to: Some(Address::repeat_byte(0x0e)),
            value: U256::zero(),
            data: Vec::new(),
        }
        .sign(&key);

        let outcome = evm()
            .run_tx(&mut state, &tx, &env(), &mut ExecOptions::default())
            .unwrap();
        assert!(matches!(outcome.error, Some(VmError::IntrinsicGas { .. })));
    }
}
