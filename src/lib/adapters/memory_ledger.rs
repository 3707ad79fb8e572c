use alloy::primitives::{Address, B256, U256, keccak256};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use super::merkle_tree::LocalNoteHashTree;
use crate::domain::authorization::{ActionDescriptor, AuthorizationWitness, MessageHash};
use crate::domain::commitment::Commitment;
use crate::domain::merkle::SiblingPath;
use crate::ports::ledger::{LedgerError, LedgerPort};
use crate::ports::tree::{TreeError, TreeIndexPort};
use crate::ports::{
    BlockHeader, LedgerCall, NoteInsertion, Receipt, RevertReason, TransferCall, TxHandle,
    TxStatus,
};

/// Failure modes the in-memory ledger can be told to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFault {
    /// Nothing submitted is ever confirmed.
    StallConfirmations,
    /// Transfers confirm, note insertions are never confirmed.
    StallNoteInsertions,
    /// Note insertions are refused at submission.
    RejectNoteInsertions,
    /// Submitting a note insertion never returns.
    HangNoteSubmissions,
}

/// A submitted call that passed encoding, ready to execute.
enum PreparedCall<'a> {
    Transfer(&'a TransferCall, MessageHash),
    Insertion(&'a NoteInsertion),
}

fn transfer_message_hash(call: &TransferCall) -> Result<MessageHash, LedgerError> {
    ActionDescriptor::transfer(call.token, call.from, call.to, call.amount, call.nonce)
        .message_hash(call.caller)
        .map_err(|e| LedgerError::Rejected(e.to_string()))
}

struct WitnessEntry {
    witness: AuthorizationWitness,
    consumed: bool,
}

struct LedgerState {
    time: u64,
    blocks: Vec<BlockHeader>,
    balances: HashMap<(Address, Address), u128>,
    used_nonces: HashSet<(Address, Address, U256)>,
    witnesses: HashMap<(Address, MessageHash), WitnessEntry>,
    tree: LocalNoteHashTree,
    receipts: HashMap<B256, Receipt>,
    stalled: HashSet<B256>,
    tx_count: u64,
    fault: Option<LedgerFault>,
}

impl LedgerState {
    fn produce_block(&mut self) -> u64 {
        let number = self.blocks.len() as u64;
        self.blocks.push(BlockHeader {
            number,
            timestamp: self.time,
            note_tree_root: self.tree.current_root(),
        });
        number
    }

    fn next_tx_hash(&mut self) -> B256 {
        self.tx_count += 1;
        keccak256(self.tx_count.to_be_bytes())
    }

    fn execute_transfer(&mut self, call: &TransferCall, message_hash: MessageHash) -> TxStatus {
        let Some(entry) = self.witnesses.get(&(call.caller, message_hash)) else {
            return TxStatus::Reverted(RevertReason::WitnessMissing(message_hash.0));
        };
        if entry.consumed {
            return TxStatus::Reverted(RevertReason::WitnessConsumed(message_hash.0));
        }
        if !entry.witness.authorizes(message_hash, call.from) {
            return TxStatus::Reverted(RevertReason::WitnessSignatureInvalid);
        }
        if let Some(nonce) = call.nonce {
            if self.used_nonces.contains(&(call.token, call.from, nonce)) {
                return TxStatus::Reverted(RevertReason::NonceAlreadyUsed(nonce));
            }
        }
        let available = self.balance(call.token, call.from);
        if available < call.amount {
            return TxStatus::Reverted(RevertReason::InsufficientBalance {
                available,
                required: call.amount,
            });
        }

        // All checks passed; apply atomically.
        if let Some(entry) = self.witnesses.get_mut(&(call.caller, message_hash)) {
            entry.consumed = true;
        }
        if let Some(nonce) = call.nonce {
            self.used_nonces.insert((call.token, call.from, nonce));
        }
        self.balances
            .insert((call.token, call.from), available - call.amount);
        *self.balances.entry((call.token, call.to)).or_default() += call.amount;

        TxStatus::Success
    }

    fn execute_insertion(&mut self, insertion: &NoteInsertion) -> (TxStatus, Vec<u64>) {
        match self.tree.insert_commitment(&insertion.commitment) {
            Some(index) => (TxStatus::Success, vec![index]),
            None => (
                TxStatus::Reverted(RevertReason::DuplicateNoteHash(insertion.commitment.0)),
                Vec::new(),
            ),
        }
    }

    fn balance(&self, token: Address, holder: Address) -> u128 {
        self.balances.get(&(token, holder)).copied().unwrap_or(0)
    }
}

/// In-process ledger implementing both `LedgerPort` and `TreeIndexPort`.
///
/// Calls execute at submission and each produces one block. Time only moves
/// when the owner calls [`InMemoryLedger::set_time`].
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let mut state = LedgerState {
            time: 0,
            blocks: Vec::new(),
            balances: HashMap::new(),
            used_nonces: HashSet::new(),
            witnesses: HashMap::new(),
            tree: LocalNoteHashTree::new(),
            receipts: HashMap::new(),
            stalled: HashSet::new(),
            tx_count: 0,
            fault: None,
        };
        state.produce_block();
        Self {
            state: Mutex::new(state),
        }
    }

    /// Move the ledger clock and produce an empty block at the new time.
    pub async fn set_time(&self, time: u64) {
        let mut state = self.state.lock().await;
        state.time = time;
        state.produce_block();
    }

    /// Credit `amount` of `token` to `holder` (test funding).
    pub async fn mint_tokens(&self, token: Address, holder: Address, amount: u128) {
        let mut state = self.state.lock().await;
        *state.balances.entry((token, holder)).or_default() += amount;
    }

    pub async fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.state.lock().await.balance(token, holder)
    }

    pub async fn set_fault(&self, fault: Option<LedgerFault>) {
        self.state.lock().await.fault = fault;
    }

    pub async fn is_known_root(&self, root: B256) -> bool {
        self.state.lock().await.tree.is_known_root(root)
    }

    pub async fn contains_note_hash(&self, commitment: Commitment) -> bool {
        self.state.lock().await.tree.contains(&commitment)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerPort for InMemoryLedger {
    async fn submit(&self, call: LedgerCall) -> Result<TxHandle, LedgerError> {
        let mut state = self.state.lock().await;
        let fault = state.fault;

        // Refusals happen before a tx hash is allotted.
        let prepared = match &call {
            LedgerCall::Transfer(transfer) => {
                PreparedCall::Transfer(transfer, transfer_message_hash(transfer)?)
            }
            LedgerCall::InsertNoteHash(insertion) => match fault {
                Some(LedgerFault::RejectNoteInsertions) => {
                    return Err(LedgerError::Rejected("note insertions are disabled".into()));
                }
                Some(LedgerFault::HangNoteSubmissions) => {
                    drop(state);
                    return std::future::pending().await;
                }
                _ => PreparedCall::Insertion(insertion),
            },
        };

        let tx_hash = state.next_tx_hash();
        let stall = match fault {
            Some(LedgerFault::StallConfirmations) => true,
            Some(LedgerFault::StallNoteInsertions) => {
                matches!(prepared, PreparedCall::Insertion(_))
            }
            _ => false,
        };
        if stall {
            state.stalled.insert(tx_hash);
            return Ok(TxHandle(tx_hash));
        }

        let (status, note_leaf_indices) = match prepared {
            PreparedCall::Transfer(transfer, message_hash) => {
                (state.execute_transfer(transfer, message_hash), Vec::new())
            }
            PreparedCall::Insertion(insertion) => state.execute_insertion(insertion),
        };
        let block_number = state.produce_block();
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number,
                status,
                note_leaf_indices,
            },
        );
        Ok(TxHandle(tx_hash))
    }

    async fn await_confirmation(&self, handle: TxHandle) -> Result<Receipt, LedgerError> {
        {
            let state = self.state.lock().await;
            if !state.stalled.contains(&handle.0) {
                return state
                    .receipts
                    .get(&handle.0)
                    .cloned()
                    .ok_or(LedgerError::UnknownTransaction(handle.0));
            }
        }
        std::future::pending().await
    }

    async fn get_block(&self, number: u64) -> Result<BlockHeader, LedgerError> {
        let state = self.state.lock().await;
        state
            .blocks
            .get(number as usize)
            .copied()
            .ok_or(LedgerError::BlockNotFound(number))
    }

    async fn latest_block(&self) -> Result<BlockHeader, LedgerError> {
        let state = self.state.lock().await;
        state
            .blocks
            .last()
            .copied()
            .ok_or(LedgerError::BlockNotFound(0))
    }

    async fn register_witness(
        &self,
        consumer: Address,
        witness: &AuthorizationWitness,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let key = (consumer, witness.message_hash);
        if state.witnesses.get(&key).is_some_and(|entry| entry.consumed) {
            return Err(LedgerError::WitnessConsumed(witness.message_hash.0));
        }
        state.witnesses.insert(
            key,
            WitnessEntry {
                witness: witness.clone(),
                consumed: false,
            },
        );
        Ok(())
    }
}

impl TreeIndexPort for InMemoryLedger {
    async fn find_leaf_index(&self, commitment: Commitment) -> Result<Option<u64>, TreeError> {
        Ok(self.state.lock().await.tree.find_leaf_index(&commitment))
    }

    async fn get_sibling_path(&self, leaf_index: u64) -> Result<SiblingPath, TreeError> {
        self.state
            .lock()
            .await
            .tree
            .sibling_path(leaf_index)
            .ok_or(TreeError::LeafOutOfRange(leaf_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local_wallet::LocalWallet;
    use crate::ports::wallet::SignerPort;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const CONTRACT: Address = Address::repeat_byte(0x5C);

    async fn authorized_transfer(
        ledger: &InMemoryLedger,
        payer: &LocalWallet,
        amount: u128,
        nonce: Option<U256>,
    ) -> TransferCall {
        let call = TransferCall {
            token: TOKEN,
            caller: CONTRACT,
            from: payer.address(),
            to: Address::repeat_byte(0xB0),
            amount,
            nonce,
        };
        let hash = ActionDescriptor::transfer(TOKEN, call.from, call.to, amount, nonce)
            .message_hash(CONTRACT)
            .unwrap();
        let witness = payer.create_authorization_witness(hash).await.unwrap();
        ledger.register_witness(CONTRACT, &witness).await.unwrap();
        call
    }

    fn first_recipient_call(payer: &LocalWallet, nonce: Option<U256>) -> TransferCall {
        TransferCall {
            token: TOKEN,
            caller: CONTRACT,
            from: payer.address(),
            to: Address::repeat_byte(0xB0),
            amount: 10,
            nonce,
        }
    }

    async fn run(ledger: &InMemoryLedger, call: LedgerCall) -> Receipt {
        let handle = ledger.submit(call).await.unwrap();
        ledger.await_confirmation(handle).await.unwrap()
    }

    #[tokio::test]
    async fn test_genesis_block_has_empty_root() {
        let ledger = InMemoryLedger::new();
        let genesis = ledger.latest_block().await.unwrap();
        assert_eq!(genesis.number, 0);
        assert_eq!(genesis.note_tree_root, B256::ZERO);
    }

    #[tokio::test]
    async fn test_set_time_produces_block() {
        let ledger = InMemoryLedger::new();
        ledger.set_time(50).await;

        let latest = ledger.latest_block().await.unwrap();
        assert_eq!(latest.number, 1);
        assert_eq!(latest.timestamp, 50);
        assert_eq!(ledger.get_block(0).await.unwrap().timestamp, 0);
        assert_eq!(
            ledger.get_block(9).await.unwrap_err(),
            LedgerError::BlockNotFound(9)
        );
    }

    #[tokio::test]
    async fn test_authorized_transfer_moves_funds_and_consumes_witness() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();
        ledger.mint_tokens(TOKEN, payer.address(), 1000).await;

        let call = authorized_transfer(&ledger, &payer, 400, Some(U256::from(1))).await;
        let receipt = run(&ledger, LedgerCall::Transfer(call.clone())).await;

        assert!(receipt.is_success());
        assert_eq!(ledger.balance_of(TOKEN, payer.address()).await, 600);
        assert_eq!(ledger.balance_of(TOKEN, call.to).await, 400);

        // Replaying the same call finds the witness consumed.
        let replay = run(&ledger, LedgerCall::Transfer(call)).await;
        assert!(matches!(
            replay.status,
            TxStatus::Reverted(RevertReason::WitnessConsumed(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_without_witness_reverts() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();
        ledger.mint_tokens(TOKEN, payer.address(), 1000).await;

        let call = TransferCall {
            token: TOKEN,
            caller: CONTRACT,
            from: payer.address(),
            to: Address::repeat_byte(0xB0),
            amount: 10,
            nonce: None,
        };
        let receipt = run(&ledger, LedgerCall::Transfer(call)).await;
        assert!(matches!(
            receipt.status,
            TxStatus::Reverted(RevertReason::WitnessMissing(_))
        ));
        assert_eq!(ledger.balance_of(TOKEN, payer.address()).await, 1000);
    }

    #[tokio::test]
    async fn test_insufficient_balance_reverts_and_keeps_witness() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();
        ledger.mint_tokens(TOKEN, payer.address(), 100).await;

        let call = authorized_transfer(&ledger, &payer, 500, None).await;
        let receipt = run(&ledger, LedgerCall::Transfer(call.clone())).await;
        assert_eq!(
            receipt.status,
            TxStatus::Reverted(RevertReason::InsufficientBalance {
                available: 100,
                required: 500
            })
        );

        // Reverted calls leave the witness usable.
        ledger.mint_tokens(TOKEN, payer.address(), 400).await;
        let retry = run(&ledger, LedgerCall::Transfer(call)).await;
        assert!(retry.is_success());
    }

    #[tokio::test]
    async fn test_reused_nonce_reverts() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();
        ledger.mint_tokens(TOKEN, payer.address(), 1000).await;

        let first = authorized_transfer(&ledger, &payer, 10, Some(U256::from(7))).await;
        assert!(run(&ledger, LedgerCall::Transfer(first)).await.is_success());

        // Different recipient, same nonce: a fresh witness but a spent nonce.
        let mut second = first_recipient_call(&payer, Some(U256::from(7)));
        second.to = Address::repeat_byte(0xB1);
        let hash = ActionDescriptor::transfer(TOKEN, second.from, second.to, 10, second.nonce)
            .message_hash(CONTRACT)
            .unwrap();
        let witness = payer.create_authorization_witness(hash).await.unwrap();
        ledger.register_witness(CONTRACT, &witness).await.unwrap();

        let receipt = run(&ledger, LedgerCall::Transfer(second)).await;
        assert_eq!(
            receipt.status,
            TxStatus::Reverted(RevertReason::NonceAlreadyUsed(U256::from(7)))
        );
    }

    #[tokio::test]
    async fn test_register_consumed_witness_fails() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();
        ledger.mint_tokens(TOKEN, payer.address(), 1000).await;

        let call = authorized_transfer(&ledger, &payer, 10, None).await;
        assert!(run(&ledger, LedgerCall::Transfer(call.clone())).await.is_success());

        let hash = ActionDescriptor::transfer(TOKEN, call.from, call.to, 10, None)
            .message_hash(CONTRACT)
            .unwrap();
        let witness = payer.create_authorization_witness(hash).await.unwrap();
        assert_eq!(
            ledger.register_witness(CONTRACT, &witness).await,
            Err(LedgerError::WitnessConsumed(hash.0))
        );
    }

    #[tokio::test]
    async fn test_note_insertion_appends_leaf_and_updates_root() {
        let ledger = InMemoryLedger::new();
        let commitment = Commitment(B256::left_padding_from(&[1]));

        let receipt = run(
            &ledger,
            LedgerCall::InsertNoteHash(NoteInsertion {
                contract: CONTRACT,
                commitment,
            }),
        )
        .await;

        assert!(receipt.is_success());
        assert_eq!(receipt.note_leaf_indices, vec![0]);
        assert_eq!(ledger.find_leaf_index(commitment).await.unwrap(), Some(0));

        let header = ledger.get_block(receipt.block_number).await.unwrap();
        assert!(ledger.is_known_root(header.note_tree_root).await);
        let path = ledger.get_sibling_path(0).await.unwrap();
        assert_eq!(path.compute_root(commitment), Some(header.note_tree_root));
    }

    #[tokio::test]
    async fn test_duplicate_note_insertion_reverts() {
        let ledger = InMemoryLedger::new();
        let insertion = NoteInsertion {
            contract: CONTRACT,
            commitment: Commitment(B256::left_padding_from(&[1])),
        };

        run(&ledger, LedgerCall::InsertNoteHash(insertion.clone())).await;
        let receipt = run(&ledger, LedgerCall::InsertNoteHash(insertion)).await;
        assert!(matches!(
            receipt.status,
            TxStatus::Reverted(RevertReason::DuplicateNoteHash(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_insertion_fault() {
        let ledger = InMemoryLedger::new();
        ledger.set_fault(Some(LedgerFault::RejectNoteInsertions)).await;

        let result = ledger
            .submit(LedgerCall::InsertNoteHash(NoteInsertion {
                contract: CONTRACT,
                commitment: Commitment(B256::left_padding_from(&[1])),
            }))
            .await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_confirmation_never_resolves() {
        let ledger = InMemoryLedger::new();
        ledger.set_fault(Some(LedgerFault::StallConfirmations)).await;

        let handle = ledger
            .submit(LedgerCall::InsertNoteHash(NoteInsertion {
                contract: CONTRACT,
                commitment: Commitment(B256::left_padding_from(&[1])),
            }))
            .await
            .unwrap();

        let waited = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            ledger.await_confirmation(handle),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(
            ledger.find_leaf_index(Commitment(B256::left_padding_from(&[1]))).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let ledger = InMemoryLedger::new();
        let handle = TxHandle(B256::repeat_byte(0x99));
        assert_eq!(
            ledger.await_confirmation(handle).await,
            Err(LedgerError::UnknownTransaction(handle.0))
        );
    }

    #[tokio::test]
    async fn test_refused_transfer_does_not_use_a_tx_hash() {
        let ledger = InMemoryLedger::new();
        let payer = LocalWallet::random();

        // A nonce outside the scalar field cannot be hashed into a message.
        let call = first_recipient_call(&payer, Some(U256::MAX));
        let result = ledger.submit(LedgerCall::Transfer(call)).await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(ledger.latest_block().await.unwrap().number, 0);

        let handle = ledger
            .submit(LedgerCall::InsertNoteHash(NoteInsertion {
                contract: CONTRACT,
                commitment: Commitment(B256::left_padding_from(&[1])),
            }))
            .await
            .unwrap();
        assert_eq!(handle.0, keccak256(1u64.to_be_bytes()));
        assert!(ledger.await_confirmation(handle).await.unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_insertion_submit_keeps_ledger_usable() {
        let ledger = InMemoryLedger::new();
        ledger.set_fault(Some(LedgerFault::HangNoteSubmissions)).await;

        let submitted = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            ledger.submit(LedgerCall::InsertNoteHash(NoteInsertion {
                contract: CONTRACT,
                commitment: Commitment(B256::left_padding_from(&[1])),
            })),
        )
        .await;
        assert!(submitted.is_err());

        // The hung call does not hold the ledger lock.
        assert_eq!(ledger.latest_block().await.unwrap().number, 0);
    }
}
