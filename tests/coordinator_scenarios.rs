//! Coordinator scenarios driven through the public API
//!
//! Every scenario starts from a deployment bootstrapped with the default
//! configuration and exercises a complete flow across shards, the pending
//! set, hook dispatch and the ledger.

use rstest::{fixture, rstest};
use sharded_cashier::config::CashierConfig;
use sharded_cashier::core::{
    CashOutHook, Collaborators, Coordinator, FungibleLedger, InMemoryLedger, InMemoryShard,
    PremintLedger, RoleTable, Shard, SuspendSwitch, MAX_SHARD_COUNT,
};
use sharded_cashier::types::{
    Address, Amount, BatchId, CashInExecutionResult, CashInStatus, CashOutStatus, CashierError,
    CashierEvent, Capability, ErrorCategory, HookError, HookFlags, HookIndex, TxId,
};
use sharded_cashier::Deployment;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const ALICE: u64 = 0xa11ce;
const BOB: u64 = 0xb0b;
const HOOK_TARGET: u64 = 0x4007;

fn addr(value: u64) -> Address {
    Address::from(value)
}

fn tx(value: u64) -> TxId {
    TxId::from(value)
}

/// Hook target recording every call and optionally vetoing one index
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<HookIndex>>,
    veto: Mutex<Option<HookIndex>>,
}

impl Recorder {
    fn calls(&self) -> Vec<HookIndex> {
        self.calls.lock().unwrap().clone()
    }

    fn veto(&self, index: Option<HookIndex>) {
        *self.veto.lock().unwrap() = index;
    }
}

impl CashOutHook for Recorder {
    fn on_cash_out_hook(&self, hook_index: HookIndex, _tx_id: TxId) -> Result<(), HookError> {
        if *self.veto.lock().unwrap() == Some(hook_index) {
            return Err(HookError::rejected("vetoed by recorder"));
        }
        self.calls.lock().unwrap().push(hook_index);
        Ok(())
    }
}

#[fixture]
fn deployment() -> Deployment {
    let mut deployment = Deployment::from_config(&CashierConfig::default()).unwrap();
    let operator = deployment.operator();
    deployment
        .coordinator_mut()
        .cash_in(operator, addr(ALICE), 1_000, tx(1))
        .unwrap();
    deployment
}

fn escrow_balance(deployment: &Deployment) -> Amount {
    deployment
        .ledger()
        .balance_of(deployment.coordinator().address())
}

fn attach_recorder(deployment: &mut Deployment, tx_id: TxId) -> Arc<Recorder> {
    let operator = deployment.operator();
    let recorder = Arc::new(Recorder::default());
    let coordinator = deployment.coordinator_mut();
    coordinator
        .register_hook_target(operator, addr(HOOK_TARGET), recorder.clone())
        .unwrap();
    coordinator
        .configure_cash_out_hooks(operator, tx_id, addr(HOOK_TARGET), HookFlags::ALL.bits())
        .unwrap();
    recorder
}

#[rstest]
fn test_request_then_confirm_burns_escrow(mut deployment: Deployment) {
    let operator = deployment.operator();
    let coordinator = deployment.coordinator_mut();
    coordinator
        .request_cash_out_from(operator, addr(ALICE), 400, tx(2))
        .unwrap();

    assert_eq!(coordinator.pending_cash_out_count(), 1);
    assert_eq!(coordinator.cash_out_balance_of(addr(ALICE)), 400);
    assert_eq!(escrow_balance(&deployment), 400);

    let coordinator = deployment.coordinator_mut();
    coordinator.confirm_cash_out(operator, tx(2)).unwrap();

    assert_eq!(coordinator.get_cash_out(tx(2)).unwrap().status, CashOutStatus::Confirmed);
    assert_eq!(coordinator.pending_cash_out_count(), 0);
    assert_eq!(coordinator.cash_out_balance_of(addr(ALICE)), 0);
    assert_eq!(escrow_balance(&deployment), 0);
    assert_eq!(deployment.ledger().balance_of(addr(ALICE)), 600);
    assert_eq!(deployment.ledger().total_supply(), 600);
}

#[rstest]
fn test_reverse_then_request_again(mut deployment: Deployment) {
    let operator = deployment.operator();
    let coordinator = deployment.coordinator_mut();
    coordinator
        .request_cash_out_from(operator, addr(ALICE), 300, tx(2))
        .unwrap();
    coordinator.reverse_cash_out(operator, tx(2)).unwrap();
    assert_eq!(coordinator.get_cash_out(tx(2)).unwrap().status, CashOutStatus::Reversed);

    // A reversed identifier can be requested again, but only for the same account
    let wrong_account = coordinator.request_cash_out_from(operator, addr(BOB), 10, tx(2));
    assert!(matches!(
        wrong_account,
        Err(CashierError::CashOutAccountInappropriate { .. })
    ));
    coordinator
        .request_cash_out_from(operator, addr(ALICE), 100, tx(2))
        .unwrap();

    let record = coordinator.get_cash_out(tx(2)).unwrap();
    assert_eq!(record.status, CashOutStatus::Pending);
    assert_eq!(record.amount, 100);
    assert_eq!(deployment.ledger().balance_of(addr(ALICE)), 900);
}

#[rstest]
fn test_hooks_fire_across_the_lifecycle(mut deployment: Deployment) {
    let operator = deployment.operator();
    let recorder = attach_recorder(&mut deployment, tx(2));
    let coordinator = deployment.coordinator_mut();

    coordinator
        .request_cash_out_from(operator, addr(ALICE), 50, tx(2))
        .unwrap();
    coordinator.confirm_cash_out(operator, tx(2)).unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            HookIndex::CashOutRequestBefore,
            HookIndex::CashOutRequestAfter,
            HookIndex::CashOutConfirmBefore,
            HookIndex::CashOutConfirmAfter,
        ]
    );
    let invoked = coordinator
        .events()
        .iter()
        .filter(|event| matches!(event, CashierEvent::HookInvoked { .. }))
        .count();
    assert_eq!(invoked, 4);
}

#[rstest]
fn test_vetoed_confirm_keeps_cash_out_pending(mut deployment: Deployment) {
    let operator = deployment.operator();
    let recorder = attach_recorder(&mut deployment, tx(2));
    let coordinator = deployment.coordinator_mut();
    coordinator
        .request_cash_out_from(operator, addr(ALICE), 50, tx(2))
        .unwrap();
    let events_before = coordinator.events().len();

    recorder.veto(Some(HookIndex::CashOutConfirmAfter));
    let result = coordinator.confirm_cash_out(operator, tx(2));
    assert!(matches!(result, Err(CashierError::HookFailed { .. })));

    assert_eq!(coordinator.get_cash_out(tx(2)).unwrap().status, CashOutStatus::Pending);
    assert_eq!(coordinator.pending_cash_out_count(), 1);
    assert_eq!(coordinator.events().len(), events_before);
    assert_eq!(escrow_balance(&deployment), 50);

    // Clearing the hooks lets the confirmation through
    let coordinator = deployment.coordinator_mut();
    coordinator
        .configure_cash_out_hooks(operator, tx(2), Address::ZERO, 0)
        .unwrap();
    coordinator.confirm_cash_out(operator, tx(2)).unwrap();
    assert_eq!(escrow_balance(&deployment), 0);
}

#[rstest]
fn test_internal_and_forced_cash_outs_are_terminal(mut deployment: Deployment) {
    let operator = deployment.operator();
    let coordinator = deployment.coordinator_mut();
    coordinator
        .make_internal_cash_out(operator, addr(ALICE), addr(BOB), 200, tx(2))
        .unwrap();
    coordinator
        .force_cash_out(operator, addr(BOB), 50, tx(3))
        .unwrap();

    assert_eq!(coordinator.get_cash_out(tx(2)).unwrap().status, CashOutStatus::Internal);
    assert_eq!(coordinator.get_cash_out(tx(3)).unwrap().status, CashOutStatus::Forced);
    for tx_id in [tx(2), tx(3)] {
        assert!(coordinator.confirm_cash_out(operator, tx_id).is_err());
        assert!(coordinator.reverse_cash_out(operator, tx_id).is_err());
    }
    assert_eq!(coordinator.pending_cash_out_count(), 0);
    assert_eq!(deployment.ledger().balance_of(addr(ALICE)), 800);
    assert_eq!(deployment.ledger().balance_of(addr(BOB)), 150);
    assert_eq!(deployment.ledger().total_supply(), 950);
}

#[rstest]
fn test_batch_request_is_all_or_nothing(mut deployment: Deployment) {
    let operator = deployment.operator();
    let coordinator = deployment.coordinator_mut();

    let result = coordinator.request_cash_out_from_batch(
        operator,
        &[addr(ALICE), addr(ALICE), addr(ALICE)],
        &[100, 200, 5_000],
        &[tx(10), tx(11), tx(12)],
    );
    assert!(result.is_err());
    assert_eq!(coordinator.pending_cash_out_count(), 0);
    assert_eq!(coordinator.get_cash_out(tx(10)).unwrap().status, CashOutStatus::Nonexistent);
    assert_eq!(escrow_balance(&deployment), 0);

    let coordinator = deployment.coordinator_mut();
    coordinator
        .request_cash_out_from_batch(
            operator,
            &[addr(ALICE), addr(ALICE)],
            &[100, 200],
            &[tx(10), tx(11)],
        )
        .unwrap();
    let pending: HashSet<TxId> = coordinator
        .get_pending_cash_out_tx_ids(0, 10)
        .into_iter()
        .collect();
    assert_eq!(pending, HashSet::from([tx(10), tx(11)]));

    coordinator
        .confirm_cash_out_batch(operator, &[tx(10), tx(11)])
        .unwrap();
    assert_eq!(coordinator.cash_out_balance_of(addr(ALICE)), 0);
    assert_eq!(deployment.ledger().total_supply(), 700);
}

#[rstest]
fn test_cash_in_batch_tolerates_executed_items(mut deployment: Deployment) {
    let operator = deployment.operator();
    let coordinator = deployment.coordinator_mut();
    let batch_id = BatchId::from(77);

    let outcomes = coordinator
        .cash_in_batch(
            operator,
            &[addr(ALICE), addr(BOB)],
            &[10, 20],
            &[tx(1), tx(2)],
            batch_id,
        )
        .unwrap();
    assert_eq!(
        outcomes,
        vec![
            CashInExecutionResult::AlreadyExecuted,
            CashInExecutionResult::Success
        ]
    );
    assert!(coordinator.is_batch_executed(batch_id));

    let replay = coordinator.cash_in_batch(operator, &[addr(BOB)], &[20], &[tx(3)], batch_id);
    assert!(matches!(
        replay,
        Err(CashierError::CashInBatchAlreadyExecuted { .. })
    ));
    assert_eq!(deployment.ledger().balance_of(addr(ALICE)), 1_000);
    assert_eq!(deployment.ledger().balance_of(addr(BOB)), 20);
}

#[rstest]
fn test_premint_schedule_lifecycle(mut deployment: Deployment) {
    let operator = deployment.operator();
    let release_time = 1_700_000_000;
    let coordinator = deployment.coordinator_mut();

    coordinator
        .cash_in_premint(operator, addr(BOB), 500, tx(20), release_time)
        .unwrap();
    assert_eq!(
        coordinator.get_cash_in(tx(20)).unwrap().status,
        CashInStatus::PremintExecuted
    );
    coordinator
        .cash_in_premint_update(operator, 800, tx(20), release_time)
        .unwrap();
    assert_eq!(deployment.ledger().scheduled(addr(BOB), release_time), 800);
    assert_eq!(deployment.ledger().balance_of(addr(BOB)), 0);

    let coordinator = deployment.coordinator_mut();
    coordinator
        .cash_in_premint_revoke(operator, tx(20), release_time)
        .unwrap();
    assert_eq!(deployment.ledger().scheduled(addr(BOB), release_time), 0);
}

#[rstest]
fn test_suspension_and_capabilities(mut deployment: Deployment) {
    let operator = deployment.operator();

    deployment.suspend_switch().suspend();
    let suspended = deployment
        .coordinator_mut()
        .cash_in(operator, addr(BOB), 10, tx(2));
    assert_eq!(suspended.unwrap_err().category(), ErrorCategory::Availability);

    deployment.suspend_switch().resume();
    deployment.roles().revoke(operator, Capability::Cashier);
    let unauthorized = deployment
        .coordinator_mut()
        .cash_in(operator, addr(BOB), 10, tx(2));
    assert_eq!(unauthorized.unwrap_err().category(), ErrorCategory::Authorization);

    deployment.roles().grant(operator, Capability::Cashier);
    deployment
        .coordinator_mut()
        .cash_in(operator, addr(BOB), 10, tx(2))
        .unwrap();
    assert_eq!(deployment.ledger().balance_of(addr(BOB)), 10);
}

#[rstest]
fn test_records_live_on_the_routed_shard(deployment: Deployment) {
    let coordinator = deployment.coordinator();
    let shards = coordinator.get_shard_range(0, coordinator.shard_count());
    assert_eq!(shards.len(), CashierConfig::default().shard_count);

    let routed = coordinator.get_shard_by_tx_id(tx(1)).unwrap();
    assert!(shards.contains(&routed));
    assert_eq!(coordinator.get_shard_by_tx_id(tx(1)).unwrap(), routed);
    assert_eq!(coordinator.get_cash_in(tx(1)).unwrap().amount, 1_000);
}

/// Two coordinators wired to the same shards and ledger; only the first owns the shards
fn shared_shard_pair(operator: Address) -> (Coordinator, Coordinator, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let roles = Arc::new(RoleTable::new());
    roles.grant_all(operator);
    let collaborators = || Collaborators {
        permissions: roles.clone(),
        suspend_gate: Arc::new(SuspendSwitch::new()),
        ledger: ledger.clone(),
        premint: ledger.clone(),
    };

    let owner = addr(0xc1);
    let shards: Vec<Arc<dyn Shard>> = (0..4u64)
        .map(|i| Arc::new(InMemoryShard::new(addr(0x5000 + i), owner)) as Arc<dyn Shard>)
        .collect();

    let mut first = Coordinator::new(owner, collaborators(), MAX_SHARD_COUNT);
    let mut second = Coordinator::new(addr(0xc2), collaborators(), MAX_SHARD_COUNT);
    first.add_shards(operator, shards.clone()).unwrap();
    second.add_shards(operator, shards).unwrap();
    (first, second, ledger)
}

#[test]
fn test_delegated_coordinator_shares_the_shard_set() {
    let operator = addr(0x0b);
    let (mut first, mut second, ledger) = shared_shard_pair(operator);

    assert_eq!(
        second.cash_in(operator, addr(ALICE), 100, tx(1)),
        Err(CashierError::ShardUnauthorized {
            caller: second.address()
        })
    );
    assert_eq!(ledger.balance_of(addr(ALICE)), 0);

    first
        .configure_shard_admin(operator, second.address(), true)
        .unwrap();
    second.cash_in(operator, addr(ALICE), 100, tx(1)).unwrap();
    assert_eq!(ledger.balance_of(addr(ALICE)), 100);

    // The owner reads the record written by its delegate and cannot replay it
    assert_eq!(first.get_cash_in(tx(1)).unwrap().status, CashInStatus::Executed);
    assert!(matches!(
        first.cash_in(operator, addr(ALICE), 100, tx(1)),
        Err(CashierError::CashInAlreadyExecuted { .. })
    ));

    first
        .configure_shard_admin(operator, second.address(), false)
        .unwrap();
    assert_eq!(
        second.cash_in(operator, addr(BOB), 5, tx(2)),
        Err(CashierError::ShardUnauthorized {
            caller: second.address()
        })
    );
    assert_eq!(ledger.balance_of(addr(BOB)), 0);
    assert_eq!(ledger.total_supply(), 100);
}
