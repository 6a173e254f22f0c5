//! A coordinator wired to in-memory collaborators
//!
//! `Deployment` is what the replay pipelines drive: it owns the coordinator,
//! the ledger, the role table and the suspend switch, creates the initial
//! shards from a [`CashierConfig`] and executes parsed [`Command`]s as the
//! configured operator.

use crate::config::CashierConfig;
use crate::core::access::{RoleTable, SuspendSwitch};
use crate::core::coordinator::{Collaborators, Coordinator};
use crate::core::ledger::InMemoryLedger;
use crate::core::shard::InMemoryShard;
use crate::core::traits::Shard;
use crate::types::{Account, Address, CashierError, Command};
use std::sync::Arc;
use tracing::{debug, info};

/// First shard address; shard `i` lives at `SHARD_ADDRESS_BASE + i`
pub const SHARD_ADDRESS_BASE: u64 = 0x5_0000;

pub struct Deployment {
    coordinator: Coordinator,
    ledger: Arc<InMemoryLedger>,
    roles: Arc<RoleTable>,
    suspend_switch: Arc<SuspendSwitch>,
    operator: Address,
}

impl Deployment {
    /// Build a coordinator with `config.shard_count` fresh shards
    ///
    /// The operator receives every capability and the coordinator owns all
    /// shards.
    ///
    /// # Errors
    ///
    /// Propagates registry errors, e.g. `ShardCountExcess` when the shard
    /// count is above `max_shard_count`.
    pub fn from_config(config: &CashierConfig) -> Result<Self, CashierError> {
        let ledger = Arc::new(InMemoryLedger::new());
        let roles = Arc::new(RoleTable::new());
        let suspend_switch = Arc::new(SuspendSwitch::new());
        roles.grant_all(config.operator);

        let collaborators = Collaborators {
            permissions: roles.clone(),
            suspend_gate: suspend_switch.clone(),
            ledger: ledger.clone(),
            premint: ledger.clone(),
        };
        let mut coordinator =
            Coordinator::new(config.coordinator, collaborators, config.max_shard_count);

        let shards: Vec<Arc<dyn Shard>> = (0..config.shard_count as u64)
            .map(|i| {
                Arc::new(InMemoryShard::new(
                    Address::from(SHARD_ADDRESS_BASE + i),
                    config.coordinator,
                )) as Arc<dyn Shard>
            })
            .collect();
        coordinator.add_shards(config.operator, shards)?;

        info!(
            coordinator = %config.coordinator,
            operator = %config.operator,
            shards = coordinator.shard_count(),
            "deployment ready"
        );

        Ok(Self {
            coordinator,
            ledger,
            roles,
            suspend_switch,
            operator: config.operator,
        })
    }

    /// Run one command as the operator
    pub fn execute(&mut self, command: Command) -> Result<(), CashierError> {
        debug!(command = %command.kind(), tx_id = %command.tx_id(), "executing command");
        let operator = self.operator;
        let coordinator = &mut self.coordinator;
        match command {
            Command::CashIn {
                account,
                amount,
                tx_id,
            } => coordinator.cash_in(operator, account, amount, tx_id),
            Command::CashInPremint {
                account,
                amount,
                tx_id,
                release_time,
            } => coordinator.cash_in_premint(operator, account, amount, tx_id, release_time),
            Command::PremintRevoke {
                tx_id,
                release_time,
            } => coordinator.cash_in_premint_revoke(operator, tx_id, release_time),
            Command::PremintUpdate {
                amount,
                tx_id,
                release_time,
            } => coordinator.cash_in_premint_update(operator, amount, tx_id, release_time),
            Command::RequestCashOut {
                account,
                amount,
                tx_id,
            } => coordinator.request_cash_out_from(operator, account, amount, tx_id),
            Command::ConfirmCashOut { tx_id } => coordinator.confirm_cash_out(operator, tx_id),
            Command::ReverseCashOut { tx_id } => coordinator.reverse_cash_out(operator, tx_id),
            Command::InternalCashOut {
                from,
                to,
                amount,
                tx_id,
            } => coordinator.make_internal_cash_out(operator, from, to, amount, tx_id),
            Command::ForcedCashOut {
                from,
                amount,
                tx_id,
            } => coordinator.force_cash_out(operator, from, amount, tx_id),
        }
    }

    /// Every account the ledger has seen, sorted by address
    ///
    /// The coordinator's escrow account is left out; escrowed amounts show
    /// up as the owners' `cash_out_balance` instead.
    pub fn accounts(&self) -> Vec<Account> {
        let escrow = self.coordinator.address();
        self.ledger
            .accounts()
            .into_iter()
            .filter(|(address, _)| *address != escrow)
            .map(|(address, balance)| Account {
                address,
                balance,
                cash_out_balance: self.coordinator.cash_out_balance_of(address),
            })
            .collect()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn suspend_switch(&self) -> &SuspendSwitch {
        &self.suspend_switch
    }

    pub fn operator(&self) -> Address {
        self.operator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{FungibleLedger, PermissionService};
    use crate::types::{Capability, TxId};
    use rstest::{fixture, rstest};

    fn alice() -> Address {
        Address::from(0xa1)
    }

    #[fixture]
    fn deployment() -> Deployment {
        Deployment::from_config(&CashierConfig::default()).unwrap()
    }

    #[rstest]
    fn test_bootstrap(deployment: Deployment) {
        let config = CashierConfig::default();
        assert_eq!(deployment.coordinator().shard_count(), config.shard_count);
        assert_eq!(
            deployment.coordinator().get_shard_range(0, 1),
            vec![Address::from(SHARD_ADDRESS_BASE)]
        );
        assert!(Capability::ALL
            .iter()
            .all(|capability| deployment.roles().has_privilege(config.operator, *capability)));
    }

    #[test]
    fn test_bootstrap_rejects_excess_shards() {
        let config = CashierConfig {
            shard_count: 3,
            max_shard_count: 2,
            ..CashierConfig::default()
        };
        assert!(matches!(
            Deployment::from_config(&config),
            Err(CashierError::ShardCountExcess { .. })
        ));
    }

    #[rstest]
    fn test_accounts_hide_escrow(mut deployment: Deployment) {
        deployment
            .execute(Command::CashIn {
                account: alice(),
                amount: 100,
                tx_id: TxId::from(1),
            })
            .unwrap();
        deployment
            .execute(Command::RequestCashOut {
                account: alice(),
                amount: 30,
                tx_id: TxId::from(2),
            })
            .unwrap();

        assert_eq!(
            deployment.ledger().balance_of(deployment.coordinator().address()),
            30
        );
        assert_eq!(
            deployment.accounts(),
            vec![Account {
                address: alice(),
                balance: 70,
                cash_out_balance: 30
            }]
        );
    }

    #[rstest]
    fn test_execute_every_command(mut deployment: Deployment) {
        let bob = Address::from(0xb0);
        let commands = vec![
            Command::CashIn { account: alice(), amount: 500, tx_id: TxId::from(1) },
            Command::CashInPremint { account: bob, amount: 50, tx_id: TxId::from(2), release_time: 9 },
            Command::PremintUpdate { amount: 60, tx_id: TxId::from(2), release_time: 9 },
            Command::PremintRevoke { tx_id: TxId::from(2), release_time: 9 },
            Command::RequestCashOut { account: alice(), amount: 100, tx_id: TxId::from(3) },
            Command::ReverseCashOut { tx_id: TxId::from(3) },
            Command::RequestCashOut { account: alice(), amount: 100, tx_id: TxId::from(3) },
            Command::ConfirmCashOut { tx_id: TxId::from(3) },
            Command::InternalCashOut { from: alice(), to: bob, amount: 150, tx_id: TxId::from(4) },
            Command::ForcedCashOut { from: bob, amount: 50, tx_id: TxId::from(5) },
        ];
        for command in commands {
            deployment.execute(command).unwrap();
        }

        assert_eq!(
            deployment.accounts(),
            vec![
                Account { address: alice(), balance: 250, cash_out_balance: 0 },
                Account { address: bob, balance: 100, cash_out_balance: 0 },
            ]
        );
        assert_eq!(deployment.ledger().total_supply(), 350);
    }

    #[rstest]
    fn test_suspended_deployment_rejects_commands(mut deployment: Deployment) {
        deployment.suspend_switch().suspend();
        let result = deployment.execute(Command::CashIn {
            account: alice(),
            amount: 1,
            tx_id: TxId::from(1),
        });
        assert_eq!(result, Err(CashierError::Suspended));
    }
}
