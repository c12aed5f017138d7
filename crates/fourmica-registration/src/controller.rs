use crate::config::{AssetKey, ChainOption, ChainTable};
use crate::session::{Blocker, RegistrationSession, SessionSnapshot, TxStatus};

use fourmica_error::{Error, Result};
use fourmica_traits::{
    format_units, Address, ChainReader, ChainWriter, TxHash, WalletAdapter, WalletEvent, U256,
};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;

/// Namespace passed to the wallet on disconnect
pub const EVM_NAMESPACE: &str = "eip155";

/// What an approve or deposit command did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The transaction ran to the given status (`Idle` for a confirmed
    /// approval, `Success` for a confirmed deposit, `Error` on failure)
    Completed(TxStatus),
    /// Nothing was submitted
    Ignored(IgnoreReason),
}

/// Why a command was a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Another transaction is in flight
    Busy,
    /// A precondition is not met
    NotReady(Blocker),
}

struct Inner {
    session: RegistrationSession,
    balance_generation: u64,
    registration_generation: u64,
    selection_epoch: u64,
}

impl Inner {
    /// Any state → Idle on a selection change. In-flight transactions keep
    /// running but can no longer write status.
    fn reset_tx(&mut self) {
        self.session.tx_status = TxStatus::Idle;
        self.session.last_tx_hash = None;
        self.session.last_error = None;
        self.selection_epoch += 1;
    }

    fn forget_account(&mut self) {
        self.session.connected_account = None;
        self.session.active_chain_id = None;
        self.session.is_registered = false;
        self.session.clear_reads();
        self.balance_generation += 1;
        self.registration_generation += 1;
    }
}

enum BalancePlan {
    Skip,
    Clear,
    Native {
        account: Address,
    },
    Token {
        account: Address,
        token: Address,
        contract: Address,
    },
}

enum RegistrationPlan {
    NotRegistered,
    Query { account: Address, contract: Address },
}

struct TxPlan {
    epoch: u64,
    account: Address,
    chain_id: u64,
    contract: Address,
    token: Option<Address>,
    amount: U256,
}

/// Drives one registration page visit.
///
/// Owns the [RegistrationSession] and sequences approve → deposit against the
/// wallet and chain clients. Every command takes `&self`; the session lock is
/// never held across an `.await`, so commands and refreshes can overlap.
/// Overlapping refreshes of the same family commit only if no newer one
/// started in the meantime.
pub struct RegistrationController<W, R, X> {
    chains: ChainTable,
    wallet: W,
    reader: R,
    writer: X,
    inner: Mutex<Inner>,
}

impl<W, R, X> RegistrationController<W, R, X>
where
    W: WalletAdapter,
    R: ChainReader,
    X: ChainWriter,
{
    /// Creates a controller on the first chain of `chains`, picking up any
    /// session the wallet already has open.
    pub fn new(chains: ChainTable, wallet: W, reader: R, writer: X) -> Self {
        let mut session = RegistrationSession::new(chains.first());
        session.connected_account = wallet.account();
        session.active_chain_id = session.connected_account.and(wallet.chain_id());
        Self {
            chains,
            wallet,
            reader,
            writer,
            inner: Mutex::new(Inner {
                session,
                balance_generation: 0,
                registration_generation: 0,
                selection_epoch: 0,
            }),
        }
    }

    /// The configured chains
    pub fn chains(&self) -> &ChainTable {
        &self.chains
    }

    /// The wallet this controller drives
    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Current session plus derived values
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        inner.session.snapshot(self.selected_chain(&inner.session))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn selected_chain(&self, session: &RegistrationSession) -> &ChainOption {
        self.chains
            .get(session.selected_chain)
            .unwrap_or_else(|| self.chains.first())
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Selects a chain; keeps the asset if the chain offers it, else falls
    /// back to the chain's first asset.
    pub async fn select_chain(&self, chain_id: u64) -> Result<()> {
        let chain = self
            .chains
            .get(chain_id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown chain {chain_id}")))?;
        {
            let mut inner = self.lock();
            let session = &mut inner.session;
            session.selected_chain = chain.id;
            if chain.asset(session.selected_asset).is_none() {
                session.selected_asset = chain.default_asset().unwrap_or(AssetKey::Native);
            }
            session.reparse(chain.asset(session.selected_asset));
            session.clear_reads();
            session.is_registered = false;
            inner.reset_tx();
        }
        tracing::info!(chain_id, label = %chain.label, "chain selected");
        self.refresh().await;
        Ok(())
    }

    /// Selects an asset of the current chain
    pub async fn select_asset(&self, key: AssetKey) -> Result<()> {
        {
            let mut inner = self.lock();
            let chain = self.selected_chain(&inner.session);
            let asset = chain.asset(key).ok_or_else(|| {
                Error::InvalidInput(format!("{key:?} is not offered on {}", chain.label))
            })?;
            let session = &mut inner.session;
            session.selected_asset = key;
            session.reparse(Some(asset));
            session.clear_reads();
            inner.reset_tx();
        }
        tracing::info!(asset = ?key, "asset selected");
        self.refresh_balances().await;
        Ok(())
    }

    /// Replaces the amount text and re-validates it
    pub fn set_amount(&self, text: impl Into<String>) {
        let mut inner = self.lock();
        let chain = self.selected_chain(&inner.session);
        let session = &mut inner.session;
        session.amount_input = text.into();
        session.reparse(chain.asset(session.selected_asset));
        inner.reset_tx();
    }

    /// Fills the amount field with the whole known balance.
    ///
    /// Returns false, leaving the field alone, while the balance is unknown.
    pub fn set_max_amount(&self) -> bool {
        let text = {
            let inner = self.lock();
            let session = &inner.session;
            let chain = self.selected_chain(session);
            match (session.balance, chain.asset(session.selected_asset)) {
                (Some(balance), Some(asset)) => format_units(balance, asset.decimals),
                _ => return false,
            }
        };
        self.set_amount(text);
        true
    }

    // ------------------------------------------------------------------
    // Wallet
    // ------------------------------------------------------------------

    /// Connects the wallet and loads balances and registration status
    pub async fn connect(&self) -> Result<Address> {
        match self.wallet.connect().await {
            Ok(account) => {
                let chain_id = self.wallet.chain_id();
                {
                    let mut inner = self.lock();
                    if inner.session.connected_account != Some(account) {
                        inner.forget_account();
                    }
                    inner.session.connected_account = Some(account);
                    inner.session.active_chain_id = chain_id;
                    inner.session.last_error = None;
                }
                tracing::info!(%account, ?chain_id, "wallet connected");
                self.refresh().await;
                Ok(account)
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "wallet connection failed");
                self.lock().session.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Disconnects the wallet and clears everything tied to the account.
    ///
    /// Local state is cleared even if the wallet reports a failure.
    pub async fn disconnect(&self) -> Result<()> {
        let result = self.wallet.disconnect(EVM_NAMESPACE).await;
        let mut inner = self.lock();
        inner.forget_account();
        match result {
            Ok(()) => {
                tracing::info!("wallet disconnected");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "wallet disconnect failed");
                inner.session.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Asks the wallet to move to the selected chain
    pub async fn switch_network(&self) -> Result<()> {
        let target = self.lock().session.selected_chain;
        tracing::info!(chain_id = target, "requesting network switch");
        match self.wallet.switch_network(target).await {
            Ok(()) => {
                let active = self.wallet.chain_id();
                {
                    let mut inner = self.lock();
                    inner.session.active_chain_id = active;
                    inner.session.last_error = None;
                    inner.session.clear_reads();
                }
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(chain_id = target, kind = %e.kind(), error = %e, "network switch failed");
                self.lock().session.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Applies an account or chain notification from the wallet
    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        tracing::debug!(?event, "wallet event");
        match event {
            WalletEvent::AccountsChanged(Some(account)) => {
                let changed = {
                    let mut inner = self.lock();
                    let changed = inner.session.connected_account != Some(account);
                    if changed {
                        inner.forget_account();
                        inner.session.connected_account = Some(account);
                    }
                    inner.session.active_chain_id = self.wallet.chain_id();
                    changed
                };
                if changed {
                    self.refresh().await;
                }
            }
            WalletEvent::AccountsChanged(None) | WalletEvent::Disconnected => {
                self.lock().forget_account();
            }
            WalletEvent::ChainChanged(chain_id) => {
                {
                    let mut inner = self.lock();
                    if inner.session.connected_account.is_none()
                        || inner.session.active_chain_id == Some(chain_id)
                    {
                        return;
                    }
                    inner.session.active_chain_id = Some(chain_id);
                    inner.session.is_registered = false;
                    inner.session.clear_reads();
                }
                self.refresh().await;
            }
        }
    }

    /// Applies wallet notifications until the wallet drops its sender.
    ///
    /// When notifications were missed the session is resynchronized from
    /// the wallet's current account and chain.
    pub async fn watch_wallet(&self) {
        let mut events = self.wallet.subscribe();
        loop {
            match events.recv().await {
                Ok(event) => self.handle_wallet_event(event).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "wallet events lagged, resyncing");
                    self.handle_wallet_event(WalletEvent::AccountsChanged(self.wallet.account()))
                        .await;
                    if let Some(chain_id) = self.wallet.chain_id() {
                        self.handle_wallet_event(WalletEvent::ChainChanged(chain_id)).await;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Approves the contract to pull exactly the parsed amount, then re-reads
    /// the allowance from the chain.
    pub async fn approve(&self) -> CommandOutcome {
        let plan = match self.begin(TxStatus::Approving, RegistrationSession::approve_blocker) {
            Ok(plan) => plan,
            Err(reason) => return CommandOutcome::Ignored(reason),
        };
        let Some(token) = plan.token else {
            return self.fail(&plan, "approve", Error::NotConfigured("token address".into()));
        };
        tracing::info!(%token, spender = %plan.contract, amount = %plan.amount, "approving");

        let submitted = self.writer.approve(token, plan.contract, plan.amount).await;
        match self.confirm(&plan, submitted).await {
            Ok(hash) => {
                tracing::info!(%hash, "approval confirmed");
                self.commit_status(&plan, TxStatus::Idle);
                self.refresh_balances().await;
                CommandOutcome::Completed(TxStatus::Idle)
            }
            Err(e) => self.fail(&plan, "approve", e),
        }
    }

    /// Deposits the parsed amount into the contract, marks the account as
    /// registered and re-reads the balance.
    pub async fn deposit(&self) -> CommandOutcome {
        let plan = match self.begin(TxStatus::Depositing, RegistrationSession::deposit_blocker) {
            Ok(plan) => plan,
            Err(reason) => return CommandOutcome::Ignored(reason),
        };
        tracing::info!(contract = %plan.contract, token = ?plan.token, amount = %plan.amount, "depositing");

        let submitted = match plan.token {
            Some(token) => {
                self.writer
                    .deposit_stablecoin(plan.contract, token, plan.amount)
                    .await
            }
            None => self.writer.deposit_native(plan.contract, plan.amount).await,
        };
        match self.confirm(&plan, submitted).await {
            Ok(hash) => {
                tracing::info!(%hash, "deposit confirmed");
                {
                    let mut inner = self.lock();
                    let session = &inner.session;
                    if session.connected_account == Some(plan.account)
                        && session.selected_chain == plan.chain_id
                        && session.on_selected_chain()
                    {
                        inner.session.is_registered = true;
                        inner.registration_generation += 1;
                    }
                }
                self.commit_status(&plan, TxStatus::Success);
                self.refresh_balances().await;
                CommandOutcome::Completed(TxStatus::Success)
            }
            Err(e) => self.fail(&plan, "deposit", e),
        }
    }

    /// Checks preconditions and moves to `status` under one lock
    fn begin(
        &self,
        status: TxStatus,
        blocker: fn(&RegistrationSession, &ChainOption) -> Option<Blocker>,
    ) -> std::result::Result<TxPlan, IgnoreReason> {
        let mut inner = self.lock();
        if inner.session.tx_status.is_busy() {
            tracing::debug!(current = %inner.session.tx_status, "command ignored, transaction in flight");
            return Err(IgnoreReason::Busy);
        }
        let chain = self.selected_chain(&inner.session);
        if let Some(b) = blocker(&inner.session, chain) {
            tracing::debug!(blocker = ?b, "command ignored");
            return Err(IgnoreReason::NotReady(b));
        }

        let session = &inner.session;
        let (Some(account), Some(contract), Ok(amount)) =
            (session.connected_account, chain.contract, &session.parsed_amount)
        else {
            return Err(IgnoreReason::NotReady(Blocker::InvalidAmount));
        };
        let token = chain
            .asset(session.selected_asset)
            .and_then(|asset| asset.token_address());
        let plan = TxPlan {
            epoch: inner.selection_epoch,
            account,
            chain_id: chain.id,
            contract,
            token,
            amount: amount.value,
        };

        inner.session.tx_status = status;
        inner.session.last_tx_hash = None;
        inner.session.last_error = None;
        Ok(plan)
    }

    async fn confirm(&self, plan: &TxPlan, submitted: Result<TxHash>) -> Result<TxHash> {
        let hash = submitted?;
        {
            let mut inner = self.lock();
            if inner.selection_epoch == plan.epoch {
                inner.session.last_tx_hash = Some(hash);
            }
        }
        let receipt = self.writer.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(Error::Reverted(String::new()));
        }
        Ok(hash)
    }

    /// Writes `status` unless the selection changed since `plan` was made
    fn commit_status(&self, plan: &TxPlan, status: TxStatus) -> bool {
        let mut inner = self.lock();
        if inner.selection_epoch != plan.epoch {
            tracing::debug!(%status, "selection changed, transaction outcome not shown");
            return false;
        }
        inner.session.tx_status = status;
        true
    }

    fn fail(&self, plan: &TxPlan, method: &str, error: Error) -> CommandOutcome {
        tracing::warn!(method, kind = %error.kind(), error = %error, "transaction failed");
        if self.commit_status(plan, TxStatus::Error) {
            self.lock().session.last_error = Some(error.user_message());
        }
        CommandOutcome::Completed(TxStatus::Error)
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Re-reads balance, allowance and registration status
    pub async fn refresh(&self) {
        tokio::join!(self.refresh_balances(), self.refresh_registration());
    }

    /// Re-reads balance and allowance for the current selection.
    ///
    /// Skipped while disconnected or on the wrong network. A failure clears
    /// both values and sets `read_error`; `tx_status` is never touched.
    pub async fn refresh_balances(&self) {
        let (generation, plan) = {
            let mut inner = self.lock();
            inner.balance_generation += 1;
            let generation = inner.balance_generation;
            let session = &inner.session;
            let chain = self.selected_chain(session);
            let asset = chain.asset(session.selected_asset);
            let plan = match (session.connected_account, asset) {
                (Some(account), Some(asset)) if session.on_selected_chain() => {
                    if asset.is_native() {
                        BalancePlan::Native { account }
                    } else {
                        match (asset.token_address(), chain.contract) {
                            (Some(token), Some(contract)) => BalancePlan::Token {
                                account,
                                token,
                                contract,
                            },
                            _ => BalancePlan::Clear,
                        }
                    }
                }
                _ => BalancePlan::Skip,
            };
            if matches!(plan, BalancePlan::Clear) {
                inner.session.clear_reads();
            }
            (generation, plan)
        };

        let result = match plan {
            BalancePlan::Skip | BalancePlan::Clear => return,
            BalancePlan::Native { account } => self
                .reader
                .native_balance(account)
                .await
                .map(|balance| (balance, None)),
            BalancePlan::Token {
                account,
                token,
                contract,
            } => tokio::try_join!(
                self.reader.token_balance(token, account),
                self.reader.allowance(token, account, contract),
            )
            .map(|(balance, allowance)| (balance, Some(allowance))),
        };

        let mut inner = self.lock();
        if inner.balance_generation != generation {
            tracing::debug!(generation, "discarding stale balance read");
            return;
        }
        match result {
            Ok((balance, allowance)) => {
                inner.session.balance = Some(balance);
                inner.session.allowance = allowance;
                inner.session.read_error = None;
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "balance read failed");
                inner.session.balance = None;
                inner.session.allowance = None;
                inner.session.read_error = Some(e.user_message());
            }
        }
    }

    /// Recomputes whether the account is registered on the selected chain.
    ///
    /// Live collateral records are checked first; without any, a historical
    /// `CollateralDeposited` log for the account counts. Failures read as
    /// not registered.
    pub async fn refresh_registration(&self) {
        let (generation, plan) = {
            let mut inner = self.lock();
            inner.registration_generation += 1;
            let generation = inner.registration_generation;
            let session = &inner.session;
            let chain = self.selected_chain(session);
            let plan = match (session.connected_account, chain.contract) {
                (Some(account), Some(contract)) if session.on_selected_chain() => {
                    RegistrationPlan::Query { account, contract }
                }
                _ => RegistrationPlan::NotRegistered,
            };
            if matches!(plan, RegistrationPlan::NotRegistered) {
                inner.session.is_registered = false;
            }
            (generation, plan)
        };

        let RegistrationPlan::Query { account, contract } = plan else {
            return;
        };
        let registered = match self.query_registration(contract, account).await {
            Ok(registered) => registered,
            Err(e) => {
                tracing::debug!(%account, kind = %e.kind(), error = %e, "registration check failed");
                false
            }
        };

        let mut inner = self.lock();
        if inner.registration_generation != generation {
            tracing::debug!(%account, generation, "discarding stale registration status");
            return;
        }
        inner.session.is_registered = registered;
    }

    async fn query_registration(&self, contract: Address, account: Address) -> Result<bool> {
        let records = self.reader.user_all_assets(contract, account).await?;
        if records.iter().any(|record| record.is_active()) {
            return Ok(true);
        }
        let events = self.reader.deposit_events(contract, account).await?;
        Ok(!events.is_empty())
    }
}
