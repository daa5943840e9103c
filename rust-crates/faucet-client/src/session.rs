use crate::{
    PreconditionError,
    Result,
    address::Address,
    assembler::ClaimSubmitter,
    challenge::derive_challenge,
    config::FaucetConfig,
    events::{
        EventBus,
        Topic,
    },
    fee_payer::FeePayerCache,
    node::{
        ChainQuery,
        Confirmation,
    },
    poller::{
        BalancePoller,
        HeightPoller,
        spawn_balance_poller,
        spawn_height_poller,
    },
    redact::mask,
    verification::{
        ClaimAvailability,
        FaucetBalance,
        VerificationClient,
    },
    wallet::WalletSigner,
};
use afcaptcha::{
    CaptchaBoard,
    Challenge,
    TapOutcome,
};
use std::sync::Arc;
use tracing::{
    error,
    info,
    warn,
};

/// What a claim request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStart {
    /// First-time claimant; the captcha board is now open.
    CaptchaRequired(Challenge),
    Claimed(Confirmation),
}

/// One user's faucet session: a connected wallet, at most one open captcha,
/// and the background pollers that live while their surface is shown.
pub struct FaucetSession<N, W> {
    config: FaucetConfig,
    verifier: Arc<VerificationClient<N>>,
    wallet: W,
    fee_payers: FeePayerCache,
    events: EventBus,
    board: Option<CaptchaBoard>,
    height_poller: Option<HeightPoller>,
    balance_poller: Option<BalancePoller>,
    claimed: bool,
}

impl<N, W> FaucetSession<N, W>
where
    N: ChainQuery + 'static,
    W: WalletSigner,
{
    pub fn new(node: N, wallet: W, config: FaucetConfig) -> Self {
        Self::with_events(node, wallet, config, EventBus::default())
    }

    pub fn with_events(node: N, wallet: W, config: FaucetConfig, events: EventBus) -> Self {
        Self {
            verifier: Arc::new(VerificationClient::new(node, &config)),
            fee_payers: FeePayerCache::new(config.apps.faucet),
            config,
            wallet,
            events,
            board: None,
            height_poller: None,
            balance_poller: None,
            claimed: false,
        }
    }

    pub fn verifier(&self) -> &VerificationClient<N> {
        &self.verifier
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn board(&self) -> Option<&CaptchaBoard> {
        self.board.as_ref()
    }

    pub fn has_claimed(&self) -> bool {
        self.claimed
    }

    /// Height seen by the captcha poller, if it is running.
    pub fn polled_height(&self) -> Option<u64> {
        self.height_poller.as_ref().map(HeightPoller::latest)
    }

    pub fn faucet_balance(&self) -> Option<FaucetBalance> {
        self.balance_poller.as_ref().map(BalancePoller::latest)
    }

    pub async fn connect(&mut self) -> Result<Address> {
        let address = self.wallet.connect().await?;
        info!(address = %mask(&address.to_string()), wallet = %self.wallet.wallet_id(), "wallet connected");
        Ok(address)
    }

    /// Closes everything and forgets the account.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.close_captcha().await;
        self.wallet.disconnect().await?;
        self.claimed = false;
        info!("wallet disconnected");
        Ok(())
    }

    /// Shows the faucet panel and starts refreshing the escrow balance.
    pub fn open_modal(&mut self) {
        if self.balance_poller.is_none() {
            self.balance_poller = Some(spawn_balance_poller(
                Arc::clone(&self.verifier),
                self.config.balance_poll_interval,
            ));
        }
        self.events.publish(Topic::ModalOpen);
    }

    pub async fn close_modal(&mut self) {
        self.close_captcha().await;
        if let Some(poller) = self.balance_poller.take() {
            poller.stop().await;
        }
        self.events.publish(Topic::ModalClose);
    }

    /// Rate-limit state for the connected account.
    pub async fn claim_availability(&self) -> Result<ClaimAvailability> {
        let address = self.signer()?;
        let height = self.verifier.current_height().await;
        self.verifier.claim_availability(&address, height).await
    }

    /// Starts a claim: first-time claimants get a captcha, everyone else a
    /// plain claim submission.
    pub async fn claim(&mut self) -> Result<ClaimStart> {
        let address = self.signer()?;
        self.verifier.verify_network().await?;
        match self.claim_availability().await {
            Ok(ClaimAvailability::Wait { remaining, .. }) => {
                return Err(PreconditionError::ClaimNotAvailable { remaining }.into());
            }
            Ok(ClaimAvailability::Available) => {}
            Err(err) => warn!(%err, "claim availability unknown, continuing"),
        }

        if self.verifier.is_new_beneficiary(&address).await {
            info!(address = %mask(&address.to_string()), "new beneficiary, captcha required");
            let challenge = self.open_captcha().await;
            return Ok(ClaimStart::CaptchaRequired(challenge));
        }

        let confirmation = match self.submitter().submit_claim().await {
            Ok(confirmation) => confirmation,
            Err(err) => {
                error!(%err, "claim failed");
                return Err(err);
            }
        };
        self.mark_claimed();
        Ok(ClaimStart::Claimed(confirmation))
    }

    /// Opens the board on a freshly derived challenge. Reopening discards
    /// the previous board and trail.
    pub async fn open_captcha(&mut self) -> Challenge {
        let challenge = derive_challenge(self.verifier.as_ref()).await;
        match self.board.as_mut() {
            Some(board) => board.reset(challenge),
            None => self.board = Some(CaptchaBoard::new(challenge)),
        }
        if self.height_poller.is_none() {
            self.height_poller = Some(spawn_height_poller(
                Arc::clone(&self.verifier),
                self.config.captcha_poll_interval,
            ));
        }
        self.events.publish(Topic::CaptchaOpen);
        self.events.publish(Topic::AnimationDisable);
        challenge
    }

    pub fn tap(&mut self, position: usize) -> Result<TapOutcome> {
        let board = self
            .board
            .as_mut()
            .ok_or(PreconditionError::CaptchaClosed)?;
        Ok(board.tap(position))
    }

    /// Sends the solved captcha with its claim.
    ///
    /// A failure before the broadcast (wallet refusal, wrong network) leaves
    /// the board open and solved so the user can try again. Once the group has
    /// been broadcast its challenge is spent: on rejection or a missing
    /// confirmation the captcha is closed and the next claim derives a new one.
    pub async fn submit_captcha(&mut self) -> Result<Confirmation> {
        let board = self
            .board
            .as_mut()
            .ok_or(PreconditionError::CaptchaClosed)?;
        let payload = board.begin_submission().map_err(PreconditionError::from)?;

        let prepared = self.submitter().prepare_captcha_claim(&payload).await;
        let signed = match prepared {
            Ok(signed) => signed,
            Err(err) => {
                if let Some(board) = self.board.as_mut() {
                    board.finish_submission(false);
                }
                warn!(%err, catalog_index = payload.catalog_index, "captcha claim not sent");
                return Err(err);
            }
        };

        let result = self.submitter().send(&signed).await;
        match result {
            Ok(confirmation) => {
                self.mark_claimed();
                self.close_captcha().await;
                Ok(confirmation)
            }
            Err(err) => {
                error!(
                    %err,
                    round = payload.reference_round,
                    catalog_index = payload.catalog_index,
                    "captcha submission failed, challenge discarded"
                );
                self.close_captcha().await;
                Err(err)
            }
        }
    }

    /// Stops the height poller and drops the board. Does nothing when no
    /// captcha is open.
    pub async fn close_captcha(&mut self) {
        let Some(mut board) = self.board.take() else {
            return;
        };
        board.close();
        if let Some(poller) = self.height_poller.take() {
            poller.stop().await;
        }
        self.events.publish(Topic::CaptchaClose);
        self.events.publish(Topic::AnimationEnable);
    }

    fn signer(&self) -> Result<Address> {
        Ok(self
            .wallet
            .active_address()
            .ok_or(PreconditionError::NoSigner)?)
    }

    fn submitter(&self) -> ClaimSubmitter<'_, N, W> {
        ClaimSubmitter::new(self.verifier.as_ref(), &self.wallet, &self.fee_payers)
    }

    fn mark_claimed(&mut self) {
        self.claimed = true;
        self.events.publish(Topic::RefreshBalance);
        if let Some(poller) = &self.balance_poller {
            poller.refresh();
        }
    }
}
