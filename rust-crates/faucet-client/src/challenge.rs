use crate::{
    node::ChainQuery,
    verification::VerificationClient,
};
use afcaptcha::Challenge;
use tracing::{
    info,
    warn,
};

/// Opens a fresh challenge from the chain's current height.
pub async fn derive_challenge<N: ChainQuery>(verifier: &VerificationClient<N>) -> Challenge {
    let height = verifier.current_height().await;
    derive_challenge_at(verifier, height).await
}

/// Seeds a challenge from the block before `height`. The captcha never blocks
/// on a missing seed, it falls back to the first catalog entry instead.
pub async fn derive_challenge_at<N: ChainQuery>(
    verifier: &VerificationClient<N>,
    height: u64,
) -> Challenge {
    let reference = Challenge::reference_round_for(height);
    let challenge = match verifier.block_randomness(reference).await {
        Ok(seed) => Challenge::from_seed(reference, &seed),
        Err(err) => {
            warn!(round = reference, %err, "block seed unavailable, using fallback challenge");
            Challenge::fallback(reference)
        }
    };
    info!(
        round = challenge.reference_round(),
        catalog_index = challenge.catalog_index(),
        "captcha challenge derived"
    );
    challenge
}
