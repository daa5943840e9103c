#![allow(non_snake_case)]

use super::*;
use crate::{
    fee_payer::FeePayer,
    protocol::{
        AFCAPTCHA_APP_ID,
        FAUCET_APP_ID,
    },
    test_helpers::{
        FakeNode,
        FakeWallet,
        MAINNET_GENESIS_HASH,
        test_config,
        user_address,
    },
    transaction::LogicSigTransaction,
    wallet::WalletId,
};
use afcaptcha::SubmitRejection;

const REFERENCE: u64 = 999_999;

fn params(last_round: u64) -> TransactionParams {
    TransactionParams {
        fee: 0,
        min_fee: 1_000,
        last_round,
        genesis_id: "mainnet-v1.0".to_owned(),
        genesis_hash: MAINNET_GENESIS_HASH.to_owned(),
    }
}

fn fee_payer() -> FeePayer {
    FeePayer::from_bytecode(FAUCET_APP_ID, vec![0x06, 0x81, 0x01])
}

/// Catalog entry 8, solved by sliding 2, 5 and 8.
fn solved_payload() -> SolvePayload {
    SolvePayload {
        catalog_index: 8,
        reference_round: REFERENCE,
        initial_state: "103426758".to_owned(),
        moves: vec![2, 5, 8],
    }
}

fn payload_with_moves(moves: Vec<u8>) -> SolvePayload {
    SolvePayload {
        moves,
        ..solved_payload()
    }
}

fn verifier(node: &FakeNode) -> VerificationClient<FakeNode> {
    VerificationClient::new(node.clone(), &test_config())
}

#[test]
fn validity_window__after_reference__starts_next_round_and_spans_fifty() {
    let window = ValidityWindow::after_reference(REFERENCE);

    assert_eq!(window.first, 1_000_000);
    assert_eq!(window.last, 1_000_050);
    assert!(window.first > REFERENCE);
}

#[test]
fn validity_window__from_params__spans_a_thousand_rounds() {
    let window = ValidityWindow::from_params(&params(500));

    assert_eq!(window, ValidityWindow { first: 500, last: 1_500 });
}

#[test]
fn validity_window__rounds_near_u64_max__saturate() {
    let captcha = ValidityWindow::after_reference(u64::MAX);
    let claim = ValidityWindow::from_params(&params(u64::MAX - 10));

    assert_eq!(captcha, ValidityWindow { first: u64::MAX, last: u64::MAX });
    assert_eq!(claim.last, u64::MAX);
}

#[test]
fn build_captcha_group__solved_payload__has_five_members_in_order() {
    // given
    let payer = fee_payer();

    // when
    let group = build_captcha_group(
        user_address(),
        &solved_payload(),
        &params(1_000_003),
        &payer,
        &AppIds::default(),
    )
    .unwrap();

    // then
    let txns = &group.txns;
    assert_eq!(txns.len(), 5);
    assert_eq!(group.user_indices, vec![0, 1, 2, 3]);
    assert_eq!(group.fee_payer_index, 4);
    assert_eq!(group.confirmation_rounds, 6);

    let solve_args: Vec<&[u8]> = txns[0].app_args().iter().map(Blob::as_bytes).collect();
    assert_eq!(txns[0].app_id(), Some(AFCAPTCHA_APP_ID));
    assert_eq!(
        solve_args,
        vec![
            b"solve".as_slice(),
            REFERENCE.to_be_bytes().as_slice(),
            b"103426758".as_slice(),
            b"258".as_slice(),
            b"123456780".as_slice(),
        ]
    );
    assert_eq!(txns[0].header.note.as_bytes(), b"AFCaptcha");

    for (txn, n) in [(&txns[1], "1"), (&txns[2], "2")] {
        assert_eq!(txn.app_id(), Some(AFCAPTCHA_APP_ID));
        let args: Vec<&[u8]> = txn.app_args().iter().map(Blob::as_bytes).collect();
        assert_eq!(args, vec![b"ping".as_slice(), n.as_bytes()]);
    }

    assert_eq!(txns[3].app_id(), Some(FAUCET_APP_ID));
    assert_eq!(txns[3].app_args()[0].as_bytes(), b"claim");
    assert_eq!(txns[3].header.note.as_bytes(), b"AlgoFaucet");
    let TxnKind::Appl { boxes, .. } = &txns[3].kind else {
        panic!("claim is not an application call");
    };
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].app_id, FAUCET_APP_ID);
    assert_eq!(boxes[0].name.as_bytes(), user_address().public_key().as_slice());

    assert_eq!(*txns[4].sender(), payer.address());
}

#[test]
fn build_captcha_group__fees__are_pooled_on_the_fee_payer() {
    let group = build_captcha_group(
        user_address(),
        &solved_payload(),
        &params(1_000_003),
        &fee_payer(),
        &AppIds::default(),
    )
    .unwrap();

    let fees: Vec<u64> = group.txns.iter().map(Transaction::fee).collect();
    assert_eq!(fees, vec![0, 0, 0, 0, 6_000]);
    assert!(fee_payer().authorizes(&group.txns, group.fee_payer_index));
}

#[test]
fn build_captcha_group__every_member__shares_group_id_and_window() {
    let group = build_captcha_group(
        user_address(),
        &solved_payload(),
        &params(1_000_003),
        &fee_payer(),
        &AppIds::default(),
    )
    .unwrap();

    for txn in &group.txns {
        assert_eq!(txn.group(), Some(group.group_id));
        assert_eq!(txn.header.first_valid, REFERENCE + 1);
        assert_eq!(txn.header.last_valid, REFERENCE + 51);
        assert_eq!(txn.header.genesis_id, "mainnet-v1.0");
    }
}

#[test]
fn build_captcha_group__invalid_trails__are_refused_before_assembly() {
    let build = |payload: SolvePayload| {
        build_captcha_group(
            user_address(),
            &payload,
            &params(1_000_003),
            &fee_payer(),
            &AppIds::default(),
        )
    };

    assert!(matches!(
        build(payload_with_moves(vec![])),
        Err(FaucetError::Precondition(PreconditionError::Captcha(
            SubmitRejection::EmptyTrail
        )))
    ));
    assert!(matches!(
        build(payload_with_moves(vec![2, 5])),
        Err(FaucetError::Precondition(PreconditionError::Captcha(
            SubmitRejection::NotSolved
        )))
    ));
    assert!(matches!(
        build(payload_with_moves(vec![2, 5, 8, 8, 8])),
        Err(FaucetError::Precondition(PreconditionError::Captcha(
            SubmitRejection::TrailTooLong(5)
        )))
    ));
}

#[test]
fn build_claim_group__returning_claimant__is_claim_then_fee_payment() {
    // given
    let payer = fee_payer();

    // when
    let group =
        build_claim_group(user_address(), &params(500), &payer, &AppIds::default()).unwrap();

    // then
    assert_eq!(group.txns.len(), 2);
    assert_eq!(group.user_indices, vec![0]);
    assert_eq!(group.fee_payer_index, 1);
    assert_eq!(group.confirmation_rounds, 4);
    assert_eq!(group.txns[0].fee(), 0);
    assert_eq!(group.txns[1].fee(), 3_000);
    assert_eq!(group.window, ValidityWindow { first: 500, last: 1_500 });
    assert!(payer.authorizes(&group.txns, 1));
}

#[tokio::test]
async fn submit_captcha_claim__solved__broadcasts_once_and_confirms() {
    // given
    let node = FakeNode::mainnet(1_000_003);
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Defly);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);
    let submitter = ClaimSubmitter::new(&verifier, &wallet, &fee_payers);

    // when
    let confirmation = submitter
        .submit_captcha_claim(&solved_payload())
        .await
        .unwrap();

    // then
    assert_eq!(confirmation.txid, "TX1");
    assert_eq!(confirmation.confirmed_round, 1_000_004);
    let broadcasts = node.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    let blobs = &broadcasts[0];
    assert_eq!(blobs.len(), 5);
    assert!(blobs[..4].iter().all(|b| b.starts_with(b"signed:")));

    assert!(matches!(blobs[4][0], 0x80..=0x8f));
    let fee_member = LogicSigTransaction::from_bytes(&blobs[4]).unwrap();
    let payer = fee_payers.cached().unwrap();
    assert_eq!(fee_member.lsig.program.as_bytes(), payer.program());
    assert_eq!(fee_member.txn.fee(), 6_000);
}

#[tokio::test]
async fn submit_captcha_claim__pera_and_group_wallets__send_identical_groups() {
    // given
    let pera_node = FakeNode::mainnet(1_000_003);
    let defly_node = FakeNode::mainnet(1_000_003);
    let pera = FakeWallet::new(WalletId::Pera);
    let defly = FakeWallet::new(WalletId::Defly);
    let (pera_verifier, defly_verifier) = (verifier(&pera_node), verifier(&defly_node));
    let (pera_payers, defly_payers) = (
        FeePayerCache::new(FAUCET_APP_ID),
        FeePayerCache::new(FAUCET_APP_ID),
    );

    // when
    ClaimSubmitter::new(&pera_verifier, &pera, &pera_payers)
        .submit_captcha_claim(&solved_payload())
        .await
        .unwrap();
    ClaimSubmitter::new(&defly_verifier, &defly, &defly_payers)
        .submit_captcha_claim(&solved_payload())
        .await
        .unwrap();

    // then
    assert_eq!(pera_node.broadcasts(), defly_node.broadcasts());
}

#[tokio::test]
async fn submit_captcha_claim__unsolved__never_reaches_the_node() {
    // given
    let node = FakeNode::mainnet(1_000_003);
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Defly);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    // when
    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_captcha_claim(&payload_with_moves(vec![2]))
        .await;

    // then
    assert!(matches!(result, Err(FaucetError::Precondition(_))));
    assert_eq!(node.broadcast_count(), 0);
    assert_eq!(node.compile_calls(), 0);
    assert!(wallet.calls().is_empty());
}

#[tokio::test]
async fn prepare_captcha_claim__solved_payload__signs_without_broadcasting() {
    // given
    let node = FakeNode::mainnet(1_000_003);
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Defly);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);
    let submitter = ClaimSubmitter::new(&verifier, &wallet, &fee_payers);

    // when
    let signed = submitter
        .prepare_captcha_claim(&solved_payload())
        .await
        .unwrap();

    // then
    assert_eq!(signed.blobs.len(), 5);
    assert_eq!(signed.confirmation_rounds, 6);
    assert_eq!(node.broadcast_count(), 0);
    assert_eq!(wallet.calls().len(), 1);
}

#[tokio::test]
async fn submit_claim__no_active_account__is_no_signer() {
    let node = FakeNode::mainnet(500);
    let verifier = verifier(&node);
    let wallet = FakeWallet::disconnected(WalletId::Lute);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_claim()
        .await;

    assert!(matches!(
        result,
        Err(FaucetError::Precondition(PreconditionError::NoSigner))
    ));
    assert_eq!(node.broadcast_count(), 0);
}

#[tokio::test]
async fn submit_claim__wrong_network__aborts_before_signing() {
    // given
    let node = FakeNode::mainnet(500);
    node.set_genesis("testnet-v1.0");
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Defly);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    // when
    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_claim()
        .await;

    // then
    assert!(matches!(result, Err(FaucetError::WrongNetwork { genesis_id }) if genesis_id == "testnet-v1.0"));
    assert!(wallet.calls().is_empty());
    assert_eq!(node.broadcast_count(), 0);
}

#[tokio::test]
async fn submit_claim__node_rejects_group__is_not_resent() {
    // given
    let node = FakeNode::mainnet(500);
    node.fail_broadcast("transaction rejected: overspend");
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Kibisis);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    // when
    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_claim()
        .await;

    // then
    assert!(matches!(result, Err(FaucetError::Rejected(msg)) if msg.contains("overspend")));
    assert_eq!(node.broadcast_count(), 1);
}

#[tokio::test]
async fn submit_claim__never_committed__is_unconfirmed_after_four_rounds() {
    // given
    let node = FakeNode::mainnet(500);
    node.hold_confirmations();
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Defly);
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    // when
    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_claim()
        .await;

    // then
    assert!(matches!(result, Err(FaucetError::Unconfirmed { rounds: 4, .. })));
    assert_eq!(node.pending_polls(), 4);
}

#[tokio::test]
async fn submit_claim__wallet_declines__propagates_without_broadcast() {
    let node = FakeNode::mainnet(500);
    let verifier = verifier(&node);
    let wallet = FakeWallet::new(WalletId::Exodus);
    wallet.reject_with("user rejected the request");
    let fee_payers = FeePayerCache::new(FAUCET_APP_ID);

    let result = ClaimSubmitter::new(&verifier, &wallet, &fee_payers)
        .submit_claim()
        .await;

    assert!(matches!(result, Err(FaucetError::Wallet(_))));
    assert_eq!(node.broadcast_count(), 0);
}
