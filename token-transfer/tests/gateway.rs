mod common;

use common::*;
use portal_supported_chains::Chain;
use portal_token_transfer::{
    ChainConfig, Phase, TokenId, TransferConfig, TransferError, TransferOutcome, TransferRequest,
    TransferState,
};
use portal_vaas::Address;

const TRANSLATOR: Address = Address([0x7a; 32]);

fn config(channel: bool) -> TransferConfig {
    let mut cfg = TransferConfig {
        attestation_timeout_ms: 60_000,
        poll_interval_ms: 5_000,
        ..Default::default()
    };

    let mut wormchain = ChainConfig {
        bech32_prefix: Some("wormhole".into()),
        ibc_translator: Some(TRANSLATOR),
        ..Default::default()
    };
    if channel {
        wormchain
            .ibc_channels
            .insert(Chain::Osmosis, "channel-3".into());
    }
    cfg.chains.insert(Chain::Wormchain, wormchain);
    cfg.chains.insert(
        Chain::Osmosis,
        ChainConfig {
            bech32_prefix: Some("osmo".into()),
            ..Default::default()
        },
    );

    cfg
}

fn request() -> TransferRequest {
    TransferRequest {
        token: TokenId::native(Chain::Solana),
        amount: "0.01".into(),
        source: Chain::Solana,
        destination: Chain::Osmosis,
        automatic: true,
        recipient: None,
        execute: true,
    }
}

#[tokio::test(start_paused = true)]
async fn osmosis_is_reached_through_the_translator() {
    init();
    let journal = Journal::default();
    let sol = MockSigner::new(Chain::Solana, SOLANA_ACCOUNT, journal.clone());
    let wormchain = MockSigner::new(Chain::Wormchain, WORMCHAIN_ACCOUNT, journal.clone());

    let mut solana = MockAdapter::new(Chain::Solana, journal.clone());
    solana.relayer = Some(Address([0xcc; 32]));
    let orchestrator = build(
        &config(true),
        MockSource::signed_after(1, gateway_vaa(Chain::Solana, 1_000_000, TRANSLATOR)),
        vec![solana, MockAdapter::new(Chain::Wormchain, journal.clone())],
    );

    let outcome = orchestrator
        .execute(&request(), &sol, &wormchain)
        .await
        .unwrap();
    let TransferOutcome::Executed { transfer, .. } = outcome else {
        panic!("expected an executed transfer");
    };

    assert_eq!(TransferState::Completed, transfer.state());
    assert_eq!(10_000_000, transfer.amount);
    assert_eq!(Chain::Wormchain, transfer.to.chain);
    assert_eq!(TRANSLATOR, transfer.to.address);
    // The relayer does not serve IBC destinations.
    assert!(!transfer.automatic);
    assert!(!mentions(&journal, "automatic=true"));

    let payload = entries(&journal)
        .into_iter()
        .find(|e| e.contains("payload="))
        .unwrap();
    assert!(payload.contains(r#""gateway_transfer":{"chain":20,"#));
    // base64 of the osmo1 recipient derived from the Wormchain account
    assert!(payload.contains("b3NtbzFsd2M1OHFmbnd5Y3c5OTBjdnEweWVmbmpxcXZqZ2FkbHlheGRwNg=="));
    assert!(payload.contains(r#""fee":"0""#));

    assert!(mentions(&journal, "Wormchain: wrap check Solana:native"));
    assert!(mentions(&journal, "Wormchain: sent complete"));
}

#[tokio::test(start_paused = true)]
async fn explicit_recipient_is_used() {
    init();
    let journal = Journal::default();
    let sol = MockSigner::new(Chain::Solana, SOLANA_ACCOUNT, journal.clone());
    let wormchain = MockSigner::new(Chain::Wormchain, WORMCHAIN_ACCOUNT, journal.clone());
    let orchestrator = build(
        &config(true),
        MockSource::signed_after(0, gateway_vaa(Chain::Solana, 1_000_000, TRANSLATOR)),
        vec![
            MockAdapter::new(Chain::Solana, journal.clone()),
            MockAdapter::new(Chain::Wormchain, journal.clone()),
        ],
    );

    let req = TransferRequest {
        recipient: Some(OSMOSIS_ACCOUNT.into()),
        ..request()
    };
    orchestrator.execute(&req, &sol, &wormchain).await.unwrap();
    assert!(mentions(
        &journal,
        "b3NtbzFsd2M1OHFmbnd5Y3c5OTBjdnEweWVmbmpxcXZqZ2FkbHlheGRwNg=="
    ));

    let req = TransferRequest {
        recipient: Some("osmo1notanaddress".into()),
        ..request()
    };
    let failure = orchestrator
        .execute(&req, &sol, &wormchain)
        .await
        .unwrap_err();
    assert!(matches!(failure.error, TransferError::Address(_)));
}

#[tokio::test(start_paused = true)]
async fn missing_channel_is_refused() {
    init();
    let journal = Journal::default();
    let sol = MockSigner::new(Chain::Solana, SOLANA_ACCOUNT, journal.clone());
    let wormchain = MockSigner::new(Chain::Wormchain, WORMCHAIN_ACCOUNT, journal.clone());
    let orchestrator = build(
        &config(false),
        MockSource::never(),
        vec![
            MockAdapter::new(Chain::Solana, journal.clone()),
            MockAdapter::new(Chain::Wormchain, journal.clone()),
        ],
    );

    let failure = orchestrator
        .execute(&request(), &sol, &wormchain)
        .await
        .unwrap_err();

    assert_eq!(Phase::Quote, failure.phase);
    assert!(matches!(
        failure.error,
        TransferError::NoIbcChannel(Chain::Osmosis)
    ));
    assert!(entries(&journal).is_empty());
}

#[tokio::test(start_paused = true)]
async fn osmosis_signer_cannot_complete_on_wormchain() {
    init();
    let journal = Journal::default();
    let sol = MockSigner::new(Chain::Solana, SOLANA_ACCOUNT, journal.clone());
    let osmo = MockSigner::new(Chain::Osmosis, OSMOSIS_ACCOUNT, journal.clone());
    let orchestrator = build(
        &config(true),
        MockSource::never(),
        vec![
            MockAdapter::new(Chain::Solana, journal.clone()),
            MockAdapter::new(Chain::Wormchain, journal.clone()),
        ],
    );

    let req = TransferRequest {
        recipient: Some(OSMOSIS_ACCOUNT.into()),
        ..request()
    };
    let failure = orchestrator.execute(&req, &sol, &osmo).await.unwrap_err();
    assert!(matches!(
        failure.error,
        TransferError::WrongSignerChain {
            expected: Chain::Wormchain,
            found: Chain::Osmosis
        }
    ));
}
