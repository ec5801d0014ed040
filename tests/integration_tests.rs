
use crate::test_utils::*;
use lntopo::config::{CertSource, ConnectSettings};
use lntopo::models::{AddressType, ChannelParams, ChannelState, WalletBalance};
use lntopo::retry::{Poll, RetryPolicy};
use lntopo::topology::Topology;
use lntopo::{Error, NodeClient};
use std::str::FromStr;
use std::time::Duration;
use test_log::test;
use tonic::Code;

fn quick_open() -> RetryPolicy {
    RetryPolicy {
        base: Duration::from_millis(5),
        multiplier: 2,
        max_delay: Duration::from_millis(50),
        max_attempts: Some(40),
    }
}

#[test(tokio::test)]
async fn test_connect_reports_identity() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    network.mine_blocks(101);

    let client = network.connect(&alice).await;
    assert_eq!(client.host(), HOST);
    assert_eq!(client.pubkey(), &alice.pubkey);

    let status = client.get_info().await.unwrap();
    assert_eq!(status.pubkey, alice.pubkey);
    assert_eq!(status.alias, "alice");
    assert_eq!(status.block_height, 101);
    assert!(status.synced_to_chain);
}

#[test(tokio::test)]
async fn test_connect_with_shared_cert_file() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;

    let settings = ConnectSettings {
        cert: CertSource::File(network.cert_dir().join(format!("lnd-{HOST}.cert"))),
        ..network.settings(&alice)
    };
    let client = NodeClient::connect(HOST, &settings).await.unwrap();
    assert_eq!(client.pubkey(), &alice.pubkey);
}

#[test(tokio::test)]
async fn test_missing_cert_fails_immediately() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;

    let empty = tempfile::tempdir().unwrap();
    let settings = ConnectSettings {
        cert: CertSource::PerHost(empty.path().to_path_buf()),
        // would never give up on a retryable error
        retry: RetryPolicy::connect(),
        ..network.settings(&alice)
    };

    let err = NodeClient::connect(HOST, &settings).await.unwrap_err();
    match err {
        Error::Certificate { path, .. } => {
            assert_eq!(path, empty.path().join(format!("lnd-{HOST}.cert")))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(network.calls(&alice, "GetInfo"), 0);
}

#[test(tokio::test)]
async fn test_wrong_cert_is_rejected() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;

    // a second network has its own certificate
    let other = FakeNetwork::new();
    let settings = ConnectSettings {
        cert: CertSource::PerHost(other.cert_dir()),
        retry: test_retry().with_max_attempts(2),
        ..network.settings(&alice)
    };

    let err = NodeClient::connect(HOST, &settings).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
    assert_eq!(network.calls(&alice, "GetInfo"), 0);
}

#[test(tokio::test)]
async fn test_macaroon_is_sent() {
    let macaroon = b"fake macaroon bytes";
    let mut network = FakeNetwork::with_macaroon(macaroon);
    let alice = network.spawn_node("alice").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin.macaroon");
    std::fs::write(&path, macaroon).unwrap();

    let settings = ConnectSettings {
        macaroon: Some(path),
        ..network.settings(&alice)
    };
    let client = NodeClient::connect(HOST, &settings).await.unwrap();
    assert_eq!(client.pubkey(), &alice.pubkey);

    let settings = ConnectSettings {
        retry: test_retry().with_max_attempts(2),
        ..network.settings(&alice)
    };
    let err = NodeClient::connect(HOST, &settings).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(ref s) if s.code() == Code::Unauthenticated));
}

#[test(tokio::test)]
async fn test_missing_macaroon_file() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;

    let settings = ConnectSettings {
        macaroon: Some(network.cert_dir().join("admin.macaroon")),
        ..network.settings(&alice)
    };
    let err = NodeClient::connect(HOST, &settings).await.unwrap_err();
    assert!(matches!(err, Error::Macaroon { .. }));
}

#[test(tokio::test)]
async fn test_peer() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.set_peer_lag(Duration::from_millis(100));

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;
    assert!(!a.peered(&b).await.unwrap());
    assert!(!b.peered(&a).await.unwrap());

    a.peer(&b, &test_poll()).await.unwrap();
    assert!(a.peered(&b).await.unwrap());
    assert!(b.peered(&a).await.unwrap());
    assert_eq!(network.calls(&alice, "ConnectPeer"), 1);

    // bob had to be polled until the peering showed up on his side
    assert!(network.calls(&bob, "ListPeers") > 2);
}

#[test(tokio::test)]
async fn test_peer_is_idempotent() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.link(&alice, &bob);

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    a.peer(&b, &test_poll()).await.unwrap();
    assert_eq!(network.calls(&alice, "ListPeers"), 1);
    assert_eq!(network.calls(&alice, "ConnectPeer"), 0);
    assert_eq!(network.calls(&bob, "ListPeers"), 0);
}

#[test(tokio::test)]
async fn test_peer_gives_up_at_deadline() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.set_peer_lag(Duration::from_secs(3600));

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    let poll = Poll::every(Duration::from_millis(10)).with_deadline(Duration::from_millis(100));
    let err = a.peer(&b, &poll).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(..)));
}

#[test(tokio::test)]
async fn test_has_channel() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    let carol = network.spawn_node("carol").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;
    let c = network.connect(&carol).await;

    assert_eq!(a.channel_state(&b).await.unwrap(), ChannelState::Missing);
    assert!(!a.has_channel(&b).await.unwrap());

    // active but nothing on our side
    network.add_channel(&alice, &bob, 0, true);
    assert_eq!(a.channel_state(&b).await.unwrap(), ChannelState::Missing);
    assert!(!a.has_channel(&b).await.unwrap());

    network.add_channel(&alice, &carol, 500_000, false);
    assert_eq!(a.channel_state(&c).await.unwrap(), ChannelState::Inactive);
    assert!(!a.has_channel(&c).await.unwrap());

    network.mine_blocks(1);
    assert_eq!(a.channel_state(&c).await.unwrap(), ChannelState::Active);
    assert!(a.has_channel(&c).await.unwrap());
}

#[test(tokio::test)]
async fn test_create_channel_skips_existing() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.link(&alice, &bob);
    network.add_channel(&alice, &bob, 900_000, true);

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    a.create_channel(&b, &ChannelParams::default(), &quick_open())
        .await
        .unwrap();
    assert_eq!(network.calls(&alice, "OpenChannelSync"), 0);
}

#[test(tokio::test)]
async fn test_create_and_wait_for_channel() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;
    a.peer(&b, &test_poll()).await.unwrap();

    let params = ChannelParams::default();
    a.create_channel(&b, &params, &quick_open()).await.unwrap();
    assert_eq!(network.calls(&alice, "OpenChannelSync"), 1);
    assert_eq!(a.channel_state(&b).await.unwrap(), ChannelState::Inactive);

    let miner = network.spawn_miner(Duration::from_millis(50));
    a.wait_for_channel(&b, &test_poll()).await.unwrap();
    miner.abort();

    assert!(a.has_channel(&b).await.unwrap());
    // the pushed amount gives bob a usable side too
    assert!(b.has_channel(&a).await.unwrap());

    let balance = a.wallet_balance().await.unwrap();
    assert_eq!(balance.confirmed, STARTING_BALANCE - params.funding_sat);
}

#[test(tokio::test)]
async fn test_create_channel_retries_until_peered() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    let linker = {
        let b = b.clone();
        let a = a.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            a.peer(&b, &test_poll()).await
        })
    };

    a.create_channel(&b, &ChannelParams::default(), &quick_open())
        .await
        .unwrap();
    linker.await.unwrap().unwrap();

    // only the attempt after peering went through
    assert_eq!(a.channel_state(&b).await.unwrap(), ChannelState::Inactive);
    assert_eq!(b.get_info().await.unwrap().num_pending_channels, 1);
}

#[test(tokio::test)]
async fn test_create_channel_gives_up() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    let err = a
        .create_channel(&b, &ChannelParams::default(), &quick_open().with_max_attempts(3))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rpc(_)));
    assert_eq!(network.calls(&alice, "ListChannels"), 3);
    assert_eq!(network.calls(&alice, "OpenChannelSync"), 3);
    assert_eq!(a.channel_state(&b).await.unwrap(), ChannelState::Missing);
}

#[test(tokio::test)]
async fn test_nodeinfo() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    assert!(a.nodeinfo(&b).await.unwrap().is_none());

    a.peer(&b, &test_poll()).await.unwrap();
    let info = a.nodeinfo(&b).await.unwrap().unwrap();
    let node = info.node.unwrap();
    assert_eq!(node.pub_key, bob.key());
    assert_eq!(node.alias, "bob");

    network.fail_node_info(Code::Internal, "database is locked");
    let err = a.nodeinfo(&b).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(ref s) if s.message() == "database is locked"));
}

#[test(tokio::test)]
async fn test_send_payment() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.link(&alice, &bob);
    network.add_channel(&alice, &bob, 900_000, true);

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    let receipt = a.send_payment(&b, 1_000, "coffee").await.unwrap();
    assert_eq!(receipt.amount_sat, 1_000);
    assert_eq!(receipt.payment_preimage.len(), 64);
    assert!(receipt.payment_request.starts_with("lnbcrt1000"));
    assert_eq!(network.calls(&bob, "AddInvoice"), 1);
    assert_eq!(network.calls(&alice, "SendPaymentSync"), 1);
    assert_eq!(network.calls(&bob, "SendPaymentSync"), 0);
}

#[test(tokio::test)]
async fn test_send_payment_without_route() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;

    let a = network.connect(&alice).await;
    let b = network.connect(&bob).await;

    let err = a.send_payment(&b, 1_000, "coffee").await.unwrap_err();
    match err {
        Error::Payment(msg) => assert_eq!(msg, "unable to find a path to destination"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test(tokio::test)]
async fn test_new_address() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let a = network.connect(&alice).await;

    let nested = a.new_address(AddressType::default()).await.unwrap();
    assert!(nested.starts_with("2N"));
    let witness = a
        .new_address(AddressType::from_str("p2wkh").unwrap())
        .await
        .unwrap();
    assert!(witness.starts_with("bcrt1q"));
    let legacy = a
        .new_address(AddressType::from_str("p2pkh").unwrap())
        .await
        .unwrap();
    assert!(legacy.starts_with('m'));
    assert_eq!(network.calls(&alice, "NewAddress"), 3);

    let err = AddressType::from_str("bogus").unwrap_err();
    assert!(matches!(err, Error::UnknownAddressType(ref t) if t == "bogus"));
    assert_eq!(network.calls(&alice, "NewAddress"), 3);
}

#[test(tokio::test)]
async fn test_wallet_balance() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    network.set_balance(&alice, 100_000, 80_000, 20_000);

    let a = network.connect(&alice).await;
    let balance = a.wallet_balance().await.unwrap();
    assert_eq!(
        balance,
        WalletBalance {
            total: 100_000,
            confirmed: 80_000,
            unconfirmed: 20_000,
        }
    );
}

#[test(tokio::test)]
async fn test_wait_for_block_height() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let a = network.connect(&alice).await;

    // already there
    a.wait_for_block_height(0, &test_poll()).await.unwrap();
    assert_eq!(network.calls(&alice, "GetInfo"), 2);

    let miner = network.spawn_miner(Duration::from_millis(10));
    a.wait_for_block_height(5, &test_poll()).await.unwrap();
    miner.abort();
    assert!(network.block_height() >= 5);

    let poll = Poll::every(Duration::from_millis(10)).with_deadline(Duration::from_millis(100));
    let err = a.wait_for_block_height(1_000, &poll).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(..)));
}

#[test(tokio::test)]
async fn test_describe_graph() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    network.add_channel(&alice, &bob, 900_000, true);

    let a = network.connect(&alice).await;
    let graph = a.describe_graph(false).await.unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].node1_pub, alice.key());
    assert_eq!(graph.edges[0].node2_pub, bob.key());

    // the graph is what the binary prints
    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["edges"][0]["capacity"], 1_000_000);
}

#[test(tokio::test)]
async fn test_topology() {
    let mut network = FakeNetwork::new();
    let alice = network.spawn_node("alice").await;
    let bob = network.spawn_node("bob").await;
    let carol = network.spawn_node("carol").await;

    let nodes = vec![
        network.connect(&alice).await,
        network.connect(&bob).await,
        network.connect(&carol).await,
    ];
    let topology = Topology::from_nodes(nodes);

    let miner = network.spawn_miner(Duration::from_millis(50));
    topology
        .build(&ChannelParams::default(), &quick_open(), &test_poll())
        .await
        .unwrap();
    miner.abort();

    assert_eq!(network.calls(&alice, "OpenChannelSync"), 1);
    assert_eq!(network.calls(&bob, "OpenChannelSync"), 1);
    assert_eq!(network.calls(&carol, "OpenChannelSync"), 0);

    let receipts = topology.pay_chain(2_000, "chain").await.unwrap();
    assert_eq!(receipts.len(), 2);

    let reports = topology.report().await.unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[1].status.alias, "bob");
    assert_eq!(reports[1].status.num_active_channels, 2);

    // a second build finds everything in place
    topology
        .build(&ChannelParams::default(), &quick_open(), &test_poll())
        .await
        .unwrap();
    assert_eq!(network.calls(&alice, "ConnectPeer"), 1);
    assert_eq!(network.calls(&alice, "OpenChannelSync"), 1);
}
