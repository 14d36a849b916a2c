use dregistry::MemoryTree;

use crate::common::consumer;
use crate::common::eventually;
use crate::common::provider;
use crate::common::start_node;
use crate::common::Recorder;

#[tokio::test]
async fn expired_session_should_be_restored_after_reconnect() {
    let tree = MemoryTree::new();
    let flaky = start_node(&tree).await;
    let observer = start_node(&tree).await;

    flaky
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.1"))
        .await
        .unwrap();
    let flaky_view = Recorder::new();
    flaky
        .registry
        .subscribe(&consumer("com.demo.Greeter"), &flaky_view.handle())
        .await
        .unwrap();
    let observer_view = Recorder::new();
    observer
        .registry
        .subscribe(&consumer("com.demo.Greeter"), &observer_view.handle())
        .await
        .unwrap();
    assert_eq!(observer_view.last_hosts(), vec!["10.0.0.1"]);

    flaky.client.expire_session();
    assert!(!flaky.registry.is_available());
    assert!(eventually(|| observer_view.last_hosts().is_empty()).await);

    let before = flaky_view.count();
    flaky.client.reconnect();

    assert!(eventually(|| observer_view.last_hosts() == vec!["10.0.0.1"]).await);
    assert!(eventually(|| flaky_view.count() > before && flaky_view.last_hosts() == vec!["10.0.0.1"]).await);
    assert!(flaky.registry.is_available());
}

#[tokio::test]
async fn changes_during_disconnect_should_be_seen_after_reconnect() {
    let tree = MemoryTree::new();
    let consumer_node = start_node(&tree).await;
    let provider_node = start_node(&tree).await;

    let recorder = Recorder::new();
    consumer_node
        .registry
        .subscribe(&consumer("com.demo.Greeter"), &recorder.handle())
        .await
        .unwrap();

    consumer_node.client.disconnect();
    provider_node
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.9"))
        .await
        .unwrap();
    // watch events are lost while disconnected
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(recorder.last_hosts().is_empty());

    consumer_node.client.reconnect();
    assert!(eventually(|| recorder.last_hosts() == vec!["10.0.0.9"]).await);
}
