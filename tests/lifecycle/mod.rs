use dregistry::Error;
use dregistry::MemoryTree;

use crate::common::consumer;
use crate::common::eventually;
use crate::common::provider;
use crate::common::start_node;
use crate::common::Recorder;

#[tokio::test]
async fn consumer_should_follow_providers_across_sessions() {
    let tree = MemoryTree::new();
    let provider_a = start_node(&tree).await;
    let provider_b = start_node(&tree).await;
    let consumer_node = start_node(&tree).await;

    provider_a
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.1"))
        .await
        .unwrap();

    let recorder = Recorder::new();
    consumer_node
        .registry
        .subscribe(&consumer("com.demo.Greeter"), &recorder.handle())
        .await
        .unwrap();
    assert_eq!(recorder.count(), 1);
    assert_eq!(recorder.last_hosts(), vec!["10.0.0.1"]);

    provider_b
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.2"))
        .await
        .unwrap();
    assert!(eventually(|| recorder.last_hosts() == vec!["10.0.0.1", "10.0.0.2"]).await);

    provider_a.registry.destroy().await;
    assert!(eventually(|| recorder.last_hosts() == vec!["10.0.0.2"]).await);

    // crash without a clean shutdown: the session expires with its nodes
    provider_b.client.expire_session();
    assert!(eventually(|| {
        let last = recorder.last();
        last.len() == 1 && last[0].protocol() == "empty" && last[0].category() == "providers"
    })
    .await);
}

#[tokio::test]
async fn persistent_registration_should_outlive_its_session() {
    let tree = MemoryTree::new();
    let owner = start_node(&tree).await;
    let reader = start_node(&tree).await;

    let fixed = provider("com.demo.Static", "10.0.0.5").with_dynamic(false);
    owner.registry.register(&fixed).await.unwrap();
    owner.client.expire_session();

    let found = reader
        .registry
        .lookup(Some(&consumer("com.demo.Static")))
        .await
        .unwrap();
    assert_eq!(found, vec![fixed.clone()]);

    reader.registry.unregister(&fixed).await.unwrap();
    assert!(reader
        .registry
        .lookup(Some(&consumer("com.demo.Static")))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn categories_should_be_delivered_together_on_subscribe() {
    let tree = MemoryTree::new();
    let node = start_node(&tree).await;
    node.registry
        .register(&provider("com.demo.Greeter", "10.0.0.1"))
        .await
        .unwrap();
    node.registry
        .register(&crate::common::url(
            "route://0.0.0.0/com.demo.Greeter?category=routers&rule=host%3D10.0.0.1",
        ))
        .await
        .unwrap();

    let recorder = Recorder::new();
    node.registry
        .subscribe(
            &consumer("com.demo.Greeter").with_category("providers,configurators,routers"),
            &recorder.handle(),
        )
        .await
        .unwrap();

    let urls = recorder.last();
    let protocols: Vec<&str> = urls.iter().map(|u| u.protocol()).collect();
    assert_eq!(protocols, vec!["dubbo", "empty", "route"]);
    assert_eq!(urls[1].category(), "configurators");
}

#[tokio::test]
async fn unsubscribe_should_silence_only_that_listener() {
    let tree = MemoryTree::new();
    let node = start_node(&tree).await;
    let subscription = consumer("com.demo.Greeter");
    let leaving = Recorder::new();
    let staying = Recorder::new();
    node.registry.subscribe(&subscription, &leaving.handle()).await.unwrap();
    node.registry.subscribe(&subscription, &staying.handle()).await.unwrap();

    node.registry.unsubscribe(&subscription, &leaving.handle()).await.unwrap();
    node.registry
        .register(&provider("com.demo.Greeter", "10.0.0.3"))
        .await
        .unwrap();

    assert!(eventually(|| staying.last_hosts() == vec!["10.0.0.3"]).await);
    assert_eq!(leaving.count(), 1);
}

#[tokio::test]
async fn destroyed_registry_should_refuse_new_work() {
    let tree = MemoryTree::new();
    let node = start_node(&tree).await;
    node.registry.destroy().await;

    assert!(!node.registry.is_available());
    let recorder = Recorder::new();
    assert!(matches!(
        node.registry
            .subscribe(&consumer("com.demo.Greeter"), &recorder.handle())
            .await,
        Err(Error::Destroyed(_))
    ));
    assert!(matches!(node.registry.lookup(None).await, Err(Error::IllegalArgument(_))));
}
