use std::sync::Arc;

use dregistry::MemoryTransporter;
use dregistry::MemoryTree;
use dregistry::RegistryBuilder;

use crate::common::config;
use crate::common::consumer;
use crate::common::eventually;
use crate::common::provider;
use crate::common::start_node;
use crate::common::Recorder;

fn hosts_seen(recorder: &Recorder) -> Vec<String> {
    let mut hosts: Vec<String> = recorder
        .all()
        .iter()
        .filter(|u| u.protocol() == "dubbo")
        .map(|u| u.host().to_string())
        .collect();
    hosts.sort();
    hosts.dedup();
    hosts
}

#[tokio::test]
async fn wildcard_subscriber_should_see_every_service() {
    let tree = MemoryTree::new();
    let providers = start_node(&tree).await;
    let monitor = start_node(&tree).await;

    providers
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.1"))
        .await
        .unwrap();
    providers
        .registry
        .register(&provider("com.demo.Billing", "10.0.0.2"))
        .await
        .unwrap();

    let recorder = Recorder::new();
    monitor
        .registry
        .subscribe(&consumer("*"), &recorder.handle())
        .await
        .unwrap();
    assert_eq!(hosts_seen(&recorder), vec!["10.0.0.1", "10.0.0.2"]);

    providers
        .registry
        .register(&provider("com.demo.Audit", "10.0.0.3"))
        .await
        .unwrap();
    assert!(eventually(|| hosts_seen(&recorder).len() == 3).await);
    assert_eq!(
        monitor.registry.discovered_services(),
        vec!["com.demo.Audit", "com.demo.Billing", "com.demo.Greeter"]
    );

    // later providers of an already known service arrive through the derived subscription
    providers
        .registry
        .register(&provider("com.demo.Greeter", "10.0.0.4"))
        .await
        .unwrap();
    assert!(eventually(|| hosts_seen(&recorder).contains(&"10.0.0.4".to_string())).await);
}

#[tokio::test]
async fn configured_filter_should_narrow_startup_expansion() {
    let tree = MemoryTree::new();
    let providers = start_node(&tree).await;
    providers
        .registry
        .register(&provider("com.acme.Orders", "10.0.0.1"))
        .await
        .unwrap();
    providers
        .registry
        .register(&provider("org.partner.Quotes", "10.0.0.2"))
        .await
        .unwrap();

    let mut settings = config();
    settings.wildcard.service_filter = Some("acme".to_string());
    let monitor = RegistryBuilder::new(settings)
        .transporter(Arc::new(MemoryTransporter::new(tree.clone())))
        .build()
        .await
        .unwrap();

    let recorder = Recorder::new();
    monitor.subscribe(&consumer("*"), &recorder.handle()).await.unwrap();

    assert_eq!(hosts_seen(&recorder), vec!["10.0.0.1"]);
    assert_eq!(monitor.discovered_services(), vec!["com.acme.Orders"]);
}
