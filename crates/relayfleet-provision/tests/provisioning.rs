//! End-to-end tests for the provisioning coordinator
//!
//! Each test drives the real transaction path against an in-memory SQLite
//! store and asserts on rows, cache projections and distribution pushes.

use async_trait::async_trait;
use chrono::Utc;
use relayfleet_alloc::arrange_node_ports;
use relayfleet_cache::{Cache, FeatureGates};
use relayfleet_db::entities::{
    allocation::{self, Matcher, TunnelKind},
    client, credential, node, node_domain, node_port,
    plan::{self, ChargingType},
    tenant_account,
};
use relayfleet_db::{connect, migrate};
use relayfleet_provision::{
    AdmissionPolicyRequest, ConfigDistributor, Coordinator, DistributeError, ForwardRequest,
    HostRequest, NodeRequest, P2pRequest, ProvisionError, ProvisionSettings,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Distributor that records every push for assertions
#[derive(Debug, Default)]
struct RecordingDistributor {
    pushed: Mutex<Vec<String>>,
}

impl RecordingDistributor {
    fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigDistributor for RecordingDistributor {
    async fn distribute(&self, tunnel_code: &str) -> Result<(), DistributeError> {
        self.pushed.lock().unwrap().push(tunnel_code.to_string());
        Ok(())
    }
}

struct TestPlane {
    coordinator: Coordinator,
    db: DatabaseConnection,
    cache: Cache,
    distributor: Arc<RecordingDistributor>,
}

async fn setup_plane() -> TestPlane {
    let db = connect("sqlite::memory:").await.expect("connect");
    migrate(&db).await.expect("migrate");

    let cache = Cache::new();
    let distributor = Arc::new(RecordingDistributor::default());
    let coordinator = Coordinator::new(
        db.clone(),
        cache.clone(),
        distributor.clone(),
        ProvisionSettings::default(),
    );
    coordinator.set_feature_gates(FeatureGates {
        web: true,
        tunnel: true,
        forward: true,
        proxy: false,
        p2p: true,
    });

    TestPlane {
        coordinator,
        db,
        cache,
        distributor,
    }
}

/// Seed a tenant, a fully featured node with arranged ports, a client and
/// two plans ("monthly" cyclic, "lifetime" one-time)
async fn seed(plane: &TestPlane, balance: Decimal) {
    let now = Utc::now();
    tenant_account::ActiveModel {
        code: Set("acme".to_string()),
        name: Set("Acme Corp".to_string()),
        balance: Set(balance),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&plane.db)
    .await
    .expect("tenant insert");

    let node = node::ActiveModel {
        code: Set("n1".to_string()),
        key: Set(Uuid::new_v4()),
        name: Set("edge-1".to_string()),
        remark: Set(None),
        web: Set(true),
        tunnel: Set(true),
        forward: Set(true),
        proxy: Set(false),
        p2p: Set(true),
        address: Set("relay.example.com:8443".to_string()),
        protocol: Set("tls".to_string()),
        domain: Set(Some("edge.example.com".to_string())),
        deny_domain_prefix: Set(None),
        rules: Set(None),
        forward_port_range: Set(Some("20000-20002".to_string())),
        limit_reset_index: Set(1),
        limit_total: Set(0),
        limit_kind: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&plane.db)
    .await
    .expect("node insert");
    arrange_node_ports(&plane.db, &node).await.expect("arrange ports");

    client::ActiveModel {
        code: Set("c1".to_string()),
        tenant_code: Set("acme".to_string()),
        name: Set("laptop".to_string()),
        created_at: Set(now),
    }
    .insert(&plane.db)
    .await
    .expect("client insert");

    plan::ActiveModel {
        code: Set("monthly".to_string()),
        node_code: Set("n1".to_string()),
        name: Set("Monthly".to_string()),
        charging_type: Set(ChargingType::Cyclic),
        cycle_days: Set(30),
        price: Set(Decimal::new(5_00, 2)),
        limiter: Set(10),
        created_at: Set(now),
    }
    .insert(&plane.db)
    .await
    .expect("plan insert");

    plan::ActiveModel {
        code: Set("lifetime".to_string()),
        node_code: Set("n1".to_string()),
        name: Set("Lifetime".to_string()),
        charging_type: Set(ChargingType::Once),
        cycle_days: Set(0),
        price: Set(Decimal::new(2_00, 2)),
        limiter: Set(0),
        created_at: Set(now),
    }
    .insert(&plane.db)
    .await
    .expect("plan insert");
}

fn host_request(plan_code: &str) -> HostRequest {
    HostRequest {
        name: "dev preview".to_string(),
        target_ip: "192.168.1.10".to_string(),
        target_port: "3000".to_string(),
        target_https: false,
        node_code: "n1".to_string(),
        client_code: "c1".to_string(),
        plan_code: plan_code.to_string(),
    }
}

async fn tenant(db: &DatabaseConnection) -> tenant_account::Model {
    tenant_account::Entity::find_by_id("acme")
        .one(db)
        .await
        .expect("query")
        .expect("tenant exists")
}

#[tokio::test]
async fn host_provisioning_end_to_end() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let before = Utc::now();
    let provisioned = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect("provision");

    let allocation = &provisioned.allocation;
    assert_eq!(allocation.kind, TunnelKind::Host);
    assert_eq!(allocation.node_code, "n1");
    assert_eq!(allocation.client_code, "c1");
    assert_eq!(allocation.tenant_code, "acme");
    assert_eq!(allocation.price, Decimal::new(5_00, 2));
    assert_eq!(allocation.limiter, 10);

    let prefix = allocation.domain_prefix.as_deref().expect("prefix assigned");
    assert_eq!(prefix.len(), 8);
    let expiry = allocation.expires_at.expect("cyclic plans expire");
    assert!(expiry > before);

    // The prefix is held by a live node_domains row
    let held = node_domain::Entity::find()
        .filter(node_domain::Column::Prefix.eq(prefix))
        .count(&plane.db)
        .await
        .expect("count");
    assert_eq!(held, 1);

    // The debit was exact and bumped the version once
    let account = tenant(&plane.db).await;
    assert_eq!(account.balance, Decimal::new(95_00, 2));
    assert_eq!(account.version, 1);

    // Credential pair persisted and projected into the cache
    let cred = &provisioned.credential;
    assert_eq!(cred.username.len(), 10);
    assert_eq!(
        plane.cache.auth_tunnel(&cred.username, &cred.password).as_deref(),
        Some(allocation.code.as_str())
    );

    let snapshot = plane
        .cache
        .tunnel_snapshot(&allocation.code)
        .expect("tunnel snapshot published");
    assert_eq!(snapshot.kind, relayfleet_cache::TunnelKind::Host);
    assert_eq!(snapshot.expires_at, allocation.expires_at);
    assert_eq!(snapshot.limiter, 10);

    // The serving agent was told exactly once
    assert_eq!(plane.distributor.pushed(), vec![allocation.code.clone()]);
}

#[tokio::test]
async fn insufficient_balance_leaves_no_trace() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(1_00, 2)).await;
    let cache_entries_before = plane.cache.len();

    let err = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));
    assert!(!err.is_retryable());

    // Full atomicity across the failure boundary: no allocation, no
    // credential, no held prefix, no cache entry, no distribution push
    assert_eq!(allocation::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(credential::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(node_domain::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(plane.cache.len(), cache_entries_before);
    assert!(plane.distributor.pushed().is_empty());

    let account = tenant(&plane.db).await;
    assert_eq!(account.balance, Decimal::new(1_00, 2));
    assert_eq!(account.version, 0);
}

#[tokio::test]
async fn structural_validation_rejects_before_the_store() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let mut bad_ip = host_request("monthly");
    bad_ip.target_ip = "8.8.8.8".to_string();
    let err = plane
        .coordinator
        .provision_host("acme", bad_ip)
        .await
        .expect_err("public target must be rejected");
    assert!(matches!(err, ProvisionError::Validation(_)));

    let mut bad_port = host_request("monthly");
    bad_port.target_port = "0".to_string();
    let err = plane
        .coordinator
        .provision_host("acme", bad_port)
        .await
        .expect_err("zero port must be rejected");
    assert!(matches!(err, ProvisionError::Validation(_)));

    assert_eq!(allocation::Entity::find().count(&plane.db).await.unwrap(), 0);
}

#[tokio::test]
async fn disabled_feature_gate_blocks_provisioning() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;
    plane.coordinator.set_feature_gates(FeatureGates::default());

    let err = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect_err("gate is closed");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));
    assert_eq!(allocation::Entity::find().count(&plane.db).await.unwrap(), 0);
}

#[tokio::test]
async fn one_time_plan_charges_once_and_never_expires() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(10_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_host("acme", host_request("lifetime"))
        .await
        .expect("provision");

    assert_eq!(provisioned.allocation.expires_at, None);
    assert_eq!(tenant(&plane.db).await.balance, Decimal::new(8_00, 2));
}

#[tokio::test]
async fn forward_provisioning_claims_an_arranged_port() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_forward(
            "acme",
            ForwardRequest {
                name: "ssh".to_string(),
                target_ip: "192.168.1.10".to_string(),
                target_port: "22".to_string(),
                node_code: "n1".to_string(),
                client_code: "c1".to_string(),
                plan_code: "monthly".to_string(),
            },
        )
        .await
        .expect("provision");

    assert_eq!(provisioned.allocation.kind, TunnelKind::Forward);
    assert_eq!(provisioned.allocation.port, Some(20000));
    assert_eq!(provisioned.allocation.domain_prefix, None);

    let holder = node_port::Entity::find()
        .filter(node_port::Column::Port.eq(20000))
        .one(&plane.db)
        .await
        .expect("query")
        .expect("port row");
    assert_eq!(holder.allocation_code.as_deref(), Some(provisioned.allocation.code.as_str()));

    let snapshot = plane
        .cache
        .tunnel_snapshot(&provisioned.allocation.code)
        .expect("snapshot");
    assert_eq!(snapshot.kind, relayfleet_cache::TunnelKind::Forward);
}

#[tokio::test]
async fn p2p_provisioning_needs_no_node_resource() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_p2p(
            "acme",
            P2pRequest {
                name: "nas link".to_string(),
                target_ip: "10.0.0.9".to_string(),
                target_port: "445".to_string(),
                node_code: "n1".to_string(),
                client_code: "c1".to_string(),
                plan_code: "lifetime".to_string(),
            },
        )
        .await
        .expect("provision");

    assert_eq!(provisioned.allocation.kind, TunnelKind::P2p);
    assert_eq!(provisioned.allocation.domain_prefix, None);
    assert_eq!(provisioned.allocation.port, None);
    assert_eq!(node_domain::Entity::find().count(&plane.db).await.unwrap(), 0);

    let cred = credential::Entity::find()
        .filter(credential::Column::TunnelCode.eq(&provisioned.allocation.code))
        .one(&plane.db)
        .await
        .expect("query");
    assert!(cred.is_some());
}

#[tokio::test]
async fn unknown_references_are_business_errors() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let mut wrong_plan = host_request("missing-plan");
    let err = plane
        .coordinator
        .provision_host("acme", wrong_plan.clone())
        .await
        .expect_err("unknown plan");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));

    wrong_plan.plan_code = "monthly".to_string();
    wrong_plan.client_code = "not-mine".to_string();
    let err = plane
        .coordinator
        .provision_host("acme", wrong_plan)
        .await
        .expect_err("unknown client");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));

    let err = plane
        .coordinator
        .provision_host("ghost", host_request("monthly"))
        .await
        .expect_err("unknown tenant");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));
}

#[tokio::test]
async fn deprovision_removes_rows_and_projections() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect("provision");
    let code = provisioned.allocation.code.clone();
    let cred = provisioned.credential.clone();

    plane
        .coordinator
        .deprovision("acme", &code)
        .await
        .expect("deprovision");

    assert_eq!(allocation::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(credential::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(node_domain::Entity::find().count(&plane.db).await.unwrap(), 0);
    assert_eq!(plane.cache.tunnel_snapshot(&code), None);
    assert_eq!(plane.cache.auth_tunnel(&cred.username, &cred.password), None);
    assert_eq!(plane.distributor.pushed(), vec![code.clone(), code]);
}

#[tokio::test]
async fn deprovision_is_tenant_scoped() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect("provision");

    let err = plane
        .coordinator
        .deprovision("rival", &provisioned.allocation.code)
        .await
        .expect_err("other tenants cannot remove it");
    assert!(matches!(err, ProvisionError::BusinessRule(_)));
    assert_eq!(allocation::Entity::find().count(&plane.db).await.unwrap(), 1);
}

#[tokio::test]
async fn forward_matchers_update_persists_and_redistributes() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_forward(
            "acme",
            ForwardRequest {
                name: "web".to_string(),
                target_ip: "192.168.1.10".to_string(),
                target_port: "80".to_string(),
                node_code: "n1".to_string(),
                client_code: "c1".to_string(),
                plan_code: "monthly".to_string(),
            },
        )
        .await
        .expect("provision");
    let code = provisioned.allocation.code.clone();

    let matchers = vec![
        Matcher {
            host: "api.internal".to_string(),
            target_ip: "192.168.1.20".to_string(),
            target_port: "8080".to_string(),
        },
        Matcher {
            host: "app.internal".to_string(),
            target_ip: "192.168.1.21".to_string(),
            target_port: "8081".to_string(),
        },
    ];
    let updated = plane
        .coordinator
        .update_forward_matchers("acme", &code, matchers.clone())
        .await
        .expect("update");

    assert_eq!(updated.matcher_list(), matchers);
    let reread = allocation::Entity::find_by_id(&code)
        .one(&plane.db)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(reread.matcher_list(), matchers);
    assert_eq!(plane.distributor.pushed(), vec![code.clone(), code]);
}

#[tokio::test]
async fn republish_restores_a_lost_projection_idempotently() {
    let plane = setup_plane().await;
    seed(&plane, Decimal::new(100_00, 2)).await;

    let provisioned = plane
        .coordinator
        .provision_host("acme", host_request("monthly"))
        .await
        .expect("provision");
    let code = provisioned.allocation.code.clone();
    let original = plane.cache.tunnel_snapshot(&code).expect("published");

    plane.cache.remove_tunnel_snapshot(&code);
    plane.coordinator.republish(&code).await.expect("republish");
    assert_eq!(plane.cache.tunnel_snapshot(&code), Some(original.clone()));

    // Republishing identical committed state twice yields the same value
    let entries = plane.cache.len();
    plane.coordinator.republish(&code).await.expect("republish again");
    assert_eq!(plane.cache.tunnel_snapshot(&code), Some(original));
    assert_eq!(plane.cache.len(), entries);
}

#[tokio::test]
async fn register_node_publishes_snapshot_and_arranges_ports() {
    let plane = setup_plane().await;

    let registered = plane
        .coordinator
        .register_node(NodeRequest {
            name: "edge-2".to_string(),
            remark: None,
            rules: vec!["tunnel-limit".to_string()],
            web: true,
            tunnel: true,
            forward: true,
            proxy: false,
            p2p: false,
            address: "relay2.example.com:8443".to_string(),
            protocol: "tls".to_string(),
            domain: Some("edge2.example.com".to_string()),
            deny_domain_prefix: Some("www".to_string()),
            forward_port_range: Some("30000-30004".to_string()),
            limit_reset_index: 1,
            limit_total: 5,
            limit_kind: 0,
        })
        .await
        .expect("register");

    let snapshot = plane
        .cache
        .node_snapshot(&registered.code)
        .expect("node snapshot published");
    assert_eq!(snapshot.limit_total, 5);

    let arranged = node_port::Entity::find()
        .filter(node_port::Column::NodeCode.eq(&registered.code))
        .count(&plane.db)
        .await
        .expect("count");
    assert_eq!(arranged, 5);
}

#[tokio::test]
async fn admission_policy_upsert_replaces_wholesale() {
    let plane = setup_plane().await;

    plane
        .coordinator
        .put_admission_policy(AdmissionPolicyRequest {
            code: "r1".to_string(),
            enabled: true,
            allow_list: vec!["1.2.3.4".to_string(), "4.3.2.1".to_string()],
        })
        .await
        .expect("create");

    let snapshot = plane.cache.admission("r1");
    assert!(snapshot.allows_source_ip("1.2.3.4"));
    assert!(!snapshot.allows_source_ip("5.6.7.8"));

    // Replacing the policy recomputes the allow set from scratch
    plane
        .coordinator
        .put_admission_policy(AdmissionPolicyRequest {
            code: "r1".to_string(),
            enabled: true,
            allow_list: vec!["9.9.9.9".to_string()],
        })
        .await
        .expect("replace");

    let snapshot = plane.cache.admission("r1");
    assert!(snapshot.allows_source_ip("9.9.9.9"));
    assert!(!snapshot.allows_source_ip("1.2.3.4"));

    // Disabling admits everyone again
    plane
        .coordinator
        .put_admission_policy(AdmissionPolicyRequest {
            code: "r1".to_string(),
            enabled: false,
            allow_list: vec![],
        })
        .await
        .expect("disable");
    assert!(plane.cache.admission("r1").allows_source_ip("5.6.7.8"));

    plane
        .coordinator
        .remove_admission_policy("r1")
        .await
        .expect("remove");
    assert!(!plane.cache.admission("r1").enabled);
}
