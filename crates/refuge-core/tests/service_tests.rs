//! Integration tests for the survivor service and trade executor.
//!
//! Tests drive [`SurvivorService`] over the in-memory registry, plus
//! wrapping registries that inject save failures, late replies and slow
//! responses to exercise the storage paths.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::too_many_lines
)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use refuge_core::{
    ErrorKind, InMemoryRegistry, RefugeConfig, RegistryError, ServiceError, SurvivorRegistry,
    SurvivorService, TRADE_SUCCESS_MESSAGE,
};
use refuge_survivors::ledger;
use refuge_types::{
    Gender, HealthStatus, NewSurvivor, OfferEntry, ResourceEntry, Survivor, SurvivorId,
    TradeRequest,
};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn service() -> SurvivorService<InMemoryRegistry> {
    SurvivorService::new(InMemoryRegistry::new(), &RefugeConfig::default())
}

fn new_survivor(name: &str, resources: &[(&str, u32, u32)]) -> NewSurvivor {
    NewSurvivor {
        name: name.to_owned(),
        age: 30,
        gender: Gender::Other,
        location: String::from("safe zone"),
        resources: resources
            .iter()
            .map(|&(item, points, qty)| ResourceEntry::new(item, points, qty))
            .collect(),
    }
}

fn trade(
    a: SurvivorId,
    b: SurvivorId,
    offer_a: &[(&str, u32, u32)],
    offer_b: &[(&str, u32, u32)],
) -> TradeRequest {
    let to_offer = |entries: &[(&str, u32, u32)]| {
        entries
            .iter()
            .map(|&(item, points, qty)| OfferEntry::new(item, points, qty))
            .collect()
    };
    TradeRequest {
        survivor_a: a,
        survivor_b: b,
        offer_a: to_offer(offer_a),
        offer_b: to_offer(offer_b),
    }
}

async fn register<R: SurvivorRegistry>(
    service: &SurvivorService<R>,
    name: &str,
    resources: &[(&str, u32, u32)],
) -> Survivor {
    service
        .create_survivor(new_survivor(name, resources))
        .await
        .unwrap()
}

async fn flag_times<R: SurvivorRegistry>(service: &SurvivorService<R>, id: SurvivorId, times: u32) {
    for _ in 0..times {
        service.flag_infected(id).await.unwrap();
    }
}

fn unit_totals(survivors: &[Survivor]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for entry in survivors.iter().flat_map(|s| &s.resources) {
        *totals.entry(entry.item.clone()).or_insert(0) += u64::from(entry.quantity);
    }
    totals
}

// ---------------------------------------------------------------------------
// Records and flags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_and_get_round_trip() {
    let service = service();
    let created = register(&service, "Michonne", &[("water", 4, 2), ("water", 4, 1)]).await;

    let fetched = service.get_survivor(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.resources, vec![ResourceEntry::new("water", 4, 3)]);
}

#[tokio::test]
async fn create_rejects_blank_name() {
    let service = service();
    let err = service
        .create_survivor(new_survivor("", &[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(service.registry().is_empty().await);
}

#[tokio::test]
async fn get_unknown_survivor_is_not_found() {
    let err = service().get_survivor(SurvivorId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_location_returns_new_location() {
    let service = service();
    let survivor = register(&service, "Abraham", &[]).await;

    let location = service
        .update_location(survivor.id, String::from("washington road"))
        .await
        .unwrap();

    assert_eq!(location, "washington road");
    assert_eq!(
        service.get_survivor(survivor.id).await.unwrap().location,
        "washington road"
    );
}

#[tokio::test]
async fn flag_labels_follow_the_counter() {
    let service = service();
    let survivor = register(&service, "Sasha", &[]).await;

    let first = service.flag_infected(survivor.id).await.unwrap();
    assert_eq!(first.survivor.infection_count, 1);
    assert_eq!(first.label(), "Not Infected");

    service.flag_infected(survivor.id).await.unwrap();
    let third = service.flag_infected(survivor.id).await.unwrap();
    assert_eq!(third.survivor.infection_count, 3);
    assert_eq!(third.status, HealthStatus::Infected);
    assert_eq!(third.label(), "Infected");
}

#[tokio::test]
async fn flagging_an_infected_survivor_is_rejected() {
    let service = service();
    let survivor = register(&service, "Tyreese", &[]).await;
    flag_times(&service, survivor.id, 3).await;

    let err = service.flag_infected(survivor.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IneligibleParticipant);
    assert_eq!(
        service.get_survivor(survivor.id).await.unwrap().infection_count,
        3
    );
}

#[tokio::test]
async fn infected_survivor_can_still_move() {
    let service = service();
    let survivor = register(&service, "Merle", &[]).await;
    flag_times(&service, survivor.id, 3).await;

    assert!(
        service
            .update_location(survivor.id, String::from("rooftop"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn concurrent_flags_are_not_lost() {
    let service = Arc::new(service());
    let survivor = register(&service, "Beth", &[]).await;

    let flags = (0..2).map(|_| {
        let service = Arc::clone(&service);
        async move { service.flag_infected(survivor.id).await }
    });
    let results = futures::future::join_all(flags).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(
        service.get_survivor(survivor.id).await.unwrap().infection_count,
        2
    );
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

#[tokio::test]
async fn equal_value_trade_commits() {
    let service = service();
    let a = register(&service, "Rick", &[("wood", 2, 3)]).await;
    let b = register(&service, "Negan", &[("food", 6, 1)]).await;

    let receipt = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap();

    assert_eq!(receipt.message, TRADE_SUCCESS_MESSAGE);
    assert_eq!(receipt.value, 6);

    let a_after = service.get_survivor(a.id).await.unwrap();
    let b_after = service.get_survivor(b.id).await.unwrap();
    assert_eq!(a_after, receipt.survivor_a);
    assert_eq!(b_after, receipt.survivor_b);
    assert_eq!(a_after.resources, vec![ResourceEntry::new("food", 6, 1)]);
    assert_eq!(b_after.resources, vec![ResourceEntry::new("wood", 2, 3)]);
}

#[tokio::test]
async fn rejected_trades_leave_records_unchanged() {
    let service = service();
    let a = register(&service, "Rosita", &[("wood", 2, 3)]).await;
    let b = register(&service, "Eugene", &[("food", 5, 1)]).await;
    let poor = register(&service, "Gabriel", &[("wood", 2, 1)]).await;

    let mismatch = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 5, 1)]))
        .await
        .unwrap_err();
    assert_eq!(mismatch.kind(), ErrorKind::ValueMismatch);

    let insufficient = service
        .trade_items(&trade(poor.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();
    assert_eq!(insufficient.kind(), ErrorKind::InsufficientResource);
    assert!(insufficient.public_message().contains("wood"));

    assert_eq!(service.get_survivor(a.id).await.unwrap(), a);
    assert_eq!(service.get_survivor(b.id).await.unwrap(), b);
    assert_eq!(service.get_survivor(poor.id).await.unwrap(), poor);
}

#[tokio::test]
async fn infected_participant_is_named() {
    let service = service();
    let a = register(&service, "Shane", &[("wood", 2, 3)]).await;
    let b = register(&service, "Lori", &[("food", 6, 1)]).await;
    flag_times(&service, a.id, 3).await;

    let err = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IneligibleParticipant);
    assert!(matches!(
        err,
        ServiceError::Trade(refuge_survivors::TradeError::InfectedParticipant { survivor, .. })
            if survivor == a.id
    ));

    // Side B infected is rejected as well.
    let c = register(&service, "Andrea", &[("food", 6, 1)]).await;
    let d = register(&service, "Dale", &[("wood", 2, 3)]).await;
    flag_times(&service, d.id, 3).await;
    let err = service
        .trade_items(&trade(c.id, d.id, &[("food", 6, 1)], &[("wood", 2, 3)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IneligibleParticipant);
}

#[tokio::test]
async fn unknown_participant_is_not_found() {
    let service = service();
    let a = register(&service, "Morgan", &[("wood", 2, 3)]).await;
    let err = service
        .trade_items(&trade(a.id, SurvivorId::new(), &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let empty_offer = service
        .trade_items(&trade(a.id, SurvivorId::new(), &[("wood", 2, 3)], &[]))
        .await
        .unwrap_err();
    assert_eq!(empty_offer.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn malformed_requests_are_invalid() {
    let service = service();
    let a = register(&service, "Aaron", &[("wood", 2, 3)]).await;
    let b = register(&service, "Eric", &[("food", 6, 1)]).await;

    let self_trade = service
        .trade_items(&trade(a.id, a.id, &[("wood", 2, 3)], &[("wood", 2, 3)]))
        .await
        .unwrap_err();
    assert_eq!(self_trade.kind(), ErrorKind::InvalidRequest);

    let empty = service
        .trade_items(&trade(a.id, b.id, &[], &[("food", 6, 1)]))
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn resubmitted_rejection_is_stable() {
    let service = service();
    let a = register(&service, "Tara", &[("wood", 2, 3)]).await;
    let b = register(&service, "Denise", &[("food", 5, 1)]).await;
    let request = trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 5, 1)]);

    let first = service.trade_items(&request).await.unwrap_err();
    let second = service.trade_items(&request).await.unwrap_err();
    assert_eq!(first, second);
}

#[tokio::test]
async fn competing_trades_cannot_spend_the_same_stock() {
    let service = Arc::new(service());
    let a = register(&service, "Jesus", &[("wood", 2, 3)]).await;
    let b = register(&service, "Ezekiel", &[("food", 6, 1)]).await;
    let c = register(&service, "Jerry", &[("water", 3, 2)]).await;

    let requests = [
        trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]),
        trade(c.id, a.id, &[("water", 3, 2)], &[("wood", 2, 3)]),
    ];
    let runs = requests.iter().map(|request| {
        let service = Arc::clone(&service);
        async move { service.trade_items(request).await }
    });
    let results = futures::future::join_all(runs).await;

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "exactly one trade may spend A's wood");
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind(), ErrorKind::InsufficientResource);

    let all = service.registry().list().await.unwrap();
    assert_eq!(unit_totals(&all).get("wood"), Some(&3));
}

#[tokio::test]
async fn randomized_concurrent_trades_conserve_units() {
    const ITEMS: [(&str, u32); 4] = [
        ("water", 4),
        ("food", 3),
        ("medication", 2),
        ("ammunition", 1),
    ];

    let service = Arc::new(service());
    let mut rng = StdRng::seed_from_u64(7);
    let mut ids = Vec::new();
    for index in 0..6 {
        let resources: Vec<(&str, u32, u32)> = ITEMS
            .iter()
            .map(|&(item, points)| (item, points, rng.random_range(0..6)))
            .collect();
        let survivor = register(&service, &format!("survivor-{index}"), &resources).await;
        ids.push(survivor.id);
    }
    flag_times(&service, ids[5], 3).await;

    let before = unit_totals(&service.registry().list().await.unwrap());

    let mut requests = Vec::new();
    for _ in 0..60 {
        let a = ids[rng.random_range(0..ids.len())];
        let b = ids[rng.random_range(0..ids.len())];
        let (item_a, points_a) = ITEMS[rng.random_range(0..ITEMS.len())];
        let (item_b, points_b) = ITEMS[rng.random_range(0..ITEMS.len())];
        // Pick quantities that balance when possible.
        let qty_a = points_b * rng.random_range(1..3);
        let qty_b = points_a * (qty_a / points_b);
        requests.push(trade(
            a,
            b,
            &[(item_a, points_a, qty_a)],
            &[(item_b, points_b, qty_b)],
        ));
    }

    let runs = requests.iter().map(|request| {
        let service = Arc::clone(&service);
        async move { service.trade_items(request).await }
    });
    let results = futures::future::join_all(runs).await;

    let after_records = service.registry().list().await.unwrap();
    assert_eq!(unit_totals(&after_records), before);
    assert!(
        after_records
            .iter()
            .all(|s| s.resources.iter().all(|entry| entry.quantity > 0))
    );
    for (request, result) in requests.iter().zip(&results) {
        if let Ok(receipt) = result {
            assert_ne!(request.survivor_a, ids[5]);
            assert_ne!(request.survivor_b, ids[5]);
            let declared_a: u64 = request
                .offer_a
                .iter()
                .map(|o| u64::from(o.unit_points) * u64::from(o.quantity))
                .sum();
            assert_eq!(declared_a, receipt.value);
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reports_track_infection_and_stock() {
    let service = service();
    assert_eq!(service.percentage_infected().await.unwrap(), Decimal::ZERO);

    let healthy = register(&service, "Judith", &[("water", 4, 2)]).await;
    let sick = register(&service, "Carl", &[("food", 3, 2), ("water", 4, 2)]).await;
    flag_times(&service, sick.id, 3).await;

    assert_eq!(service.percentage_infected().await.unwrap(), Decimal::from(50));
    assert_eq!(service.percentage_non_infected().await.unwrap(), Decimal::from(50));
    assert_eq!(service.point_loss().await.unwrap(), 14);

    let averages = service.average_amount_per_item().await.unwrap();
    assert_eq!(averages.get("water"), Some(&Decimal::from(2)));
    assert_eq!(averages.get("food"), Some(&Decimal::ONE));

    let report = service.report().await.unwrap();
    assert_eq!(report.survivor_count, 2);
    assert_eq!(report.infected_count, 1);
    assert_eq!(report.point_loss, 14);
    assert!(ledger::find_entry(
        &service.get_survivor(healthy.id).await.unwrap().resources,
        "water"
    )
    .is_some());
}

// ---------------------------------------------------------------------------
// Storage failures
// ---------------------------------------------------------------------------

/// Wraps the in-memory registry and fails every save for one survivor.
#[derive(Default)]
struct FailingRegistry {
    inner: InMemoryRegistry,
    fail_saves_for: Mutex<Option<SurvivorId>>,
}

impl SurvivorRegistry for FailingRegistry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        self.inner.load(id).await
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        let failing = *self.fail_saves_for.lock().unwrap();
        if failing == Some(survivor.id) {
            return Err(RegistryError::Storage(String::from("disk full")));
        }
        self.inner.save(survivor).await
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn failed_second_save_restores_first_record() {
    let service = SurvivorService::new(FailingRegistry::default(), &RefugeConfig::default());
    let a = register(&service, "Hilltop", &[("wood", 2, 3)]).await;
    let b = register(&service, "Kingdom", &[("food", 6, 1)]).await;
    *service.registry().fail_saves_for.lock().unwrap() = Some(b.id);

    let err = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.kind().is_fatal());
    assert!(!err.public_message().contains("disk full"));
    assert_eq!(service.get_survivor(a.id).await.unwrap(), a);
    assert_eq!(service.get_survivor(b.id).await.unwrap(), b);
}

/// Writes one survivor's records, then replies too late for the save timeout.
#[derive(Default)]
struct LateReplyRegistry {
    inner: InMemoryRegistry,
    late_for: Mutex<Option<SurvivorId>>,
}

impl SurvivorRegistry for LateReplyRegistry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        self.inner.load(id).await
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        self.inner.save(survivor).await?;
        let late = *self.late_for.lock().unwrap();
        if late == Some(survivor.id) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        self.inner.list().await
    }
}

fn late_reply_service() -> SurvivorService<LateReplyRegistry> {
    let mut config = RefugeConfig::default();
    config.store.operation_timeout_ms = 50;
    SurvivorService::new(LateReplyRegistry::default(), &config)
}

#[tokio::test]
async fn late_reply_on_second_save_keeps_the_committed_pair() {
    let service = late_reply_service();
    let a = register(&service, "Rosita", &[("wood", 2, 3)]).await;
    let b = register(&service, "Eugene", &[("food", 6, 1)]).await;
    *service.registry().late_for.lock().unwrap() = Some(b.id);

    let err = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::Timeout { ref operation }) if operation == "save"
    ));

    let stored_a = service.get_survivor(a.id).await.unwrap();
    let stored_b = service.get_survivor(b.id).await.unwrap();
    assert_eq!(stored_a.resources, vec![ResourceEntry::new("food", 6, 1)]);
    assert_eq!(stored_b.resources, vec![ResourceEntry::new("wood", 2, 3)]);

    let totals = unit_totals(&service.registry().list().await.unwrap());
    assert_eq!(totals.get("wood"), Some(&3));
    assert_eq!(totals.get("food"), Some(&1));
}

#[tokio::test]
async fn late_reply_on_first_save_restores_both_records() {
    let service = late_reply_service();
    let a = register(&service, "Tara", &[("wood", 2, 3)]).await;
    let b = register(&service, "Denise", &[("food", 6, 1)]).await;
    *service.registry().late_for.lock().unwrap() = Some(a.id);

    let err = service
        .trade_items(&trade(a.id, b.id, &[("wood", 2, 3)], &[("food", 6, 1)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(service.get_survivor(a.id).await.unwrap(), a);
    assert_eq!(service.get_survivor(b.id).await.unwrap(), b);
}

/// Registry whose loads never finish in time.
#[derive(Default)]
struct SlowRegistry {
    inner: InMemoryRegistry,
}

impl SurvivorRegistry for SlowRegistry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        self.inner.load(id).await
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        self.inner.save(survivor).await
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn slow_store_surfaces_as_storage_error() {
    let mut config = RefugeConfig::default();
    config.store.operation_timeout_ms = 20;
    let service = SurvivorService::new(SlowRegistry::default(), &config);

    let err = service.get_survivor(SurvivorId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::Timeout { ref operation }) if operation == "load"
    ));
}
