//! Scenario tests exercising the scan pipeline and bill assembly against
//! a real Postgres instance (spec §8). Gated behind `#[sqlx::test]`,
//! which provisions and migrates an ephemeral database per test.

use sqlx::PgPool;
use uuid::Uuid;

use tracetrack::db::Db;
use tracetrack::domain::bag::BagType;
use tracetrack::domain::scan::AppendOutcome;
use tracetrack::domain::user::{CreateUserRequest, Role};
use tracetrack::repository::{BagRepository, BillRepository, LinkRepository, ScanRepository, UserRepository};
use tracetrack::services::{BagService, BillService, ScanService};

const PARENT_WEIGHT_CAP_KG: f64 = 30.0;

async fn seed_user(users: &UserRepository, role: Role) -> Uuid {
    let req = CreateUserRequest {
        username: format!("user-{}", Uuid::new_v4()),
        email: format!("{}@example.test", Uuid::new_v4()),
        password: "correct horse battery staple".to_string(),
        role,
    };
    let hash = tracetrack::auth::password::hash_password(&req.password).unwrap();
    users.create(&req, &hash).await.unwrap().id
}

#[sqlx::test]
async fn scan_pipeline_dedupes_children_and_commits_links(pool: PgPool) {
    let db = Db::from_pool(pool);
    let users = UserRepository::new(db.clone());
    let bags = BagRepository::new(db.clone());
    let links = LinkRepository::new(db.clone());
    let scans = ScanRepository::new(db.clone());
    let scan_service = ScanService::new(db.clone());

    let scanner_id = seed_user(&users, Role::Dispatcher).await;
    let session_id = Uuid::new_v4();

    scan_service
        .scan_parent(session_id, scanner_id, "P1", 120.0)
        .await
        .unwrap();

    let first = scan_service
        .scan_child(session_id, scanner_id, "C1", 90.0)
        .await
        .unwrap();
    assert_eq!(first.outcome, AppendOutcome::Added);

    let duplicate = scan_service
        .scan_child(session_id, scanner_id, "C1", 95.0)
        .await
        .unwrap();
    assert_eq!(duplicate.outcome, AppendOutcome::DuplicateWithinWindow);

    scan_service
        .scan_child(session_id, scanner_id, "C2", 80.0)
        .await
        .unwrap();

    let summary = scan_service.finish_scanning(session_id, scanner_id).await.unwrap();
    assert_eq!(summary.parent_qr_id, "P1");
    assert_eq!(summary.linked, 2);
    assert_eq!(summary.already_linked, 0);

    let parent = bags.find_by_qr("P1").await.unwrap().unwrap();
    let child_count = links.count_children_of_parent(parent.id).await.unwrap();
    assert_eq!(child_count, 2);

    let scans_today = scans.count_by_user_today(scanner_id).await.unwrap();
    // One parent scan + three child scans (including the suppressed
    // duplicate) — every scan writes a row for audit completeness
    // (spec §4.7), regardless of dedup outcome.
    assert_eq!(scans_today, 4);
}

#[sqlx::test]
async fn finish_scanning_reports_children_already_linked_elsewhere(pool: PgPool) {
    let db = Db::from_pool(pool);
    let users = UserRepository::new(db.clone());
    let scan_service = ScanService::new(db.clone());

    let scanner_id = seed_user(&users, Role::Dispatcher).await;

    let first_session = Uuid::new_v4();
    scan_service.scan_parent(first_session, scanner_id, "P1", 100.0).await.unwrap();
    scan_service.scan_child(first_session, scanner_id, "C1", 100.0).await.unwrap();
    scan_service.finish_scanning(first_session, scanner_id).await.unwrap();

    let second_session = Uuid::new_v4();
    scan_service.scan_parent(second_session, scanner_id, "P2", 100.0).await.unwrap();
    scan_service.scan_child(second_session, scanner_id, "C1", 100.0).await.unwrap();
    let summary = scan_service.finish_scanning(second_session, scanner_id).await.unwrap();

    assert_eq!(summary.linked, 0);
    assert_eq!(summary.already_linked, 1);
}

/// S3: three parents with 10/30/42 children, weight cap 30kg per parent.
/// Expected total weight is min(10,30) + min(30,30) + min(42,30) = 70.
#[sqlx::test]
async fn bill_weight_matches_capped_contribution_scenario(pool: PgPool) {
    let db = Db::from_pool(pool);
    let users = UserRepository::new(db.clone());
    let bags = BagRepository::new(db.clone());
    let links = LinkRepository::new(db.clone());
    let bill_repo = BillRepository::new(db.clone());

    let biller_id = seed_user(&users, Role::Biller).await;
    let bag_service = BagService::new(db.clone(), bags.clone(), links.clone());
    let bill_service = BillService::new(db.clone(), bill_repo, bags.clone(), PARENT_WEIGHT_CAP_KG);

    let parent_child_counts = [("P1", 10), ("P2", 30), ("P3", 42)];
    for (parent_qr, child_count) in parent_child_counts {
        bag_service
            .create_bag(parent_qr, BagType::Parent, None)
            .await
            .unwrap();
        for i in 0..child_count {
            let child_qr = format!("{parent_qr}-C{i}");
            bag_service
                .create_bag(&child_qr, BagType::Child, None)
                .await
                .unwrap();
            bag_service.link(parent_qr, &child_qr, biller_id).await.unwrap();
        }
    }

    let bill = bill_service.create_bill("BILL-1", 3, biller_id).await.unwrap();
    assert_eq!(bill.expected_weight_kg, 90.0);

    let mut bill = bill;
    for (parent_qr, _) in parent_child_counts {
        bill = bill_service.attach_parent(&bill.bill_id, parent_qr).await.unwrap();
    }

    assert_eq!(bill.total_weight_kg, 70.0);

    let finalized = bill_service.finalize_bill(&bill.bill_id).await.unwrap();
    assert_eq!(finalized.status, tracetrack::domain::bill::BillStatus::Completed);
}

#[sqlx::test]
async fn finalize_rejects_bill_missing_required_parents(pool: PgPool) {
    let db = Db::from_pool(pool);
    let users = UserRepository::new(db.clone());
    let bags = BagRepository::new(db.clone());
    let bill_repo = BillRepository::new(db.clone());

    let biller_id = seed_user(&users, Role::Biller).await;
    let bill_service = BillService::new(db.clone(), bill_repo, bags, PARENT_WEIGHT_CAP_KG);

    let bill = bill_service.create_bill("BILL-2", 2, biller_id).await.unwrap();
    let result = bill_service.finalize_bill(&bill.bill_id).await;
    assert!(result.is_err());
}

#[sqlx::test]
async fn attach_parent_rejects_second_open_bill(pool: PgPool) {
    let db = Db::from_pool(pool);
    let users = UserRepository::new(db.clone());
    let bags = BagRepository::new(db.clone());
    let links = LinkRepository::new(db.clone());
    let bill_repo = BillRepository::new(db.clone());

    let biller_id = seed_user(&users, Role::Biller).await;
    let bag_service = BagService::new(db.clone(), bags.clone(), links);
    let bill_service = BillService::new(db.clone(), bill_repo, bags, PARENT_WEIGHT_CAP_KG);

    bag_service.create_bag("P1", BagType::Parent, None).await.unwrap();
    let bill_a = bill_service.create_bill("BILL-A", 1, biller_id).await.unwrap();
    let bill_b = bill_service.create_bill("BILL-B", 1, biller_id).await.unwrap();

    bill_service.attach_parent(&bill_a.bill_id, "P1").await.unwrap();
    let result = bill_service.attach_parent(&bill_b.bill_id, "P1").await;
    assert!(result.is_err());
}
