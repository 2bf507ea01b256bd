//! Offline demo data
//!
//! `--offline` runs the service against an in-memory backend seeded with a
//! small sales team's worth of rows. Sign in with the bearer token
//! [`DEMO_TOKEN`].

use chrono::{Duration, Utc};
use crm_common::backend::memory::MemoryBackend;
use crm_common::backend::AuthUser;
use crm_common::model::Table;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Bearer token accepted by the demo backend (admin role)
pub const DEMO_TOKEN: &str = "demo";

/// Seed `backend` and register the demo user
pub async fn seed(backend: &MemoryBackend) -> AuthUser {
    let now = Utc::now();
    let user = AuthUser {
        id: Uuid::new_v4(),
        email: Some("demo@example.com".to_string()),
    };
    backend.add_user(DEMO_TOKEN, user.clone()).await;
    backend
        .seed(
            Table::UserRoles,
            [json!({"user_id": user.id, "role": "admin"})],
        )
        .await;
    backend
        .seed(
            Table::Profiles,
            [json!({"id": user.id, "full_name": "Demo Admin", "email": "demo@example.com"})],
        )
        .await;

    let acme = Uuid::new_v4();
    let globex = Uuid::new_v4();
    backend
        .seed(
            Table::Companies,
            [
                json!({"id": acme, "name": "Acme, Inc.", "industry": "Manufacturing", "city": "Denver",
                       "employee_count": 250, "created_at": now - Duration::days(40)}),
                json!({"id": globex, "name": "Globex", "industry": "Software", "city": "Austin",
                       "employee_count": 80, "created_at": now - Duration::days(20)}),
            ],
        )
        .await;

    let jane = Uuid::new_v4();
    backend
        .seed(
            Table::Contacts,
            [
                json!({"id": jane, "first_name": "Jane", "last_name": "Doe", "email": "jane@acme.test",
                       "company_id": acme, "created_at": now - Duration::days(30)}),
                json!({"id": Uuid::new_v4(), "first_name": "Hank", "last_name": "Scorpio",
                       "email": "hank@globex.test", "company_id": globex, "created_at": now - Duration::days(10)}),
            ],
        )
        .await;

    let lead = Uuid::new_v4();
    backend
        .seed(
            Table::Leads,
            [
                json!({"id": lead, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.test",
                       "company_name": "Analytical Engines", "source": "website", "status": "new",
                       "score": 70, "created_at": now - Duration::days(3)}),
                json!({"id": Uuid::new_v4(), "first_name": "Grace", "last_name": "Hopper",
                       "email": "grace@example.test", "source": "referral", "status": "qualified",
                       "score": 90, "created_at": now - Duration::days(8)}),
                json!({"id": Uuid::new_v4(), "first_name": "Alan", "email": "alan@example.test",
                       "source": "cold_call", "status": "contacted", "created_at": now - Duration::days(15)}),
            ],
        )
        .await;

    let deal = Uuid::new_v4();
    let today = now.date_naive();
    backend
        .seed(
            Table::Deals,
            [
                json!({"id": deal, "title": "Acme rollout", "value": 48000.0, "stage": "proposal",
                       "probability": 60, "company_id": acme, "contact_id": jane,
                       "expected_close_date": today + Duration::days(30), "created_at": now - Duration::days(25)}),
                json!({"id": Uuid::new_v4(), "title": "Globex pilot", "value": 12000.0, "stage": "qualified",
                       "probability": 30, "company_id": globex, "created_at": now - Duration::days(12)}),
                json!({"id": Uuid::new_v4(), "title": "Acme support renewal", "value": 9000.0,
                       "stage": "closed_won", "probability": 100, "company_id": acme,
                       "expected_close_date": today - Duration::days(5), "created_at": now - Duration::days(60)}),
            ],
        )
        .await;

    backend
        .seed(
            Table::Tasks,
            [
                json!({"id": Uuid::new_v4(), "title": "Send proposal", "priority": "high", "status": "pending",
                       "due_date": today - Duration::days(1), "related_to_type": "deal", "related_to_id": deal,
                       "assigned_to": user.id, "created_at": now - Duration::days(4)}),
                json!({"id": Uuid::new_v4(), "title": "Intro call", "status": "in_progress",
                       "due_date": today + Duration::days(2), "related_to_type": "lead", "related_to_id": lead,
                       "created_at": now - Duration::days(2)}),
            ],
        )
        .await;

    backend
        .seed(
            Table::Calls,
            [
                json!({"id": Uuid::new_v4(), "phone_number": "+1 555 0100", "contact_id": jane,
                       "direction": "outbound", "status": "completed", "duration": 754,
                       "created_at": now - Duration::days(1)}),
                json!({"id": Uuid::new_v4(), "phone_number": "+1 555 0199", "direction": "outbound",
                       "status": "scheduled", "scheduled_at": now + Duration::hours(3),
                       "created_at": now - Duration::hours(1)}),
            ],
        )
        .await;

    backend
        .seed(
            Table::Subscribers,
            [
                json!({"id": Uuid::new_v4(), "email": "ada@example.test", "first_name": "Ada",
                       "status": "active", "tags": ["vip", "newsletter"], "created_at": now - Duration::days(5)}),
                json!({"id": Uuid::new_v4(), "email": "old@example.test", "status": "unsubscribed",
                       "tags": ["newsletter"], "created_at": now - Duration::days(90)}),
            ],
        )
        .await;

    backend
        .seed(
            Table::Campaigns,
            [json!({"id": Uuid::new_v4(), "name": "Spring launch", "type": "email", "status": "completed",
                    "subject": "New in spring", "recipients_count": 200, "opens_count": 80,
                    "clicks_count": 12, "created_at": now - Duration::days(14)})],
        )
        .await;

    info!("Demo data seeded; use bearer token '{}'", DEMO_TOKEN);
    user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_common::backend::Backend;
    use crm_common::permissions::UserContext;

    #[tokio::test]
    async fn test_demo_user_is_admin() {
        let backend = MemoryBackend::new();
        let user = seed(&backend).await;

        let signed_in = backend.current_user(DEMO_TOKEN).await.require("user").unwrap();
        assert_eq!(signed_in.id, user.id);

        let ctx = UserContext::load(&backend, signed_in).await.unwrap();
        assert!(ctx.permissions.can_manage_users);
        assert_eq!(backend.rows(Table::Deals).await.len(), 3);
    }
}
