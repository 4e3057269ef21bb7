use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use sub67_shared::AppResult;

use super::{DeliveryRepo, HistogramRepo, MatchedJobRepo, UserRepo};
use crate::models::{DeliveryRecord, UserMatchedJobRecord, UserProfile};

#[derive(Default)]
pub struct InMemoryUserRepo {
    users: Mutex<Vec<UserProfile>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserProfile) {
        let mut users = self.users.lock().unwrap();
        users.retain(|u| u.id != user.id);
        users.push(user);
    }

    pub fn user(&self, user_id: &str) -> Option<UserProfile> {
        let users = self.users.lock().unwrap();
        users.iter().find(|u| u.id == user_id).cloned()
    }
}

#[async_trait::async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_notifiable_in_district(&self, district_id: &str) -> AppResult<Vec<UserProfile>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| u.notify_enabled && u.district_ids.iter().any(|d| d == district_id))
            .cloned()
            .collect())
    }

    async fn remove_push_tokens(&self, user_id: &str, tokens: &[String]) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.push_tokens.retain(|t| !tokens.contains(t));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDeliveryRepo {
    deliveries: Mutex<Vec<DeliveryRecord>>,
}

impl InMemoryDeliveryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DeliveryRepo for InMemoryDeliveryRepo {
    async fn exists(&self, event_id: &str, user_id: &str) -> AppResult<bool> {
        let deliveries = self.deliveries.lock().unwrap();
        Ok(deliveries
            .iter()
            .any(|d| d.event_id == event_id && d.user_id == user_id))
    }

    async fn insert(&self, record: &DeliveryRecord) -> AppResult<()> {
        let mut deliveries = self.deliveries.lock().unwrap();
        let exists = deliveries
            .iter()
            .any(|d| d.event_id == record.event_id && d.user_id == record.user_id);
        if !exists {
            deliveries.push(record.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMatchedJobRepo {
    jobs: Mutex<BTreeMap<(String, String), UserMatchedJobRecord>>,
}

impl InMemoryMatchedJobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matched_jobs(&self) -> Vec<UserMatchedJobRecord> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl MatchedJobRepo for InMemoryMatchedJobRepo {
    async fn save(&self, record: &UserMatchedJobRecord) -> AppResult<()> {
        let key = (record.user_id.clone(), record.event_id.clone());
        self.jobs.lock().unwrap().insert(key, record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryHistogramRepo {
    hits: Mutex<HashMap<(String, u8), i64>>,
}

impl InMemoryHistogramRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self, scope_id: &str, bucket: u8) -> i64 {
        let hits = self.hits.lock().unwrap();
        hits.get(&(scope_id.to_string(), bucket)).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl HistogramRepo for InMemoryHistogramRepo {
    async fn increment(&self, scope_id: &str, bucket: u8, _at: DateTime<Utc>) -> AppResult<()> {
        let mut hits = self.hits.lock().unwrap();
        *hits.entry((scope_id.to_string(), bucket)).or_insert(0) += 1;
        Ok(())
    }
}
